//! Shared layouts for the integration tests.
#![allow(dead_code)]

use cutout::geometry::{Contour, Point, Shape};
use cutout::layout::{ComponentType, LayoutBuilder, LayoutDatabase, ModelKind, SetupKind, Terminal};
use cutout::{GeometryKernel, LayoutStore};

pub const DQS_P: &str = "DDR4_DQS0_P";
pub const DQS_N: &str = "DDR4_DQS0_N";

pub fn signals() -> Vec<String> {
    vec![DQS_P.to_string(), DQS_N.to_string()]
}

pub fn references() -> Vec<String> {
    vec!["GND".to_string()]
}

/// A DQS pair over a GND plane, with unrelated copper elsewhere on the board.
///
/// Everything the cutout should keep sits around y = 0.02; the VDD plane,
/// the DQ0 trace, R1 and the second GND via are well outside a 1 mm extent.
pub fn ddr4_builder() -> LayoutBuilder {
    LayoutBuilder::new("ddr4_board")
        .two_layer_stackup()
        .net(DQS_P)
        .net(DQS_N)
        .net("DDR4_DQ0")
        .power_net("GND")
        .power_net("VDD")
        .rectangle("GND", "BOTTOM", Point::new(0.0, 0.0), Point::new(0.05, 0.05))
        .rectangle("VDD", "TOP", Point::new(0.035, 0.0), Point::new(0.05, 0.01))
        .trace(DQS_P, "TOP", &[Point::new(0.01, 0.02), Point::new(0.03, 0.02)], 1e-4)
        .trace(DQS_N, "TOP", &[Point::new(0.01, 0.021), Point::new(0.03, 0.021)], 1e-4)
        .trace("DDR4_DQ0", "TOP", &[Point::new(0.04, 0.045), Point::new(0.048, 0.045)], 1e-4)
        .pad_definition("VIA", 4e-4, 4e-4, 2e-4)
        .pad_definition("SMD", 3e-4, 3e-4, 0.0)
        .via("GND", "VIA", Point::new(0.02, 0.0195), "TOP", "BOTTOM")
        .via("GND", "VIA", Point::new(0.02, 0.01), "TOP", "BOTTOM")
        .component("U1", ComponentType::Ic, None)
        .pin("U1", "A1", DQS_P, "SMD", Point::new(0.01, 0.02), "TOP")
        .pin("U1", "A2", DQS_N, "SMD", Point::new(0.01, 0.021), "TOP")
        .pin("U1", "A3", "GND", "SMD", Point::new(0.0095, 0.0205), "TOP")
        .component("R1", ComponentType::Resistor, None)
        .pin("R1", "1", "VDD", "SMD", Point::new(0.04, 0.005), "TOP")
        .pin("R1", "2", "GND", "SMD", Point::new(0.041, 0.005), "TOP")
        .port(
            "P1",
            Terminal::new(DQS_P, "TOP", Point::new(0.03, 0.02)),
            Some(Terminal::new("GND", "BOTTOM", Point::new(0.03, 0.02))),
        )
        .setup("hfss", SetupKind::Hfss)
        .setup("siwave", SetupKind::Siwave)
}

pub fn ddr4_board() -> LayoutDatabase {
    ddr4_builder().build()
}

/// Same board plus a series termination with a SPICE model that hangs off VDD.
pub fn ddr4_board_with_model() -> LayoutDatabase {
    ddr4_builder()
        .component("RT1", ComponentType::Resistor, Some(ModelKind::Spice))
        .pin("RT1", "1", DQS_P, "SMD", Point::new(0.025, 0.0195), "TOP")
        .pin("RT1", "2", "VDD", "SMD", Point::new(0.025, 0.012), "TOP")
        .build()
}

/// GND plane with one void, plus a short signal trace; for custom-extent runs.
pub fn voided_plane(void_size: f64) -> LayoutDatabase {
    let plane = Shape::with_voids(
        Contour::rectangle(Point::new(0.0, 0.0), Point::new(0.01, 0.01)),
        vec![Contour::rectangle(
            Point::new(0.001, 0.001),
            Point::new(0.001 + void_size, 0.001 + void_size),
        )],
    );
    LayoutBuilder::new("plane")
        .two_layer_stackup()
        .net("SIG")
        .power_net("GND")
        .polygon("GND", "BOTTOM", plane)
        .trace("SIG", "TOP", &[Point::new(0.001, 0.005), Point::new(0.004, 0.005)], 1e-4)
        .build()
}

/// Total copper area on `net`, stroked paths included.
pub fn net_area<S: LayoutStore>(store: &S, net: &str, kernel: &dyn GeometryKernel) -> f64 {
    store
        .net_primitives(net)
        .unwrap()
        .iter()
        .flat_map(|p| cutout::pipeline::primitive_shapes(p, kernel).unwrap())
        .map(|s| kernel.area(&s))
        .sum()
}

pub fn net_names<S: LayoutStore>(store: &S) -> Vec<String> {
    let mut names: Vec<String> = store.nets().unwrap().into_iter().map(|n| n.name).collect();
    names.sort();
    names
}
