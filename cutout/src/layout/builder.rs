//! Fluent construction of layout databases, mainly for tests, benches and demos.

use super::database::LayoutDatabase;
use super::schema::*;
use crate::geometry::{CapStyle, Point, Shape, Vertex};

pub struct LayoutBuilder {
    name: String,
    cell: Cell,
}

impl LayoutBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            cell: Cell::new(name.clone()),
            name,
        }
    }

    pub fn layer(mut self, name: &str, layer_type: LayerType, thickness: f64) -> Self {
        self.cell.layers.push(Layer {
            name: name.to_string(),
            layer_type,
            thickness,
        });
        self
    }

    /// TOP / DIEL / BOTTOM.
    pub fn two_layer_stackup(self) -> Self {
        self.layer("TOP", LayerType::Signal, 35e-6)
            .layer("DIEL", LayerType::Dielectric, 1e-4)
            .layer("BOTTOM", LayerType::Signal, 35e-6)
    }

    pub fn net(mut self, name: &str) -> Self {
        if !self.cell.nets.iter().any(|n| n.name == name) {
            self.cell.nets.push(Net::new(name));
        }
        self
    }

    pub fn power_net(mut self, name: &str) -> Self {
        self = self.net(name);
        if let Some(net) = self.cell.nets.iter_mut().find(|n| n.name == name) {
            net.is_power_ground = true;
        }
        self
    }

    pub fn polygon(mut self, net: &str, layer: &str, shape: Shape) -> Self {
        let id = self.cell.allocate_id();
        self.cell.primitives.push(Primitive {
            id,
            net: net.to_string(),
            layer: layer.to_string(),
            geometry: PrimitiveGeometry::Polygon(shape),
        });
        self
    }

    pub fn rectangle(self, net: &str, layer: &str, min: Point, max: Point) -> Self {
        self.polygon(net, layer, Shape::rectangle(min, max))
    }

    pub fn path(mut self, net: &str, layer: &str, centerline: Vec<Vertex>, width: f64, cap: CapStyle) -> Self {
        let id = self.cell.allocate_id();
        self.cell.primitives.push(Primitive {
            id,
            net: net.to_string(),
            layer: layer.to_string(),
            geometry: PrimitiveGeometry::Path(PathGeometry {
                centerline,
                width,
                cap,
            }),
        });
        self
    }

    /// Straight-segment path with round caps.
    pub fn trace(self, net: &str, layer: &str, points: &[Point], width: f64) -> Self {
        let centerline = points.iter().map(|p| Vertex::from(*p)).collect();
        self.path(net, layer, centerline, width, CapStyle::Round)
    }

    pub fn pad_definition(mut self, name: &str, width: f64, height: f64, hole: f64) -> Self {
        self.cell.padstack_definitions.push(PadstackDefinition {
            name: name.to_string(),
            pad_width: width,
            pad_height: height,
            hole_diameter: hole,
        });
        self
    }

    pub fn via(mut self, net: &str, definition: &str, position: Point, start: &str, stop: &str) -> Self {
        let id = self.cell.allocate_id();
        self.cell.padstack_instances.push(PadstackInstance {
            id,
            name: format!("via_{}", id),
            definition: definition.to_string(),
            net: net.to_string(),
            position,
            start_layer: start.to_string(),
            stop_layer: stop.to_string(),
            component: None,
            pin_name: None,
        });
        self
    }

    pub fn component(mut self, name: &str, component_type: ComponentType, model: Option<ModelKind>) -> Self {
        self.cell.components.push(Component {
            name: name.to_string(),
            part_name: format!("{}_part", name),
            component_type,
            model: model.map(|kind| ComponentModel { kind, file: None }),
        });
        self
    }

    pub fn pin(
        mut self,
        component: &str,
        pin_name: &str,
        net: &str,
        definition: &str,
        position: Point,
        layer: &str,
    ) -> Self {
        let id = self.cell.allocate_id();
        self.cell.padstack_instances.push(PadstackInstance {
            id,
            name: format!("{}-{}", component, pin_name),
            definition: definition.to_string(),
            net: net.to_string(),
            position,
            start_layer: layer.to_string(),
            stop_layer: layer.to_string(),
            component: Some(component.to_string()),
            pin_name: Some(pin_name.to_string()),
        });
        self
    }

    /// Pin group from `(component, pin name)` pairs; unknown pins are skipped.
    pub fn pin_group(mut self, name: &str, pins: &[(&str, &str)]) -> Self {
        let ids = pins
            .iter()
            .filter_map(|(comp, pin)| {
                self.cell
                    .padstack_instances
                    .iter()
                    .find(|i| {
                        i.component.as_deref() == Some(*comp) && i.pin_name.as_deref() == Some(*pin)
                    })
                    .map(|i| i.id)
            })
            .collect();
        self.cell.pin_groups.push(PinGroup {
            name: name.to_string(),
            pins: ids,
        });
        self
    }

    pub fn port(mut self, name: &str, terminal: Terminal, reference: Option<Terminal>) -> Self {
        self.cell.ports.push(Port {
            name: name.to_string(),
            terminal,
            reference,
        });
        self
    }

    pub fn setup(mut self, name: &str, kind: SetupKind) -> Self {
        self.cell.setups.push(SimulationSetup {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn design(self) -> LayoutDesign {
        LayoutDesign::new(self.name, self.cell)
    }

    pub fn build(self) -> LayoutDatabase {
        LayoutDatabase::new(self.design())
    }
}
