//! Integration tests for the classify-clip-rebuild pipeline

mod common;

use common::*;
use cutout::geometry::{BBox, Contour, Point, Shape};
use cutout::layout::{ComponentType, PrimitiveGeometry};
use cutout::{
    ClipperKernel, CutoutCore, CutoutOptions, ExtentType, GeometryKernel, LayoutBuilder,
    LayoutDatabase, LayoutStore, LengthUnit,
};

fn ddr4_options() -> CutoutOptions {
    CutoutOptions {
        expansion_size: 0.001,
        ..Default::default()
    }
}

fn within(inner: &BBox, outer: &BBox, tolerance: f64) -> bool {
    inner.min.x >= outer.min.x - tolerance
        && inner.min.y >= outer.min.y - tolerance
        && inner.max.x <= outer.max.x + tolerance
        && inner.max.y <= outer.max.y + tolerance
}

#[test]
fn test_ddr4_cutout_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("ddr4.json");
    let output = dir.path().join("ddr4_cutout.json");
    let mut db = ddr4_board();
    db.save_as(&source).unwrap();
    let kernel = ClipperKernel::new();
    let before = db.summary(&kernel).unwrap();

    let options = CutoutOptions {
        output_path: Some(output.clone()),
        ..ddr4_options()
    };
    let result = CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options)
        .expect("cutout should succeed");

    assert_eq!(result.iterations, 1);
    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
    assert!(result.boundary.len() >= 4);
    assert_eq!(result.boundary.first(), result.boundary.last());
    assert!(result.timings.iter().any(|t| t.phase == "compute"));

    let cut = LayoutDatabase::open(&output).unwrap();
    assert_eq!(net_names(&cut), vec![DQS_N, DQS_P, "GND"]);

    let extent = BBox::from_points(result.boundary.iter().map(|p| Point::from(*p))).unwrap();
    let gnd_shapes: Vec<_> = cut
        .net_primitives("GND")
        .unwrap()
        .iter()
        .flat_map(|p| cutout::pipeline::primitive_shapes(p, &kernel).unwrap())
        .collect();
    assert!(!gnd_shapes.is_empty());
    let gnd_box = kernel.bounding_box(&gnd_shapes).unwrap();
    assert!(within(&gnd_box, &extent, 1e-6), "GND copper escapes the extent");

    let after = cut.summary(&kernel).unwrap();
    let (b0, b1) = (before.bounding_box.unwrap(), after.bounding_box.unwrap());
    assert!(b1.width() <= b0.width() && b1.height() <= b0.height());

    // The original file is untouched when an output path is given.
    let original = LayoutDatabase::open(&source).unwrap();
    assert_eq!(original.nets().unwrap().len(), 5);
}

#[test]
fn test_outside_nets_instances_and_components_removed() {
    let mut db = ddr4_board();
    let kernel = ClipperKernel::new();
    let result =
        CutoutCore::run(&mut db, &kernel, &signals(), &references(), &ddr4_options()).unwrap();

    assert!(db.net_primitives("VDD").unwrap().is_empty());
    assert!(db.net_primitives("DDR4_DQ0").unwrap().is_empty());
    let components: Vec<String> = db.components().unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(components, vec!["U1"]);

    let instances = db.padstack_instances().unwrap();
    // U1's three pins and the GND via under the pair.
    assert_eq!(instances.len(), 4);
    assert!(instances.iter().all(|i| i.position.y > 0.015));

    assert_eq!(result.stats.deleted_nets, 2);
    assert_eq!(result.stats.deleted_components, 1);
    // No path on disk: the result stays in memory.
    assert!(result.output_path.is_none());
}

#[test]
fn test_signal_nets_survive_whole() {
    let mut db = ddr4_board();
    let kernel = ClipperKernel::new();
    let before_p = db.net_primitives(DQS_P).unwrap();

    // Extent covers only the left half of the pair.
    let options = CutoutOptions {
        custom_extent: Some(vec![
            [0.005, 0.015],
            [0.02, 0.015],
            [0.02, 0.025],
            [0.005, 0.025],
            [0.005, 0.015],
        ]),
        ..Default::default()
    };
    CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options).unwrap();

    assert_eq!(db.net_primitives(DQS_P).unwrap(), before_p);
    assert_eq!(db.net_primitives(DQS_N).unwrap().len(), 1);
}

#[test]
fn test_custom_extent_in_millimeters_with_partial_instances() {
    let mut db = ddr4_board();
    let kernel = ClipperKernel::new();
    // The GND via at (20, 19.5) mm straddles the bottom edge.
    let options = CutoutOptions {
        custom_extent: Some(vec![
            [5.0, 19.5],
            [35.0, 19.5],
            [35.0, 25.0],
            [5.0, 25.0],
            [5.0, 19.5],
        ]),
        custom_extent_units: LengthUnit::Millimeter,
        include_partial_instances: true,
        simple_pad_check: false,
        ..Default::default()
    };
    let result = CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options).unwrap();

    assert!((result.boundary[1][0] - 0.035).abs() < 1e-12);
    let vias: Vec<_> = db
        .padstack_instances()
        .unwrap()
        .into_iter()
        .filter(|i| !i.is_pin())
        .collect();
    assert_eq!(vias.len(), 1);
    assert!((vias[0].position.y - 0.0195).abs() < 1e-12);

    let gnd_area = net_area(&db, "GND", &kernel);
    assert!((gnd_area - 0.03 * 0.0055).abs() < 1e-9);
}

#[test]
fn test_partial_instances_dropped_by_default() {
    let mut db = ddr4_board();
    let kernel = ClipperKernel::new();
    let options = CutoutOptions {
        custom_extent: Some(vec![[5.0, 19.5], [35.0, 19.5], [35.0, 25.0], [5.0, 25.0]]),
        custom_extent_units: LengthUnit::Millimeter,
        simple_pad_check: false,
        ..Default::default()
    };
    CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options).unwrap();
    assert!(db.padstack_instances().unwrap().iter().all(|i| i.is_pin()));
}

#[test]
fn test_partial_plane_keeps_large_void() {
    let mut db = voided_plane(0.002);
    let kernel = ClipperKernel::new();
    let options = CutoutOptions {
        custom_extent: Some(vec![[0.0, 0.0], [0.005, 0.0], [0.005, 0.01], [0.0, 0.01]]),
        ..Default::default()
    };
    let result = CutoutCore::run(
        &mut db,
        &kernel,
        &["SIG".to_string()],
        &["GND".to_string()],
        &options,
    )
    .unwrap();

    assert_eq!(result.stats.created_polygons, 1);
    let gnd = db.net_primitives("GND").unwrap();
    assert_eq!(gnd.len(), 1);
    assert_eq!(gnd[0].void_count(), 1);
    // Half the plane minus the 2 mm void.
    assert!((net_area(&db, "GND", &kernel) - (5e-5 - 4e-6)).abs() < 1e-10);
}

#[test]
fn test_small_void_and_disabled_voids_are_dropped() {
    let kernel = ClipperKernel::new();
    let extent = vec![[0.0, 0.0], [0.005, 0.0], [0.005, 0.01], [0.0, 0.01]];

    // 1 mm void is 2% of the clipped piece.
    let mut small = voided_plane(0.001);
    let options = CutoutOptions {
        custom_extent: Some(extent.clone()),
        ..Default::default()
    };
    CutoutCore::run(&mut small, &kernel, &["SIG".to_string()], &["GND".to_string()], &options)
        .unwrap();
    assert!((net_area(&small, "GND", &kernel) - 5e-5).abs() < 1e-10);

    let mut large = voided_plane(0.002);
    let options = CutoutOptions {
        custom_extent: Some(extent),
        keep_voids: false,
        ..Default::default()
    };
    CutoutCore::run(&mut large, &kernel, &["SIG".to_string()], &["GND".to_string()], &options)
        .unwrap();
    let gnd = large.net_primitives("GND").unwrap();
    assert_eq!(gnd[0].void_count(), 0);
}

#[test]
fn test_second_pass_with_same_extent_changes_nothing() {
    let mut db = voided_plane(0.002);
    let kernel = ClipperKernel::new();
    let options = CutoutOptions {
        custom_extent: Some(vec![[0.0, 0.0], [0.005, 0.0], [0.005, 0.01], [0.0, 0.01]]),
        ..Default::default()
    };
    let sig = ["SIG".to_string()];
    let gnd = ["GND".to_string()];

    CutoutCore::run(&mut db, &kernel, &sig, &gnd, &options).unwrap();
    let first: Vec<_> = db.primitives().unwrap();
    let area = net_area(&db, "GND", &kernel);

    let again = CutoutCore::run(&mut db, &kernel, &sig, &gnd, &options).unwrap();
    assert_eq!(again.stats.created_polygons, 0);
    assert_eq!(again.stats.deleted_primitives, 0);
    assert_eq!(db.primitives().unwrap(), first);
    assert!((net_area(&db, "GND", &kernel) - area).abs() < 1e-12);
}

#[test]
fn test_reference_paths_reclipped_as_paths() {
    let mut db = LayoutBuilder::new("lines")
        .two_layer_stackup()
        .net("SIG")
        .net("GND")
        .trace("SIG", "TOP", &[Point::new(0.0, 0.0), Point::new(0.002, 0.0)], 1e-4)
        .trace("GND", "BOTTOM", &[Point::new(-0.01, 0.0), Point::new(0.01, 0.0)], 2e-4)
        .build();
    let kernel = ClipperKernel::new();
    let options = CutoutOptions {
        extent_type: ExtentType::BoundingBox,
        expansion_size: 0.001,
        keep_lines_as_path: true,
        ..Default::default()
    };
    let result = CutoutCore::run(
        &mut db,
        &kernel,
        &["SIG".to_string()],
        &["GND".to_string()],
        &options,
    )
    .unwrap();

    assert_eq!(result.stats.created_paths, 1);
    let gnd = db.net_primitives("GND").unwrap();
    assert_eq!(gnd.len(), 1);
    match &gnd[0].geometry {
        PrimitiveGeometry::Path(path) => {
            assert_eq!(path.width, 2e-4);
            let xs: Vec<f64> = path.centerline.iter().map(|v| v.x).collect();
            let max = xs.iter().cloned().fold(f64::MIN, f64::max);
            let min = xs.iter().cloned().fold(f64::MAX, f64::min);
            assert!(max <= 0.0031 + 1e-9 && min >= -0.0011 - 1e-9);
        }
        other => panic!("expected a path, got {:?}", other),
    }
}

#[test]
fn test_empty_signal_list_uses_every_other_net() {
    let mut db = ddr4_board();
    let kernel = ClipperKernel::new();
    CutoutCore::run(&mut db, &kernel, &[], &references(), &ddr4_options()).unwrap();
    // Every net is a signal or GND, so nothing is deleted.
    assert_eq!(db.nets().unwrap().len(), 5);
    assert_eq!(db.net_primitives("VDD").unwrap().len(), 1);
}

#[test]
fn test_preserved_model_component_keeps_its_nets() {
    let mut db = ddr4_board_with_model();
    let kernel = ClipperKernel::new();
    let options = CutoutOptions {
        preserve_components_with_model: true,
        ..ddr4_options()
    };
    CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options).unwrap();

    let names = net_names(&db);
    assert!(names.contains(&"VDD".to_string()));
    assert!(!names.contains(&"DDR4_DQ0".to_string()));
    let rt1 = db.component_pins("RT1").unwrap();
    assert_eq!(rt1.len(), 2);

    // VDD survives for RT1, but R1's VDD pin is not preserved and lies outside.
    let vdd_pins: Vec<_> = db
        .padstack_instances()
        .unwrap()
        .into_iter()
        .filter(|i| i.net == "VDD")
        .collect();
    assert_eq!(vdd_pins.len(), 1);
    assert_eq!(vdd_pins[0].component.as_deref(), Some("RT1"));
    let components: Vec<String> = db.components().unwrap().into_iter().map(|c| c.name).collect();
    assert!(!components.contains(&"R1".to_string()));
}

#[test]
fn test_fully_voided_crossing_drops_only_that_piece() {
    // C-shaped plane opening to the right; the extent strip crosses both arms
    // and the top-arm crossing lies inside the void.
    let plane = Shape::with_voids(
        Contour::from_points([
            [0.0, 0.0],
            [0.01, 0.0],
            [0.01, 0.002],
            [0.002, 0.002],
            [0.002, 0.008],
            [0.01, 0.008],
            [0.01, 0.01],
            [0.0, 0.01],
        ]),
        vec![Contour::rectangle(Point::new(0.004, 0.008), Point::new(0.009, 0.01))],
    );
    let mut db = LayoutBuilder::new("c_plane")
        .two_layer_stackup()
        .net("SIG")
        .power_net("GND")
        .polygon("GND", "BOTTOM", plane)
        .trace("SIG", "TOP", &[Point::new(0.0055, 0.005), Point::new(0.0075, 0.005)], 1e-4)
        .build();
    let kernel = ClipperKernel::new();
    let options = CutoutOptions {
        custom_extent: Some(vec![[0.005, -0.001], [0.008, -0.001], [0.008, 0.011], [0.005, 0.011]]),
        ..Default::default()
    };
    let result = CutoutCore::run(
        &mut db,
        &kernel,
        &["SIG".to_string()],
        &["GND".to_string()],
        &options,
    )
    .unwrap();

    assert_eq!(result.stats.clip_failures, 0);
    assert_eq!(result.stats.created_polygons, 1);
    assert!((net_area(&db, "GND", &kernel) - 6e-6).abs() < 1e-12);
}

#[test]
fn test_failed_clip_keeps_candidate_unclipped() {
    // A zero-width GND trace cannot be stroked, so it cannot be clipped.
    let mut db = ddr4_builder()
        .trace("GND", "TOP", &[Point::new(0.0, 0.0205), Point::new(0.05, 0.0205)], 0.0)
        .build();
    let broken: Vec<_> = db
        .net_primitives("GND")
        .unwrap()
        .into_iter()
        .filter(|p| matches!(&p.geometry, PrimitiveGeometry::Path(path) if path.width == 0.0))
        .collect();
    assert_eq!(broken.len(), 1);

    let kernel = ClipperKernel::new();
    let result =
        CutoutCore::run(&mut db, &kernel, &signals(), &references(), &ddr4_options()).unwrap();

    assert_eq!(result.stats.clip_failures, 1);
    let gnd = db.net_primitives("GND").unwrap();
    assert!(gnd.contains(&broken[0]));
    // The plane itself was still clipped.
    assert_eq!(result.stats.created_polygons, 1);
}

#[test]
fn test_single_pin_passives_removed_on_request() {
    let board = || {
        ddr4_builder()
            .component("C1", ComponentType::Capacitor, None)
            .pin("C1", "1", DQS_P, "SMD", Point::new(0.02, 0.02), "TOP")
            .pin("C1", "2", "VDD", "SMD", Point::new(0.02, 0.03), "TOP")
            .component("MECH1", ComponentType::Other, None)
            .build()
    };
    let component_names = |db: &LayoutDatabase| -> Vec<String> {
        db.components().unwrap().into_iter().map(|c| c.name).collect()
    };
    let kernel = ClipperKernel::new();

    let mut kept = board();
    let result =
        CutoutCore::run(&mut kept, &kernel, &signals(), &references(), &ddr4_options()).unwrap();
    assert_eq!(result.stats.deleted_single_pin_components, 0);
    // R1 lost every pin; MECH1 never had any and stays.
    assert_eq!(component_names(&kept), vec!["U1", "C1", "MECH1"]);
    assert_eq!(kept.component_pins("C1").unwrap().len(), 1);

    let mut removed = board();
    let options = CutoutOptions {
        remove_single_pin_components: true,
        ..ddr4_options()
    };
    let result =
        CutoutCore::run(&mut removed, &kernel, &signals(), &references(), &options).unwrap();
    assert_eq!(result.stats.deleted_single_pin_components, 1);
    assert_eq!(result.stats.deleted_components, 1);
    assert_eq!(component_names(&removed), vec!["U1", "MECH1"]);
    assert!(removed.component_pins("C1").unwrap().is_empty());
}

#[test]
fn test_thread_count_does_not_change_the_result() {
    let kernel = ClipperKernel::new();
    let run_with = |threads: usize| {
        let mut db = ddr4_board_with_model();
        let options = CutoutOptions {
            number_of_threads: threads,
            preserve_components_with_model: true,
            ..ddr4_options()
        };
        let result =
            CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options).unwrap();
        (db, result)
    };

    let (serial, serial_result) = run_with(1);
    let (parallel, parallel_result) = run_with(4);

    assert_eq!(serial_result.stats, parallel_result.stats);
    assert_eq!(serial_result.boundary, parallel_result.boundary);
    assert_eq!(serial.primitives().unwrap(), parallel.primitives().unwrap());
    assert_eq!(
        serial.padstack_instances().unwrap(),
        parallel.padstack_instances().unwrap()
    );
    assert_eq!(net_names(&serial), net_names(&parallel));
}

#[test]
fn test_compute_extent_leaves_layout_alone() {
    let db = ddr4_board();
    let kernel = ClipperKernel::new();
    let ring = CutoutCore::compute_extent(&db, &kernel, &signals(), &references(), &ddr4_options())
        .unwrap();
    let bbox = BBox::from_points(ring.iter().map(|p| Point::from(*p))).unwrap();
    assert!(bbox.min.x < 0.00995 && bbox.max.x > 0.03005);
    assert!(bbox.min.y < 0.01995 && bbox.max.y > 0.02105);
    assert_eq!(db.primitives().unwrap().len(), 5);
}
