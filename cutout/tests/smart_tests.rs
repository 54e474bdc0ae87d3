//! Integration tests for the smart expansion loop

mod common;

use common::*;
use cutout::geometry::Point;
use cutout::layout::Terminal;
use cutout::{ClipperKernel, CutoutCore, CutoutError, CutoutOptions, LayoutDatabase, LayoutStore};

#[test]
fn test_smart_cutout_succeeds_with_connected_reference() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ddr4.json");
    let mut db = ddr4_board();
    db.save_as(&path).unwrap();
    let kernel = ClipperKernel::new();

    let options = CutoutOptions {
        smart_cutout: true,
        expansion_size: 0.001,
        maximum_iterations: 5,
        ..Default::default()
    };
    let result = CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options).unwrap();

    assert_eq!(result.iterations, 1);
    assert!((result.expansion_size - 0.001).abs() < 1e-12);
    assert!(db.are_port_references_connected(&kernel).unwrap());
    assert!(!dir.path().join("ddr4_smart_cutout_temp.json").exists());

    // Saved back in place.
    assert_eq!(result.output_path.as_deref(), Some(path.as_path()));
    let on_disk = LayoutDatabase::open(&path).unwrap();
    assert_eq!(on_disk.nets().unwrap().len(), 3);
}

#[test]
fn test_smart_cutout_closes_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ddr4.json");
    let output = dir.path().join("out.json");
    let mut db = ddr4_board();
    db.save_as(&path).unwrap();

    let options = CutoutOptions {
        smart_cutout: true,
        expansion_size: 0.001,
        open_cutout_at_end: false,
        output_path: Some(output.clone()),
        ..Default::default()
    };
    CutoutCore::run(&mut db, &ClipperKernel::new(), &signals(), &references(), &options).unwrap();

    assert!(!db.is_open());
    assert!(output.exists());
    assert_eq!(LayoutDatabase::open(&path).unwrap().nets().unwrap().len(), 5);
}

#[test]
fn test_unconnected_reference_fails_and_restores() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ddr4.json");
    // P2's reference lands between the traces on TOP where there is no GND copper.
    let mut db = ddr4_builder()
        .port(
            "P2",
            Terminal::new(DQS_N, "TOP", Point::new(0.03, 0.021)),
            Some(Terminal::new("GND", "TOP", Point::new(0.02, 0.0205))),
        )
        .build();
    db.save_as(&path).unwrap();
    let before = db.primitives().unwrap();
    let kernel = ClipperKernel::new();

    let options = CutoutOptions {
        smart_cutout: true,
        expansion_size: 0.001,
        ..Default::default()
    };
    let err = CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options).unwrap_err();

    match err {
        CutoutError::ConnectivityPostCondition {
            iteration,
            unconnected_ports,
            ..
        } => {
            assert_eq!(iteration, 1);
            assert_eq!(unconnected_ports, vec!["P2".to_string()]);
        }
        other => panic!("expected a connectivity failure, got {other}"),
    }
    assert_eq!(db.primitives().unwrap(), before);
    assert_eq!(db.path(), Some(path.clone()));
    assert!(!dir.path().join("ddr4_smart_cutout_temp.json").exists());
}

#[test]
fn test_expansion_factor_sizes_from_stackup() {
    let mut db = ddr4_board();
    let kernel = ClipperKernel::new();
    // Widest port trace is 0.1 mm, the dielectric 0.1 mm: base expansion 1 mm.
    let options = CutoutOptions {
        expansion_factor: 10.0,
        ..Default::default()
    };
    let result = CutoutCore::run(&mut db, &kernel, &signals(), &references(), &options).unwrap();
    assert_eq!(result.iterations, 1);
    assert!((result.expansion_size - 0.001).abs() < 1e-12);
}
