//! Simple cutout example: cut a layout down to a few nets and print a summary.
//!
//! Usage: cargo run --example simple_cutout <layout.json> <signal,...> <reference,...>

use cutout::{ClipperKernel, CutoutCore, CutoutError, CutoutOptions, LayoutDatabase, LayoutStore};
use std::path::Path;

fn split(arg: Option<String>) -> Vec<String> {
    arg.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn main() -> Result<(), CutoutError> {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "board.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_cutout <layout.json> <signals> <references>");
        std::process::exit(1);
    }

    let signals = split(args.next());
    let references = split(args.next());
    let output = path.with_file_name(format!(
        "{}_cutout.json",
        path.file_stem().and_then(|s| s.to_str()).unwrap_or("layout")
    ));

    let kernel = ClipperKernel::new();
    let mut layout = LayoutDatabase::open(path)?;
    let before = layout.summary(&kernel)?;

    let options = CutoutOptions {
        expansion_size: 0.001,
        output_path: Some(output.clone()),
        ..Default::default()
    };
    let result = CutoutCore::run(&mut layout, &kernel, &signals, &references, &options)?;
    let after = layout.summary(&kernel)?;

    println!("Cutout of: {}", path.display());
    println!("  nets:       {} -> {}", before.nets, after.nets);
    println!("  primitives: {} -> {}", before.primitives, after.primitives);
    println!("  instances:  {} -> {}", before.padstack_instances, after.padstack_instances);
    println!("  boundary:   {} points", result.boundary.len());
    println!("  took:       {:.1} ms", result.elapsed_ms);
    println!("\nWritten to {}", output.display());
    Ok(())
}
