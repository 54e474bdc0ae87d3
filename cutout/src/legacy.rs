//! Legacy/native Cutout Adapter
//!
//! Hands the extent to the store's own cutout primitive instead of running
//! the classify-clip-rebuild pipeline. Single pass, no smart loop, and none
//! of the void-aware partial handling.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;

use crate::core::{CutoutError, CutoutOptions, CutoutResult};
use crate::extent::boundary_ring;
use crate::geometry::GeometryKernel;
use crate::layout::{LayoutStore, NativeCutoutRequest};
use crate::observe::Observer;
use crate::pipeline::{NetSets, PassStats, Pipeline, PipelineConfig};

pub fn run_native<S: LayoutStore>(
    store: &mut S,
    kernel: &dyn GeometryKernel,
    nets: &NetSets,
    options: &CutoutOptions,
    observer: &Observer,
) -> Result<CutoutResult, CutoutError> {
    let started_at = Utc::now();
    let timer = Instant::now();
    let observer = observer.for_iteration(1);

    let pipeline = Pipeline::new(
        kernel,
        PipelineConfig::from_options(options, options.expansion_size),
    );
    let (snapshot, preserved, extent) = pipeline.read_extent(&*store, nets, &observer)?;
    let extent = extent?;

    let mut included: Vec<String> = nets
        .signals
        .iter()
        .chain(preserved.nets.iter())
        .cloned()
        .collect();
    included.sort();
    let mut clip_nets: Vec<String> = nets.references.iter().cloned().collect();
    clip_nets.sort();
    let request = NativeCutoutRequest {
        extent: extent.clone(),
        included_nets: included,
        clip_nets,
        include_partial_instances: options.include_partial_instances,
    };

    let source_cell = store.active_cell_name()?;
    let cutout_cell = {
        let _phase = observer.phase("native");
        store.native_cutout(&request, kernel)?
    };
    tracing::info!(source = %source_cell, cutout = %cutout_cell, "Native cutout created");

    let write_phase = observer.phase("write");
    let mut copied = 0;
    for setup in store.setups(&source_cell)? {
        if !setup.kind.survives_native_cutout() {
            store.add_setup(&cutout_cell, setup)?;
            copied += 1;
        }
    }
    tracing::debug!(copied, "Copied setups the native cutout does not carry");

    let (summary, output_path) = match &options.output_path {
        Some(output) => {
            store.export_cell(&cutout_cell, output)?;
            let mut exported = S::open(output)?;
            let pruned = prune_empty_nets(&mut exported)?;
            exported.save()?;
            let summary = exported.summary(kernel)?;
            tracing::info!(pruned, "Exported cutout to {}", output.display());

            store.remove_cell(&cutout_cell)?;
            if store.path().is_some() {
                store.save()?;
            }
            if options.open_cutout_at_end {
                store.reopen(output)?;
            } else {
                store.close()?;
            }
            (summary, Some(output.clone()))
        }
        None => {
            store.set_active_cell(&cutout_cell)?;
            store.remove_cell(&source_cell)?;
            let summary = store.summary(kernel)?;
            let path = store.path();
            if path.is_some() {
                store.save()?;
                if !options.open_cutout_at_end {
                    store.close()?;
                }
            }
            (summary, path)
        }
    };
    drop(write_phase);

    let kept_nets = summary.nets;
    let stats = PassStats {
        deleted_nets: snapshot.nets.len().saturating_sub(kept_nets),
        deleted_instances: snapshot
            .instances
            .len()
            .saturating_sub(summary.padstack_instances),
        deleted_components: snapshot.components.len().saturating_sub(summary.components),
        ..Default::default()
    };

    Ok(CutoutResult {
        boundary: boundary_ring(&extent),
        iterations: 1,
        expansion_size: options.expansion_size,
        stats,
        timings: observer.timings(),
        run_id: observer.run_id().to_string(),
        started_at,
        elapsed_ms: timer.elapsed().as_secs_f64() * 1000.0,
        output_path,
    })
}

/// Delete nets with no primitive and no padstack instance left.
fn prune_empty_nets<S: LayoutStore>(store: &mut S) -> Result<usize, crate::layout::LayoutError> {
    let used: HashSet<String> = store
        .primitives()?
        .into_iter()
        .map(|p| p.net)
        .chain(store.padstack_instances()?.into_iter().map(|i| i.net))
        .collect();
    let empty: Vec<String> = store
        .nets()?
        .into_iter()
        .map(|n| n.name)
        .filter(|n| !used.contains(n))
        .collect();
    store.delete_nets(&empty)
}
