//! Classify-Clip-Rebuild Pipeline
//!
//! One cutout pass in three strict phases:
//!
//! 1. **READ** snapshots the active cell, resolves preserved pins and nets
//!    and builds the extent.
//! 2. **COMPUTE** classifies every padstack instance and primitive on a
//!    `rayon` pool. Each candidate yields `Result<ClipDecision, ClipError>`;
//!    failures fall back to keeping the candidate unclipped.
//! 3. **WRITE** applies the resulting plan serially (see [`write`]).
//!
//! A pass whose extent cannot be built returns an outcome with an empty
//! boundary and writes nothing.

pub mod classify;
pub mod snapshot;
pub mod write;

pub use classify::{ClassifyOptions, Classifier, ClipDecision, ClipError, PadPlacement, Replacement};
pub use snapshot::{primitive_shapes, LayoutSnapshot};
pub use write::WritePlan;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::CutoutOptions;
use crate::extent::{boundary_ring, keep_box, ExtentBuilder, ExtentError, ExtentInputs, ExtentRequest};
use crate::geometry::{GeometryKernel, Shape};
use crate::layout::{LayoutError, LayoutStore, ObjectId};
use crate::observe::{Observer, PhaseTiming};
use crate::preserve::{PreservationResolver, PreservationSet};

/// Signal and reference net names for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetSets {
    pub signals: HashSet<String>,
    pub references: HashSet<String>,
}

impl NetSets {
    pub fn new<I, J, S, T>(signals: I, references: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            signals: signals.into_iter().map(Into::into).collect(),
            references: references.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub extent: ExtentRequest,
    /// Add keep boxes around port reference terminals.
    pub terminal_boxes: bool,
    pub preservation: PreservationResolver,
    pub classify: ClassifyOptions,
    pub number_of_threads: usize,
    pub remove_single_pin_components: bool,
    /// Save-as target at the end of WRITE.
    pub output_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_options(&CutoutOptions::default(), CutoutOptions::default().expansion_size)
    }
}

impl PipelineConfig {
    /// Pass configuration for `expansion_size`; persistence is left to the caller.
    pub fn from_options(options: &CutoutOptions, expansion_size: f64) -> Self {
        Self {
            extent: ExtentRequest {
                extent_type: options.extent_type,
                expansion_size,
                round_corner: options.use_round_corner,
                custom_extent: options.custom_extent.clone(),
                custom_extent_units: options.custom_extent_units,
                include_voids: options.include_voids_in_extents,
                defeature: options.extent_defeature,
            },
            terminal_boxes: options.smart_cutout || options.check_terminals,
            preservation: PreservationResolver {
                preserve_components_with_model: options.preserve_components_with_model,
                include_pingroups: options.include_pingroups,
                check_terminals: options.check_terminals,
            },
            classify: ClassifyOptions {
                simple_pad_check: options.simple_pad_check,
                include_partial_instances: options.include_partial_instances,
                keep_lines_as_path: options.keep_lines_as_path,
                keep_voids: options.keep_voids,
            },
            number_of_threads: options.number_of_threads.max(1),
            remove_single_pin_components: options.remove_single_pin_components,
            output_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    pub deleted_nets: usize,
    pub deleted_instances: usize,
    pub deleted_primitives: usize,
    pub deleted_voids: usize,
    pub created_polygons: usize,
    pub created_paths: usize,
    pub deleted_components: usize,
    pub deleted_single_pin_components: usize,
    /// Candidates kept unclipped after a geometry error.
    pub clip_failures: usize,
}

#[derive(Debug)]
pub enum PassStatus {
    Completed,
    ExtentFailed(ExtentError),
    WriteFailed(LayoutError),
}

#[derive(Debug)]
pub struct PassOutcome {
    pub status: PassStatus,
    /// Closed ring; empty when the pass failed.
    pub boundary: Vec<[f64; 2]>,
    pub extent: Option<Shape>,
    pub stats: PassStats,
    pub timings: Vec<PhaseTiming>,
}

impl PassOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, PassStatus::Completed) && !self.boundary.is_empty()
    }
}

pub struct Pipeline<'k> {
    kernel: &'k dyn GeometryKernel,
    config: PipelineConfig,
}

impl<'k> Pipeline<'k> {
    pub fn new(kernel: &'k dyn GeometryKernel, config: PipelineConfig) -> Self {
        Self { kernel, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// READ phase. Layout errors abort; an extent failure is handed back.
    pub fn read_extent<S: LayoutStore + ?Sized>(
        &self,
        store: &S,
        nets: &NetSets,
        observer: &Observer,
    ) -> Result<(LayoutSnapshot, PreservationSet, Result<Shape, ExtentError>), LayoutError> {
        let _phase = observer.phase("read");
        let snapshot = LayoutSnapshot::read(store)?;
        let preserved = self.config.preservation.resolve(&snapshot, nets);
        let inputs = self.extent_inputs(&snapshot, nets, &preserved);
        let extent = ExtentBuilder::new(self.kernel, self.config.extent.clone()).build(&inputs);
        Ok((snapshot, preserved, extent))
    }

    fn extent_inputs(
        &self,
        snapshot: &LayoutSnapshot,
        nets: &NetSets,
        preserved: &PreservationSet,
    ) -> ExtentInputs {
        let mut inputs = ExtentInputs::default();
        for primitive in snapshot
            .primitives
            .iter()
            .filter(|p| nets.signals.contains(&p.net))
        {
            match primitive_shapes(primitive, self.kernel) {
                Ok(shapes) => inputs.signal_shapes.extend(shapes),
                Err(e) => tracing::warn!(
                    candidate = primitive.id,
                    error = %e,
                    "Skipping signal primitive in extent"
                ),
            }
        }
        inputs.keep_boxes = preserved
            .pin_positions(snapshot)
            .into_iter()
            .map(keep_box)
            .collect();
        if self.config.terminal_boxes {
            inputs.keep_boxes.extend(
                snapshot
                    .ports
                    .iter()
                    .filter_map(|p| p.reference.as_ref())
                    .map(|t| keep_box(t.position)),
            );
        }
        inputs
    }

    /// COMPUTE phase over the snapshot.
    pub fn compute(
        &self,
        snapshot: &LayoutSnapshot,
        extent: &Shape,
        nets: &NetSets,
        preserved: &PreservationSet,
        iteration: usize,
    ) -> WritePlan {
        let classifier = Classifier::new(
            self.kernel,
            extent,
            nets,
            preserved,
            self.config.classify,
            iteration,
        );

        let classify_all = || {
            let instances: Vec<(ObjectId, Result<ClipDecision, ClipError>)> = snapshot
                .instances
                .par_iter()
                .map(|i| (i.id, classifier.classify_instance(i, snapshot.definition(&i.definition))))
                .collect();
            let primitives: Vec<(usize, Result<ClipDecision, ClipError>)> = snapshot
                .primitives
                .par_iter()
                .enumerate()
                .map(|(idx, p)| (idx, classifier.classify_primitive(p)))
                .collect();
            (instances, primitives)
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.number_of_threads)
            .thread_name(|i| format!("cutout-compute-{}", i))
            .build();
        let (instance_results, primitive_results) = match pool {
            Ok(pool) => pool.install(classify_all),
            Err(e) => {
                tracing::warn!("Could not build compute pool ({}); using the global pool", e);
                classify_all()
            }
        };

        let mut plan = WritePlan {
            nets: snapshot
                .nets
                .iter()
                .filter(|n| !classifier.keeps_net(&n.name))
                .map(|n| n.name.clone())
                .collect(),
            ..Default::default()
        };

        for (id, result) in instance_results {
            match result {
                Ok(ClipDecision::Delete) => plan.instances.push(id),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(iteration, candidate = e.candidate, error = %e, "Pad check failed; keeping instance");
                    plan.clip_failures += 1;
                }
            }
        }

        for (idx, result) in primitive_results {
            let primitive = &snapshot.primitives[idx];
            match result {
                Ok(ClipDecision::Keep) => {}
                Ok(ClipDecision::Delete) => {
                    plan.primitives.push(primitive.id);
                    plan.voids += primitive.void_count();
                }
                Ok(ClipDecision::Replace(pieces)) => {
                    plan.primitives.push(primitive.id);
                    plan.voids += primitive.void_count();
                    plan.replacements.extend(
                        pieces
                            .into_iter()
                            .map(|r| (primitive.layer.clone(), primitive.net.clone(), r)),
                    );
                }
                Err(e) => {
                    tracing::warn!(iteration, candidate = e.candidate, net = %primitive.net, error = %e, "Clip failed; keeping primitive unclipped");
                    plan.clip_failures += 1;
                }
            }
        }

        let deleted: HashSet<ObjectId> = plan.instances.iter().copied().collect();
        let pins = snapshot.pins_by_component();
        let remaining: HashMap<&str, Vec<ObjectId>> = pins
            .iter()
            .map(|(name, ids)| {
                (*name, ids.iter().copied().filter(|id| !deleted.contains(id)).collect())
            })
            .collect();
        for component in &snapshot.components {
            // Pinless components were not emptied by this pass.
            let had_pins = pins
                .get(component.name.as_str())
                .is_some_and(|ids| !ids.is_empty());
            if !had_pins {
                continue;
            }
            let left = remaining
                .get(component.name.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if left.is_empty() {
                plan.components.push(component.name.clone());
            } else if self.config.remove_single_pin_components
                && component.is_passive()
                && left.len() == 1
                && !preserved.keeps_pin(left[0])
            {
                plan.single_pin_components.push(component.name.clone());
            }
        }
        plan.components.sort();
        plan.single_pin_components.sort();
        plan
    }

    /// Run READ, COMPUTE and WRITE once.
    pub fn run_pass<S: LayoutStore + ?Sized>(
        &self,
        store: &mut S,
        nets: &NetSets,
        observer: &Observer,
    ) -> Result<PassOutcome, LayoutError> {
        let iteration = observer.iteration();
        let (snapshot, preserved, extent) = self.read_extent(store, nets, observer)?;
        let extent = match extent {
            Ok(extent) => extent,
            Err(e) => {
                tracing::warn!(iteration, error = %e, "Extent computation failed");
                return Ok(PassOutcome {
                    status: PassStatus::ExtentFailed(e),
                    boundary: Vec::new(),
                    extent: None,
                    stats: PassStats::default(),
                    timings: observer.timings_for(iteration),
                });
            }
        };

        let plan = {
            let _phase = observer.phase("compute");
            self.compute(&snapshot, &extent, nets, &preserved, iteration)
        };
        tracing::info!(
            iteration,
            nets = plan.nets.len(),
            instances = plan.instances.len(),
            primitives = plan.primitives.len(),
            replacements = plan.replacements.len(),
            clip_failures = plan.clip_failures,
            "Compute phase done"
        );

        let written = {
            let _phase = observer.phase("write");
            write::apply(store, plan, self.config.output_path.as_deref())
        };
        let (status, stats, boundary) = match written {
            Ok(stats) => (PassStatus::Completed, stats, boundary_ring(&extent)),
            Err(e) => {
                tracing::warn!(iteration, error = %e, "Write phase failed");
                (PassStatus::WriteFailed(e), PassStats::default(), Vec::new())
            }
        };
        Ok(PassOutcome {
            status,
            boundary,
            extent: Some(extent),
            stats,
            timings: observer.timings_for(iteration),
        })
    }
}
