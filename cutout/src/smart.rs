//! Smart Expansion Controller
//!
//! Wraps the pipeline in a bounded retry loop:
//!
//! ```text
//! Idle -> Attempting(1) -> Attempting(2) -> ... -> Succeeded | Failed
//! ```
//!
//! Attempt `k` uses `k` times the base expansion. A pass that produces no
//! boundary (extent failure or a failed write) restores the pre-attempt
//! snapshot and retries, so an exhausted budget leaves the store as it was.
//! In smart mode a successful pass must also leave every port reference
//! terminal connected; if it does not, the run fails at once.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;

use crate::core::{CutoutError, CutoutOptions, CutoutResult};
use crate::geometry::GeometryKernel;
use crate::layout::{LayoutError, LayoutStore, PrimitiveGeometry};
use crate::observe::Observer;
use crate::pipeline::{LayoutSnapshot, NetSets, Pipeline, PipelineConfig};

/// Growth per attempt when the base expansion is zero, meters.
pub const MIN_GROWTH_STEP: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmartState {
    Idle,
    Attempting { iteration: usize, expansion_size: f64 },
    Succeeded { iteration: usize, expansion_size: f64 },
    Failed { iterations: usize, expansion_size: f64 },
}

impl SmartState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SmartState::Succeeded { .. } | SmartState::Failed { .. })
    }
}

/// Expansion used by attempt `attempt` (1-based).
pub fn expansion_for_attempt(base: f64, attempt: usize) -> f64 {
    let attempt = attempt.max(1);
    if base > 0.0 {
        base * attempt as f64
    } else {
        MIN_GROWTH_STEP * (attempt - 1) as f64
    }
}

/// `<stem>_smart_cutout_temp.json` next to the layout, or in the temp dir.
pub fn temp_snapshot_path(layout: Option<&Path>, run_id: &str) -> PathBuf {
    match layout {
        Some(path) => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("layout");
            path.with_file_name(format!("{}_smart_cutout_temp.json", stem))
        }
        None => std::env::temp_dir().join(format!("{}_smart_cutout_temp.json", run_id)),
    }
}

pub struct SmartCutout<'a, S: LayoutStore> {
    store: &'a mut S,
    kernel: &'a dyn GeometryKernel,
    nets: NetSets,
    options: CutoutOptions,
    observer: Observer,
    state: SmartState,
    attempted: Vec<f64>,
}

impl<'a, S: LayoutStore> SmartCutout<'a, S> {
    pub fn new(
        store: &'a mut S,
        kernel: &'a dyn GeometryKernel,
        nets: NetSets,
        options: CutoutOptions,
        observer: Observer,
    ) -> Self {
        Self {
            store,
            kernel,
            nets,
            options,
            observer,
            state: SmartState::Idle,
            attempted: Vec::new(),
        }
    }

    pub fn state(&self) -> SmartState {
        self.state
    }

    /// Expansion sizes in attempt order.
    pub fn attempted_expansions(&self) -> &[f64] {
        &self.attempted
    }

    /// Base expansion: either the configured size or
    /// `expansion_factor * max(widest port-net trace, thickest dielectric)`.
    pub fn initial_expansion(&self) -> Result<f64, LayoutError> {
        if self.options.expansion_factor <= 0.0 {
            return Ok(self.options.expansion_size);
        }
        let snapshot = LayoutSnapshot::read(&*self.store)?;
        let port_nets: Vec<&str> = snapshot
            .ports
            .iter()
            .map(|p| p.terminal.net.as_str())
            .filter(|n| self.nets.signals.contains(*n))
            .collect();
        let widest = snapshot
            .primitives
            .iter()
            .filter(|p| port_nets.contains(&p.net.as_str()))
            .filter_map(|p| match &p.geometry {
                PrimitiveGeometry::Path(path) => Some(path.width),
                PrimitiveGeometry::Polygon(_) => None,
            })
            .fold(0.0, f64::max);
        let dielectric = snapshot.max_dielectric_thickness();
        let size = self.options.expansion_factor * widest.max(dielectric);
        if size <= 0.0 {
            tracing::warn!(
                "expansion_factor set but no port trace or dielectric found; using expansion_size"
            );
            return Ok(self.options.expansion_size);
        }
        tracing::info!(widest, dielectric, size, "Initial smart expansion");
        Ok(size)
    }

    pub fn run(&mut self) -> Result<CutoutResult, CutoutError> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let budget = self.options.iteration_budget();
        let base = self.initial_expansion()?;
        let original_path = self.store.path();

        // Failed passes restore this snapshot, smart mode or not.
        let snapshot = temp_snapshot_path(original_path.as_deref(), self.observer.run_id());
        self.store.snapshot(&snapshot)?;
        tracing::debug!("Snapshot written to {}", snapshot.display());

        let result = self.iterate(base, budget, &snapshot, original_path, started_at, timer);

        if let Err(e) = std::fs::remove_file(&snapshot) {
            tracing::debug!("Could not remove {}: {}", snapshot.display(), e);
        }
        result
    }

    fn iterate(
        &mut self,
        base: f64,
        budget: usize,
        snapshot: &Path,
        original_path: Option<PathBuf>,
        started_at: chrono::DateTime<Utc>,
        timer: Instant,
    ) -> Result<CutoutResult, CutoutError> {
        let mut expansion_size = base;
        for iteration in 1..=budget {
            expansion_size = expansion_for_attempt(base, iteration);
            self.state = SmartState::Attempting {
                iteration,
                expansion_size,
            };
            self.attempted.push(expansion_size);
            tracing::info!(iteration, expansion_size, "Cutout attempt");

            let observer = self.observer.for_iteration(iteration);
            let pipeline = Pipeline::new(
                self.kernel,
                PipelineConfig::from_options(&self.options, expansion_size),
            );
            let outcome = pipeline.run_pass(&mut *self.store, &self.nets, &observer)?;

            if outcome.is_success() {
                if self.options.smart_cutout {
                    let _phase = observer.phase("connectivity");
                    let unconnected = self.store.unconnected_port_references(self.kernel)?;
                    if !unconnected.is_empty() {
                        self.state = SmartState::Failed {
                            iterations: iteration,
                            expansion_size,
                        };
                        self.store.restore(snapshot)?;
                        return Err(CutoutError::ConnectivityPostCondition {
                            iteration,
                            expansion_size,
                            unconnected_ports: unconnected,
                        });
                    }
                }
                self.state = SmartState::Succeeded {
                    iteration,
                    expansion_size,
                };
                let output_path = self.persist(original_path)?;
                let elapsed_ms = timer.elapsed().as_secs_f64() * 1000.0;
                tracing::info!(iteration, expansion_size, elapsed_ms, "Cutout succeeded");
                return Ok(CutoutResult {
                    boundary: outcome.boundary,
                    iterations: iteration,
                    expansion_size,
                    stats: outcome.stats,
                    timings: self.observer.timings(),
                    run_id: self.observer.run_id().to_string(),
                    started_at,
                    elapsed_ms,
                    output_path,
                });
            }

            tracing::warn!(iteration, expansion_size, status = ?outcome.status, "Cutout pass failed");
            self.store.restore(snapshot)?;
        }

        self.state = SmartState::Failed {
            iterations: budget,
            expansion_size,
        };
        Err(CutoutError::IterationBudgetExhausted {
            iterations: budget,
            expansion_size,
            elapsed_ms: timer.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Save to the output path or back in place; close unless asked to keep it open.
    fn persist(&mut self, original: Option<PathBuf>) -> Result<Option<PathBuf>, LayoutError> {
        let target = self.options.output_path.clone().or(original);
        match &target {
            Some(path) => {
                self.store.save_as(path)?;
                tracing::info!("Saved cutout to {}", path.display());
                if !self.options.open_cutout_at_end {
                    self.store.close()?;
                }
            }
            None => tracing::warn!("Layout has no file path; cutout kept in memory only"),
        }
        Ok(target)
    }
}
