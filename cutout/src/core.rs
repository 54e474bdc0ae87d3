//! Cutout options, errors and the public entry points.
//! No CLI or subscriber dependencies.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extent::{ExtentError, ExtentType};
use crate::geometry::{GeometryError, GeometryKernel};
use crate::layout::{LayoutError, LayoutStore};
use crate::observe::{Observer, PhaseTiming};
use crate::pipeline::{NetSets, PassStats, Pipeline, PipelineConfig};
use crate::smart::SmartCutout;
use crate::units::LengthUnit;

#[derive(Debug, thiserror::Error)]
pub enum CutoutError {
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Extent error: {0}")]
    Extent(#[from] ExtentError),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error(
        "Smart cutout failed at iteration {iteration} (expansion {expansion_size} m): \
         reference terminals not connected for ports {unconnected_ports:?}"
    )]
    ConnectivityPostCondition {
        iteration: usize,
        expansion_size: f64,
        unconnected_ports: Vec<String>,
    },
    #[error(
        "Cutout failed after {iterations} iteration(s); last expansion {expansion_size} m \
         ({elapsed_ms:.0} ms)"
    )]
    IterationBudgetExhausted {
        iterations: usize,
        expansion_size: f64,
        elapsed_ms: f64,
    },
}

/// Options for a cutout run (CLI or library).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoutOptions {
    pub extent_type: ExtentType,
    /// Meters.
    pub expansion_size: f64,
    pub use_round_corner: bool,
    /// Closed polygon in `custom_extent_units`; wins over `extent_type`.
    pub custom_extent: Option<Vec<[f64; 2]>>,
    pub custom_extent_units: LengthUnit,
    pub include_voids_in_extents: bool,
    pub open_cutout_at_end: bool,
    pub smart_cutout: bool,
    pub expansion_factor: f64,
    pub maximum_iterations: usize,
    pub number_of_threads: usize,
    pub remove_single_pin_components: bool,
    pub preserve_components_with_model: bool,
    pub check_terminals: bool,
    pub include_pingroups: bool,
    pub simple_pad_check: bool,
    pub keep_lines_as_path: bool,
    pub include_partial_instances: bool,
    pub keep_voids: bool,
    pub output_path: Option<PathBuf>,
    pub use_native_cutout: bool,
    /// Minimum vertex spacing of the final extent, meters. Zero disables.
    pub extent_defeature: f64,
}

impl Default for CutoutOptions {
    fn default() -> Self {
        Self {
            extent_type: ExtentType::ConvexHull,
            expansion_size: 0.002,
            use_round_corner: false,
            custom_extent: None,
            custom_extent_units: LengthUnit::Meter,
            include_voids_in_extents: false,
            open_cutout_at_end: true,
            smart_cutout: false,
            expansion_factor: 0.0,
            maximum_iterations: 10,
            number_of_threads: 4,
            remove_single_pin_components: false,
            preserve_components_with_model: false,
            check_terminals: false,
            include_pingroups: false,
            simple_pad_check: true,
            keep_lines_as_path: false,
            include_partial_instances: false,
            keep_voids: true,
            output_path: None,
            use_native_cutout: false,
            extent_defeature: 0.0,
        }
    }
}

impl CutoutOptions {
    pub fn validate(&self) -> Result<(), CutoutError> {
        if !self.expansion_size.is_finite() || self.expansion_size < 0.0 {
            return Err(CutoutError::InvalidOptions(format!(
                "expansion_size must be a non-negative length, got {}",
                self.expansion_size
            )));
        }
        if !self.expansion_factor.is_finite() || self.expansion_factor < 0.0 {
            return Err(CutoutError::InvalidOptions(format!(
                "expansion_factor must be non-negative, got {}",
                self.expansion_factor
            )));
        }
        if self.extent_defeature < 0.0 {
            return Err(CutoutError::InvalidOptions(
                "extent_defeature must be non-negative".to_string(),
            ));
        }
        if self.number_of_threads == 0 {
            return Err(CutoutError::InvalidOptions(
                "number_of_threads must be at least 1".to_string(),
            ));
        }
        if self.maximum_iterations == 0 {
            return Err(CutoutError::InvalidOptions(
                "maximum_iterations must be at least 1".to_string(),
            ));
        }
        if let Some(points) = &self.custom_extent {
            let mut distinct: Vec<[f64; 2]> = Vec::new();
            for p in points {
                if !distinct.iter().any(|q| q == p) {
                    distinct.push(*p);
                }
            }
            if distinct.len() < 3 {
                return Err(CutoutError::InvalidOptions(format!(
                    "custom_extent needs at least 3 distinct points, got {}",
                    distinct.len()
                )));
            }
        }
        Ok(())
    }

    /// Iterations the controller may spend.
    pub fn iteration_budget(&self) -> usize {
        if self.smart_cutout {
            self.maximum_iterations
        } else {
            1
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutoutResult {
    /// Closed boundary ring of the final extent, meters.
    pub boundary: Vec<[f64; 2]>,
    pub iterations: usize,
    pub expansion_size: f64,
    pub stats: PassStats,
    pub timings: Vec<PhaseTiming>,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: f64,
    /// Where the result was persisted, if anywhere.
    pub output_path: Option<PathBuf>,
}

/// Signal/reference selection with the default signal list applied.
pub fn resolve_nets<S: LayoutStore>(
    store: &S,
    signals: &[String],
    references: &[String],
) -> Result<NetSets, CutoutError> {
    let references: HashSet<String> = references.iter().cloned().collect();
    let signals: HashSet<String> = if signals.is_empty() {
        let all: HashSet<String> = store
            .nets()?
            .into_iter()
            .map(|n| n.name)
            .filter(|n| !references.contains(n))
            .collect();
        tracing::info!("No signal nets given; using {} non-reference nets", all.len());
        all
    } else {
        signals
            .iter()
            .filter(|s| !references.contains(*s))
            .cloned()
            .collect()
    };
    Ok(NetSets {
        signals,
        references,
    })
}

/// Cutout API used by both library callers and the CLI.
pub struct CutoutCore;

impl CutoutCore {
    /// Cut the active cell of `store` down to the computed extent.
    pub fn run<S: LayoutStore>(
        store: &mut S,
        kernel: &dyn GeometryKernel,
        signals: &[String],
        references: &[String],
        options: &CutoutOptions,
    ) -> Result<CutoutResult, CutoutError> {
        Self::run_observed(store, kernel, signals, references, options, &Observer::new())
    }

    pub fn run_observed<S: LayoutStore>(
        store: &mut S,
        kernel: &dyn GeometryKernel,
        signals: &[String],
        references: &[String],
        options: &CutoutOptions,
        observer: &Observer,
    ) -> Result<CutoutResult, CutoutError> {
        options.validate()?;
        let nets = resolve_nets(store, signals, references)?;
        tracing::info!(
            run = observer.run_id(),
            signals = nets.signals.len(),
            references = nets.references.len(),
            native = options.use_native_cutout,
            smart = options.smart_cutout,
            "Starting cutout"
        );
        if options.use_native_cutout {
            return crate::legacy::run_native(store, kernel, &nets, options, observer);
        }
        SmartCutout::new(store, kernel, nets, options.clone(), observer.clone()).run()
    }

    /// Extent boundary only; the layout is not modified.
    pub fn compute_extent<S: LayoutStore>(
        store: &S,
        kernel: &dyn GeometryKernel,
        signals: &[String],
        references: &[String],
        options: &CutoutOptions,
    ) -> Result<Vec<[f64; 2]>, CutoutError> {
        options.validate()?;
        let nets = resolve_nets(store, signals, references)?;
        let config = PipelineConfig::from_options(options, options.expansion_size);
        let pipeline = Pipeline::new(kernel, config);
        let (_, _, extent) = pipeline.read_extent(store, &nets, &Observer::new())?;
        Ok(crate::extent::boundary_ring(&extent.map_err(CutoutError::Extent)?))
    }
}
