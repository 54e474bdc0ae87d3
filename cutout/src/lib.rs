//! Cutout - clip a PCB/package layout to a region and keep it simulatable
//!
//! This library extracts a bounded sub-region from a layout while keeping the
//! connectivity an electromagnetic solver needs: signal nets survive whole,
//! reference nets are clipped to the extent, everything else is removed.
//!
//! # Quick Start
//!
//! ```no_run
//! use cutout::{ClipperKernel, CutoutCore, CutoutOptions, LayoutDatabase, LayoutStore};
//! use std::path::Path;
//!
//! let mut layout = LayoutDatabase::open(Path::new("board.json")).unwrap();
//! let options = CutoutOptions {
//!     expansion_size: 0.001,
//!     ..Default::default()
//! };
//! let result = CutoutCore::run(
//!     &mut layout,
//!     &ClipperKernel::new(),
//!     &["DDR4_DQS0_P".to_string(), "DDR4_DQS0_N".to_string()],
//!     &["GND".to_string()],
//!     &options,
//! )
//! .unwrap();
//!
//! println!("{} boundary points", result.boundary.len());
//! ```
//!
//! # Features
//!
//! - **Extents**: convex hull, conforming, bounding box or a custom polygon
//! - **Pipeline**: read / parallel compute / serial write, void-aware re-clip
//! - **Smart cutout**: grow the extent until port references stay connected
//! - **Native cutout**: delegate to the store's own cutout primitive

pub mod core;
pub mod extent;
pub mod geometry;
pub mod layout;
pub mod legacy;
pub mod observe;
pub mod pipeline;
pub mod preserve;
pub mod smart;
pub mod units;

// Re-export main types
pub use core::{resolve_nets, CutoutCore, CutoutError, CutoutOptions, CutoutResult};
pub use extent::{ExtentBuilder, ExtentError, ExtentType};
pub use geometry::{ClipperKernel, GeometryError, GeometryKernel, Point, Shape};
pub use layout::{LayoutBuilder, LayoutDatabase, LayoutError, LayoutStore, LayoutSummary};
pub use observe::Observer;
pub use pipeline::{NetSets, PassStats, Pipeline, PipelineConfig};
pub use preserve::{PreservationResolver, PreservationSet};
pub use smart::{SmartCutout, SmartState};
pub use units::LengthUnit;

/// Open a JSON layout (convenience wrapper).
pub fn open_layout(path: &std::path::Path) -> Result<LayoutDatabase, LayoutError> {
    LayoutDatabase::open(path)
}
