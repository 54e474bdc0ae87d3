//! Extent Builder
//!
//! Computes the clip polygon for one pipeline pass. A custom polygon always
//! wins; otherwise the policy in [`ExtentType`] is applied to the signal-net
//! geometry plus the keep boxes (small squares around pins and terminals that
//! must end up inside the cutout).
//!
//! Every extent is finished the same way: arcs are flattened, holes are kept
//! only when void inclusion is requested and they are large enough, and the
//! outline is optionally defeatured.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{
    largest_by_area, Contour, ExpandOptions, GeometryError, GeometryKernel, Point, Shape,
};
use crate::units::LengthUnit;

/// Voids smaller than this fraction of their parent are ignored.
pub const VOID_AREA_RATIO: f64 = 0.05;

/// Side of the square kept around a preserved pin or terminal, meters.
pub const KEEP_BOX_SIZE: f64 = 1e-4;

const CONFORMING_MAX_ITERATIONS: usize = 10;
const MIN_CONFORMING_STEP: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtentType {
    #[default]
    ConvexHull,
    Conforming,
    BoundingBox,
}

impl fmt::Display for ExtentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtentType::ConvexHull => "convex-hull",
            ExtentType::Conforming => "conforming",
            ExtentType::BoundingBox => "bounding-box",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ExtentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "convex-hull" | "convexhull" | "hull" => Ok(ExtentType::ConvexHull),
            "conforming" => Ok(ExtentType::Conforming),
            "bounding-box" | "boundingbox" | "bbox" => Ok(ExtentType::BoundingBox),
            other => Err(format!("unknown extent type '{}'", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtentError {
    #[error("no geometry found on the signal nets")]
    NoSignalGeometry,
    #[error("custom extent is degenerate")]
    DegenerateCustomExtent,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtentRequest {
    pub extent_type: ExtentType,
    pub expansion_size: f64,
    pub round_corner: bool,
    pub custom_extent: Option<Vec<[f64; 2]>>,
    pub custom_extent_units: LengthUnit,
    pub include_voids: bool,
    pub defeature: f64,
}

impl Default for ExtentRequest {
    fn default() -> Self {
        Self {
            extent_type: ExtentType::ConvexHull,
            expansion_size: 0.002,
            round_corner: false,
            custom_extent: None,
            custom_extent_units: LengthUnit::Meter,
            include_voids: false,
            defeature: 0.0,
        }
    }
}

/// Geometry the extent must cover.
#[derive(Debug, Clone, Default)]
pub struct ExtentInputs {
    /// Signal-net primitives; paths already converted to outlines.
    pub signal_shapes: Vec<Shape>,
    pub keep_boxes: Vec<Shape>,
}

impl ExtentInputs {
    fn candidates(&self) -> Vec<Shape> {
        self.signal_shapes
            .iter()
            .map(Shape::outline_only)
            .chain(self.keep_boxes.iter().cloned())
            .collect()
    }
}

/// Square of [`KEEP_BOX_SIZE`] around `center`.
pub fn keep_box(center: Point) -> Shape {
    Shape::new(Contour::square(center, KEEP_BOX_SIZE))
}

/// Closed outline ring as `[x, y]` pairs.
pub fn boundary_ring(shape: &Shape) -> Vec<[f64; 2]> {
    shape
        .outline
        .closed_points()
        .into_iter()
        .map(Point::to_array)
        .collect()
}

/// Drop vertices closer than `distance` to the previously kept one.
pub fn defeature(contour: &Contour, distance: f64) -> Contour {
    if distance <= 0.0 || contour.vertices.len() <= 3 {
        return contour.clone();
    }
    let mut kept: Vec<Point> = Vec::with_capacity(contour.vertices.len());
    for p in contour.points() {
        match kept.last() {
            Some(last) if last.distance(&p) < distance => {}
            _ => kept.push(p),
        }
    }
    while kept.len() > 3 {
        match (kept.first(), kept.last()) {
            (Some(first), Some(last)) if first.distance(last) < distance => {
                kept.pop();
            }
            _ => break,
        }
    }
    if kept.len() < 3 {
        return contour.clone();
    }
    Contour::from_points(kept)
}

pub struct ExtentBuilder<'k> {
    kernel: &'k dyn GeometryKernel,
    request: ExtentRequest,
}

impl<'k> ExtentBuilder<'k> {
    pub fn new(kernel: &'k dyn GeometryKernel, request: ExtentRequest) -> Self {
        Self { kernel, request }
    }

    pub fn request(&self) -> &ExtentRequest {
        &self.request
    }

    pub fn build(&self, inputs: &ExtentInputs) -> Result<Shape, ExtentError> {
        if let Some(points) = &self.request.custom_extent {
            return self.custom(points);
        }
        if inputs.signal_shapes.is_empty() {
            return Err(ExtentError::NoSignalGeometry);
        }
        let shape = match self.request.extent_type {
            ExtentType::BoundingBox => self.bounding_box(inputs)?,
            ExtentType::ConvexHull => self.convex_hull(inputs)?,
            ExtentType::Conforming => self.conforming(inputs)?,
        };
        Ok(self.finish(shape))
    }

    fn custom(&self, points: &[[f64; 2]]) -> Result<Shape, ExtentError> {
        let unit = self.request.custom_extent_units;
        let shape = Shape::from_points(points.iter().map(|p| {
            Point::new(unit.convert_to_meters(p[0]), unit.convert_to_meters(p[1]))
        }));
        if shape.is_empty() || shape.outline.signed_area() == 0.0 {
            return Err(ExtentError::DegenerateCustomExtent);
        }
        Ok(shape)
    }

    fn bounding_box(&self, inputs: &ExtentInputs) -> Result<Shape, ExtentError> {
        let bbox = self
            .kernel
            .bounding_box(&inputs.candidates())
            .ok_or(ExtentError::NoSignalGeometry)?;
        Ok(bbox.expanded(self.request.expansion_size).to_shape())
    }

    fn expand_options(&self) -> ExpandOptions {
        ExpandOptions {
            round_corner: self.request.round_corner,
            tolerance: self.kernel.arc_tolerance(),
            ..ExpandOptions::default()
        }
    }

    fn convex_hull(&self, inputs: &ExtentInputs) -> Result<Shape, ExtentError> {
        let hull = self.kernel.convex_hull(&inputs.candidates())?;
        if self.request.expansion_size <= 0.0 {
            return Ok(hull);
        }
        let grown = self
            .kernel
            .expand(&hull, self.request.expansion_size, self.expand_options())?;
        let largest = largest_by_area(self.kernel, &grown).ok_or_else(|| {
            GeometryError::Degenerate("hull expansion produced no polygon".to_string())
        })?;
        Ok(grown[largest].clone())
    }

    fn conforming(&self, inputs: &ExtentInputs) -> Result<Shape, ExtentError> {
        let candidates = inputs.candidates();
        let base = self.request.expansion_size;
        let increment = if base > 0.0 { base / 5.0 } else { MIN_CONFORMING_STEP };

        let mut united: Vec<Shape> = Vec::new();
        let mut step = base.max(0.0);
        for attempt in 0..CONFORMING_MAX_ITERATIONS {
            let mut grown = Vec::with_capacity(candidates.len());
            for shape in &candidates {
                if step > 0.0 {
                    grown.extend(self.kernel.expand(shape, step, self.expand_options())?);
                } else {
                    grown.push(shape.clone());
                }
            }
            united = self.kernel.unite(&grown)?;
            if united.len() == 1 {
                tracing::debug!(attempt, step, "conforming extent converged");
                break;
            }
            step += increment;
        }

        let mut extent = match united.len() {
            0 => return Err(ExtentError::NoSignalGeometry),
            1 => united.remove(0),
            n => {
                tracing::warn!(
                    pieces = n,
                    "Conforming extent did not converge; keeping the largest polygon"
                );
                let largest = largest_by_area(self.kernel, &united).unwrap_or(0);
                united.swap_remove(largest)
            }
        };

        if self.request.include_voids {
            extent = self.subtract_source_voids(extent, &inputs.signal_shapes)?;
        }
        Ok(extent)
    }

    /// Re-subtract voids that are a significant part of their source polygon.
    fn subtract_source_voids(&self, extent: Shape, sources: &[Shape]) -> Result<Shape, ExtentError> {
        let mut holes = Vec::new();
        for source in sources {
            let parent = self.kernel.area(&source.outline_only());
            if parent <= 0.0 {
                continue;
            }
            for void in &source.voids {
                let hole = Shape::new(void.clone());
                if self.kernel.area(&hole) >= VOID_AREA_RATIO * parent {
                    holes.push(hole);
                }
            }
        }
        if holes.is_empty() {
            return Ok(extent);
        }
        let mut pieces = self.kernel.subtract(&extent, &holes)?;
        let Some(largest) = largest_by_area(self.kernel, &pieces) else {
            return Err(ExtentError::Geometry(GeometryError::Boolean {
                op: "subtract",
                reason: "voids consume the whole extent".to_string(),
            }));
        };
        Ok(pieces.swap_remove(largest))
    }

    fn finish(&self, shape: Shape) -> Shape {
        let mut flat = self.kernel.flatten_arcs(&shape);
        if self.request.include_voids {
            let total = self.kernel.area(&flat.outline_only());
            let kernel = self.kernel;
            flat.voids.retain(|v| {
                kernel.area(&Shape::new(v.clone())) >= VOID_AREA_RATIO * total
            });
        } else {
            flat.voids.clear();
        }
        if self.request.defeature > 0.0 {
            flat.outline = defeature(&flat.outline, self.request.defeature);
        }
        flat
    }
}
