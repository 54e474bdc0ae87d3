//! Geometry kernel interface
//!
//! The cutout engine never performs polygon booleans itself. It talks to a
//! [`GeometryKernel`], a small capability set (construction, hull, expand,
//! boolean ops, intersection classification) with one adapter per backend.
//! [`ClipperKernel`] is the adapter shipped with this crate.
//!
//! Contours are stored as bulge vertices: a non-zero `bulge` on a vertex means
//! the edge to the next vertex is a circular arc (`bulge = tan(sweep / 4)`,
//! positive for counter-clockwise).

pub mod arc;
pub mod clipper;

pub use clipper::ClipperKernel;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relative tolerance used when comparing areas produced by boolean operations.
pub const AREA_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
    #[error("boolean operation '{op}' failed: {reason}")]
    Boolean { op: &'static str, reason: String },
    #[error("unsupported input: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Point::new(p[0], p[1])
    }
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// Contour vertex. `bulge` describes the edge leaving this vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bulge: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, bulge: 0.0 }
    }

    pub fn arc(x: f64, y: f64, bulge: f64) -> Self {
        Self { x, y, bulge }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Point> for Vertex {
    fn from(p: Point) -> Self {
        Vertex::new(p.x, p.y)
    }
}

/// A closed ring of vertices. The closing edge is implicit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contour {
    pub vertices: Vec<Vertex>,
}

impl Contour {
    /// Build a contour from points, dropping a repeated closing point.
    pub fn from_points<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let mut vertices: Vec<Vertex> = points
            .into_iter()
            .map(|p| Vertex::from(p.into()))
            .collect();
        if vertices.len() > 1 {
            let first = vertices[0];
            let last = vertices[vertices.len() - 1];
            if first.x == last.x && first.y == last.y {
                vertices.pop();
            }
        }
        Self { vertices }
    }

    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::from_points([
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    /// Square of side `size` centred on `center`.
    pub fn square(center: Point, size: f64) -> Self {
        let h = size / 2.0;
        Self::rectangle(
            Point::new(center.x - h, center.y - h),
            Point::new(center.x + h, center.y + h),
        )
    }

    pub fn points(&self) -> Vec<Point> {
        self.vertices.iter().map(Vertex::point).collect()
    }

    /// Points with the first point repeated at the end.
    pub fn closed_points(&self) -> Vec<Point> {
        let mut pts = self.points();
        if let Some(first) = pts.first().copied() {
            pts.push(first);
        }
        pts
    }

    pub fn has_arcs(&self) -> bool {
        self.vertices.iter().any(|v| v.bulge != 0.0)
    }

    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Signed shoelace area of the straight-edge ring.
    pub fn signed_area(&self) -> f64 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum / 2.0
    }

    pub fn bounding_box(&self) -> Option<BBox> {
        BBox::from_points(self.vertices.iter().map(Vertex::point))
    }
}

/// A polygon with optional voids.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub outline: Contour,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub voids: Vec<Contour>,
}

impl Shape {
    pub fn new(outline: Contour) -> Self {
        Self {
            outline,
            voids: Vec::new(),
        }
    }

    pub fn with_voids(outline: Contour, voids: Vec<Contour>) -> Self {
        Self { outline, voids }
    }

    pub fn from_points<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        Self::new(Contour::from_points(points))
    }

    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::new(Contour::rectangle(min, max))
    }

    pub fn has_arcs(&self) -> bool {
        self.outline.has_arcs() || self.voids.iter().any(Contour::has_arcs)
    }

    pub fn is_empty(&self) -> bool {
        self.outline.is_degenerate()
    }

    pub fn add_hole(&mut self, hole: Contour) {
        self.voids.push(hole);
    }

    pub fn bounding_box(&self) -> Option<BBox> {
        self.outline.bounding_box()
    }

    /// Same outline, no voids.
    pub fn outline_only(&self) -> Shape {
        Shape::new(self.outline.clone())
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BBox {
            min: first,
            max: first,
        };
        for p in iter {
            bbox.include(p);
        }
        Some(bbox)
    }

    pub fn include(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn union(&self, other: &BBox) -> BBox {
        let mut out = *self;
        out.include(other.min);
        out.include(other.max);
        out
    }

    pub fn expanded(&self, by: f64) -> BBox {
        BBox {
            min: Point::new(self.min.x - by, self.min.y - by),
            max: Point::new(self.max.x + by, self.max.y + by),
        }
    }

    pub fn overlaps(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    pub fn contains_bbox(&self, other: &BBox) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn to_shape(&self) -> Shape {
        Shape::rectangle(self.min, self.max)
    }
}

/// How shape `a` relates to shape `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntersectionType {
    Disjoint,
    /// `a` lies entirely inside `b`.
    AInB,
    /// `b` lies entirely inside `a`.
    BInA,
    Overlapping,
}

/// Path end cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapStyle {
    #[default]
    Round,
    Flat,
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpandOptions {
    pub round_corner: bool,
    /// Upper bound on how far a mitred corner may stick out.
    pub max_corner_extension: f64,
    /// Arc approximation tolerance for rounded corners.
    pub tolerance: f64,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            round_corner: false,
            max_corner_extension: 0.0,
            tolerance: 1e-7,
        }
    }
}

/// Capability set the cutout engine needs from a polygon backend.
///
/// Implementations must be stateless with respect to their inputs; the
/// pipeline calls them concurrently from its worker pool.
pub trait GeometryKernel: Send + Sync {
    fn convex_hull(&self, shapes: &[Shape]) -> Result<Shape, GeometryError>;

    /// Grow (positive offset) or shrink a shape.
    fn expand(
        &self,
        shape: &Shape,
        offset: f64,
        options: ExpandOptions,
    ) -> Result<Vec<Shape>, GeometryError>;

    fn unite(&self, shapes: &[Shape]) -> Result<Vec<Shape>, GeometryError>;

    fn intersect(&self, a: &Shape, b: &Shape) -> Result<Vec<Shape>, GeometryError>;

    fn subtract(&self, shape: &Shape, holes: &[Shape]) -> Result<Vec<Shape>, GeometryError>;

    fn intersection_type(&self, a: &Shape, b: &Shape) -> Result<IntersectionType, GeometryError>;

    fn area(&self, shape: &Shape) -> f64;

    fn contains_point(&self, shape: &Shape, point: Point) -> bool;

    /// Clip an open polyline to `extent`, returning the pieces inside it.
    fn clip_polyline(
        &self,
        line: &[Point],
        extent: &Shape,
    ) -> Result<Vec<Vec<Point>>, GeometryError>;

    /// Outline of a stroked path.
    fn path_outline(
        &self,
        centerline: &[Vertex],
        width: f64,
        cap: CapStyle,
    ) -> Result<Vec<Shape>, GeometryError>;

    /// Chord tolerance used when arcs are flattened.
    fn arc_tolerance(&self) -> f64 {
        1e-7
    }

    fn flatten_arcs(&self, shape: &Shape) -> Shape {
        arc::flatten_shape(shape, self.arc_tolerance())
    }

    fn bounding_box(&self, shapes: &[Shape]) -> Option<BBox> {
        shapes
            .iter()
            .filter_map(|s| self.flatten_arcs(s).bounding_box())
            .reduce(|a, b| a.union(&b))
    }
}

/// Index of the largest-area shape.
pub fn largest_by_area(kernel: &dyn GeometryKernel, shapes: &[Shape]) -> Option<usize> {
    shapes
        .iter()
        .enumerate()
        .map(|(i, s)| (i, kernel.area(s)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// True when `a` and `b` agree to within [`AREA_TOLERANCE`] relative to `scale`.
pub fn area_close(a: f64, b: f64, scale: f64) -> bool {
    (a - b).abs() <= AREA_TOLERANCE * scale.abs().max(f64::MIN_POSITIVE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_drops_closing_point() {
        let c = Contour::from_points([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]);
        assert_eq!(c.vertices.len(), 3);
        assert_eq!(c.closed_points().len(), 4);
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = Contour::rectangle(Point::new(0.0, 0.0), Point::new(2.0, 3.0));
        assert!((ccw.signed_area() - 6.0).abs() < 1e-12);
        let mut cw = ccw.clone();
        cw.vertices.reverse();
        assert!((cw.signed_area() + 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_bbox_overlap_and_contains() {
        let a = BBox::from_points([Point::new(0.0, 0.0), Point::new(2.0, 2.0)]).unwrap();
        let b = BBox::from_points([Point::new(1.0, 1.0), Point::new(3.0, 3.0)]).unwrap();
        let c = BBox::from_points([Point::new(0.5, 0.5), Point::new(1.5, 1.5)]).unwrap();
        assert!(a.overlaps(&b));
        assert!(a.contains_bbox(&c));
        assert!(!c.contains_bbox(&a));
        assert_eq!(a.union(&b).max, Point::new(3.0, 3.0));
    }
}
