//! Clipper-backed geometry kernel
//!
//! Boolean operations and offsets go through `geo-clipper`, which works on an
//! integer grid: coordinates are multiplied by `scale` before clipping. The
//! default scale of 1e9 gives a one-nanometre grid for meter coordinates.
//! Hulls, areas and point tests use `geo` directly.

use geo::orient::{Direction, Orient};
use geo::{
    Area, ConvexHull, Coord, Intersects, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point as GeoPoint, Polygon as GeoPolygon,
};
use geo_clipper::{Clipper, EndType, JoinType};

use super::arc;
use super::{
    area_close, CapStyle, Contour, ExpandOptions, GeometryError, GeometryKernel,
    IntersectionType, Point, Shape, Vertex,
};

const MIN_DISC_SEGMENTS: usize = 8;
const MAX_DISC_SEGMENTS: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct ClipperKernel {
    /// Grid factor applied before clipping.
    pub scale: f64,
    /// Chord tolerance for arcs and rounded joins (working units).
    pub tolerance: f64,
}

impl Default for ClipperKernel {
    fn default() -> Self {
        Self {
            scale: 1e9,
            tolerance: 1e-7,
        }
    }
}

impl ClipperKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    fn to_geo(&self, shape: &Shape) -> GeoPolygon<f64> {
        let flat = arc::flatten_shape(shape, self.tolerance);
        GeoPolygon::new(
            contour_to_ring(&flat.outline),
            flat.voids.iter().map(contour_to_ring).collect(),
        )
        .orient(Direction::Default)
    }

    fn to_geo_multi(&self, shapes: &[Shape]) -> MultiPolygon<f64> {
        MultiPolygon::new(
            shapes
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| self.to_geo(s))
                .collect(),
        )
    }

    fn disc(&self, center: Point, radius: f64) -> Shape {
        let tol = self.tolerance.min(radius * 0.5);
        let step = 2.0 * (1.0 - tol / radius).acos();
        let n = if step > 0.0 {
            ((std::f64::consts::TAU / step).ceil() as usize).clamp(MIN_DISC_SEGMENTS, MAX_DISC_SEGMENTS)
        } else {
            MAX_DISC_SEGMENTS
        };
        Shape::from_points((0..n).map(|i| {
            let a = std::f64::consts::TAU * i as f64 / n as f64;
            Point::new(center.x + radius * a.cos(), center.y + radius * a.sin())
        }))
    }
}

fn contour_to_ring(contour: &Contour) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = contour
        .vertices
        .iter()
        .map(|v| Coord { x: v.x, y: v.y })
        .collect();
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::new(coords)
}

fn ring_to_contour(ring: &LineString<f64>) -> Contour {
    Contour::from_points(ring.coords().map(|c| Point::new(c.x, c.y)))
}

fn geo_to_shape(poly: &GeoPolygon<f64>) -> Shape {
    Shape::with_voids(
        ring_to_contour(poly.exterior()),
        poly.interiors()
            .iter()
            .map(ring_to_contour)
            .filter(|c| !c.is_degenerate())
            .collect(),
    )
}

fn multi_to_shapes(multi: &MultiPolygon<f64>) -> Vec<Shape> {
    multi
        .0
        .iter()
        .map(geo_to_shape)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Quad covering a straight segment of a stroked path.
fn segment_quad(a: Point, b: Point, half_width: f64, extend_start: f64, extend_end: f64) -> Option<Shape> {
    let len = a.distance(&b);
    if len <= f64::EPSILON {
        return None;
    }
    let ux = (b.x - a.x) / len;
    let uy = (b.y - a.y) / len;
    let (nx, ny) = (-uy * half_width, ux * half_width);
    let s = Point::new(a.x - ux * extend_start, a.y - uy * extend_start);
    let e = Point::new(b.x + ux * extend_end, b.y + uy * extend_end);
    Some(Shape::from_points([
        Point::new(s.x + nx, s.y + ny),
        Point::new(s.x - nx, s.y - ny),
        Point::new(e.x - nx, e.y - ny),
        Point::new(e.x + nx, e.y + ny),
    ]))
}

impl GeometryKernel for ClipperKernel {
    fn convex_hull(&self, shapes: &[Shape]) -> Result<Shape, GeometryError> {
        let points: Vec<GeoPoint<f64>> = shapes
            .iter()
            .flat_map(|s| arc::flatten_contour(&s.outline, self.tolerance).points())
            .map(|p| GeoPoint::new(p.x, p.y))
            .collect();
        if points.len() < 3 {
            return Err(GeometryError::Degenerate(format!(
                "convex hull needs at least 3 points, got {}",
                points.len()
            )));
        }
        let hull = MultiPoint::new(points).convex_hull();
        let shape = geo_to_shape(&hull);
        if shape.is_empty() || hull.unsigned_area() <= 0.0 {
            return Err(GeometryError::Degenerate("collinear hull".to_string()));
        }
        Ok(shape)
    }

    fn expand(
        &self,
        shape: &Shape,
        offset: f64,
        options: ExpandOptions,
    ) -> Result<Vec<Shape>, GeometryError> {
        if shape.is_empty() {
            return Err(GeometryError::Degenerate("cannot expand an empty shape".to_string()));
        }
        if offset == 0.0 {
            return Ok(vec![arc::flatten_shape(shape, self.tolerance)]);
        }
        let join = if options.round_corner {
            JoinType::Round(options.tolerance.max(self.tolerance) * self.scale)
        } else {
            let limit = if options.max_corner_extension > 0.0 {
                (options.max_corner_extension / offset.abs()).max(1.0)
            } else {
                2.0
            };
            JoinType::Miter(limit)
        };
        let result = self
            .to_geo(shape)
            .offset(offset, join, EndType::ClosedPolygon, self.scale);
        let shapes = multi_to_shapes(&result);
        if shapes.is_empty() && offset > 0.0 {
            return Err(GeometryError::Boolean {
                op: "expand",
                reason: "offset produced no geometry".to_string(),
            });
        }
        Ok(shapes)
    }

    fn unite(&self, shapes: &[Shape]) -> Result<Vec<Shape>, GeometryError> {
        let mut polys = self.to_geo_multi(shapes).0.into_iter();
        let Some(first) = polys.next() else {
            return Ok(Vec::new());
        };
        let mut acc = MultiPolygon::new(vec![first]);
        for poly in polys {
            acc = acc.union(&MultiPolygon::new(vec![poly]), self.scale);
        }
        Ok(multi_to_shapes(&acc))
    }

    fn intersect(&self, a: &Shape, b: &Shape) -> Result<Vec<Shape>, GeometryError> {
        if a.is_empty() || b.is_empty() {
            return Ok(Vec::new());
        }
        let result = self.to_geo(a).intersection(&self.to_geo(b), self.scale);
        Ok(multi_to_shapes(&result))
    }

    fn subtract(&self, shape: &Shape, holes: &[Shape]) -> Result<Vec<Shape>, GeometryError> {
        if shape.is_empty() {
            return Ok(Vec::new());
        }
        let holes = self.to_geo_multi(holes);
        if holes.0.is_empty() {
            return Ok(vec![arc::flatten_shape(shape, self.tolerance)]);
        }
        let result = self.to_geo(shape).difference(&holes, self.scale);
        Ok(multi_to_shapes(&result))
    }

    fn intersection_type(&self, a: &Shape, b: &Shape) -> Result<IntersectionType, GeometryError> {
        let a = &arc::flatten_shape(a, self.tolerance);
        let b = &arc::flatten_shape(b, self.tolerance);
        let (Some(ba), Some(bb)) = (a.bounding_box(), b.bounding_box()) else {
            return Ok(IntersectionType::Disjoint);
        };
        if !ba.overlaps(&bb) {
            return Ok(IntersectionType::Disjoint);
        }
        let area_a = self.area(a);
        let area_b = self.area(b);
        if area_a <= 0.0 || area_b <= 0.0 {
            return Ok(IntersectionType::Disjoint);
        }
        let common: f64 = self.intersect(a, b)?.iter().map(|s| self.area(s)).sum();
        let smaller = area_a.min(area_b);
        Ok(if area_close(common, 0.0, smaller) {
            IntersectionType::Disjoint
        } else if area_close(common, area_a, area_a) {
            IntersectionType::AInB
        } else if area_close(common, area_b, area_b) {
            IntersectionType::BInA
        } else {
            IntersectionType::Overlapping
        })
    }

    fn area(&self, shape: &Shape) -> f64 {
        if shape.is_empty() {
            return 0.0;
        }
        self.to_geo(shape).unsigned_area()
    }

    fn contains_point(&self, shape: &Shape, point: Point) -> bool {
        if shape.is_empty() {
            return false;
        }
        self.to_geo(shape).intersects(&GeoPoint::new(point.x, point.y))
    }

    fn clip_polyline(
        &self,
        line: &[Point],
        extent: &Shape,
    ) -> Result<Vec<Vec<Point>>, GeometryError> {
        if line.len() < 2 {
            return Err(GeometryError::Degenerate("polyline needs two points".to_string()));
        }
        let ls = LineString::new(line.iter().map(|p| Coord { x: p.x, y: p.y }).collect());
        let clipped =
            geo::BooleanOps::clip(&self.to_geo(extent), &MultiLineString::new(vec![ls]), false);
        Ok(clipped
            .0
            .iter()
            .map(|piece| piece.coords().map(|c| Point::new(c.x, c.y)).collect::<Vec<_>>())
            .filter(|pts: &Vec<Point>| {
                pts.len() >= 2 && pts.windows(2).any(|w| w[0].distance(&w[1]) > f64::EPSILON)
            })
            .collect())
    }

    fn path_outline(
        &self,
        centerline: &[Vertex],
        width: f64,
        cap: CapStyle,
    ) -> Result<Vec<Shape>, GeometryError> {
        if width <= 0.0 {
            return Err(GeometryError::Degenerate(format!("path width {width} is not positive")));
        }
        let pts = arc::flatten_vertices(centerline, false, self.tolerance);
        if pts.len() < 2 {
            return Err(GeometryError::Degenerate("path needs two points".to_string()));
        }
        let half = width / 2.0;
        let last = pts.len() - 2;
        let mut pieces = Vec::with_capacity(pts.len() * 2);
        for (i, seg) in pts.windows(2).enumerate() {
            let ext_start = if cap == CapStyle::Extended && i == 0 { half } else { 0.0 };
            let ext_end = if cap == CapStyle::Extended && i == last { half } else { 0.0 };
            if let Some(quad) = segment_quad(seg[0], seg[1], half, ext_start, ext_end) {
                pieces.push(quad);
            }
        }
        for (i, p) in pts.iter().enumerate() {
            let is_end = i == 0 || i + 1 == pts.len();
            if !is_end || cap == CapStyle::Round {
                pieces.push(self.disc(*p, half));
            }
        }
        if pieces.is_empty() {
            return Err(GeometryError::Degenerate("path has zero length".to_string()));
        }
        self.unite(&pieces)
    }

    fn arc_tolerance(&self) -> f64 {
        self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Shape {
        Shape::rectangle(Point::new(x0, y0), Point::new(x0 + size, y0 + size))
    }

    #[test]
    fn test_intersection_type_classification() {
        let k = ClipperKernel::new();
        let big = square(0.0, 0.0, 10.0);
        let inner = square(2.0, 2.0, 2.0);
        let straddle = square(8.0, 8.0, 4.0);
        let far = square(20.0, 20.0, 1.0);

        assert_eq!(k.intersection_type(&inner, &big).unwrap(), IntersectionType::AInB);
        assert_eq!(k.intersection_type(&big, &inner).unwrap(), IntersectionType::BInA);
        assert_eq!(
            k.intersection_type(&straddle, &big).unwrap(),
            IntersectionType::Overlapping
        );
        assert_eq!(k.intersection_type(&far, &big).unwrap(), IntersectionType::Disjoint);
    }

    #[test]
    fn test_intersect_area() {
        let k = ClipperKernel::new();
        let a = square(0.0, 0.0, 0.004);
        let b = square(0.002, 0.002, 0.004);
        let area: f64 = k.intersect(&a, &b).unwrap().iter().map(|s| k.area(s)).sum();
        assert!((area - 4e-6).abs() < 1e-11);
    }

    #[test]
    fn test_subtract_keeps_hole() {
        let k = ClipperKernel::new();
        let out = k.subtract(&square(0.0, 0.0, 0.01), &[square(0.004, 0.004, 0.002)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].voids.len(), 1);
        assert!((k.area(&out[0]) - (1e-4 - 4e-6)).abs() < 1e-10);
    }

    #[test]
    fn test_subtract_consumed_shape_is_empty() {
        let k = ClipperKernel::new();
        let out = k.subtract(&square(0.002, 0.002, 0.002), &[square(0.0, 0.0, 0.01)]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_unite_disjoint_and_touching() {
        let k = ClipperKernel::new();
        let merged = k
            .unite(&[square(0.0, 0.0, 0.002), square(0.001, 0.0, 0.002)])
            .unwrap();
        assert_eq!(merged.len(), 1);
        let apart = k
            .unite(&[square(0.0, 0.0, 0.001), square(0.005, 0.0, 0.001)])
            .unwrap();
        assert_eq!(apart.len(), 2);
    }

    #[test]
    fn test_expand_grows_area() {
        let k = ClipperKernel::new();
        let base = square(0.0, 0.0, 0.01);
        let grown = k.expand(&base, 0.001, ExpandOptions::default()).unwrap();
        assert_eq!(grown.len(), 1);
        // Mitred square corners stay square: (10 + 2)^2 mm^2.
        assert!((k.area(&grown[0]) - 1.44e-4).abs() < 1e-9);

        let rounded = k
            .expand(
                &base,
                0.001,
                ExpandOptions {
                    round_corner: true,
                    ..ExpandOptions::default()
                },
            )
            .unwrap();
        assert!(k.area(&rounded[0]) < k.area(&grown[0]));
        assert!(k.area(&rounded[0]) > 1.4e-4);
    }

    #[test]
    fn test_convex_hull_of_two_squares() {
        let k = ClipperKernel::new();
        let hull = k
            .convex_hull(&[square(0.0, 0.0, 1.0), square(3.0, 0.0, 1.0)])
            .unwrap();
        assert!((k.area(&hull) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_contains_point_includes_boundary() {
        let k = ClipperKernel::new();
        let s = square(0.0, 0.0, 1.0);
        assert!(k.contains_point(&s, Point::new(0.5, 0.5)));
        assert!(k.contains_point(&s, Point::new(1.0, 0.5)));
        assert!(!k.contains_point(&s, Point::new(1.5, 0.5)));
    }

    #[test]
    fn test_clip_polyline_keeps_inside_piece() {
        let k = ClipperKernel::new();
        let extent = square(0.0, 0.0, 0.01);
        let pieces = k
            .clip_polyline(&[Point::new(-0.005, 0.005), Point::new(0.005, 0.005)], &extent)
            .unwrap();
        assert_eq!(pieces.len(), 1);
        let len: f64 = pieces[0].windows(2).map(|w| w[0].distance(&w[1])).sum();
        assert!((len - 0.005).abs() < 1e-9);
    }

    #[test]
    fn test_path_outline_flat_cap_area() {
        let k = ClipperKernel::new();
        let outline = k
            .path_outline(
                &[Vertex::new(0.0, 0.0), Vertex::new(0.01, 0.0)],
                0.001,
                CapStyle::Flat,
            )
            .unwrap();
        assert_eq!(outline.len(), 1);
        assert!((k.area(&outline[0]) - 1e-5).abs() < 1e-10);

        let extended = k
            .path_outline(
                &[Vertex::new(0.0, 0.0), Vertex::new(0.01, 0.0)],
                0.001,
                CapStyle::Extended,
            )
            .unwrap();
        assert!((k.area(&extended[0]) - 1.1e-5).abs() < 1e-10);
    }
}
