//! Arc flattening for bulge-encoded contours.

use super::{Contour, Point, Shape, Vertex};

const MAX_ARC_SEGMENTS: usize = 256;

/// Points strictly between `v1` and `v2` approximating the arc encoded by `v1.bulge`.
pub fn arc_points(v1: &Vertex, v2: &Vertex, tolerance: f64) -> Vec<Point> {
    if v1.bulge.abs() < 1e-12 {
        return Vec::new();
    }
    let dx = v2.x - v1.x;
    let dy = v2.y - v1.y;
    let chord_len = (dx * dx + dy * dy).sqrt();
    if chord_len < 1e-15 {
        return Vec::new();
    }

    let theta = 4.0 * v1.bulge.atan();
    let radius = (chord_len / (2.0 * (theta / 2.0).sin())).abs();
    let dist_to_center = radius * (theta.abs() / 2.0).cos();
    let mx = (v1.x + v2.x) / 2.0;
    let my = (v1.y + v2.y) / 2.0;
    let nx = -dy / chord_len;
    let ny = dx / chord_len;
    // cos() turns negative past half a turn, which moves the centre across the chord.
    let sign = v1.bulge.signum();
    let cx = mx + nx * dist_to_center * sign;
    let cy = my + ny * dist_to_center * sign;

    let start_angle = (v1.y - cy).atan2(v1.x - cx);
    let tol = tolerance.max(radius * 1e-6).min(radius);
    let step = 2.0 * (1.0 - tol / radius).clamp(-1.0, 1.0).acos();
    let segments = if step > 0.0 {
        ((theta.abs() / step).ceil() as usize).clamp(2, MAX_ARC_SEGMENTS)
    } else {
        MAX_ARC_SEGMENTS
    };

    (1..segments)
        .map(|j| {
            let angle = start_angle + theta * (j as f64 / segments as f64);
            Point::new(cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect()
}

/// Replace every arc edge by straight segments. Open polylines skip the closing edge.
pub fn flatten_vertices(vertices: &[Vertex], closed: bool, tolerance: f64) -> Vec<Point> {
    let n = vertices.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let v1 = &vertices[i];
        out.push(v1.point());
        if !closed && i + 1 == n {
            break;
        }
        let v2 = &vertices[(i + 1) % n];
        out.extend(arc_points(v1, v2, tolerance));
    }
    out
}

pub fn flatten_contour(contour: &Contour, tolerance: f64) -> Contour {
    if !contour.has_arcs() {
        return contour.clone();
    }
    Contour::from_points(flatten_vertices(&contour.vertices, true, tolerance))
}

pub fn flatten_shape(shape: &Shape, tolerance: f64) -> Shape {
    Shape {
        outline: flatten_contour(&shape.outline, tolerance),
        voids: shape
            .voids
            .iter()
            .map(|v| flatten_contour(v, tolerance))
            .collect(),
    }
}
