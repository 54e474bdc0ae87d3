//! COMPUTE phase: per-candidate clip decisions.
//!
//! Everything here is a pure function of the snapshot, the extent and the
//! net sets, so candidates can be classified in any order on any thread.

use thiserror::Error;

use super::NetSets;
use crate::extent::VOID_AREA_RATIO;
use crate::geometry::{
    Contour, GeometryError, GeometryKernel, IntersectionType, Point, Shape, Vertex,
};
use crate::layout::{ObjectId, PadstackDefinition, PadstackInstance, PathGeometry, Primitive, PrimitiveGeometry};
use crate::preserve::PreservationSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub simple_pad_check: bool,
    pub include_partial_instances: bool,
    pub keep_lines_as_path: bool,
    pub keep_voids: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            simple_pad_check: true,
            include_partial_instances: false,
            keep_lines_as_path: false,
            keep_voids: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    Polygon(Shape),
    Path(PathGeometry),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClipDecision {
    Keep,
    Delete,
    /// Delete the original and create these on its layer and net.
    Replace(Vec<Replacement>),
}

#[derive(Debug, Error)]
#[error("candidate {candidate} (iteration {iteration}): {source}")]
pub struct ClipError {
    pub candidate: ObjectId,
    pub iteration: usize,
    #[source]
    pub source: GeometryError,
}

/// Where a pad sits relative to the extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadPlacement {
    Inside,
    Partial,
    Outside,
}

pub struct Classifier<'a> {
    kernel: &'a dyn GeometryKernel,
    extent: &'a Shape,
    nets: &'a NetSets,
    preserved: &'a PreservationSet,
    options: ClassifyOptions,
    iteration: usize,
}

impl<'a> Classifier<'a> {
    pub fn new(
        kernel: &'a dyn GeometryKernel,
        extent: &'a Shape,
        nets: &'a NetSets,
        preserved: &'a PreservationSet,
        options: ClassifyOptions,
        iteration: usize,
    ) -> Self {
        Self {
            kernel,
            extent,
            nets,
            preserved,
            options,
            iteration,
        }
    }

    fn clip_error(&self, candidate: ObjectId, source: GeometryError) -> ClipError {
        ClipError {
            candidate,
            iteration: self.iteration,
            source,
        }
    }

    /// True when the net survives the pass at all.
    pub fn keeps_net(&self, net: &str) -> bool {
        self.nets.signals.contains(net)
            || self.nets.references.contains(net)
            || self.preserved.keeps_net(net)
    }

    pub fn pad_placement(
        &self,
        instance: &PadstackInstance,
        definition: Option<&PadstackDefinition>,
    ) -> Result<PadPlacement, GeometryError> {
        let pad = instance.pad_shape(definition);
        if self.options.simple_pad_check {
            if self.kernel.contains_point(self.extent, instance.position) {
                return Ok(PadPlacement::Inside);
            }
            let corner_inside = pad
                .outline
                .points()
                .into_iter()
                .any(|p| self.kernel.contains_point(self.extent, p));
            return Ok(if corner_inside {
                PadPlacement::Partial
            } else {
                PadPlacement::Outside
            });
        }
        Ok(match self.kernel.intersection_type(&pad, self.extent)? {
            IntersectionType::AInB => PadPlacement::Inside,
            IntersectionType::Disjoint => PadPlacement::Outside,
            IntersectionType::BInA | IntersectionType::Overlapping => PadPlacement::Partial,
        })
    }

    pub fn classify_instance(
        &self,
        instance: &PadstackInstance,
        definition: Option<&PadstackDefinition>,
    ) -> Result<ClipDecision, ClipError> {
        let net = instance.net.as_str();
        if self.nets.signals.contains(net) || self.preserved.keeps_pin(instance.id) {
            return Ok(ClipDecision::Keep);
        }
        // Only a preserved pin protects an instance off the signal and reference nets.
        if !self.nets.references.contains(net) {
            return Ok(ClipDecision::Delete);
        }
        let placement = self
            .pad_placement(instance, definition)
            .map_err(|e| self.clip_error(instance.id, e))?;
        Ok(match placement {
            PadPlacement::Inside => ClipDecision::Keep,
            PadPlacement::Partial if self.options.include_partial_instances => ClipDecision::Keep,
            PadPlacement::Partial | PadPlacement::Outside => ClipDecision::Delete,
        })
    }

    pub fn classify_primitive(&self, primitive: &Primitive) -> Result<ClipDecision, ClipError> {
        let net = primitive.net.as_str();
        if self.nets.signals.contains(net) {
            return Ok(ClipDecision::Keep);
        }
        if !self.nets.references.contains(net) {
            return Ok(if self.preserved.keeps_net(net) {
                ClipDecision::Keep
            } else {
                ClipDecision::Delete
            });
        }

        match &primitive.geometry {
            PrimitiveGeometry::Polygon(shape) => self
                .clip_polygon(shape)
                .map_err(|e| self.clip_error(primitive.id, e)),
            PrimitiveGeometry::Path(path) => {
                if self.options.keep_lines_as_path {
                    match self.reclip_path(path) {
                        Ok(decision) => return Ok(decision),
                        Err(e) => {
                            tracing::debug!(
                                candidate = primitive.id,
                                error = %e,
                                "path re-clip failed; clipping as polygon"
                            );
                        }
                    }
                }
                self.clip_stroked(path)
                    .map_err(|e| self.clip_error(primitive.id, e))
            }
        }
    }

    /// Clip the centerline and keep the pieces as paths.
    fn reclip_path(&self, path: &PathGeometry) -> Result<ClipDecision, GeometryError> {
        if path.centerline.iter().any(|v| v.bulge != 0.0) {
            return Err(GeometryError::Unsupported(
                "arc segments cannot be re-clipped as a path".to_string(),
            ));
        }
        let line: Vec<Point> = path.centerline.iter().map(Vertex::point).collect();
        let pieces = self.kernel.clip_polyline(&line, self.extent)?;
        if pieces.is_empty() {
            return Ok(ClipDecision::Delete);
        }
        if pieces.len() == 1 && same_polyline(&pieces[0], &line) {
            return Ok(ClipDecision::Keep);
        }
        Ok(ClipDecision::Replace(
            pieces
                .into_iter()
                .map(|piece| {
                    Replacement::Path(PathGeometry {
                        centerline: piece.into_iter().map(Vertex::from).collect(),
                        width: path.width,
                        cap: path.cap,
                    })
                })
                .collect(),
        ))
    }

    fn clip_stroked(&self, path: &PathGeometry) -> Result<ClipDecision, GeometryError> {
        let outline = self
            .kernel
            .path_outline(&path.centerline, path.width, path.cap)?;
        let mut inside = true;
        let mut touched = false;
        let mut pieces = Vec::new();
        for shape in &outline {
            match self.kernel.intersection_type(shape, self.extent)? {
                IntersectionType::Disjoint => inside = false,
                IntersectionType::AInB => {
                    touched = true;
                    pieces.push(Replacement::Polygon(shape.clone()));
                }
                IntersectionType::BInA | IntersectionType::Overlapping => {
                    inside = false;
                    touched = true;
                    pieces.extend(self.clip_pieces(shape)?);
                }
            }
        }
        Ok(if !touched {
            ClipDecision::Delete
        } else if inside {
            ClipDecision::Keep
        } else {
            ClipDecision::Replace(pieces)
        })
    }

    fn clip_polygon(&self, shape: &Shape) -> Result<ClipDecision, GeometryError> {
        Ok(match self.kernel.intersection_type(shape, self.extent)? {
            IntersectionType::Disjoint => ClipDecision::Delete,
            IntersectionType::AInB => ClipDecision::Keep,
            IntersectionType::BInA | IntersectionType::Overlapping => {
                let pieces = self.clip_pieces(shape)?;
                if pieces.is_empty() {
                    ClipDecision::Delete
                } else {
                    ClipDecision::Replace(pieces)
                }
            }
        })
    }

    /// Intersect the outline with the extent, then cut the significant voids back in.
    fn clip_pieces(&self, shape: &Shape) -> Result<Vec<Replacement>, GeometryError> {
        let pieces = self.kernel.intersect(&shape.outline_only(), self.extent)?;
        let mut out = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let holes = if self.options.keep_voids {
                self.significant_voids(&piece, &shape.voids)?
            } else {
                Vec::new()
            };
            if holes.is_empty() {
                out.push(Replacement::Polygon(piece));
            } else {
                // A piece swallowed by a void contributes nothing.
                out.extend(
                    self.kernel
                        .subtract(&piece, &holes)?
                        .into_iter()
                        .map(Replacement::Polygon),
                );
            }
        }
        Ok(out)
    }

    fn significant_voids(&self, piece: &Shape, voids: &[Contour]) -> Result<Vec<Shape>, GeometryError> {
        let piece_area = self.kernel.area(piece);
        let mut holes = Vec::new();
        for void in voids {
            let hole = Shape::new(void.clone());
            if self.kernel.area(&hole) < VOID_AREA_RATIO * piece_area {
                continue;
            }
            if self.kernel.intersection_type(&hole, piece)? != IntersectionType::Disjoint {
                holes.push(hole);
            }
        }
        Ok(holes)
    }
}

/// Same vertices in either direction.
fn same_polyline(a: &[Point], b: &[Point]) -> bool {
    let close = |p: &Point, q: &Point| p.distance(q) <= 1e-9;
    a.len() == b.len()
        && (a.iter().zip(b).all(|(p, q)| close(p, q))
            || a.iter().zip(b.iter().rev()).all(|(p, q)| close(p, q)))
}
