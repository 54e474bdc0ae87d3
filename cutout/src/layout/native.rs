//! Backend cutout primitive
//!
//! Builds a brand-new cell from a source cell and an extent: nets in
//! `included_nets` are kept whole, nets in `clip_nets` are clipped to the
//! extent, everything else is left behind. Only setups the backend knows how
//! to carry across (see [`SetupKind::survives_native_cutout`]) are copied.

use std::collections::HashSet;

use super::schema::*;
use super::LayoutError;
use crate::geometry::{GeometryKernel, IntersectionType, Shape};

#[derive(Debug, Clone)]
pub struct NativeCutoutRequest {
    pub extent: Shape,
    /// Nets copied unchanged.
    pub included_nets: Vec<String>,
    /// Nets whose geometry is clipped to the extent.
    pub clip_nets: Vec<String>,
    /// Keep instances whose pad straddles the extent boundary.
    pub include_partial_instances: bool,
}

pub fn cutout_cell(
    source: &Cell,
    request: &NativeCutoutRequest,
    kernel: &dyn GeometryKernel,
) -> Result<Cell, LayoutError> {
    let included: HashSet<&str> = request.included_nets.iter().map(String::as_str).collect();
    let clipped: HashSet<&str> = request
        .clip_nets
        .iter()
        .map(String::as_str)
        .filter(|n| !included.contains(n))
        .collect();
    let extent = kernel.flatten_arcs(&request.extent);

    let mut cell = Cell::new(format!("{}_cutout", source.name));
    cell.layers = source.layers.clone();
    cell.padstack_definitions = source.padstack_definitions.clone();
    cell.next_id = source.next_id;
    cell.nets = source
        .nets
        .iter()
        .filter(|n| included.contains(n.name.as_str()) || clipped.contains(n.name.as_str()))
        .cloned()
        .collect();

    for primitive in &source.primitives {
        let net = primitive.net.as_str();
        if included.contains(net) {
            cell.primitives.push(primitive.clone());
            continue;
        }
        if !clipped.contains(net) {
            continue;
        }
        let shapes = match &primitive.geometry {
            PrimitiveGeometry::Polygon(shape) => vec![shape.clone()],
            PrimitiveGeometry::Path(path) => {
                kernel.path_outline(&path.centerline, path.width, path.cap)?
            }
        };
        let mut inside = true;
        let mut pieces = Vec::new();
        for shape in &shapes {
            match kernel.intersection_type(shape, &extent)? {
                IntersectionType::Disjoint => inside = false,
                IntersectionType::AInB => pieces.push(shape.clone()),
                _ => {
                    inside = false;
                    pieces.extend(kernel.intersect(shape, &extent)?);
                }
            }
        }
        if inside {
            cell.primitives.push(primitive.clone());
            continue;
        }
        for piece in pieces {
            let id = cell.allocate_id();
            cell.primitives.push(Primitive {
                id,
                net: primitive.net.clone(),
                layer: primitive.layer.clone(),
                geometry: PrimitiveGeometry::Polygon(piece),
            });
        }
    }

    let mut kept_pins: HashSet<ObjectId> = HashSet::new();
    for instance in &source.padstack_instances {
        let net = instance.net.as_str();
        if !included.contains(net) && !clipped.contains(net) {
            continue;
        }
        let pad = instance.pad_shape(source.definition(&instance.definition));
        let keep = match kernel.intersection_type(&pad, &extent)? {
            IntersectionType::AInB => true,
            IntersectionType::Disjoint => false,
            _ => {
                request.include_partial_instances
                    || kernel.contains_point(&extent, instance.position)
            }
        };
        if keep {
            kept_pins.insert(instance.id);
            cell.padstack_instances.push(instance.clone());
        }
    }

    let owners: HashSet<&str> = cell
        .padstack_instances
        .iter()
        .filter_map(|i| i.component.as_deref())
        .collect();
    cell.components = source
        .components
        .iter()
        .filter(|c| owners.contains(c.name.as_str()))
        .cloned()
        .collect();

    cell.pin_groups = source
        .pin_groups
        .iter()
        .filter_map(|group| {
            let pins: Vec<ObjectId> = group
                .pins
                .iter()
                .copied()
                .filter(|p| kept_pins.contains(p))
                .collect();
            (!pins.is_empty()).then(|| PinGroup {
                name: group.name.clone(),
                pins,
            })
        })
        .collect();

    cell.ports = source
        .ports
        .iter()
        .filter(|p| kernel.contains_point(&extent, p.terminal.position))
        .cloned()
        .collect();

    cell.setups = source
        .setups
        .iter()
        .filter(|s| s.kind.survives_native_cutout())
        .cloned()
        .collect();

    tracing::debug!(
        cell = %cell.name,
        primitives = cell.primitives.len(),
        instances = cell.padstack_instances.len(),
        "native cutout built"
    );
    Ok(cell)
}
