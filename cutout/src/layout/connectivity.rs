//! Reference-terminal connectivity
//!
//! Builds a union-find over the copper of every port reference net: two
//! objects join when they share a layer and their shapes touch. A port's
//! reference terminal is connected when it lands on that copper and all
//! reference terminals of the same net land in one cluster.

use petgraph::unionfind::UnionFind;
use std::collections::{HashMap, HashSet};

use super::schema::*;
use super::LayoutError;
use crate::geometry::{BBox, GeometryKernel, IntersectionType, Shape};

struct CopperNode {
    layers: HashSet<String>,
    shapes: Vec<Shape>,
    bbox: Option<BBox>,
}

impl CopperNode {
    fn touches(&self, other: &CopperNode, kernel: &dyn GeometryKernel) -> bool {
        if self.layers.is_disjoint(&other.layers) {
            return false;
        }
        match (self.bbox, other.bbox) {
            (Some(a), Some(b)) if a.overlaps(&b) => {}
            _ => return false,
        }
        self.shapes.iter().any(|a| {
            other.shapes.iter().any(|b| {
                !matches!(
                    kernel.intersection_type(a, b),
                    Ok(IntersectionType::Disjoint) | Err(_)
                )
            })
        })
    }

    fn covers(&self, terminal: &Terminal, kernel: &dyn GeometryKernel) -> bool {
        self.layers.contains(&terminal.layer)
            && self
                .shapes
                .iter()
                .any(|s| kernel.contains_point(s, terminal.position))
    }
}

/// Signal layers an instance passes through, inclusive.
pub fn instance_layers(instance: &PadstackInstance, layers: &[Layer]) -> HashSet<String> {
    let signal: Vec<&str> = layers
        .iter()
        .filter(|l| l.layer_type == LayerType::Signal)
        .map(|l| l.name.as_str())
        .collect();
    let start = signal.iter().position(|l| *l == instance.start_layer);
    let stop = signal.iter().position(|l| *l == instance.stop_layer);
    match (start, stop) {
        (Some(a), Some(b)) => {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            signal[lo..=hi].iter().map(|s| s.to_string()).collect()
        }
        _ => [instance.start_layer.clone(), instance.stop_layer.clone()]
            .into_iter()
            .collect(),
    }
}

fn primitive_shapes(primitive: &Primitive, kernel: &dyn GeometryKernel) -> Vec<Shape> {
    match &primitive.geometry {
        PrimitiveGeometry::Polygon(shape) => vec![kernel.flatten_arcs(shape)],
        PrimitiveGeometry::Path(path) => kernel
            .path_outline(&path.centerline, path.width, path.cap)
            .unwrap_or_default(),
    }
}

pub fn unconnected_port_references(
    primitives: &[Primitive],
    instances: &[PadstackInstance],
    definitions: &[PadstackDefinition],
    layers: &[Layer],
    ports: &[Port],
    kernel: &dyn GeometryKernel,
) -> Result<Vec<String>, LayoutError> {
    let mut by_net: HashMap<&str, Vec<(&str, &Terminal)>> = HashMap::new();
    for port in ports {
        if let Some(reference) = &port.reference {
            by_net
                .entry(reference.net.as_str())
                .or_default()
                .push((port.name.as_str(), reference));
        }
    }

    let mut unconnected = Vec::new();
    for (net, terminals) in by_net {
        let mut nodes: Vec<CopperNode> = Vec::new();
        for primitive in primitives.iter().filter(|p| p.net == net) {
            let shapes = primitive_shapes(primitive, kernel);
            let bbox = kernel.bounding_box(&shapes);
            nodes.push(CopperNode {
                layers: [primitive.layer.clone()].into_iter().collect(),
                shapes,
                bbox,
            });
        }
        for instance in instances.iter().filter(|i| i.net == net) {
            let definition = definitions.iter().find(|d| d.name == instance.definition);
            let shape = instance.pad_shape(definition);
            nodes.push(CopperNode {
                layers: instance_layers(instance, layers),
                bbox: shape.bounding_box(),
                shapes: vec![shape],
            });
        }

        let mut clusters = UnionFind::<usize>::new(nodes.len());
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                if !clusters.equiv(i, j) && nodes[i].touches(&nodes[j], kernel) {
                    clusters.union(i, j);
                }
            }
        }

        let mut landed: Vec<(&str, Option<usize>)> = Vec::with_capacity(terminals.len());
        for (port, terminal) in &terminals {
            let root = nodes
                .iter()
                .position(|n| n.covers(terminal, kernel))
                .map(|idx| clusters.find(idx));
            landed.push((port, root));
        }

        // The cluster holding the most reference terminals is the reference net proper.
        let mut votes: HashMap<usize, usize> = HashMap::new();
        for (_, root) in &landed {
            if let Some(root) = root {
                *votes.entry(*root).or_default() += 1;
            }
        }
        let main = votes
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(root, _)| root);

        for (port, root) in landed {
            if root.is_none() || root != main {
                tracing::debug!(port, net, "reference terminal not connected");
                unconnected.push(port.to_string());
            }
        }
    }
    unconnected.sort();
    Ok(unconnected)
}
