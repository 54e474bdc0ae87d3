//! WRITE phase: the only place a pass mutates the store.
//!
//! Runs on the calling thread after every COMPUTE worker has joined. Order:
//! nets, padstack instances, primitives, new geometry, zero-pin components,
//! single-pin passives, then save-as when an output path was given.

use std::path::Path;

use super::classify::Replacement;
use super::PassStats;
use crate::layout::{LayoutError, LayoutStore, ObjectId};

#[derive(Debug, Clone, Default)]
pub struct WritePlan {
    pub nets: Vec<String>,
    pub instances: Vec<ObjectId>,
    pub primitives: Vec<ObjectId>,
    /// Voids owned by the deleted primitives.
    pub voids: usize,
    /// `(layer, net, geometry)`
    pub replacements: Vec<(String, String, Replacement)>,
    pub components: Vec<String>,
    pub single_pin_components: Vec<String>,
    pub clip_failures: usize,
}

impl WritePlan {
    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
            && self.instances.is_empty()
            && self.primitives.is_empty()
            && self.replacements.is_empty()
            && self.components.is_empty()
            && self.single_pin_components.is_empty()
    }
}

pub fn apply<S: LayoutStore + ?Sized>(
    store: &mut S,
    plan: WritePlan,
    output: Option<&Path>,
) -> Result<PassStats, LayoutError> {
    let mut stats = PassStats {
        clip_failures: plan.clip_failures,
        ..Default::default()
    };

    stats.deleted_nets = store.delete_nets(&plan.nets)?;
    stats.deleted_instances = store.delete_padstack_instances(&plan.instances)?;
    stats.deleted_primitives = store.delete_primitives(&plan.primitives)?;
    stats.deleted_voids = plan.voids;
    tracing::debug!(
        nets = stats.deleted_nets,
        instances = stats.deleted_instances,
        primitives = stats.deleted_primitives,
        "deletions applied"
    );

    for (layer, net, replacement) in plan.replacements {
        match replacement {
            Replacement::Polygon(shape) => {
                store.create_polygon(shape, &layer, &net)?;
                stats.created_polygons += 1;
            }
            Replacement::Path(path) => {
                store.create_path(path, &layer, &net)?;
                stats.created_paths += 1;
            }
        }
    }

    stats.deleted_components = store.delete_components(&plan.components)?;
    if !plan.single_pin_components.is_empty() {
        stats.deleted_single_pin_components =
            store.delete_components(&plan.single_pin_components)?;
    }

    if let Some(path) = output {
        store.save_as(path)?;
        tracing::info!("Saved cutout to {}", path.display());
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Shape};
    use crate::layout::{ComponentType, LayoutBuilder};

    #[test]
    fn test_apply_deletes_then_creates() {
        let mut db = LayoutBuilder::new("board")
            .two_layer_stackup()
            .net("GND")
            .net("NC")
            .pad_definition("SMD", 5e-4, 5e-4, 0.0)
            .rectangle("GND", "BOTTOM", Point::new(0.0, 0.0), Point::new(0.02, 0.01))
            .rectangle("NC", "TOP", Point::new(0.0, 0.0), Point::new(0.001, 0.001))
            .component("R9", ComponentType::Resistor, None)
            .pin("R9", "1", "NC", "SMD", Point::new(0.0, 0.0), "TOP")
            .build();
        let prims = db.primitives().unwrap();
        let pin = db.padstack_instances().unwrap()[0].id;

        let plan = WritePlan {
            nets: vec!["NC".into()],
            instances: vec![pin],
            primitives: prims.iter().map(|p| p.id).collect(),
            replacements: vec![(
                "BOTTOM".into(),
                "GND".into(),
                Replacement::Polygon(Shape::rectangle(Point::new(0.0, 0.0), Point::new(0.01, 0.01))),
            )],
            components: vec!["R9".into()],
            ..Default::default()
        };
        let stats = apply(&mut db, plan, None).unwrap();

        assert_eq!(stats.deleted_nets, 1);
        assert_eq!(stats.deleted_primitives, 2);
        assert_eq!(stats.created_polygons, 1);
        assert_eq!(stats.deleted_components, 1);
        let left = db.primitives().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].net, "GND");
    }

    #[test]
    fn test_replacement_on_deleted_net_fails() {
        let mut db = LayoutBuilder::new("board")
            .two_layer_stackup()
            .net("GND")
            .build();
        let plan = WritePlan {
            nets: vec!["GND".into()],
            replacements: vec![(
                "TOP".into(),
                "GND".into(),
                Replacement::Polygon(Shape::rectangle(Point::new(0.0, 0.0), Point::new(0.01, 0.01))),
            )],
            ..Default::default()
        };
        assert!(matches!(apply(&mut db, plan, None), Err(LayoutError::UnknownNet(_))));
    }
}
