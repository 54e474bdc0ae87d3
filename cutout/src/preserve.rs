//! Preservation Resolver
//!
//! Decides which pins and nets must survive a pass regardless of their net
//! membership. Pure read over a [`LayoutSnapshot`].

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::geometry::Point;
use crate::layout::{Component, ObjectId, PadstackInstance};
use crate::pipeline::{LayoutSnapshot, NetSets};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreservationSet {
    pub pins: HashSet<ObjectId>,
    pub nets: BTreeSet<String>,
}

impl PreservationSet {
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty() && self.nets.is_empty()
    }

    pub fn keeps_pin(&self, id: ObjectId) -> bool {
        self.pins.contains(&id)
    }

    pub fn keeps_net(&self, net: &str) -> bool {
        self.nets.contains(net)
    }

    /// Positions of preserved pins, for keep boxes.
    pub fn pin_positions(&self, snapshot: &LayoutSnapshot) -> Vec<Point> {
        snapshot
            .instances
            .iter()
            .filter(|i| self.pins.contains(&i.id))
            .map(|i| i.position)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PreservationResolver {
    pub preserve_components_with_model: bool,
    pub include_pingroups: bool,
    pub check_terminals: bool,
}

impl PreservationResolver {
    pub fn resolve(&self, snapshot: &LayoutSnapshot, nets: &NetSets) -> PreservationSet {
        let mut set = PreservationSet::default();
        if !(self.preserve_components_with_model || self.include_pingroups || self.check_terminals) {
            return set;
        }

        let mut pins_by_component: HashMap<&str, Vec<&PadstackInstance>> = HashMap::new();
        for instance in &snapshot.instances {
            if let Some(component) = instance.component.as_deref() {
                pins_by_component.entry(component).or_default().push(instance);
            }
        }

        for component in snapshot.components.iter().filter(|c| has_behavioral_model(c)) {
            let Some(pins) = pins_by_component.get(component.name.as_str()) else {
                continue;
            };
            if !pins.iter().any(|p| nets.signals.contains(&p.net)) {
                continue;
            }
            if self.preserve_components_with_model {
                for pin in pins {
                    set.pins.insert(pin.id);
                    set.nets.insert(pin.net.clone());
                }
            } else if self.check_terminals {
                for pin in pins.iter().filter(|p| nets.references.contains(&p.net)) {
                    set.pins.insert(pin.id);
                }
            }
        }

        if self.include_pingroups {
            let by_id: HashMap<ObjectId, &PadstackInstance> =
                snapshot.instances.iter().map(|i| (i.id, i)).collect();
            for group in &snapshot.pin_groups {
                for pin in group.pins.iter().filter_map(|id| by_id.get(id)) {
                    if nets.references.contains(&pin.net) {
                        set.pins.insert(pin.id);
                    }
                }
            }
        }

        // Signals and references already survive on their own.
        set.nets
            .retain(|n| !nets.signals.contains(n) && !nets.references.contains(n));
        tracing::debug!(pins = set.pins.len(), nets = set.nets.len(), "preservation resolved");
        set
    }
}

fn has_behavioral_model(component: &Component) -> bool {
    component
        .model
        .as_ref()
        .map_or(false, |m| m.kind.is_behavioral())
}
