//! READ phase: an owned copy of everything one pass looks at.

use std::collections::HashMap;

use crate::geometry::{GeometryError, GeometryKernel, Shape};
use crate::layout::{
    Cell, Component, Layer, LayerType, LayoutError, LayoutStore, Net, ObjectId, PadstackDefinition,
    PadstackInstance, PinGroup, Port, Primitive, PrimitiveGeometry,
};

#[derive(Debug, Clone, Default)]
pub struct LayoutSnapshot {
    pub nets: Vec<Net>,
    pub layers: Vec<Layer>,
    pub definitions: Vec<PadstackDefinition>,
    pub instances: Vec<PadstackInstance>,
    pub primitives: Vec<Primitive>,
    pub components: Vec<Component>,
    pub pin_groups: Vec<PinGroup>,
    pub ports: Vec<Port>,
}

impl LayoutSnapshot {
    pub fn read<S: LayoutStore + ?Sized>(store: &S) -> Result<Self, LayoutError> {
        Ok(Self {
            nets: store.nets()?,
            layers: store.layers()?,
            definitions: store.padstack_definitions()?,
            instances: store.padstack_instances()?,
            primitives: store.primitives()?,
            components: store.components()?,
            pin_groups: store.pin_groups()?,
            ports: store.ports()?,
        })
    }

    pub fn from_cell(cell: &Cell) -> Self {
        Self {
            nets: cell.nets.clone(),
            layers: cell.layers.clone(),
            definitions: cell.padstack_definitions.clone(),
            instances: cell.padstack_instances.clone(),
            primitives: cell.primitives.clone(),
            components: cell.components.clone(),
            pin_groups: cell.pin_groups.clone(),
            ports: cell.ports.clone(),
        }
    }

    pub fn definition(&self, name: &str) -> Option<&PadstackDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Component name -> ids of the pins it owns.
    pub fn pins_by_component(&self) -> HashMap<&str, Vec<ObjectId>> {
        let mut map: HashMap<&str, Vec<ObjectId>> = HashMap::new();
        for component in &self.components {
            map.entry(component.name.as_str()).or_default();
        }
        for instance in &self.instances {
            if let Some(component) = instance.component.as_deref() {
                map.entry(component).or_default().push(instance.id);
            }
        }
        map
    }

    pub fn max_dielectric_thickness(&self) -> f64 {
        self.layers
            .iter()
            .filter(|l| l.layer_type == LayerType::Dielectric)
            .map(|l| l.thickness)
            .fold(0.0, f64::max)
    }
}

/// Polygon view of a primitive; paths are stroked.
pub fn primitive_shapes(
    primitive: &Primitive,
    kernel: &dyn GeometryKernel,
) -> Result<Vec<Shape>, GeometryError> {
    match &primitive.geometry {
        PrimitiveGeometry::Polygon(shape) => Ok(vec![shape.clone()]),
        PrimitiveGeometry::Path(path) => kernel.path_outline(&path.centerline, path.width, path.cap),
    }
}
