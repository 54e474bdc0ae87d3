//! Layout accessor
//!
//! [`LayoutStore`] is the seam between the cutout engine and a layout
//! database. Reads return owned snapshots; every mutating call may invalidate
//! previously read data, so the engine only mutates from its write phase.
//! [`LayoutDatabase`] is an in-memory implementation persisted as JSON.

pub mod builder;
pub mod connectivity;
pub mod database;
pub mod native;
pub mod schema;

pub use builder::LayoutBuilder;
pub use database::LayoutDatabase;
pub use native::NativeCutoutRequest;
pub use schema::*;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geometry::{GeometryError, GeometryKernel, Shape};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid layout file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Layout database is closed")]
    Closed,
    #[error("Layout database has no file path; use save_as")]
    NoPath,
    #[error("Unknown object id {0}")]
    UnknownObject(ObjectId),
    #[error("Unknown net '{0}'")]
    UnknownNet(String),
    #[error("Unknown layer '{0}'")]
    UnknownLayer(String),
    #[error("Unknown cell '{0}'")]
    UnknownCell(String),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

/// Read/write/persist access to one open layout database.
pub trait LayoutStore {
    fn open(path: &Path) -> Result<Self, LayoutError>
    where
        Self: Sized;

    // ------------------------------------------------------------------
    // Reads (active cell)
    // ------------------------------------------------------------------

    fn active_cell_name(&self) -> Result<String, LayoutError>;
    fn cell_names(&self) -> Result<Vec<String>, LayoutError>;
    fn nets(&self) -> Result<Vec<Net>, LayoutError>;
    fn layers(&self) -> Result<Vec<Layer>, LayoutError>;
    fn padstack_definitions(&self) -> Result<Vec<PadstackDefinition>, LayoutError>;
    fn padstack_instances(&self) -> Result<Vec<PadstackInstance>, LayoutError>;
    fn primitives(&self) -> Result<Vec<Primitive>, LayoutError>;
    fn components(&self) -> Result<Vec<Component>, LayoutError>;
    fn pin_groups(&self) -> Result<Vec<PinGroup>, LayoutError>;
    fn ports(&self) -> Result<Vec<Port>, LayoutError>;
    fn setups(&self, cell: &str) -> Result<Vec<SimulationSetup>, LayoutError>;

    /// Primitives on one net.
    fn net_primitives(&self, net: &str) -> Result<Vec<Primitive>, LayoutError> {
        Ok(self
            .primitives()?
            .into_iter()
            .filter(|p| p.net == net)
            .collect())
    }

    /// Pins of one component.
    fn component_pins(&self, component: &str) -> Result<Vec<PadstackInstance>, LayoutError> {
        Ok(self
            .padstack_instances()?
            .into_iter()
            .filter(|i| i.component.as_deref() == Some(component))
            .collect())
    }

    /// Ports whose reference terminal is not connected to the rest of its reference net.
    fn unconnected_port_references(
        &self,
        kernel: &dyn GeometryKernel,
    ) -> Result<Vec<String>, LayoutError> {
        connectivity::unconnected_port_references(
            &self.primitives()?,
            &self.padstack_instances()?,
            &self.padstack_definitions()?,
            &self.layers()?,
            &self.ports()?,
            kernel,
        )
    }

    fn summary(&self, kernel: &dyn GeometryKernel) -> Result<LayoutSummary, LayoutError> {
        let primitives = self.primitives()?;
        let instances = self.padstack_instances()?;
        let definitions = self.padstack_definitions()?;
        let mut shapes: Vec<Shape> = Vec::with_capacity(primitives.len() + instances.len());
        for primitive in &primitives {
            match &primitive.geometry {
                PrimitiveGeometry::Polygon(shape) => shapes.push(shape.clone()),
                PrimitiveGeometry::Path(path) => shapes.extend(
                    kernel
                        .path_outline(&path.centerline, path.width, path.cap)
                        .unwrap_or_default(),
                ),
            }
        }
        for instance in &instances {
            let definition = definitions.iter().find(|d| d.name == instance.definition);
            shapes.push(instance.pad_shape(definition));
        }
        Ok(LayoutSummary {
            cell: self.active_cell_name()?,
            nets: self.nets()?.len(),
            primitives: primitives.len(),
            voids: primitives.iter().map(Primitive::void_count).sum(),
            padstack_instances: instances.len(),
            components: self.components()?.len(),
            ports: self.ports()?.len(),
            bounding_box: kernel.bounding_box(&shapes),
        })
    }

    fn are_port_references_connected(
        &self,
        kernel: &dyn GeometryKernel,
    ) -> Result<bool, LayoutError> {
        Ok(self.unconnected_port_references(kernel)?.is_empty())
    }

    // ------------------------------------------------------------------
    // Mutations (active cell)
    // ------------------------------------------------------------------

    fn delete_nets(&mut self, names: &[String]) -> Result<usize, LayoutError>;
    fn delete_padstack_instances(&mut self, ids: &[ObjectId]) -> Result<usize, LayoutError>;
    fn delete_primitives(&mut self, ids: &[ObjectId]) -> Result<usize, LayoutError>;
    fn delete_components(&mut self, names: &[String]) -> Result<usize, LayoutError>;
    fn create_polygon(&mut self, shape: Shape, layer: &str, net: &str)
        -> Result<ObjectId, LayoutError>;
    fn create_path(
        &mut self,
        path: PathGeometry,
        layer: &str,
        net: &str,
    ) -> Result<ObjectId, LayoutError>;

    // ------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------

    /// Backend cutout primitive: builds a new cell from the active one and returns its name.
    fn native_cutout(
        &mut self,
        request: &NativeCutoutRequest,
        kernel: &dyn GeometryKernel,
    ) -> Result<String, LayoutError>;
    fn add_setup(&mut self, cell: &str, setup: SimulationSetup) -> Result<(), LayoutError>;
    fn set_active_cell(&mut self, cell: &str) -> Result<(), LayoutError>;
    fn remove_cell(&mut self, cell: &str) -> Result<(), LayoutError>;
    /// Write a fresh database at `path` containing only `cell`.
    fn export_cell(&self, cell: &str, path: &Path) -> Result<(), LayoutError>;

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn path(&self) -> Option<PathBuf>;
    fn is_open(&self) -> bool;
    fn save(&mut self) -> Result<(), LayoutError>;
    /// Save to `path` and continue working on that file.
    fn save_as(&mut self, path: &Path) -> Result<(), LayoutError>;
    /// Write a copy to `path` without switching to it.
    fn copy_to(&self, path: &Path) -> Result<(), LayoutError>;
    fn close(&mut self) -> Result<(), LayoutError>;
    /// Discard in-memory state and load `path`.
    fn reopen(&mut self, path: &Path) -> Result<(), LayoutError>;

    /// Persist a restorable copy of the current state.
    fn snapshot(&self, path: &Path) -> Result<(), LayoutError> {
        self.copy_to(path)
    }

    /// Drop the working state and return to a snapshot taken earlier.
    fn restore(&mut self, path: &Path) -> Result<(), LayoutError> {
        if self.is_open() {
            self.close()?;
        }
        self.reopen(path)
    }
}
