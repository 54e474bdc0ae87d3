//! In-memory layout database persisted as JSON.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::native::{self, NativeCutoutRequest};
use super::schema::*;
use super::{LayoutError, LayoutStore};
use crate::geometry::{GeometryKernel, Shape};

/// A layout database held in memory; `save` writes it out as pretty JSON.
#[derive(Debug, Clone)]
pub struct LayoutDatabase {
    path: Option<PathBuf>,
    design: Option<LayoutDesign>,
}

impl LayoutDatabase {
    /// Wrap a design that has not been written anywhere yet.
    pub fn new(design: LayoutDesign) -> Self {
        Self {
            path: None,
            design: Some(design),
        }
    }

    pub fn design(&self) -> Option<&LayoutDesign> {
        self.design.as_ref()
    }

    fn load(path: &Path) -> Result<LayoutDesign, LayoutError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(design: &LayoutDesign, path: &Path) -> Result<(), LayoutError> {
        let json = serde_json::to_string_pretty(design)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn design_ref(&self) -> Result<&LayoutDesign, LayoutError> {
        self.design.as_ref().ok_or(LayoutError::Closed)
    }

    fn design_mut(&mut self) -> Result<&mut LayoutDesign, LayoutError> {
        self.design.as_mut().ok_or(LayoutError::Closed)
    }

    fn cell(&self) -> Result<&Cell, LayoutError> {
        let design = self.design_ref()?;
        design
            .cell(&design.active_cell)
            .ok_or_else(|| LayoutError::UnknownCell(design.active_cell.clone()))
    }

    fn cell_mut(&mut self) -> Result<&mut Cell, LayoutError> {
        let design = self.design_mut()?;
        let active = design.active_cell.clone();
        design
            .cell_mut(&active)
            .ok_or(LayoutError::UnknownCell(active))
    }

    fn check_target(cell: &Cell, layer: &str, net: &str) -> Result<(), LayoutError> {
        if !cell.layers.is_empty() && cell.layer(layer).is_none() {
            return Err(LayoutError::UnknownLayer(layer.to_string()));
        }
        if !cell.nets.iter().any(|n| n.name == net) {
            return Err(LayoutError::UnknownNet(net.to_string()));
        }
        Ok(())
    }

    fn unique_cell_name(design: &LayoutDesign, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 1;
        while design.cell(&name).is_some() {
            n += 1;
            name = format!("{}_{}", base, n);
        }
        name
    }
}

impl LayoutStore for LayoutDatabase {
    fn open(path: &Path) -> Result<Self, LayoutError> {
        let design = Self::load(path)?;
        tracing::debug!("Opened layout {} ({} cells)", path.display(), design.cells.len());
        Ok(Self {
            path: Some(path.to_path_buf()),
            design: Some(design),
        })
    }

    fn active_cell_name(&self) -> Result<String, LayoutError> {
        Ok(self.design_ref()?.active_cell.clone())
    }

    fn cell_names(&self) -> Result<Vec<String>, LayoutError> {
        Ok(self
            .design_ref()?
            .cells
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    fn nets(&self) -> Result<Vec<Net>, LayoutError> {
        Ok(self.cell()?.nets.clone())
    }

    fn layers(&self) -> Result<Vec<Layer>, LayoutError> {
        Ok(self.cell()?.layers.clone())
    }

    fn padstack_definitions(&self) -> Result<Vec<PadstackDefinition>, LayoutError> {
        Ok(self.cell()?.padstack_definitions.clone())
    }

    fn padstack_instances(&self) -> Result<Vec<PadstackInstance>, LayoutError> {
        Ok(self.cell()?.padstack_instances.clone())
    }

    fn primitives(&self) -> Result<Vec<Primitive>, LayoutError> {
        Ok(self.cell()?.primitives.clone())
    }

    fn components(&self) -> Result<Vec<Component>, LayoutError> {
        Ok(self.cell()?.components.clone())
    }

    fn pin_groups(&self) -> Result<Vec<PinGroup>, LayoutError> {
        Ok(self.cell()?.pin_groups.clone())
    }

    fn ports(&self) -> Result<Vec<Port>, LayoutError> {
        Ok(self.cell()?.ports.clone())
    }

    fn setups(&self, cell: &str) -> Result<Vec<SimulationSetup>, LayoutError> {
        self.design_ref()?
            .cell(cell)
            .map(|c| c.setups.clone())
            .ok_or_else(|| LayoutError::UnknownCell(cell.to_string()))
    }

    fn delete_nets(&mut self, names: &[String]) -> Result<usize, LayoutError> {
        let names: HashSet<&str> = names.iter().map(String::as_str).collect();
        let cell = self.cell_mut()?;
        let before = cell.nets.len();
        cell.nets.retain(|n| !names.contains(n.name.as_str()));
        Ok(before - cell.nets.len())
    }

    fn delete_padstack_instances(&mut self, ids: &[ObjectId]) -> Result<usize, LayoutError> {
        let ids: HashSet<ObjectId> = ids.iter().copied().collect();
        let cell = self.cell_mut()?;
        let before = cell.padstack_instances.len();
        cell.padstack_instances.retain(|i| !ids.contains(&i.id));
        for group in &mut cell.pin_groups {
            group.pins.retain(|p| !ids.contains(p));
        }
        Ok(before - cell.padstack_instances.len())
    }

    fn delete_primitives(&mut self, ids: &[ObjectId]) -> Result<usize, LayoutError> {
        let ids: HashSet<ObjectId> = ids.iter().copied().collect();
        let cell = self.cell_mut()?;
        let before = cell.primitives.len();
        cell.primitives.retain(|p| !ids.contains(&p.id));
        Ok(before - cell.primitives.len())
    }

    /// Removes the components and the pins they own.
    fn delete_components(&mut self, names: &[String]) -> Result<usize, LayoutError> {
        let names: HashSet<&str> = names.iter().map(String::as_str).collect();
        let cell = self.cell_mut()?;
        let before = cell.components.len();
        cell.components.retain(|c| !names.contains(c.name.as_str()));
        cell.padstack_instances.retain(|i| {
            i.component
                .as_deref()
                .map_or(true, |c| !names.contains(c))
        });
        Ok(before - cell.components.len())
    }

    fn create_polygon(
        &mut self,
        shape: Shape,
        layer: &str,
        net: &str,
    ) -> Result<ObjectId, LayoutError> {
        let cell = self.cell_mut()?;
        Self::check_target(cell, layer, net)?;
        let id = cell.allocate_id();
        cell.primitives.push(Primitive {
            id,
            net: net.to_string(),
            layer: layer.to_string(),
            geometry: PrimitiveGeometry::Polygon(shape),
        });
        Ok(id)
    }

    fn create_path(
        &mut self,
        path: PathGeometry,
        layer: &str,
        net: &str,
    ) -> Result<ObjectId, LayoutError> {
        let cell = self.cell_mut()?;
        Self::check_target(cell, layer, net)?;
        let id = cell.allocate_id();
        cell.primitives.push(Primitive {
            id,
            net: net.to_string(),
            layer: layer.to_string(),
            geometry: PrimitiveGeometry::Path(path),
        });
        Ok(id)
    }

    fn native_cutout(
        &mut self,
        request: &NativeCutoutRequest,
        kernel: &dyn GeometryKernel,
    ) -> Result<String, LayoutError> {
        let source = self.cell()?;
        let mut cutout = native::cutout_cell(source, request, kernel)?;
        let design = self.design_mut()?;
        cutout.name = Self::unique_cell_name(design, &cutout.name);
        let name = cutout.name.clone();
        design.cells.push(cutout);
        Ok(name)
    }

    fn add_setup(&mut self, cell: &str, setup: SimulationSetup) -> Result<(), LayoutError> {
        let target = self
            .design_mut()?
            .cell_mut(cell)
            .ok_or_else(|| LayoutError::UnknownCell(cell.to_string()))?;
        target.setups.retain(|s| s.name != setup.name);
        target.setups.push(setup);
        Ok(())
    }

    fn set_active_cell(&mut self, cell: &str) -> Result<(), LayoutError> {
        let design = self.design_mut()?;
        if design.cell(cell).is_none() {
            return Err(LayoutError::UnknownCell(cell.to_string()));
        }
        design.active_cell = cell.to_string();
        Ok(())
    }

    fn remove_cell(&mut self, cell: &str) -> Result<(), LayoutError> {
        let design = self.design_mut()?;
        let before = design.cells.len();
        design.cells.retain(|c| c.name != cell);
        if design.cells.len() == before {
            return Err(LayoutError::UnknownCell(cell.to_string()));
        }
        if design.active_cell == cell {
            if let Some(first) = design.cells.first() {
                design.active_cell = first.name.clone();
            }
        }
        Ok(())
    }

    fn export_cell(&self, cell: &str, path: &Path) -> Result<(), LayoutError> {
        let design = self.design_ref()?;
        let source = design
            .cell(cell)
            .ok_or_else(|| LayoutError::UnknownCell(cell.to_string()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&design.name)
            .to_string();
        let exported = LayoutDesign::new(name, source.clone());
        Self::write(&exported, path)
    }

    fn path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn is_open(&self) -> bool {
        self.design.is_some()
    }

    fn save(&mut self) -> Result<(), LayoutError> {
        let path = self.path.clone().ok_or(LayoutError::NoPath)?;
        Self::write(self.design_ref()?, &path)
    }

    fn save_as(&mut self, path: &Path) -> Result<(), LayoutError> {
        Self::write(self.design_ref()?, path)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn copy_to(&self, path: &Path) -> Result<(), LayoutError> {
        Self::write(self.design_ref()?, path)
    }

    fn close(&mut self) -> Result<(), LayoutError> {
        self.design = None;
        Ok(())
    }

    fn reopen(&mut self, path: &Path) -> Result<(), LayoutError> {
        self.design = Some(Self::load(path)?);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Reloads the snapshot but keeps working against the current path.
    fn restore(&mut self, snapshot: &Path) -> Result<(), LayoutError> {
        self.design = None;
        self.design = Some(Self::load(snapshot)?);
        Ok(())
    }
}
