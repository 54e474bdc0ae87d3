//! Layout Schema Definitions
//!
//! Data structures for a layout database: nets, layers, padstacks,
//! primitives, components, pin groups, ports and simulation setups.
//! All lengths are in meters.

use serde::{Deserialize, Serialize};

use crate::geometry::{CapStyle, Contour, Point, Shape, Vertex};

/// Object identifier, unique within a cell.
pub type ObjectId = u64;

/// A complete layout design
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutDesign {
    pub uuid: String,
    pub name: String,
    pub version: Option<String>,
    pub cells: Vec<Cell>,
    pub active_cell: String,
}

impl LayoutDesign {
    pub fn new(name: impl Into<String>, cell: Cell) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            active_cell: cell.name.clone(),
            cells: vec![cell],
        }
    }

    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.name == name)
    }

    pub fn cell_mut(&mut self, name: &str) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.name == name)
    }
}

/// A layout cell: everything that is cut lives here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub nets: Vec<Net>,
    pub layers: Vec<Layer>,
    pub padstack_definitions: Vec<PadstackDefinition>,
    pub padstack_instances: Vec<PadstackInstance>,
    pub primitives: Vec<Primitive>,
    pub components: Vec<Component>,
    #[serde(default)]
    pub pin_groups: Vec<PinGroup>,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub setups: Vec<SimulationSetup>,
    /// Next free object id.
    pub next_id: ObjectId,
}

impl Cell {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn definition(&self, name: &str) -> Option<&PadstackDefinition> {
        self.padstack_definitions.iter().find(|d| d.name == name)
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Names of the signal layers, top to bottom.
    pub fn signal_layer_names(&self) -> Vec<&str> {
        self.layers
            .iter()
            .filter(|l| l.layer_type == LayerType::Signal)
            .map(|l| l.name.as_str())
            .collect()
    }
}

/// Net definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Net {
    pub name: String,
    #[serde(default)]
    pub is_power_ground: bool,
}

impl Net {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_power_ground: false,
        }
    }
}

/// Stackup layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub layer_type: LayerType,
    pub thickness: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LayerType {
    #[default]
    Signal,
    Dielectric,
}

/// Padstack definition; the pad is modelled as a rectangle on every layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadstackDefinition {
    pub name: String,
    pub pad_width: f64,
    pub pad_height: f64,
    pub hole_diameter: f64,
}

/// Via or pin placement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PadstackInstance {
    pub id: ObjectId,
    pub name: String,
    pub definition: String,
    pub net: String,
    pub position: Point,
    pub start_layer: String,
    pub stop_layer: String,
    /// Owning component reference designator, for pins.
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub pin_name: Option<String>,
}

impl PadstackInstance {
    pub fn is_pin(&self) -> bool {
        self.component.is_some()
    }

    /// Pad footprint at the instance position.
    pub fn pad_shape(&self, definition: Option<&PadstackDefinition>) -> Shape {
        let (w, h) = definition
            .map(|d| (d.pad_width, d.pad_height))
            .unwrap_or((0.0, 0.0));
        let (w, h) = (w.max(1e-9), h.max(1e-9));
        Shape::rectangle(
            Point::new(self.position.x - w / 2.0, self.position.y - h / 2.0),
            Point::new(self.position.x + w / 2.0, self.position.y + h / 2.0),
        )
    }
}

/// Geometric shape on one layer belonging to one net
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Primitive {
    pub id: ObjectId,
    pub net: String,
    pub layer: String,
    pub geometry: PrimitiveGeometry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PrimitiveGeometry {
    Polygon(Shape),
    Path(PathGeometry),
}

impl Primitive {
    pub fn is_path(&self) -> bool {
        matches!(self.geometry, PrimitiveGeometry::Path(_))
    }

    pub fn void_count(&self) -> usize {
        match &self.geometry {
            PrimitiveGeometry::Polygon(shape) => shape.voids.len(),
            PrimitiveGeometry::Path(_) => 0,
        }
    }

    pub fn voids(&self) -> &[Contour] {
        match &self.geometry {
            PrimitiveGeometry::Polygon(shape) => &shape.voids,
            PrimitiveGeometry::Path(_) => &[],
        }
    }
}

/// Stroked centerline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathGeometry {
    pub centerline: Vec<Vertex>,
    pub width: f64,
    #[serde(default)]
    pub cap: CapStyle,
}

/// Component (group of pins) on the layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub name: String,
    pub part_name: String,
    pub component_type: ComponentType,
    #[serde(default)]
    pub model: Option<ComponentModel>,
}

impl Component {
    pub fn is_passive(&self) -> bool {
        matches!(
            self.component_type,
            ComponentType::Resistor | ComponentType::Capacitor | ComponentType::Inductor
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComponentType {
    Resistor,
    Capacitor,
    Inductor,
    Ic,
    Io,
    Other,
}

/// Behavioural model attached to a component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentModel {
    pub kind: ModelKind,
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelKind {
    Rlc,
    Spice,
    SParameter,
    Netlist,
}

impl ModelKind {
    /// Models whose pins must all survive a cutout.
    pub fn is_behavioral(self) -> bool {
        matches!(self, ModelKind::Spice | ModelKind::SParameter | ModelKind::Netlist)
    }
}

/// Named collection of pins used as one terminal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PinGroup {
    pub name: String,
    pub pins: Vec<ObjectId>,
}

/// Point terminal on a layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Terminal {
    pub net: String,
    pub layer: String,
    pub position: Point,
}

impl Terminal {
    pub fn new(net: &str, layer: &str, position: Point) -> Self {
        Self {
            net: net.to_string(),
            layer: layer.to_string(),
            position,
        }
    }
}

/// Excitation port: positive terminal plus its reference terminal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Port {
    pub name: String,
    pub terminal: Terminal,
    pub reference: Option<Terminal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSetup {
    pub name: String,
    pub kind: SetupKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SetupKind {
    Hfss,
    Siwave,
    SiwaveDcir,
    Q3d,
    Raptorx,
}

impl SetupKind {
    /// Setups the native cutout carries over by itself.
    pub fn survives_native_cutout(self) -> bool {
        matches!(self, SetupKind::Hfss)
    }
}

/// Summary counts for a cell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutSummary {
    pub cell: String,
    pub nets: usize,
    pub primitives: usize,
    pub voids: usize,
    pub padstack_instances: usize,
    pub components: usize,
    pub ports: usize,
    pub bounding_box: Option<crate::geometry::BBox>,
}
