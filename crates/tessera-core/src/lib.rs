pub mod diagram;
pub mod error;
pub mod placement;
pub mod rules;
pub mod settings;

pub use diagram::{
    Change, DiagramModel, Field, FieldUpdate, MutationEvent, MutationKind, SharedModel,
    SubscriptionId,
};
pub use error::ModelError;
pub use settings::{ai_configured, AiSettings, Settings, SyncSettings};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Types (wire-compatible with the canvas' JSON cells) ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    Class,
    Interface,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Class => "class",
            ElementKind::Interface => "interface",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Default for Size {
    fn default() -> Self {
        Self { width: 200.0, height: 120.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stereotype: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UmlData {
    pub class_name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedFeatures>,
}

impl UmlData {
    pub fn named(class_name: impl Into<String>) -> Self {
        Self { class_name: class_name.into(), ..Default::default() }
    }
}

/// A class or interface box on the canvas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagramElement {
    pub id: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: ElementKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub size: Size,
    pub uml_data: UmlData,
    /// Visual attributes owned by the renderer. Merged field-by-field, never replaced wholesale.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
}

fn default_kind() -> ElementKind {
    ElementKind::Class
}

impl DiagramElement {
    pub fn new(id: impl Into<String>, kind: ElementKind, uml_data: UmlData, position: Position) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            size: Size::default(),
            uml_data,
            attrs: Map::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.uml_data.class_name
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    Association,
    Aggregation,
    Composition,
    Inheritance,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Association => "association",
            RelationshipKind::Aggregation => "aggregation",
            RelationshipKind::Composition => "composition",
            RelationshipKind::Inheritance => "inheritance",
        }
    }

    pub fn carries_multiplicity(&self) -> bool {
        !matches!(self, RelationshipKind::Inheritance)
    }

    /// Arrow-head decoration for each end of the link.
    pub fn markers(&self) -> RelationshipMarkers {
        match self {
            RelationshipKind::Association => RelationshipMarkers {
                source: Marker::None,
                target: Marker::OpenArrow,
            },
            RelationshipKind::Aggregation => RelationshipMarkers {
                source: Marker::HollowDiamond,
                target: Marker::None,
            },
            RelationshipKind::Composition => RelationshipMarkers {
                source: Marker::FilledDiamond,
                target: Marker::None,
            },
            RelationshipKind::Inheritance => RelationshipMarkers {
                source: Marker::None,
                target: Marker::HollowTriangle,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Marker {
    None,
    OpenArrow,
    HollowTriangle,
    HollowDiamond,
    FilledDiamond,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RelationshipMarkers {
    pub source: Marker,
    pub target: Marker,
}

/// A text label anchored along a link, `distance` in `[0, 1]` from source to target.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelationshipLabel {
    pub text: String,
    pub distance: f64,
}

/// A typed link between two elements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRelationship {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: RelationshipKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_multiplicity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_multiplicity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DiagramRelationship {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind,
            source_multiplicity: None,
            target_multiplicity: None,
            name: None,
        }
    }

    /// Inheritance links never carry multiplicity; the values are dropped for them.
    pub fn with_multiplicity(
        mut self,
        source: Option<String>,
        target: Option<String>,
    ) -> Self {
        if self.kind.carries_multiplicity() {
            self.source_multiplicity = source;
            self.target_multiplicity = target;
        }
        self
    }

    pub fn markers(&self) -> RelationshipMarkers {
        self.kind.markers()
    }

    pub fn labels(&self) -> Vec<RelationshipLabel> {
        let mut labels = Vec::new();
        if let Some(m) = &self.source_multiplicity {
            labels.push(RelationshipLabel { text: m.clone(), distance: 0.1 });
        }
        if let Some(name) = &self.name {
            labels.push(RelationshipLabel { text: name.clone(), distance: 0.5 });
        }
        if let Some(m) = &self.target_multiplicity {
            labels.push(RelationshipLabel { text: m.clone(), distance: 0.9 });
        }
        labels
    }

    pub fn connects(&self, source: &str, target: &str, kind: RelationshipKind) -> bool {
        self.source == source && self.target == target && self.kind == kind
    }
}

/// Either kind of canvas cell, as carried by `add` mutations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cell", rename_all = "lowercase")]
pub enum Cell {
    Element(DiagramElement),
    Relationship(DiagramRelationship),
}

impl Cell {
    pub fn id(&self) -> &str {
        match self {
            Cell::Element(e) => &e.id,
            Cell::Relationship(r) => &r.id,
        }
    }
}

/// The serializable diagram tree.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagramData {
    #[serde(default)]
    pub elements: Vec<DiagramElement>,
    #[serde(default)]
    pub relationships: Vec<DiagramRelationship>,
}

// --- Identifiers ---

/// Element ids are random so that two collaborators never mint the same one.
pub fn new_element_id() -> String {
    format!("class-{}", uuid::Uuid::new_v4())
}

pub fn new_relationship_id() -> String {
    format!("rel-{}", uuid::Uuid::new_v4())
}
