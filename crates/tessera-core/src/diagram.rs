//! The live diagram graph and its two mutation channels.
//!
//! Every mutation enters through either [`DiagramModel::apply_local`] or
//! [`DiagramModel::apply_remote`]. Local changes are reported to subscribers (the collaboration
//! capture hook among them); remote changes are applied without notifying anyone, so a change
//! received from a collaborator is never broadcast back out.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::trace;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{
    Cell, DiagramData, DiagramElement, DiagramRelationship, ExtendedFeatures, ModelError,
    Position, RelationshipKind, Size, UmlData,
};

/// The element field a change touched, as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Position,
    Size,
    Attrs,
    UmlData,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Position => "position",
            Field::Size => "size",
            Field::Attrs => "attrs",
            Field::UmlData => "umlData",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Position(Position),
    Size(Size),
    /// Shallow merge: listed keys overwrite, other keys stay.
    MergeAttrs(Map<String, Value>),
    ClassName(String),
    Attributes(Vec<String>),
    Methods(Vec<String>),
    Extended(Option<ExtendedFeatures>),
    UmlData(UmlData),
}

impl FieldUpdate {
    pub fn field(&self) -> Field {
        match self {
            FieldUpdate::Position(_) => Field::Position,
            FieldUpdate::Size(_) => Field::Size,
            FieldUpdate::MergeAttrs(_) => Field::Attrs,
            FieldUpdate::ClassName(_)
            | FieldUpdate::Attributes(_)
            | FieldUpdate::Methods(_)
            | FieldUpdate::Extended(_)
            | FieldUpdate::UmlData(_) => Field::UmlData,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    AddElement(DiagramElement),
    AddRelationship(DiagramRelationship),
    RemoveElement(String),
    RemoveRelationship(String),
    SetField { element_id: String, update: FieldUpdate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Remove,
    Change(Field),
}

/// What subscribers see for each applied local mutation.
///
/// `payload` carries the serialized delta: the whole cell for `Add`, `{"cell": ..}` for
/// `Remove`, the new value for position/size, the merged keys for attrs, and the complete
/// `umlData` block after any class-name, attribute, method or extended-feature edit.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEvent {
    pub kind: MutationKind,
    pub target_id: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Observer = Box<dyn FnMut(&MutationEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Local,
    Remote,
}

#[derive(Default)]
pub struct DiagramModel {
    data: DiagramData,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for DiagramModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagramModel")
            .field("data", &self.data)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl DiagramModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: DiagramData) -> Result<Self, ModelError> {
        check_integrity(&data)?;
        Ok(Self { data, ..Default::default() })
    }

    /// Detached copy of the diagram without any subscribers.
    pub fn snapshot(&self) -> Self {
        Self { data: self.data.clone(), ..Default::default() }
    }

    // --- Queries ---

    pub fn data(&self) -> &DiagramData {
        &self.data
    }

    pub fn elements(&self) -> &[DiagramElement] {
        &self.data.elements
    }

    pub fn relationships(&self) -> &[DiagramRelationship] {
        &self.data.relationships
    }

    pub fn element(&self, id: &str) -> Option<&DiagramElement> {
        self.data.elements.iter().find(|e| e.id == id)
    }

    pub fn relationship(&self, id: &str) -> Option<&DiagramRelationship> {
        self.data.relationships.iter().find(|r| r.id == id)
    }

    /// Exact, case-sensitive class-name lookup.
    pub fn find_by_class_name(&self, name: &str) -> Option<&DiagramElement> {
        self.data.elements.iter().find(|e| e.uml_data.class_name == name)
    }

    pub fn has_relationship(&self, source: &str, target: &str, kind: RelationshipKind) -> bool {
        self.data
            .relationships
            .iter()
            .any(|r| r.connects(source, target, kind))
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.element(id).is_some() || self.relationship(id).is_some()
    }

    // --- Mutation channels ---

    /// Apply a change made on this client. Subscribers are notified.
    pub fn apply_local(&mut self, change: Change) -> Result<(), ModelError> {
        self.apply(change, Channel::Local)
    }

    /// Apply a change received from elsewhere. Subscribers are not notified.
    pub fn apply_remote(&mut self, change: Change) -> Result<(), ModelError> {
        self.apply(change, Channel::Remote)
    }

    pub fn add_element(&mut self, element: DiagramElement) -> Result<(), ModelError> {
        self.apply_local(Change::AddElement(element))
    }

    pub fn add_relationship(&mut self, relationship: DiagramRelationship) -> Result<(), ModelError> {
        self.apply_local(Change::AddRelationship(relationship))
    }

    pub fn remove_element(&mut self, id: &str) -> Result<(), ModelError> {
        self.apply_local(Change::RemoveElement(id.to_string()))
    }

    pub fn remove_relationship(&mut self, id: &str) -> Result<(), ModelError> {
        self.apply_local(Change::RemoveRelationship(id.to_string()))
    }

    pub fn set_field(&mut self, element_id: &str, update: FieldUpdate) -> Result<(), ModelError> {
        self.apply_local(Change::SetField { element_id: element_id.to_string(), update })
    }

    fn apply(&mut self, change: Change, channel: Channel) -> Result<(), ModelError> {
        let events = self.mutate(change)?;
        trace!(events = events.len(), remote = (channel == Channel::Remote); "applied change");
        if channel == Channel::Local {
            for event in &events {
                for (_, observer) in self.observers.iter_mut() {
                    observer(event);
                }
            }
        }
        Ok(())
    }

    fn mutate(&mut self, change: Change) -> Result<Vec<MutationEvent>, ModelError> {
        match change {
            Change::AddElement(element) => {
                if self.contains_id(&element.id) {
                    return Err(ModelError::DuplicateId(element.id));
                }
                let id = element.id.clone();
                let payload = to_payload(&Cell::Element(element.clone()));
                self.data.elements.push(element);
                Ok(vec![MutationEvent { kind: MutationKind::Add, target_id: id, payload }])
            }
            Change::AddRelationship(relationship) => {
                if self.contains_id(&relationship.id) {
                    return Err(ModelError::DuplicateId(relationship.id));
                }
                for endpoint in [&relationship.source, &relationship.target] {
                    if self.element(endpoint).is_none() {
                        return Err(ModelError::DanglingEndpoint {
                            relationship: relationship.id.clone(),
                            endpoint: endpoint.clone(),
                        });
                    }
                }
                let id = relationship.id.clone();
                let payload = to_payload(&Cell::Relationship(relationship.clone()));
                self.data.relationships.push(relationship);
                Ok(vec![MutationEvent { kind: MutationKind::Add, target_id: id, payload }])
            }
            Change::RemoveElement(id) => {
                let index = self
                    .data
                    .elements
                    .iter()
                    .position(|e| e.id == id)
                    .ok_or_else(|| ModelError::ElementNotFound(id.clone()))?;

                // Links attached to the element go first, each as its own removal.
                let mut events = Vec::new();
                self.data.relationships.retain(|r| {
                    let attached = r.source == id || r.target == id;
                    if attached {
                        events.push(removal_event(&r.id, "relationship"));
                    }
                    !attached
                });
                self.data.elements.remove(index);
                events.push(removal_event(&id, "element"));
                Ok(events)
            }
            Change::RemoveRelationship(id) => {
                let index = self
                    .data
                    .relationships
                    .iter()
                    .position(|r| r.id == id)
                    .ok_or_else(|| ModelError::RelationshipNotFound(id.clone()))?;
                self.data.relationships.remove(index);
                Ok(vec![removal_event(&id, "relationship")])
            }
            Change::SetField { element_id, update } => {
                let element = self
                    .data
                    .elements
                    .iter_mut()
                    .find(|e| e.id == element_id)
                    .ok_or_else(|| ModelError::ElementNotFound(element_id.clone()))?;
                let field = update.field();
                let payload = match update {
                    FieldUpdate::Position(position) => {
                        element.position = position;
                        to_payload(&element.position)
                    }
                    FieldUpdate::Size(size) => {
                        element.size = size;
                        to_payload(&element.size)
                    }
                    FieldUpdate::MergeAttrs(delta) => {
                        for (key, value) in &delta {
                            element.attrs.insert(key.clone(), value.clone());
                        }
                        Value::Object(delta)
                    }
                    FieldUpdate::ClassName(name) => {
                        element.uml_data.class_name = name;
                        to_payload(&element.uml_data)
                    }
                    FieldUpdate::Attributes(attributes) => {
                        element.uml_data.attributes = attributes;
                        to_payload(&element.uml_data)
                    }
                    FieldUpdate::Methods(methods) => {
                        element.uml_data.methods = methods;
                        to_payload(&element.uml_data)
                    }
                    FieldUpdate::Extended(extended) => {
                        element.uml_data.extended = extended;
                        to_payload(&element.uml_data)
                    }
                    FieldUpdate::UmlData(uml_data) => {
                        element.uml_data = uml_data;
                        to_payload(&element.uml_data)
                    }
                };
                Ok(vec![MutationEvent {
                    kind: MutationKind::Change(field),
                    target_id: element_id,
                    payload,
                }])
            }
        }
    }

    // --- Observation ---

    /// Register a callback for every local mutation.
    ///
    /// Observers run while the model is borrowed, so they must not reach back into the model
    /// (through a [`SharedModel`] that would deadlock).
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&MutationEvent) + Send + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    // --- Serialization ---

    pub fn to_json(&self) -> Result<Value, ModelError> {
        Ok(serde_json::to_value(&self.data)?)
    }

    pub fn from_json(value: Value) -> Result<Self, ModelError> {
        let data: DiagramData = serde_json::from_value(value)?;
        Self::from_data(data)
    }

    /// Replace the whole diagram. Subscriptions survive; nothing is reported to them.
    pub fn load_json(&mut self, value: Value) -> Result<(), ModelError> {
        let data: DiagramData = serde_json::from_value(value)?;
        check_integrity(&data)?;
        self.data = data;
        Ok(())
    }
}

fn removal_event(id: &str, cell: &str) -> MutationEvent {
    MutationEvent {
        kind: MutationKind::Remove,
        target_id: id.to_string(),
        payload: json!({ "cell": cell }),
    }
}

fn to_payload<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

fn check_integrity(data: &DiagramData) -> Result<(), ModelError> {
    let mut ids = HashSet::new();
    for id in data
        .elements
        .iter()
        .map(|e| &e.id)
        .chain(data.relationships.iter().map(|r| &r.id))
    {
        if !ids.insert(id.as_str()) {
            return Err(ModelError::DuplicateId(id.clone()));
        }
    }
    for r in &data.relationships {
        for endpoint in [&r.source, &r.target] {
            if !data.elements.iter().any(|e| &e.id == endpoint) {
                return Err(ModelError::DanglingEndpoint {
                    relationship: r.id.clone(),
                    endpoint: endpoint.clone(),
                });
            }
        }
    }
    Ok(())
}

/// A [`DiagramModel`] shared between the editor, the command executor and the sync loop.
///
/// Each call to [`SharedModel::with`] is one uninterrupted turn on the model.
#[derive(Debug, Clone, Default)]
pub struct SharedModel(Arc<Mutex<DiagramModel>>);

impl SharedModel {
    pub fn new(model: DiagramModel) -> Self {
        Self(Arc::new(Mutex::new(model)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut DiagramModel) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
