//! JSON shapes exchanged with the session endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tessera_core::{Field, MutationKind};

/// Kind of a logged mutation, as named on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    ChangePosition,
    ChangeSize,
    ChangeAttrs,
    ChangeUmlData,
    Add,
    Remove,
    BatchStart,
    BatchStop,
    /// Anything a newer client might send. Kept so it can be logged.
    Unknown(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ChangePosition => "change:position",
            EventKind::ChangeSize => "change:size",
            EventKind::ChangeAttrs => "change:attrs",
            EventKind::ChangeUmlData => "change:umlData",
            EventKind::Add => "add",
            EventKind::Remove => "remove",
            EventKind::BatchStart => "batch:start",
            EventKind::BatchStop => "batch:stop",
            EventKind::Unknown(s) => s,
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "change:position" => EventKind::ChangePosition,
            "change:size" => EventKind::ChangeSize,
            "change:attrs" => EventKind::ChangeAttrs,
            "change:umlData" => EventKind::ChangeUmlData,
            "add" => EventKind::Add,
            "remove" => EventKind::Remove,
            "batch:start" => EventKind::BatchStart,
            "batch:stop" => EventKind::BatchStop,
            _ => EventKind::Unknown(s),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Unknown(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl From<MutationKind> for EventKind {
    fn from(kind: MutationKind) -> Self {
        match kind {
            MutationKind::Add => EventKind::Add,
            MutationKind::Remove => EventKind::Remove,
            MutationKind::Change(Field::Position) => EventKind::ChangePosition,
            MutationKind::Change(Field::Size) => EventKind::ChangeSize,
            MutationKind::Change(Field::Attrs) => EventKind::ChangeAttrs,
            MutationKind::Change(Field::UmlData) => EventKind::ChangeUmlData,
        }
    }
}

/// One mutation as it travels between collaborators. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationLogEntry {
    pub event: EventKind,
    pub element_id: String,
    #[serde(default)]
    pub data: Value,
    pub timestamp: i64,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub changes: Vec<MutationLogEntry>,
    /// `null` until the first successful exchange.
    pub last_sync: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub server_time: Option<i64>,
    #[serde(default)]
    pub changes: Vec<MutationLogEntry>,
    #[serde(default)]
    pub active_users: Vec<UserRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
