//! Folding collaborators' mutations into the local diagram.
//!
//! Everything here goes through [`DiagramModel::apply_remote`], so merged changes are never
//! captured and sent back out. Entries carrying the local user id are echoes of our own edits
//! and are skipped.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use tessera_core::{Cell, Change, DiagramModel, ExtendedFeatures, FieldUpdate, Position, Size, UmlData};

use crate::{EventKind, MutationLogEntry, SyncError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub applied: usize,
    pub echoes: usize,
    /// Batch markers, unknown kinds, and changes the diagram already reflects.
    pub skipped: usize,
    pub failed: usize,
}

pub fn merge_remote(entries: &[MutationLogEntry], local_user_id: &str, model: &mut DiagramModel) -> MergeReport {
    let mut report = MergeReport::default();

    for entry in entries {
        if entry.user_id == local_user_id {
            report.echoes += 1;
            continue;
        }
        match change_for(entry, model) {
            Ok(Some(change)) => match model.apply_remote(change) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    warn!(
                        event = entry.event.as_str(),
                        element = entry.element_id.as_str(),
                        error = err.to_string();
                        "remote change rejected"
                    );
                    report.failed += 1;
                }
            },
            Ok(None) => report.skipped += 1,
            Err(err) => {
                warn!(
                    event = entry.event.as_str(),
                    element = entry.element_id.as_str(),
                    error = err.to_string();
                    "unreadable remote change"
                );
                report.failed += 1;
            }
        }
    }

    debug!(
        applied = report.applied,
        echoes = report.echoes,
        skipped = report.skipped,
        failed = report.failed;
        "merged remote changes"
    );
    report
}

/// Translate one entry into a model change, or `None` when there is nothing to do.
fn change_for(entry: &MutationLogEntry, model: &DiagramModel) -> Result<Option<Change>, SyncError> {
    let id = entry.element_id.as_str();
    let update = match &entry.event {
        EventKind::BatchStart | EventKind::BatchStop => return Ok(None),
        EventKind::Unknown(kind) => {
            warn!(event = kind.as_str(), element = id; "ignoring unknown remote event");
            return Ok(None);
        }
        EventKind::Add => {
            let cell: Cell = payload(entry)?;
            if model.contains_id(cell.id()) {
                return Ok(None);
            }
            return Ok(Some(match cell {
                Cell::Element(element) => Change::AddElement(element),
                Cell::Relationship(mut relationship) => {
                    if !relationship.kind.carries_multiplicity() {
                        relationship.source_multiplicity = None;
                        relationship.target_multiplicity = None;
                    }
                    Change::AddRelationship(relationship)
                }
            }));
        }
        EventKind::Remove => {
            return Ok(if model.element(id).is_some() {
                Some(Change::RemoveElement(id.to_string()))
            } else if model.relationship(id).is_some() {
                Some(Change::RemoveRelationship(id.to_string()))
            } else {
                None
            });
        }
        EventKind::ChangePosition => FieldUpdate::Position(payload::<Position>(entry)?),
        EventKind::ChangeSize => FieldUpdate::Size(payload::<Size>(entry)?),
        EventKind::ChangeAttrs => match &entry.data {
            Value::Object(delta) => FieldUpdate::MergeAttrs(delta.clone()),
            _ => return Ok(None),
        },
        EventKind::ChangeUmlData => match uml_update(entry)? {
            Some(update) => update,
            None => return Ok(None),
        },
    };

    if model.element(id).is_none() {
        debug!(event = entry.event.as_str(), element = id; "remote change for unknown element");
        return Ok(None);
    }
    Ok(Some(Change::SetField { element_id: id.to_string(), update }))
}

const EXTENDED_KEYS: [&str; 3] = ["stereotype", "isAbstract", "constraints"];

/// A full `umlData` block replaces the class data; a bare extended-feature block only touches
/// the extended metadata. Anything else is ignored, since every extended field defaults and
/// an unrelated object would otherwise clear them.
fn uml_update(entry: &MutationLogEntry) -> Result<Option<FieldUpdate>, SyncError> {
    let data = &entry.data;
    if data.get("className").is_some() {
        return Ok(Some(FieldUpdate::UmlData(payload::<UmlData>(entry)?)));
    }
    let extended = match data.get("extended") {
        Some(Value::Null) => None,
        Some(block) => Some(parse::<ExtendedFeatures>(entry, block.clone())?),
        None if EXTENDED_KEYS.iter().any(|key| data.get(key).is_some()) => {
            Some(payload::<ExtendedFeatures>(entry)?)
        }
        None => {
            warn!(element = entry.element_id.as_str(); "ignoring umlData change without class or extended data");
            return Ok(None);
        }
    };
    Ok(Some(FieldUpdate::Extended(extended)))
}

fn payload<T: DeserializeOwned>(entry: &MutationLogEntry) -> Result<T, SyncError> {
    parse(entry, entry.data.clone())
}

fn parse<T: DeserializeOwned>(entry: &MutationLogEntry, value: Value) -> Result<T, SyncError> {
    serde_json::from_value(value).map_err(|source| SyncError::Payload {
        event: entry.event.as_str().to_string(),
        source,
    })
}
