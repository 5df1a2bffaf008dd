//! Applies validated commands to the live diagram.
//!
//! Commands run in the order given; nothing is reordered, so a class must be created before a
//! later command references it. Each command is one turn on the shared model and the executor
//! yields between commands, so a sync tick may land in between. A command whose target
//! disappeared in the meantime fails alone; the rest of the batch still runs.

use log::{info, warn};
use serde::Serialize;

use tessera_core::{
    new_element_id, new_relationship_id, DiagramElement, DiagramModel, DiagramRelationship,
    FieldUpdate, SharedModel, UmlData,
};

use crate::{MutationCommand, SuggestError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    pub command: &'static str,
    pub description: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub applied: usize,
    /// Commands the diagram already satisfied by the time they ran.
    pub skipped: usize,
    pub failures: Vec<ExecutionFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    AlreadySatisfied,
}

pub async fn execute(changes: &[MutationCommand], model: &SharedModel) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for (i, command) in changes.iter().enumerate() {
        if i > 0 {
            tokio::task::yield_now().await;
        }
        match model.with(|m| apply_command(command, m)) {
            Ok(Outcome::Applied) => report.applied += 1,
            Ok(Outcome::AlreadySatisfied) => report.skipped += 1,
            Err(err) => {
                warn!(
                    command = command.label(),
                    class = command.class_name(),
                    error = err.to_string();
                    "change could not be applied"
                );
                report.failures.push(ExecutionFailure {
                    command: command.label(),
                    description: command.description().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        applied = report.applied,
        skipped = report.skipped,
        failed = report.failures.len();
        "changes executed"
    );
    report
}

/// Apply one command through the local channel.
pub fn apply_command(command: &MutationCommand, model: &mut DiagramModel) -> Result<Outcome, SuggestError> {
    match command {
        MutationCommand::CreateClass {
            class_name,
            element_kind,
            attributes,
            methods,
            position,
            ..
        } => {
            if model.find_by_class_name(class_name).is_some() {
                return Err(SuggestError::DuplicateClass(class_name.clone()));
            }
            let uml = UmlData {
                class_name: class_name.clone(),
                attributes: attributes.clone(),
                methods: methods.clone(),
                extended: None,
            };
            model.add_element(DiagramElement::new(new_element_id(), *element_kind, uml, *position))?;
            Ok(Outcome::Applied)
        }
        MutationCommand::AddAttribute { class_name, attribute, target_id, .. } => {
            let id = resolve(model, target_id.as_deref(), class_name)?;
            append_members(model, &id, std::slice::from_ref(attribute), &[])
        }
        MutationCommand::AddMethod { class_name, method, target_id, .. } => {
            let id = resolve(model, target_id.as_deref(), class_name)?;
            append_members(model, &id, &[], std::slice::from_ref(method))
        }
        MutationCommand::ModifyClass { class_name, attributes, methods, target_id, .. } => {
            let id = resolve(model, target_id.as_deref(), class_name)?;
            append_members(model, &id, attributes, methods)
        }
        MutationCommand::CreateRelation {
            relation_kind,
            source_class,
            target_class,
            source_multiplicity,
            target_multiplicity,
            source_id,
            target_id,
            ..
        } => {
            let source = resolve(model, source_id.as_deref(), source_class)?;
            let target = resolve(model, target_id.as_deref(), target_class)?;
            if model.has_relationship(&source, &target, *relation_kind) {
                return Ok(Outcome::AlreadySatisfied);
            }
            let relationship = DiagramRelationship::new(new_relationship_id(), source, target, *relation_kind)
                .with_multiplicity(source_multiplicity.clone(), target_multiplicity.clone());
            model.add_relationship(relationship)?;
            Ok(Outcome::Applied)
        }
    }
}

/// Prefer the id resolved at validation time; fall back to the class name if that element
/// is gone or was renamed.
fn resolve(model: &DiagramModel, id: Option<&str>, class_name: &str) -> Result<String, SuggestError> {
    if let Some(element) = id.and_then(|id| model.element(id)) {
        if element.class_name() == class_name {
            return Ok(element.id.clone());
        }
    }
    model
        .find_by_class_name(class_name)
        .map(|e| e.id.clone())
        .ok_or_else(|| SuggestError::ClassNotFound(class_name.to_string()))
}

fn append_members(
    model: &mut DiagramModel,
    id: &str,
    attributes: &[String],
    methods: &[String],
) -> Result<Outcome, SuggestError> {
    let element = model
        .element(id)
        .ok_or_else(|| SuggestError::ClassNotFound(id.to_string()))?;
    let mut uml = element.uml_data.clone();
    let mut changed = false;
    for a in attributes {
        if !uml.attributes.contains(a) {
            uml.attributes.push(a.clone());
            changed = true;
        }
    }
    for m in methods {
        if !uml.methods.contains(m) {
            uml.methods.push(m.clone());
            changed = true;
        }
    }
    if !changed {
        return Ok(Outcome::AlreadySatisfied);
    }
    model.set_field(id, FieldUpdate::UmlData(uml))?;
    Ok(Outcome::Applied)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tessera_core::{ElementKind, Position, RelationshipKind};

    use super::*;
    use crate::{parse_response, validate};

    fn shared(classes: &[&str]) -> SharedModel {
        let mut model = DiagramModel::new();
        for (i, name) in classes.iter().enumerate() {
            model
                .add_element(DiagramElement::new(
                    format!("c{i}"),
                    ElementKind::Class,
                    UmlData::named(*name),
                    Position::new(100.0 + 250.0 * i as f64, 100.0),
                ))
                .unwrap();
        }
        SharedModel::new(model)
    }

    fn proposals(text: &str, model: &SharedModel) -> Vec<MutationCommand> {
        model.with(|m| {
            let parsed = parse_response(&format!("COMANDOS:\n{text}"), m);
            validate(&parsed.changes, m)
        })
    }

    #[tokio::test]
    async fn association_is_added_once() {
        let model = shared(&["Order", "Customer"]);
        let command = "CREAR_RELACIÓN: association | Order -> Customer | 1";

        let first = proposals(command, &model);
        assert_eq!(first.len(), 1);
        let report = execute(&first, &model).await;
        assert_eq!(report.applied, 1);

        model.with(|m| {
            assert_eq!(m.relationships().len(), 1);
            let rel = &m.relationships()[0];
            assert_eq!((rel.source.as_str(), rel.target.as_str()), ("c0", "c1"));
            assert_eq!(rel.kind, RelationshipKind::Association);
            assert_eq!(rel.source_multiplicity.as_deref(), Some("1"));
        });

        let second = proposals(command, &model);
        assert!(second.is_empty());
        execute(&second, &model).await;
        assert_eq!(model.with(|m| m.relationships().len()), 1);
    }

    #[tokio::test]
    async fn create_class_twice_yields_one_element() {
        let model = shared(&[]);
        let batch = proposals("CREAR_CLASE: Invoice | number: int", &model);
        execute(&batch, &model).await;
        let again = proposals("CREAR_CLASE: Invoice | number: int", &model);
        assert!(again.is_empty());
        execute(&again, &model).await;

        model.with(|m| {
            assert_eq!(m.elements().len(), 1);
            assert_eq!(m.elements()[0].uml_data.attributes, ["+number: int"]);
        });
    }

    #[tokio::test]
    async fn a_vanished_target_fails_alone() {
        let model = shared(&["Order", "Customer"]);
        let batch = proposals(
            "AGREGAR_ATRIBUTO: Customer | email: String\nAGREGAR_ATRIBUTO: Order | total: float",
            &model,
        );
        assert_eq!(batch.len(), 2);

        // A collaborator deletes Customer between validation and execution.
        model.with(|m| m.apply_remote(tessera_core::Change::RemoveElement("c1".into()))).unwrap();

        let report = execute(&batch, &model).await;
        assert_eq!(report.applied, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].command, "ADD_ATTRIBUTE");
        model.with(|m| {
            assert_eq!(m.find_by_class_name("Order").unwrap().uml_data.attributes, ["+total: float"]);
        });
    }

    #[tokio::test]
    async fn created_classes_can_be_referenced_later_in_the_batch() {
        let model = shared(&["Order"]);
        let batch = proposals(
            "CREAR_CLASE: Invoice\nAGREGAR_METODO: Invoice | emit()\nCREAR_RELACIÓN: composición | Order -> Invoice | 1 : *",
            &model,
        );
        let report = execute(&batch, &model).await;
        assert_eq!(report.applied, 3);
        model.with(|m| {
            let invoice = m.find_by_class_name("Invoice").unwrap();
            assert_eq!(invoice.uml_data.methods, ["+emit()"]);
            assert!(m.has_relationship("c0", &invoice.id, RelationshipKind::Composition));
            let rel = &m.relationships()[0];
            assert_eq!(rel.source_multiplicity.as_deref(), Some("1"));
            assert_eq!(rel.target_multiplicity.as_deref(), Some("*"));
        });
    }

    #[tokio::test]
    async fn a_reference_before_creation_fails_without_reordering() {
        let model = shared(&[]);
        let batch = vec![
            MutationCommand::AddMethod {
                class_name: "Invoice".into(),
                method: "+emit()".into(),
                target_id: None,
                description: String::new(),
            },
            MutationCommand::CreateClass {
                class_name: "Invoice".into(),
                element_kind: ElementKind::Class,
                attributes: vec![],
                methods: vec![],
                position: Position::new(100.0, 100.0),
                description: String::new(),
            },
        ];
        let report = execute(&batch, &model).await;
        assert_eq!(report.applied, 1);
        assert_eq!(report.failures[0].command, "ADD_METHOD");
    }

    #[tokio::test]
    async fn executed_changes_go_through_the_local_channel() {
        let model = shared(&["Order"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        model.with(|m| m.subscribe(move |e| sink.lock().unwrap().push(e.target_id.clone())));

        let batch = proposals("AGREGAR_ATRIBUTO: Order | total: float\nCREAR_CLASE: Invoice", &model);
        execute(&batch, &model).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], "c0");
    }
}
