//! Conservative filter that drops commands the diagram already satisfies or cannot satisfy.
//!
//! Dropping a legitimate command is acceptable; letting a duplicate through is not. Commands
//! are checked in order against the diagram plus everything accepted before them, so a batch
//! may create a class and then reference it.

use std::collections::{HashMap, HashSet};

use log::debug;

use tessera_core::{DiagramModel, RelationshipKind};

use crate::parse::modify_description;
use crate::MutationCommand;

#[derive(Default)]
struct Members {
    attributes: HashSet<String>,
    methods: HashSet<String>,
}

/// Diagram state as seen by the command currently under review.
struct BatchView<'a> {
    model: &'a DiagramModel,
    created: HashMap<String, Members>,
    added: HashMap<String, Members>,
    relations: HashSet<(String, String, RelationshipKind)>,
}

impl<'a> BatchView<'a> {
    fn new(model: &'a DiagramModel) -> Self {
        Self {
            model,
            created: HashMap::new(),
            added: HashMap::new(),
            relations: HashSet::new(),
        }
    }

    fn class_exists(&self, name: &str) -> bool {
        self.model.find_by_class_name(name).is_some() || self.created.contains_key(name)
    }

    fn has_attribute(&self, class: &str, attribute: &str) -> bool {
        let in_model = self
            .model
            .find_by_class_name(class)
            .is_some_and(|e| e.uml_data.attributes.iter().any(|a| a == attribute));
        in_model
            || self.created.get(class).is_some_and(|m| m.attributes.contains(attribute))
            || self.added.get(class).is_some_and(|m| m.attributes.contains(attribute))
    }

    fn has_method(&self, class: &str, method: &str) -> bool {
        let in_model = self
            .model
            .find_by_class_name(class)
            .is_some_and(|e| e.uml_data.methods.iter().any(|m| m == method));
        in_model
            || self.created.get(class).is_some_and(|m| m.methods.contains(method))
            || self.added.get(class).is_some_and(|m| m.methods.contains(method))
    }

    fn has_relation(&self, source: &str, target: &str, kind: RelationshipKind) -> bool {
        if self
            .relations
            .contains(&(source.to_string(), target.to_string(), kind))
        {
            return true;
        }
        match (self.model.find_by_class_name(source), self.model.find_by_class_name(target)) {
            (Some(s), Some(t)) => self.model.has_relationship(&s.id, &t.id, kind),
            _ => false,
        }
    }

    fn target_id(&self, class: &str) -> Option<String> {
        self.model.find_by_class_name(class).map(|e| e.id.clone())
    }
}

/// Keep the commands that are valid against `model`, with target ids re-resolved.
pub fn validate(changes: &[MutationCommand], model: &DiagramModel) -> Vec<MutationCommand> {
    let mut view = BatchView::new(model);
    let mut accepted = Vec::with_capacity(changes.len());

    for command in changes {
        match check(command, &mut view) {
            Ok(valid) => accepted.push(valid),
            Err(reason) => {
                debug!(
                    command = command.label(),
                    class = command.class_name(),
                    reason = reason;
                    "dropping proposed change"
                );
            }
        }
    }
    accepted
}

fn check(command: &MutationCommand, view: &mut BatchView<'_>) -> Result<MutationCommand, &'static str> {
    match command {
        MutationCommand::CreateClass { class_name, attributes, methods, .. } => {
            if view.class_exists(class_name) {
                return Err("class already exists");
            }
            view.created.insert(
                class_name.clone(),
                Members {
                    attributes: attributes.iter().cloned().collect(),
                    methods: methods.iter().cloned().collect(),
                },
            );
            Ok(command.clone())
        }
        MutationCommand::AddAttribute { class_name, attribute, description, .. } => {
            if !view.class_exists(class_name) {
                return Err("class does not exist");
            }
            if view.has_attribute(class_name, attribute) {
                return Err("attribute already present");
            }
            view.added
                .entry(class_name.clone())
                .or_default()
                .attributes
                .insert(attribute.clone());
            Ok(MutationCommand::AddAttribute {
                class_name: class_name.clone(),
                attribute: attribute.clone(),
                target_id: view.target_id(class_name),
                description: description.clone(),
            })
        }
        MutationCommand::AddMethod { class_name, method, description, .. } => {
            if !view.class_exists(class_name) {
                return Err("class does not exist");
            }
            if view.has_method(class_name, method) {
                return Err("method already present");
            }
            view.added
                .entry(class_name.clone())
                .or_default()
                .methods
                .insert(method.clone());
            Ok(MutationCommand::AddMethod {
                class_name: class_name.clone(),
                method: method.clone(),
                target_id: view.target_id(class_name),
                description: description.clone(),
            })
        }
        MutationCommand::CreateRelation {
            relation_kind,
            source_class,
            target_class,
            source_multiplicity,
            target_multiplicity,
            description,
            ..
        } => {
            if !view.class_exists(source_class) || !view.class_exists(target_class) {
                return Err("relation endpoint does not exist");
            }
            if view.has_relation(source_class, target_class, *relation_kind) {
                return Err("relation already present");
            }
            view.relations
                .insert((source_class.clone(), target_class.clone(), *relation_kind));
            Ok(MutationCommand::CreateRelation {
                relation_kind: *relation_kind,
                source_class: source_class.clone(),
                target_class: target_class.clone(),
                source_multiplicity: source_multiplicity.clone(),
                target_multiplicity: target_multiplicity.clone(),
                source_id: view.target_id(source_class),
                target_id: view.target_id(target_class),
                description: description.clone(),
            })
        }
        MutationCommand::ModifyClass { class_name, attributes, methods, .. } => {
            if !view.class_exists(class_name) {
                return Err("class does not exist");
            }
            let mut new_attributes = Vec::new();
            for a in attributes {
                if !view.has_attribute(class_name, a) && !new_attributes.contains(a) {
                    new_attributes.push(a.clone());
                }
            }
            let mut new_methods = Vec::new();
            for m in methods {
                if !view.has_method(class_name, m) && !new_methods.contains(m) {
                    new_methods.push(m.clone());
                }
            }
            if new_attributes.is_empty() && new_methods.is_empty() {
                return Err("nothing new to add");
            }
            let members = view.added.entry(class_name.clone()).or_default();
            members.attributes.extend(new_attributes.iter().cloned());
            members.methods.extend(new_methods.iter().cloned());
            Ok(MutationCommand::ModifyClass {
                description: modify_description(class_name, &new_attributes, &new_methods),
                class_name: class_name.clone(),
                attributes: new_attributes,
                methods: new_methods,
                target_id: view.target_id(class_name),
            })
        }
    }
}
