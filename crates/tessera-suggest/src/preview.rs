use crate::MutationCommand;

pub const NO_CHANGES: &str = "Sin cambios propuestos";

/// Something that can show pending commands before the user approves them.
pub trait ChangePreview {
    fn show(&mut self, changes: &[MutationCommand]);
    fn clear(&mut self);
}

/// Plain-text preview, one line per pending command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextPreview {
    lines: Vec<String>,
}

impl TextPreview {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl ChangePreview for TextPreview {
    fn show(&mut self, changes: &[MutationCommand]) {
        self.lines = if changes.is_empty() {
            vec![NO_CHANGES.to_string()]
        } else {
            changes.iter().map(preview_line).collect()
        };
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

pub fn preview_line(command: &MutationCommand) -> String {
    match command {
        MutationCommand::CreateClass { class_name, attributes, methods, position, .. } => format!(
            "+ {class_name} en ({}, {}) [{} atributo(s), {} método(s)]",
            position.x,
            position.y,
            attributes.len(),
            methods.len()
        ),
        MutationCommand::AddAttribute { class_name, attribute, .. } => {
            format!("~ {class_name}: {attribute}")
        }
        MutationCommand::AddMethod { class_name, method, .. } => {
            format!("~ {class_name}: {method}")
        }
        MutationCommand::CreateRelation {
            relation_kind,
            source_class,
            target_class,
            source_multiplicity,
            target_multiplicity,
            ..
        } => {
            let mut line = format!("→ {source_class} --{}--> {target_class}", relation_kind.as_str());
            if let (Some(s), Some(t)) = (source_multiplicity, target_multiplicity) {
                line.push_str(&format!(" ({s} : {t})"));
            }
            line
        }
        MutationCommand::ModifyClass { class_name, attributes, methods, .. } => {
            let members: Vec<&str> = attributes.iter().chain(methods).map(String::as_str).collect();
            format!("~ {class_name}: {}", members.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::{Position, RelationshipKind};

    use super::*;

    #[test]
    fn empty_batch_shows_no_changes() {
        let mut preview = TextPreview::default();
        preview.show(&[]);
        assert_eq!(preview.render(), NO_CHANGES);
        preview.clear();
        assert!(preview.lines().is_empty());
    }

    #[test]
    fn one_line_per_command() {
        let mut preview = TextPreview::default();
        preview.show(&[
            MutationCommand::CreateClass {
                class_name: "Invoice".into(),
                element_kind: tessera_core::ElementKind::Class,
                attributes: vec!["+number: int".into()],
                methods: vec![],
                position: Position::new(225.0, 350.0),
                description: String::new(),
            },
            MutationCommand::CreateRelation {
                relation_kind: RelationshipKind::Association,
                source_class: "Order".into(),
                target_class: "Invoice".into(),
                source_multiplicity: Some("1".into()),
                target_multiplicity: Some("*".into()),
                source_id: None,
                target_id: None,
                description: String::new(),
            },
        ]);
        assert_eq!(
            preview.lines(),
            [
                "+ Invoice en (225, 350) [1 atributo(s), 0 método(s)]".to_string(),
                "→ Order --association--> Invoice (1 : *)".to_string(),
            ]
        );
    }
}
