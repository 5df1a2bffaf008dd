pub mod engine;
pub mod error;
pub mod execute;
mod grammar;
pub mod parse;
pub mod preview;
pub mod prompt;
pub mod validate;

pub use engine::{LlmClient, LlmEngine};
pub use error::SuggestError;
pub use execute::{execute, ExecutionFailure, ExecutionReport};
pub use parse::{parse_response, ParsedResponse};
pub use preview::{ChangePreview, TextPreview};
pub use validate::validate;

use serde::{Deserialize, Serialize};
use tessera_core::{DiagramModel, ElementKind, Position, RelationshipKind};

/// Non-mutating commentary pulled out of the model's prose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bubble {
    #[serde(rename = "type")]
    pub kind: BubbleKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_class: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BubbleKind {
    Warning,
    Suggestion,
}

/// A diagram change proposed by the model.
///
/// `*_id` fields hold the id of an element that already existed when the command was
/// produced or validated; `None` means the class is expected to come from an earlier command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationCommand {
    #[serde(rename_all = "camelCase")]
    CreateClass {
        class_name: String,
        element_kind: ElementKind,
        attributes: Vec<String>,
        methods: Vec<String>,
        position: Position,
        description: String,
    },
    #[serde(rename_all = "camelCase")]
    AddAttribute {
        class_name: String,
        attribute: String,
        target_id: Option<String>,
        description: String,
    },
    #[serde(rename_all = "camelCase")]
    AddMethod {
        class_name: String,
        method: String,
        target_id: Option<String>,
        description: String,
    },
    #[serde(rename_all = "camelCase")]
    CreateRelation {
        relation_kind: RelationshipKind,
        source_class: String,
        target_class: String,
        source_multiplicity: Option<String>,
        target_multiplicity: Option<String>,
        source_id: Option<String>,
        target_id: Option<String>,
        description: String,
    },
    #[serde(rename_all = "camelCase")]
    ModifyClass {
        class_name: String,
        attributes: Vec<String>,
        methods: Vec<String>,
        target_id: Option<String>,
        description: String,
    },
}

impl MutationCommand {
    pub fn label(&self) -> &'static str {
        match self {
            MutationCommand::CreateClass { .. } => "CREATE_CLASS",
            MutationCommand::AddAttribute { .. } => "ADD_ATTRIBUTE",
            MutationCommand::AddMethod { .. } => "ADD_METHOD",
            MutationCommand::CreateRelation { .. } => "CREATE_RELATION",
            MutationCommand::ModifyClass { .. } => "MODIFY_CLASS",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            MutationCommand::CreateClass { description, .. }
            | MutationCommand::AddAttribute { description, .. }
            | MutationCommand::AddMethod { description, .. }
            | MutationCommand::CreateRelation { description, .. }
            | MutationCommand::ModifyClass { description, .. } => description,
        }
    }

    /// The class this command creates or edits. For relations, the source class.
    pub fn class_name(&self) -> &str {
        match self {
            MutationCommand::CreateClass { class_name, .. }
            | MutationCommand::AddAttribute { class_name, .. }
            | MutationCommand::AddMethod { class_name, .. }
            | MutationCommand::ModifyClass { class_name, .. } => class_name,
            MutationCommand::CreateRelation { source_class, .. } => source_class,
        }
    }
}

/// Build the prompt, ask the model, then parse and validate its answer against `model`.
///
/// The diagram is only read; nothing is applied. Callers hold the model for the whole
/// call, so pass a snapshot when the live model is shared.
pub async fn analyze<C: LlmClient + ?Sized>(
    client: &C,
    model: &DiagramModel,
    user_context: &str,
) -> Result<ParsedResponse, SuggestError> {
    let system = prompt::system_prompt();
    let user_msg = prompt::user_message(model, user_context);

    log::info!(
        classes = model.elements().len(),
        relationships = model.relationships().len();
        "requesting diagram analysis"
    );

    let raw = client.complete(&system, &user_msg).await?;
    log::debug!(bytes = raw.len(); "raw model output received");

    let mut parsed = parse_response(&raw, model);
    let proposed = parsed.changes.len();
    parsed.changes = validate(&parsed.changes, model);
    log::info!(
        proposed = proposed,
        accepted = parsed.changes.len(),
        bubbles = parsed.bubbles.len();
        "analysis parsed"
    );
    Ok(parsed)
}
