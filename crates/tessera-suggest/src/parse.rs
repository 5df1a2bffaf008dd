use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use tessera_core::placement::find_free_position;
use tessera_core::{DiagramModel, Position};

use crate::grammar::{self, strip_prefix_ci, RawCommand};
use crate::{Bubble, BubbleKind, MutationCommand};

pub const DEFAULT_ANALYSIS: &str = "El modelo no devolvió un análisis del diagrama.";

const ANALYSIS_LABELS: [&str; 3] = ["ANÁLISIS", "ANALISIS", "ANALYSIS"];
const COMMANDS_LABELS: [&str; 2] = ["COMANDOS", "COMMANDS"];
const NO_COMMANDS: [&str; 5] = ["NINGUNO", "NINGUNA", "NONE", "N/A", "-"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResponse {
    pub analysis: String,
    pub bubbles: Vec<Bubble>,
    pub changes: Vec<MutationCommand>,
}

/// Parse raw model output into analysis text, advisory bubbles and candidate commands.
///
/// Never fails: anything that does not fit the expected layout is dropped. Commands are not
/// validated here; run them through [`crate::validate`] before applying.
pub fn parse_response(raw: &str, model: &DiagramModel) -> ParsedResponse {
    let lines: Vec<&str> = raw.lines().collect();

    let commands_at = lines
        .iter()
        .position(|line| label_rest(line, &COMMANDS_LABELS).is_some());
    let (prose, block) = match commands_at {
        Some(i) => {
            let first = label_rest(lines[i], &COMMANDS_LABELS).unwrap_or("");
            let mut block = vec![first];
            block.extend_from_slice(&lines[i + 1..]);
            (&lines[..i], block)
        }
        None => (&lines[..], Vec::new()),
    };

    let analysis = extract_analysis(prose);
    let bubble_source = analysis.clone().unwrap_or_else(|| prose.join("\n"));
    let bubbles = extract_bubbles(&bubble_source, model);

    ParsedResponse {
        analysis: analysis.unwrap_or_else(|| DEFAULT_ANALYSIS.to_string()),
        bubbles,
        changes: extract_commands(&block, model),
    }
}

/// If `line` opens with one of `labels` followed by a colon, return what follows the colon.
fn label_rest<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let line = line.trim().trim_start_matches(['#', '*', '>', ' ']);
    labels.iter().find_map(|label| {
        let rest = strip_prefix_ci(line, label)?;
        let rest = rest.trim_start_matches('*').trim_start().strip_prefix(':')?;
        Some(rest.trim_start_matches('*').trim())
    })
}

fn extract_analysis(prose: &[&str]) -> Option<String> {
    let start = prose
        .iter()
        .position(|line| label_rest(line, &ANALYSIS_LABELS).is_some())?;
    let mut parts = vec![label_rest(prose[start], &ANALYSIS_LABELS).unwrap_or("")];
    parts.extend(prose[start + 1..].iter().map(|l| l.trim()));
    let text = parts.join("\n").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_commands(block: &[&str], model: &DiagramModel) -> Vec<MutationCommand> {
    let meaningful: Vec<&str> = block
        .iter()
        .map(|l| grammar::strip_list_marker(l))
        .filter(|l| !l.is_empty())
        .collect();
    if meaningful.is_empty()
        || meaningful
            .iter()
            .all(|l| NO_COMMANDS.iter().any(|n| l.trim_end_matches('*').eq_ignore_ascii_case(n)))
    {
        return Vec::new();
    }

    // New classes in this batch occupy space for the ones after them.
    let mut occupied: Vec<Position> = model.elements().iter().map(|e| e.position).collect();
    let target_id = |name: &str| model.find_by_class_name(name).map(|e| e.id.clone());

    let mut changes = Vec::new();
    for line in meaningful {
        let Some(raw) = grammar::parse_line(line) else {
            continue;
        };
        let command = match raw {
            RawCommand::CreateClass { name, kind, attributes, methods } => {
                let position = find_free_position(&occupied);
                occupied.push(position);
                MutationCommand::CreateClass {
                    description: format!("Crear {} {name}", kind_word(kind)),
                    class_name: name,
                    element_kind: kind,
                    attributes,
                    methods,
                    position,
                }
            }
            RawCommand::AddAttribute { class, attribute } => MutationCommand::AddAttribute {
                description: format!("Agregar atributo {attribute} a {class}"),
                target_id: target_id(&class),
                class_name: class,
                attribute,
            },
            RawCommand::AddMethod { class, method } => MutationCommand::AddMethod {
                description: format!("Agregar método {method} a {class}"),
                target_id: target_id(&class),
                class_name: class,
                method,
            },
            RawCommand::CreateRelation {
                kind,
                source,
                target,
                source_multiplicity,
                target_multiplicity,
            } => MutationCommand::CreateRelation {
                description: format!("Crear {} {source} → {target}", kind.as_str()),
                source_id: target_id(&source),
                target_id: target_id(&target),
                relation_kind: kind,
                source_class: source,
                target_class: target,
                source_multiplicity,
                target_multiplicity,
            },
            RawCommand::ModifyClass { class, attributes, methods } => MutationCommand::ModifyClass {
                description: modify_description(&class, &attributes, &methods),
                target_id: target_id(&class),
                class_name: class,
                attributes,
                methods,
            },
        };
        changes.push(command);
    }
    changes
}

pub(crate) fn modify_description(class: &str, attributes: &[String], methods: &[String]) -> String {
    format!(
        "Modificar {class}: {} atributo(s), {} método(s)",
        attributes.len(),
        methods.len()
    )
}

fn kind_word(kind: tessera_core::ElementKind) -> &'static str {
    match kind {
        tessera_core::ElementKind::Class => "clase",
        tessera_core::ElementKind::Interface => "interfaz",
    }
}

// --- Bubbles ---

fn warning_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:lacks?|is missing|carece de|le falta(?:n)?|no tiene)\b\s*\S")
            .expect("warning pattern compiles")
    })
}

fn suggestion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:should (?:have|include)|deber[ií]an? (?:tener|incluir)|recommends?|recommended|recomiendo|recomendamos|recomienda|consider|considera|considere|considerar)\b\s*\S",
        )
        .expect("suggestion pattern compiles")
    })
}

/// Best-effort commentary extraction from hedging phrases. False positives are expected.
pub fn extract_bubbles(text: &str, model: &DiagramModel) -> Vec<Bubble> {
    let mut bubbles: Vec<Bubble> = Vec::new();
    for sentence in text.split(['.', '\n', '!', ';']) {
        let sentence = sentence.trim().trim_start_matches(['-', '*', ' ']).trim();
        if sentence.is_empty() {
            continue;
        }
        let kind = if warning_re().is_match(sentence) {
            BubbleKind::Warning
        } else if suggestion_re().is_match(sentence) {
            BubbleKind::Suggestion
        } else {
            continue;
        };
        if bubbles.iter().any(|b| b.message == sentence) {
            continue;
        }
        bubbles.push(Bubble {
            kind,
            message: sentence.to_string(),
            target_class: mentioned_class(sentence, model),
        });
    }
    bubbles
}

fn mentioned_class(sentence: &str, model: &DiagramModel) -> Option<String> {
    sentence
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .find_map(|word| model.find_by_class_name(word).map(|e| e.class_name().to_string()))
}

#[cfg(test)]
mod tests {
    use tessera_core::{DiagramElement, ElementKind, RelationshipKind, UmlData};

    use super::*;

    fn model_with(classes: &[(&str, f64, f64)]) -> DiagramModel {
        let mut model = DiagramModel::new();
        for (i, (name, x, y)) in classes.iter().enumerate() {
            model
                .add_element(DiagramElement::new(
                    format!("c{i}"),
                    ElementKind::Class,
                    UmlData::named(*name),
                    Position::new(*x, *y),
                ))
                .unwrap();
        }
        model
    }

    #[test]
    fn full_response_is_split_into_parts() {
        let model = model_with(&[("Order", 100.0, 100.0), ("Customer", 350.0, 100.0)]);
        let raw = "\
ANÁLISIS: El diagrama es correcto en general. La clase Order carece de un total.
Recomiendo relacionar Customer con Order.

COMANDOS:
AGREGAR_ATRIBUTO: Order | total: float
CREAR_RELACIÓN: asociación | Order -> Customer | 1
CREAR_CLASE: Invoice | number: int | emit()
";
        let parsed = parse_response(raw, &model);

        assert!(parsed.analysis.starts_with("El diagrama es correcto"));
        assert!(parsed.analysis.contains("Recomiendo"));
        assert_eq!(parsed.changes.len(), 3);

        assert_eq!(
            parsed.changes[0],
            MutationCommand::AddAttribute {
                class_name: "Order".into(),
                attribute: "+total: float".into(),
                target_id: Some("c0".into()),
                description: "Agregar atributo +total: float a Order".into(),
            }
        );
        assert!(matches!(
            &parsed.changes[1],
            MutationCommand::CreateRelation {
                relation_kind: RelationshipKind::Association,
                source_id: Some(s),
                target_id: Some(t),
                ..
            } if s == "c0" && t == "c1"
        ));
        assert!(matches!(
            &parsed.changes[2],
            MutationCommand::CreateClass { position, .. } if *position == Position::new(225.0, 350.0)
        ));

        assert_eq!(parsed.bubbles.len(), 2);
        assert_eq!(parsed.bubbles[0].kind, BubbleKind::Warning);
        assert_eq!(parsed.bubbles[0].target_class.as_deref(), Some("Order"));
        assert_eq!(parsed.bubbles[1].kind, BubbleKind::Suggestion);
        assert_eq!(parsed.bubbles[1].target_class.as_deref(), Some("Customer"));
    }

    #[test]
    fn none_marker_means_no_changes() {
        let model = model_with(&[("Order", 0.0, 0.0)]);
        let parsed = parse_response("ANÁLISIS: Todo bien.\nCOMANDOS: NINGUNO", &model);
        assert!(parsed.changes.is_empty());
        assert_eq!(parsed.analysis, "Todo bien.");

        let parsed = parse_response("ANÁLISIS: Todo bien.\nCOMANDOS:\n- ninguno\n", &model);
        assert!(parsed.changes.is_empty());
    }

    #[test]
    fn missing_commands_block_means_no_changes() {
        let parsed = parse_response("ANÁLISIS: nada que decir", &DiagramModel::new());
        assert!(parsed.changes.is_empty());
        assert_eq!(parsed.analysis, "nada que decir");
    }

    #[test]
    fn missing_analysis_uses_the_default() {
        let parsed = parse_response("COMANDOS:\nCREAR_CLASE: Foo", &DiagramModel::new());
        assert_eq!(parsed.analysis, DEFAULT_ANALYSIS);
        assert_eq!(parsed.changes.len(), 1);
    }

    #[test]
    fn markdown_decorated_labels_are_recognized() {
        let raw = "**ANÁLISIS:** bien\n\n### COMANDOS:\n```\n- CREAR_CLASE: Foo\n```";
        let parsed = parse_response(raw, &DiagramModel::new());
        assert_eq!(parsed.analysis, "bien");
        assert_eq!(parsed.changes.len(), 1);
    }

    #[test]
    fn bold_commands_keep_trailing_star_multiplicity() {
        let model = model_with(&[("Order", 0.0, 0.0), ("Customer", 300.0, 0.0)]);
        let raw = "COMANDOS:
1. **CREAR_RELACIÓN:** asociación | Order -> Customer | 1 : *
**NINGUNO**";
        let parsed = parse_response(raw, &model);
        assert_eq!(parsed.changes.len(), 1);
        match &parsed.changes[0] {
            MutationCommand::CreateRelation { source_multiplicity, target_multiplicity, .. } => {
                assert_eq!(source_multiplicity.as_deref(), Some("1"));
                assert_eq!(target_multiplicity.as_deref(), Some("*"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let parsed = parse_response("COMANDOS:
**NINGUNO**", &model);
        assert!(parsed.changes.is_empty());
    }

    #[test]
    fn unrecognized_lines_are_ignored() {
        let raw = "COMANDOS:\nHola\nCREAR_CLASE: Foo\nBORRAR: Bar\nAGREGAR_METODO: Foo | run()";
        let parsed = parse_response(raw, &DiagramModel::new());
        let labels: Vec<_> = parsed.changes.iter().map(|c| c.label()).collect();
        assert_eq!(labels, ["CREATE_CLASS", "ADD_METHOD"]);
    }

    #[test]
    fn classes_created_together_do_not_overlap() {
        let raw = "COMANDOS:\nCREAR_CLASE: A\nCREAR_CLASE: B\nCREAR_CLASE: C";
        let parsed = parse_response(raw, &DiagramModel::new());
        let positions: Vec<Position> = parsed
            .changes
            .iter()
            .filter_map(|c| match c {
                MutationCommand::CreateClass { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(positions[0], Position::new(100.0, 100.0));
        assert_eq!(positions[1], Position::new(350.0, 100.0));
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(a.distance_to(b) > tessera_core::placement::MIN_CLEARANCE);
            }
        }
    }

    #[test]
    fn parsing_is_deterministic() {
        let model = model_with(&[("Order", 40.0, 80.0), ("Customer", 420.0, 60.0)]);
        let raw = "COMANDOS:\nCREAR_CLASE: Invoice\nCREAR_CLASE: Payment";
        assert_eq!(parse_response(raw, &model), parse_response(raw, &model));
    }

    #[test]
    fn bubbles_are_deduplicated() {
        let text = "Considera usar una interfaz. Considera usar una interfaz.";
        let bubbles = extract_bubbles(text, &DiagramModel::new());
        assert_eq!(bubbles.len(), 1);
        assert_eq!(bubbles[0].target_class, None);
    }
}
