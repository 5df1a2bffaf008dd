//! Token rules for one line of the commands block.
//!
//! A command line is `KEYWORD: field | field | ...`. The keyword picks the rule for its
//! fields; a line that fails its rule (or has no known keyword) yields `None` and is skipped
//! by the caller. Nothing here ever reports an error: the input is model prose, not a format.

use tessera_core::{ElementKind, RelationshipKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    CreateClass,
    AddAttribute,
    AddMethod,
    CreateRelation,
    ModifyClass,
}

impl Keyword {
    pub(crate) fn from_label(label: &str) -> Option<Self> {
        match fold(label).to_ascii_uppercase().as_str() {
            "CREAR_CLASE" | "CREATE_CLASS" => Some(Keyword::CreateClass),
            "AGREGAR_ATRIBUTO" | "ANADIR_ATRIBUTO" | "ADD_ATTRIBUTE" => Some(Keyword::AddAttribute),
            "AGREGAR_METODO" | "ANADIR_METODO" | "ADD_METHOD" => Some(Keyword::AddMethod),
            "CREAR_RELACION" | "CREATE_RELATION" | "CREATE_RELATIONSHIP" => {
                Some(Keyword::CreateRelation)
            }
            "MODIFICAR_CLASE" | "MODIFY_CLASS" => Some(Keyword::ModifyClass),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawCommand {
    CreateClass {
        name: String,
        kind: ElementKind,
        attributes: Vec<String>,
        methods: Vec<String>,
    },
    AddAttribute {
        class: String,
        attribute: String,
    },
    AddMethod {
        class: String,
        method: String,
    },
    CreateRelation {
        kind: RelationshipKind,
        source: String,
        target: String,
        source_multiplicity: Option<String>,
        target_multiplicity: Option<String>,
    },
    ModifyClass {
        class: String,
        attributes: Vec<String>,
        methods: Vec<String>,
    },
}

pub(crate) fn parse_line(line: &str) -> Option<RawCommand> {
    let line = strip_list_marker(line);
    let (label, rest) = line.split_once(':')?;
    // `**KEYWORD**:` and `**KEYWORD:**` both leave emphasis next to the colon.
    let keyword = Keyword::from_label(label.trim_end().trim_end_matches('*'))?;
    let rest = rest.trim_start().trim_start_matches('*');
    let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
    let field = |i: usize| fields.get(i).copied().unwrap_or("");

    match keyword {
        Keyword::CreateClass => {
            let (kind, name) = split_stereotype(field(0));
            Some(RawCommand::CreateClass {
                name: class_name(name)?.to_string(),
                kind,
                attributes: split_members(field(1)),
                methods: split_members(field(2)),
            })
        }
        Keyword::AddAttribute => Some(RawCommand::AddAttribute {
            class: class_name(field(0))?.to_string(),
            attribute: normalize_member(field(1))?,
        }),
        Keyword::AddMethod => Some(RawCommand::AddMethod {
            class: class_name(field(0))?.to_string(),
            method: normalize_member(field(1))?,
        }),
        Keyword::CreateRelation => {
            let kind = relationship_kind(field(0));
            let (source, target) = endpoints(field(1))?;
            let (source_multiplicity, target_multiplicity) = if kind.carries_multiplicity() {
                multiplicity(field(2))
            } else {
                (None, None)
            };
            Some(RawCommand::CreateRelation {
                kind,
                source: source.to_string(),
                target: target.to_string(),
                source_multiplicity,
                target_multiplicity,
            })
        }
        Keyword::ModifyClass => {
            let attributes = split_members(field(1));
            let methods = split_members(field(2));
            if attributes.is_empty() && methods.is_empty() {
                return None;
            }
            Some(RawCommand::ModifyClass {
                class: class_name(field(0))?.to_string(),
                attributes,
                methods,
            })
        }
    }
}

/// Drop bullets, numbering and markdown emphasis in front of a line. The end of the line is
/// left alone: a trailing `*` is a multiplicity.
pub(crate) fn strip_list_marker(line: &str) -> &str {
    let mut s = line.trim().trim_matches('`').trim();
    for bullet in ["- ", "* ", "• ", "> "] {
        if let Some(rest) = s.strip_prefix(bullet) {
            s = rest.trim_start();
        }
    }
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            s = rest.trim_start();
        }
    }
    s.trim_start_matches('*').trim_start()
}

/// Drop Spanish accents and turn spaces and hyphens into underscores. Case is kept.
pub(crate) fn fold(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            ' ' | '-' => '_',
            c => c,
        })
        .collect()
}

fn class_name(s: &str) -> Option<&str> {
    let s = s.trim().trim_matches('`').trim_matches('"').trim();
    let mut chars = s.chars();
    let first = chars.next()?;
    if !(first.is_alphabetic() || first == '_') {
        return None;
    }
    if chars.all(|c| c.is_alphanumeric() || c == '_') {
        Some(s)
    } else {
        None
    }
}

fn split_stereotype(s: &str) -> (ElementKind, &str) {
    let s = s.trim();
    for prefix in ["<<interface>>", "«interface»", "<<interfaz>>", "«interfaz»"] {
        if let Some(rest) = strip_prefix_ci(s, prefix) {
            return (ElementKind::Interface, rest.trim());
        }
    }
    for prefix in ["interface ", "interfaz "] {
        if let Some(rest) = strip_prefix_ci(s, prefix) {
            return (ElementKind::Interface, rest.trim());
        }
    }
    (ElementKind::Class, s)
}

/// Case-insensitive prefix strip that is safe for non-ASCII text.
pub(crate) fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = s.char_indices();
    for expected in prefix.chars() {
        let (_, c) = chars.next()?;
        if !c.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    let boundary = chars.next().map(|(i, _)| i).unwrap_or(s.len());
    Some(&s[boundary..])
}

/// Split a member list on `,` or `;`, leaving separators inside parentheses alone.
fn split_members(s: &str) -> Vec<String> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth = depth.saturating_sub(1),
            ',' | ';' if depth == 0 => {
                members.extend(normalize_member(&s[start..i]));
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    members.extend(normalize_member(&s[start..]));
    members
}

/// Give a member an explicit visibility marker, public unless one is already present.
fn normalize_member(s: &str) -> Option<String> {
    let s = s.trim().trim_end_matches('.').trim();
    if s.is_empty() {
        return None;
    }
    let lowered = s.to_lowercase();
    if matches!(lowered.as_str(), "ninguno" | "ninguna" | "none" | "-" | "n/a") {
        return None;
    }
    match s.chars().next() {
        Some(marker @ ('+' | '-' | '#' | '~')) => {
            let rest = s[1..].trim_start();
            if rest.is_empty() {
                None
            } else {
                Some(format!("{marker}{rest}"))
            }
        }
        _ => Some(format!("+{s}")),
    }
}

/// Map a natural-language relationship word to its kind. Unknown words are associations.
pub(crate) fn relationship_kind(word: &str) -> RelationshipKind {
    let word = fold(word).to_lowercase();
    match word.as_str() {
        "agregacion" | "aggregation" | "agregado" => RelationshipKind::Aggregation,
        "composicion" | "composition" | "compuesto" | "compone" => RelationshipKind::Composition,
        "herencia" | "inheritance" | "generalizacion" | "generalization" | "hereda"
        | "extends" | "extiende" | "es_un" | "is_a" => RelationshipKind::Inheritance,
        _ => RelationshipKind::Association,
    }
}

fn endpoints(s: &str) -> Option<(&str, &str)> {
    let (left, right) = s
        .split_once("->")
        .or_else(|| s.split_once('→'))?;
    let left = left.trim().trim_end_matches('-').trim();
    let right = right.trim().trim_start_matches('>').trim();
    Some((class_name(left)?, class_name(right)?))
}

const DEFAULT_SOURCE_MULTIPLICITY: &str = "1";
const DEFAULT_TARGET_MULTIPLICITY: &str = "*";

fn multiplicity(s: &str) -> (Option<String>, Option<String>) {
    let s = s.trim();
    if s.is_empty() {
        return (
            Some(DEFAULT_SOURCE_MULTIPLICITY.to_string()),
            Some(DEFAULT_TARGET_MULTIPLICITY.to_string()),
        );
    }
    if let Some((a, b)) = s.split_once(':') {
        let (a, b) = (a.trim(), b.trim());
        if !a.is_empty() && !b.is_empty() {
            return (Some(a.to_string()), Some(b.to_string()));
        }
    }
    let mut parts = s.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(a), Some(b)) => (Some(a.to_string()), Some(b.to_string())),
        _ => (Some(s.to_string()), Some(s.to_string())),
    }
}
