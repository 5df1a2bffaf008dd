use tessera_core::{DiagramModel, DiagramRelationship, ElementKind};

fn name_of<'a>(id: &'a str, model: &'a DiagramModel) -> &'a str {
    model.element(id).map(|e| e.class_name()).unwrap_or(id)
}

/// Convert a diagram to the compact text representation the model reads.
pub fn serialize_diagram(model: &DiagramModel) -> String {
    let mut out = String::with_capacity(2048);

    out.push_str("CLASES:\n");
    if model.elements().is_empty() {
        out.push_str("(ninguna)\n");
    }
    for element in model.elements() {
        let uml = &element.uml_data;
        out.push_str(match element.kind {
            ElementKind::Class => "[C] ",
            ElementKind::Interface => "[I] ",
        });
        out.push_str(&uml.class_name);
        out.push_str(" (");
        out.push_str(element.kind.as_str());
        if let Some(ext) = &uml.extended {
            if ext.is_abstract {
                out.push_str(",abstract");
            }
            if let Some(stereotype) = &ext.stereotype {
                out.push_str(",<<");
                out.push_str(stereotype);
                out.push_str(">>");
            }
        }
        out.push_str(")\n");

        out.push_str("  atributos: ");
        push_list(&mut out, &uml.attributes);
        out.push_str("  métodos: ");
        push_list(&mut out, &uml.methods);
    }

    out.push_str("RELACIONES:\n");
    if model.relationships().is_empty() {
        out.push_str("(ninguna)\n");
    }
    for rel in model.relationships() {
        serialize_relationship(&mut out, rel, model);
    }

    out
}

fn push_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("(ninguno)");
    } else {
        out.push_str(&items.join(", "));
    }
    out.push('\n');
}

fn serialize_relationship(out: &mut String, rel: &DiagramRelationship, model: &DiagramModel) {
    out.push_str(name_of(&rel.source, model));
    out.push_str(" --[");
    out.push_str(rel.kind.as_str());
    out.push_str("]--> ");
    out.push_str(name_of(&rel.target, model));
    if let (Some(s), Some(t)) = (&rel.source_multiplicity, &rel.target_multiplicity) {
        out.push_str(" (");
        out.push_str(s);
        out.push_str(" : ");
        out.push_str(t);
        out.push(')');
    }
    if let Some(name) = &rel.name {
        out.push_str(" \"");
        out.push_str(name);
        out.push('"');
    }
    out.push('\n');
}

pub fn system_prompt() -> String {
    format!(
        "Eres un experto en modelado UML que revisa diagramas de clases. Analiza la calidad del \
diagrama: clases que faltan, atributos o métodos ausentes, relaciones incorrectas o ausentes, \
tipos de relación mal elegidos.\n\n\
Responde SIEMPRE con este formato exacto:\n\n\
ANÁLISIS: <un párrafo breve con tu evaluación. Si algo falta, dilo con frases como \
\"La clase X carece de ...\", \"X debería tener ...\", \"Recomiendo ...\" o \"Considera ...\">\n\n\
COMANDOS:\n\
<una línea por cambio, usando solo estas formas>\n\
CREAR_CLASE: NombreClase | +atributo: Tipo, -otro: Tipo | +metodo(): Tipo, +otro(p: Tipo)\n\
AGREGAR_ATRIBUTO: NombreClase | +atributo: Tipo\n\
AGREGAR_MÉTODO: NombreClase | +metodo(): Tipo\n\
CREAR_RELACIÓN: tipo | ClaseOrigen -> ClaseDestino | multiplicidadOrigen : multiplicidadDestino\n\
MODIFICAR_CLASE: NombreClase | atributos nuevos | métodos nuevos\n\n\
Donde tipo es asociación, agregación, composición o herencia. Para interfaces usa \
\"CREAR_CLASE: <<interface>> Nombre | | +metodo()\". Crea una clase antes de referenciarla en \
otros comandos. Si no hay nada que cambiar escribe \"COMANDOS: NINGUNO\".\n\n\
## Reglas de UML\n{}\n\n\
No incluyas texto después del bloque COMANDOS.",
        tessera_core::rules::RULES
    )
}

pub fn user_message(model: &DiagramModel, user_context: &str) -> String {
    let mut out = serialize_diagram(model);
    let context = user_context.trim();
    if !context.is_empty() {
        out.push_str("CONTEXTO DEL USUARIO:\n");
        out.push_str(context);
        out.push('\n');
    }
    out
}
