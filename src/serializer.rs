//! Algebra to SPARQL text
//!
//! Serialization is a pure function of the algebra tree. User strings
//! only ever reach the output through [`escape_literal`]; IRIs were
//! validated before algebra construction, so named nodes emit as
//! `<iri>` with no further processing.

use crate::algebra::{
    xsd, Bgp, CompositeUpdate, DeleteInsert, GroupElement, Literal, SelectQuery, Term,
    TriplePattern,
};
use std::fmt::Write;

/// Escapes a literal's lexical form per SPARQL 1.1 grammar rules.
///
/// Backslash, double quote, newline, carriage return, tab, backspace
/// and form feed use their short escapes; any other control character
/// below U+0020 uses the `\u00XX` form.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c < '\u{20}' => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Formats a single term in SPARQL surface syntax.
pub fn format_term(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.to_string(),
        Term::Variable(v) => v.to_string(),
        Term::BlankNode(b) => b.to_string(),
        Term::Literal(lit) => format_literal(lit),
    }
}

/// Formats a literal. The datatype annotation is emitted only when the
/// datatype differs from `xsd:string`; language-tagged literals emit
/// `"lex"@tag`.
pub fn format_literal(literal: &Literal) -> String {
    let quoted = format!("\"{}\"", escape_literal(literal.value()));
    if let Some(language) = literal.language() {
        return format!("{quoted}@{language}");
    }
    match literal.datatype() {
        Some(datatype) if datatype != xsd::STRING => {
            format!("{quoted}^^<{datatype}>")
        }
        _ => quoted,
    }
}

fn format_triple(pattern: &TriplePattern) -> String {
    let triple = format!(
        "{} {} {} .",
        format_term(&pattern.subject),
        format_term(&pattern.predicate),
        format_term(&pattern.object)
    );
    match &pattern.graph {
        Some(graph) => format!("GRAPH {graph} {{ {triple} }}"),
        None => triple,
    }
}

fn write_block(out: &mut String, patterns: &[TriplePattern]) {
    out.push_str("{\n");
    for pattern in patterns {
        out.push_str("  ");
        out.push_str(&format_triple(pattern));
        out.push('\n');
    }
    out.push('}');
}

/// Serializes one update node into its SPARQL 1.1 Update form.
pub fn serialize_delete_insert(update: &DeleteInsert) -> String {
    let where_patterns: &[TriplePattern] = update
        .where_clause
        .as_ref()
        .map(|bgp| bgp.patterns.as_slice())
        .unwrap_or(&[]);

    let mut out = String::new();
    if update.delete.is_empty() && where_patterns.is_empty() {
        out.push_str("INSERT DATA ");
        write_block(&mut out, &update.insert);
    } else if update.insert.is_empty() {
        out.push_str("DELETE ");
        write_block(&mut out, &update.delete);
        out.push_str(" WHERE ");
        write_block(&mut out, where_patterns);
    } else {
        out.push_str("DELETE ");
        write_block(&mut out, &update.delete);
        out.push_str(" INSERT ");
        write_block(&mut out, &update.insert);
        out.push_str(" WHERE ");
        write_block(&mut out, where_patterns);
    }
    out
}

/// Serializes a composite update, `;`-separating its members.
pub fn serialize_update(update: &CompositeUpdate) -> String {
    update
        .updates
        .iter()
        .map(serialize_delete_insert)
        .collect::<Vec<_>>()
        .join(" ;\n")
}

/// Serializes a basic graph pattern as a group.
pub fn serialize_bgp(bgp: &Bgp) -> String {
    let mut out = String::new();
    write_block(&mut out, &bgp.patterns);
    out
}

fn write_group(out: &mut String, elements: &[GroupElement], indent: usize) {
    let pad = "  ".repeat(indent);
    for element in elements {
        match element {
            GroupElement::Triple(pattern) => {
                out.push_str(&pad);
                out.push_str(&format_triple(pattern));
                out.push('\n');
            }
            GroupElement::Optional(inner) => {
                out.push_str(&pad);
                out.push_str("OPTIONAL {\n");
                write_group(out, inner, indent + 1);
                out.push_str(&pad);
                out.push_str("}\n");
            }
        }
    }
}

/// Serializes a SELECT query.
pub fn serialize_select(query: &SelectQuery) -> String {
    let mut out = String::from("SELECT");
    if query.variables.is_empty() {
        out.push_str(" *");
    } else {
        for variable in &query.variables {
            let _ = write!(out, " {variable}");
        }
    }
    out.push_str(" WHERE {\n");
    write_group(&mut out, &query.pattern, 1);
    out.push('}');
    if let Some(limit) = query.limit {
        let _ = write!(out, " LIMIT {limit}");
    }
    if let Some(offset) = query.offset {
        let _ = write!(out, " OFFSET {offset}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{NamedNode, Variable};

    fn nn(iri: &str) -> Term {
        Term::NamedNode(NamedNode::new_unchecked(iri))
    }

    fn var(name: &str) -> Term {
        Term::Variable(Variable::new(name).unwrap())
    }

    #[test]
    fn escapes_every_special_character() {
        assert_eq!(
            escape_literal("a\"b\\c\nd\re\tf"),
            "a\\\"b\\\\c\\nd\\re\\tf"
        );
        assert_eq!(escape_literal("bell\u{7}"), "bell\\u0007");
        assert_eq!(escape_literal("plain"), "plain");
    }

    #[test]
    fn literal_forms() {
        assert_eq!(format_literal(&Literal::new("x")), "\"x\"");
        assert_eq!(
            format_literal(&Literal::typed("30", xsd::INTEGER)),
            "\"30\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        // xsd:string never gets an annotation.
        assert_eq!(format_literal(&Literal::typed("x", xsd::STRING)), "\"x\"");
        assert_eq!(
            format_literal(&Literal::tagged("hallo", "de")),
            "\"hallo\"@de"
        );
    }

    #[test]
    fn insert_data_form() {
        let update = DeleteInsert::insert_data(vec![TriplePattern::new(
            nn("http://example.org/s"),
            nn("http://example.org/p"),
            Literal::new("o"),
        )]);
        assert_eq!(
            serialize_delete_insert(&update),
            "INSERT DATA {\n  <http://example.org/s> <http://example.org/p> \"o\" .\n}"
        );
    }

    #[test]
    fn delete_where_form() {
        let pattern =
            TriplePattern::new(nn("http://example.org/s"), var("p_del"), var("o_del"));
        let update = DeleteInsert {
            delete: vec![pattern.clone()],
            insert: vec![],
            where_clause: Some(Bgp::new(vec![pattern])),
        };
        let text = serialize_delete_insert(&update);
        assert!(text.starts_with("DELETE {"));
        assert!(text.contains(" WHERE {"));
        assert!(!text.contains("INSERT"));
        assert!(text.contains("<http://example.org/s> ?p_del ?o_del ."));
    }

    #[test]
    fn delete_insert_where_form() {
        let s = nn("http://example.org/s");
        let p = nn("http://example.org/p");
        let old = var("old_p");
        let update = DeleteInsert {
            delete: vec![TriplePattern::new(s.clone(), p.clone(), old.clone())],
            insert: vec![TriplePattern::new(s.clone(), p.clone(), Literal::new("new"))],
            where_clause: Some(Bgp::new(vec![TriplePattern::new(s, p, old)])),
        };
        let text = serialize_delete_insert(&update);
        let delete_at = text.find("DELETE {").unwrap();
        let insert_at = text.find("INSERT {").unwrap();
        let where_at = text.find("WHERE {").unwrap();
        assert!(delete_at < insert_at && insert_at < where_at);
    }

    #[test]
    fn composite_updates_are_semicolon_separated() {
        let one = DeleteInsert::insert_data(vec![TriplePattern::new(
            nn("http://example.org/a"),
            nn("http://example.org/b"),
            nn("http://example.org/c"),
        )]);
        let composite = CompositeUpdate {
            updates: vec![one.clone(), one],
        };
        let text = serialize_update(&composite);
        assert_eq!(text.matches("INSERT DATA").count(), 2);
        assert_eq!(text.matches(" ;\n").count(), 1);
    }

    #[test]
    fn select_with_optional_and_slice() {
        let query = SelectQuery {
            variables: vec![
                Variable::new("user").unwrap(),
                Variable::new("user_name").unwrap(),
            ],
            pattern: vec![
                GroupElement::Triple(TriplePattern::new(
                    var("user"),
                    nn(crate::algebra::RDF_TYPE),
                    nn("http://example.org/User"),
                )),
                GroupElement::Optional(vec![GroupElement::Triple(TriplePattern::new(
                    var("user"),
                    nn("http://xmlns.com/foaf/0.1/name"),
                    var("user_name"),
                ))]),
            ],
            limit: Some(10),
            offset: Some(5),
        };
        let text = serialize_select(&query);
        assert!(text.starts_with("SELECT ?user ?user_name WHERE {"));
        assert!(text.contains("OPTIONAL {"));
        assert!(text.ends_with("} LIMIT 10 OFFSET 5"));
    }

    #[test]
    fn injection_attempt_stays_inside_the_literal() {
        let hostile = "\" } ; DROP ALL ; INSERT { <x> <y> \"";
        let update = DeleteInsert::insert_data(vec![TriplePattern::new(
            nn("http://example.org/s"),
            nn("http://example.org/p"),
            Literal::new(hostile),
        )]);
        let text = serialize_delete_insert(&update);
        // The closing quote of the literal is escaped, so the hostile
        // payload cannot terminate the string.
        assert!(text.contains("\\\" } ; DROP ALL ; INSERT { <x> <y> \\\""));
        assert_eq!(text.matches("INSERT DATA").count(), 1);
    }
}
