//! SPARQL JSON results and GraphQL-shaped trees
//!
//! The serde model of the SPARQL 1.1 Query Results JSON Format, its
//! shape validation, and the shaper that turns flat bindings back into
//! the tree a GraphQL caller expects: one key per selected variable,
//! singular variables collapsed to their first value, everything else a
//! list in binding order.

use crate::algebra::xsd;
use crate::error::EndpointError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;

/// `head` of a SPARQL JSON results document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Head {
    pub vars: Vec<String>,
}

/// One RDF term binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermBinding {
    #[serde(rename = "type")]
    pub term_type: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// `results` of a SPARQL JSON results document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Results {
    pub bindings: Vec<HashMap<String, TermBinding>>,
}

/// A complete SPARQL 1.1 JSON results document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SparqlResults {
    pub head: Head,
    pub results: Results,
}

const KNOWN_TERM_TYPES: &[&str] = &["uri", "literal", "bnode", "typed-literal"];

impl SparqlResults {
    /// Parses and shape-checks a response body.
    pub fn parse(body: &str) -> Result<Self, EndpointError> {
        let results: SparqlResults = serde_json::from_str(body)
            .map_err(|e| EndpointError::InvalidResponseFormat(e.to_string()))?;
        results.check_shape()?;
        Ok(results)
    }

    fn check_shape(&self) -> Result<(), EndpointError> {
        for row in &self.results.bindings {
            for (variable, term) in row {
                if !KNOWN_TERM_TYPES.contains(&term.term_type.as_str()) {
                    return Err(EndpointError::InvalidResponseFormat(format!(
                        "binding for '{variable}' has unknown term type '{}'",
                        term.term_type
                    )));
                }
            }
        }
        Ok(())
    }

    /// Drops bindings beyond `max_results`.
    pub fn truncate(&mut self, max_results: usize) {
        self.results.bindings.truncate(max_results);
    }
}

/// Reshapes bindings into a GraphQL-style tree.
///
/// Variables marked in the singularize map surface as their first
/// binding's value (later bindings are discarded); unmarked variables
/// surface as lists preserving binding order. Rows missing a variable
/// contribute nothing to it.
pub fn shape_results(
    results: &SparqlResults,
    singularize: &HashMap<String, bool>,
) -> JsonValue {
    let mut tree = serde_json::Map::new();
    for variable in &results.head.vars {
        let mut values: Vec<JsonValue> = Vec::new();
        for row in &results.results.bindings {
            if let Some(term) = row.get(variable) {
                values.push(materialize_term(term));
            }
        }
        let singular = singularize.get(variable).copied().unwrap_or(false);
        let value = if singular {
            values.into_iter().next().unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Array(values)
        };
        tree.insert(variable.clone(), value);
    }
    JsonValue::Object(tree)
}

/// Materializes one RDF term as a JSON value.
///
/// Named nodes become IRI strings and blank nodes `_:label` strings.
/// Literals coerce to native numbers and booleans when the datatype is
/// recognized; a failed lexical parse, an unrecognized datatype or a
/// language tag falls back to an annotated object.
pub fn materialize_term(term: &TermBinding) -> JsonValue {
    match term.term_type.as_str() {
        "uri" => JsonValue::String(term.value.clone()),
        "bnode" => JsonValue::String(format!("_:{}", term.value)),
        _ => materialize_literal(term),
    }
}

fn materialize_literal(term: &TermBinding) -> JsonValue {
    if let Some(language) = &term.language {
        return json!({ "value": term.value, "language": language });
    }
    match term.datatype.as_deref() {
        None => JsonValue::String(term.value.clone()),
        Some(xsd::STRING) => JsonValue::String(term.value.clone()),
        Some(xsd::INTEGER) => match term.value.parse::<i64>() {
            Ok(i) => json!(i),
            Err(_) => annotated(term),
        },
        Some(xsd::DECIMAL) | Some(xsd::DOUBLE) => match term.value.parse::<f64>() {
            Ok(f) => json!(f),
            Err(_) => annotated(term),
        },
        Some(xsd::BOOLEAN) => match term.value.as_str() {
            "true" | "1" => json!(true),
            "false" | "0" => json!(false),
            _ => annotated(term),
        },
        Some(_) => annotated(term),
    }
}

fn annotated(term: &TermBinding) -> JsonValue {
    json!({ "value": term.value, "datatype": term.datatype })
}
