//! JSON-LD context resolution
//!
//! A [`Context`] is the normalized form of a JSON-LD `@context`
//! document: a case-sensitive map from short name to term definition,
//! plus the optional `@base` and `@vocab` directives. It answers four
//! questions for the compilers:
//! - what IRI does a predicate name map to?
//! - what IRI does an entity type name map to?
//! - is a term an object-valued relationship?
//! - does a relationship have a known inverse in this context?
//!
//! The context is immutable once built and shared read-only across all
//! compilations.

use crate::error::CompileError;
use lazy_static::lazy_static;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Well-known namespace for `xsd:` datatypes.
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
/// Well-known namespace for `rdf:` terms.
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

lazy_static! {
    /// Names that commonly denote object-valued relationships. Used as
    /// a convenience fallback when the context does not type the term
    /// with `@type: @id`.
    static ref RELATIONSHIP_NAMES: Vec<&'static str> = vec![
        "author",
        "creator",
        "publisher",
        "member",
        "owner",
        "parent",
        "child",
        "product",
        "manufacturer",
        "brand",
        "itemReviewed",
        "about",
        "mentions",
        "isPartOf",
        "hasPart",
    ];

    /// Bidirectional table of common inverse relationship names.
    static ref INVERSE_PAIRS: HashMap<&'static str, &'static str> = {
        let pairs = [
            ("product", "reviews"),
            ("author", "works"),
            ("member", "memberOf"),
            ("parent", "children"),
            ("employer", "employees"),
            ("follows", "followers"),
        ];
        let mut m = HashMap::new();
        for (a, b) in pairs {
            m.insert(a, b);
            m.insert(b, a);
        }
        m
    };
}

/// A normalized term definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TermDefinition {
    /// The resolved IRI (compact forms like `ex:age` are expanded
    /// against prefix terms during normalization).
    pub iri: String,
    /// Explicit datatype IRI from `@type`, when it is not `@id`.
    pub datatype: Option<String>,
    /// True when `@type` is the `@id` marker: the term is an
    /// object-valued relationship.
    pub is_id_type: bool,
    /// True when `@container` is `@set`: values are unordered and
    /// multi-valued.
    pub is_set_container: bool,
}

/// Normalized JSON-LD context.
///
/// Built once from a JSON document (either the bare mapping or an
/// object wrapped in `@context`), then shared read-only. All lookups
/// are pure and deterministic with respect to the snapshot.
#[derive(Debug, Clone)]
pub struct Context {
    terms: HashMap<String, TermDefinition>,
    base: Option<String>,
    vocab: Option<String>,
}

impl Context {
    /// Parses and normalizes a context document.
    ///
    /// Term definitions are either bare IRI strings or objects carrying
    /// `@id`, optional `@type` (a datatype IRI or the `@id` marker) and
    /// optional `@container`. `@base` and `@vocab` must be strings when
    /// present.
    pub fn from_document(document: &JsonValue) -> Result<Self, CompileError> {
        let mapping = match document {
            JsonValue::Object(map) => match map.get("@context") {
                Some(JsonValue::Object(inner)) => inner,
                Some(other) => {
                    return Err(CompileError::Context(format!(
                        "@context must be an object, got {}",
                        json_kind(other)
                    )));
                }
                None => map,
            },
            other => {
                return Err(CompileError::Context(format!(
                    "context document must be an object, got {}",
                    json_kind(other)
                )));
            }
        };

        let base = match mapping.get("@base") {
            None => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(CompileError::Context(format!(
                    "@base must be a string, got {}",
                    json_kind(other)
                )));
            }
        };
        let vocab = match mapping.get("@vocab") {
            None => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(CompileError::Context(format!(
                    "@vocab must be a string, got {}",
                    json_kind(other)
                )));
            }
        };

        // First pass: collect raw term definitions.
        let mut raw: HashMap<String, TermDefinition> = HashMap::new();
        for (name, value) in mapping {
            if name.starts_with('@') {
                continue;
            }
            let def = match value {
                JsonValue::String(iri) => TermDefinition {
                    iri: iri.clone(),
                    datatype: None,
                    is_id_type: false,
                    is_set_container: false,
                },
                JsonValue::Object(obj) => {
                    let iri = match obj.get("@id") {
                        Some(JsonValue::String(s)) => s.clone(),
                        _ => {
                            return Err(CompileError::Context(format!(
                                "term '{name}' has no @id"
                            )));
                        }
                    };
                    let (datatype, is_id_type) = match obj.get("@type") {
                        Some(JsonValue::String(t)) if t == "@id" => (None, true),
                        Some(JsonValue::String(t)) => (Some(t.clone()), false),
                        Some(other) => {
                            return Err(CompileError::Context(format!(
                                "term '{name}' has a non-string @type: {}",
                                json_kind(other)
                            )));
                        }
                        None => (None, false),
                    };
                    let is_set_container = matches!(
                        obj.get("@container"),
                        Some(JsonValue::String(c)) if c == "@set"
                    );
                    TermDefinition {
                        iri,
                        datatype,
                        is_id_type,
                        is_set_container,
                    }
                }
                other => {
                    return Err(CompileError::Context(format!(
                        "term '{name}' must map to a string or object, got {}",
                        json_kind(other)
                    )));
                }
            };
            raw.insert(name.clone(), def);
        }

        // Second pass: resolve compact term IRIs (`ex:age`) against
        // prefix terms, and datatype CURIEs against well-known prefixes.
        let prefixes: HashMap<String, String> = raw
            .iter()
            .map(|(name, def)| (name.clone(), def.iri.clone()))
            .collect();
        let terms = raw
            .into_iter()
            .map(|(name, mut def)| {
                def.iri = resolve_compact(&def.iri, &prefixes);
                def.datatype = def.datatype.map(|dt| resolve_datatype(&dt, &prefixes));
                (name, def)
            })
            .collect();

        Ok(Self { terms, base, vocab })
    }

    /// The `@base` directive, when present.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Looks up the term definition for a short name.
    pub fn term(&self, name: &str) -> Option<&TermDefinition> {
        self.terms.get(name)
    }

    /// Resolves a predicate short name to its IRI.
    pub fn predicate_iri(&self, name: &str) -> Result<String, CompileError> {
        self.terms
            .get(name)
            .map(|def| def.iri.clone())
            .ok_or_else(|| {
                CompileError::Context(format!("no IRI mapping for predicate '{name}'"))
            })
    }

    /// Resolves an entity type name to its IRI.
    ///
    /// Tries the exact name, then the capitalized name, then falls back
    /// to `@vocab` concatenation.
    pub fn type_iri(&self, name: &str) -> Result<String, CompileError> {
        if let Some(def) = self.terms.get(name) {
            return Ok(def.iri.clone());
        }
        let capitalized = capitalize(name);
        if let Some(def) = self.terms.get(&capitalized) {
            return Ok(def.iri.clone());
        }
        if let Some(vocab) = &self.vocab {
            return Ok(format!("{vocab}{name}"));
        }
        Err(CompileError::Context(format!(
            "no IRI mapping for type '{name}' and no @vocab fallback"
        )))
    }

    /// Expands an instance-level IRI string.
    ///
    /// `http(s)://` values pass through verbatim. Anything else is
    /// concatenated to `@base` (trailing slash stripped) with a `/`
    /// separator, even when the value contains a colon: `ex:user1`
    /// against base `http://example.org/` becomes
    /// `http://example.org/ex:user1`, not a CURIE resolution. Without a
    /// base the value is returned unchanged and its expansion is the
    /// endpoint's problem.
    pub fn expand_iri(&self, value: &str) -> String {
        if value.starts_with("http://") || value.starts_with("https://") {
            return value.to_string();
        }
        match &self.base {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), value),
            None => value.to_string(),
        }
    }

    /// Whether a term denotes an object-valued relationship: its
    /// definition carries `@type: @id`, or (as a convenience) its name
    /// is on the common-relationship list.
    pub fn is_relationship(&self, name: &str) -> bool {
        if let Some(def) = self.terms.get(name) {
            if def.is_id_type {
                return true;
            }
        }
        RELATIONSHIP_NAMES.contains(&name)
    }

    /// The predicate IRI of the known inverse of a relationship name,
    /// when the inverse name is itself mapped in this context.
    pub fn inverse_of(&self, name: &str) -> Option<String> {
        let inverse_name = INVERSE_PAIRS.get(name)?;
        self.terms.get(*inverse_name).map(|def| def.iri.clone())
    }
}

/// Resolves a compact IRI like `ex:age` against prefix terms. Absolute
/// IRIs and strings without a usable prefix pass through unchanged.
fn resolve_compact(iri: &str, prefixes: &HashMap<String, String>) -> String {
    if iri.starts_with("http://") || iri.starts_with("https://") || iri.starts_with("urn:") {
        return iri.to_string();
    }
    if let Some((prefix, suffix)) = split_compact(iri) {
        if let Some(prefix_iri) = prefixes.get(prefix) {
            return format!("{prefix_iri}{suffix}");
        }
    }
    iri.to_string()
}

/// Resolves a datatype reference: absolute IRIs pass through, `xsd:` and
/// `rdf:` use the well-known namespaces, anything else is tried against
/// the context prefixes.
fn resolve_datatype(datatype: &str, prefixes: &HashMap<String, String>) -> String {
    if datatype.starts_with("http://") || datatype.starts_with("https://") {
        return datatype.to_string();
    }
    if let Some(local) = datatype.strip_prefix("xsd:") {
        return format!("{XSD_NS}{local}");
    }
    if let Some(local) = datatype.strip_prefix("rdf:") {
        return format!("{RDF_NS}{local}");
    }
    resolve_compact(datatype, prefixes)
}

/// Splits `prefix:suffix` where the prefix contains no `/` and the
/// suffix does not start with `//`.
fn split_compact(s: &str) -> Option<(&str, &str)> {
    let colon = s.find(':')?;
    let (prefix, suffix) = (&s[..colon], &s[colon + 1..]);
    if prefix.is_empty() || prefix.contains('/') || suffix.starts_with("//") {
        return None;
    }
    Some((prefix, suffix))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
