//! Input validation guarding every compilation step
//!
//! Three validators live here:
//! - IRI validation: scheme-aware structural checks that guarantee a
//!   string is safe to emit between `<` and `>` in SPARQL text
//! - mutation input validation: a depth-bounded walk over a GraphQL
//!   input object that rejects malformed shapes and IRIs before any
//!   algebra is built
//! - raw SPARQL query validation: a coarse safety net for user-provided
//!   SPARQL, not a parser

use crate::ast::Value;
use crate::context::Context;
use crate::error::CompileError;
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    /// RFC 3986 scheme: `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`.
    static ref SCHEME_REGEX: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("scheme regex compilation failed");

    /// URN namespace identifier per RFC 8141.
    static ref URN_REGEX: Regex = Regex::new(
        r"^urn:[A-Za-z0-9][A-Za-z0-9-]{0,31}:[A-Za-z0-9()+,\-.:=@;$_!*'%/?#]+$"
    )
    .expect("urn regex compilation failed");
}

/// Characters that may never appear in an IRI. Everything at or below
/// U+0020 is also disallowed (checked separately).
const DISALLOWED_IRI_CHARS: &[char] = &['<', '>', '"', '{', '}', '|', '\\', '^', '`'];

/// Maximum nesting depth for mutation input objects. Deep enough for
/// any real payload, shallow enough to break reference cycles that
/// were flattened into deeply nested JSON.
const MAX_INPUT_DEPTH: usize = 32;

/// Validates that a string is a well-formed IRI safe for `<...>` emission.
///
/// Scheme-specific rules:
/// - `urn:` must match `urn:<nid>:<nss>` per RFC 8141
/// - `file:` must use the `file:///` form
/// - `http:`/`https:` must parse as a URL with a non-empty host
/// - any other scheme must not use the `//` authority form
pub fn validate_iri(iri: &str) -> Result<(), CompileError> {
    if iri.trim().is_empty() {
        return Err(CompileError::validation("IRI must not be empty"));
    }

    if let Some(bad) = iri
        .chars()
        .find(|c| *c <= '\u{20}' || DISALLOWED_IRI_CHARS.contains(c))
    {
        return Err(CompileError::validation_at(
            format!("IRI contains illegal character {bad:?}"),
            "iri",
            iri,
        ));
    }

    if !SCHEME_REGEX.is_match(iri) {
        return Err(CompileError::validation_at(
            "IRI must start with a scheme",
            "iri",
            iri,
        ));
    }

    let colon = iri.find(':').expect("scheme regex guarantees a colon");
    let scheme = iri[..colon].to_ascii_lowercase();
    match scheme.as_str() {
        "urn" => {
            if !URN_REGEX.is_match(iri) {
                return Err(CompileError::validation_at(
                    "malformed urn: IRI",
                    "iri",
                    iri,
                ));
            }
        }
        "file" => {
            let rest = &iri[colon + 1..];
            if !rest.starts_with("///") || rest.len() == 3 {
                return Err(CompileError::validation_at(
                    "file: IRI must use the file:/// form",
                    "iri",
                    iri,
                ));
            }
        }
        "http" | "https" => {
            let parsed = Url::parse(iri).map_err(|e| {
                CompileError::validation_at(format!("malformed HTTP IRI: {e}"), "iri", iri)
            })?;
            if parsed.host_str().map_or(true, str::is_empty) {
                return Err(CompileError::validation_at(
                    "HTTP IRI must have a host",
                    "iri",
                    iri,
                ));
            }
        }
        _ => {
            // Only HTTP(S) and file may use the authority form.
            if iri.contains("//") {
                return Err(CompileError::validation_at(
                    format!("scheme '{scheme}' must not use the // authority form"),
                    "iri",
                    iri,
                ));
            }
        }
    }

    Ok(())
}

/// `true` iff [`validate_iri`] accepts the string.
pub fn is_valid_iri(iri: &str) -> bool {
    validate_iri(iri).is_ok()
}

/// Validates a mutation input object before compilation.
///
/// The input must be a non-null, non-list object value. The walk is
/// recursive and depth-bounded; list values are validated element-wise.
/// Any key whose name contains the substring `id` (case-insensitive)
/// and carries a string value is validated as an IRI after expansion
/// against the context `@base`. The input is never mutated.
pub fn validate_mutation_input(input: &Value, context: &Context) -> Result<(), CompileError> {
    let fields = match input {
        Value::Object(fields) => fields,
        Value::Null => {
            return Err(CompileError::validation("mutation input must not be null"));
        }
        Value::List(_) => {
            return Err(CompileError::validation(
                "mutation input must be an object, not a list",
            ));
        }
        other => {
            return Err(CompileError::validation(format!(
                "mutation input must be an object, got {}",
                other.kind()
            )));
        }
    };

    for (key, value) in fields {
        validate_input_value(key, value, context, 0)?;
    }
    Ok(())
}

fn validate_input_value(
    key: &str,
    value: &Value,
    context: &Context,
    depth: usize,
) -> Result<(), CompileError> {
    if depth > MAX_INPUT_DEPTH {
        return Err(CompileError::validation_at(
            "mutation input nested too deeply",
            key,
            "...",
        ));
    }

    match value {
        Value::String(s) if is_id_key(key) => {
            let expanded = context.expand_iri(s);
            validate_iri(&expanded).map_err(|_| {
                CompileError::validation_at(
                    format!("value of '{key}' contains illegal IRI characters or is not an IRI"),
                    key,
                    s.clone(),
                )
            })?;
        }
        Value::String(_) | Value::Int(_) | Value::Float(_) | Value::Boolean(_) | Value::Enum(_) => {
        }
        Value::Null => {
            return Err(CompileError::validation_at(
                "null values are not allowed in mutation input",
                key,
                "null",
            ));
        }
        Value::Variable(name) => {
            return Err(CompileError::validation_at(
                format!("variable reference '${name}' is not a concrete value"),
                key,
                format!("${name}"),
            ));
        }
        Value::List(items) => {
            for item in items {
                validate_input_value(key, item, context, depth + 1)?;
            }
        }
        Value::Object(fields) => {
            for (nested_key, nested) in fields {
                validate_input_value(nested_key, nested, context, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// A key names an identifier when it contains `id` case-insensitively
/// (`id`, `productId`, `identifier`, ...).
fn is_id_key(key: &str) -> bool {
    key.to_ascii_lowercase().contains("id")
}

/// SPARQL verbs never allowed in user-supplied read queries.
const FORBIDDEN_VERBS: &[&str] = &[
    "DROP", "CREATE", "LOAD", "CLEAR", "DELETE", "INSERT", "UPDATE",
];

/// Coarse validator for user-provided SPARQL read queries.
///
/// This is a safety net, not a SPARQL parser. Forbidden verbs are
/// rejected by case-insensitive substring match, which is overcautious:
/// a SELECT whose string literal contains "DROP" is rejected too.
/// Compiled mutations bypass this entirely; their algebra is safe by
/// construction.
#[derive(Debug, Clone)]
pub struct SparqlQueryValidator {
    max_query_length: usize,
}

impl Default for SparqlQueryValidator {
    fn default() -> Self {
        Self {
            max_query_length: 10_000,
        }
    }
}

impl SparqlQueryValidator {
    pub fn new(max_query_length: usize) -> Self {
        Self { max_query_length }
    }

    pub fn validate(&self, query: &str) -> Result<(), CompileError> {
        if query.len() > self.max_query_length {
            return Err(CompileError::validation(format!(
                "query exceeds maximum length of {} bytes",
                self.max_query_length
            )));
        }

        let upper = query.to_ascii_uppercase();
        for verb in FORBIDDEN_VERBS {
            if upper.contains(verb) {
                return Err(CompileError::validation(format!(
                    "query contains forbidden verb {verb}"
                )));
            }
        }

        let first_keyword = first_keyword_after_prologue(&upper);
        if !matches!(first_keyword.as_deref(), Some("SELECT") | Some("CONSTRUCT")) {
            return Err(CompileError::validation(
                "query must start with SELECT or CONSTRUCT",
            ));
        }

        if !upper.contains("WHERE") {
            return Err(CompileError::validation("query must contain WHERE"));
        }

        let mut open = 0i64;
        for c in query.chars() {
            match c {
                '{' => open += 1,
                '}' => open -= 1,
                _ => {}
            }
            if open < 0 {
                return Err(CompileError::validation("query has unbalanced braces"));
            }
        }
        if open != 0 {
            return Err(CompileError::validation("query has unbalanced braces"));
        }

        Ok(())
    }
}

/// Returns the first keyword of an uppercased query, skipping PREFIX and
/// BASE prologue declarations.
fn first_keyword_after_prologue(upper: &str) -> Option<String> {
    let mut rest = upper.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("PREFIX") {
            // PREFIX ns: <iri>
            match after.find('>') {
                Some(end) => rest = after[end + 1..].trim_start(),
                None => return None,
            }
        } else if let Some(after) = rest.strip_prefix("BASE") {
            match after.find('>') {
                Some(end) => rest = after[end + 1..].trim_start(),
                None => return None,
            }
        } else {
            break;
        }
    }
    let word: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use serde_json::json;

    fn test_context() -> Context {
        Context::from_document(&json!({
            "@base": "http://example.org/",
            "name": "http://xmlns.com/foaf/0.1/name"
        }))
        .unwrap()
    }

    #[test]
    fn accepts_common_iris() {
        assert!(is_valid_iri("http://example.org/user1"));
        assert!(is_valid_iri("https://example.org/a?b=c#d"));
        assert!(is_valid_iri("urn:uuid:6ba7b810-9dad-11d1-80b4-00c04fd430c8"));
        assert!(is_valid_iri("urn:isbn:0451450523"));
        assert!(is_valid_iri("file:///tmp/data.ttl"));
        assert!(is_valid_iri("mailto:a@example.org"));
        assert!(is_valid_iri("ex:user1"));
    }

    #[test]
    fn rejects_illegal_characters() {
        for bad in [
            "http://example.org/<x>",
            "http://example.org/a b",
            "http://example.org/\"x\"",
            "http://example.org/{x}",
            "http://example.org/x|y",
            "http://example.org/x\\y",
            "http://example.org/x^y",
            "http://example.org/x`y",
            "http://example.org/x\ny",
        ] {
            let err = validate_iri(bad).unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR", "should reject {bad:?}");
        }
    }

    #[test]
    fn rejects_structural_failures() {
        assert!(!is_valid_iri(""));
        assert!(!is_valid_iri("   "));
        assert!(!is_valid_iri("no-scheme-here"));
        assert!(!is_valid_iri("1http://example.org/"));
        assert!(!is_valid_iri("urn:"));
        assert!(!is_valid_iri("urn:x"));
        assert!(!is_valid_iri("urn:this-nid-is-way-too-long-to-be-a-legal-nid-x:y"));
        assert!(!is_valid_iri("file://host/path"));
        assert!(!is_valid_iri("file:///"));
        assert!(!is_valid_iri("http://"));
        assert!(!is_valid_iri("mailto://a@example.org"));
    }

    #[test]
    fn input_must_be_object() {
        let ctx = test_context();
        assert!(validate_mutation_input(&Value::Null, &ctx).is_err());
        assert!(validate_mutation_input(&Value::List(vec![]), &ctx).is_err());
        assert!(validate_mutation_input(&Value::String("x".into()), &ctx).is_err());
        assert!(validate_mutation_input(&Value::Object(vec![]), &ctx).is_ok());
    }

    #[test]
    fn id_keys_are_iri_checked_after_expansion() {
        let ctx = test_context();
        // Relative against @base; expansion makes it a legal HTTP IRI.
        let ok = Value::Object(vec![("id".into(), Value::String("user1".into()))]);
        assert!(validate_mutation_input(&ok, &ctx).is_ok());

        let evil = Value::Object(vec![(
            "id".into(),
            Value::String("ex:evil> } ; DROP ALL ; INSERT { <x> <y> <z".into()),
        )]);
        let err = validate_mutation_input(&evil, &ctx).unwrap_err();
        match err {
            CompileError::Validation { reason, key, .. } => {
                assert!(reason.contains("illegal IRI characters"));
                assert_eq!(key.as_deref(), Some("id"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn nested_and_list_values_are_walked() {
        let ctx = test_context();
        let nested = Value::Object(vec![(
            "items".into(),
            Value::List(vec![Value::Object(vec![(
                "ownerId".into(),
                Value::String("owner 1".into()),
            )])]),
        )]);
        assert!(validate_mutation_input(&nested, &ctx).is_err());
    }

    #[test]
    fn null_and_variables_rejected() {
        let ctx = test_context();
        let with_null = Value::Object(vec![("name".into(), Value::Null)]);
        assert!(validate_mutation_input(&with_null, &ctx).is_err());

        let with_var = Value::Object(vec![("name".into(), Value::Variable("n".into()))]);
        assert!(validate_mutation_input(&with_var, &ctx).is_err());
    }

    #[test]
    fn query_validator_accepts_plain_select() {
        let v = SparqlQueryValidator::default();
        assert!(v
            .validate("SELECT ?s WHERE { ?s ?p ?o }")
            .is_ok());
        assert!(v
            .validate("PREFIX foaf: <http://xmlns.com/foaf/0.1/> SELECT ?s WHERE { ?s foaf:name ?n }")
            .is_ok());
    }

    #[test]
    fn query_validator_rejects_update_verbs() {
        let v = SparqlQueryValidator::default();
        for q in [
            "DROP GRAPH <http://example.org/g>",
            "SELECT ?s WHERE { ?s ?p \"DROP\" }", // overcautious by design
            "INSERT DATA { <a> <b> <c> }",
        ] {
            assert!(v.validate(q).is_err(), "should reject {q:?}");
        }
    }

    #[test]
    fn query_validator_rejects_structure_faults() {
        let v = SparqlQueryValidator::default();
        assert!(v.validate("ASK { ?s ?p ?o }").is_err());
        assert!(v.validate("SELECT ?s { ?s ?p ?o }").is_err());
        assert!(v.validate("SELECT ?s WHERE { ?s ?p ?o").is_err());
        assert!(v.validate("SELECT ?s WHERE } ?s ?p ?o {").is_err());
        let long = format!("SELECT ?s WHERE {{ {} }}", "?s ?p ?o . ".repeat(2000));
        assert!(v.validate(&long).is_err());
    }
}
