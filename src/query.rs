//! GraphQL query to SPARQL SELECT compilation
//!
//! Each selected field becomes a triple pattern edge: a nested field
//! `g` under a node bound to `?v` emits `?v <predicate_iri(g)> ?v_g`
//! and descends with `?v_g`. Root fields open fresh subject variables,
//! anchored with an `rdf:type` pattern when the field name resolves to
//! a type IRI. The compiler also produces the singularization map the
//! result shaper uses to decide which variables collapse to a scalar.

use crate::algebra::{GroupElement, NamedNode, SelectQuery, Term, TriplePattern, Variable, RDF_TYPE};
use crate::ast::{
    Document, Field, OperationDefinition, OperationType, Selection, SelectionSet, Value,
};
use crate::context::Context;
use crate::error::CompileError;
use crate::mutation::graphql_literal;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A compiled query: SELECT algebra plus the map that tells the shaper
/// which variables surface as a single value instead of a list.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub select: SelectQuery,
    pub singularize: HashMap<String, bool>,
}

/// Compiles query documents against a context snapshot.
pub struct QueryCompiler<'a> {
    context: &'a Context,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Compiles the first query operation in the document, substituting
    /// any GraphQL variables from `variables` first.
    pub fn compile(
        &self,
        document: &Document,
        variables: Option<&HashMap<String, JsonValue>>,
    ) -> Result<CompiledQuery, CompileError> {
        let operation = document
            .operation(OperationType::Query)
            .ok_or_else(|| CompileError::validation("document contains no query"))?;

        let operation = self.substitute_variables(operation, variables)?;

        let mut state = CompileState::default();
        for selection in &operation.selection_set.items {
            match selection {
                Selection::Field(field) => self.compile_root_field(field, &mut state)?,
                Selection::InlineFragment(_) => {
                    return Err(CompileError::Conversion(
                        "inline fragments are not supported at the query root".into(),
                    ));
                }
            }
        }

        Ok(CompiledQuery {
            select: SelectQuery {
                variables: state.projection,
                pattern: state.pattern,
                limit: state.limit,
                offset: state.offset,
            },
            singularize: state.singularize,
        })
    }

    fn compile_root_field(
        &self,
        field: &Field,
        state: &mut CompileState,
    ) -> Result<(), CompileError> {
        let name = field.response_name().to_string();
        let mut elements = Vec::new();

        let node = match field.argument("id") {
            Some(Value::String(id)) => {
                Term::NamedNode(NamedNode::new(self.context.expand_iri(id))?)
            }
            Some(other) => {
                return Err(CompileError::validation_at(
                    format!("'id' argument must be a string, got {}", other.kind()),
                    "id",
                    format!("{other:?}"),
                ));
            }
            None => {
                let variable = Variable::new(name.clone())?;
                state.project(variable.clone(), field, field.selection_set.is_some());
                Term::Variable(variable)
            }
        };

        // Anchor the root subject by type when the field name resolves
        // to one; otherwise treat the field as a predicate edge from an
        // unconstrained subject.
        match self.context.type_iri(&field.name) {
            Ok(type_iri) => {
                elements.push(GroupElement::Triple(TriplePattern::new(
                    node.clone(),
                    NamedNode::new_unchecked(RDF_TYPE),
                    NamedNode::new(type_iri)?,
                )));
            }
            Err(_) => {
                let root = Variable::new(format!("b{}", state.next_blank()))?;
                let predicate = NamedNode::new(self.context.predicate_iri(&field.name)?)?;
                elements.push(GroupElement::Triple(TriplePattern::new(
                    Term::Variable(root),
                    predicate,
                    node.clone(),
                )));
            }
        }

        self.compile_arguments(field, &node, &mut elements, state, true)?;

        if let Some(selection_set) = &field.selection_set {
            self.compile_selection_set(selection_set, &node, &name, &mut elements, state)?;
        }

        state.pattern.extend(elements);
        Ok(())
    }

    fn compile_selection_set(
        &self,
        selection_set: &SelectionSet,
        node: &Term,
        prefix: &str,
        elements: &mut Vec<GroupElement>,
        state: &mut CompileState,
    ) -> Result<(), CompileError> {
        for selection in &selection_set.items {
            match selection {
                Selection::Field(field) => {
                    self.compile_field(field, node, prefix, elements, state)?;
                }
                Selection::InlineFragment(fragment) => {
                    if let Some(condition) = &fragment.type_condition {
                        elements.push(GroupElement::Triple(TriplePattern::new(
                            node.clone(),
                            NamedNode::new_unchecked(RDF_TYPE),
                            NamedNode::new(self.context.type_iri(condition)?)?,
                        )));
                    }
                    self.compile_selection_set(
                        &fragment.selection_set,
                        node,
                        prefix,
                        elements,
                        state,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn compile_field(
        &self,
        field: &Field,
        node: &Term,
        prefix: &str,
        elements: &mut Vec<GroupElement>,
        state: &mut CompileState,
    ) -> Result<(), CompileError> {
        // Selecting `id` surfaces the node itself, no new pattern.
        if field.name == "id" && field.selection_set.is_none() {
            if let Term::Variable(variable) = node {
                state.singularize.insert(variable.as_str().to_string(), true);
            }
            return Ok(());
        }

        let child_prefix = format!("{prefix}_{}", field.response_name());
        let predicate = NamedNode::new(self.context.predicate_iri(&field.name)?)?;
        let object = match field.argument("id") {
            Some(Value::String(id)) => {
                Term::NamedNode(NamedNode::new(self.context.expand_iri(id))?)
            }
            Some(other) => {
                return Err(CompileError::validation_at(
                    format!("'id' argument must be a string, got {}", other.kind()),
                    "id",
                    format!("{other:?}"),
                ));
            }
            None => {
                let variable = Variable::new(child_prefix.clone())?;
                let is_scalar = field.selection_set.is_none();
                state.project(variable.clone(), field, !is_scalar);
                Term::Variable(variable)
            }
        };

        let mut inner = vec![GroupElement::Triple(TriplePattern::new(
            node.clone(),
            predicate,
            object.clone(),
        ))];

        self.compile_arguments(field, &object, &mut inner, state, false)?;

        if let Some(selection_set) = &field.selection_set {
            self.compile_selection_set(selection_set, &object, &child_prefix, &mut inner, state)?;
        }

        if field.has_directive("optional") {
            elements.push(GroupElement::Optional(inner));
        } else {
            elements.extend(inner);
        }
        Ok(())
    }

    /// Scalar arguments become value constraints on the field's node;
    /// `limit` and `offset` slice the query and are only meaningful on
    /// root fields.
    fn compile_arguments(
        &self,
        field: &Field,
        node: &Term,
        elements: &mut Vec<GroupElement>,
        state: &mut CompileState,
        is_root: bool,
    ) -> Result<(), CompileError> {
        for (key, value) in &field.arguments {
            match key.as_str() {
                "id" => {
                    // Consumed when the node was created.
                }
                "limit" | "offset" => {
                    if !is_root {
                        return Err(CompileError::Conversion(format!(
                            "'{key}' is only supported on root query fields"
                        )));
                    }
                    let Value::Int(n) = value else {
                        return Err(CompileError::validation_at(
                            format!("'{key}' must be an integer"),
                            key,
                            format!("{value:?}"),
                        ));
                    };
                    if *n < 0 {
                        return Err(CompileError::validation_at(
                            format!("'{key}' must not be negative"),
                            key,
                            n.to_string(),
                        ));
                    }
                    if key == "limit" {
                        state.limit = Some(*n as u64);
                    } else {
                        state.offset = Some(*n as u64);
                    }
                }
                _ => {
                    let predicate = NamedNode::new(self.context.predicate_iri(key)?)?;
                    let object: Term = if self.context.is_relationship(key) {
                        match value {
                            Value::String(target) => Term::NamedNode(NamedNode::new(
                                self.context.expand_iri(target),
                            )?),
                            other => {
                                return Err(CompileError::validation_at(
                                    format!(
                                        "relationship argument '{key}' must be a string IRI"
                                    ),
                                    key,
                                    format!("{other:?}"),
                                ));
                            }
                        }
                    } else {
                        Term::Literal(graphql_literal(self.context, key, value)?)
                    };
                    elements.push(GroupElement::Triple(TriplePattern::new(
                        node.clone(),
                        predicate,
                        object,
                    )));
                }
            }
        }
        Ok(())
    }

    /// Replaces AST variable references with concrete values from the
    /// caller-supplied map and the operation's declared defaults.
    fn substitute_variables(
        &self,
        operation: &OperationDefinition,
        variables: Option<&HashMap<String, JsonValue>>,
    ) -> Result<OperationDefinition, CompileError> {
        let mut bindings: HashMap<String, Value> = HashMap::new();
        for definition in &operation.variable_definitions {
            if let Some(json) = variables.and_then(|v| v.get(&definition.name)) {
                bindings.insert(definition.name.clone(), json_to_value(json));
            } else if let Some(default) = &definition.default_value {
                bindings.insert(definition.name.clone(), default.clone());
            }
        }

        let mut operation = operation.clone();
        substitute_selection_set(&mut operation.selection_set, &bindings)?;
        Ok(operation)
    }
}

#[derive(Default)]
struct CompileState {
    projection: Vec<Variable>,
    pattern: Vec<GroupElement>,
    singularize: HashMap<String, bool>,
    limit: Option<u64>,
    offset: Option<u64>,
    blank_counter: usize,
}

impl CompileState {
    /// Projects a variable and records its singularization. Scalar
    /// fields are singular when `@single` is present; object fields and
    /// set-containers are always plural.
    fn project(&mut self, variable: Variable, field: &Field, is_object: bool) {
        let singular = field.has_directive("single") && !is_object;
        self.singularize
            .insert(variable.as_str().to_string(), singular);
        self.projection.push(variable);
    }

    fn next_blank(&mut self) -> usize {
        let n = self.blank_counter;
        self.blank_counter += 1;
        n
    }
}

fn substitute_selection_set(
    selection_set: &mut SelectionSet,
    bindings: &HashMap<String, Value>,
) -> Result<(), CompileError> {
    for selection in &mut selection_set.items {
        match selection {
            Selection::Field(field) => {
                for (_, value) in &mut field.arguments {
                    substitute_value(value, bindings)?;
                }
                if let Some(nested) = &mut field.selection_set {
                    substitute_selection_set(nested, bindings)?;
                }
            }
            Selection::InlineFragment(fragment) => {
                substitute_selection_set(&mut fragment.selection_set, bindings)?;
            }
        }
    }
    Ok(())
}

fn substitute_value(
    value: &mut Value,
    bindings: &HashMap<String, Value>,
) -> Result<(), CompileError> {
    match value {
        Value::Variable(name) => match bindings.get(name) {
            Some(bound) => *value = bound.clone(),
            None => {
                return Err(CompileError::validation_at(
                    format!("no value supplied for variable '${name}'"),
                    name.clone(),
                    format!("${name}"),
                ));
            }
        },
        Value::List(items) => {
            for item in items {
                substitute_value(item, bindings)?;
            }
        }
        Value::Object(fields) => {
            for (_, nested) in fields {
                substitute_value(nested, bindings)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        JsonValue::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::serialize_select;
    use serde_json::json;

    fn library_context() -> Context {
        Context::from_document(&json!({
            "@base": "http://example.org/",
            "@vocab": "http://schema.org/",
            "User": "http://example.org/User",
            "name": "http://xmlns.com/foaf/0.1/name",
            "age": { "@id": "http://example.org/age", "@type": "xsd:integer" },
            "friend": { "@id": "http://example.org/friend", "@type": "@id" }
        }))
        .unwrap()
    }

    fn compile(source: &str) -> CompiledQuery {
        let ctx = library_context();
        QueryCompiler::new(&ctx)
            .compile(&Document::parse(source).unwrap(), None)
            .unwrap()
    }

    #[test]
    fn root_fields_are_type_anchored() {
        let compiled = compile("{ user { name } }");
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains(
            "?user <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/User> ."
        ));
        assert!(sparql.contains("?user <http://xmlns.com/foaf/0.1/name> ?user_name ."));
        assert!(sparql.starts_with("SELECT ?user ?user_name WHERE"));
    }

    #[test]
    fn unanchored_root_uses_a_blank_subject() {
        let ctx = Context::from_document(&json!({
            "name": "http://xmlns.com/foaf/0.1/name"
        }))
        .unwrap();
        let compiled = QueryCompiler::new(&ctx)
            .compile(&Document::parse("{ name }").unwrap(), None)
            .unwrap();
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains("?b0 <http://xmlns.com/foaf/0.1/name> ?name ."));
    }

    #[test]
    fn id_argument_binds_a_concrete_subject() {
        let compiled = compile(r#"{ user(id: "ex:user1") { name age } }"#);
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains("<http://example.org/ex:user1> \
            <http://www.w3.org/1999/02/22-rdf-syntax-ns#type>"));
        assert!(sparql.contains("<http://example.org/ex:user1> \
            <http://xmlns.com/foaf/0.1/name> ?user_name ."));
        // No subject variable projected when the subject is concrete.
        assert!(sparql.starts_with("SELECT ?user_name ?user_age WHERE"));
    }

    #[test]
    fn scalar_arguments_become_value_constraints() {
        let compiled = compile(r#"{ user(age: 30) { name } }"#);
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains(
            "?user <http://example.org/age> \"30\"^^<http://www.w3.org/2001/XMLSchema#integer> ."
        ));
    }

    #[test]
    fn relationship_arguments_expand_to_iris() {
        let compiled = compile(r#"{ user(friend: "ex:user2") { name } }"#);
        let sparql = serialize_select(&compiled.select);
        assert!(sparql
            .contains("?user <http://example.org/friend> <http://example.org/ex:user2> ."));
    }

    #[test]
    fn nested_objects_chain_variables() {
        let compiled = compile("{ user { friend { name } } }");
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains("?user <http://example.org/friend> ?user_friend ."));
        assert!(sparql
            .contains("?user_friend <http://xmlns.com/foaf/0.1/name> ?user_friend_name ."));
    }

    #[test]
    fn single_directive_marks_the_variable() {
        let compiled = compile("{ user { name @single age } }");
        assert_eq!(compiled.singularize.get("user_name"), Some(&true));
        assert_eq!(compiled.singularize.get("user_age"), Some(&false));
        assert_eq!(compiled.singularize.get("user"), Some(&false));
    }

    #[test]
    fn optional_directive_wraps_the_subtree() {
        let compiled = compile("{ user { name @optional } }");
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains("OPTIONAL {\n"));
        assert!(sparql.contains("?user <http://xmlns.com/foaf/0.1/name> ?user_name ."));
    }

    #[test]
    fn limit_and_offset_slice_the_query() {
        let compiled = compile("{ user(limit: 10, offset: 20) { name } }");
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.ends_with("LIMIT 10 OFFSET 20"));

        let ctx = library_context();
        let err = QueryCompiler::new(&ctx)
            .compile(
                &Document::parse("{ user { friend(limit: 3) { name } } }").unwrap(),
                None,
            )
            .unwrap_err();
        assert_eq!(err.code(), "CONVERSION_ERROR");
    }

    #[test]
    fn type_conditions_add_type_patterns() {
        let compiled = compile("{ user { ... on Person { name } } }");
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains(
            "?user <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Person> ."
        ));
    }

    #[test]
    fn id_selection_projects_the_node_variable() {
        let compiled = compile("{ user { id name } }");
        let sparql = serialize_select(&compiled.select);
        // `id` adds no pattern; the subject variable carries it.
        assert_eq!(sparql.matches("?user ").count(), 3);
        assert_eq!(compiled.singularize.get("user"), Some(&true));
    }

    #[test]
    fn aliases_rename_variables() {
        let compiled = compile("{ people: user { label: name } }");
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains("?people <http://xmlns.com/foaf/0.1/name> ?people_label ."));
    }

    #[test]
    fn variables_are_substituted() {
        let ctx = library_context();
        let source = r#"query Q($who: String!, $n: Int = 5) {
            user(id: $who, limit: $n) { name }
        }"#;
        let variables = HashMap::from([("who".to_string(), json!("ex:user1"))]);
        let compiled = QueryCompiler::new(&ctx)
            .compile(&Document::parse(source).unwrap(), Some(&variables))
            .unwrap();
        let sparql = serialize_select(&compiled.select);
        assert!(sparql.contains("<http://example.org/ex:user1>"));
        assert!(sparql.ends_with("LIMIT 5"));

        let err = QueryCompiler::new(&ctx)
            .compile(&Document::parse(source).unwrap(), None)
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
