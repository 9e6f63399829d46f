//! GraphQL mutation to SPARQL UPDATE compilation
//!
//! The compiler resolves operation intent from the mutation's root
//! field name, validates the input object, and emits update algebra:
//! - create: `INSERT DATA` with a skolemized or explicit subject, an
//!   `rdf:type` triple, typed literals and relationship links (forward
//!   and, where the context knows an inverse, backward)
//! - update: `DELETE/INSERT WHERE` replacing every existing value of
//!   each supplied field
//! - delete: `DELETE WHERE` removing all triples with the subject
//!
//! Compilation is a straight-line state machine: parsed, operation
//! identified, input validated, algebra built. Each step either
//! completes or fails terminally; nothing is retried and no state
//! outlives the compilation.

use crate::algebra::{
    xsd, Bgp, CompositeUpdate, DeleteInsert, Literal, NamedNode, Term, TriplePattern, Variable,
    RDF_TYPE,
};
use crate::ast::{Document, MutationIntent, OperationType, Value};
use crate::context::Context;
use crate::error::CompileError;
use crate::validate::validate_mutation_input;

/// What a compiled mutation does, for response synthesis and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationVerb {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationVerb::Create => write!(f, "create"),
            MutationVerb::Update => write!(f, "update"),
            MutationVerb::Delete => write!(f, "delete"),
        }
    }
}

/// A compiled mutation: the update algebra plus enough metadata to
/// synthesize the GraphQL response shape.
#[derive(Debug, Clone)]
pub struct CompiledMutation {
    pub verb: MutationVerb,
    pub entity: String,
    /// The subject IRI the operation is about (minted for id-less
    /// creates).
    pub subject: String,
    pub algebra: CompositeUpdate,
}

/// Compiles mutation documents against a context snapshot.
pub struct MutationCompiler<'a> {
    context: &'a Context,
}

impl<'a> MutationCompiler<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Compiles the first mutation operation in the document.
    pub fn compile(&self, document: &Document) -> Result<CompiledMutation, CompileError> {
        let operation = document
            .operation(OperationType::Mutation)
            .ok_or_else(|| CompileError::validation("document contains no mutation"))?;
        let intent = MutationIntent::from_operation(operation)?;

        match intent {
            MutationIntent::Create { entity, input } => self.compile_create(entity, input),
            MutationIntent::Update { entity, id, input } => {
                self.compile_update(entity, id, input)
            }
            MutationIntent::Delete { entity, id } => self.compile_delete(entity, id),
        }
    }

    fn compile_create(
        &self,
        entity: String,
        input: Option<Value>,
    ) -> Result<CompiledMutation, CompileError> {
        let input = input.ok_or_else(|| {
            CompileError::validation(format!("create{entity} requires an 'input' argument"))
        })?;
        validate_mutation_input(&input, self.context)?;
        let fields = match input {
            Value::Object(fields) => fields,
            _ => unreachable!("validated as an object"),
        };

        let subject = match fields.iter().find(|(k, _)| k == "id") {
            Some((_, Value::String(id))) => {
                NamedNode::new(self.context.expand_iri(id))?
            }
            Some((_, other)) => {
                return Err(CompileError::Conversion(format!(
                    "'id' must be a string, got {}",
                    other.kind()
                )));
            }
            None => NamedNode::skolem(),
        };

        let type_iri = NamedNode::new(self.context.type_iri(&entity)?)?;
        let mut insert = vec![TriplePattern::new(
            subject.clone(),
            NamedNode::new_unchecked(RDF_TYPE),
            type_iri,
        )];

        for (key, value) in &fields {
            if key == "id" {
                continue;
            }
            match self.resolve_field(key, value)? {
                ResolvedField::Link { predicate, object, inverse } => {
                    insert.push(TriplePattern::new(
                        subject.clone(),
                        predicate,
                        object.clone(),
                    ));
                    if let Some(inverse) = inverse {
                        insert.push(TriplePattern::new(object, inverse, subject.clone()));
                    }
                }
                ResolvedField::Scalar { predicate, literal } => {
                    insert.push(TriplePattern::new(subject.clone(), predicate, literal));
                }
            }
        }

        Ok(CompiledMutation {
            verb: MutationVerb::Create,
            entity,
            subject: subject.as_str().to_string(),
            algebra: CompositeUpdate::single(DeleteInsert::insert_data(insert)),
        })
    }

    fn compile_update(
        &self,
        entity: String,
        id: String,
        input: Option<Value>,
    ) -> Result<CompiledMutation, CompileError> {
        let subject = NamedNode::new(self.context.expand_iri(&id))?;
        let input =
            input.ok_or_else(|| CompileError::validation("update operation has no fields"))?;
        validate_mutation_input(&input, self.context)?;
        let fields = match input {
            Value::Object(fields) => fields,
            _ => unreachable!("validated as an object"),
        };
        if fields.is_empty() {
            return Err(CompileError::validation("update operation has no fields"));
        }
        if fields.iter().any(|(k, _)| k == "id") {
            return Err(CompileError::Conversion(
                "the 'id' of an entity cannot be updated".into(),
            ));
        }

        let mut delete = Vec::with_capacity(fields.len());
        let mut insert = Vec::with_capacity(fields.len());
        let mut bindings = Vec::with_capacity(fields.len());

        for (key, value) in &fields {
            // Field names are unique within a GraphQL input object, so
            // one variable per field cannot collide.
            let old = Variable::new(format!("old_{key}"))?;
            let (predicate, new_object): (NamedNode, Term) = match self.resolve_field(key, value)? {
                // Relationship updates replace the forward triple only;
                // inverse links are not maintained on update.
                ResolvedField::Link { predicate, object, .. } => (predicate, object.into()),
                ResolvedField::Scalar { predicate, literal } => (predicate, literal.into()),
            };
            let existing = TriplePattern::new(subject.clone(), predicate.clone(), old);
            delete.push(existing.clone());
            bindings.push(existing);
            insert.push(TriplePattern::new(subject.clone(), predicate, new_object));
        }

        Ok(CompiledMutation {
            verb: MutationVerb::Update,
            entity,
            subject: subject.as_str().to_string(),
            algebra: CompositeUpdate::single(DeleteInsert {
                delete,
                insert,
                where_clause: Some(Bgp::new(bindings)),
            }),
        })
    }

    fn compile_delete(
        &self,
        entity: String,
        id: String,
    ) -> Result<CompiledMutation, CompileError> {
        let subject = NamedNode::new(self.context.expand_iri(&id))?;
        // All triples with this subject. Inverse triples pointing at it
        // stay behind; callers wanting a deep delete must issue their
        // own follow-up.
        let pattern = TriplePattern::new(
            subject.clone(),
            Variable::new("p_del")?,
            Variable::new("o_del")?,
        );
        Ok(CompiledMutation {
            verb: MutationVerb::Delete,
            entity,
            subject: subject.as_str().to_string(),
            algebra: CompositeUpdate::single(DeleteInsert {
                delete: vec![pattern.clone()],
                insert: Vec::new(),
                where_clause: Some(Bgp::new(vec![pattern])),
            }),
        })
    }

    /// Resolves one input field to either a relationship link or a
    /// typed scalar literal.
    fn resolve_field(&self, key: &str, value: &Value) -> Result<ResolvedField, CompileError> {
        let relationship_name = relationship_name(key, self.context);
        if let (Some(name), Value::String(target)) = (relationship_name, value) {
            let predicate = NamedNode::new(self.context.predicate_iri(name)?)?;
            let object = NamedNode::new(self.context.expand_iri(target))?;
            let inverse = match self.context.inverse_of(name) {
                Some(iri) => Some(NamedNode::new(iri)?),
                None => None,
            };
            return Ok(ResolvedField::Link {
                predicate,
                object,
                inverse,
            });
        }

        let predicate = NamedNode::new(self.context.predicate_iri(key)?)?;
        let literal = self.convert_literal(key, value)?;
        Ok(ResolvedField::Scalar { predicate, literal })
    }

    fn convert_literal(&self, key: &str, value: &Value) -> Result<Literal, CompileError> {
        graphql_literal(self.context, key, value)
    }
}

/// Maps a GraphQL value kind to a typed RDF literal. A context term
/// with an explicit `@type` overrides the inferred datatype.
pub(crate) fn graphql_literal(
    context: &Context,
    key: &str,
    value: &Value,
) -> Result<Literal, CompileError> {
    let explicit = context.term(key).and_then(|def| def.datatype.clone());

    let (lexical, inferred) = match value {
        Value::Int(i) => (i.to_string(), Some(xsd::INTEGER)),
        Value::Float(f) => (f.to_string(), Some(xsd::DOUBLE)),
        Value::Boolean(b) => (b.to_string(), Some(xsd::BOOLEAN)),
        Value::String(s) => (s.clone(), None),
        Value::Enum(name) => (name.clone(), None),
        Value::Null => {
            return Err(CompileError::Conversion(format!("field '{key}' is null")));
        }
        Value::List(_) | Value::Object(_) => {
            return Err(CompileError::Conversion(format!(
                "field '{key}' has a {} value, which cannot become a literal",
                value.kind()
            )));
        }
        Value::Variable(name) => {
            return Err(CompileError::UnsupportedFeature(format!(
                "variable '${name}' was not substituted"
            )));
        }
    };

    Ok(match explicit.or(inferred.map(String::from)) {
        Some(datatype) => Literal::typed(lexical, datatype),
        None => Literal::new(lexical),
    })
}

enum ResolvedField {
    Link {
        predicate: NamedNode,
        object: NamedNode,
        inverse: Option<NamedNode>,
    },
    Scalar {
        predicate: NamedNode,
        literal: Literal,
    },
}

/// The relationship name a key resolves to: keys ending in `Id` strip
/// the suffix, keys typed `@id` in the context (or on the common
/// relationship list) are used as-is.
fn relationship_name<'k>(key: &'k str, context: &Context) -> Option<&'k str> {
    if let Some(stripped) = key.strip_suffix("Id") {
        if !stripped.is_empty() {
            return Some(stripped);
        }
    }
    if context.is_relationship(key) {
        return Some(key);
    }
    None
}
