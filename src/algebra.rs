//! RDF terms and the SPARQL algebra subset used by the compilers
//!
//! Terms follow the RDF abstract syntax: named nodes, literals,
//! variables and blank nodes. The algebra covers exactly what the two
//! compilers emit: triple patterns, basic graph patterns with optional
//! blocks, SELECT queries, and the unified DELETE/INSERT update form.
//!
//! A compiled algebra tree is immutable and consumed exactly once by
//! the serializer.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CompileError;
use crate::validate::validate_iri;

/// Well-known datatype IRIs.
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
}

/// The `rdf:type` predicate IRI.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// An IRI term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedNode {
    iri: String,
}

impl NamedNode {
    /// Creates a named node, validating the IRI first.
    pub fn new(iri: impl Into<String>) -> Result<Self, CompileError> {
        let iri = iri.into();
        validate_iri(&iri)?;
        Ok(Self { iri })
    }

    /// Creates a named node from an IRI already known to be valid
    /// (compile-time constants and upstream-validated strings).
    pub fn new_unchecked(iri: impl Into<String>) -> Self {
        Self { iri: iri.into() }
    }

    /// Mints a fresh skolemized subject: `urn:uuid:<v4>`.
    ///
    /// Skolem IRIs are used instead of blank nodes for create subjects
    /// so that inserted entities keep a stable, shareable identity
    /// across endpoints.
    pub fn skolem() -> Self {
        Self {
            iri: format!("urn:uuid:{}", Uuid::new_v4()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.iri
    }

    pub fn into_string(self) -> String {
        self.iri
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.iri)
    }
}

/// An RDF literal with optional datatype or language tag. The two are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    value: String,
    datatype: Option<String>,
    language: Option<String>,
}

impl Literal {
    /// A plain string literal (`xsd:string` by RDF 1.1 semantics).
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// A typed literal. An `xsd:string` datatype is normalized away so
    /// the serializer never emits a redundant annotation.
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        let datatype = datatype.into();
        Self {
            value: value.into(),
            datatype: if datatype == xsd::STRING {
                None
            } else {
                Some(datatype)
            },
            language: None,
        }
    }

    /// A language-tagged string.
    pub fn tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// A SPARQL variable. Names are restricted to `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    name: String,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Result<Self, CompileError> {
        let name = name.into();
        let mut chars = name.chars();
        let head_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CompileError::validation(format!(
                "invalid SPARQL variable name '{name}'"
            )));
        }
        Ok(Self { name })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

/// A blank node label. Never used as a create subject (skolem IRIs take
/// that role) but may appear in query results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlankNode {
    label: String,
}

impl BlankNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.label)
    }
}

/// Any RDF term usable in a triple pattern position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    NamedNode(NamedNode),
    Literal(Literal),
    Variable(Variable),
    BlankNode(BlankNode),
}

impl Term {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }
}

impl From<NamedNode> for Term {
    fn from(n: NamedNode) -> Self {
        Term::NamedNode(n)
    }
}

impl From<Literal> for Term {
    fn from(l: Literal) -> Self {
        Term::Literal(l)
    }
}

impl From<Variable> for Term {
    fn from(v: Variable) -> Self {
        Term::Variable(v)
    }
}

/// A triple (or quad, when `graph` is set) pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub graph: Option<NamedNode>,
}

impl TriplePattern {
    pub fn new(subject: impl Into<Term>, predicate: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            graph: None,
        }
    }

    /// All variables mentioned by this pattern.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(Term::as_variable)
            .collect::<Vec<_>>()
            .into_iter()
    }
}

/// A basic graph pattern.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bgp {
    pub patterns: Vec<TriplePattern>,
}

impl Bgp {
    pub fn new(patterns: Vec<TriplePattern>) -> Self {
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// The unified SPARQL UPDATE node. Serializes as `INSERT DATA` when
/// only `insert` is populated, `DELETE WHERE` when only `delete` and
/// `where_clause` are, and `DELETE/INSERT WHERE` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteInsert {
    pub delete: Vec<TriplePattern>,
    pub insert: Vec<TriplePattern>,
    pub where_clause: Option<Bgp>,
}

impl DeleteInsert {
    /// An `INSERT DATA` update: ground triples, no delete, no where.
    pub fn insert_data(insert: Vec<TriplePattern>) -> Self {
        Self {
            delete: Vec::new(),
            insert,
            where_clause: None,
        }
    }

    /// Checks the algebra invariant: every variable referenced in
    /// `delete` or `insert` also appears in `where_clause`.
    pub fn is_well_formed(&self) -> bool {
        let bound: Vec<&Variable> = self
            .where_clause
            .iter()
            .flat_map(|bgp| bgp.patterns.iter())
            .flat_map(TriplePattern::variables)
            .collect();
        self.delete
            .iter()
            .chain(self.insert.iter())
            .flat_map(TriplePattern::variables)
            .all(|v| bound.contains(&v))
    }
}

/// An ordered sequence of updates, serialized `;`-separated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeUpdate {
    pub updates: Vec<DeleteInsert>,
}

impl CompositeUpdate {
    pub fn single(update: DeleteInsert) -> Self {
        Self {
            updates: vec![update],
        }
    }
}

/// One element of a SPARQL group graph pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupElement {
    Triple(TriplePattern),
    /// An `OPTIONAL { ... }` block.
    Optional(Vec<GroupElement>),
}

impl GroupElement {
    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a Variable>) {
        match self {
            GroupElement::Triple(t) => out.extend(t.variables()),
            GroupElement::Optional(inner) => {
                for element in inner {
                    element.collect_variables(out);
                }
            }
        }
    }
}

/// A SPARQL SELECT query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    /// Projected variables, in selection order.
    pub variables: Vec<Variable>,
    pub pattern: Vec<GroupElement>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectQuery {
    /// All variables mentioned anywhere in the where pattern.
    pub fn pattern_variables(&self) -> Vec<&Variable> {
        let mut out = Vec::new();
        for element in &self.pattern {
            element.collect_variables(&mut out);
        }
        out
    }
}
