//! # rdfql
//!
//! GraphQL queries and mutations over an RDF knowledge graph behind a
//! SPARQL 1.1 endpoint. A JSON-LD context maps GraphQL names to IRIs;
//! a bidirectional compiler does the rest:
//!
//! - queries compile to SPARQL SELECT algebra and result bindings are
//!   reshaped into a tree matching the original selection set
//! - mutations (`create<Entity>` / `update<Entity>` / `delete<Entity>`)
//!   compile to SPARQL UPDATE algebra with skolemized subjects, typed
//!   literals and inverse-link materialization
//! - everything user-supplied passes validation before compilation and
//!   escaping during serialization, so no input reaches the wire as
//!   raw SPARQL text
//!
//! ```no_run
//! use rdfql::{ClientConfig, RdfqlClient};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), rdfql::RdfqlError> {
//! let config = ClientConfig::new(
//!     json!({
//!         "@base": "http://example.org/",
//!         "User": "http://example.org/User",
//!         "name": "http://xmlns.com/foaf/0.1/name"
//!     }),
//!     "http://localhost:3030/ds/sparql",
//! );
//! let client = RdfqlClient::new(config)?;
//!
//! let created = client
//!     .mutate(r#"mutation { createUser(input: {name: "Alice"}) { id } }"#)
//!     .await;
//! let users = client.query("{ user { name } }", None).await;
//! # Ok(())
//! # }
//! ```

pub mod algebra;
pub mod ast;
pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod logger;
pub mod mutation;
pub mod query;
pub mod results;
pub mod serializer;
pub mod validate;

pub use client::{MutationData, MutationResponse, MutationStatus, QueryResponse, RdfqlClient};
pub use config::ClientConfig;
pub use context::Context;
pub use error::{CompileError, EndpointError, ErrorEnvelope, RdfqlError};
pub use logger::{Logger, MemoryLogger, NoopLogger, TracingLogger};
pub use mutation::{CompiledMutation, MutationCompiler, MutationVerb};
pub use query::{CompiledQuery, QueryCompiler};
pub use results::{shape_results, SparqlResults};
