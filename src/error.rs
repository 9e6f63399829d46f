//! Error taxonomy for the GraphQL/SPARQL bridge
//!
//! Three layers:
//! - [`CompileError`]: everything that can go wrong between a GraphQL
//!   string and a SPARQL algebra tree (validation, context lookup,
//!   value conversion, unsupported constructs)
//! - [`EndpointError`]: everything that can go wrong talking to a
//!   SPARQL endpoint (timeouts, HTTP status, response shape, transport)
//! - [`RdfqlError`]: the client-level wrapper surfaced to callers
//!
//! Every error converts to a wire-level [`ErrorEnvelope`] carrying a
//! stable machine-readable code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes surfaced in the GraphQL error extensions.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONTEXT_ERROR: &str = "CONTEXT_ERROR";
    pub const CONVERSION_ERROR: &str = "CONVERSION_ERROR";
    pub const UNSUPPORTED_FEATURE: &str = "UNSUPPORTED_FEATURE";
    pub const UNSUPPORTED_OPERATION: &str = "UNSUPPORTED_OPERATION";
    pub const ENDPOINT_ERROR: &str = "ENDPOINT_ERROR";
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const INVALID_RESPONSE_FORMAT: &str = "INVALID_RESPONSE_FORMAT";
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
    pub const MUTATION_ERROR: &str = "MUTATION_ERROR";
    pub const QUERY_ERROR: &str = "QUERY_ERROR";
}

/// Errors raised while compiling GraphQL text into SPARQL algebra.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    /// Input failed validation before any algebra was built.
    #[error("validation failed: {reason}")]
    Validation {
        reason: String,
        /// Offending input key, when the failure is attributable to one.
        key: Option<String>,
        /// Offending value rendered as a string.
        value: Option<String>,
    },

    /// A term or type name could not be resolved through the JSON-LD context.
    #[error("context resolution failed: {0}")]
    Context(String),

    /// A GraphQL value or operation could not be converted to SPARQL.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// The operation uses a GraphQL feature this compiler does not support.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The operation kind itself is unsupported (e.g. subscriptions).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The GraphQL document failed to parse.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },
}

impl CompileError {
    /// Shorthand for a validation failure with no attributable key.
    pub fn validation(reason: impl Into<String>) -> Self {
        CompileError::Validation {
            reason: reason.into(),
            key: None,
            value: None,
        }
    }

    /// Validation failure attributed to a specific input key and value.
    pub fn validation_at(
        reason: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        CompileError::Validation {
            reason: reason.into(),
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }

    /// The stable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::Validation { .. } => codes::VALIDATION_ERROR,
            CompileError::Context(_) => codes::CONTEXT_ERROR,
            CompileError::Conversion(_) => codes::CONVERSION_ERROR,
            CompileError::UnsupportedFeature(_) => codes::UNSUPPORTED_FEATURE,
            CompileError::UnsupportedOperation(_) => codes::UNSUPPORTED_OPERATION,
            // Parse failures surface as validation failures to callers.
            CompileError::Syntax { .. } => codes::VALIDATION_ERROR,
        }
    }
}

/// Errors raised by the SPARQL endpoint driver.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The call did not complete within the configured timeout.
    #[error("endpoint call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The endpoint answered with a non-2xx status.
    #[error("endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The endpoint answered 2xx but the body was not a valid
    /// SPARQL 1.1 JSON results document.
    #[error("invalid response format: {0}")]
    InvalidResponseFormat(String),

    /// Transport-level failure (connection refused, DNS, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// Catch-all for failures outside the taxonomy.
    #[error("unknown endpoint error: {0}")]
    Unknown(String),
}

impl EndpointError {
    /// The stable code for this error. `Http` carries the status in the
    /// code itself (`HTTP_404`).
    pub fn code(&self) -> String {
        match self {
            EndpointError::Timeout { .. } => codes::TIMEOUT.to_string(),
            EndpointError::Http { status, .. } => format!("HTTP_{status}"),
            EndpointError::InvalidResponseFormat(_) => codes::INVALID_RESPONSE_FORMAT.to_string(),
            EndpointError::Transport(_) => codes::EXECUTION_ERROR.to_string(),
            EndpointError::Unknown(_) => codes::UNKNOWN_ERROR.to_string(),
        }
    }

    /// Whether the client retry policy may re-attempt this failure.
    /// Only timeouts, 5xx responses and transport faults are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            EndpointError::Timeout { .. } => true,
            EndpointError::Http { status, .. } => *status >= 500,
            EndpointError::Transport(_) => true,
            _ => false,
        }
    }
}

/// Client-level error: a compile or endpoint failure wrapped with the
/// operation kind it occurred in.
#[derive(Debug, Error)]
pub enum RdfqlError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// A mutation failed for a reason outside the typed taxonomy.
    #[error("mutation failed: {message}")]
    Mutation { message: String },

    /// A query failed for a reason outside the typed taxonomy.
    #[error("query failed: {message}")]
    Query { message: String },

    /// Client construction failed (bad configuration or context document).
    #[error("configuration error: {0}")]
    Config(String),
}

impl RdfqlError {
    pub fn code(&self) -> String {
        match self {
            RdfqlError::Compile(e) => e.code().to_string(),
            RdfqlError::Endpoint(e) => e.code(),
            RdfqlError::Mutation { .. } => codes::MUTATION_ERROR.to_string(),
            RdfqlError::Query { .. } => codes::QUERY_ERROR.to_string(),
            RdfqlError::Config(_) => codes::VALIDATION_ERROR.to_string(),
        }
    }

    /// Convert into the wire-level envelope.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let details = match self {
            RdfqlError::Compile(CompileError::Validation { key, value, .. }) => {
                if key.is_some() || value.is_some() {
                    Some(serde_json::json!({ "key": key, "value": value }))
                } else {
                    None
                }
            }
            RdfqlError::Endpoint(EndpointError::Http { status, body }) => {
                Some(serde_json::json!({ "status": status, "body": body }))
            }
            RdfqlError::Endpoint(EndpointError::Timeout { timeout_ms }) => {
                Some(serde_json::json!({ "timeout_ms": timeout_ms }))
            }
            _ => None,
        };
        ErrorEnvelope {
            name: self.name().to_string(),
            message: self.to_string(),
            code: self.code(),
            details,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RdfqlError::Compile(_) => "CompileError",
            RdfqlError::Endpoint(_) => "EndpointError",
            RdfqlError::Mutation { .. } => "MutationError",
            RdfqlError::Query { .. } => "QueryError",
            RdfqlError::Config(_) => "ConfigError",
        }
    }
}

/// The user-facing error shape: `{name, message, code, details?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    pub name: String,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
