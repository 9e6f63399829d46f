//! SPARQL Protocol endpoint driver
//!
//! POSTs serialized queries and updates to SPARQL 1.1 endpoints and
//! maps every failure into the [`EndpointError`] taxonomy. The driver
//! is stateless; concurrent calls are independent and each call
//! carries its own timeout.
//!
//! [`SparqlEndpoint`] is the seam tests use to inject fakes;
//! [`HttpEndpoint`] is the production implementation.

use crate::error::EndpointError;
use crate::results::SparqlResults;
use async_trait::async_trait;
use std::time::Duration;

/// SPARQL Protocol media types.
pub mod content_types {
    pub const SPARQL_QUERY: &str = "application/sparql-query";
    pub const SPARQL_UPDATE: &str = "application/sparql-update";
    pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";
}

/// Maximum number of response-body bytes carried inside an HTTP error.
const ERROR_BODY_EXCERPT: usize = 512;

/// Per-call execution options.
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    pub timeout: Duration,
    /// Bindings beyond this count are dropped from query results.
    pub max_results: Option<usize>,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            max_results: Some(1_000),
        }
    }
}

/// Outcome of a successful update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub success: bool,
    pub message: String,
}

/// A SPARQL 1.1 Protocol endpoint.
#[async_trait]
pub trait SparqlEndpoint: Send + Sync {
    /// Executes a SELECT query and returns the parsed, shape-checked
    /// JSON results, truncated to `max_results`.
    async fn query(
        &self,
        sparql: &str,
        options: &EndpointOptions,
    ) -> Result<SparqlResults, EndpointError>;

    /// Executes an update. Success iff the endpoint answered 2xx.
    async fn update(
        &self,
        sparql: &str,
        options: &EndpointOptions,
    ) -> Result<UpdateOutcome, EndpointError>;
}

/// The reqwest-backed endpoint driver.
///
/// Query and update URLs may differ (stores commonly expose
/// `/sparql` and `/update`); when no update URL is configured the
/// query URL serves both.
pub struct HttpEndpoint {
    client: reqwest::Client,
    query_url: String,
    update_url: String,
}

impl HttpEndpoint {
    pub fn new(query_url: impl Into<String>, update_url: Option<String>) -> Self {
        let query_url = query_url.into();
        let update_url = update_url.unwrap_or_else(|| query_url.clone());
        Self {
            client: reqwest::Client::new(),
            query_url,
            update_url,
        }
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    pub fn update_url(&self) -> &str {
        &self.update_url
    }

    fn map_transport_error(error: reqwest::Error, timeout: Duration) -> EndpointError {
        if error.is_timeout() {
            EndpointError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else if error.is_connect() || error.is_request() || error.is_body() {
            EndpointError::Transport(error.to_string())
        } else {
            EndpointError::Unknown(error.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EndpointError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
        Err(EndpointError::Http {
            status: status.as_u16(),
            body: excerpt,
        })
    }
}

#[async_trait]
impl SparqlEndpoint for HttpEndpoint {
    async fn query(
        &self,
        sparql: &str,
        options: &EndpointOptions,
    ) -> Result<SparqlResults, EndpointError> {
        let response = self
            .client
            .post(&self.query_url)
            .header("Content-Type", content_types::SPARQL_QUERY)
            .header("Accept", content_types::SPARQL_RESULTS_JSON)
            .body(sparql.to_string())
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(e, options.timeout))?;

        let response = Self::check_status(response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_transport_error(e, options.timeout))?;

        let mut results = SparqlResults::parse(&body)?;
        if let Some(max) = options.max_results {
            results.truncate(max);
        }
        Ok(results)
    }

    async fn update(
        &self,
        sparql: &str,
        options: &EndpointOptions,
    ) -> Result<UpdateOutcome, EndpointError> {
        let response = self
            .client
            .post(&self.update_url)
            .header("Content-Type", content_types::SPARQL_UPDATE)
            .body(sparql.to_string())
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(e, options.timeout))?;

        let status = response.status();
        let response = Self::check_status(response).await?;
        drop(response);

        Ok(UpdateOutcome {
            success: true,
            message: format!("HTTP {status}"),
        })
    }
}
