//! The client: GraphQL in, GraphQL-shaped trees out
//!
//! [`RdfqlClient`] wires the whole pipeline together. Queries parse,
//! compile to SELECT algebra, serialize, optionally pass the coarse
//! SPARQL validator, probe the result cache, execute with retries and
//! reshape. Mutations parse, validate, compile to UPDATE algebra,
//! serialize and execute; a successful mutation drops the cache, since
//! the store changed under every cached query.
//!
//! The client owns the context snapshot and the endpoint handle; each
//! call owns its AST and algebra. Failures never escape as panics:
//! both entry points fold errors into the GraphQL response envelope.

use crate::ast::{Document, OperationType};
use crate::cache::{CacheStats, ResultCache};
use crate::config::ClientConfig;
use crate::context::Context;
use crate::endpoint::{EndpointOptions, HttpEndpoint, SparqlEndpoint};
use crate::error::{CompileError, EndpointError, ErrorEnvelope, RdfqlError};
use crate::logger::{Logger, TracingLogger};
use crate::mutation::MutationCompiler;
use crate::query::QueryCompiler;
use crate::results::{shape_results, SparqlResults};
use crate::serializer::{serialize_select, serialize_update};
use crate::validate::SparqlQueryValidator;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// A GraphQL query response: `{data, errors?}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryResponse {
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorEnvelope>>,
}

/// A GraphQL mutation response: `{data: {mutate: {success, details?}}, errors?}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MutationResponse {
    pub data: MutationData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorEnvelope>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MutationData {
    pub mutate: MutationStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MutationStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

/// GraphQL client over a SPARQL endpoint.
pub struct RdfqlClient {
    config: ClientConfig,
    context: Arc<Context>,
    endpoint: Arc<dyn SparqlEndpoint>,
    cache: Option<ResultCache>,
    logger: Arc<dyn Logger>,
    validator: SparqlQueryValidator,
}

impl RdfqlClient {
    /// Builds a client with an HTTP endpoint driver from the config.
    pub fn new(config: ClientConfig) -> Result<Self, RdfqlError> {
        let endpoint = Arc::new(HttpEndpoint::new(
            config.query_endpoint_url.clone(),
            config.update_endpoint_url.clone(),
        ));
        Self::with_endpoint(config, endpoint)
    }

    /// Builds a client around an injected endpoint driver. Tests use
    /// this to substitute fakes.
    pub fn with_endpoint(
        config: ClientConfig,
        endpoint: Arc<dyn SparqlEndpoint>,
    ) -> Result<Self, RdfqlError> {
        if config.query_endpoint_url.trim().is_empty() {
            return Err(RdfqlError::Config(
                "query_endpoint_url must not be empty".into(),
            ));
        }
        let context = Arc::new(Context::from_document(&config.context)?);
        let cache = config.cache_enabled.then(|| {
            ResultCache::new(config.cache_max_entries, config.cache_ttl())
        });
        Ok(Self {
            validator: SparqlQueryValidator::default(),
            context,
            endpoint,
            cache,
            logger: Arc::new(TracingLogger),
            config,
        })
    }

    /// Replaces the logging capability.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// The normalized context snapshot this client compiles against.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Cache occupancy and traffic counters, when caching is enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ResultCache::stats)
    }

    /// Executes a GraphQL query and shapes the result tree.
    pub async fn query(
        &self,
        source: &str,
        variables: Option<&HashMap<String, JsonValue>>,
    ) -> QueryResponse {
        let request_id = Uuid::new_v4().to_string();
        self.logger
            .debug("query started", &[("request_id", request_id.clone())]);
        match self.try_query(source, variables, &request_id).await {
            Ok(data) => {
                self.logger
                    .info("query completed", &[("request_id", request_id)]);
                QueryResponse {
                    data: Some(data),
                    errors: None,
                }
            }
            Err(error) => {
                self.logger.error(
                    "query failed",
                    &[
                        ("request_id", request_id),
                        ("code", error.code()),
                        ("error", error.to_string()),
                    ],
                );
                QueryResponse {
                    data: None,
                    errors: Some(vec![error.to_envelope()]),
                }
            }
        }
    }

    /// Executes a GraphQL mutation.
    pub async fn mutate(&self, source: &str) -> MutationResponse {
        let request_id = Uuid::new_v4().to_string();
        self.logger
            .debug("mutation started", &[("request_id", request_id.clone())]);
        match self.try_mutate(source, &request_id).await {
            Ok(details) => {
                self.logger
                    .info("mutation completed", &[("request_id", request_id)]);
                MutationResponse {
                    data: MutationData {
                        mutate: MutationStatus {
                            success: true,
                            details: Some(details),
                        },
                    },
                    errors: None,
                }
            }
            Err(error) => {
                self.logger.error(
                    "mutation failed",
                    &[
                        ("request_id", request_id),
                        ("code", error.code()),
                        ("error", error.to_string()),
                    ],
                );
                MutationResponse {
                    data: MutationData {
                        mutate: MutationStatus {
                            success: false,
                            details: None,
                        },
                    },
                    errors: Some(vec![error.to_envelope()]),
                }
            }
        }
    }

    /// Raw SPARQL escape hatch. The coarse read-query validator always
    /// runs here, whatever `validate_query` says; compiled mutations are
    /// the only sanctioned write path.
    pub async fn execute_sparql(&self, sparql: &str) -> Result<SparqlResults, RdfqlError> {
        self.validator.validate(sparql)?;
        let options = self.endpoint_options();
        let results = self
            .with_retry(|| self.endpoint.query(sparql, &options))
            .await?;
        Ok(results)
    }

    async fn try_query(
        &self,
        source: &str,
        variables: Option<&HashMap<String, JsonValue>>,
        request_id: &str,
    ) -> Result<JsonValue, RdfqlError> {
        let document = Document::parse(source)?;
        if document.operation(OperationType::Query).is_none()
            && document.operation(OperationType::Subscription).is_some()
        {
            return Err(CompileError::UnsupportedOperation(
                "subscriptions are not supported".into(),
            )
            .into());
        }

        let compiled = QueryCompiler::new(&self.context).compile(&document, variables)?;
        let sparql = serialize_select(&compiled.select);
        if self.config.debug {
            self.logger.debug(
                "compiled query",
                &[
                    ("request_id", request_id.to_string()),
                    ("sparql", sparql.clone()),
                ],
            );
        }
        if self.config.validate_query {
            self.validator.validate(&sparql)?;
        }

        let cache_key = cache_key(&sparql, &compiled.singularize);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&cache_key) {
                self.logger
                    .debug("cache hit", &[("request_id", request_id.to_string())]);
                return Ok(hit);
            }
        }

        let options = self.endpoint_options();
        let results = self
            .with_retry(|| self.endpoint.query(&sparql, &options))
            .await?;
        let shaped = shape_results(&results, &compiled.singularize);

        if let Some(cache) = &self.cache {
            cache.set(cache_key, shaped.clone());
        }
        Ok(shaped)
    }

    async fn try_mutate(
        &self,
        source: &str,
        request_id: &str,
    ) -> Result<JsonValue, RdfqlError> {
        let document = Document::parse(source)?;
        let compiled = MutationCompiler::new(&self.context).compile(&document)?;
        let sparql = serialize_update(&compiled.algebra);
        if self.config.debug {
            self.logger.debug(
                "compiled mutation",
                &[
                    ("request_id", request_id.to_string()),
                    ("sparql", sparql.clone()),
                ],
            );
        }

        let options = self.endpoint_options();
        let outcome = self
            .with_retry(|| self.endpoint.update(&sparql, &options))
            .await?;

        if let Some(cache) = &self.cache {
            cache.clear();
        }

        Ok(json!({
            "operation": compiled.verb.to_string(),
            "entity": compiled.entity,
            "id": compiled.subject,
            "message": outcome.message,
        }))
    }

    fn endpoint_options(&self) -> EndpointOptions {
        EndpointOptions {
            timeout: self.config.timeout(),
            max_results: Some(self.config.max_results),
        }
    }

    /// Re-attempts transient endpoint failures (timeouts, 5xx,
    /// transport faults) with a flat delay. Everything else surfaces
    /// immediately.
    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, EndpointError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EndpointError>>,
    {
        let attempts = self.config.retry_attempts.max(1);
        for attempt in 1..=attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < attempts => {
                    self.logger.warn(
                        "transient endpoint failure, retrying",
                        &[
                            ("attempt", attempt.to_string()),
                            ("code", error.code()),
                        ],
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                Err(error) => return Err(error),
            }
        }
        unreachable!("retry loop always returns")
    }
}

/// Cache keys cover the SPARQL text and the singularization map; two
/// queries that serialize identically but shape differently must not
/// share an entry.
fn cache_key(sparql: &str, singularize: &HashMap<String, bool>) -> String {
    let mut marks: Vec<String> = singularize
        .iter()
        .map(|(variable, singular)| format!("{variable}={singular}"))
        .collect();
    marks.sort();
    format!("{sparql}\n--singularize:{}", marks.join(","))
}
