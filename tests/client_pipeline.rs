//! Integration tests for the full query and mutation pipelines
//!
//! A scripted in-memory endpoint stands in for the SPARQL store, so
//! these tests exercise everything except the HTTP transport: parsing,
//! compilation, serialization, validation, caching, retry policy and
//! result shaping.

use anyhow::Result;
use async_trait::async_trait;
use rdfql::endpoint::{EndpointOptions, SparqlEndpoint, UpdateOutcome};
use rdfql::logger::{LogLevel, MemoryLogger};
use rdfql::{ClientConfig, EndpointError, RdfqlClient, SparqlResults};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Serves canned responses and records the SPARQL it was sent.
#[derive(Default)]
struct ScriptedEndpoint {
    query_responses: Mutex<Vec<Result<SparqlResults, EndpointError>>>,
    update_responses: Mutex<Vec<Result<UpdateOutcome, EndpointError>>>,
    query_calls: AtomicUsize,
    sent: Mutex<Vec<String>>,
}

impl ScriptedEndpoint {
    fn script_query(&self, response: Result<SparqlResults, EndpointError>) {
        self.query_responses.lock().unwrap().insert(0, response);
    }

    fn script_update(&self, response: Result<UpdateOutcome, EndpointError>) {
        self.update_responses.lock().unwrap().insert(0, response);
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SparqlEndpoint for ScriptedEndpoint {
    async fn query(
        &self,
        sparql: &str,
        _options: &EndpointOptions,
    ) -> Result<SparqlResults, EndpointError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(sparql.to_string());
        self.query_responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(EndpointError::Unknown("unscripted query".into())))
    }

    async fn update(
        &self,
        sparql: &str,
        _options: &EndpointOptions,
    ) -> Result<UpdateOutcome, EndpointError> {
        self.sent.lock().unwrap().push(sparql.to_string());
        self.update_responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(EndpointError::Unknown("unscripted update".into())))
    }
}

fn library_config() -> ClientConfig {
    ClientConfig::new(
        json!({
            "@base": "http://example.org/",
            "@vocab": "http://schema.org/",
            "User": "http://example.org/User",
            "name": "http://xmlns.com/foaf/0.1/name",
            "age": { "@id": "http://example.org/age", "@type": "xsd:integer" }
        }),
        "http://localhost:3030/ds/sparql",
    )
    .with_retry(1, 0)
}

fn user_bindings() -> Result<SparqlResults> {
    let results = SparqlResults::parse(
        r#"{
            "head": { "vars": ["user", "user_name", "user_age"] },
            "results": { "bindings": [
                { "user": { "type": "uri", "value": "http://example.org/u1" },
                  "user_name": { "type": "literal", "value": "Alice" },
                  "user_age": { "type": "literal", "value": "30",
                                "datatype": "http://www.w3.org/2001/XMLSchema#integer" } },
                { "user": { "type": "uri", "value": "http://example.org/u2" },
                  "user_name": { "type": "literal", "value": "Bob" },
                  "user_age": { "type": "literal", "value": "41",
                                "datatype": "http://www.w3.org/2001/XMLSchema#integer" } }
            ] }
        }"#,
    )?;
    Ok(results)
}

fn client(endpoint: Arc<ScriptedEndpoint>, config: ClientConfig) -> Result<RdfqlClient> {
    Ok(RdfqlClient::with_endpoint(config, endpoint)?)
}

#[tokio::test]
async fn test_query_shapes_lists_and_coerces_datatypes() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_query(Ok(user_bindings()?));
    let client = client(endpoint.clone(), library_config())?;

    let response = client.query("{ user { name age } }", None).await;
    assert!(response.errors.is_none(), "errors: {:?}", response.errors);
    let data = response.data.expect("data should be present");
    assert_eq!(
        data["user"],
        json!(["http://example.org/u1", "http://example.org/u2"])
    );
    assert_eq!(data["user_name"], json!(["Alice", "Bob"]));
    assert_eq!(data["user_age"], json!([30, 41]));

    let sent = endpoint.sent();
    assert!(sent[0].contains("?user <http://xmlns.com/foaf/0.1/name> ?user_name ."));
    assert!(sent[0].contains("rdf-syntax-ns#type"));
    Ok(())
}

#[tokio::test]
async fn test_single_directive_collapses_to_scalar() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_query(Ok(user_bindings()?));
    let client = client(endpoint, library_config())?;

    let response = client.query("{ user { name @single age } }", None).await;
    let data = response.data.expect("data should be present");
    // Marked singular: first binding only. Unmarked: full list.
    assert_eq!(data["user_name"], json!("Alice"));
    assert_eq!(data["user_age"], json!([30, 41]));
    Ok(())
}

#[tokio::test]
async fn test_timeout_fails_deterministically_with_no_data() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_query(Err(EndpointError::Timeout { timeout_ms: 25 }));
    let client = client(endpoint, library_config())?;

    let response = client.query("{ user { name } }", None).await;
    assert!(response.data.is_none(), "no partial results on timeout");
    let errors = response.errors.expect("timeout must surface an error");
    assert_eq!(errors[0].code, "TIMEOUT");
    let details = errors[0].details.as_ref().expect("timeout carries details");
    assert_eq!(details["timeout_ms"], 25);
    Ok(())
}

#[tokio::test]
async fn test_cache_set_then_get_and_overwrite_semantics() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_query(Ok(user_bindings()?));
    let client = client(endpoint.clone(), library_config())?;

    let first = client.query("{ user { name } }", None).await;
    let second = client.query("{ user { name } }", None).await;
    assert_eq!(first.data, second.data, "cache must return what was set");
    assert_eq!(endpoint.query_calls.load(Ordering::SeqCst), 1);

    // A mutation drops the cache; the next query goes back out and the
    // new result replaces the old entry.
    endpoint.script_update(Ok(UpdateOutcome {
        success: true,
        message: "HTTP 204".into(),
    }));
    endpoint.script_query(Ok(SparqlResults::parse(
        r#"{ "head": { "vars": ["user", "user_name"] },
             "results": { "bindings": [
               { "user": { "type": "uri", "value": "http://example.org/u3" },
                 "user_name": { "type": "literal", "value": "Carol" } }
             ] } }"#,
    )?));
    client
        .mutate(r#"mutation { createUser(input: {name: "Carol"}) { id } }"#)
        .await;

    let third = client.query("{ user { name } }", None).await;
    assert_eq!(endpoint.query_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        third.data.expect("data should be present")["user_name"],
        json!(["Carol"])
    );

    let fourth = client.query("{ user { name } }", None).await;
    assert_eq!(endpoint.query_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        fourth.data.expect("data should be present")["user_name"],
        json!(["Carol"])
    );
    Ok(())
}

#[tokio::test]
async fn test_disabled_cache_always_goes_to_the_endpoint() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_query(Ok(user_bindings()?));
    endpoint.script_query(Ok(user_bindings()?));
    let client = client(endpoint.clone(), library_config().with_cache(false))?;

    client.query("{ user { name } }", None).await;
    client.query("{ user { name } }", None).await;
    assert_eq!(endpoint.query_calls.load(Ordering::SeqCst), 2);
    assert!(client.cache_stats().is_none());
    Ok(())
}

#[tokio::test]
async fn test_mutation_sends_update_and_reports_details() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_update(Ok(UpdateOutcome {
        success: true,
        message: "HTTP 204".into(),
    }));
    let client = client(endpoint.clone(), library_config())?;

    let response = client
        .mutate(r#"mutation { createUser(input: {name: "Dora", age: 7}) { id } }"#)
        .await;
    assert!(response.data.mutate.success);
    let details = response
        .data
        .mutate
        .details
        .expect("successful mutations report details");
    assert_eq!(details["operation"], "create");
    assert_eq!(details["entity"], "User");

    let sent = endpoint.sent();
    assert!(sent[0].starts_with("INSERT DATA {"));
    assert!(sent[0].contains("\"7\"^^<http://www.w3.org/2001/XMLSchema#integer>"));
    Ok(())
}

#[tokio::test]
async fn test_graphql_variables_flow_into_queries() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_query(Ok(user_bindings()?));
    let client = client(endpoint.clone(), library_config())?;

    let variables = HashMap::from([("who".to_string(), json!("ex:u1"))]);
    let response = client
        .query(
            "query Q($who: String!) { user(id: $who) { name } }",
            Some(&variables),
        )
        .await;
    assert!(response.errors.is_none());
    assert!(endpoint.sent()[0].contains("<http://example.org/ex:u1>"));
    Ok(())
}

#[tokio::test]
async fn test_retry_then_success_logs_the_transient_failure() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_query(Err(EndpointError::Transport("connection reset".into())));
    endpoint.script_query(Ok(user_bindings()?));
    let logger = Arc::new(MemoryLogger::new());
    let client =
        client(endpoint.clone(), library_config().with_retry(2, 0))?.with_logger(logger.clone());

    let response = client.query("{ user { name } }", None).await;
    assert!(response.errors.is_none());
    assert_eq!(endpoint.query_calls.load(Ordering::SeqCst), 2);
    assert!(logger
        .messages_at(LogLevel::Warn)
        .iter()
        .any(|m| m.contains("retrying")));
    Ok(())
}

#[tokio::test]
async fn test_error_envelope_shape() -> Result<()> {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    endpoint.script_query(Err(EndpointError::Http {
        status: 401,
        body: "unauthorized".into(),
    }));
    let client = client(endpoint, library_config())?;

    let response = client.query("{ user { name } }", None).await;
    let rendered = serde_json::to_value(&response)?;
    assert!(rendered["data"].is_null());
    let error = &rendered["errors"][0];
    assert_eq!(error["code"], "HTTP_401");
    assert_eq!(error["name"], "EndpointError");
    assert!(error["message"]
        .as_str()
        .expect("message is a string")
        .contains("401"));
    assert_eq!(error["details"]["body"], "unauthorized");
    Ok(())
}
