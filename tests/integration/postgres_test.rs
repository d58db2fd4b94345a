//! Pipeline tests against a real PostgreSQL server.
//!
//! Skipped unless DATABASE_URL is set.

use std::sync::Arc;
use std::time::Duration;

use sqlgate::config::{ConnectionConfig, ExecutionConfig};
use sqlgate::db::{DatabaseClient, PostgresClient, Value};
use sqlgate::error::ResponseStatus;
use sqlgate::gateway::{AskRequest, Gateway};
use sqlgate::llm::{MockLlmClient, SqlGenerator};
use sqlgate::query::QueryExecutor;
use sqlgate::safety::Policy;
use tokio_util::sync::CancellationToken;

async fn get_test_client() -> Option<Arc<PostgresClient>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    PostgresClient::connect(&config, &ExecutionConfig::default())
        .await
        .ok()
        .map(Arc::new)
}

fn gateway(client: Arc<PostgresClient>, llm: MockLlmClient, timeout: Duration) -> Gateway {
    Gateway::new(
        Policy::read_only(),
        SqlGenerator::new(Arc::new(llm)),
        QueryExecutor::new(client, timeout),
    )
}

#[tokio::test]
async fn test_ask_against_postgres() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let llm = MockLlmClient::new().with_response(
        "greeting",
        "SELECT 1 AS num, 'hello' AS greeting, NULL::int AS missing",
    );
    let gw = gateway(client.clone(), llm, Duration::from_secs(10));

    let response = gw
        .ask(&AskRequest::new("give me a greeting"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.rows.len(), 1);
    let row = &response.rows[0];
    assert_eq!(row.columns().collect::<Vec<_>>(), vec!["num", "greeting", "missing"]);
    assert_eq!(row.get("num"), Some(&Value::Int(1)));
    assert_eq!(row.get("greeting"), Some(&Value::from("hello")));
    assert_eq!(row.get("missing"), Some(&Value::Null));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_has_no_rows() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let llm = MockLlmClient::new().with_response("nothing", "SELECT 1 AS num WHERE false");
    let gw = gateway(client.clone(), llm, Duration::from_secs(10));

    let response = gw
        .ask(&AskRequest::new("return nothing"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(response.rows.is_empty());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_timeout_then_pool_still_serves() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let llm = MockLlmClient::new().with_response("slow", "SELECT pg_sleep(5)");
    let gw = gateway(client.clone(), llm, Duration::from_millis(200));

    let err = gw
        .ask(&AskRequest::new("something slow"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), ResponseStatus::StoreTimeout);

    gw.health().await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_store_error_is_store_failure() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let llm = MockLlmClient::new().with_response("missing", "SELECT * FROM nonexistent_table_xyz");
    let gw = gateway(client.clone(), llm, Duration::from_secs(10));

    let err = gw
        .ask(&AskRequest::new("the missing table"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), ResponseStatus::StoreFailure);
    assert!(err.detail().contains("nonexistent_table_xyz"));

    client.close().await.unwrap();
}
