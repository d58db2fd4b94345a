//! End-to-end pipeline tests: question in, rows or a typed error out.
//!
//! Uses the mock generator and mock store, so no network or database is needed.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use sqlgate::db::{ColumnInfo, MockBehavior, MockDatabaseClient, QueryResult, Value};
use sqlgate::error::{ExecutionError, ResponseStatus};
use sqlgate::gateway::{AskRequest, ErrorBody, Gateway};
use sqlgate::llm::{MockLlmClient, SqlGenerator};
use sqlgate::query::QueryExecutor;
use sqlgate::safety::Policy;
use tokio_util::sync::CancellationToken;

const SMITH_SQL: &str = "SELECT * FROM Patient WHERE last_name = 'Smith'";

fn gateway(policy: Policy, llm: MockLlmClient, store: MockDatabaseClient, timeout: Duration) -> Gateway {
    Gateway::new(
        policy,
        SqlGenerator::new(Arc::new(llm)),
        QueryExecutor::new(Arc::new(store), timeout),
    )
}

fn patients() -> QueryResult {
    QueryResult::with_data(
        vec![
            ColumnInfo::new("patient_id", "INT4"),
            ColumnInfo::new("first_name", "TEXT"),
            ColumnInfo::new("last_name", "TEXT"),
        ],
        vec![
            vec![Value::Int(1), Value::from("Ann"), Value::from("Smith")],
            vec![Value::Int(4), Value::from("Bo"), Value::from("Smith")],
        ],
    )
}

#[tokio::test]
async fn test_smith_question_returns_rows_in_order() {
    let store = MockDatabaseClient::new().with_result(SMITH_SQL, patients());
    let gw = gateway(
        Policy::read_only(),
        MockLlmClient::new(),
        store.clone(),
        Duration::from_secs(5),
    );

    let response = gw
        .ask(
            &AskRequest::new("Show me all patients named Smith"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.sql, SMITH_SQL);
    assert_eq!(store.executed(), vec![SMITH_SQL.to_string()]);

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "sql": SMITH_SQL,
            "rows": [
                {"patient_id": 1, "first_name": "Ann", "last_name": "Smith"},
                {"patient_id": 4, "first_name": "Bo", "last_name": "Smith"}
            ]
        })
    );
    let columns: Vec<&str> = response.rows[0].columns().collect();
    assert_eq!(columns, vec!["patient_id", "first_name", "last_name"]);
}

#[tokio::test]
async fn test_chained_statement_never_executes() {
    let store = MockDatabaseClient::new();
    let llm = MockLlmClient::new().with_response("named smith", "SELECT * FROM Patient; DROP TABLE Patient");
    let gw = gateway(Policy::read_only(), llm, store.clone(), Duration::from_secs(5));

    let err = gw
        .ask(
            &AskRequest::new("show me all patients named Smith"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    let body = ErrorBody::from(&err);
    assert_eq!(body.status, ResponseStatus::BadRequest);
    assert_eq!(body.code, "MULTI_STATEMENT");
    assert_eq!(store.acquired(), 0);
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_write_generated_under_read_only_is_rejected() {
    let store = MockDatabaseClient::new();
    let llm = MockLlmClient::new().with_response("smith", "DELETE FROM patient WHERE last_name = 'Smith'");
    let gw = gateway(Policy::read_only(), llm, store.clone(), Duration::from_secs(5));

    let err = gw
        .ask(&AskRequest::new("forget the Smiths"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "WRONG_VERB");
    assert_eq!(err.status().http_code(), 400);
    assert_eq!(store.acquired(), 0);
}

#[tokio::test]
async fn test_limited_write_delete_runs_exact_text() {
    let store = MockDatabaseClient::new();
    let llm = MockLlmClient::new().with_response(
        "discharge",
        "```sql\nDELETE FROM patient\n  WHERE patient_id = 9;\n```",
    );
    let gw = gateway(Policy::limited_write(), llm.clone(), store.clone(), Duration::from_secs(5));

    let response = gw
        .ask(
            &AskRequest::new("discharge patient 9").with_op("delete"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.sql, "DELETE FROM patient WHERE patient_id = 9");
    assert!(response.rows.is_empty());
    assert_eq!(store.executed(), vec![response.sql.clone()]);
    assert!(llm.received()[0].starts_with("Target operation: DELETE"));
}

#[tokio::test]
async fn test_store_failure_is_not_a_bad_request() {
    let store = MockDatabaseClient::with_behavior(MockBehavior::Fail(ExecutionError::statement(
        "relation \"patient\" does not exist",
    )));
    let gw = gateway(
        Policy::read_only(),
        MockLlmClient::new(),
        store.clone(),
        Duration::from_secs(5),
    );

    let err = gw
        .ask(&AskRequest::new("list patients"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), ResponseStatus::StoreFailure);
    assert_eq!(err.code(), "STATEMENT_ERROR");
    assert_eq!(store.outstanding(), 0);
}

#[tokio::test]
async fn test_slow_store_times_out_and_releases() {
    let store = MockDatabaseClient::with_behavior(MockBehavior::Hang);
    let gw = gateway(
        Policy::read_only(),
        MockLlmClient::new(),
        store.clone(),
        Duration::from_millis(50),
    );

    let err = gw
        .ask(&AskRequest::new("list patients"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), ResponseStatus::StoreTimeout);
    assert_eq!(err.status().http_code(), 504);
    assert_eq!(store.acquired(), 1);
    assert_eq!(store.outstanding(), 0);
}

#[tokio::test]
async fn test_cancelled_request_releases_connection() {
    let store = MockDatabaseClient::with_behavior(MockBehavior::Hang);
    let gw = gateway(
        Policy::read_only(),
        MockLlmClient::new(),
        store.clone(),
        Duration::from_secs(30),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = gw
        .ask(&AskRequest::new("list patients"), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CANCELLED");
    assert_eq!(store.outstanding(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_gateway() {
    let store = MockDatabaseClient::with_behavior(MockBehavior::Delay(Duration::from_millis(10)))
        .with_result(SMITH_SQL, patients());
    let gw = gateway(
        Policy::read_only(),
        MockLlmClient::new(),
        store.clone(),
        Duration::from_secs(5),
    );

    let questions = [
        "show me all patients named Smith",
        "list patients",
        "count the patients",
        "",
        "show me all patients named Smith",
    ];
    let cancel = CancellationToken::new();
    let results = join_all(questions.iter().map(|q| {
        let gw = gw.clone();
        let cancel = cancel.clone();
        let request = AskRequest::new(*q);
        async move { gw.ask(&request, &cancel).await }
    }))
    .await;

    assert_eq!(results.len(), 5);
    assert_eq!(results[0].as_ref().unwrap().rows.len(), 2);
    assert!(results[1].is_ok());
    assert!(results[2].is_ok());
    assert_eq!(
        results[3].as_ref().unwrap_err().status(),
        ResponseStatus::BadRequest
    );
    assert_eq!(results[4].as_ref().unwrap().rows.len(), 2);

    assert_eq!(store.acquired(), 4);
    assert_eq!(store.outstanding(), 0);
}

#[tokio::test]
async fn test_repeated_requests_do_not_leak_connections() {
    let store = MockDatabaseClient::new();
    let gw = gateway(
        Policy::read_only(),
        MockLlmClient::new(),
        store.clone(),
        Duration::from_secs(5),
    );

    for _ in 0..25 {
        gw.ask(&AskRequest::new("list patients"), &CancellationToken::new())
            .await
            .unwrap();
    }
    gw.health().await.unwrap();

    assert_eq!(store.acquired(), 26);
    assert_eq!(store.released(), 26);
}

#[tokio::test]
async fn test_generator_failure_skips_store() {
    let store = MockDatabaseClient::new();
    let gw = gateway(
        Policy::read_only(),
        MockLlmClient::failing("Failed to connect to OpenAI API. Check your network."),
        store.clone(),
        Duration::from_secs(5),
    );

    let err = gw
        .ask(&AskRequest::new("list patients"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), ResponseStatus::GeneratorFailure);
    assert_eq!(err.status().http_code(), 502);
    assert_eq!(store.acquired(), 0);
}
