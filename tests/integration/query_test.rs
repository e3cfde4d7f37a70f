//! Query execution integration tests.

use pretty_assertions::assert_eq;
use rmpv::Value;
use serde_json::json;
use spacegate::connection::ConnectionManager;
use spacegate::error::GatewayError;
use spacegate::gateway::Gateway;
use spacegate::query::EVAL_SHIM;
use spacegate::response::{ApiResponse, ErrorResponse, Operation};
use std::sync::{Arc, Mutex};

use super::fake_server::{envelope, FakeServer};
use super::live_target;

fn column(name: &str, column_type: &str) -> Value {
    envelope(vec![
        ("name", Value::from(name)),
        ("type", Value::from(column_type)),
    ])
}

#[tokio::test]
async fn test_select_rows_are_normalized() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let server = FakeServer::builder()
        .user("admin", "secret")
        .eval(move |expr, args| {
            recorder
                .lock()
                .unwrap()
                .push((expr.to_string(), args.to_vec()));
            Ok(envelope(vec![
                (
                    "metadata",
                    Value::Array(vec![column("a", "integer"), column("b", "string")]),
                ),
                (
                    "rows",
                    Value::Array(vec![
                        Value::Array(vec![Value::from(1), Value::from("x")]),
                        Value::Array(vec![Value::Nil, Value::from("y")]),
                    ]),
                ),
            ]))
        })
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let result = gateway
        .query(&server.target("admin", "secret"), "SELECT a, b FROM t")
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(ApiResponse::success(Operation::Query, &result)).unwrap(),
        json!({
            "message_id": "query_db_success",
            "code": 2005,
            "data": {
                "columns": [{"name": "a", "type": "integer"}, {"name": "b", "type": "string"}],
                "data": [{"a": 1, "b": "x"}, {"a": "null", "b": "y"}]
            }
        })
    );

    let calls = seen.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, EVAL_SHIM);
    assert_eq!(calls[0].1, vec![Value::from("SELECT a, b FROM t")]);
}

#[tokio::test]
async fn test_dml_reports_row_count() {
    let server = FakeServer::builder()
        .eval(|_, _| {
            Ok(envelope(vec![
                ("metadata", Value::Map(Vec::new())),
                ("rows", Value::Map(Vec::new())),
                ("row_count", Value::from(2)),
            ]))
        })
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let result = gateway
        .query(&server.target("guest", ""), "DELETE FROM t WHERE a < 3")
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"columns": [], "data": [], "row_count": 2})
    );
}

#[tokio::test]
async fn test_engine_error_carries_detail() {
    let server = FakeServer::builder()
        .eval(|_, _| {
            Ok(envelope(vec![
                ("metadata", Value::Array(Vec::new())),
                ("rows", Value::Array(Vec::new())),
                ("error", Value::from("Space 'missing' does not exist")),
            ]))
        })
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let err = gateway
        .query(&server.target("guest", ""), "SELECT * FROM missing")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Engine(_)));

    assert_eq!(
        serde_json::to_value(ErrorResponse::from_error(Operation::Query, &err)).unwrap(),
        json!({
            "message_id": "query_db_failed",
            "code": -2005,
            "error": "query_execution_failed",
            "detail": "Space 'missing' does not exist"
        })
    );
    assert_eq!(server.wait_for_disconnects(1).await, 1);
}

#[tokio::test]
async fn test_eval_failure_is_transport_error() {
    let server = FakeServer::builder()
        .eval(|_, _| Err("Execute access to function 'eval' is denied".to_string()))
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let err = gateway
        .query(&server.target("guest", ""), "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
    assert_eq!(
        ErrorResponse::from_error(Operation::Query, &err).error,
        "failed_to_query_db"
    );
}

#[tokio::test]
async fn test_unrecognized_reply_is_format_error() {
    let server = FakeServer::builder()
        .eval(|_, _| Ok(Value::from("not a result")))
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let err = gateway
        .query(&server.target("guest", ""), "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Format(_)));
}

#[tokio::test]
async fn test_concurrent_queries_use_separate_connections() {
    let server = FakeServer::builder()
        .eval(|_, args| {
            Ok(envelope(vec![
                ("metadata", Value::Array(vec![column("q", "string")])),
                ("rows", Value::Array(vec![Value::Array(args.to_vec())])),
            ]))
        })
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());
    let target = server.target("guest", "");

    let (first, second) = tokio::join!(
        gateway.query(&target, "SELECT 1"),
        gateway.query(&target, "SELECT 2")
    );

    assert_eq!(first.unwrap().data[0]["q"], json!("SELECT 1"));
    assert_eq!(second.unwrap().data[0]["q"], json!("SELECT 2"));
    assert_eq!(server.accepted(), 2);
    assert_eq!(server.wait_for_disconnects(2).await, 2);
}

#[tokio::test]
async fn test_live_query_null_cell_and_engine_error() {
    let Some(target) = live_target() else {
        eprintln!("Skipping test: TARANTOOL_URL not set");
        return;
    };
    let gateway = Gateway::new(ConnectionManager::default());

    let result = gateway
        .query(&target, r#"SELECT NULL AS "n", 1 AS "one", 'x' AS "s""#)
        .await
        .unwrap();
    assert_eq!(result.column_names(), vec!["n", "one", "s"]);
    assert_eq!(
        serde_json::to_value(&result.data).unwrap(),
        json!([{"n": "null", "one": 1, "s": "x"}])
    );

    let err = gateway
        .query(&target, r#"SELECT * FROM "spacegate_no_such_space""#)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Engine(_)));
    assert!(err
        .detail()
        .is_some_and(|detail| detail.contains("spacegate_no_such_space")));
}
