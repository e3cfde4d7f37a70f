//! Schema introspection integration tests.

use pretty_assertions::assert_eq;
use rmpv::Value;
use serde_json::json;
use spacegate::connection::ConnectionManager;
use spacegate::error::GatewayError;
use spacegate::gateway::Gateway;
use spacegate::response::{ApiResponse, ErrorResponse, Operation};
use spacegate::schema::SpaceSummary;

use super::fake_server::{space_tuple, FakeServer};
use super::live_target;

fn catalog() -> Vec<Value> {
    vec![
        space_tuple(272, "_schema", &[("key", "string")]),
        space_tuple(280, "_space", &[("id", "unsigned")]),
        space_tuple(281, "_vspace", &[("id", "unsigned")]),
        space_tuple(512, "users", &[("id", "unsigned"), ("email", "string")]),
        space_tuple(513, "orders", &[("id", "unsigned"), ("user_id", "unsigned")]),
    ]
}

#[tokio::test]
async fn test_schema_lists_user_spaces_in_order() {
    let server = FakeServer::builder()
        .user("admin", "secret")
        .catalog(catalog())
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let spaces = gateway
        .get_schema(&server.target("admin", "secret"))
        .await
        .unwrap();
    let names: Vec<&str> = spaces.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["users", "orders"]);
    assert!(!names.contains(&"_vspace"));
    assert_eq!(server.wait_for_disconnects(1).await, 1);
}

#[tokio::test]
async fn test_schema_envelope_shape() {
    let server = FakeServer::builder()
        .catalog(vec![space_tuple(512, "users", &[("id", "unsigned")])])
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let spaces = gateway.get_schema(&server.target("guest", "")).await.unwrap();
    let summaries: Vec<SpaceSummary> = spaces.iter().map(SpaceSummary::from).collect();
    let response = ApiResponse::success(Operation::Detail, summaries);

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "message_id": "db_detail_show_success",
            "code": 2000,
            "data": [
                {"name": "users", "format": [{"name": "id", "type": "unsigned", "is_nullable": false}]}
            ]
        })
    );
}

#[tokio::test]
async fn test_incomplete_catalog_entry_is_skipped() {
    let short = Value::Array(vec![Value::from(600u32), Value::from(1u32), Value::from("half")]);
    let server = FakeServer::builder()
        .catalog(vec![short, space_tuple(512, "users", &[])])
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let spaces = gateway.get_schema(&server.target("guest", "")).await.unwrap();
    assert_eq!(spaces.len(), 1);
    assert_eq!(spaces[0].name, "users");
}

#[tokio::test]
async fn test_undecodable_catalog_entry_is_skipped() {
    let legacy = Value::Array(vec![
        Value::from(600u32),
        Value::from(1u32),
        Value::from("legacy"),
        Value::from("memtx"),
        Value::from(0u32),
        Value::Map(Vec::new()),
        Value::Array(vec![Value::Map(vec![(
            Value::from("type"),
            Value::from("unsigned"),
        )])]),
    ]);
    let server = FakeServer::builder()
        .catalog(vec![
            space_tuple(512, "users", &[("id", "unsigned")]),
            legacy,
            space_tuple(513, "orders", &[("id", "unsigned")]),
        ])
        .start()
        .await;
    let gateway = Gateway::new(ConnectionManager::default());

    let spaces = gateway.get_schema(&server.target("guest", "")).await.unwrap();
    let names: Vec<&str> = spaces.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["users", "orders"]);
    assert_eq!(server.wait_for_disconnects(1).await, 1);
}

#[tokio::test]
async fn test_missing_catalog_space_is_transport_error() {
    let server = FakeServer::builder().catalog_space(999).start().await;
    let gateway = Gateway::new(ConnectionManager::default());

    let err = gateway
        .get_schema(&server.target("guest", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));

    let response = ErrorResponse::from_error(Operation::Detail, &err);
    assert_eq!(response.error, "failed_to_get_db_detail");
    assert_eq!(server.wait_for_disconnects(1).await, 1);
}

#[tokio::test]
async fn test_catalog_limit_truncates() {
    let catalog = (0..10)
        .map(|i| space_tuple(512 + i, &format!("space_{i}"), &[]))
        .collect();
    let server = FakeServer::builder().catalog(catalog).start().await;
    let gateway = Gateway::new(ConnectionManager::default()).with_catalog_limit(4);

    let spaces = gateway.get_schema(&server.target("guest", "")).await.unwrap();
    assert_eq!(spaces.len(), 4);
    assert_eq!(spaces[3].name, "space_3");
}

#[tokio::test]
async fn test_live_schema_has_no_system_spaces() {
    let Some(target) = live_target() else {
        eprintln!("Skipping test: TARANTOOL_URL not set");
        return;
    };
    let gateway = Gateway::new(ConnectionManager::default());

    let spaces = gateway.get_schema(&target).await.unwrap();
    assert!(spaces.iter().all(|space| !space.name.starts_with('_')));
    assert!(spaces.iter().all(|space| space.name != "_vspace"));
}
