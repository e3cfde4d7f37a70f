//! Connection integration tests.
//!
//! Tests connectivity, authentication and error handling.

use std::time::{Duration, Instant};

use spacegate::config::ConnectionTarget;
use spacegate::connection::{ConnectOptions, ConnectionManager};
use spacegate::error::GatewayError;
use spacegate::gateway::Gateway;
use spacegate::response::{ErrorResponse, Operation};
use tokio_test::{assert_err, assert_ok};

use super::fake_server::FakeServer;
use super::live_target;

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let server = FakeServer::builder().user("admin", "secret").start().await;
    let gateway = Gateway::new(ConnectionManager::default());

    assert_ok!(gateway.test_connection(&server.target("admin", "secret")).await);
    assert_eq!(server.accepted(), 1);
    assert_eq!(server.wait_for_disconnects(1).await, 1);
}

#[tokio::test]
async fn test_guest_needs_no_auth() {
    let server = FakeServer::builder().start().await;
    let gateway = Gateway::new(ConnectionManager::default());

    assert_ok!(gateway.test_connection(&server.target("guest", "")).await);
}

#[tokio::test]
async fn test_wrong_password_is_connection_error() {
    let server = FakeServer::builder().user("admin", "secret").start().await;
    let gateway = Gateway::new(ConnectionManager::default());

    let err = assert_err!(gateway.test_connection(&server.target("admin", "wrong")).await);
    assert!(matches!(err, GatewayError::Connection(_)));
    assert!(err.to_string().contains("Incorrect password"));

    let response = ErrorResponse::from_error(Operation::Create, &err);
    assert_eq!(response.message_id, "add_db_failed");
    assert_eq!(response.code, -2001);
    assert_eq!(response.error, "invalid_connection_settings");
    assert!(response.detail.is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn test_refused_port_fails_within_bound() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let gateway = Gateway::new(ConnectionManager::default());
    let target = ConnectionTarget::new("127.0.0.1", port, "admin", "secret");

    let start = Instant::now();
    let err = assert_err!(gateway.test_connection(&target).await);
    assert!(matches!(err, GatewayError::Connection(_)));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_silent_server_hits_connect_timeout() {
    let server = FakeServer::builder().silent().start().await;
    let manager = ConnectionManager::new(ConnectOptions {
        connect_timeout: Duration::from_millis(200),
        ..ConnectOptions::default()
    });
    let gateway = Gateway::new(manager);

    let start = Instant::now();
    let err = assert_err!(gateway.test_connection(&server.target("guest", "")).await);
    assert!(matches!(err, GatewayError::Connection(_)));
    assert!(err.to_string().contains("timed out"));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_unanswered_ping_fails_within_bound() {
    let server = FakeServer::builder().mute_ping().start().await;
    let gateway = Gateway::new(ConnectionManager::default());

    let start = Instant::now();
    let err = assert_err!(gateway.test_connection(&server.target("guest", "")).await);
    assert!(matches!(err, GatewayError::Connection(_)));
    assert!(err.to_string().contains("timed out"));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(server.wait_for_disconnects(1).await, 1);
}

#[tokio::test]
async fn test_live_connection() {
    let Some(target) = live_target() else {
        eprintln!("Skipping test: TARANTOOL_URL not set");
        return;
    };

    let gateway = Gateway::new(ConnectionManager::default());
    assert_ok!(gateway.test_connection(&target).await);
}
