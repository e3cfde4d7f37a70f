//! The gateway facade: one bounded connection per operation.
//!
//! Each call opens its own session through a [`Connector`], runs one or two
//! round trips, and closes the session on every exit path.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{error, info, warn};

use crate::config::{ConnectionTarget, GatewaySettings};
use crate::connection::{ConnectOptions, ConnectionManager, Connector};
use crate::db::EngineClient;
use crate::error::{GatewayError, Result};
use crate::query::{normalize, QueryExecutor, QueryResult};
use crate::response::Operation;
use crate::schema::introspector::DEFAULT_CATALOG_LIMIT;
use crate::schema::{SchemaIntrospector, SpaceDescriptor};

/// Entry point for the three outward operations.
#[derive(Debug, Clone)]
pub struct Gateway<C: Connector = ConnectionManager> {
    connector: C,
    catalog_limit: u32,
    test_timeout: Duration,
}

impl Gateway<ConnectionManager> {
    /// Builds a gateway that dials real targets with the given limits.
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self::new(ConnectionManager::new(ConnectOptions::from(settings)))
            .with_catalog_limit(settings.catalog_limit)
            .with_test_timeout(settings.connect_timeout())
    }
}

impl<C: Connector> Gateway<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            catalog_limit: DEFAULT_CATALOG_LIMIT,
            test_timeout: ConnectOptions::default().connect_timeout,
        }
    }

    /// Bounds the whole connection test: connect, PING and close.
    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_catalog_limit(mut self, limit: u32) -> Self {
        self.catalog_limit = limit;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Opens a session, runs `op` on it, and closes it.
    ///
    /// The session is closed whether `op` succeeds or fails. A failed close is
    /// logged and does not replace `op`'s outcome. If `op` panics, the session
    /// is dropped during unwinding, which releases the socket.
    pub async fn with_session<T, F>(&self, target: &ConnectionTarget, op: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut dyn EngineClient) -> BoxFuture<'c, Result<T>>,
    {
        let mut session = self.connector.connect(target).await?;
        let outcome = op(session.as_mut()).await;

        if let Err(e) = session.close().await {
            warn!(target = %target.display_string(), "Failed to close session: {e}");
        }

        outcome
    }

    /// Verifies that the target is reachable and accepts the credentials.
    ///
    /// Connect, PING and close together run inside the test timeout. Every
    /// failure is reported as a connection error.
    pub async fn test_connection(&self, target: &ConnectionTarget) -> Result<()> {
        let limit = self.test_timeout;
        let session = self.with_session(target, |client| {
            Box::pin(async move { client.ping().await })
        });

        let outcome = match tokio::time::timeout(limit, session).await {
            Ok(result) => result.map_err(into_connection_error),
            Err(_) => Err(GatewayError::connection(format!(
                "Connection test for {} timed out after {limit:?}",
                target.address()
            ))),
        };
        log_outcome(Operation::Create, target, &outcome);
        outcome
    }

    /// Lists the user spaces of the target in catalog order.
    pub async fn get_schema(&self, target: &ConnectionTarget) -> Result<Vec<SpaceDescriptor>> {
        let limit = self.catalog_limit;
        let outcome = self
            .with_session(target, move |client| {
                Box::pin(async move {
                    SchemaIntrospector::new(client)
                        .with_limit(limit)
                        .get_schema()
                        .await
                })
            })
            .await;
        log_outcome(Operation::Detail, target, &outcome);
        outcome
    }

    /// Runs one statement and normalizes its result.
    pub async fn query(&self, target: &ConnectionTarget, sql: &str) -> Result<QueryResult> {
        let sql = sql.to_string();
        let outcome = self
            .with_session(target, move |client| {
                Box::pin(async move {
                    let envelope = QueryExecutor::new(client).execute(&sql).await?;
                    normalize(envelope.raw())
                })
            })
            .await;
        log_outcome(Operation::Query, target, &outcome);
        outcome
    }
}

fn into_connection_error(error: GatewayError) -> GatewayError {
    match error {
        GatewayError::Connection(_) => error,
        other => GatewayError::connection(other.to_string()),
    }
}

fn log_outcome<T>(op: Operation, target: &ConnectionTarget, outcome: &Result<T>) {
    match outcome {
        Ok(_) => info!(
            message_id = op.success_message_id(),
            target = %target.display_string(),
            "Operation succeeded"
        ),
        Err(e) => error!(
            message_id = op.failure_message_id(),
            error = op.error_key(e),
            target = %target.display_string(),
            "{}: {e}",
            e.category()
        ),
    }
}
