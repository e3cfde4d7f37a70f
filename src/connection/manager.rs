//! Connection manager for bounded, per-operation connections.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::Connector;
use crate::config::{ConnectionTarget, GatewaySettings};
use crate::db::{EngineClient, TarantoolClient};
use crate::error::{GatewayError, Result};

/// Delay before re-dialing after a refused connection.
const RECONNECT_DELAY_MS: u64 = 100;

/// Limits applied when opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bound on dial, greeting and authentication together.
    pub connect_timeout: Duration,
    /// Extra dial attempts after a transient failure, inside the same bound.
    pub max_reconnects: u32,
    /// Optional bound on each request round trip once connected.
    pub request_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            max_reconnects: 1,
            request_timeout: None,
        }
    }
}

impl From<&GatewaySettings> for ConnectOptions {
    fn from(settings: &GatewaySettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
            max_reconnects: settings.max_reconnects,
            request_timeout: settings.request_timeout(),
        }
    }
}

/// Opens and validates connections to remote targets.
///
/// Holds no connection state: every call dials its own socket.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    options: ConnectOptions,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Opens an authenticated connection within the connect timeout.
    pub async fn open(&self, target: &ConnectionTarget) -> Result<TarantoolClient> {
        let timeout = self.options.connect_timeout;
        let client = tokio::time::timeout(timeout, self.establish(target))
            .await
            .map_err(|_| {
                GatewayError::connection(format!(
                    "Connection to {} timed out after {timeout:?}. The server may be overloaded or unreachable.",
                    target.address()
                ))
            })??;

        Ok(client.with_request_timeout(self.options.request_timeout))
    }

    async fn establish(&self, target: &ConnectionTarget) -> Result<TarantoolClient> {
        let stream = self.dial(target).await?;
        TarantoolClient::handshake(stream, target).await
    }

    async fn dial(&self, target: &ConnectionTarget) -> Result<TcpStream> {
        let attempts = self.options.max_reconnects + 1;
        let address = target.address();

        for attempt in 1..=attempts {
            debug!("Connection attempt {} of {}", attempt, attempts);

            match TcpStream::connect(&address).await {
                Ok(stream) => {
                    stream
                        .set_nodelay(true)
                        .map_err(|e| map_connection_error(e, target))?;
                    return Ok(stream);
                }
                Err(e) if attempt < attempts && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} to {} failed (transient error), retrying",
                        attempt, address
                    );
                    tokio::time::sleep(Duration::from_millis(RECONNECT_DELAY_MS)).await;
                }
                Err(e) => return Err(map_connection_error(e, target)),
            }
        }

        Err(GatewayError::connection(format!("Cannot connect to {address}")))
    }
}

#[async_trait]
impl Connector for ConnectionManager {
    async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn EngineClient>> {
        let client = self.open(target).await?;
        Ok(Box::new(client))
    }
}

/// Determines if a dial error is worth one more attempt.
fn is_transient_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

/// Maps dial errors to user-friendly messages.
fn map_connection_error(error: io::Error, target: &ConnectionTarget) -> GatewayError {
    let address = target.address();
    match error.kind() {
        io::ErrorKind::ConnectionRefused => GatewayError::connection(format!(
            "Cannot connect to {address}. Check that the server is running."
        )),
        io::ErrorKind::TimedOut => GatewayError::connection(format!(
            "Connection to {address} timed out. The server may be overloaded or unreachable."
        )),
        _ => GatewayError::connection(format!("Cannot connect to {address}: {error}")),
    }
}
