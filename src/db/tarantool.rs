//! Tarantool client implementation.
//!
//! Provides the `TarantoolClient` struct that implements the `EngineClient`
//! trait over a single IPROTO connection. Requests are strictly sequential:
//! one request is written, then its response is read before the next one.

use super::auth::{scramble, CHAP_SHA1};
use super::iproto::{
    decode_length, encode_request, Greeting, RequestType, Response, GREETING_SIZE,
    ITERATOR_ALL, KEY_EXPR, KEY_INDEX_ID, KEY_ITERATOR, KEY_KEY, KEY_LIMIT, KEY_OFFSET,
    KEY_SPACE_ID, KEY_TUPLE, KEY_USER_NAME, LENGTH_PREFIX_SIZE,
};
use super::EngineClient;
use crate::config::ConnectionTarget;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use rmpv::Value;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Out-of-band `box.session.push` message; not a reply to any request.
const CHUNK_TYPE: u64 = 0x80;

/// One authenticated IPROTO connection.
///
/// Dropping the client drops the stream, which releases the socket.
#[derive(Debug)]
pub struct TarantoolClient<S = TcpStream> {
    stream: S,
    sync: u64,
    greeting: Greeting,
    request_timeout: Option<Duration>,
}

impl<S> TarantoolClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    /// Reads the greeting from an already connected stream and authenticates.
    pub async fn handshake(mut stream: S, target: &ConnectionTarget) -> Result<Self> {
        let mut raw = [0u8; GREETING_SIZE];
        stream
            .read_exact(&mut raw)
            .await
            .map_err(|e| GatewayError::connection(format!("Failed to read greeting: {e}")))?;
        let greeting = Greeting::parse(&raw)?;
        debug!(server = %greeting.version, "Received greeting");

        let mut client = Self {
            stream,
            sync: 0,
            greeting,
            request_timeout: None,
        };

        if !target.is_guest() {
            client.authenticate(target).await?;
        }

        Ok(client)
    }

    /// Bounds every subsequent round trip.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Server version line from the greeting.
    pub fn server_version(&self) -> &str {
        &self.greeting.version
    }

    async fn authenticate(&mut self, target: &ConnectionTarget) -> Result<()> {
        let scrambled = scramble(&self.greeting.salt, &target.password)?;
        let body = vec![
            (KEY_USER_NAME, Value::from(target.username.as_str())),
            (
                KEY_TUPLE,
                Value::Array(vec![Value::from(CHAP_SHA1), Value::from(scrambled.to_vec())]),
            ),
        ];

        let response = self.round_trip(RequestType::Auth, body).await.map_err(|e| {
            GatewayError::connection(format!("Authentication exchange failed: {e}"))
        })?;

        if let Some(message) = response.error_message() {
            return Err(GatewayError::connection(format!(
                "Authentication failed for user '{}': {message}",
                target.username
            )));
        }

        debug!(user = %target.username, "Authenticated");
        Ok(())
    }

    /// Sends one request and returns the `DATA` of its reply.
    async fn call(&mut self, request_type: RequestType, body: Vec<(u8, Value)>) -> Result<Value> {
        let request_timeout = self.request_timeout;
        let response = match request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.round_trip(request_type, body))
                .await
                .map_err(|_| {
                    GatewayError::transport(format!(
                        "{request_type:?} request timed out after {limit:?}"
                    ))
                })??,
            None => self.round_trip(request_type, body).await?,
        };
        response.into_data()
    }

    async fn round_trip(
        &mut self,
        request_type: RequestType,
        body: Vec<(u8, Value)>,
    ) -> Result<Response> {
        self.sync += 1;
        let sync = self.sync;

        let packet = encode_request(request_type, sync, body)?;
        self.stream
            .write_all(&packet)
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to send request: {e}")))?;
        self.stream
            .flush()
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to send request: {e}")))?;

        loop {
            let response = self.read_response().await?;
            if response.code == CHUNK_TYPE {
                continue;
            }
            if response.sync != sync {
                return Err(GatewayError::transport(format!(
                    "Out of order response: expected sync {sync}, got {}",
                    response.sync
                )));
            }
            return Ok(response);
        }
    }

    async fn read_response(&mut self) -> Result<Response> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        self.stream
            .read_exact(&mut prefix)
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to read response: {e}")))?;
        let len = decode_length(&prefix)?;

        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to read response: {e}")))?;

        Response::decode(&payload)
    }
}

#[async_trait]
impl<S> EngineClient for TarantoolClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    async fn ping(&mut self) -> Result<()> {
        self.call(RequestType::Ping, Vec::new()).await.map(|_| ())
    }

    async fn select(&mut self, space_id: u32, index_id: u32, limit: u32) -> Result<Vec<Value>> {
        let body = vec![
            (KEY_SPACE_ID, Value::from(space_id)),
            (KEY_INDEX_ID, Value::from(index_id)),
            (KEY_LIMIT, Value::from(limit)),
            (KEY_OFFSET, Value::from(0u32)),
            (KEY_ITERATOR, Value::from(ITERATOR_ALL)),
            (KEY_KEY, Value::Array(Vec::new())),
        ];

        match self.call(RequestType::Select, body).await? {
            Value::Array(tuples) => Ok(tuples),
            other => Err(GatewayError::format(format!(
                "select returned {other} instead of a tuple list"
            ))),
        }
    }

    async fn eval(&mut self, expr: &str, args: Vec<Value>) -> Result<Value> {
        let body = vec![
            (KEY_EXPR, Value::from(expr)),
            (KEY_TUPLE, Value::Array(args)),
        ];
        self.call(RequestType::Eval, body).await
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to close connection: {e}")))
    }
}
