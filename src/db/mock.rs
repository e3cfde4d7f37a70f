//! Mock engine client for testing.
//!
//! Provides an in-memory engine that serves a fixed catalog and a fixed eval
//! reply, and counts how connections are opened, closed and dropped.

use super::EngineClient;
use crate::config::ConnectionTarget;
use crate::connection::Connector;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use rmpv::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Counters shared by a mock client and all of its clones.
#[derive(Debug, Default)]
pub struct MockState {
    opened: AtomicUsize,
    closed: AtomicUsize,
    dropped: AtomicUsize,
    evals: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockState {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Every `(expr, args)` pair passed to `eval`, in call order.
    pub fn evals(&self) -> Vec<(String, Vec<Value>)> {
        self.evals.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

/// A mock engine client that returns predefined results.
#[derive(Debug, Clone)]
pub struct MockEngineClient {
    catalog: Vec<Value>,
    eval_reply: std::result::Result<Value, String>,
    ping_failure: Option<String>,
    stall_ping: bool,
    state: Arc<MockState>,
}

impl MockEngineClient {
    /// Creates a mock with an empty catalog whose eval returns an empty list.
    pub fn new() -> Self {
        Self {
            catalog: Vec::new(),
            eval_reply: Ok(Value::Array(Vec::new())),
            ping_failure: None,
            stall_ping: false,
            state: Arc::new(MockState::default()),
        }
    }

    /// Serves these raw tuples from `select`.
    pub fn with_catalog(mut self, tuples: Vec<Value>) -> Self {
        self.catalog = tuples;
        self
    }

    /// Returns this value from `eval`.
    pub fn with_eval_reply(mut self, reply: Value) -> Self {
        self.eval_reply = Ok(reply);
        self
    }

    /// Fails `eval` with a transport error.
    pub fn with_eval_failure(mut self, message: impl Into<String>) -> Self {
        self.eval_reply = Err(message.into());
        self
    }

    /// Fails `ping` with a transport error.
    pub fn with_ping_failure(mut self, message: impl Into<String>) -> Self {
        self.ping_failure = Some(message.into());
        self
    }

    /// Makes `ping` wait forever.
    pub fn with_stalled_ping(mut self) -> Self {
        self.stall_ping = true;
        self
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

impl Default for MockEngineClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MockEngineClient {
    fn drop(&mut self) {
        self.state.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EngineClient for MockEngineClient {
    async fn ping(&mut self) -> Result<()> {
        if self.stall_ping {
            std::future::pending::<()>().await;
        }
        match &self.ping_failure {
            Some(message) => Err(GatewayError::transport(message.clone())),
            None => Ok(()),
        }
    }

    async fn select(&mut self, _space_id: u32, _index_id: u32, limit: u32) -> Result<Vec<Value>> {
        Ok(self.catalog.iter().take(limit as usize).cloned().collect())
    }

    async fn eval(&mut self, expr: &str, args: Vec<Value>) -> Result<Value> {
        if let Ok(mut evals) = self.state.evals.lock() {
            evals.push((expr.to_string(), args));
        }
        self.eval_reply.clone().map_err(GatewayError::transport)
    }

    async fn close(&mut self) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out clones of a template mock client, or refuses every connection.
#[derive(Debug, Clone)]
pub struct MockConnector {
    template: MockEngineClient,
    refuse: Option<String>,
}

impl MockConnector {
    pub fn new(template: MockEngineClient) -> Self {
        Self {
            template,
            refuse: None,
        }
    }

    /// A connector for which every target is unreachable.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            template: MockEngineClient::new(),
            refuse: Some(message.into()),
        }
    }

    pub fn state(&self) -> Arc<MockState> {
        self.template.state()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _target: &ConnectionTarget) -> Result<Box<dyn EngineClient>> {
        if let Some(message) = &self.refuse {
            return Err(GatewayError::connection(message.clone()));
        }
        self.template.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.template.clone()))
    }
}
