//! Remote engine access for spacegate.
//!
//! Provides a trait-based interface over the engine's request primitives so
//! the schema and query layers can run against a live node or an in-memory
//! mock.

pub mod auth;
pub mod iproto;
mod mock;
mod tarantool;

pub use mock::{MockConnector, MockEngineClient, MockState};
pub use tarantool::TarantoolClient;

use crate::error::Result;
use async_trait::async_trait;
use rmpv::Value;

/// Request primitives of one open connection.
///
/// A client is owned by exactly one operation and closed when it ends.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Round trip with no payload.
    async fn ping(&mut self) -> Result<()>;

    /// Selects up to `limit` tuples from a space by iterating an index fully.
    /// Returns the raw tuples in server order.
    async fn select(&mut self, space_id: u32, index_id: u32, limit: u32) -> Result<Vec<Value>>;

    /// Evaluates a Lua expression with positional arguments and returns the
    /// list of values it returned.
    async fn eval(&mut self, expr: &str, args: Vec<Value>) -> Result<Value>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<()>;
}
