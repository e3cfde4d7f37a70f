//! Connection management for spacegate.
//!
//! Opens short-lived, bounded connections to one target per operation.

pub mod manager;

pub use manager::{ConnectOptions, ConnectionManager};

use crate::config::ConnectionTarget;
use crate::db::EngineClient;
use crate::error::Result;
use async_trait::async_trait;

/// Opens engine clients for a target.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a fresh, authenticated client. The caller owns it and must close it.
    async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn EngineClient>>;
}
