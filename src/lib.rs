//! spacegate - schema introspection and ad-hoc SQL for remote Tarantool
//! instances.
//!
//! This library exposes the core modules for use by the binary and the
//! integration tests.

pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod query;
pub mod response;
pub mod schema;
