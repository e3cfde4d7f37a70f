//! Statement execution and result normalization for spacegate.
//!
//! The executor sends a statement to the target through the evaluation shim;
//! the normalizer turns whatever comes back into a fixed tabular shape.

pub mod executor;
pub mod normalizer;

pub use executor::{Envelope, QueryExecutor, QueryRequest, EVAL_SHIM, NULL_TOKEN};
pub use normalizer::{normalize, to_json, ColumnMeta, QueryResult};
