//! Outward success and error envelopes.
//!
//! Every operation has one outward code. The failure class travels in the
//! `error` key; `detail` is only ever set for engine statement errors.

use serde::Serialize;

use crate::error::GatewayError;

/// The three outward operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Validate credentials before a target is registered.
    Create,
    /// List the user spaces of a target.
    Detail,
    /// Run one statement against a target.
    Query,
}

impl Operation {
    pub fn success_message_id(self) -> &'static str {
        match self {
            Self::Create => "add_db_success",
            Self::Detail => "db_detail_show_success",
            Self::Query => "query_db_success",
        }
    }

    pub fn failure_message_id(self) -> &'static str {
        match self {
            Self::Create => "add_db_failed",
            Self::Detail => "db_detail_show_failed",
            Self::Query => "query_db_failed",
        }
    }

    pub fn success_code(self) -> i32 {
        match self {
            Self::Create | Self::Detail => 2000,
            Self::Query => 2005,
        }
    }

    pub fn failure_code(self) -> i32 {
        match self {
            Self::Create => -2001,
            Self::Detail => -2000,
            Self::Query => -2005,
        }
    }

    /// The `error` key reported for a failure of this operation.
    pub fn error_key(self, error: &GatewayError) -> &'static str {
        match (self, error) {
            (Self::Create, _) => "invalid_connection_settings",
            (_, GatewayError::Connection(_) | GatewayError::Config(_)) => {
                "failed_connect_to_target_db"
            }
            (_, GatewayError::Format(_)) => "unexpected_data_format",
            (Self::Query, GatewayError::Engine(_)) => "query_execution_failed",
            (Self::Query, GatewayError::Transport(_)) => "failed_to_query_db",
            (Self::Detail, GatewayError::Transport(_) | GatewayError::Engine(_)) => {
                "failed_to_get_db_detail"
            }
        }
    }
}

/// `{message_id, code, data}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message_id: &'static str,
    pub code: i32,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(op: Operation, data: T) -> Self {
        Self {
            message_id: op.success_message_id(),
            code: op.success_code(),
            data,
        }
    }
}

/// `{message_id, code, error, detail?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub message_id: &'static str,
    pub code: i32,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn from_error(op: Operation, error: &GatewayError) -> Self {
        Self {
            message_id: op.failure_message_id(),
            code: op.failure_code(),
            error: op.error_key(error),
            detail: error.detail().map(String::from),
        }
    }
}
