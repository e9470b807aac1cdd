//! Error taxonomy and wire envelopes for the line-delimited JSON-RPC tool
//! boundary. One request object per input line, one response object per
//! output line.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Shared tool-call result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("could not parse request: {0}")]
    Parse(String),
    #[error("unknown method '{0}'")]
    UnknownMethod(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("internal error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Parse(_) => "PARSE_ERROR",
            ApiError::UnknownMethod(_) => "UNKNOWN_METHOD",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Build the wire payload. Internal details are logged, never sent.
    pub fn to_body(&self, at: DateTime<Utc>) -> ErrorBody {
        if let ApiError::Internal(inner) = self {
            tracing::error!(error = %inner, "tool call failed");
        }
        ErrorBody {
            kind: self.code().to_string(),
            message: self.to_string(),
            timestamp: at,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

/// Request correlation id: numeric or string, echoed back verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    Text(String),
    #[default]
    Null,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: RpcId,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RpcResponse {
    pub id: RpcId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl RpcResponse {
    pub fn success(id: RpcId, method: impl Into<String>, result: Value) -> Self {
        Self {
            id,
            method: method.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(
        id: RpcId,
        method: impl Into<String>,
        err: &ApiError,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            result: None,
            error: Some(err.to_body(at)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
