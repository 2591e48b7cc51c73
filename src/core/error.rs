//! Error type system for the extension bridge
//!
//! This module provides:
//! - The error taxonomy reported across the dispatch boundary
//! - Transport error codes and HTTP status mapping
//! - Error payloads carrying trace IDs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Main error type for the extension bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // Transport argument errors
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Empty identifier: {0}")]
    EmptyIdentifier(String),

    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    // Extension lookup errors
    #[error("Extension not found: {0}")]
    ExtensionNotFound(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Extension load failed: {0}")]
    LoadError(String),

    #[error("Extension is not trusted: {0}")]
    Untrusted(String),

    // Adapter errors
    #[error("Operation not applicable: {0}")]
    NotApplicable(String),

    #[error("{0}")]
    NoPreferenceScreen(String),

    #[error("Source call failed: {0}")]
    SourceCall(String),

    // Infrastructure errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Error code reported to the message-channel caller
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidArguments(_) => "INVALID_ARGS",
            BridgeError::EmptyIdentifier(_) => "EMPTY_URL",
            BridgeError::NotImplemented(_) => "NOT_IMPLEMENTED",
            BridgeError::ExtensionNotFound(_) | BridgeError::SourceUnavailable(_) => "NOT_FOUND",
            BridgeError::LoadError(_) => "LOAD_ERROR",
            BridgeError::Untrusted(_) => "UNTRUSTED",
            BridgeError::NotApplicable(_) => "NOT_APPLICABLE",
            BridgeError::NoPreferenceScreen(_) => "NO_PREFERENCE_SCREEN",
            BridgeError::NetworkError(_) => "NETWORK_ERROR",
            BridgeError::SourceCall(_)
            | BridgeError::ConfigError(_)
            | BridgeError::IoError(_)
            | BridgeError::SerializationError(_)
            | BridgeError::Internal(_) => "ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::InvalidArguments(_)
            | BridgeError::EmptyIdentifier(_)
            | BridgeError::SerializationError(_) => StatusCode::BAD_REQUEST,

            BridgeError::Untrusted(_) => StatusCode::FORBIDDEN,

            BridgeError::ExtensionNotFound(_)
            | BridgeError::SourceUnavailable(_)
            | BridgeError::NotImplemented(_) => StatusCode::NOT_FOUND,

            BridgeError::NotApplicable(_) | BridgeError::NoPreferenceScreen(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            BridgeError::NetworkError(_) | BridgeError::SourceCall(_) => StatusCode::BAD_GATEWAY,

            BridgeError::LoadError(_)
            | BridgeError::ConfigError(_)
            | BridgeError::IoError(_)
            | BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type name for error payloads
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::InvalidArguments(_) => "InvalidArguments",
            BridgeError::EmptyIdentifier(_) => "EmptyIdentifier",
            BridgeError::NotImplemented(_) => "NotImplemented",
            BridgeError::ExtensionNotFound(_) => "ExtensionNotFound",
            BridgeError::SourceUnavailable(_) => "SourceUnavailable",
            BridgeError::LoadError(_) => "LoadError",
            BridgeError::Untrusted(_) => "Untrusted",
            BridgeError::NotApplicable(_) => "NotApplicable",
            BridgeError::NoPreferenceScreen(_) => "NoPreferenceScreen",
            BridgeError::SourceCall(_) => "SourceCall",
            BridgeError::ConfigError(_) => "ConfigError",
            BridgeError::IoError(_) => "IoError",
            BridgeError::NetworkError(_) => "NetworkError",
            BridgeError::SerializationError(_) => "SerializationError",
            BridgeError::Internal(_) => "Internal",
        }
    }

    /// Wrap a failure raised by foreign source code
    pub fn source_call(context: &str, err: anyhow::Error) -> Self {
        BridgeError::SourceCall(format!("{}: {:#}", context, err))
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::SerializationError(err.to_string())
    }
}

/// Error payload returned to the caller of a dispatched method
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Transport error code (e.g. `INVALID_ARGS`)
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Unique trace ID for this error
    pub trace_id: String,
}

impl ErrorResponse {
    /// Create a new error response with a generated trace ID
    pub fn new(error: String, message: String) -> Self {
        Self {
            error,
            message,
            details: None,
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an error response with additional details
    pub fn with_details(error: String, message: String, details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new(error, message)
        }
    }

    /// Create an error response from a BridgeError
    pub fn from_error(error: &BridgeError) -> Self {
        Self::with_details(
            error.code().to_string(),
            error.to_string(),
            serde_json::json!({ "type": error.error_type() }),
        )
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (trace_id: {})", self.error, self.message, self.trace_id)
    }
}

impl BridgeError {
    /// Error response reusing the request's trace ID when one is known
    pub fn into_traced_response(self, trace_id: Option<String>) -> Response {
        let status_code = self.status_code();
        let mut error_response = ErrorResponse::from_error(&self);
        if let Some(trace_id) = trace_id {
            error_response.trace_id = trace_id;
        }

        tracing::error!(
            error_type = self.error_type(),
            code = self.code(),
            trace_id = %error_response.trace_id,
            status_code = %status_code,
            "Channel call failed: {}",
            self
        );

        (status_code, Json(error_response)).into_response()
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        self.into_traced_response(None)
    }
}

/// Result type alias for operations that can fail with BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BridgeError::InvalidArguments("x".into()).code(), "INVALID_ARGS");
        assert_eq!(BridgeError::EmptyIdentifier("url".into()).code(), "EMPTY_URL");
        assert_eq!(BridgeError::NotApplicable("x".into()).code(), "NOT_APPLICABLE");
        assert_eq!(BridgeError::SourceCall("x".into()).code(), "ERROR");
        assert_eq!(BridgeError::ExtensionNotFound("x".into()).code(), "NOT_FOUND");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            BridgeError::InvalidArguments("test".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BridgeError::ExtensionNotFound("test".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BridgeError::NotApplicable("test".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            BridgeError::Internal("test".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_no_preference_message_is_bare() {
        let err = BridgeError::NoPreferenceScreen("This source does not support preferences.".into());
        assert_eq!(err.to_string(), "This source does not support preferences.");
    }

    #[test]
    fn test_source_call_wraps_foreign_error() {
        let err = BridgeError::source_call("getPopular", anyhow::anyhow!("HTTP 503"));
        assert!(matches!(err, BridgeError::SourceCall(_)));
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_error_response_creation() {
        let error = BridgeError::ExtensionNotFound("eu.kanade.test".into());
        let response = ErrorResponse::from_error(&error);

        assert_eq!(response.error, "NOT_FOUND");
        assert!(response.message.contains("eu.kanade.test"));
        assert!(!response.trace_id.is_empty());
        assert_eq!(response.details, Some(serde_json::json!({ "type": "ExtensionNotFound" })));
    }
}
