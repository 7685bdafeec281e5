use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Fallback text shown when the server gives no usable `message`.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Error body returned by the marketplace API on non-2xx responses.
///
/// Only `message` is relied upon; other fields are kept when present so they can
/// be logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Request failed with status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Http {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(
        #[from]
        reqwest::Error,
    ),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        // Prefer the first human-readable message, fields in name order.
        let mut fields: Vec<_> = err.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        let message = fields
            .iter()
            .flat_map(|(field, errors)| errors.iter().map(move |e| (*field, e)))
            .map(|(field, e)| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid"),
            })
            .next()
            .unwrap_or_else(|| err.to_string());
        ServiceError::ValidationError(message)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Storage(err.to_string())
    }
}

impl From<futures::future::Aborted> for ServiceError {
    fn from(_: futures::future::Aborted) -> Self {
        ServiceError::Cancelled
    }
}

impl ServiceError {
    /// Builds the error for a non-2xx response, mapping the common statuses onto
    /// the dedicated variants.
    pub fn from_response(status: StatusCode, body: Option<ErrorResponse>) -> Self {
        let message = body
            .and_then(|b| b.message.or(b.error))
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        match status {
            StatusCode::UNAUTHORIZED => ServiceError::Unauthorized(
                message.unwrap_or_else(|| "Not authorized, token failed".to_string()),
            ),
            StatusCode::FORBIDDEN => ServiceError::Forbidden(
                message.unwrap_or_else(|| "Not authorized for this action".to_string()),
            ),
            StatusCode::NOT_FOUND => ServiceError::NotFound(
                message.unwrap_or_else(|| "Resource not found".to_string()),
            ),
            _ => ServiceError::Http { status, message },
        }
    }

    /// Whether the error was caught locally before any request went out.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_) | Self::InvalidOperation(_) | Self::Config(_)
        )
    }

    /// HTTP status associated with the error, when one was received.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            Self::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::Network(err) => err.status().and_then(|s| StatusCode::from_u16(s.as_u16()).ok()),
            _ => None,
        }
    }

    /// Text for the error toast.
    /// Server-provided messages are shown as-is; transport and internal
    /// failures collapse to the generic fallback.
    pub fn toast_message(&self) -> String {
        match self {
            Self::ValidationError(msg)
            | Self::InvalidOperation(msg)
            | Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg) => msg.clone(),
            Self::Http {
                message: Some(msg), ..
            } => msg.clone(),
            Self::Http { message: None, .. }
            | Self::Network(_)
            | Self::SerializationError(_)
            | Self::Storage(_)
            | Self::Config(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            Self::Cancelled => "Request cancelled".to_string(),
        }
    }

    /// Metric label for the failure counter.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation_error",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Http { .. } => "http_error",
            Self::Network(_) => "network_error",
            Self::Cancelled => "cancelled",
            Self::SerializationError(_) => "serialization_error",
            Self::Storage(_) => "storage_error",
            Self::Config(_) => "config_error",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
