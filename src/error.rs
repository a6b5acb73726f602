use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request-facing error type shared by the persistence, retrieval and validation handlers
///
/// Each variant maps to a fixed HTTP status; the `Display` text of the variants that
/// reach a client is the fixed public message, never the underlying I/O detail.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("No XML data provided")]
    BadRequest,

    #[error("Invalid XML")]
    InvalidInput { details: String },

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("File not found")]
    NotFound { path: PathBuf },

    #[error("{}", .operation.public_message())]
    Storage {
        operation: StorageOperation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Validation failed: {0}")]
    Validator(#[from] LibXml2Error),
}

/// Which filesystem step of a storage operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    Read,
    Backup,
    Write,
}

impl StorageOperation {
    pub fn public_message(&self) -> &'static str {
        match self {
            StorageOperation::Read => "Failed to read file",
            StorageOperation::Backup => "Failed to create backup",
            StorageOperation::Write => "Failed to save file",
        }
    }
}

impl ServiceError {
    pub fn storage(
        operation: StorageOperation,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        ServiceError::Storage {
            operation,
            path: path.into(),
            source,
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServiceError::BadRequest | ServiceError::InvalidInput { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Storage { .. } | ServiceError::Validator(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message a client sees; internal detail stays in the logs
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Validator(_) => "Failed to validate document".to_string(),
            other => other.to_string(),
        }
    }

    /// Log the full error chain once, at a level matching its status
    pub fn log(&self) {
        match self {
            ServiceError::Storage {
                operation,
                path,
                source,
            } => tracing::error!(
                ?operation,
                path = %path.display(),
                error = %source,
                "Storage operation failed"
            ),
            ServiceError::Validator(e) => tracing::error!(error = %e, "Validator failure"),
            ServiceError::InvalidInput { details } => {
                tracing::debug!(%details, "Rejected malformed document")
            }
            other => tracing::debug!(kind = other.kind(), "Request rejected"),
        }
    }

    /// Short machine-friendly kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::MethodNotAllowed => "method_not_allowed",
            ServiceError::BadRequest => "bad_request",
            ServiceError::InvalidInput { .. } => "invalid_input",
            ServiceError::PayloadTooLarge => "payload_too_large",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::Storage { .. } => "storage_error",
            ServiceError::Validator(_) => "validator_error",
        }
    }
}

/// JSON error body: `{"error": "<message>"}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        self.log();
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Malformed XML document: {details}")]
    MalformedDocument { details: String },

    #[error("DTD parsing failed: {path}")]
    DtdParseFailed { path: PathBuf },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Input of {size} bytes exceeds what libxml2 can parse")]
    InputTooLarge { size: usize },

    #[error("Path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },
}

/// Service result type alias
pub type Result<T> = std::result::Result<T, ServiceError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
