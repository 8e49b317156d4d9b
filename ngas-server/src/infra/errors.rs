use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use ngas_core::NgasError;

use crate::xml::status_document;

pub type AppResult<T> = Result<T, AppError>;

/// HTTP-edge error wrapper: a status code plus the message that goes into
/// the XML status document's `Message` attribute (§6: "4xx/5xx + XML on
/// error").
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = status_document(&StatusOutcome::Failure {
            status: self.status,
            message: &self.message,
        });
        (self.status, [("content-type", "text/xml")], body).into_response()
    }
}

/// The §7 taxonomy mapped onto HTTP status: 4xx for `INVALID_REQUEST` /
/// `UNKNOWN_MIME`, 5xx for everything else (§J Ambient Stack).
impl From<NgasError> for AppError {
    fn from(err: NgasError) -> Self {
        match &err {
            NgasError::InvalidRequest(_) | NgasError::UnknownMime(_) => {
                Self::bad_request(err.to_string())
            }
            NgasError::NoVolumes => Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            NgasError::SourceIo(_) => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
            NgasError::StagingIo(_)
            | NgasError::ShortRead { .. }
            | NgasError::ChecksumMismatch { .. }
            | NgasError::DapiFailure { .. }
            | NgasError::CatalogFailure(_)
            | NgasError::ExternalProcess(_) => {
                tracing::error!(error = %err, "archive request failed");
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = ?err, "database operation failed");
        Self::internal("database operation failed")
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

/// What `xml::status_document` renders — success carries the file identity
/// the Coordinator returned, failure carries the HTTP status and message.
pub enum StatusOutcome<'a> {
    Success {
        file_id: &'a str,
        file_version: i32,
        disk_id: &'a str,
        checksum: u32,
        rate_bytes_per_sec: f64,
    },
    Failure {
        status: StatusCode,
        message: &'a str,
    },
}
