use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("required fields are missing: {0:?}")]
    MissingFields(Vec<&'static str>),
    #[error("fields exceed their maximum length: {0:?}")]
    FieldsTooLong(Vec<&'static str>),
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("operation number already registered")]
    DuplicateOperation,
    #[error("proof of payment exceeds {limit} bytes")]
    FileTooLarge { limit: usize },
    #[error("proof of payment is missing")]
    MissingProof,
    #[error("proof of payment type is not allowed")]
    UnsupportedFileType,
    #[error("proof image could not be decoded: {0}")]
    InvalidImage(String),
    #[error("malformed form submission: {0}")]
    MalformedForm(String),
    #[error("notification email could not be sent: {0}")]
    Email(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("report generation failed: {0}")]
    Report(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_code: &'static str,
    error: String,
    details: Option<Vec<&'static str>>,
}

impl AppError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedForm(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable code returned to form clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "missing_fields",
            Self::FieldsTooLong(_) => "field_too_long",
            Self::InvalidEmail => "invalid_email",
            Self::DuplicateOperation => "duplicate_operation",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::MissingProof => "missing_proof",
            Self::UnsupportedFileType => "unsupported_file_type",
            Self::InvalidImage(_) => "invalid_image",
            Self::MalformedForm(_) => "malformed_form",
            Self::Email(_) => "email_error",
            Self::Database(_) | Self::Migration(_) => "database_error",
            Self::Report(_) => "report_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields(_)
            | Self::FieldsTooLong(_)
            | Self::InvalidEmail
            | Self::DuplicateOperation
            | Self::FileTooLarge { .. }
            | Self::MissingProof
            | Self::UnsupportedFileType
            | Self::InvalidImage(_)
            | Self::MalformedForm(_) => StatusCode::BAD_REQUEST,
            Self::Email(_)
            | Self::Database(_)
            | Self::Migration(_)
            | Self::Report(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::MissingFields(_) => "required fields are missing".to_string(),
            Self::FieldsTooLong(_) => "some fields are too long".to_string(),
            Self::FileTooLarge { limit } => format!(
                "the file exceeds the maximum allowed size of {} MB",
                limit / (1024 * 1024)
            ),
            Self::InvalidImage(_) => "the uploaded image could not be read".to_string(),
            Self::MalformedForm(_) => "the form submission could not be read".to_string(),
            Self::Email(_) => "the notification email could not be sent".to_string(),
            Self::Database(_) | Self::Migration(_) => "database operation failed".to_string(),
            Self::Report(_) => "the report could not be generated".to_string(),
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<Vec<&'static str>> {
        match self {
            Self::MissingFields(fields) | Self::FieldsTooLong(fields) => Some(fields.clone()),
            Self::InvalidEmail => Some(vec!["correo"]),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
        }

        let body = ErrorBody {
            error_code: self.code(),
            error: self.public_message(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn missing_fields_lists_details() {
        let (status, body) = render(AppError::MissingFields(vec!["nombres", "dni"])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "missing_fields");
        assert_eq!(body["details"], serde_json::json!(["nombres", "dni"]));
    }

    #[tokio::test]
    async fn server_errors_hide_internals() {
        let (status, body) = render(AppError::Email("535 auth rejected".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_code"], "email_error");
        assert!(!body["error"].as_str().unwrap().contains("535"));
        assert_eq!(body["details"], Value::Null);
    }

    #[tokio::test]
    async fn database_cause_is_logged_but_not_returned() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.to_string().contains("pool timed out"));

        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_code"], "database_error");
        assert_eq!(body["error"], "database operation failed");
    }

    #[tokio::test]
    async fn file_too_large_reports_limit_in_megabytes() {
        let (_, body) = render(AppError::FileTooLarge {
            limit: 5 * 1024 * 1024,
        })
        .await;

        assert_eq!(body["error_code"], "file_too_large");
        assert!(body["error"].as_str().unwrap().contains("5 MB"));
    }
}
