use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skyport_core::{BookingError, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{message}")]
    ValidationError { message: String, field: Option<String> },
    #[error("{0}")]
    NotFoundError(String),
    #[error("{message}")]
    ConflictError { message: String, field: Option<String> },
    #[error("{0}")]
    InternalServerError(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, field) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::ValidationError { message, field } => (StatusCode::BAD_REQUEST, message, field),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::ConflictError { message, field } => (StatusCode::CONFLICT, message, field),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
            }
        };

        let body = Json(json!({
            "error": error_message,
            "field": field,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let field = err.field_path();
        match err {
            BookingError::Repository(inner) => inner.into(),
            BookingError::SeatTaken { .. } => AppError::ConflictError {
                message: err.to_string(),
                field,
            },
            _ => AppError::ValidationError {
                message: err.to_string(),
                field,
            },
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SeatConflict { .. } => AppError::ConflictError {
                message: err.to_string(),
                field: None,
            },
            RepositoryError::Backend(_) => AppError::Anyhow(anyhow::Error::new(err)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError {
            message: rejection.body_text(),
            field: None,
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError {
            message: rejection.body_text(),
            field: None,
        }
    }
}
