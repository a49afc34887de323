use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("mail error: {0}")]
    Mail(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// True for failures of a collaborator (store, mail relay, IO) rather
    /// than of the caller's input.
    pub fn is_internal(&self) -> bool {
        !matches!(self, AppError::BadRequest(_) | AppError::NotFound(_))
    }

    /// Replaces the message of an internal failure with `message`, leaving
    /// client-facing errors untouched. The original error is logged first.
    pub fn conceal(self, route: &str, id: &str, message: &'static str) -> Self {
        if !self.is_internal() {
            return self;
        }
        tracing::error!(route, id, error = %self, "request failed");
        AppError::Other(anyhow::anyhow!(message))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("invalid request: {}", rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Mail(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let message = match self {
            AppError::Other(err) => err.to_string(),
            AppError::BadRequest(msg) | AppError::NotFound(msg) => msg,
            _ => "internal server error".to_string(),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}
