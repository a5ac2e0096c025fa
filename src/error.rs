//! Error types for the cinema backend
//!
//! Every failure the API can produce is a variant of [`Error`]. The HTTP
//! status for each variant comes from one flat table in [`Error::status`].

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::ApiResponse;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("User '{0}' already exists")]
    UserAlreadyExists(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid or expired recovery code")]
    InvalidRecoveryCode,

    #[error("Invalid username or password")]
    BadCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied")]
    Forbidden,

    #[error("Config file not found. Run 'cinema init' first.")]
    ConfigNotFound,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a not-found error for an entity kind and identifier
    pub fn not_found(kind: impl ToString, id: impl ToString) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// Build a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// HTTP status code for this error kind
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::InvalidRecoveryCode => StatusCode::BAD_REQUEST,
            Error::BadCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict(_) | Error::UserAlreadyExists(_) => StatusCode::CONFLICT,
            Error::Config(_)
            | Error::Io(_)
            | Error::TomlParse(_)
            | Error::Database(_)
            | Error::Hashing(_)
            | Error::Token(_)
            | Error::ConfigNotFound
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::err(message))).into_response()
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_4xx() {
        assert_eq!(Error::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::BadCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::not_found("movie", "1").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::UserAlreadyExists("alice".into()).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = Error::Config("secret leaked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("movie", "42");
        assert_eq!(err.to_string(), "movie '42' not found");
    }
}
