use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{auth::TokenError, repository::StoreError};

/// AppError
///
/// Every failure a handler or the authorization gate can surface. Converted into an
/// HTTP response with the `{ "error": true, "message": ... }` body clients expect.
#[derive(Debug, Error)]
pub enum AppError {
    /// No `Authorization` header on a protected route.
    #[error("unauthorized access")]
    Unauthenticated,

    /// A bearer token was supplied but failed verification.
    #[error("unauthorized access")]
    InvalidToken(#[from] TokenError),

    /// The authenticated identity does not own the requested resource.
    #[error("forbidden access")]
    Forbidden,

    /// A request body lacks a field the route needs.
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to sign session token")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken(_) | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Store(StoreError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            AppError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(_) | AppError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Store(StoreError::InvalidId(_)) => self.to_string(),
            AppError::Store(e) => {
                // Driver detail stays in the logs.
                tracing::error!(error = %e, "store operation failed");
                "internal server error".to_string()
            }
            AppError::Signing(e) => {
                tracing::error!(error = %e, "token signing failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": true, "message": message }))).into_response()
    }
}
