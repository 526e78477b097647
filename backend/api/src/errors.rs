//! Application-wide error types.
//!
//! Business-rule failures carry a machine-readable kind that the frontend
//! switches on; storage/transport failures are wrapped transparently and
//! surface as `internal` without leaking driver details to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("no beds remain in the requested room")]
    CapacityExceeded,

    #[error("student already holds a room assignment")]
    AlreadyAssigned,

    #[error("an application for this e-mail is already pending")]
    AlreadyPending,

    #[error("this e-mail already belongs to an approved account")]
    AlreadyApproved,

    #[error("this record has already been decided")]
    AlreadyDecided,

    #[error("amount must be positive and no more than the pending balance")]
    InvalidAmount,

    #[error("missing or malformed bearer token")]
    Unauthorized,

    #[error("caller role does not permit this action")]
    Forbidden,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("notification dispatch error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Stable identifier for the error kind, switched on by the frontend.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::AlreadyAssigned => "already_assigned",
            Self::AlreadyPending => "already_pending",
            Self::AlreadyApproved => "already_approved",
            Self::AlreadyDecided => "already_decided",
            Self::InvalidAmount => "invalid_amount",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Config(_)
            | Self::Database(_)
            | Self::Migrate(_)
            | Self::Http(_)
            | Self::Json(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidAmount => StatusCode::BAD_REQUEST,
            Self::CapacityExceeded
            | Self::AlreadyAssigned
            | Self::AlreadyPending
            | Self::AlreadyApproved
            | Self::AlreadyDecided => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Config(_)
            | Self::Database(_)
            | Self::Migrate(_)
            | Self::Http(_)
            | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {self}");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_conflict() {
        assert_eq!(ApiError::CapacityExceeded.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::AlreadyDecided.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::AlreadyPending.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(ApiError::NotFound("room").kind(), "not_found");
        assert_eq!(ApiError::InvalidAmount.kind(), "invalid_amount");
        assert_eq!(
            ApiError::Validation("bad".into()).kind(),
            "validation_error"
        );
    }
}
