//! Error taxonomy shared by every handler.
//!
//! Handlers return [`ApiResult`]; the [`IntoResponse`] impl below is the single
//! place failures become HTTP responses, so every error reaches the client as a
//! JSON body with a 4xx/5xx status.

use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Field name -> messages, rendered as `{"field": ["message", ...]}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Integrity(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid page.")]
    InvalidPage,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Validation error on a single field.
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        // ---
        let mut errors = FieldErrors::new();
        errors.insert(name.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(what.to_string())
    }

    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Integrity(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) | ApiError::InvalidPage => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                json!({ "error": "Internal server error" })
            }
            ApiError::NotFound(what) => json!({ "error": format!("{} not found", what) }),
            ApiError::InvalidPage => json!({ "error": "Invalid page." }),
            ApiError::BadRequest(message)
            | ApiError::Integrity(message)
            | ApiError::Unauthorized(message) => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        // ---
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource"),
            sqlx::Error::Database(db)
                if db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation() =>
            {
                tracing::warn!(
                    "Integrity violation on {:?}: {}",
                    db.constraint(),
                    db.message()
                );
                ApiError::Integrity(format!("Integrity error: {}", db.message()))
            }
            err => ApiError::Internal(format!("DB error, {}", err)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::not_found("Resource")
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ApiError::Internal(format!("Hashing error: {}", err))
    }
}

/// Accumulates per-field validation messages before failing once.
#[derive(Debug, Default)]
pub struct Violations {
    errors: FieldErrors,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record "This field is required." when `value` is `None`.
    pub fn require<'a, T>(&mut self, field: &str, value: &'a Option<T>) -> Option<&'a T> {
        if value.is_none() {
            self.add(field, "This field is required.");
        }
        value.as_ref()
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }

    /// Like [`finish`](Self::finish), handing back the validated value.
    pub fn conclude<T>(self, value: Option<T>) -> ApiResult<T> {
        self.finish()?;
        value.ok_or_else(|| ApiError::BadRequest("Invalid input".to_string()))
    }
}
