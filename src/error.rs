use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::{collections::BTreeMap, fmt};

pub type AppResult<T> = Result<T, AppError>;

/// Message used whenever a referenced comment id does not exist.
pub const COMMENT_NOT_FOUND: &str = "Comment not found";

/// Top-level message for failed input validation.
pub const INVALID_DATA: &str = "The given data was invalid.";

#[derive(Debug)]
pub enum AppError {
    Database(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Validation(ValidationErrors),
    Unauthorized(String),
}

impl AppError {
    pub fn comment_not_found() -> Self {
        AppError::NotFound(COMMENT_NOT_FOUND.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Validation(errors) => write!(f, "{} {}", INVALID_DATA, errors),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                let body = Json(json!({ "message": "Internal server error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            // The wire contract reports missing comments as 400, not 404.
            AppError::NotFound(msg) => {
                let body = Json(json!({ "message": msg }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            AppError::BadRequest(msg) => {
                let body = Json(json!({ "message": msg }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            AppError::Validation(errors) => {
                let body = Json(json!({ "message": INVALID_DATA, "errors": errors }));
                (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
            }
            AppError::Unauthorized(msg) => {
                let body = Json(json!({ "message": msg }));
                (StatusCode::UNAUTHORIZED, body).into_response()
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Database(err)
    }
}

/// Field-level validation failures, keyed by field name. Serializes to the
/// `errors` object of a 422 response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    #[serde(flatten)]
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Ok when no failures were recorded, otherwise the 422 error.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_validation_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn validation_errors_collect_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("content", "The content field is required.");
        errors.add("email", "The email must be a valid email address.");
        assert!(errors.contains("content"));
        assert!(errors.contains("email"));
        let err = errors.into_result().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn validation_errors_serialize_as_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("status", "The status field is required.");
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "status": ["The status field is required."] })
        );
    }
}
