use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

use crate::models::workflow::WorkflowError;

/// Field-keyed validation messages, kept in insertion order.
///
/// Serializes as `{"field": ["msg", ...], ...}`. Messages not tied to one
/// field live under `non_field_errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<(String, Vec<String>)>);

impl ValidationErrors {
    pub const NON_FIELD: &'static str = "non_field_errors";

    pub fn new() -> Self {
        Self::default()
    }

    /// A single message not tied to any field.
    pub fn general(message: impl Into<String>) -> Self {
        Self::field(Self::NON_FIELD, message)
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.0.iter_mut().find(|(f, _)| *f == field) {
            Some((_, messages)) => messages.push(message),
            None => self.0.push((field, vec![message])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(f, _)| f.as_str())
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.0.iter().flat_map(|(_, m)| m.iter().map(String::as_str))
    }

    pub fn first_message(&self) -> Option<&str> {
        self.messages().next()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.messages().collect();
        f.write_str(&joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, messages) in &self.0 {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

#[derive(Debug)]
pub enum AppError {
    Db(sqlx::Error),
    NotFound,
    Missing(String),
    Unauthenticated,
    PermissionDenied(String),
    BadRequest(String),
    Validation(ValidationErrors),
    Workflow(WorkflowError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Db(e) => write!(f, "Database error: {e}"),
            AppError::NotFound => write!(f, "Not found."),
            AppError::Missing(msg) => write!(f, "{msg}"),
            AppError::Unauthenticated => {
                write!(f, "Authentication credentials were not provided.")
            }
            AppError::PermissionDenied(msg) => write!(f, "{msg}"),
            AppError::BadRequest(msg) => write!(f, "{msg}"),
            AppError::Validation(errors) => write!(f, "{errors}"),
            AppError::Workflow(e) => write!(f, "{e}"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound | AppError::Missing(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Workflow(WorkflowError::Conflict) => StatusCode::CONFLICT,
            AppError::Workflow(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        match self {
            AppError::Db(_) => {
                log::error!("{self}");
                builder.json(serde_json::json!({ "detail": "Internal server error." }))
            }
            AppError::Validation(errors) => builder.json(errors),
            _ => builder.json(serde_json::json!({ "detail": self.to_string() })),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Db(e)
    }
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self {
        AppError::Validation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_serialize_as_ordered_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("12", "Response required.");
        errors.add("3", "Remarks required for NO responses.");
        errors.add("12", "second");
        let json = serde_json::to_string(&errors).unwrap();
        assert_eq!(
            json,
            r#"{"12":["Response required.","second"],"3":["Remarks required for NO responses."]}"#
        );
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError::from(WorkflowError::Conflict);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::PermissionDenied("Role parameter is required.".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
