//! The schema-validator seam and the errors it reports.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One field-scoped validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// Name of the field the error belongs to.
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A rejected model: the per-field errors plus the best-effort model the
/// validator still produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRejection<M> {
    /// Set when the rejection itself is about a single field.
    pub path: Option<String>,
    pub message: String,
    pub inner: Vec<ValidationError>,
    pub value: M,
}

impl<M> ValidationRejection<M> {
    /// A rejection aggregating several field errors.
    pub fn new(value: M, inner: Vec<ValidationError>) -> Self {
        let message = match inner.len() {
            1 => "1 error occurred".to_string(),
            n => format!("{n} errors occurred"),
        };
        Self {
            path: None,
            message,
            inner,
            value,
        }
    }

    /// A rejection carrying exactly one error and no inner list.
    pub fn single(value: M, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            message: message.into(),
            inner: Vec::new(),
            value,
        }
    }

    /// The field errors: `inner` when present, otherwise the rejection
    /// itself as a single error.
    pub fn errors(&self) -> Vec<ValidationError> {
        if !self.inner.is_empty() {
            return self.inner.clone();
        }
        vec![ValidationError::new(
            self.path.clone().unwrap_or_default(),
            self.message.clone(),
        )]
    }
}

impl<M> fmt::Display for ValidationRejection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Why a model failed validation.
#[derive(Debug, Error)]
pub enum SchemaError<M> {
    /// The model broke one or more field rules. Not an engine failure.
    #[error("validation failed: {0}")]
    Invalid(ValidationRejection<M>),

    /// The validator itself failed.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Stop at the first failing rule instead of collecting all of them.
    pub abort_early: bool,
}

/// Validates a candidate model, resolving with the normalized model.
#[async_trait]
pub trait SchemaValidator<M>: Send + Sync {
    async fn validate(&self, model: M, options: ValidateOptions) -> Result<M, SchemaError<M>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_rejection_exposes_inner_errors() {
        let rejection = ValidationRejection::new(
            (),
            vec![
                ValidationError::new("name", "name is required"),
                ValidationError::new("email", "email must be a valid email"),
            ],
        );

        assert_eq!(rejection.errors().len(), 2);
        assert_eq!(rejection.to_string(), "2 errors occurred");
    }

    #[test]
    fn single_rejection_is_wrapped() {
        let rejection = ValidationRejection::single((), "subject", "subject is required");

        assert_eq!(
            rejection.errors(),
            vec![ValidationError::new("subject", "subject is required")]
        );
    }

    #[test]
    fn internal_errors_come_from_anyhow() {
        let error: SchemaError<()> = anyhow::anyhow!("schema unavailable").into();
        assert!(matches!(error, SchemaError::Internal(_)));
        assert_eq!(error.to_string(), "schema unavailable");
    }

    #[test]
    fn validation_error_serializes_flat() {
        let value = serde_json::to_value(ValidationError::new("email", "bad")).unwrap();
        assert_eq!(value, serde_json::json!({"path": "email", "message": "bad"}));
    }
}
