//! Success/failure model for business operations.
//!
//! Every command returns an [`Outcome`] instead of raising an error for an
//! expected business failure (not found, validation, rule violation). The
//! container is a plain [`Result`], so exactly one arm is populated and the
//! value can only be reached through `match`, `?` or the combinators; reading
//! the success value of a failed outcome does not type-check.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of a business operation.
pub type Outcome<T> = std::result::Result<T, Failure>;

/// An expected business failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// A rule violation or missing resource with a single message.
    #[error("{message}")]
    Error { message: String },

    /// One or more field-level violations found in one validation pass.
    #[error("{0}")]
    Validation(ValidationFailure),
}

impl Failure {
    /// Creates a failure carrying a single message.
    pub fn new(message: impl Into<String>) -> Self {
        Failure::Error {
            message: message.into(),
        }
    }

    /// Returns the human-readable message.
    ///
    /// Validation failures render one `field: message` line per violation.
    pub fn message(&self) -> String {
        match self {
            Failure::Error { message } => message.clone(),
            Failure::Validation(validation) => validation.to_string(),
        }
    }

    /// Returns true if this is a field-level validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Failure::Validation(_))
    }

    /// Returns the validation details, if any.
    pub fn as_validation(&self) -> Option<&ValidationFailure> {
        match self {
            Failure::Validation(validation) => Some(validation),
            Failure::Error { .. } => None,
        }
    }
}

impl From<ValidationFailure> for Failure {
    fn from(validation: ValidationFailure) -> Self {
        Failure::Validation(validation)
    }
}

/// Violations for one field, messages kept in encounter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors {
    pub field: String,
    pub messages: Vec<String>,
}

/// Field-level validation errors.
///
/// Fields appear in the order they were first reported and each field keeps
/// its messages in the order they were reported. A value always holds at
/// least one violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    errors: Vec<FieldErrors>,
}

impl ValidationFailure {
    /// Creates a validation failure from a single violation.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldErrors {
                field: field.into(),
                messages: vec![message.into()],
            }],
        }
    }

    /// Creates a validation failure from a batch of `(field, message)` pairs.
    ///
    /// Returns `None` when the batch is empty.
    pub fn from_violations<F, M>(violations: impl IntoIterator<Item = (F, M)>) -> Option<Self>
    where
        F: Into<String>,
        M: Into<String>,
    {
        let mut iter = violations.into_iter();
        let (field, message) = iter.next()?;
        let mut failure = Self::single(field, message);
        for (field, message) in iter {
            failure.push(field, message);
        }
        Some(failure)
    }

    /// Adds a violation, appending to the field's messages if already present.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.errors.iter_mut().find(|entry| entry.field == field) {
            Some(entry) => entry.messages.push(message),
            None => self.errors.push(FieldErrors {
                field,
                messages: vec![message],
            }),
        }
    }

    /// Appends every violation of `other` after this one's.
    pub fn merge(&mut self, other: ValidationFailure) {
        for entry in other.errors {
            for message in entry.messages {
                self.push(entry.field.clone(), message);
            }
        }
    }

    /// Returns the messages reported for a field.
    pub fn errors_for(&self, field: &str) -> &[String] {
        self.errors
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Iterates fields in first-encounter order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldErrors> {
        self.errors.iter()
    }

    /// Total number of individual violations.
    pub fn violation_count(&self) -> usize {
        self.errors.iter().map(|entry| entry.messages.len()).sum()
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for entry in &self.errors {
            for message in &entry.messages {
                if !first {
                    writeln!(f)?;
                }
                write!(f, "{}: {}", entry.field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

/// Tri-state view of an [`Outcome`].
pub trait OutcomeExt<T> {
    /// Splits the outcome into `(succeeded, success, failure)`.
    ///
    /// Exactly one of `success` and `failure` is `Some`.
    fn try_get_successful(self) -> (bool, Option<T>, Option<Failure>);
}

impl<T> OutcomeExt<T> for Outcome<T> {
    fn try_get_successful(self) -> (bool, Option<T>, Option<Failure>) {
        match self {
            Ok(success) => (true, Some(success), None),
            Err(failure) => (false, None, Some(failure)),
        }
    }
}
