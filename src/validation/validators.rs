use thiserror::Error;

use super::{Constraint, FieldValue};

/// The constraint was attached to a field whose shape it cannot check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("constraint `{kind}` cannot validate a {found} value")]
pub struct ConstraintError {
    pub kind: &'static str,
    pub found: &'static str,
}

impl ConstraintError {
    fn new(constraint: &Constraint, value: &FieldValue<'_>) -> Self {
        Self {
            kind: constraint.kind(),
            found: value.type_label(),
        }
    }
}

/// Checks one kind of constraint. Registered on a
/// [`ValidationEngine`](super::ValidationEngine) under its kind name.
pub trait ConstraintValidator: Send + Sync + 'static {
    fn is_valid(
        &self,
        value: &FieldValue<'_>,
        constraint: &Constraint,
    ) -> Result<bool, ConstraintError>;

    /// Message used when the constraint declares none. May contain
    /// `{param}` placeholders.
    fn default_message(&self, constraint: &Constraint) -> String;

    fn message(&self, constraint: &Constraint) -> String {
        let template = constraint
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| self.default_message(constraint));
        constraint.interpolate(&template)
    }
}

/// `size(min, max)`: character length bounds on text. Absent values pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeValidator;

impl ConstraintValidator for SizeValidator {
    fn is_valid(
        &self,
        value: &FieldValue<'_>,
        constraint: &Constraint,
    ) -> Result<bool, ConstraintError> {
        match value {
            FieldValue::Null => Ok(true),
            FieldValue::Text(text) => {
                let length = i64::try_from(text.chars().count()).unwrap_or(i64::MAX);
                let min = constraint.int("min").unwrap_or(0);
                let max = constraint.int("max").unwrap_or(i64::MAX);
                Ok(length >= min && length <= max)
            }
            other => Err(ConstraintError::new(constraint, other)),
        }
    }

    fn default_message(&self, constraint: &Constraint) -> String {
        match (constraint.int("min"), constraint.int("max")) {
            (Some(_), Some(_)) => "Size must be between {min} and {max}",
            (Some(_), None) => "Size must be at least {min}",
            (None, Some(_)) => "Size must be at most {max}",
            (None, None) => "Size constraint violated",
        }
        .to_string()
    }
}

/// `not_null`: the field must carry a value.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotNullValidator;

impl ConstraintValidator for NotNullValidator {
    fn is_valid(
        &self,
        value: &FieldValue<'_>,
        _constraint: &Constraint,
    ) -> Result<bool, ConstraintError> {
        Ok(!value.is_null())
    }

    fn default_message(&self, _constraint: &Constraint) -> String {
        "Field cannot be null".to_string()
    }
}

/// `number(can_be_negative = false)`: rejects negative numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberValidator;

impl ConstraintValidator for NumberValidator {
    fn is_valid(
        &self,
        value: &FieldValue<'_>,
        constraint: &Constraint,
    ) -> Result<bool, ConstraintError> {
        let can_be_negative = constraint.bool("can_be_negative").unwrap_or(true);
        match value {
            FieldValue::Null => Ok(true),
            FieldValue::Integer(n) => Ok(can_be_negative || *n >= 0),
            FieldValue::Float(n) => Ok(can_be_negative || *n >= 0.0),
            other => Err(ConstraintError::new(constraint, other)),
        }
    }

    fn default_message(&self, _constraint: &Constraint) -> String {
        "Number must not be negative".to_string()
    }
}
