use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{
    ConstraintValidator, FieldView, NotNullValidator, NumberValidator, SizeValidator,
    ValidationResult,
};
use crate::binder::AnyModel;
use crate::error::DispatchError;

/// Registry of constraint validators keyed by constraint kind.
#[derive(Clone)]
pub struct ValidationEngine {
    validators: HashMap<&'static str, Arc<dyn ConstraintValidator>>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationEngine {
    /// Engine with the built-in `size`, `not_null` and `number` validators.
    pub fn new() -> Self {
        Self::empty()
            .register("size", SizeValidator)
            .register("not_null", NotNullValidator)
            .register("number", NumberValidator)
    }

    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Adds or replaces the validator for `kind`.
    pub fn register<V: ConstraintValidator>(mut self, kind: &'static str, validator: V) -> Self {
        self.validators.insert(kind, Arc::new(validator));
        self
    }

    pub fn insert(&mut self, kind: &'static str, validator: Arc<dyn ConstraintValidator>) {
        self.validators.insert(kind, validator);
    }

    pub fn supports(&self, kind: &str) -> bool {
        self.validators.contains_key(kind)
    }

    pub fn validate(&self, model: &dyn AnyModel) -> Result<ValidationResult, DispatchError> {
        self.validate_fields(&model.fields())
    }

    /// Evaluates every constraint on every field. Constraints whose kind has
    /// no registered validator are skipped.
    pub fn validate_fields(&self, fields: &[FieldView<'_>]) -> Result<ValidationResult, DispatchError> {
        let mut result = ValidationResult::new();

        for field in fields {
            for constraint in &field.constraints {
                let Some(validator) = self.validators.get(constraint.kind()) else {
                    debug!(
                        "No validator registered for constraint `{}` on field {}",
                        constraint.kind(),
                        field.name
                    );
                    continue;
                };

                let valid = validator
                    .is_valid(&field.value, constraint)
                    .map_err(|e| DispatchError::internal(format!("field {}: {e}", field.name)))?;
                if !valid {
                    result.add_error(field.name, validator.message(constraint));
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Constraint, ConstraintError, FieldValue};

    struct Uppercase;

    impl ConstraintValidator for Uppercase {
        fn is_valid(
            &self,
            value: &FieldValue<'_>,
            _constraint: &Constraint,
        ) -> Result<bool, ConstraintError> {
            Ok(match value {
                FieldValue::Text(text) => text.chars().all(|c| !c.is_lowercase()),
                _ => true,
            })
        }

        fn default_message(&self, _constraint: &Constraint) -> String {
            "Must be uppercase".to_string()
        }
    }

    #[test]
    fn test_collects_errors_per_field() {
        let engine = ValidationEngine::new();
        let fields = vec![
            FieldView::new(
                "name",
                FieldValue::Text("ab"),
                vec![Constraint::new("size").with_int("min", 3).with_int("max", 20)],
            ),
            FieldView::new("birth", FieldValue::Null, vec![Constraint::new("not_null")]),
            FieldView::new("city", FieldValue::Text("Paris"), vec![Constraint::new("size").with_int("min", 3)]),
        ];

        let result = engine.validate_fields(&fields).unwrap();
        assert!(!result.is_valid());
        assert_eq!(
            result.field_errors("name").unwrap(),
            ["Size must be between 3 and 20".to_string()]
        );
        assert_eq!(
            result.field_errors("birth").unwrap(),
            ["Field cannot be null".to_string()]
        );
        assert!(result.field_errors("city").is_none());
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        let engine = ValidationEngine::new();
        let fields = vec![FieldView::new(
            "code",
            FieldValue::Text("abc"),
            vec![Constraint::new("uppercase")],
        )];
        assert!(engine.validate_fields(&fields).unwrap().is_valid());
    }

    #[test]
    fn test_custom_validator() {
        let engine = ValidationEngine::new().register("uppercase", Uppercase);
        assert!(engine.supports("uppercase"));
        let fields = vec![FieldView::new(
            "code",
            FieldValue::Text("abc"),
            vec![Constraint::new("uppercase")],
        )];
        let result = engine.validate_fields(&fields).unwrap();
        assert_eq!(result.field_errors("code").unwrap(), ["Must be uppercase".to_string()]);
    }

    #[test]
    fn test_mismatched_constraint_is_internal_error() {
        let engine = ValidationEngine::new();
        let fields = vec![FieldView::new(
            "age",
            FieldValue::Integer(3),
            vec![Constraint::new("size").with_int("min", 1)],
        )];
        let err = engine.validate_fields(&fields).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
