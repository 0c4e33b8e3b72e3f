use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Field name to ordered error messages, plus an overall validity flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    valid: bool,
    errors: BTreeMap<String, Vec<String>>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: BTreeMap::new(),
        }
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self.valid = false;
    }

    pub fn add_errors(&mut self, errors: &BTreeMap<String, Vec<String>>) {
        for (field, messages) in errors {
            for message in messages {
                self.add_error(field.clone(), message.clone());
            }
        }
    }

    /// Folds another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        for (field, mut messages) in other.errors {
            self.errors.entry(field).or_default().append(&mut messages);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn field_errors(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn has_field_errors(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|e| !e.is_empty())
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }
}

/// A request whose composite parameters failed their declared constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    message: String,
    result: ValidationResult,
}

impl ValidationFailure {
    pub fn new(result: ValidationResult) -> Self {
        Self::with_message("Validation failed for multiple fields", result)
    }

    pub fn with_message(message: impl Into<String>, result: ValidationResult) -> Self {
        Self {
            message: message.into(),
            result,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    pub fn field_errors(&self) -> &BTreeMap<String, Vec<String>> {
        self.result.errors()
    }

    pub fn error_count(&self) -> usize {
        self.result.error_count()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "message": self.message,
            "errors": self.result.errors(),
        })
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        if !self.result.errors.is_empty() {
            writeln!(f, "Field errors:")?;
            for (field, messages) in &self.result.errors {
                writeln!(f, "{field}:")?;
                for message in messages {
                    writeln!(f, "  - {message}")?;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}
