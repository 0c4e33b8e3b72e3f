use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// A constraint argument as written in the field attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintParam {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl std::fmt::Display for ConstraintParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintParam::Int(v) => write!(f, "{v}"),
            ConstraintParam::Bool(v) => write!(f, "{v}"),
            ConstraintParam::Text(v) => f.write_str(v),
        }
    }
}

/// One declared constraint on a model field, e.g. `size(min = 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    kind: &'static str,
    params: BTreeMap<&'static str, ConstraintParam>,
    message: Option<String>,
}

impl Constraint {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
            message: None,
        }
    }

    pub fn with_int(mut self, name: &'static str, value: i64) -> Self {
        self.params.insert(name, ConstraintParam::Int(value));
        self
    }

    pub fn with_bool(mut self, name: &'static str, value: bool) -> Self {
        self.params.insert(name, ConstraintParam::Bool(value));
        self
    }

    pub fn with_text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.params.insert(name, ConstraintParam::Text(value.into()));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.params.get(name) {
            Some(ConstraintParam::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.params.get(name) {
            Some(ConstraintParam::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.params.get(name) {
            Some(ConstraintParam::Text(v)) => Some(v),
            _ => None,
        }
    }

    /// Replaces `{param}` placeholders with the constraint's arguments.
    pub fn interpolate(&self, template: &str) -> String {
        self.params
            .iter()
            .fold(template.to_string(), |message, (name, value)| {
                message.replace(&format!("{{{name}}}"), &value.to_string())
            })
    }
}

/// Read-only view of a field value handed to constraint validators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Null,
    Text(&'a str),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    /// A present value with no scalar shape (entities, nested models).
    Present,
}

impl FieldValue<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Date(_) => "date",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Present => "object",
        }
    }
}

pub trait AsFieldValue {
    fn as_field_value(&self) -> FieldValue<'_>;
}

impl AsFieldValue for String {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Text(self)
    }
}

impl AsFieldValue for bool {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Bool(*self)
    }
}

impl AsFieldValue for f32 {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Float(f64::from(*self))
    }
}

impl AsFieldValue for f64 {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Float(*self)
    }
}

impl AsFieldValue for NaiveDate {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Date(*self)
    }
}

impl AsFieldValue for NaiveDateTime {
    fn as_field_value(&self) -> FieldValue<'_> {
        FieldValue::Timestamp(*self)
    }
}

impl<T: AsFieldValue> AsFieldValue for Option<T> {
    fn as_field_value(&self) -> FieldValue<'_> {
        match self {
            Some(value) => value.as_field_value(),
            None => FieldValue::Null,
        }
    }
}

macro_rules! integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl AsFieldValue for $ty {
                fn as_field_value(&self) -> FieldValue<'_> {
                    FieldValue::Integer(i64::try_from(*self).unwrap_or(i64::MAX))
                }
            }
        )*
    };
}

integer_field_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// A field together with the constraints declared on it.
#[derive(Debug, Clone)]
pub struct FieldView<'a> {
    pub name: &'static str,
    pub value: FieldValue<'a>,
    pub constraints: Vec<Constraint>,
}

impl<'a> FieldView<'a> {
    pub fn new(name: &'static str, value: FieldValue<'a>, constraints: Vec<Constraint>) -> Self {
        Self {
            name,
            value,
            constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_replaces_all_params() {
        let constraint = Constraint::new("size").with_int("min", 3).with_int("max", 10);
        assert_eq!(
            constraint.interpolate("Size must be between {min} and {max}"),
            "Size must be between 3 and 10"
        );
    }

    #[test]
    fn test_option_field_value() {
        let missing: Option<String> = None;
        assert!(missing.as_field_value().is_null());
        assert_eq!(Some(7u16).as_field_value(), FieldValue::Integer(7));
    }
}
