use serde::Serialize;
use serde_json::Value;
use std::any::Any;

use super::scalar::{FromScalar, ScalarTarget, ScalarValue, convert};
use crate::error::{BindingError, BindingErrors};
use crate::request::RequestData;
use crate::validation::FieldView;

/// A composite parameter populated field by field from request data.
///
/// Implemented by `#[derive(Model)]`. Top-level fields are read from
/// parameters of the same name; nested models read `parent.child` names.
pub trait Model: Default + Serialize + Send + Sync + 'static {
    /// Set by the `#[valid]` container attribute.
    const VALIDATED: bool = false;

    /// Builds a fresh instance. Every field error is reported, and no
    /// partially bound instance escapes on failure.
    fn bind(data: &RequestData, prefix: &str) -> Result<Self, BindingErrors>;

    /// Fields carrying constraints, for the validation engine.
    fn fields(&self) -> Vec<FieldView<'_>>;

    fn bind_boxed(data: &RequestData, prefix: &str) -> Result<Box<dyn AnyModel>, BindingErrors> {
        Self::bind(data, prefix).map(|model| Box::new(model) as Box<dyn AnyModel>)
    }
}

/// Object-safe face of [`Model`] used once the concrete type is erased.
pub trait AnyModel: Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn fields(&self) -> Vec<FieldView<'_>>;

    /// Submitted values, re-attached to a form view on validation failure.
    fn to_value(&self) -> Value;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<M: Model> AnyModel for M {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn fields(&self) -> Vec<FieldView<'_>> {
        Model::fields(self)
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// A persistence entity referenced by identity only.
///
/// Implemented by `#[derive(Entity)]`: binding a foreign-key field builds a
/// default instance and sets just the `#[id]` field.
pub trait Entity: Model {
    const ID_TARGET: ScalarTarget;

    fn with_identity(id: ScalarValue) -> Result<Self, BindingError>;
}

/// Request parameter name for `field` under `prefix`.
pub fn field_key(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

/// Converts the raw value of one scalar field.
pub fn bind_field<T: FromScalar>(raw: Option<&str>) -> Result<T, BindingError> {
    T::bind_raw(raw)
}

/// Foreign-key binding: a flat value becomes a stub entity carrying only its
/// identity. Falls back to nested binding (`key.field`) when no flat value
/// was submitted.
pub fn bind_entity<E: Entity>(data: &RequestData, key: &str) -> Result<E, BindingErrors> {
    match data.value(key) {
        Some(raw) => {
            let id = convert(Some(raw), E::ID_TARGET)?;
            Ok(E::with_identity(id)?)
        }
        None if data.has_nested(key) => E::bind(data, key),
        None => Ok(E::default()),
    }
}

/// Like [`bind_entity`], but a blank or absent value means "no reference".
pub fn bind_optional_entity<E: Entity>(
    data: &RequestData,
    key: &str,
) -> Result<Option<E>, BindingErrors> {
    match data.value(key) {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(_) => bind_entity(data, key).map(Some),
        None if data.has_nested(key) => E::bind(data, key).map(Some),
        None => Ok(None),
    }
}

/// Nested composite binding under the dot-prefixed `key`. The nested
/// instance is only populated when matching parameters exist.
pub fn bind_nested<M: Model>(data: &RequestData, key: &str) -> Result<M, BindingErrors> {
    if data.has_nested(key) {
        M::bind(data, key)
    } else {
        Ok(M::default())
    }
}

pub fn bind_optional_nested<M: Model>(
    data: &RequestData,
    key: &str,
) -> Result<Option<M>, BindingErrors> {
    if data.has_nested(key) {
        M::bind(data, key).map(Some)
    } else {
        Ok(None)
    }
}

/// Accumulates field errors while a derived `bind` walks its fields.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<BindingError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bound value, or records the error and substitutes the
    /// default so the walk can continue.
    pub fn take<T: Default, E: Into<BindingErrors>>(&mut self, result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(errors) => {
                self.0.extend(errors.into().0);
                T::default()
            }
        }
    }

    pub fn finish<T>(self, value: T) -> Result<T, BindingErrors> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(BindingErrors(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::ScalarKind;
    use crate::validation::{AsFieldValue, Constraint};

    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    struct Plane {
        id: i64,
        name: String,
    }

    impl Model for Plane {
        fn bind(data: &RequestData, prefix: &str) -> Result<Self, BindingErrors> {
            let mut errors = FieldErrors::new();
            let plane = Plane {
                id: errors.take(bind_field(data.value(&field_key(prefix, "id")))),
                name: errors.take(bind_field(data.value(&field_key(prefix, "name")))),
            };
            errors.finish(plane)
        }

        fn fields(&self) -> Vec<FieldView<'_>> {
            vec![FieldView::new(
                "name",
                self.name.as_field_value(),
                vec![Constraint::new("size").with_int("min", 3)],
            )]
        }
    }

    impl Entity for Plane {
        const ID_TARGET: ScalarTarget = ScalarTarget::new(ScalarKind::Integer, "i64");

        fn with_identity(id: ScalarValue) -> Result<Self, BindingError> {
            Ok(Plane {
                id: i64::from_scalar(id)?,
                ..Default::default()
            })
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize)]
    struct Flight {
        code: String,
        seats: u16,
        plane: Plane,
        spare: Option<Plane>,
    }

    impl Model for Flight {
        fn bind(data: &RequestData, prefix: &str) -> Result<Self, BindingErrors> {
            let mut errors = FieldErrors::new();
            let flight = Flight {
                code: errors.take(bind_field(data.value(&field_key(prefix, "code")))),
                seats: errors.take(bind_field(data.value(&field_key(prefix, "seats")))),
                plane: errors.take(bind_entity(data, &field_key(prefix, "plane"))),
                spare: errors.take(bind_optional_entity(data, &field_key(prefix, "spare"))),
            };
            errors.finish(flight)
        }

        fn fields(&self) -> Vec<FieldView<'_>> {
            Vec::new()
        }
    }

    #[test]
    fn test_foreign_key_sets_identity_only() {
        let data: RequestData = [("code", "AF12"), ("seats", "180"), ("plane", "4")]
            .into_iter()
            .collect();
        let flight = Flight::bind(&data, "").unwrap();
        assert_eq!(flight.plane, Plane { id: 4, name: String::new() });
        assert_eq!(flight.spare, None);
    }

    #[test]
    fn test_nested_dot_prefixed_binding() {
        let data: RequestData = [("plane.id", "9"), ("plane.name", "A320"), ("spare", " ")]
            .into_iter()
            .collect();
        let flight = Flight::bind(&data, "").unwrap();
        assert_eq!(flight.plane.name, "A320");
        assert_eq!(flight.plane.id, 9);
        assert_eq!(flight.spare, None);
    }

    #[test]
    fn test_binding_collects_every_field_error() {
        let data: RequestData = [("seats", "many"), ("plane", "x")].into_iter().collect();
        let errors = Flight::bind(&data, "").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_binding_is_idempotent() {
        let data: RequestData = [("code", "AF12"), ("seats", "3"), ("plane.id", "1")]
            .into_iter()
            .collect();
        assert_eq!(Flight::bind(&data, "").unwrap(), Flight::bind(&data, "").unwrap());
    }

    #[test]
    fn test_any_model_round_trip() {
        let boxed = Plane::bind_boxed(&[("name", "B737")].into_iter().collect(), "").unwrap();
        assert_eq!(boxed.to_value()["name"], "B737");
        assert_eq!(boxed.fields().len(), 1);
        let plane = boxed.into_any().downcast::<Plane>().unwrap();
        assert_eq!(plane.name, "B737");
    }
}
