use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use strum_macros::{Display, EnumString};

use crate::error::BindingError;

/// The conversion family a scalar parameter or model field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ScalarKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
}

/// Declared target of a scalar conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarTarget {
    pub kind: ScalarKind,
    /// `Option<T>` targets turn empty input into `None` instead of a default.
    pub nullable: bool,
    pub type_name: &'static str,
}

impl ScalarTarget {
    pub const fn new(kind: ScalarKind, type_name: &'static str) -> Self {
        Self {
            kind,
            nullable: false,
            type_name,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }
}

/// A converted request value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Text(String),
    /// Wide enough for every signed and unsigned 64-bit value.
    Int(i128),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl ScalarValue {
    fn label(&self) -> String {
        match self {
            ScalarValue::Null => String::new(),
            ScalarValue::Text(v) => v.clone(),
            ScalarValue::Int(v) => v.to_string(),
            ScalarValue::Float(v) => v.to_string(),
            ScalarValue::Bool(v) => v.to_string(),
            ScalarValue::Date(v) => v.to_string(),
            ScalarValue::Timestamp(v) => v.to_string(),
        }
    }
}

/// Converts one raw request value to `target`.
///
/// Missing or blank input yields `Null` for nullable targets and the
/// type's default otherwise (`""`, `0`, `0.0`, `false`). Dates have no
/// default, so a blank required date is an error.
pub fn convert(raw: Option<&str>, target: ScalarTarget) -> Result<ScalarValue, BindingError> {
    let trimmed = raw.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        if target.nullable {
            return Ok(ScalarValue::Null);
        }
        return match target.kind {
            ScalarKind::Text => Ok(ScalarValue::Text(raw.unwrap_or_default().to_string())),
            ScalarKind::Integer => Ok(ScalarValue::Int(0)),
            ScalarKind::Float => Ok(ScalarValue::Float(0.0)),
            ScalarKind::Boolean => Ok(ScalarValue::Bool(false)),
            ScalarKind::Date | ScalarKind::Timestamp => Err(BindingError::EmptyValue {
                type_name: target.type_name.to_string(),
            }),
        };
    }

    let invalid = || BindingError::invalid(target.type_name, trimmed);
    match target.kind {
        ScalarKind::Text => Ok(ScalarValue::Text(raw.unwrap_or_default().to_string())),
        ScalarKind::Integer => trimmed
            .parse::<i128>()
            .map(ScalarValue::Int)
            .map_err(|_| invalid()),
        ScalarKind::Float => trimmed
            .parse::<f64>()
            .map(ScalarValue::Float)
            .map_err(|_| invalid()),
        ScalarKind::Boolean => parse_bool(trimmed).map(ScalarValue::Bool).ok_or_else(invalid),
        ScalarKind::Date => parse_date(trimmed).map(ScalarValue::Date).ok_or_else(invalid),
        ScalarKind::Timestamp => parse_timestamp(trimmed)
            .map(ScalarValue::Timestamp)
            .ok_or_else(invalid),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(value).map(|ts| ts.date()))
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` and `YYYY-MM-DD HH:MM:SS[.f]`.
/// Missing seconds are padded.
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let normalized = value.replacen(' ', "T", 1);

    let Some((date, time)) = normalized.split_once('T') else {
        return NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN));
    };

    let padded = if time.matches(':').count() == 1 {
        format!("{date}T{time}:00")
    } else {
        normalized.clone()
    };
    NaiveDateTime::parse_from_str(&padded, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Rust types a scalar request value can be bound into.
pub trait FromScalar: Sized {
    const TARGET: ScalarTarget;

    fn from_scalar(value: ScalarValue) -> Result<Self, BindingError>;

    fn bind_raw(raw: Option<&str>) -> Result<Self, BindingError> {
        Self::from_scalar(convert(raw, Self::TARGET)?)
    }
}

fn mismatch(type_name: &str, value: &ScalarValue) -> BindingError {
    BindingError::invalid(type_name, value.label())
}

impl FromScalar for String {
    const TARGET: ScalarTarget = ScalarTarget::new(ScalarKind::Text, "String");

    fn from_scalar(value: ScalarValue) -> Result<Self, BindingError> {
        match value {
            ScalarValue::Text(text) => Ok(text),
            other => Ok(other.label()),
        }
    }
}

impl FromScalar for bool {
    const TARGET: ScalarTarget = ScalarTarget::new(ScalarKind::Boolean, "bool");

    fn from_scalar(value: ScalarValue) -> Result<Self, BindingError> {
        match value {
            ScalarValue::Bool(v) => Ok(v),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromScalar for f64 {
    const TARGET: ScalarTarget = ScalarTarget::new(ScalarKind::Float, "f64");

    fn from_scalar(value: ScalarValue) -> Result<Self, BindingError> {
        match value {
            ScalarValue::Float(v) => Ok(v),
            ScalarValue::Int(v) => Ok(v as f64),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl FromScalar for f32 {
    const TARGET: ScalarTarget = ScalarTarget::new(ScalarKind::Float, "f32");

    fn from_scalar(value: ScalarValue) -> Result<Self, BindingError> {
        match value {
            ScalarValue::Float(v) if v.is_finite() && v.abs() > f64::from(f32::MAX) => {
                Err(BindingError::invalid("f32", v.to_string()))
            }
            ScalarValue::Float(v) => Ok(v as f32),
            ScalarValue::Int(v) => Ok(v as f32),
            other => Err(mismatch("f32", &other)),
        }
    }
}

impl FromScalar for NaiveDate {
    const TARGET: ScalarTarget = ScalarTarget::new(ScalarKind::Date, "NaiveDate");

    fn from_scalar(value: ScalarValue) -> Result<Self, BindingError> {
        match value {
            ScalarValue::Date(v) => Ok(v),
            ScalarValue::Timestamp(v) => Ok(v.date()),
            other => Err(mismatch("NaiveDate", &other)),
        }
    }
}

impl FromScalar for NaiveDateTime {
    const TARGET: ScalarTarget = ScalarTarget::new(ScalarKind::Timestamp, "NaiveDateTime");

    fn from_scalar(value: ScalarValue) -> Result<Self, BindingError> {
        match value {
            ScalarValue::Timestamp(v) => Ok(v),
            ScalarValue::Date(v) => Ok(v.and_time(NaiveTime::MIN)),
            other => Err(mismatch("NaiveDateTime", &other)),
        }
    }
}

impl<T: FromScalar> FromScalar for Option<T> {
    const TARGET: ScalarTarget = T::TARGET.nullable();

    fn from_scalar(value: ScalarValue) -> Result<Self, BindingError> {
        match value {
            ScalarValue::Null => Ok(None),
            other => T::from_scalar(other).map(Some),
        }
    }
}

macro_rules! integer_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl FromScalar for $ty {
                const TARGET: ScalarTarget =
                    ScalarTarget::new(ScalarKind::Integer, stringify!($ty));

                fn from_scalar(value: ScalarValue) -> Result<Self, BindingError> {
                    match value {
                        ScalarValue::Int(v) => <$ty>::try_from(v)
                            .map_err(|_| BindingError::invalid(stringify!($ty), v.to_string())),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

integer_from_scalar!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
