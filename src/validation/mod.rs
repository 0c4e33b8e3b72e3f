//! Declarative field validation
//!
//! Composite parameters opt in with `#[valid]` (on the parameter or on the
//! model type). The `Model` derive turns field attributes such as
//! `#[size(min = 3)]` into [`Constraint`] values; the [`ValidationEngine`]
//! looks each constraint kind up in its registry of
//! [`ConstraintValidator`]s and accumulates a [`ValidationResult`].
//!
//! ```rust,ignore
//! #[derive(Default, Serialize, Model)]
//! #[valid]
//! pub struct Signup {
//!     #[size(min = 3, max = 20)]
//!     pub username: String,
//!     #[not_null]
//!     pub birth: Option<NaiveDate>,
//! }
//! ```

mod constraint;
mod engine;
mod result;
mod validators;

pub use constraint::{AsFieldValue, Constraint, ConstraintParam, FieldValue, FieldView};
pub use engine::ValidationEngine;
pub use result::{ValidationFailure, ValidationResult};
pub use validators::{
    ConstraintError, ConstraintValidator, NotNullValidator, NumberValidator, SizeValidator,
};
