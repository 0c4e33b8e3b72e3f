//! Parameter binding
//!
//! Resolves every declared handler parameter from the request, in the
//! order session → named scalar → composite model → file upload, and runs
//! validation on composite parameters that opted in.

mod model;
mod scalar;
mod upload;

pub use model::{
    AnyModel, Entity, FieldErrors, Model, bind_entity, bind_field, bind_nested,
    bind_optional_entity, bind_optional_nested, field_key,
};
pub use scalar::{FromScalar, ScalarKind, ScalarTarget, ScalarValue, convert};
pub use upload::FileUpload;

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::controller::{Argument, ParamBinding, ParamDescriptor};
use crate::error::{BindingError, BindingErrors, DispatchError};
use crate::request::{Request, RequestData};
use crate::session::Session;
use crate::validation::{ValidationEngine, ValidationResult};

/// Builds a boxed model from request data under a name prefix.
pub type ModelBinder = fn(&RequestData, &str) -> Result<Box<dyn AnyModel>, BindingErrors>;

/// Everything the binder produced for one handler call.
#[derive(Debug)]
pub struct BoundArguments {
    pub arguments: Vec<Argument>,
    /// Submitted composite values by model attribute name.
    pub models: Vec<(&'static str, Value)>,
    /// Combined result over every validated composite parameter.
    pub validation: ValidationResult,
}

#[derive(Clone)]
pub struct ParameterBinder {
    engine: Arc<ValidationEngine>,
}

impl Default for ParameterBinder {
    fn default() -> Self {
        Self::new(Arc::new(ValidationEngine::new()))
    }
}

impl ParameterBinder {
    pub fn new(engine: Arc<ValidationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    /// Binds every parameter. Binding errors are collected across all
    /// parameters and reported together; validation failures are returned
    /// in [`BoundArguments::validation`] for the caller to act on.
    pub fn bind(
        &self,
        params: &[ParamDescriptor],
        request: &Request,
        session: &Session,
    ) -> Result<BoundArguments, DispatchError> {
        let mut arguments = Vec::with_capacity(params.len());
        let mut models = Vec::new();
        let mut validation = ValidationResult::new();
        let mut errors = Vec::new();

        for param in params {
            match param.binding {
                ParamBinding::Session => arguments.push(Argument::Session(session.clone())),

                ParamBinding::Scalar { name, target } => {
                    match convert(request.params.value(name), target) {
                        Ok(value) => arguments.push(Argument::Scalar(value)),
                        Err(e) => errors.push(e),
                    }
                }

                ParamBinding::Model {
                    name,
                    type_name,
                    validated,
                    bind,
                } => match bind(&request.params, "") {
                    Ok(model) => {
                        if validated {
                            let result = self.engine.validate(model.as_ref())?;
                            if !result.is_valid() {
                                debug!(
                                    "Model {} ({}) failed validation with {} error(s)",
                                    name,
                                    type_name,
                                    result.error_count()
                                );
                            }
                            validation.merge(result);
                        }
                        models.push((name, model.to_value()));
                        arguments.push(Argument::Model(model));
                    }
                    Err(e) => errors.extend(e.0),
                },

                ParamBinding::File {
                    name,
                    multiple,
                    required,
                } => match bind_files(request, name, multiple, required) {
                    Ok(argument) => arguments.push(argument),
                    Err(e) => errors.push(e),
                },

                ParamBinding::Unresolved => errors.push(BindingError::NotAnnotated {
                    parameter: param.parameter.to_string(),
                }),
            }
        }

        if !errors.is_empty() {
            return Err(BindingErrors(errors).into());
        }

        Ok(BoundArguments {
            arguments,
            models,
            validation,
        })
    }
}

fn bind_files(
    request: &Request,
    name: Option<&'static str>,
    multiple: bool,
    required: bool,
) -> Result<Argument, BindingError> {
    if multiple {
        let files = request
            .parts
            .iter()
            .filter(|part| name.is_none_or(|n| part.name == n))
            .filter_map(FileUpload::from_part)
            .collect();
        return Ok(Argument::Files(files));
    }

    let file = name
        .and_then(|n| request.part(n))
        .and_then(FileUpload::from_part);
    match (file, required) {
        (None, true) => Err(BindingError::MissingPart {
            name: name.unwrap_or_default().to_string(),
        }),
        (file, _) => Ok(Argument::File(file)),
    }
}
