// Controllers are normally declared through macros:
// - #[controller(path = "...", auth, roles = [...])] on the struct
// - #[routes] on the impl block, with #[url], #[get], #[post], #[rest], #[auth]
//   on methods and #[request_param], #[model_attribute], #[file_upload],
//   #[session] on parameters
//
// The macros generate:
// 1. ControllerType implementation (per-request construction, session injection)
// 2. Controller implementation returning a ControllerDescriptor
// 3. One hidden invoker fn per handler method
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::binder::{AnyModel, FileUpload, FromScalar, Model, ModelBinder, ScalarTarget, ScalarValue};
use crate::error::{BindingError, DispatchError};
use crate::guard::Authorization;
use crate::response::HandlerResult;
use crate::session::Session;

/// A live controller instance, created fresh for every request.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Calls one handler method on a type-erased instance.
pub type Invoker = fn(&(dyn Any + Send + Sync), Arguments) -> Result<HandlerResult, DispatchError>;

/// Builds a controller instance for the current session.
pub type Factory = fn(&Session) -> Result<Instance, DispatchError>;

/// Tag identifying which declarations the scanner should pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerMarker(pub &'static str);

impl HandlerMarker {
    pub const CONTROLLER: HandlerMarker = HandlerMarker("controller");
}

impl Default for HandlerMarker {
    fn default() -> Self {
        Self::CONTROLLER
    }
}

/// What a handler method returns, as declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    View,
    Text,
    File,
    /// Any serializable value; only renderable on `#[rest]` methods.
    Json,
    Other(&'static str),
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::View => f.write_str("ModelView"),
            ReturnKind::Text => f.write_str("String"),
            ReturnKind::File => f.write_str("FileExport"),
            ReturnKind::Json => f.write_str("serializable value"),
            ReturnKind::Other(name) => f.write_str(name),
        }
    }
}

/// How one handler parameter gets its value.
#[derive(Clone, Copy)]
pub enum ParamBinding {
    Session,
    Scalar {
        name: &'static str,
        target: ScalarTarget,
    },
    Model {
        name: &'static str,
        type_name: &'static str,
        validated: bool,
        bind: ModelBinder,
    },
    File {
        /// `None` collects every file part.
        name: Option<&'static str>,
        multiple: bool,
        required: bool,
    },
    /// No binding capability was declared.
    Unresolved,
}

impl fmt::Debug for ParamBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamBinding::Session => f.write_str("Session"),
            ParamBinding::Scalar { name, target } => f
                .debug_struct("Scalar")
                .field("name", name)
                .field("target", target)
                .finish(),
            ParamBinding::Model {
                name,
                type_name,
                validated,
                ..
            } => f
                .debug_struct("Model")
                .field("name", name)
                .field("type_name", type_name)
                .field("validated", validated)
                .finish(),
            ParamBinding::File {
                name,
                multiple,
                required,
            } => f
                .debug_struct("File")
                .field("name", name)
                .field("multiple", multiple)
                .field("required", required)
                .finish(),
            ParamBinding::Unresolved => f.write_str("Unresolved"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamDescriptor {
    pub parameter: &'static str,
    pub binding: ParamBinding,
}

impl ParamDescriptor {
    pub const fn new(parameter: &'static str, binding: ParamBinding) -> Self {
        Self { parameter, binding }
    }
}

/// Registration data for one handler method.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub url: Option<&'static str>,
    /// Declared verbs; empty means GET.
    pub verbs: Vec<&'static str>,
    pub rest: bool,
    pub returns: ReturnKind,
    pub authorization: Option<Authorization>,
    pub params: Vec<ParamDescriptor>,
    pub invoker: Invoker,
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("verbs", &self.verbs)
            .field("rest", &self.rest)
            .field("returns", &self.returns)
            .field("authorization", &self.authorization)
            .field("params", &self.params)
            .finish()
    }
}

impl MethodDescriptor {
    pub fn new(name: &'static str, returns: ReturnKind, invoker: Invoker) -> Self {
        Self {
            name,
            url: None,
            verbs: Vec::new(),
            rest: false,
            returns,
            authorization: None,
            params: Vec::new(),
            invoker,
        }
    }

    pub fn url(mut self, url: &'static str) -> Self {
        self.url = Some(url);
        self
    }

    pub fn verb(mut self, verb: &'static str) -> Self {
        self.verbs.push(verb);
        self
    }

    pub fn rest(mut self) -> Self {
        self.rest = true;
        self
    }

    pub fn authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn param(mut self, parameter: &'static str, binding: ParamBinding) -> Self {
        self.params.push(ParamDescriptor::new(parameter, binding));
        self
    }

    /// Declared verbs, defaulting to GET.
    pub fn effective_verbs(&self) -> Vec<&'static str> {
        if self.verbs.is_empty() {
            vec!["GET"]
        } else {
            self.verbs.clone()
        }
    }
}

/// Registration data for one controller type.
#[derive(Debug, Clone)]
pub struct ControllerDescriptor {
    pub name: &'static str,
    pub module_path: &'static str,
    pub marker: HandlerMarker,
    pub path_prefix: Option<&'static str>,
    pub authorization: Option<Authorization>,
    pub factory: Factory,
    pub methods: Vec<MethodDescriptor>,
}

impl ControllerDescriptor {
    pub fn new(name: &'static str, module_path: &'static str, factory: Factory) -> Self {
        Self {
            name,
            module_path,
            marker: HandlerMarker::CONTROLLER,
            path_prefix: None,
            authorization: None,
            factory,
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.name == name)
    }

    pub fn instantiate(&self, session: &Session) -> Result<Instance, DispatchError> {
        (self.factory)(session)
    }
}

/// Per-request construction of a controller. Implemented by `#[controller]`.
pub trait ControllerType: Send + Sync + Sized + 'static {
    fn create(session: &Session) -> Result<Self, DispatchError>;

    fn authorization() -> Option<Authorization> {
        None
    }

    fn path_prefix() -> Option<&'static str> {
        None
    }

    fn instantiate(session: &Session) -> Result<Instance, DispatchError> {
        Self::create(session).map(|controller| Arc::new(controller) as Instance)
    }
}

/// A controller with handler methods. Implemented by `#[routes]`.
pub trait Controller: ControllerType {
    fn descriptor() -> ControllerDescriptor;
}

/// A bound argument, ready to be passed to a handler.
pub enum Argument {
    Session(Session),
    Scalar(ScalarValue),
    Model(Box<dyn AnyModel>),
    File(Option<FileUpload>),
    Files(Vec<FileUpload>),
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Session(session) => f.debug_tuple("Session").field(session).finish(),
            Argument::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            Argument::Model(model) => f.debug_tuple("Model").field(&model.type_name()).finish(),
            Argument::File(file) => f.debug_tuple("File").field(file).finish(),
            Argument::Files(files) => f.debug_tuple("Files").field(&files.len()).finish(),
        }
    }
}

/// Arguments handed to an invoker, consumed in declaration order.
#[derive(Debug)]
pub struct Arguments {
    values: std::vec::IntoIter<Argument>,
}

impl Arguments {
    pub fn new(values: Vec<Argument>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    fn next(&mut self, parameter: &str) -> Result<Argument, BindingError> {
        self.values.next().ok_or_else(|| mismatch(parameter))
    }

    pub fn session(&mut self, parameter: &str) -> Result<Session, BindingError> {
        match self.next(parameter)? {
            Argument::Session(session) => Ok(session),
            _ => Err(mismatch(parameter)),
        }
    }

    pub fn scalar<T: FromScalar>(&mut self, parameter: &str) -> Result<T, BindingError> {
        match self.next(parameter)? {
            Argument::Scalar(value) => T::from_scalar(value),
            _ => Err(mismatch(parameter)),
        }
    }

    pub fn model<T: Model>(&mut self, parameter: &str) -> Result<T, BindingError> {
        match self.next(parameter)? {
            Argument::Model(model) => model
                .into_any()
                .downcast::<T>()
                .map(|model| *model)
                .map_err(|_| mismatch(parameter)),
            _ => Err(mismatch(parameter)),
        }
    }

    pub fn file(&mut self, parameter: &str) -> Result<Option<FileUpload>, BindingError> {
        match self.next(parameter)? {
            Argument::File(file) => Ok(file),
            _ => Err(mismatch(parameter)),
        }
    }

    pub fn required_file(&mut self, parameter: &str) -> Result<FileUpload, BindingError> {
        self.file(parameter)?.ok_or_else(|| BindingError::MissingPart {
            name: parameter.to_string(),
        })
    }

    pub fn files(&mut self, parameter: &str) -> Result<Vec<FileUpload>, BindingError> {
        match self.next(parameter)? {
            Argument::Files(files) => Ok(files),
            _ => Err(mismatch(parameter)),
        }
    }
}

fn mismatch(parameter: &str) -> BindingError {
    BindingError::ArgumentMismatch {
        parameter: parameter.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::ScalarKind;

    fn noop(_: &(dyn Any + Send + Sync), _: Arguments) -> Result<HandlerResult, DispatchError> {
        Ok(HandlerResult::Text("ok".into()))
    }

    #[test]
    fn test_effective_verbs_default_to_get() {
        let method = MethodDescriptor::new("index", ReturnKind::Text, noop).url("/");
        assert_eq!(method.effective_verbs(), vec!["GET"]);
        let method = method.verb("POST");
        assert_eq!(method.effective_verbs(), vec!["POST"]);
    }

    #[test]
    fn test_arguments_in_order() {
        let session = Session::detached("s");
        let mut args = Arguments::new(vec![
            Argument::Session(session),
            Argument::Scalar(ScalarValue::Int(7)),
            Argument::File(None),
        ]);
        assert_eq!(args.session("session").unwrap().id(), "s");
        assert_eq!(args.scalar::<u8>("age").unwrap(), 7);
        assert!(matches!(
            args.required_file("avatar"),
            Err(BindingError::MissingPart { ref name }) if name == "avatar"
        ));
        assert!(matches!(
            args.files("more"),
            Err(BindingError::ArgumentMismatch { .. })
        ));
    }

    #[test]
    fn test_param_binding_debug_hides_fn_pointer() {
        let binding = ParamBinding::Scalar {
            name: "age",
            target: ScalarTarget::new(ScalarKind::Integer, "u8"),
        };
        assert!(format!("{binding:?}").starts_with("Scalar"));
    }
}
