use std::sync::Arc;
use tracing::debug;

use super::{Session, keys};
use crate::binder::ParameterBinder;
use crate::controller::{Arguments, ControllerDescriptor, Instance, MethodDescriptor};
use crate::error::DispatchError;
use crate::request::Request;
use crate::response::{HandlerResult, ModelView};

/// A handler method identified by its controller and position.
#[derive(Debug, Clone)]
pub struct MethodRef {
    controller: Arc<ControllerDescriptor>,
    index: usize,
}

impl MethodRef {
    pub fn new(controller: Arc<ControllerDescriptor>, index: usize) -> Option<Self> {
        (index < controller.methods.len()).then_some(Self { controller, index })
    }

    pub fn controller(&self) -> &ControllerDescriptor {
        &self.controller
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.controller.methods[self.index]
    }
}

/// Remembers the last form-rendering GET handler of a session so a failed
/// submission can re-render that form.
pub struct FormSession<'s> {
    session: &'s Session,
}

impl<'s> FormSession<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Stores the method and the instance it was invoked on.
    pub fn remember(&self, method: MethodRef, instance: Instance) {
        debug!(
            "Remembering form {}::{} for session {}",
            method.controller().name,
            method.method().name,
            self.session.id()
        );
        self.session.insert(keys::STORED_METHOD, method);
        self.session.insert_shared(keys::STORED_CONTROLLER, instance);
    }

    /// Both halves, or nothing.
    pub fn stored(&self) -> Option<(Arc<MethodRef>, Instance)> {
        let method = self.session.get::<MethodRef>(keys::STORED_METHOD)?;
        let instance = self.session.get_raw(keys::STORED_CONTROLLER)?;
        Some((method, instance))
    }

    pub fn forget(&self) {
        self.session.remove(keys::STORED_METHOD);
        self.session.remove(keys::STORED_CONTROLLER);
    }

    /// Re-invokes the remembered method to regenerate its view. Parameters
    /// are bound against an empty request.
    pub fn recover(&self, binder: &ParameterBinder) -> Result<ModelView, DispatchError> {
        let (method_ref, instance) = self
            .stored()
            .ok_or_else(|| DispatchError::illegal_state("No stored form method found"))?;
        let method = method_ref.method();

        let request = Request::get(method.url.unwrap_or("/"));
        let bound = binder.bind(&method.params, &request, self.session)?;
        let result = (method.invoker)(&*instance, Arguments::new(bound.arguments))?;

        match result {
            HandlerResult::View(view) => Ok(view),
            _ => Err(DispatchError::illegal_state(format!(
                "Stored form method {} did not return a view",
                method.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ReturnKind;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Form {
        renders: AtomicUsize,
    }

    fn factory(_: &Session) -> Result<Instance, DispatchError> {
        Ok(Arc::new(Form {
            renders: AtomicUsize::new(0),
        }))
    }

    fn show(instance: &(dyn Any + Send + Sync), _: Arguments) -> Result<HandlerResult, DispatchError> {
        let form = instance
            .downcast_ref::<Form>()
            .ok_or_else(|| DispatchError::internal("wrong instance"))?;
        let count = form.renders.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(HandlerResult::View(ModelView::new("signup.jsp").with("renders", count)))
    }

    fn text(_: &(dyn Any + Send + Sync), _: Arguments) -> Result<HandlerResult, DispatchError> {
        Ok(HandlerResult::Text("plain".into()))
    }

    fn descriptor() -> Arc<ControllerDescriptor> {
        Arc::new(
            ControllerDescriptor::new("Forms", "app", factory)
                .method(MethodDescriptor::new("show", ReturnKind::View, show).url("/signup"))
                .method(MethodDescriptor::new("text", ReturnKind::Text, text).url("/text")),
        )
    }

    #[test]
    fn test_recover_reinvokes_on_stored_instance() {
        let session = Session::detached("s");
        let controller = descriptor();
        let instance = controller.instantiate(&session).unwrap();
        let method = MethodRef::new(Arc::clone(&controller), 0).unwrap();

        session.form().remember(method, instance);
        let binder = ParameterBinder::default();
        let first = session.form().recover(&binder).unwrap();
        let second = session.form().recover(&binder).unwrap();
        assert_eq!(first.view(), "signup.jsp");
        assert_eq!(second.get("renders"), Some(&serde_json::Value::from(2)));
    }

    #[test]
    fn test_missing_half_means_no_form() {
        let session = Session::detached("s");
        let method = MethodRef::new(descriptor(), 0).unwrap();
        session.insert(keys::STORED_METHOD, method);

        assert!(session.form().stored().is_none());
        let err = session.form().recover(&ParameterBinder::default()).unwrap_err();
        assert!(matches!(err, DispatchError::IllegalState(ref m) if m == "No stored form method found"));
    }

    #[test]
    fn test_non_view_result_is_illegal_state() {
        let session = Session::detached("s");
        let controller = descriptor();
        let instance = controller.instantiate(&session).unwrap();
        session
            .form()
            .remember(MethodRef::new(controller, 1).unwrap(), instance);

        let err = session.form().recover(&ParameterBinder::default()).unwrap_err();
        assert!(matches!(err, DispatchError::IllegalState(_)));
    }

    #[test]
    fn test_method_ref_bounds() {
        assert!(MethodRef::new(descriptor(), 5).is_none());
    }
}
