//! Per-request dispatch pipeline.
//!
//! resolve route → check verb → instantiate → remember GET form → check
//! access → bind and validate → invoke → pick a renderer.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::binder::{BoundArguments, ParameterBinder};
use crate::config::FrameworkConfig;
use crate::controller::Arguments;
use crate::error::DispatchError;
use crate::guard::AccessGate;
use crate::request::Request;
use crate::response::{HandlerResult, ModelView, Reply};
use crate::routing::{RouteEntry, RouteTable, VerbAction};
use crate::session::{MethodRef, Session, keys};
use crate::validation::ValidationFailure;

/// Everything resolved for one request before the handler runs.
pub struct InvocationContext<'r> {
    pub url: String,
    pub entry: &'r RouteEntry,
    pub action: &'r VerbAction,
    pub request: &'r Request,
    pub session: &'r Session,
    pub handler: MethodRef,
}

pub struct Dispatcher {
    table: Arc<RouteTable>,
    binder: ParameterBinder,
    gate: AccessGate,
    config: FrameworkConfig,
}

impl Dispatcher {
    pub fn new(table: Arc<RouteTable>, binder: ParameterBinder, config: FrameworkConfig) -> Self {
        Self {
            table,
            binder,
            gate: AccessGate,
            config,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    pub fn binder(&self) -> &ParameterBinder {
        &self.binder
    }

    /// Finds the route entry and the verb action for `request`.
    pub fn resolve<'r>(
        &'r self,
        request: &'r Request,
        session: &'r Session,
    ) -> Result<InvocationContext<'r>, DispatchError> {
        let url = self
            .config
            .normalize(&request.uri)
            .ok_or_else(|| DispatchError::RouteNotFound {
                url: request.path().to_string(),
            })?;

        let entry = self
            .table
            .get(&url)
            .ok_or_else(|| DispatchError::RouteNotFound { url: url.clone() })?;

        let verb = request.method.as_str();
        let action = entry
            .action_for(verb)
            .ok_or_else(|| DispatchError::MethodNotAllowed {
                verb: verb.to_string(),
                url: url.clone(),
                allowed: entry.verbs(),
            })?;

        let controller = self.table.controller(entry.controller()).ok_or_else(|| {
            DispatchError::internal(format!("controller {} is not registered", entry.controller()))
        })?;
        let handler = controller
            .method_index(action.method())
            .and_then(|index| MethodRef::new(Arc::clone(controller), index))
            .ok_or_else(|| {
                DispatchError::internal(format!(
                    "method {} not found on {}",
                    action.method(),
                    entry.controller()
                ))
            })?;

        Ok(InvocationContext {
            url,
            entry,
            action,
            request,
            session,
            handler,
        })
    }

    pub fn dispatch(&self, request: &Request, session: &Session) -> Result<Reply, DispatchError> {
        let context = self.resolve(request, session)?;
        let controller = context.handler.controller();
        let method = context.handler.method();
        debug!(
            "{} {} => {}::{}",
            context.action.verb(),
            context.url,
            controller.name,
            method.name
        );

        let instance = controller.instantiate(session)?;

        if let Err(denied) = self.gate.check(
            controller.authorization.as_ref(),
            method.authorization.as_ref(),
            session,
        ) {
            warn!("Access to {} denied: {}", context.url, denied);
            let view = ModelView::new(self.config.unauthenticated_view())
                .with("message", "User not authenticated");
            return Ok(Reply::View(view));
        }

        // Only a form the caller was allowed to see is remembered
        if context.action.matches("GET") {
            session
                .form()
                .remember(context.handler.clone(), Arc::clone(&instance));
        }

        let bound = self.binder.bind(&method.params, request, session)?;
        if !bound.validation.is_valid() {
            warn!(
                "Validation failed for {} with {} error(s)",
                context.url,
                bound.validation.error_count()
            );
            return self.recover_form(session, bound).map(Reply::View);
        }

        let result = (method.invoker)(&*instance, Arguments::new(bound.arguments))?;
        Ok(route_result(result, method.rest))
    }

    /// Re-renders the session's stored form with the submitted values and
    /// the combined field errors attached.
    fn recover_form(
        &self,
        session: &Session,
        bound: BoundArguments,
    ) -> Result<ModelView, DispatchError> {
        // The session may have lost its role since the form was stored
        if let Some((stored, _)) = session.form().stored() {
            if let Err(denied) = self.gate.check(
                stored.controller().authorization.as_ref(),
                stored.method().authorization.as_ref(),
                session,
            ) {
                warn!(
                    "Stored form {}::{} no longer accessible: {}",
                    stored.controller().name,
                    stored.method().name,
                    denied
                );
                session.form().forget();
                return Err(ValidationFailure::new(bound.validation).into());
            }
        }

        match session.form().recover(&self.binder) {
            Ok(mut view) => {
                view.add(keys::VALIDATION_ERRORS, bound.validation.errors());
                for (name, value) in bound.models {
                    view.insert_value(name, value);
                }
                Ok(view)
            }
            Err(DispatchError::IllegalState(reason)) => {
                debug!("No form to recover: {}", reason);
                Err(ValidationFailure::new(bound.validation).into())
            }
            Err(other) => Err(other),
        }
    }
}

/// File results go to the file renderer, `#[rest]` methods to JSON, and
/// everything else to the view renderer.
fn route_result(result: HandlerResult, rest: bool) -> Reply {
    match (result, rest) {
        (HandlerResult::File(file), _) => Reply::File(file),
        (HandlerResult::Json(value), _) => Reply::Json(value),
        (HandlerResult::View(view), true) => {
            Reply::Json(Value::Object(view.into_data().into_iter().collect()))
        }
        (HandlerResult::Text(text), true) => Reply::Json(Value::String(text)),
        (HandlerResult::View(view), false) => Reply::View(view),
        (HandlerResult::Text(text), false) => Reply::Text(text),
    }
}
