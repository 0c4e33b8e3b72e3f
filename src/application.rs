//! Application Bootstrap
//!
//! Collects configuration and controller declarations, scans them once
//! into a frozen route table and serves requests through the dispatcher,
//! the renderers and the exception filter.

use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span};

use crate::binder::ParameterBinder;
use crate::config::FrameworkConfig;
use crate::controller::{Controller, HandlerMarker};
use crate::dispatcher::Dispatcher;
use crate::error::{BuildError, DispatchError};
use crate::exception::{ArgumentsHost, ExceptionFilter, HttpExceptionFilter};
use crate::module::Module;
use crate::request::Request;
use crate::response::{ForwardViewRenderer, Renderers, Reply, ViewRenderer};
use crate::routing::{Catalog, RouteTable, Scanner};
use crate::session::{MemorySessionStore, Session, SessionStore};
use crate::validation::{ConstraintValidator, ValidationEngine};

/// A fully scanned application, ready to serve requests.
///
/// # Example
///
/// ```rust,ignore
/// use trellis::{Application, FrameworkConfig};
///
/// let app = Application::builder()
///     .config(FrameworkConfig::new("shop::controllers", "/shop")?)
///     .module::<ShopModule>()
///     .build()?;
///
/// trellis::server::serve(Arc::new(app), "0.0.0.0:3000").await?;
/// ```
pub struct Application {
    dispatcher: Dispatcher,
    renderers: Renderers,
    filter: Arc<dyn ExceptionFilter>,
    sessions: Arc<dyn SessionStore>,
}

impl Application {
    /// Create a new application builder
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn config(&self) -> &FrameworkConfig {
        self.dispatcher.config()
    }

    pub fn routes(&self) -> &RouteTable {
        self.dispatcher.table()
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Handle on the session with the given id.
    pub fn session(&self, session_id: &str) -> Session {
        Session::new(session_id, Arc::clone(&self.sessions))
    }

    /// Runs the dispatch pipeline without rendering.
    pub fn dispatch(&self, request: &Request, session: &Session) -> Result<Reply, DispatchError> {
        self.dispatcher.dispatch(request, session)
    }

    /// Dispatches, renders, and maps any failure through the exception
    /// filter.
    pub fn handle(&self, request: &Request, session_id: &str) -> Response {
        let span = info_span!("request", method = %request.method, uri = %request.uri);
        let _guard = span.enter();
        let started = Instant::now();

        let session = self.session(session_id);
        let outcome = self
            .dispatcher
            .dispatch(request, &session)
            .and_then(|reply| self.renderers.render(&reply));

        let response = match outcome {
            Ok(response) => response,
            Err(error) => self
                .filter
                .catch(error, &ArgumentsHost::new(request, &session)),
        };

        debug!(
            "Completed with {} in {:?}",
            response.status(),
            started.elapsed()
        );
        response
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    config: Option<FrameworkConfig>,
    catalog: Catalog,
    marker: HandlerMarker,
    sessions: Option<Arc<dyn SessionStore>>,
    validation: ValidationEngine,
    view_renderer: Option<Arc<dyn ViewRenderer>>,
    exception_filter: Option<Arc<dyn ExceptionFilter>>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    /// Create a new application builder
    pub fn new() -> Self {
        Self {
            config: None,
            catalog: Catalog::new(),
            marker: HandlerMarker::CONTROLLER,
            sessions: None,
            validation: ValidationEngine::new(),
            view_renderer: None,
            exception_filter: None,
        }
    }

    /// Set the configuration. Without one, `build` reads the environment.
    pub fn config(mut self, config: FrameworkConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register every controller of a module
    pub fn module<M: Module>(mut self) -> Self {
        self.catalog.import::<M>();
        self
    }

    /// Register a single controller
    pub fn controller<C: Controller>(mut self) -> Self {
        self.catalog.add::<C>();
        self
    }

    /// Replace the catalog wholesale
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Only scan declarations carrying this marker
    pub fn marker(mut self, marker: HandlerMarker) -> Self {
        self.marker = marker;
        self
    }

    pub fn session_store<S: SessionStore>(mut self, store: S) -> Self {
        self.sessions = Some(Arc::new(store));
        self
    }

    pub fn shared_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Register a constraint validator under `kind`
    pub fn validator<V: ConstraintValidator>(mut self, kind: &'static str, validator: V) -> Self {
        self.validation = self.validation.register(kind, validator);
        self
    }

    pub fn view_renderer<R: ViewRenderer>(mut self, renderer: R) -> Self {
        self.view_renderer = Some(Arc::new(renderer));
        self
    }

    pub fn exception_filter<F: ExceptionFilter>(mut self, filter: F) -> Self {
        self.exception_filter = Some(Arc::new(filter));
        self
    }

    /// Scan the catalog and freeze the route table
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is missing, no controller lives
    /// under the configured namespace, or a handler cannot be mapped.
    pub fn build(self) -> Result<Application, BuildError> {
        let config = match self.config {
            Some(config) => config,
            None => FrameworkConfig::from_env()?,
        };

        info!(
            "Starting application initialization (namespace {}, base path {})",
            config.base_namespace(),
            config.base_path()
        );

        let table = Scanner::new(self.marker).scan(&self.catalog, config.base_namespace())?;
        let binder = ParameterBinder::new(Arc::new(self.validation));
        let renderers = Renderers::new(
            self.view_renderer
                .unwrap_or_else(|| Arc::new(ForwardViewRenderer)),
        );

        info!("Application initialization complete");

        Ok(Application {
            dispatcher: Dispatcher::new(Arc::new(table), binder, config),
            renderers,
            filter: self
                .exception_filter
                .unwrap_or_else(|| Arc::new(HttpExceptionFilter)),
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
        })
    }
}
