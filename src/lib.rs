//! # Trellis
//!
//! A small MVC dispatch framework on top of axum.
//!
//! Controllers declare handler methods with attributes; at startup the
//! scanner turns those declarations into a route table. Each request is then
//! resolved to one handler, its parameters are bound from request data and
//! the session, composite parameters are validated, authorization is
//! checked, and the handler result is rendered as a forwarded view, JSON or
//! a file download.
//!
//! ## Features
//!
//! - **Declarative routing**: `#[controller]` + `#[routes]` with per-method `#[url]` and verb markers
//! - **Typed binding**: scalars, nested models, foreign-key entities, file uploads, session handles
//! - **Validation**: constraint attributes on model fields, with a pluggable validator registry
//! - **Form retry**: a failed POST re-renders the last GET form with errors and submitted values
//! - **Access control**: controller- and method-level `auth` declarations with optional roles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! #[derive(Debug, Default, Serialize, Model)]
//! #[valid]
//! pub struct Signup {
//!     #[size(min = 3, max = 20)]
//!     pub username: String,
//! }
//!
//! #[controller]
//! pub struct SignupController;
//!
//! #[routes]
//! impl SignupController {
//!     #[url("/signup")]
//!     #[get]
//!     fn show_form(&self) -> ModelView {
//!         ModelView::new("signup.jsp")
//!     }
//!
//!     #[url("/signup")]
//!     #[post]
//!     fn submit(&self, #[model_attribute("user")] user: Signup) -> ModelView {
//!         ModelView::new("welcome.jsp").with("name", user.username)
//!     }
//! }
//!
//! #[module(controllers = [SignupController])]
//! pub struct AppModule;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Application::builder()
//!         .config(FrameworkConfig::new(module_path!(), "/")?)
//!         .module::<AppModule>()
//!         .build()?;
//!
//!     trellis::server::serve(std::sync::Arc::new(app), "0.0.0.0:3000").await?;
//!     Ok(())
//! }
//! ```

extern crate self as trellis;

pub mod application;
pub mod binder;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod exception;
pub mod guard;
pub mod module;
pub mod request;
pub mod response;
pub mod routing;
pub mod server;
pub mod session;
pub mod validation;

// Re-export macros
pub use trellis_macro::{
    Entity, Model, auth, controller, delete, get, module, patch, post, put, rest, routes, url,
};

// Re-export core types
pub use application::{Application, ApplicationBuilder};
pub use binder::{Entity, FileUpload, Model};
pub use config::{ConfigService, FrameworkConfig};
pub use controller::{Controller, ControllerType, HandlerMarker};
pub use error::{BindingError, BuildError, DispatchError, Result};
pub use module::Module;
pub use request::{Part, Request, RequestData};
pub use response::{FileExport, HandlerResult, ModelView, Reply};
pub use session::Session;
pub use validation::{ValidationFailure, ValidationResult};

// Re-export common dependencies used by generated code
pub use chrono;
pub use serde;
pub use serde_json;

pub mod prelude {
    pub use crate::{
        Application, Controller, ControllerType, DispatchError, Entity, FileExport, FileUpload,
        FrameworkConfig, HandlerResult, Model, ModelView, Module, Session, auth, controller,
        delete, get, module, patch, post, put, rest, routes, url,
    };
    pub use serde::{Deserialize, Serialize};
}
