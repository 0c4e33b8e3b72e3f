use axum::response::Response;

use crate::error::DispatchError;
use crate::request::Request;
use crate::session::Session;

pub mod http;

pub use http::HttpExceptionFilter;

/// Context for exception handling
pub struct ArgumentsHost<'a> {
    pub request: &'a Request,
    pub session: &'a Session,
}

impl<'a> ArgumentsHost<'a> {
    pub fn new(request: &'a Request, session: &'a Session) -> Self {
        Self { request, session }
    }
}

/// The ExceptionFilter trait
///
/// Filters turn errors raised while dispatching or rendering a request into
/// a response. They must return a valid Response.
pub trait ExceptionFilter: Send + Sync + 'static {
    fn catch(&self, error: DispatchError, host: &ArgumentsHost<'_>) -> Response;
}
