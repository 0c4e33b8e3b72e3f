use crate::error::DispatchError;
use crate::exception::{ArgumentsHost, ExceptionFilter};
use crate::session::keys;
use axum::response::{IntoResponse, Redirect, Response};

/// A default exception filter that handles common errors
///
/// Validation failures on regular form posts are kept in the session and
/// the browser is sent back to the page it came from; AJAX calls and
/// requests without a same-site referrer get the JSON error payload instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpExceptionFilter;

impl ExceptionFilter for HttpExceptionFilter {
    fn catch(&self, error: DispatchError, host: &ArgumentsHost<'_>) -> Response {
        match &error {
            DispatchError::Validation(failure) => {
                let referer = host.request.local_referer();
                if let (false, Some(referer)) = (host.request.is_ajax(), referer) {
                    tracing::debug!(
                        "Redirecting to {} with {} validation error(s)",
                        referer,
                        failure.error_count()
                    );
                    host.session
                        .insert(keys::VALIDATION_ERRORS, failure.to_json()["errors"].clone());
                    return Redirect::to(referer).into_response();
                }
                tracing::warn!("Validation failed: {}", failure.message());
            }
            DispatchError::IllegalState(_) | DispatchError::Internal(_) => {
                tracing::error!("Request {} failed: {}", host.request.uri, error);
            }
            _ => tracing::debug!("Request {} rejected: {}", host.request.uri, error),
        }

        error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::session::Session;
    use crate::validation::{ValidationFailure, ValidationResult};
    use axum::http::{Method, StatusCode, header};
    use serde_json::Value;

    fn failure() -> DispatchError {
        let mut result = ValidationResult::new();
        result.add_error("name", "Size must be at least 3");
        ValidationFailure::new(result).into()
    }

    #[test]
    fn test_form_post_redirects_to_referer() {
        let session = Session::detached("s");
        let request = Request::builder(Method::POST, "/shop/signup")
            .header("Referer", "/shop/signup")
            .build();
        let response = HttpExceptionFilter.catch(failure(), &ArgumentsHost::new(&request, &session));

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/shop/signup");
        let stored = session.get::<Value>(keys::VALIDATION_ERRORS).unwrap();
        assert_eq!(stored["name"][0], "Size must be at least 3");
    }

    #[test]
    fn test_ajax_gets_json() {
        let session = Session::detached("s");
        let request = Request::builder(Method::POST, "/shop/signup")
            .header("Referer", "/shop/signup")
            .header("X-Requested-With", "XMLHttpRequest")
            .build();
        let response = HttpExceptionFilter.catch(failure(), &ArgumentsHost::new(&request, &session));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!session.contains(keys::VALIDATION_ERRORS));
    }

    #[test]
    fn test_foreign_referer_is_not_followed() {
        let session = Session::detached("s");
        let request = Request::builder(Method::POST, "/shop/signup")
            .header("Host", "shop.example.com")
            .header("Referer", "https://evil.example.net/login")
            .build();
        let response = HttpExceptionFilter.catch(failure(), &ArgumentsHost::new(&request, &session));

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::LOCATION).is_none());
        assert!(!session.contains(keys::VALIDATION_ERRORS));
    }

    #[test]
    fn test_internal_errors_are_500() {
        let session = Session::detached("s");
        let request = Request::get("/shop/x");
        let response = HttpExceptionFilter.catch(
            DispatchError::internal("db down"),
            &ArgumentsHost::new(&request, &session),
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
