//! axum adapter
//!
//! Exposes an [`Application`] as a fallback handler: every request is
//! converted into a [`Request`], tagged with a session id taken from the
//! `TRELLIS_SESSION` cookie (a fresh one is issued when absent) and handed
//! to [`Application::handle`].

use axum::{
    Form, Router,
    extract::{FromRequest, Multipart, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::signal;
use tracing::{error, info};
use uuid::Uuid;

use crate::application::Application;
use crate::error::DispatchError;
use crate::request::{Part, Request, RequestData};

pub const SESSION_COOKIE: &str = "TRELLIS_SESSION";

pub fn router(app: Arc<Application>) -> Router {
    Router::new().fallback(handle).with_state(app)
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
pub async fn serve(app: Arc<Application>, addr: impl ToSocketAddrs) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn handle(State(app): State<Arc<Application>>, request: axum::extract::Request) -> Response {
    let (session_id, issued) = match session_id(request.headers()) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    let mut response = match into_request(request).await {
        Ok(request) => app.handle(&request, &session_id),
        Err(error) => error.into_response(),
    };

    if issued {
        let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// The session id carried by the request's cookies, if any.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Reads method, URI, query string and form or multipart body.
pub async fn into_request(request: axum::extract::Request) -> Result<Request, DispatchError> {
    let method = request.method().clone();
    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let headers = request.headers().clone();

    let mut params = RequestData::new();
    if let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(request.uri()) {
        for (name, value) in pairs {
            params.insert(name, value);
        }
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let mut parts = Vec::new();
    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| DispatchError::invalid_argument(e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| DispatchError::invalid_argument(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let part_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| DispatchError::invalid_argument(e.body_text()))?;

            if file_name.is_none() && part_type.is_none() {
                params.insert(name, String::from_utf8_lossy(&bytes).into_owned());
            } else {
                parts.push(Part {
                    name,
                    file_name,
                    content_type: part_type,
                    content_disposition: None,
                    bytes,
                });
            }
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(|e| DispatchError::invalid_argument(e.body_text()))?;
        for (name, value) in pairs {
            params.insert(name, value);
        }
    }

    Ok(Request {
        method,
        uri,
        params,
        parts,
        headers,
    })
}

/// Completes when Ctrl+C or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
