//! # Trellis Testing
//!
//! Drives an [`Application`] in-process, without a socket. Every request
//! sent through one [`TestClient`] shares the same session, so form retry
//! and authentication flows can be exercised end to end.
//!
//! ```rust,ignore
//! let client = TestClient::new(app);
//! client.session().authenticate(Some("admin"));
//!
//! let response = client.post("/signup").param("username", "ab").send().await;
//! assert_eq!(response.view(), Some("signup.jsp"));
//! ```

use axum::body::{Bytes, to_bytes};
use axum::extract::Query;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;

use trellis::request::{Part, Request, RequestBuilder};
use trellis::response::FORWARD_VIEW_HEADER;
use trellis::{Application, Session};

/// In-process client bound to one session.
#[derive(Clone)]
pub struct TestClient {
    app: Arc<Application>,
    session_id: String,
}

impl TestClient {
    pub fn new(app: Application) -> Self {
        Self::shared(Arc::new(app))
    }

    /// A client with a fresh session on an application shared with others.
    pub fn shared(app: Arc<Application>) -> Self {
        Self {
            app,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Handle on this client's session, e.g. to log a user in.
    pub fn session(&self) -> Session {
        self.app.session(&self.session_id)
    }

    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        self.request(Method::GET, uri)
    }

    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        self.request(Method::POST, uri)
    }

    pub fn put(&self, uri: &str) -> TestRequest<'_> {
        self.request(Method::PUT, uri)
    }

    pub fn delete(&self, uri: &str) -> TestRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a request. Query string parameters are decoded into request
    /// parameters, as the axum adapter does.
    pub fn request(&self, method: Method, uri: &str) -> TestRequest<'_> {
        let mut builder = Request::builder(method, uri);
        if let Ok(parsed) = uri.parse::<Uri>() {
            if let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(&parsed) {
                for (name, value) in pairs {
                    builder = builder.param(name, value);
                }
            }
        }
        TestRequest {
            client: self,
            builder,
        }
    }

    /// Sends a prepared request in this client's session.
    pub async fn send(&self, request: Request) -> TestResponse {
        let response = self.app.handle(&request, &self.session_id);
        TestResponse::from_response(response).await
    }
}

/// A request under construction.
pub struct TestRequest<'c> {
    client: &'c TestClient,
    builder: RequestBuilder,
}

impl TestRequest<'_> {
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.param(name, value);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Attaches an uploaded file part.
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.builder = self.builder.part(
            Part::new(name, Bytes::copy_from_slice(bytes))
                .with_file_name(file_name)
                .with_content_type(content_type),
        );
        self
    }

    pub fn part(mut self, part: Part) -> Self {
        self.builder = self.builder.part(part);
        self
    }

    /// Marks the request as an XMLHttpRequest.
    pub fn ajax(self) -> Self {
        self.header("x-requested-with", "XMLHttpRequest")
    }

    pub async fn send(self) -> TestResponse {
        self.client.send(self.builder.build()).await
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    pub async fn from_response(response: axum::response::Response) -> Self {
        let (parts, body) = response.into_parts();
        // A body that fails mid-stream is reported as empty
        let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The view a forwarded response is meant for.
    pub fn view(&self) -> Option<&str> {
        self.header(FORWARD_VIEW_HEADER)
    }

    pub fn location(&self) -> Option<&str> {
        self.header(header::LOCATION.as_str())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
