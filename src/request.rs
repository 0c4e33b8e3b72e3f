//! Transport-neutral view of an inbound request.
//!
//! The HTTP adapter in [`crate::server`] builds a [`Request`] from an axum
//! request; tests build one directly with [`Request::builder`].

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use std::collections::HashMap;

/// Named request parameters. A name may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestData {
    values: HashMap<String, Vec<String>>,
}

impl RequestData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    /// First value submitted under `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// True when any parameter is named `prefix.<something>`.
    pub fn has_nested(&self, prefix: &str) -> bool {
        let dotted = format!("{prefix}.");
        self.values.keys().any(|key| key.starts_with(&dotted))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = RequestData::new();
        for (name, value) in iter {
            data.insert(name, value);
        }
        data
    }
}

/// One multipart part.
#[derive(Debug, Clone, Default)]
pub struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub bytes: Bytes,
}

impl Part {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            ..Default::default()
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.content_disposition = Some(disposition.into());
        self
    }

    /// The submitted file name, falling back to the `filename` token of the
    /// content disposition.
    pub fn file_name(&self) -> Option<String> {
        if let Some(name) = self.file_name.as_ref().filter(|n| !n.is_empty()) {
            return Some(name.clone());
        }
        self.content_disposition
            .as_deref()?
            .split(';')
            .map(str::trim)
            .find_map(|token| token.strip_prefix("filename="))
            .map(|name| name.trim_matches('"').to_string())
            .filter(|name| !name.is_empty())
    }

    pub fn has_content_type(&self) -> bool {
        self.content_type.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// An inbound request as the dispatcher sees it.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    pub params: RequestData,
    pub parts: Vec<Part>,
    pub headers: HeaderMap,
}

impl Request {
    pub fn builder(method: Method, uri: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            request: Request {
                method,
                uri: uri.into(),
                params: RequestData::new(),
                parts: Vec::new(),
                headers: HeaderMap::new(),
            },
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::builder(Method::GET, uri).build()
    }

    /// The URI without query string or fragment.
    pub fn path(&self) -> &str {
        self.uri.split(['?', '#']).next().unwrap_or_default()
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|part| part.name == name)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    pub fn referer(&self) -> Option<&str> {
        self.header("referer").filter(|r| !r.is_empty())
    }

    /// The referrer when it points back into this site: either a
    /// root-relative path or an absolute URL whose authority matches the
    /// `Host` header.
    pub fn local_referer(&self) -> Option<&str> {
        let referer = self.referer()?;
        if referer.starts_with('/') {
            return (!referer.starts_with("//") && !referer.starts_with("/\\")).then_some(referer);
        }
        let uri = referer.parse::<Uri>().ok()?;
        let authority = uri.authority()?;
        let host = self.header("host")?;
        authority
            .as_str()
            .eq_ignore_ascii_case(host)
            .then_some(referer)
    }
}

pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.params.insert(name, value);
        self
    }

    pub fn params(mut self, params: RequestData) -> Self {
        self.request.params = params;
        self
    }

    pub fn part(mut self, part: Part) -> Self {
        self.request.parts.push(part);
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.request.headers.append(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.request.headers = headers;
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}
