//! Handler results and renderers.

mod render;

pub use render::{FileRenderer, ForwardViewRenderer, JsonRenderer, Renderers, ViewRenderer, FORWARD_VIEW_HEADER};

use axum::body::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::DispatchError;

/// A view identifier plus the data bag forwarded to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelView {
    view: String,
    data: BTreeMap<String, Value>,
}

impl ModelView {
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            data: BTreeMap::new(),
        }
    }

    /// Builder form of [`ModelView::add`].
    pub fn with<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        self.add(key, value);
        self
    }

    /// Adds a value to the data bag. Values that fail to serialize are
    /// dropped with a warning.
    pub fn add<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key, value);
            }
            Err(e) => warn!("Dropping view data `{}`: {}", key, e),
        }
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn into_data(self) -> BTreeMap<String, Value> {
        self.data
    }
}

/// A downloadable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExport {
    bytes: Bytes,
    content_type: String,
    filename: String,
}

impl FileExport {
    pub fn new(
        bytes: impl Into<Bytes>,
        content_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<Self, DispatchError> {
        let content_type = content_type.into();
        let filename = filename.into();
        if content_type.trim().is_empty() {
            return Err(DispatchError::invalid_argument("Content type cannot be empty"));
        }
        if filename.trim().is_empty() {
            return Err(DispatchError::invalid_argument("Filename cannot be empty"));
        }
        Ok(Self {
            bytes: bytes.into(),
            content_type,
            filename,
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What a handler invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    View(ModelView),
    Text(String),
    File(FileExport),
    Json(Value),
}

impl HandlerResult {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, DispatchError> {
        serde_json::to_value(value)
            .map(HandlerResult::Json)
            .map_err(|e| DispatchError::internal(format!("failed to serialize result: {e}")))
    }

    pub fn into_view(self) -> Option<ModelView> {
        match self {
            HandlerResult::View(view) => Some(view),
            _ => None,
        }
    }
}

/// The renderer-facing outcome of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    View(ModelView),
    Json(Value),
    File(FileExport),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_view_data() {
        let view = ModelView::new("signup.jsp")
            .with("title", "Sign up")
            .with("count", 3);
        assert_eq!(view.view(), "signup.jsp");
        assert_eq!(view.get("title"), Some(&Value::from("Sign up")));
        assert_eq!(view.data().len(), 2);
    }

    #[test]
    fn test_file_export_requires_type_and_name() {
        assert!(FileExport::new(vec![1u8], "", "a.bin").is_err());
        assert!(FileExport::new(vec![1u8], "application/pdf", " ").is_err());
        let export = FileExport::new(vec![1u8, 2, 3], "application/pdf", "report.pdf").unwrap();
        assert_eq!(export.len(), 3);
    }
}
