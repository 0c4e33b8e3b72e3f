use axum::{
    Json,
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use super::{FileExport, ModelView, Reply};
use crate::error::DispatchError;

/// Header naming the view a [`ForwardViewRenderer`] response is meant for.
pub const FORWARD_VIEW_HEADER: &str = "x-forward-view";

/// Renders view results. Hosting environments plug their templating in here.
pub trait ViewRenderer: Send + Sync + 'static {
    fn render(&self, view: &ModelView) -> Result<Response, DispatchError>;

    fn render_text(&self, text: &str) -> Result<Response, DispatchError> {
        Ok(Html(text.to_string()).into_response())
    }
}

/// Forwards the view: names it in a header and sends the data bag as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardViewRenderer;

impl ViewRenderer for ForwardViewRenderer {
    fn render(&self, view: &ModelView) -> Result<Response, DispatchError> {
        let header_value = HeaderValue::from_str(view.view()).map_err(|e| {
            DispatchError::internal(format!("view name `{}` is not a valid header: {e}", view.view()))
        })?;
        let mut response = Json(view.data()).into_response();
        response
            .headers_mut()
            .insert(FORWARD_VIEW_HEADER, header_value);
        Ok(response)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl JsonRenderer {
    pub fn render(&self, value: &serde_json::Value) -> Response {
        Json(value).into_response()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileRenderer;

impl FileRenderer {
    pub fn render(&self, file: &FileExport) -> Result<Response, DispatchError> {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            file.filename().replace('"', "")
        );
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, file.content_type())
            .header(header::CONTENT_LENGTH, file.len())
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(Body::from(file.bytes().clone()))
            .map_err(|e| DispatchError::internal(format!("failed to build file response: {e}")))
    }
}

/// Routes a [`Reply`] to the matching renderer.
#[derive(Clone)]
pub struct Renderers {
    view: Arc<dyn ViewRenderer>,
    json: JsonRenderer,
    file: FileRenderer,
}

impl Default for Renderers {
    fn default() -> Self {
        Self::new(Arc::new(ForwardViewRenderer))
    }
}

impl Renderers {
    pub fn new(view: Arc<dyn ViewRenderer>) -> Self {
        Self {
            view,
            json: JsonRenderer,
            file: FileRenderer,
        }
    }

    pub fn render(&self, reply: &Reply) -> Result<Response, DispatchError> {
        match reply {
            Reply::View(view) => self.view.render(view),
            Reply::Text(text) => self.view.render_text(text),
            Reply::Json(value) => Ok(self.json.render(value)),
            Reply::File(file) => self.file.render(file),
        }
    }
}
