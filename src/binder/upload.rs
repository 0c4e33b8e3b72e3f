use axum::body::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::request::Part;

/// An uploaded file bound from a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    field_name: String,
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

impl FileUpload {
    /// `None` for parts without a content type; those are not files.
    pub fn from_part(part: &Part) -> Option<Self> {
        let content_type = part.content_type.as_deref().filter(|t| !t.is_empty())?;
        Some(Self {
            field_name: part.name.clone(),
            file_name: part.file_name().unwrap_or_default(),
            content_type: content_type.to_string(),
            bytes: part.bytes.clone(),
        })
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Writes the upload under its original file name inside `dir` and
    /// returns the written path. Directory components of the submitted name
    /// are dropped.
    pub fn save_to_directory(&self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        let name = Path::new(&self.file_name)
            .file_name()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("upload `{}` has no usable file name", self.field_name),
                )
            })?;

        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        fs::write(&path, &self.bytes)?;
        tracing::debug!("Saved upload {} ({} bytes) to {}", self.field_name, self.size(), path.display());
        Ok(path)
    }
}
