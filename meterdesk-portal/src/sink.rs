use std::path::PathBuf;

use async_trait::async_trait;
use jiff::civil::Date;
use meterdesk_client::BinaryPayload;
use meterdesk_core::{ErrorCategory, PortalError};
use thiserror::Error;
use tracing::info;

use crate::export::ExportKind;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<SinkError> for PortalError {
    fn from(_: SinkError) -> Self {
        PortalError {
            title: "Download failed".to_string(),
            message: "The document was received but could not be saved.".to_string(),
            category: ErrorCategory::Unknown,
        }
    }
}

/// A downloaded export, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub kind: ExportKind,
    /// Building id, or `all` for portfolio-wide exports.
    pub discriminator: String,
    pub date: Date,
    pub payload: BinaryPayload,
}

impl Document {
    /// `<kind>_<discriminator>_<date>.<ext>`
    pub fn file_name(&self) -> String {
        let extension = self
            .payload
            .content_type
            .as_deref()
            .and_then(extension_for)
            .unwrap_or(self.kind.default_extension());
        let discriminator: String = self
            .discriminator
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        format!(
            "{}_{}_{}.{}",
            self.kind.file_stem(),
            discriminator,
            self.date,
            extension
        )
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => Some("pdf"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "application/vnd.ms-excel" => Some("xls"),
        "text/csv" => Some("csv"),
        "application/zip" => Some("zip"),
        _ => None,
    }
}

/// Where downloaded exports end up.
#[async_trait]
pub trait DownloadSink: Send + Sync + 'static {
    /// Saves the document and returns where it went.
    async fn save(&self, document: Document) -> Result<PathBuf, SinkError>;
}

/// Writes documents into one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &PathBuf {
        &self.directory
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn save(&self, document: Document) -> Result<PathBuf, SinkError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| SinkError::Io {
                path: self.directory.clone(),
                source,
            })?;

        let path = self.directory.join(document.file_name());
        tokio::fs::write(&path, &document.payload.bytes)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), size = document.payload.bytes.len(), "saved export");
        Ok(path)
    }
}
