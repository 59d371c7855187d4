use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::document::DocumentRecord;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Persists a finished document record.
#[async_trait::async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, record: &DocumentRecord) -> ExportResult<()>;
}

/// For callers that persist the returned record themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExporter;

#[async_trait::async_trait]
impl Exporter for NoopExporter {
    async fn export(&self, _record: &DocumentRecord) -> ExportResult<()> {
        Ok(())
    }
}

/// Writes `<dir>/<document_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, document_id: &str) -> PathBuf {
        let file_stem: String = document_id
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.dir.join(format!("{file_stem}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl Exporter for JsonExporter {
    async fn export(&self, record: &DocumentRecord) -> ExportResult<()> {
        let path = self.path_for(&record.document_id);
        let json = serde_json::to_vec_pretty(record)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ExportError::Write {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| ExportError::Write {
                path: path.clone(),
                source,
            })?;

        tracing::info!(document_id = %record.document_id, path = %path.display(), "Exported document record");
        Ok(())
    }
}
