use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    #[error("Failed to decode document {document_id}: {reason}")]
    Decode { document_id: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// One rasterized page. `data` is opaque to the pipeline; only the
/// preprocessor and OCR engine interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PageImage {
    #[must_use]
    pub const fn new(page_number: u32, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            page_number,
            width,
            height,
            data,
        }
    }
}

/// Resolves a document identifier to its ordered page images.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn pages(&self, document_id: &str) -> SourceResult<Vec<PageImage>>;
}

/// Page source backed by documents registered in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPageSource {
    documents: HashMap<String, Vec<PageImage>>,
}

impl InMemoryPageSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(mut self, document_id: &str, pages: Vec<PageImage>) -> Self {
        self.add_document(document_id, pages);
        self
    }

    pub fn add_document(&mut self, document_id: &str, pages: Vec<PageImage>) {
        self.documents.insert(document_id.to_string(), pages);
    }
}

#[async_trait::async_trait]
impl PageSource for InMemoryPageSource {
    async fn pages(&self, document_id: &str) -> SourceResult<Vec<PageImage>> {
        self.documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| SourceError::DocumentNotFound(document_id.to_string()))
    }
}
