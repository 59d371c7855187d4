use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::PageImage;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Preprocessing failed: {0}")]
    Preprocess(String),
    #[error("Recognition failed: {0}")]
    Recognition(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OcrResult<T> = Result<T, OcrError>;

/// A recognized text region. `bbox` is `[x0, y0, x1, y1]` in page pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrBlock {
    pub bbox: [f64; 4],
    pub text: String,
    pub confidence: f64,
}

impl OcrBlock {
    #[must_use]
    pub fn new(bbox: [f64; 4], text: &str, confidence: f64) -> Self {
        Self {
            bbox,
            text: text.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    pub blocks: Vec<OcrBlock>,
}

impl OcrOutput {
    #[must_use]
    pub fn new(text: String, blocks: Vec<OcrBlock>) -> Self {
        Self { text, blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.blocks.is_empty()
    }
}

/// Optical character recognition over one page image.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &PageImage) -> OcrResult<OcrOutput>;
}

/// Image cleanup run before recognition (deskew, binarization, scaling).
#[async_trait::async_trait]
pub trait Preprocessor: Send + Sync {
    async fn preprocess(&self, image: &PageImage) -> OcrResult<PageImage>;
}

/// Hands the page image to OCR unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPreprocessor;

#[async_trait::async_trait]
impl Preprocessor for PassthroughPreprocessor {
    async fn preprocess(&self, image: &PageImage) -> OcrResult<PageImage> {
        Ok(image.clone())
    }
}
