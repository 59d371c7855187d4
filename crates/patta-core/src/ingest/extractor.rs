use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::entity::{EntityLabel, ExtractionMethod, Provenance, RawEntity};
use crate::ocr::OcrBlock;
use super::rules::RuleSet;

pub const MODEL_PLACEHOLDER_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction failed: {0}")]
    Failed(String),
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Recognized content of one page, as handed to an [`Extractor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
    pub blocks: Vec<OcrBlock>,
}

impl PageText {
    #[must_use]
    pub const fn new(page: u32, text: String, blocks: Vec<OcrBlock>) -> Self {
        Self { page, text, blocks }
    }

    /// The page text, or the block texts joined by newlines when the text
    /// itself is blank.
    pub fn source_text(&self) -> Cow<'_, str> {
        if self.text.trim().is_empty() {
            Cow::Owned(
                self.blocks
                    .iter()
                    .map(|b| b.text.as_str())
                    .filter(|t| !t.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
        } else {
            Cow::Borrowed(&self.text)
        }
    }

    /// Provenance of the first block containing `text` verbatim.
    pub fn locate(&self, text: &str) -> Option<Provenance> {
        self.blocks
            .iter()
            .find(|block| block.text.contains(text))
            .map(|block| Provenance::new(self.page, block.bbox))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    RuleBased,
    Model,
}

#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    fn strategy(&self) -> ExtractionStrategy;

    async fn extract(&self, page: &PageText) -> ExtractionResult<Vec<RawEntity>>;

    async fn extract_text(&self, text: &str) -> ExtractionResult<Vec<RawEntity>> {
        let page = PageText::new(1, text.to_string(), Vec::new());
        self.extract(&page).await
    }
}

fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Build an entity from a byte span of `text`, trimming surrounding
/// whitespace. Returns `None` for an empty span.
fn entity_from_span(
    page: &PageText,
    text: &str,
    label: &EntityLabel,
    range: std::ops::Range<usize>,
    confidence: f64,
    method: ExtractionMethod,
) -> Option<RawEntity> {
    let raw = text.get(range.clone())?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let start = range.start + (raw.len() - raw.trim_start().len());
    let end = start + trimmed.len();

    Some(
        RawEntity::new(
            label.clone(),
            trimmed.to_string(),
            char_offset(text, start),
            char_offset(text, end),
            confidence,
            method,
        )
        .with_provenance(page.locate(trimmed))
        .with_page(page.page),
    )
}

/// Deterministic extractor driven by a [`RuleSet`].
pub struct RuleBasedExtractor {
    rules: Arc<RuleSet>,
}

impl RuleBasedExtractor {
    #[must_use]
    pub const fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn pattern_entities(&self, page: &PageText, text: &str) -> Vec<RawEntity> {
        self.rules
            .patterns()
            .iter()
            .filter_map(|pattern| {
                let caps = pattern.regex.captures(text)?;
                let matched = caps.get(1).or_else(|| caps.get(0))?;
                entity_from_span(
                    page,
                    text,
                    &pattern.label,
                    matched.range(),
                    self.rules.pattern_confidence,
                    ExtractionMethod::RuleBased,
                )
            })
            .collect()
    }

    fn key_value_entities(&self, page: &PageText, text: &str) -> Vec<RawEntity> {
        let mut entities = Vec::new();
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            let Some((key, _)) = line.split_once(':') else {
                continue;
            };
            let Some(label) = self.rules.classify_key(key) else {
                continue;
            };

            let value_start = line_start + key.len() + 1;
            let value_end = line_start + line.trim_end().len();
            if value_start >= value_end {
                continue;
            }

            if let Some(entity) = entity_from_span(
                page,
                text,
                label,
                value_start..value_end,
                self.rules.key_value_confidence,
                ExtractionMethod::KeyValue,
            ) {
                entities.push(entity);
            }
        }

        entities
    }
}

#[async_trait::async_trait]
impl Extractor for RuleBasedExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::RuleBased
    }

    async fn extract(&self, page: &PageText) -> ExtractionResult<Vec<RawEntity>> {
        let text = page.source_text();

        let mut entities = self.pattern_entities(page, &text);
        entities.extend(self.key_value_entities(page, &text));

        tracing::debug!(page = page.page, entities = entities.len(), "Rule-based extraction complete");
        Ok(entities)
    }
}

/// A labelled span reported by an [`EntityModel`]. Offsets are byte offsets
/// into the text passed to [`EntityModel::infer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl ModelSpan {
    #[must_use]
    pub fn new(start: usize, end: usize, label: &str) -> Self {
        Self {
            start,
            end,
            label: label.to_string(),
        }
    }
}

/// A trained sequence-labelling model.
#[async_trait::async_trait]
pub trait EntityModel: Send + Sync {
    fn name(&self) -> &str;

    async fn infer(&self, text: &str) -> ExtractionResult<Vec<ModelSpan>>;
}

/// Loads an [`EntityModel`] from disk.
#[async_trait::async_trait]
pub trait EntityModelLoader: Send + Sync {
    async fn load(&self, path: &Path) -> ExtractionResult<Arc<dyn EntityModel>>;
}

pub struct ModelExtractor {
    model: Arc<dyn EntityModel>,
}

impl ModelExtractor {
    #[must_use]
    pub fn new(model: Arc<dyn EntityModel>) -> Self {
        Self { model }
    }
}

#[async_trait::async_trait]
impl Extractor for ModelExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Model
    }

    async fn extract(&self, page: &PageText) -> ExtractionResult<Vec<RawEntity>> {
        let text = page.source_text();
        let spans = self.model.infer(&text).await?;

        let entities: Vec<RawEntity> = spans
            .into_iter()
            .filter_map(|span| {
                let Some(span_text) = text.get(span.start..span.end).filter(|_| span.start < span.end)
                else {
                    tracing::debug!(
                        page = page.page,
                        model = self.model.name(),
                        start = span.start,
                        end = span.end,
                        "Skipping model span outside the page text"
                    );
                    return None;
                };

                Some(
                    RawEntity::new(
                        EntityLabel::from(span.label.as_str()),
                        span_text.to_string(),
                        char_offset(&text, span.start),
                        char_offset(&text, span.end),
                        MODEL_PLACEHOLDER_CONFIDENCE,
                        ExtractionMethod::Model,
                    )
                    .with_provenance(page.locate(span_text))
                    .with_page(page.page),
                )
            })
            .collect();

        Ok(entities)
    }
}

/// Pick the extraction strategy once: the model when one was loaded,
/// otherwise the rule-based extractor.
pub fn select_extractor(
    model: Option<Arc<dyn EntityModel>>,
    rules: Arc<RuleSet>,
) -> Arc<dyn Extractor> {
    match model {
        Some(model) => {
            tracing::info!(model = model.name(), "Using model-based entity extraction");
            Arc::new(ModelExtractor::new(model))
        }
        None => {
            tracing::info!("Using rule-based entity extraction");
            Arc::new(RuleBasedExtractor::new(rules))
        }
    }
}
