use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::extractor::{select_extractor, EntityModel, EntityModelLoader, ExtractionStrategy, Extractor, PageText};
use super::resolver::resolve_entities;
use super::rules::RuleSet;
use super::synthesizer::FieldSynthesizer;
use crate::config::PipelineConfig;
use crate::document::{DocumentRecord, DocumentStage, PageRecord, PageStage};
use crate::entity::RawEntity;
use crate::export::{ExportError, Exporter, NoopExporter};
use crate::gazetteer::Gazetteer;
use crate::ocr::{OcrEngine, PassthroughPreprocessor, Preprocessor};
use crate::source::{PageImage, PageSource, SourceError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Document {0} has no pages")]
    NoPages(String),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// A document that could not be processed. `partial` holds whatever was
/// produced before the failure, with its stage set to `failed`.
#[derive(Debug, Error)]
#[error("Document {document_id} failed at {stage}: {error}")]
pub struct PipelineFailure {
    pub document_id: String,
    pub stage: DocumentStage,
    #[source]
    pub error: PipelineError,
    pub partial: DocumentRecord,
}

pub type PipelineResult<T> = Result<T, Box<PipelineFailure>>;

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    source: Arc<dyn PageSource>,
    ocr: Arc<dyn OcrEngine>,
    preprocessor: Arc<dyn Preprocessor>,
    rules: Option<Arc<RuleSet>>,
    gazetteer: Option<Arc<Gazetteer>>,
    model_loader: Option<Arc<dyn EntityModelLoader>>,
    extractor: Option<Arc<dyn Extractor>>,
    exporter: Arc<dyn Exporter>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(config: PipelineConfig, source: Arc<dyn PageSource>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            config,
            source,
            ocr,
            preprocessor: Arc::new(PassthroughPreprocessor),
            rules: None,
            gazetteer: None,
            model_loader: None,
            extractor: None,
            exporter: Arc::new(NoopExporter),
        }
    }

    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Rules for the rule-based extractor. Defaults to [`RuleSet::builtin`].
    #[must_use]
    pub fn with_rules(mut self, rules: Arc<RuleSet>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Use this gazetteer as-is instead of loading `config.gazetteer_path`.
    #[must_use]
    pub fn with_gazetteer(mut self, gazetteer: Arc<Gazetteer>) -> Self {
        self.gazetteer = Some(gazetteer);
        self
    }

    #[must_use]
    pub fn with_model_loader(mut self, loader: Arc<dyn EntityModelLoader>) -> Self {
        self.model_loader = Some(loader);
        self
    }

    /// Bypass strategy selection and extract with `extractor`.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = exporter;
        self
    }

    async fn load_model(&self) -> Option<Arc<dyn EntityModel>> {
        let path = self.config.ner_model_path.as_deref()?;

        let Some(loader) = &self.model_loader else {
            tracing::warn!(path = %path.display(), "Model path configured without a loader; using rules");
            return None;
        };

        match loader.load(path).await {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load entity model; using rules");
                None
            }
        }
    }

    /// Validate the configuration, load the gazetteer and pick the
    /// extraction strategy.
    ///
    /// A configured gazetteer that cannot be read is an error. A model that
    /// cannot be loaded is not: the rule-based extractor is used instead.
    pub async fn build(self) -> crate::Result<Pipeline> {
        self.config.validate()?;

        let gazetteer = match (&self.gazetteer, &self.config.gazetteer_path) {
            (Some(gazetteer), _) => Arc::clone(gazetteer),
            (None, Some(path)) => Arc::new(Gazetteer::load(path).await?.with_settings(self.config.gazetteer)),
            (None, None) => {
                tracing::info!("No gazetteer configured; villages will not be resolved");
                Arc::new(Gazetteer::empty().with_settings(self.config.gazetteer))
            }
        };

        let extractor = match &self.extractor {
            Some(extractor) => Arc::clone(extractor),
            None => {
                let rules = match &self.rules {
                    Some(rules) => Arc::clone(rules),
                    None => Arc::new(RuleSet::builtin()?),
                };
                select_extractor(self.load_model().await, rules)
            }
        };

        Ok(Pipeline {
            config: self.config,
            source: self.source,
            ocr: self.ocr,
            preprocessor: self.preprocessor,
            extractor,
            synthesizer: FieldSynthesizer::new(gazetteer),
            exporter: self.exporter,
        })
    }
}

/// Per-page work, cloned into each page task.
#[derive(Clone)]
struct PageWorker {
    document_id: Arc<str>,
    preprocessor: Arc<dyn Preprocessor>,
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn Extractor>,
}

impl PageWorker {
    async fn process(&self, image: PageImage) -> PageRecord {
        let page_number = image.page_number;
        let mut page = PageRecord::new(page_number, image.width, image.height);

        let image = match self.preprocessor.preprocess(&image).await {
            Ok(processed) => processed,
            Err(e) => {
                tracing::warn!(
                    document_id = %self.document_id,
                    page = page_number,
                    stage = %DocumentStage::Preprocessed,
                    error = %e,
                    "Preprocessing failed; recognizing the original image"
                );
                image
            }
        };

        let output = match self.ocr.recognize(&image).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    document_id = %self.document_id,
                    page = page_number,
                    stage = %DocumentStage::OcrComplete,
                    error = %e,
                    "Recognition failed; page degraded"
                );
                return page.degraded(PageStage::Recognition, e.to_string());
            }
        };

        let text = PageText::new(page_number, output.text, output.blocks);
        let extracted = self.extractor.extract(&text).await;
        page.ocr_text = text.text;
        page.ocr_blocks = text.blocks;

        match extracted {
            Ok(entities) => {
                page.entities = entities.into_iter().map(|e| e.with_page(page_number)).collect();
                page
            }
            Err(e) => {
                tracing::warn!(
                    document_id = %self.document_id,
                    page = page_number,
                    stage = %DocumentStage::Extracted,
                    error = %e,
                    "Extraction failed; page degraded"
                );
                page.degraded(PageStage::Extraction, e.to_string())
            }
        }
    }
}

/// Turns a document's page images into a [`DocumentRecord`].
///
/// Pages are processed concurrently, up to `max_concurrent_pages` at a time.
/// A page that fails is kept as a degraded page and the rest of the document
/// still goes through; only a missing document or a failed export fails the
/// whole document.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn PageSource>,
    ocr: Arc<dyn OcrEngine>,
    preprocessor: Arc<dyn Preprocessor>,
    extractor: Arc<dyn Extractor>,
    synthesizer: FieldSynthesizer,
    exporter: Arc<dyn Exporter>,
}

impl Pipeline {
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extraction_strategy(&self) -> ExtractionStrategy {
        self.extractor.strategy()
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        self.synthesizer.gazetteer()
    }

    fn worker(&self, document_id: &str) -> PageWorker {
        PageWorker {
            document_id: Arc::from(document_id),
            preprocessor: Arc::clone(&self.preprocessor),
            ocr: Arc::clone(&self.ocr),
            extractor: Arc::clone(&self.extractor),
        }
    }

    fn fail(
        mut record: DocumentRecord,
        stage: DocumentStage,
        error: PipelineError,
        start: Instant,
    ) -> Box<PipelineFailure> {
        tracing::error!(
            document_id = %record.document_id,
            stage = %stage,
            error = %error,
            "Document processing failed"
        );
        record.stage = DocumentStage::Failed;
        record.refresh_summary(elapsed_ms(start));
        Box::new(PipelineFailure {
            document_id: record.document_id.clone(),
            stage,
            error,
            partial: record,
        })
    }

    fn advance(record: &mut DocumentRecord, stage: DocumentStage) {
        tracing::debug!(document_id = %record.document_id, from = %record.stage, to = %stage, "Stage transition");
        record.stage = stage;
    }

    async fn process_pages(&self, document_id: &str, pages: Vec<PageImage>) -> Vec<PageRecord> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_pages));

        let tasks: Vec<(PageRecord, JoinHandle<PageRecord>)> = pages
            .into_iter()
            .map(|image| {
                let placeholder = PageRecord::new(image.page_number, image.width, image.height);
                let worker = self.worker(document_id);
                let semaphore = Arc::clone(&semaphore);
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    worker.process(image).await
                });
                (placeholder, handle)
            })
            .collect();

        let mut records = Vec::with_capacity(tasks.len());
        for (placeholder, handle) in tasks {
            let record = match handle.await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        document_id,
                        page = placeholder.page_number,
                        stage = %DocumentStage::Extracted,
                        error = %e,
                        "Page task failed; page degraded"
                    );
                    placeholder.degraded(PageStage::Task, e.to_string())
                }
            };
            records.push(record);
        }
        records
    }

    /// Run one document through every stage.
    ///
    /// On failure the returned [`PipelineFailure`] names the stage that
    /// failed and carries the partial record. No fields are fabricated for a
    /// document whose pages could not be read.
    pub async fn process_document(&self, document_id: &str) -> PipelineResult<DocumentRecord> {
        let start = Instant::now();
        let mut record = DocumentRecord::new(document_id);
        tracing::info!(document_id, run_id = %record.run_id, "Processing document");

        let pages = match self.source.pages(document_id).await {
            Ok(pages) if pages.is_empty() => {
                let error = PipelineError::NoPages(document_id.to_string());
                return Err(Self::fail(record, DocumentStage::Ingested, error, start));
            }
            Ok(pages) => pages,
            Err(e) => return Err(Self::fail(record, DocumentStage::Ingested, e.into(), start)),
        };

        record.pages = self.process_pages(document_id, pages).await;
        Self::advance(&mut record, DocumentStage::Preprocessed);
        Self::advance(&mut record, DocumentStage::OcrComplete);
        Self::advance(&mut record, DocumentStage::Extracted);

        let pooled: Vec<RawEntity> = record
            .pages
            .iter()
            .flat_map(|page| page.entities.iter().cloned())
            .collect();
        let resolved = resolve_entities(&pooled);
        Self::advance(&mut record, DocumentStage::Aggregated);

        record.extracted_fields = self.synthesizer.synthesize(&resolved);
        Self::advance(&mut record, DocumentStage::Synthesized);

        Self::advance(&mut record, DocumentStage::Exported);
        record.refresh_summary(elapsed_ms(start));
        if let Err(e) = self.exporter.export(&record).await {
            return Err(Self::fail(record, DocumentStage::Exported, e.into(), start));
        }

        Self::advance(&mut record, DocumentStage::Done);
        record.refresh_summary(elapsed_ms(start));

        let summary = &record.processing_summary;
        tracing::info!(
            document_id,
            pages = summary.total_pages,
            degraded_pages = summary.degraded_pages,
            entities = summary.entities_found,
            fields = summary.fields_extracted,
            duration_ms = summary.duration_ms,
            "Document processed"
        );

        Ok(record)
    }

    /// Start processing in the background and return the task handle.
    pub fn spawn_document(
        self: &Arc<Self>,
        document_id: impl Into<String>,
    ) -> JoinHandle<PipelineResult<DocumentRecord>> {
        let pipeline = Arc::clone(self);
        let document_id = document_id.into();
        tokio::spawn(async move { pipeline.process_document(&document_id).await })
    }
}
