use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use patta_core::ingest::{ExtractionResult, ModelSpan};
use patta_core::{
    DocumentStage, EntityLabel, EntityModel, EntityModelLoader, ExportError, Exporter,
    ExtractionError, ExtractionMethod, ExtractionStrategy, Extractor, FieldName, FieldValue,
    Gazetteer, GazetteerEntry, InMemoryPageSource, JsonExporter, OcrBlock, OcrEngine, OcrError,
    OcrOutput, PageImage, PageStage, PageStatus, PageText, PipelineBuilder, PipelineConfig,
    PipelineError, RawEntity,
};
use patta_core::document::DocumentRecord;

/// Treats page data as UTF-8 text, one OCR block per line. Pages whose text
/// is `FAIL` cannot be recognized.
struct TextOcr;

#[async_trait::async_trait]
impl OcrEngine for TextOcr {
    async fn recognize(&self, image: &PageImage) -> Result<OcrOutput, OcrError> {
        let text = String::from_utf8_lossy(&image.data).into_owned();
        if text == "FAIL" {
            return Err(OcrError::Recognition("unreadable scan".into()));
        }

        let blocks = text
            .lines()
            .enumerate()
            .map(|(i, line)| {
                let top = i as f64 * 20.0;
                OcrBlock::new([0.0, top, 500.0, top + 18.0], line, 0.95)
            })
            .collect();
        Ok(OcrOutput::new(text, blocks))
    }
}

fn page(number: u32, text: &str) -> PageImage {
    PageImage::new(number, 1240, 1754, text.as_bytes().to_vec())
}

fn source(document_id: &str, pages: Vec<PageImage>) -> Arc<InMemoryPageSource> {
    Arc::new(InMemoryPageSource::new().with_document(document_id, pages))
}

fn gazetteer() -> Arc<Gazetteer> {
    Arc::new(Gazetteer::new(vec![
        GazetteerEntry::new("Rampur", "Betul", "Madhya Pradesh", "MP-BTL-001"),
        GazetteerEntry::new("Sitapur", "Hoshangabad", "Madhya Pradesh", "MP-HSB-014"),
    ]))
}

/// Returns a fixed entity list per page number.
struct ScriptedExtractor;

#[async_trait::async_trait]
impl Extractor for ScriptedExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Model
    }

    async fn extract(&self, page: &PageText) -> ExtractionResult<Vec<RawEntity>> {
        let entity = |label, text: &str, confidence| {
            RawEntity::new(label, text.into(), 0, text.len(), confidence, ExtractionMethod::Model)
        };
        Ok(match page.page {
            1 => vec![
                entity(EntityLabel::Village, "Rampur", 0.8),
                entity(EntityLabel::AreaHa, "2 acres", 0.7),
            ],
            2 => vec![entity(EntityLabel::Village, "rampur", 0.6)],
            _ => Vec::new(),
        })
    }
}

#[tokio::test]
async fn test_two_page_document_end_to_end() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        source("FRA-001", vec![page(1, "first"), page(2, "second")]),
        Arc::new(TextOcr),
    )
    .with_gazetteer(gazetteer())
    .with_extractor(Arc::new(ScriptedExtractor))
    .build()
    .await
    .unwrap();

    let record = pipeline.process_document("FRA-001").await.unwrap();

    assert_eq!(record.stage, DocumentStage::Done);
    assert_eq!(record.pages.len(), 2);
    assert_eq!(record.extracted_fields.len(), 2);

    let village = record.field(FieldName::Village).unwrap();
    assert_eq!(village.value.as_ref().and_then(FieldValue::as_text), Some("Rampur"));
    assert_eq!(village.original_text, "Rampur");
    assert_eq!(village.provenance.len(), 1);
    assert_eq!(village.provenance[0].page, 1);
    assert!(village.gazetteer_match.is_some());

    let area = record.field(FieldName::AreaHa).unwrap();
    let hectares = area.value.as_ref().and_then(FieldValue::as_number).unwrap();
    assert!((hectares - 0.809).abs() < 0.001);
    assert_eq!(area.provenance[0].page, 1);

    assert_eq!(record.processing_summary.total_pages, 2);
    assert_eq!(record.processing_summary.entities_found, 3);
    assert_eq!(record.processing_summary.fields_extracted, 2);
    assert_eq!(record.processing_summary.degraded_pages, 0);
    assert_eq!(record.pages[1].entities[0].page, 2);
}

#[tokio::test]
async fn test_rule_based_document() {
    let text = "FOREST RIGHTS TITLE\n\
                Name of Title Holder: Ram Singh\n\
                Father's Name: Mohan Singh\n\
                Village: Rampur\n\
                District: Betul\n\
                Area: 2 acres\n\
                Date of Issue: 12-05-2019\n\
                Khasra No. 123/45";

    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        source("FRA-002", vec![page(1, text)]),
        Arc::new(TextOcr),
    )
    .with_gazetteer(gazetteer())
    .build()
    .await
    .unwrap();

    assert_eq!(pipeline.extraction_strategy(), ExtractionStrategy::RuleBased);

    let record = pipeline.process_document("FRA-002").await.unwrap();
    let text_of = |name| {
        record
            .field(name)
            .and_then(|f| f.value.as_ref())
            .and_then(FieldValue::as_text)
            .map(ToString::to_string)
    };

    assert_eq!(text_of(FieldName::ClaimantName).as_deref(), Some("Ram Singh"));
    assert_eq!(text_of(FieldName::GuardianName).as_deref(), Some("Mohan Singh"));
    assert_eq!(text_of(FieldName::Village).as_deref(), Some("Rampur"));
    assert_eq!(text_of(FieldName::District).as_deref(), Some("Betul"));
    assert_eq!(text_of(FieldName::KhasraNumber).as_deref(), Some("123/45"));
    assert_eq!(
        record
            .field(FieldName::IssueDate)
            .and_then(|f| f.value.as_ref())
            .and_then(FieldValue::as_date)
            .map(|d| d.to_string())
            .as_deref(),
        Some("2019-05-12")
    );

    let village = record.field(FieldName::Village).unwrap();
    let bbox = village.provenance[0].bbox.unwrap();
    assert!((bbox[1] - 60.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_degraded_page_does_not_fail_document() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        source("FRA-003", vec![page(1, "FAIL"), page(2, "Village: Rampur")]),
        Arc::new(TextOcr),
    )
    .with_gazetteer(gazetteer())
    .build()
    .await
    .unwrap();

    let record = pipeline.process_document("FRA-003").await.unwrap();

    assert_eq!(record.stage, DocumentStage::Done);
    assert!(matches!(
        &record.pages[0].status,
        PageStatus::Degraded { stage: PageStage::Recognition, error } if error.contains("unreadable")
    ));
    assert_eq!(record.pages[1].status, PageStatus::Ok);
    assert_eq!(record.processing_summary.degraded_pages, 1);

    let village = record.field(FieldName::Village).unwrap();
    assert_eq!(village.provenance[0].page, 2);
}

#[tokio::test]
async fn test_empty_page_is_not_degraded() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        source("FRA-004", vec![page(1, "")]),
        Arc::new(TextOcr),
    )
    .build()
    .await
    .unwrap();

    let record = pipeline.process_document("FRA-004").await.unwrap();
    assert_eq!(record.pages[0].status, PageStatus::Ok);
    assert!(record.extracted_fields.is_empty());
    assert_eq!(record.processing_summary.degraded_pages, 0);
}

#[tokio::test]
async fn test_unknown_document_fails_without_fields() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        Arc::new(InMemoryPageSource::new()),
        Arc::new(TextOcr),
    )
    .build()
    .await
    .unwrap();

    let failure = pipeline.process_document("missing").await.unwrap_err();

    assert_eq!(failure.document_id, "missing");
    assert_eq!(failure.stage, DocumentStage::Ingested);
    assert!(matches!(failure.error, PipelineError::Source(_)));
    assert_eq!(failure.partial.stage, DocumentStage::Failed);
    assert!(failure.partial.extracted_fields.is_empty());
    assert_eq!(failure.partial.processing_summary.total_pages, 0);
}

#[tokio::test]
async fn test_document_without_pages_fails() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        source("FRA-005", Vec::new()),
        Arc::new(TextOcr),
    )
    .build()
    .await
    .unwrap();

    let failure = pipeline.process_document("FRA-005").await.unwrap_err();
    assert!(matches!(failure.error, PipelineError::NoPages(_)));
}

struct PanickingExtractor;

#[async_trait::async_trait]
impl Extractor for PanickingExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::RuleBased
    }

    async fn extract(&self, page: &PageText) -> ExtractionResult<Vec<RawEntity>> {
        if page.page == 1 {
            panic!("extractor bug");
        }
        Err(ExtractionError::Failed("no model output".into()))
    }
}

#[tokio::test]
async fn test_failed_page_tasks_are_degraded() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        source("FRA-006", vec![page(1, "one"), page(2, "two")]),
        Arc::new(TextOcr),
    )
    .with_extractor(Arc::new(PanickingExtractor))
    .build()
    .await
    .unwrap();

    let record = pipeline.process_document("FRA-006").await.unwrap();

    assert!(matches!(
        record.pages[0].status,
        PageStatus::Degraded { stage: PageStage::Task, .. }
    ));
    assert!(matches!(
        record.pages[1].status,
        PageStatus::Degraded { stage: PageStage::Extraction, .. }
    ));
    assert_eq!(record.pages[1].ocr_text, "two");
    assert_eq!(record.processing_summary.degraded_pages, 2);
}

struct FailingExporter;

#[async_trait::async_trait]
impl Exporter for FailingExporter {
    async fn export(&self, _record: &DocumentRecord) -> Result<(), ExportError> {
        Err(ExportError::Write {
            path: "/readonly/out.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

#[tokio::test]
async fn test_export_failure_keeps_partial_record() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        source("FRA-007", vec![page(1, "Village: Rampur")]),
        Arc::new(TextOcr),
    )
    .with_exporter(Arc::new(FailingExporter))
    .build()
    .await
    .unwrap();

    let failure = pipeline.process_document("FRA-007").await.unwrap_err();

    assert_eq!(failure.stage, DocumentStage::Exported);
    assert!(matches!(failure.error, PipelineError::Export(_)));
    assert!(failure.partial.field(FieldName::Village).is_some());
}

#[tokio::test]
async fn test_json_export() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = Arc::new(JsonExporter::new(dir.path()));

    let pipeline = PipelineBuilder::new(
        PipelineConfig::default(),
        source("FRA-008", vec![page(1, "Village: Rampur\nArea: 4 bigha")]),
        Arc::new(TextOcr),
    )
    .with_exporter(exporter.clone())
    .build()
    .await
    .unwrap();

    pipeline.process_document("FRA-008").await.unwrap();

    let written = std::fs::read_to_string(exporter.path_for("FRA-008")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json["document_id"], "FRA-008");
    assert_eq!(json["extracted_fields"]["area_ha"]["value"], 1.0);
    assert_eq!(json["extracted_fields"]["village"]["value"], "Rampur");
}

struct KeywordModel;

#[async_trait::async_trait]
impl EntityModel for KeywordModel {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn infer(&self, text: &str) -> ExtractionResult<Vec<ModelSpan>> {
        Ok(text
            .find("Rampur")
            .map(|start| ModelSpan::new(start, start + "Rampur".len(), "VILLAGE"))
            .into_iter()
            .collect())
    }
}

struct Loader {
    available: bool,
}

#[async_trait::async_trait]
impl EntityModelLoader for Loader {
    async fn load(&self, path: &Path) -> ExtractionResult<Arc<dyn EntityModel>> {
        if self.available {
            Ok(Arc::new(KeywordModel))
        } else {
            Err(ExtractionError::ModelUnavailable(path.display().to_string()))
        }
    }
}

fn model_config() -> PipelineConfig {
    PipelineConfig {
        ner_model_path: Some("/models/ner".into()),
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn test_loaded_model_is_used_exclusively() {
    let pipeline = PipelineBuilder::new(
        model_config(),
        source("FRA-009", vec![page(1, "Village: Rampur\nDistrict: Betul")]),
        Arc::new(TextOcr),
    )
    .with_model_loader(Arc::new(Loader { available: true }))
    .build()
    .await
    .unwrap();

    assert_eq!(pipeline.extraction_strategy(), ExtractionStrategy::Model);

    let record = pipeline.process_document("FRA-009").await.unwrap();
    let entities = &record.pages[0].entities;
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].method, ExtractionMethod::Model);
    assert!(record.field(FieldName::District).is_none());
}

#[tokio::test]
async fn test_model_load_failure_falls_back_to_rules() {
    let pipeline = PipelineBuilder::new(
        model_config(),
        source("FRA-010", vec![page(1, "Village: Rampur")]),
        Arc::new(TextOcr),
    )
    .with_model_loader(Arc::new(Loader { available: false }))
    .build()
    .await
    .unwrap();

    assert_eq!(pipeline.extraction_strategy(), ExtractionStrategy::RuleBased);
}

#[tokio::test]
async fn test_missing_gazetteer_file_is_a_build_error() {
    let config = PipelineConfig {
        gazetteer_path: Some("/nonexistent/gazetteer.json".into()),
        ..PipelineConfig::default()
    };
    let result = PipelineBuilder::new(config, Arc::new(InMemoryPageSource::new()), Arc::new(TextOcr))
        .build()
        .await;

    assert!(matches!(result, Err(patta_core::Error::Gazetteer(_))));
}

/// Records the peak number of concurrent recognitions.
struct CountingOcr {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait::async_trait]
impl OcrEngine for CountingOcr {
    async fn recognize(&self, image: &PageImage) -> Result<OcrOutput, OcrError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(OcrOutput::new(format!("Page {}", image.page_number), Vec::new()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_page_concurrency_is_bounded() {
    let ocr = Arc::new(CountingOcr {
        active: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let pages = (1..=8).map(|n| page(n, "")).collect();
    let config = PipelineConfig {
        max_concurrent_pages: 2,
        ..PipelineConfig::default()
    };

    let pipeline = PipelineBuilder::new(config, source("FRA-011", pages), ocr.clone())
        .build()
        .await
        .unwrap();

    let record = pipeline.process_document("FRA-011").await.unwrap();

    assert!(ocr.peak.load(Ordering::SeqCst) <= 2);
    let numbers: Vec<u32> = record.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_spawn_document() {
    let pipeline = Arc::new(
        PipelineBuilder::new(
            PipelineConfig::default(),
            source("FRA-012", vec![page(1, "District: Betul")]),
            Arc::new(TextOcr),
        )
        .build()
        .await
        .unwrap(),
    );

    let handle = pipeline.spawn_document("FRA-012");
    let record = handle.await.unwrap().unwrap();
    assert_eq!(record.document_id, "FRA-012");
    assert!(record.field(FieldName::District).is_some());
}
