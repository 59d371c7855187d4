#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod document;
pub mod entity;
pub mod error;
pub mod export;
pub mod field;
pub mod gazetteer;
pub mod ingest;
pub mod ocr;
pub mod source;

pub use config::PipelineConfig;
pub use document::{DocumentRecord, DocumentStage, PageRecord, PageStage, PageStatus, ProcessingSummary};
pub use entity::{EntityLabel, ExtractionMethod, Provenance, RawEntity, ResolvedEntity};
pub use error::{Error, Result};
pub use export::{ExportError, Exporter, JsonExporter, NoopExporter};
pub use field::{FieldExtraction, FieldName, FieldValue, Geometry};
pub use gazetteer::{Gazetteer, GazetteerEntry, GazetteerError, GazetteerMatch, GazetteerSettings, MatchType};
pub use ingest::{
    resolve_entities, select_extractor, EntityModel, EntityModelLoader, ExtractionError,
    ExtractionStrategy, Extractor, FieldSynthesizer, PageText, Pipeline, PipelineBuilder,
    PipelineError, PipelineFailure, PipelineResult, RuleBasedExtractor, RuleSet,
};
pub use ocr::{OcrBlock, OcrEngine, OcrError, OcrOutput, PassthroughPreprocessor, Preprocessor};
pub use source::{InMemoryPageSource, PageImage, PageSource, SourceError};
