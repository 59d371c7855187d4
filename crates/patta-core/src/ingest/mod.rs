mod extractor;
pub mod normalizer;
mod pipeline;
mod resolver;
mod rules;
mod synthesizer;

pub use extractor::{
    select_extractor, EntityModel, EntityModelLoader, ExtractionError, ExtractionResult,
    ExtractionStrategy, Extractor, ModelExtractor, ModelSpan, PageText, RuleBasedExtractor,
    MODEL_PLACEHOLDER_CONFIDENCE,
};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineError, PipelineFailure, PipelineResult};
pub use resolver::resolve_entities;
pub use rules::{ExtractionPattern, KeyRule, RuleSet, KEY_VALUE_CONFIDENCE, PATTERN_CONFIDENCE};
pub use synthesizer::{FieldSynthesizer, NORMALIZATION_FAILURE_CONFIDENCE, UNMATCHED_VILLAGE_SIGNAL};
