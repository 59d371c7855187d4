use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::entity::RawEntity;
use crate::field::{FieldExtraction, FieldName};
use crate::ocr::OcrBlock;

/// Processing stage of a document. `Failed` is reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStage {
    Ingested,
    Preprocessed,
    OcrComplete,
    Extracted,
    Aggregated,
    Synthesized,
    Exported,
    Done,
    Failed,
}

impl DocumentStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ingested => "ingested",
            Self::Preprocessed => "preprocessed",
            Self::OcrComplete => "ocr_complete",
            Self::Extracted => "extracted",
            Self::Aggregated => "aggregated",
            Self::Synthesized => "synthesized",
            Self::Exported => "exported",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for DocumentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-page step that can degrade a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    Recognition,
    Extraction,
    Task,
}

impl std::fmt::Display for PageStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Recognition => "recognition",
            Self::Extraction => "extraction",
            Self::Task => "task",
        })
    }
}

/// A degraded page contributed zero entities because a step failed, which
/// keeps it distinguishable from a page that simply had nothing on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    Ok,
    Degraded { stage: PageStage, error: String },
}

impl PageStatus {
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub ocr_text: String,
    pub ocr_blocks: Vec<OcrBlock>,
    pub entities: Vec<RawEntity>,
    pub status: PageStatus,
}

impl PageRecord {
    #[must_use]
    pub const fn new(page_number: u32, width: u32, height: u32) -> Self {
        Self {
            page_number,
            width,
            height,
            ocr_text: String::new(),
            ocr_blocks: Vec::new(),
            entities: Vec::new(),
            status: PageStatus::Ok,
        }
    }

    #[must_use]
    pub fn degraded(mut self, stage: PageStage, error: String) -> Self {
        self.entities.clear();
        self.status = PageStatus::Degraded { stage, error };
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub total_pages: usize,
    pub entities_found: usize,
    pub degraded_pages: usize,
    pub fields_extracted: usize,
    pub duration_ms: u64,
}

impl ProcessingSummary {
    #[must_use]
    pub fn from_parts(
        pages: &[PageRecord],
        fields: &BTreeMap<FieldName, FieldExtraction>,
        duration_ms: u64,
    ) -> Self {
        Self {
            total_pages: pages.len(),
            entities_found: pages.iter().map(|p| p.entities.len()).sum(),
            degraded_pages: pages.iter().filter(|p| p.status.is_degraded()).count(),
            fields_extracted: fields.len(),
            duration_ms,
        }
    }
}

/// Final structured output for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub run_id: Uuid,
    pub processed_at: DateTime<Utc>,
    pub stage: DocumentStage,
    pub pages: Vec<PageRecord>,
    #[serde(deserialize_with = "crate::field::deserialize_fields")]
    pub extracted_fields: BTreeMap<FieldName, FieldExtraction>,
    pub processing_summary: ProcessingSummary,
}

impl DocumentRecord {
    #[must_use]
    pub fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            run_id: Uuid::now_v7(),
            processed_at: Utc::now(),
            stage: DocumentStage::Ingested,
            pages: Vec::new(),
            extracted_fields: BTreeMap::new(),
            processing_summary: ProcessingSummary::default(),
        }
    }

    #[must_use]
    pub fn field(&self, name: FieldName) -> Option<&FieldExtraction> {
        self.extracted_fields.get(&name)
    }

    pub fn entity_count(&self) -> usize {
        self.pages.iter().map(|p| p.entities.len()).sum()
    }

    pub fn refresh_summary(&mut self, duration_ms: u64) {
        self.processing_summary =
            ProcessingSummary::from_parts(&self.pages, &self.extracted_fields, duration_ms);
    }
}
