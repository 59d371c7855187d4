use serde::{Deserialize, Serialize};

/// Entity types recognized on land-rights documents.
///
/// Labels serialize in the `SCREAMING_SNAKE_CASE` form used by annotation
/// tooling. Labels a model emits that are not part of the fixed set are kept
/// verbatim in [`EntityLabel::Other`] and ignored by field synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityLabel {
    TitleNo,
    ClaimantName,
    GuardianName,
    Age,
    Gender,
    Village,
    District,
    State,
    AreaHa,
    Coordinates,
    OccupationDate,
    IssueDate,
    ClaimType,
    Khasra,
    Other(String),
}

impl EntityLabel {
    pub const KNOWN: [Self; 14] = [
        Self::TitleNo,
        Self::ClaimantName,
        Self::GuardianName,
        Self::Age,
        Self::Gender,
        Self::Village,
        Self::District,
        Self::State,
        Self::AreaHa,
        Self::Coordinates,
        Self::OccupationDate,
        Self::IssueDate,
        Self::ClaimType,
        Self::Khasra,
    ];

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TitleNo => "TITLE_NO",
            Self::ClaimantName => "CLAIMANT_NAME",
            Self::GuardianName => "GUARDIAN_NAME",
            Self::Age => "AGE",
            Self::Gender => "GENDER",
            Self::Village => "VILLAGE",
            Self::District => "DISTRICT",
            Self::State => "STATE",
            Self::AreaHa => "AREA_HA",
            Self::Coordinates => "COORDINATES",
            Self::OccupationDate => "OCCUPATION_DATE",
            Self::IssueDate => "ISSUE_DATE",
            Self::ClaimType => "CLAIM_TYPE",
            Self::Khasra => "KHASRA",
            Self::Other(label) => label,
        }
    }

    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EntityLabel {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "TITLE_NO" => Self::TitleNo,
            "CLAIMANT_NAME" => Self::ClaimantName,
            "GUARDIAN_NAME" => Self::GuardianName,
            "AGE" => Self::Age,
            "GENDER" => Self::Gender,
            "VILLAGE" => Self::Village,
            "DISTRICT" => Self::District,
            "STATE" => Self::State,
            "AREA_HA" => Self::AreaHa,
            "COORDINATES" => Self::Coordinates,
            "OCCUPATION_DATE" => Self::OccupationDate,
            "ISSUE_DATE" => Self::IssueDate,
            "CLAIM_TYPE" => Self::ClaimType,
            "KHASRA" | "KHASRA_NUMBER" => Self::Khasra,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for EntityLabel {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<EntityLabel> for String {
    fn from(label: EntityLabel) -> Self {
        match label {
            EntityLabel::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

/// How a raw entity was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Model,
    RuleBased,
    KeyValue,
}

impl ExtractionMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::RuleBased => "rule_based",
            Self::KeyValue => "key_value",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source location of a value: page number and, when an OCR block could be
/// located, that block's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

impl Provenance {
    #[must_use]
    pub const fn new(page: u32, bbox: [f64; 4]) -> Self {
        Self {
            page,
            bbox: Some(bbox),
        }
    }

    #[must_use]
    pub const fn page_only(page: u32) -> Self {
        Self { page, bbox: None }
    }
}

/// A typed span recognized on one page. Offsets are character offsets into
/// the page text the extractor was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub text: String,
    pub label: EntityLabel,
    pub start_char: usize,
    pub end_char: usize,
    pub confidence: f64,
    pub method: ExtractionMethod,
    pub page: u32,
    pub provenance: Option<Provenance>,
}

impl RawEntity {
    #[must_use]
    pub fn new(
        label: EntityLabel,
        text: String,
        start_char: usize,
        end_char: usize,
        confidence: f64,
        method: ExtractionMethod,
    ) -> Self {
        Self {
            text,
            label,
            start_char,
            end_char,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            page: 1,
            provenance: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        if let Some(provenance) = self.provenance.as_mut() {
            provenance.page = page;
        }
        self
    }

    #[must_use]
    pub fn with_provenance(mut self, provenance: Option<Provenance>) -> Self {
        self.provenance = provenance;
        self
    }

    /// Key under which duplicate candidates collapse.
    #[must_use]
    pub fn dedup_key(&self) -> (EntityLabel, String) {
        (self.label.clone(), self.text.to_lowercase())
    }
}

/// The surviving member of a group of duplicate [`RawEntity`] candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub entity: RawEntity,
    pub group_size: usize,
}

impl ResolvedEntity {
    #[must_use]
    pub const fn new(entity: RawEntity) -> Self {
        Self {
            entity,
            group_size: 1,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &EntityLabel {
        &self.entity.label
    }

    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.entity.confidence
    }
}
