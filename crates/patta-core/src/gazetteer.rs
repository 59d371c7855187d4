use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Weight of the extraction confidence in a fused village confidence.
pub const EXTRACTION_WEIGHT: f64 = 0.3;
/// Weight of the gazetteer match signal in a fused village confidence.
pub const MATCH_WEIGHT: f64 = 0.7;

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("Failed to read gazetteer {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid gazetteer {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid gazetteer CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
}

pub type GazetteerResult<T> = Result<T, GazetteerError>;

/// One row of the reference place table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub village: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub code: String,
}

impl GazetteerEntry {
    #[must_use]
    pub fn new(village: &str, district: &str, state: &str, code: &str) -> Self {
        Self {
            village: village.to_string(),
            district: district.to_string(),
            state: state.to_string(),
            code: code.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazetteerSettings {
    /// Minimum village-name similarity (0..100) for a candidate.
    pub fuzzy_threshold: f64,
    /// Minimum district/state similarity (0..100) when the caller supplies one.
    pub cross_field_threshold: f64,
    /// How many top-ranked candidates are considered.
    pub match_limit: usize,
}

impl Default for GazetteerSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 85.0,
            cross_field_threshold: 70.0,
            match_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerMatch {
    pub id: String,
    pub village: String,
    pub district: String,
    pub state: String,
    pub score: f64,
    pub match_type: MatchType,
}

impl GazetteerMatch {
    fn from_entry(entry: &GazetteerEntry, score: f64) -> Self {
        Self {
            id: entry.code.clone(),
            village: entry.village.clone(),
            district: entry.district.clone(),
            state: entry.state.clone(),
            score,
            match_type: MatchType::Fuzzy,
        }
    }

    /// Blend of the extraction confidence and this match's score.
    #[must_use]
    pub fn fused_confidence(&self, extraction_confidence: f64) -> f64 {
        fuse_confidence(extraction_confidence, self.score / 100.0)
    }
}

#[must_use]
pub fn fuse_confidence(extraction_confidence: f64, match_signal: f64) -> f64 {
    EXTRACTION_WEIGHT.mul_add(extraction_confidence, MATCH_WEIGHT * match_signal)
}

fn token_sort_key(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Length of the longest common subsequence of `a` and `b`.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        let mut diagonal = 0;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Indel similarity in `0..=100`: `2 * lcs / (len_a + len_b)`. Insertions
/// and deletions cost one each and substitutions two.
#[must_use]
pub fn indel_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    (2 * lcs_len(&a, &b)) as f64 / total as f64 * 100.0
}

/// Word-order-insensitive similarity in `0..=100`.
#[must_use]
pub fn token_sort_similarity(a: &str, b: &str) -> f64 {
    let a = token_sort_key(a);
    let b = token_sort_key(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    indel_similarity(&a, &b)
}

/// Reference place table used to resolve free-text village names.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    settings: GazetteerSettings,
}

impl Gazetteer {
    #[must_use]
    pub fn new(entries: Vec<GazetteerEntry>) -> Self {
        Self {
            entries,
            settings: GazetteerSettings::default(),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_settings(mut self, settings: GazetteerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Load the reference table. A `.csv` file needs a
    /// `village,district,state,code` header row; anything else is read as a
    /// JSON array of objects with those keys.
    pub async fn load(path: &Path) -> GazetteerResult<Self> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| GazetteerError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let entries = if is_csv {
            Self::parse_csv(&data).map_err(|source| GazetteerError::Csv {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_json::from_slice(&data).map_err(|source| GazetteerError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };

        tracing::info!(path = %path.display(), entries = entries.len(), "Loaded gazetteer");
        Ok(Self::new(entries))
    }

    fn parse_csv(data: &[u8]) -> Result<Vec<GazetteerEntry>, csv::Error> {
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data)
            .deserialize()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn settings(&self) -> &GazetteerSettings {
        &self.settings
    }

    /// Every entry scored against `query`, best first. Equal scores keep
    /// table order.
    fn ranked(&self, query: &str) -> Vec<(&GazetteerEntry, f64)> {
        let mut scored: Vec<(&GazetteerEntry, f64)> = self
            .entries
            .iter()
            .map(|entry| (entry, token_sort_similarity(query, &entry.village)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    fn cross_field_agrees(&self, supplied: Option<&str>, reference: &str) -> bool {
        let Some(supplied) = supplied.map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        if reference.trim().is_empty() {
            return true;
        }
        token_sort_similarity(supplied, reference) >= self.settings.cross_field_threshold
    }

    /// Resolve a village name, optionally constrained by district and state.
    ///
    /// Returns `None` rather than forcing a match: when no village clears the
    /// threshold, or when the supplied district or state disagrees with the
    /// best candidate's row.
    pub fn match_village(
        &self,
        name: &str,
        district: Option<&str>,
        state: Option<&str>,
    ) -> Option<GazetteerMatch> {
        if name.trim().is_empty() || self.entries.is_empty() {
            return None;
        }

        let Some((entry, score)) = self
            .ranked(name)
            .into_iter()
            .take(self.settings.match_limit)
            .find(|(_, score)| *score >= self.settings.fuzzy_threshold)
        else {
            tracing::debug!(village = name, "No gazetteer candidate above threshold");
            return None;
        };

        if !self.cross_field_agrees(district, &entry.district) {
            tracing::debug!(
                village = name,
                candidate = %entry.village,
                district = district.unwrap_or_default(),
                reference = %entry.district,
                "Gazetteer match vetoed by district"
            );
            return None;
        }

        if !self.cross_field_agrees(state, &entry.state) {
            tracing::debug!(
                village = name,
                candidate = %entry.village,
                state = state.unwrap_or_default(),
                reference = %entry.state,
                "Gazetteer match vetoed by state"
            );
            return None;
        }

        Some(GazetteerMatch::from_entry(entry, score))
    }

    /// All villages at or above the fuzzy threshold, best first.
    pub fn search(&self, query: &str, limit: usize) -> Vec<GazetteerMatch> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        self.ranked(query)
            .into_iter()
            .take(limit)
            .filter(|(_, score)| *score >= self.settings.fuzzy_threshold)
            .map(|(entry, score)| GazetteerMatch::from_entry(entry, score))
            .collect()
    }
}
