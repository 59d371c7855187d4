use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::gazetteer::GazetteerSettings;

/// Pipeline configuration, loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// JSON gazetteer to load at startup. Without one every village lookup
    /// comes back unmatched.
    pub gazetteer_path: Option<PathBuf>,
    /// Trained entity model. Without one, or if loading fails, the rule-based
    /// extractor is used.
    pub ner_model_path: Option<PathBuf>,
    pub gazetteer: GazetteerSettings,
    /// Upper bound on pages processed concurrently per document.
    pub max_concurrent_pages: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gazetteer_path: None,
            ner_model_path: None,
            gazetteer: GazetteerSettings::default(),
            max_concurrent_pages: 4,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `PATTA_*` variables supplied by `lookup`. Unset
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("PATTA_GAZETTEER_PATH").filter(|v| !v.is_empty()) {
            config.gazetteer_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("PATTA_NER_MODEL_PATH").filter(|v| !v.is_empty()) {
            config.ner_model_path = Some(PathBuf::from(path));
        }
        if let Some(threshold) = parse_var(&lookup, "PATTA_FUZZY_MATCH_THRESHOLD")? {
            config.gazetteer.fuzzy_threshold = threshold;
        }
        if let Some(threshold) = parse_var(&lookup, "PATTA_CROSS_FIELD_THRESHOLD")? {
            config.gazetteer.cross_field_threshold = threshold;
        }
        if let Some(limit) = parse_var(&lookup, "PATTA_MATCH_LIMIT")? {
            config.gazetteer.match_limit = limit;
        }
        if let Some(pages) = parse_var(&lookup, "PATTA_MAX_CONCURRENT_PAGES")? {
            config.max_concurrent_pages = pages;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("fuzzy_threshold", self.gazetteer.fuzzy_threshold),
            ("cross_field_threshold", self.gazetteer.cross_field_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be within 0..=100, got {value}"
                )));
            }
        }
        if self.gazetteer.match_limit == 0 {
            return Err(Error::InvalidConfig("match_limit must be at least 1".into()));
        }
        if self.max_concurrent_pages == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_pages must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| Error::InvalidConfig(format!("{key}={raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!((config.gazetteer.fuzzy_threshold - 85.0).abs() < f64::EPSILON);
        assert!((config.gazetteer.cross_field_threshold - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.gazetteer.match_limit, 5);
        assert_eq!(config.max_concurrent_pages, 4);
    }

    #[test]
    fn test_reads_patta_variables() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("PATTA_GAZETTEER_PATH", "/data/gazetteer.json"),
            ("PATTA_NER_MODEL_PATH", "/models/ner"),
            ("PATTA_FUZZY_MATCH_THRESHOLD", "90"),
            ("PATTA_MAX_CONCURRENT_PAGES", " 8 "),
        ]))
        .unwrap();

        assert_eq!(config.gazetteer_path, Some(PathBuf::from("/data/gazetteer.json")));
        assert_eq!(config.ner_model_path, Some(PathBuf::from("/models/ner")));
        assert!((config.gazetteer.fuzzy_threshold - 90.0).abs() < f64::EPSILON);
        assert_eq!(config.max_concurrent_pages, 8);
    }

    #[test]
    fn test_rejects_unparseable_values() {
        let result = PipelineConfig::from_lookup(lookup_from(&[(
            "PATTA_MAX_CONCURRENT_PAGES",
            "many",
        )]));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let result = PipelineConfig::from_lookup(lookup_from(&[(
            "PATTA_CROSS_FIELD_THRESHOLD",
            "140",
        )]));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let result = PipelineConfig::from_lookup(lookup_from(&[(
            "PATTA_MAX_CONCURRENT_PAGES",
            "0",
        )]));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_deserializes_partial_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"max_concurrent_pages": 2, "gazetteer": {"fuzzy_threshold": 80}}"#)
                .unwrap();
        assert_eq!(config.max_concurrent_pages, 2);
        assert!((config.gazetteer.fuzzy_threshold - 80.0).abs() < f64::EPSILON);
        assert_eq!(config.gazetteer.match_limit, 5);
    }
}
