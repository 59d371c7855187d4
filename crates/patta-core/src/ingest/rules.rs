use regex::Regex;

use crate::entity::EntityLabel;

pub const PATTERN_CONFIDENCE: f64 = 0.7;
pub const KEY_VALUE_CONFIDENCE: f64 = 0.8;

/// A case-insensitive pattern for one label. When the pattern has a capture
/// group, group 1 is the entity text; otherwise the whole match is.
#[derive(Debug, Clone)]
pub struct ExtractionPattern {
    pub label: EntityLabel,
    pub regex: Regex,
}

impl ExtractionPattern {
    pub fn new(label: EntityLabel, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            label,
            regex: Regex::new(&format!("(?i){pattern}"))?,
        })
    }
}

/// Classifies the key of a `key: value` line by keyword containment.
///
/// A key matches when it contains every `required` keyword and, if any
/// `alternatives` are given, at least one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRule {
    pub label: EntityLabel,
    pub required: Vec<String>,
    pub alternatives: Vec<String>,
}

impl KeyRule {
    #[must_use]
    pub fn all_of(label: EntityLabel, keywords: &[&str]) -> Self {
        Self {
            label,
            required: keywords.iter().map(ToString::to_string).collect(),
            alternatives: Vec::new(),
        }
    }

    #[must_use]
    pub fn any_of(label: EntityLabel, keywords: &[&str]) -> Self {
        Self {
            label,
            required: Vec::new(),
            alternatives: keywords.iter().map(ToString::to_string).collect(),
        }
    }

    /// `key` is expected lowercased.
    pub fn matches(&self, key: &str) -> bool {
        self.required.iter().all(|k| key.contains(k.as_str()))
            && (self.alternatives.is_empty()
                || self.alternatives.iter().any(|k| key.contains(k.as_str())))
    }
}

/// Rule table for the deterministic extractor. Built once and shared
/// read-only between page tasks.
#[derive(Debug, Clone)]
pub struct RuleSet {
    patterns: Vec<ExtractionPattern>,
    key_rules: Vec<KeyRule>,
    pub pattern_confidence: f64,
    pub key_value_confidence: f64,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSet {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            patterns: Vec::new(),
            key_rules: Vec::new(),
            pattern_confidence: PATTERN_CONFIDENCE,
            key_value_confidence: KEY_VALUE_CONFIDENCE,
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: ExtractionPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    #[must_use]
    pub fn with_key_rule(mut self, rule: KeyRule) -> Self {
        self.key_rules.push(rule);
        self
    }

    pub fn patterns(&self) -> &[ExtractionPattern] {
        &self.patterns
    }

    pub fn key_rules(&self) -> &[KeyRule] {
        &self.key_rules
    }

    /// First key rule matching `key`, in table order.
    pub fn classify_key(&self, key: &str) -> Option<&EntityLabel> {
        let key = key.trim().to_lowercase();
        self.key_rules
            .iter()
            .find(|rule| rule.matches(&key))
            .map(|rule| &rule.label)
    }

    /// Patterns for forest-rights title deeds and claim forms.
    pub fn builtin() -> Result<Self, regex::Error> {
        let table: &[(EntityLabel, &[&str])] = &[
            (
                EntityLabel::TitleNo,
                &[
                    r"Title[ \t]*No\.?[ \t]*:[ \t]*([A-Z0-9/\-]+)",
                    r"Record[ \t]*ID[ \t]*:[ \t]*([A-Z0-9\-]+)",
                    r"\bMP-\w+-\d+-\d+",
                ],
            ),
            (
                EntityLabel::ClaimantName,
                &[
                    r"Name[ \t]*of[ \t]*(?:the[ \t]*)?(?:Title[ \t]*)?Holder[ \t]*:[ \t]*([A-Za-z][A-Za-z \t.]*)",
                    r"Claimant[ \t]*:[ \t]*([A-Za-z][A-Za-z \t.]*)",
                ],
            ),
            (
                EntityLabel::GuardianName,
                &[
                    r"Father'?s[ \t]*/[ \t]*Husband'?s[ \t]*Name[ \t]*:[ \t]*([A-Za-z][A-Za-z \t.]*)",
                    r"Guardian[ \t]*:[ \t]*([A-Za-z][A-Za-z \t.]*)",
                    r"Father'?s[ \t]*Name[ \t]*:[ \t]*([A-Za-z][A-Za-z \t.]*)",
                ],
            ),
            (
                EntityLabel::Age,
                &[r"\bAge[ \t]*:?[ \t]*(\d{1,3})"],
            ),
            (
                EntityLabel::Gender,
                &[
                    r"Gender[ \t]*:[ \t]*(Male|Female|Other|M|F)\b",
                    r"Sex[ \t]*:[ \t]*(Male|Female|M|F)\b",
                ],
            ),
            (
                EntityLabel::Village,
                &[
                    r"Village[ \t]*/[ \t]*Gram[ \t]*Panchayat[ \t]*:[ \t]*([A-Za-z][A-Za-z \t]*)",
                    r"Village[ \t]*:[ \t]*([A-Za-z][A-Za-z \t]*)",
                    r"Gram[ \t]*:[ \t]*([A-Za-z][A-Za-z \t]*)",
                ],
            ),
            (
                EntityLabel::District,
                &[
                    r"District[ \t]*:[ \t]*([A-Za-z][A-Za-z \t]*)",
                    r"Dist\.[ \t]*:[ \t]*([A-Za-z][A-Za-z \t]*)",
                ],
            ),
            (
                EntityLabel::State,
                &[r"State(?:[ \t]*Name)?[ \t]*:[ \t]*([A-Za-z][A-Za-z \t]*)"],
            ),
            (
                EntityLabel::AreaHa,
                &[
                    r"Area[ \t]*\(ha\)[ \t]*:[ \t]*(\d+(?:\.\d+)?)",
                    r"(\d+(?:\.\d+)?[ \t]*(?:hectares?|ha|acres?|bighas?))\b",
                ],
            ),
            (
                EntityLabel::Coordinates,
                &[
                    r"Coordinates[ \t]*(?:/[ \t]*WKT)?[ \t]*:[ \t]*([^\r\n]+)",
                    r"POLYGON[ \t]*\(\([^)]+\)\)",
                ],
            ),
            (
                EntityLabel::OccupationDate,
                &[
                    r"Date[ \t]*of[ \t]*Occupation[^:\r\n]*:[ \t]*([\d/.\-]+)",
                    r"Occupation[ \t]*Date[ \t]*:[ \t]*([\d/.\-]+)",
                ],
            ),
            (
                EntityLabel::IssueDate,
                &[
                    r"Date[ \t]*of[ \t]*Issue[^:\r\n]*:[ \t]*([\d/.\-]+)",
                    r"Issue[ \t]*Date[ \t]*:[ \t]*([\d/.\-]+)",
                ],
            ),
            (
                EntityLabel::ClaimType,
                &[
                    r"Individual[ \t]*Forest[ \t]*Rights",
                    r"Community[ \t]*Forest[ \t]*Resource",
                    r"Annexure[ \t]+[IV]+\b",
                ],
            ),
            (
                EntityLabel::Khasra,
                &[r"Khasra[ \t]*(?:No\.?|Number)?[ \t]*:?[ \t]*(\d[\d/ \-]*\d|\d)"],
            ),
        ];

        let mut rules = Self::new();
        for (label, patterns) in table {
            for pattern in *patterns {
                rules = rules.with_pattern(ExtractionPattern::new(label.clone(), pattern)?);
            }
        }

        Ok(rules
            .with_key_rule(KeyRule::all_of(EntityLabel::ClaimantName, &["name", "holder"]))
            .with_key_rule(KeyRule::any_of(EntityLabel::GuardianName, &["father", "husband"]))
            .with_key_rule(KeyRule::any_of(EntityLabel::Village, &["village"]))
            .with_key_rule(KeyRule::any_of(EntityLabel::District, &["district"]))
            .with_key_rule(KeyRule::any_of(EntityLabel::AreaHa, &["area"])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_capture(rules: &RuleSet, label: &EntityLabel, text: &str) -> Option<String> {
        rules
            .patterns()
            .iter()
            .filter(|p| &p.label == label)
            .find_map(|p| {
                p.regex.captures(text).map(|caps| {
                    caps.get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default()
                })
            })
    }

    #[test]
    fn test_builtin_rules_compile() {
        let rules = RuleSet::builtin().unwrap();
        assert!(!rules.patterns().is_empty());
        assert_eq!(rules.key_rules().len(), 5);
        for label in EntityLabel::KNOWN {
            assert!(
                rules.patterns().iter().any(|p| p.label == label),
                "no pattern for {label}"
            );
        }
    }

    #[test]
    fn test_patterns_are_case_insensitive() {
        let rules = RuleSet::builtin().unwrap();
        assert_eq!(
            first_capture(&rules, &EntityLabel::Village, "VILLAGE: Rampur").as_deref(),
            Some("Rampur")
        );
    }

    #[test]
    fn test_name_capture_stops_at_line_end() {
        let rules = RuleSet::builtin().unwrap();
        let text = "Name of Title Holder: Ram Singh\nFather's Name: Mohan Singh";
        assert_eq!(
            first_capture(&rules, &EntityLabel::ClaimantName, text).as_deref(),
            Some("Ram Singh")
        );
        assert_eq!(
            first_capture(&rules, &EntityLabel::GuardianName, text).as_deref(),
            Some("Mohan Singh")
        );
    }

    #[test]
    fn test_area_with_units() {
        let rules = RuleSet::builtin().unwrap();
        assert_eq!(
            first_capture(&rules, &EntityLabel::AreaHa, "Land of 2 acres near the river").as_deref(),
            Some("2 acres")
        );
        assert_eq!(
            first_capture(&rules, &EntityLabel::AreaHa, "Area (ha): 1.25").as_deref(),
            Some("1.25")
        );
    }

    #[test]
    fn test_claim_type_whole_match() {
        let rules = RuleSet::builtin().unwrap();
        assert_eq!(
            first_capture(&rules, &EntityLabel::ClaimType, "Form: Annexure III").as_deref(),
            Some("Annexure III")
        );
    }

    #[test]
    fn test_khasra_pattern() {
        let rules = RuleSet::builtin().unwrap();
        assert_eq!(
            first_capture(&rules, &EntityLabel::Khasra, "Khasra No. 123/45").as_deref(),
            Some("123/45")
        );
    }

    #[test]
    fn test_key_classification_order() {
        let rules = RuleSet::builtin().unwrap();
        assert_eq!(
            rules.classify_key("Name of Holder"),
            Some(&EntityLabel::ClaimantName)
        );
        assert_eq!(
            rules.classify_key("Husband's Name"),
            Some(&EntityLabel::GuardianName)
        );
        assert_eq!(rules.classify_key(" VILLAGE "), Some(&EntityLabel::Village));
        assert_eq!(rules.classify_key("Total Area"), Some(&EntityLabel::AreaHa));
        assert_eq!(rules.classify_key("Name"), None);
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(ExtractionPattern::new(EntityLabel::Village, "(unclosed").is_err());
    }
}
