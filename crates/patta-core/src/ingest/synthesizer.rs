use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entity::{Provenance, RawEntity, ResolvedEntity};
use crate::field::{FieldExtraction, FieldName, FieldValue};
use crate::gazetteer::{fuse_confidence, Gazetteer};
use super::normalizer;

/// Confidence assigned to a field whose text could not be normalized.
pub const NORMALIZATION_FAILURE_CONFIDENCE: f64 = 0.3;
/// Match signal fused into a village's confidence when the gazetteer has no
/// match for it.
pub const UNMATCHED_VILLAGE_SIGNAL: f64 = 0.5;

/// Turns resolved entities into canonical, normalized fields.
#[derive(Debug, Clone)]
pub struct FieldSynthesizer {
    gazetteer: Arc<Gazetteer>,
}

impl FieldSynthesizer {
    #[must_use]
    pub const fn new(gazetteer: Arc<Gazetteer>) -> Self {
        Self { gazetteer }
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    pub fn synthesize(&self, resolved: &[ResolvedEntity]) -> BTreeMap<FieldName, FieldExtraction> {
        let best = best_per_field(resolved);

        let district = best.get(&FieldName::District).map(|e| e.text.as_str());
        let state = best.get(&FieldName::State).map(|e| e.text.as_str());

        best.iter()
            .map(|(&field, entity)| {
                let extraction = if field == FieldName::Village {
                    self.village(entity, district, state)
                } else {
                    normalized(field, entity)
                };
                (field, extraction)
            })
            .collect()
    }

    fn village(
        &self,
        entity: &RawEntity,
        district: Option<&str>,
        state: Option<&str>,
    ) -> FieldExtraction {
        let raw = entity.text.trim();

        match self.gazetteer.match_village(raw, district, state) {
            Some(matched) => FieldExtraction {
                value: Some(FieldValue::Text(matched.village.clone())),
                confidence: matched.fused_confidence(entity.confidence),
                original_text: entity.text.clone(),
                provenance: provenance_of(entity),
                gazetteer_match: Some(matched),
            },
            None => FieldExtraction {
                value: normalize_value(FieldName::Village, raw),
                confidence: fuse_confidence(entity.confidence, UNMATCHED_VILLAGE_SIGNAL),
                original_text: entity.text.clone(),
                provenance: provenance_of(entity),
                gazetteer_match: None,
            },
        }
    }
}

/// Highest-confidence entity for each field; the first one wins a tie.
fn best_per_field(resolved: &[ResolvedEntity]) -> BTreeMap<FieldName, &RawEntity> {
    let mut best: BTreeMap<FieldName, &RawEntity> = BTreeMap::new();

    for candidate in resolved {
        let Some(field) = FieldName::for_label(candidate.label()) else {
            continue;
        };
        let entity = &candidate.entity;
        best.entry(field)
            .and_modify(|current| {
                if entity.confidence > current.confidence {
                    *current = entity;
                }
            })
            .or_insert(entity);
    }

    best
}

fn provenance_of(entity: &RawEntity) -> Vec<Provenance> {
    vec![entity
        .provenance
        .unwrap_or_else(|| Provenance::page_only(entity.page))]
}

fn normalize_value(field: FieldName, text: &str) -> Option<FieldValue> {
    match field {
        FieldName::AreaHa => normalizer::parse_area(text).map(FieldValue::Number),
        FieldName::OccupationDate | FieldName::IssueDate => {
            normalizer::normalize_date(text).map(FieldValue::Date)
        }
        FieldName::CoordinatesGeojson => {
            normalizer::parse_coordinates(text).map(FieldValue::Geometry)
        }
        FieldName::KhasraNumber => normalizer::normalize_khasra(text).map(FieldValue::Text),
        FieldName::ClaimantName
        | FieldName::GuardianName
        | FieldName::District
        | FieldName::State => normalizer::title_case(text).map(FieldValue::Text),
        FieldName::Age => normalizer::normalize_age(text).map(FieldValue::Integer),
        FieldName::Gender => {
            normalizer::normalize_gender(text).map(|g| FieldValue::Text(g.to_string()))
        }
        // Unmatched villages keep their spelling; the gazetteer supplies casing.
        FieldName::TitleNo | FieldName::ClaimType | FieldName::Village => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| FieldValue::Text(trimmed.to_string()))
        }
    }
}

fn normalized(field: FieldName, entity: &RawEntity) -> FieldExtraction {
    let value = normalize_value(field, &entity.text);

    let confidence = if value.is_some() {
        entity.confidence
    } else {
        tracing::warn!(
            field = field.as_str(),
            page = entity.page,
            text = %entity.text,
            "Normalization failed; keeping original text"
        );
        NORMALIZATION_FAILURE_CONFIDENCE
    };

    FieldExtraction {
        value,
        confidence,
        original_text: entity.text.clone(),
        provenance: provenance_of(entity),
        gazetteer_match: None,
    }
}
