use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::entity::{EntityLabel, Provenance};
use crate::gazetteer::GazetteerMatch;

/// Canonical field names of a digitized land-rights record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    ClaimantName,
    GuardianName,
    Age,
    Gender,
    Village,
    District,
    State,
    ClaimType,
    AreaHa,
    OccupationDate,
    IssueDate,
    CoordinatesGeojson,
    KhasraNumber,
    TitleNo,
}

impl FieldName {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ClaimantName => "claimant_name",
            Self::GuardianName => "guardian_name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Village => "village",
            Self::District => "district",
            Self::State => "state",
            Self::ClaimType => "claim_type",
            Self::AreaHa => "area_ha",
            Self::OccupationDate => "occupation_date",
            Self::IssueDate => "issue_date",
            Self::CoordinatesGeojson => "coordinates_geojson",
            Self::KhasraNumber => "khasra_number",
            Self::TitleNo => "title_no",
        }
    }

    /// Field an entity label feeds, or `None` for labels with no field.
    #[must_use]
    pub const fn for_label(label: &EntityLabel) -> Option<Self> {
        match label {
            EntityLabel::TitleNo => Some(Self::TitleNo),
            EntityLabel::ClaimantName => Some(Self::ClaimantName),
            EntityLabel::GuardianName => Some(Self::GuardianName),
            EntityLabel::Age => Some(Self::Age),
            EntityLabel::Gender => Some(Self::Gender),
            EntityLabel::Village => Some(Self::Village),
            EntityLabel::District => Some(Self::District),
            EntityLabel::State => Some(Self::State),
            EntityLabel::AreaHa => Some(Self::AreaHa),
            EntityLabel::Coordinates => Some(Self::CoordinatesGeojson),
            EntityLabel::OccupationDate => Some(Self::OccupationDate),
            EntityLabel::IssueDate => Some(Self::IssueDate),
            EntityLabel::ClaimType => Some(Self::ClaimType),
            EntityLabel::Khasra => Some(Self::KhasraNumber),
            EntityLabel::Other(_) => None,
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GeoJSON geometry. Positions are `[lon, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    #[must_use]
    pub const fn point(lon: f64, lat: f64) -> Self {
        Self::Point {
            coordinates: [lon, lat],
        }
    }
}

/// Normalized value of a field.
///
/// Serialized untagged, so a bare `FieldValue` reads ambiguous JSON by shape:
/// `"2019-05-12"` comes back as a date even if it was text. Records decode
/// their fields with [`FieldValue::from_json`], which knows each field's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Geometry(Geometry),
    Date(NaiveDate),
    Integer(u32),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Decode a stored value as the type `field` is normalized to.
    pub fn from_json(field: FieldName, value: serde_json::Value) -> serde_json::Result<Self> {
        match field {
            FieldName::OccupationDate | FieldName::IssueDate => {
                serde_json::from_value(value).map(Self::Date)
            }
            FieldName::CoordinatesGeojson => serde_json::from_value(value).map(Self::Geometry),
            FieldName::Age => serde_json::from_value(value).map(Self::Integer),
            FieldName::AreaHa => serde_json::from_value(value).map(Self::Number),
            FieldName::ClaimantName
            | FieldName::GuardianName
            | FieldName::Gender
            | FieldName::Village
            | FieldName::District
            | FieldName::State
            | FieldName::ClaimType
            | FieldName::KhasraNumber
            | FieldName::TitleNo => serde_json::from_value(value).map(Self::Text),
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            Self::Geometry(g) => Some(g),
            _ => None,
        }
    }
}

/// One canonical field derived from a resolved entity.
///
/// `value` is `None` when normalization could not parse the matched text; the
/// text is still kept in `original_text` so a reviewer can correct it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExtraction {
    pub value: Option<FieldValue>,
    pub confidence: f64,
    pub original_text: String,
    pub provenance: Vec<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gazetteer_match: Option<GazetteerMatch>,
}

impl FieldExtraction {
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Deserialize)]
struct StoredExtraction {
    value: Option<serde_json::Value>,
    confidence: f64,
    original_text: String,
    provenance: Vec<Provenance>,
    #[serde(default)]
    gazetteer_match: Option<GazetteerMatch>,
}

/// Deserialize a field map, typing each value by its field name.
pub(crate) fn deserialize_fields<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<FieldName, FieldExtraction>, D::Error>
where
    D: Deserializer<'de>,
{
    let stored = BTreeMap::<FieldName, StoredExtraction>::deserialize(deserializer)?;

    stored
        .into_iter()
        .map(|(field, stored)| {
            let value = stored
                .value
                .map(|v| FieldValue::from_json(field, v))
                .transpose()
                .map_err(|e| <D::Error as serde::de::Error>::custom(format!("{field}: {e}")))?;
            Ok((
                field,
                FieldExtraction {
                    value,
                    confidence: stored.confidence,
                    original_text: stored.original_text,
                    provenance: stored.provenance,
                    gazetteer_match: stored.gazetteer_match,
                },
            ))
        })
        .collect()
}
