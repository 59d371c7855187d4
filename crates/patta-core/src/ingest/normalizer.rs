use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::field::Geometry;

pub const ACRE_TO_HECTARE: f64 = 0.404_686;
/// Regional approximation; the size of a bigha varies between states.
pub const BIGHA_TO_HECTARE: f64 = 0.25;

const KHASRA_SPLIT_AT: usize = 3;

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.?\d*").expect("valid number regex"));

static DECIMAL_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+\.\d+)[°\s]*([NS])?[\s,]+(\d+\.\d+)[°\s]*([EW])?")
        .expect("valid decimal coordinate regex")
});

static DMS_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(\d+)°\s*(\d+)['′]\s*(\d+(?:\.\d+)?)["″]\s*([NS])[\s,]+(\d+)°\s*(\d+)['′]\s*(\d+(?:\.\d+)?)["″]\s*([EW])"#,
    )
    .expect("valid DMS coordinate regex")
});

static WKT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?(?:\d*\.\d+|\d+)").expect("valid WKT number regex"));

/// Parse a date written day-first and return it as a calendar date.
///
/// Everything except digits and `/`, `-`, `.` is treated as a separator, so
/// `"Date: 12-05-2019"` and `"12 05 2019"` both parse. A four-digit leading
/// part is read year-first.
pub fn normalize_date(text: &str) -> Option<NaiveDate> {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_digit() || matches!(c, '/' | '-' | '.') {
                c
            } else {
                ' '
            }
        })
        .collect();

    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    let parsed = tokens
        .iter()
        .find_map(|token| {
            let parts: Vec<&str> = token
                .split(['/', '-', '.'])
                .filter(|p| !p.is_empty())
                .collect();
            date_from_parts(&parts)
        })
        .or_else(|| {
            let numeric: Vec<&str> = tokens
                .iter()
                .copied()
                .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
                .collect();
            numeric.windows(3).find_map(date_from_parts)
        });

    if parsed.is_none() {
        tracing::debug!(text, "Could not parse date");
    }
    parsed
}

/// Exactly three numeric parts. A missing day or month is never filled in.
fn date_from_parts(parts: &[&str]) -> Option<NaiveDate> {
    let [first, second, third] = parts else {
        return None;
    };
    if !parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    let a: u32 = first.parse().ok()?;
    let b: u32 = second.parse().ok()?;

    if first.len() == 4 {
        let year = i32::try_from(a).ok()?;
        let day: u32 = third.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, b, day);
    }

    let year = expand_year(third)?;
    NaiveDate::from_ymd_opt(year, b, a).or_else(|| NaiveDate::from_ymd_opt(year, a, b))
}

/// Two-digit years pivot at 69, matching `strptime`'s `%y`.
fn expand_year(text: &str) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    match text.len() {
        1 | 2 if year < 69 => Some(2000 + year),
        1 | 2 => Some(1900 + year),
        4 => Some(year),
        _ => None,
    }
}

/// Parse an area and convert it to hectares, rounded to 3 decimals.
///
/// Plain numbers are taken as hectares. Acres and bighas are converted; the
/// bigha factor is [`BIGHA_TO_HECTARE`].
pub fn parse_area(text: &str) -> Option<f64> {
    let number: f64 = FIRST_NUMBER.find(text)?.as_str().parse().ok()?;

    let lower = text.to_lowercase();
    let hectares = if lower.contains("acre") {
        number * ACRE_TO_HECTARE
    } else if lower.contains("bigha") {
        number * BIGHA_TO_HECTARE
    } else {
        number
    };

    Some((hectares * 1000.0).round() / 1000.0)
}

/// Parse coordinates into a GeoJSON geometry.
///
/// Accepts a decimal-degree pair (`22.5N 77.3E`), a degrees-minutes-seconds
/// pair, or WKT `POLYGON((x y, ...))`. Southern and western hemisphere
/// letters negate the value.
pub fn parse_coordinates(text: &str) -> Option<Geometry> {
    let is_wkt = text.to_uppercase().contains("POLYGON");

    let geometry = is_wkt
        .then(|| parse_wkt_polygon(text))
        .flatten()
        .or_else(|| parse_decimal_pair(text))
        .or_else(|| parse_dms_pair(text));

    if geometry.is_none() {
        tracing::debug!(text, "Could not parse coordinates");
    }
    geometry
}

fn hemisphere_sign(letter: Option<regex::Match<'_>>) -> f64 {
    match letter.map(|m| m.as_str().to_ascii_uppercase()) {
        Some(l) if l == "S" || l == "W" => -1.0,
        _ => 1.0,
    }
}

fn parse_decimal_pair(text: &str) -> Option<Geometry> {
    let caps = DECIMAL_PAIR.captures(text)?;
    let lat: f64 = caps[1].parse().ok()?;
    let lon: f64 = caps[3].parse().ok()?;
    Some(Geometry::point(
        lon * hemisphere_sign(caps.get(4)),
        lat * hemisphere_sign(caps.get(2)),
    ))
}

fn parse_dms_pair(text: &str) -> Option<Geometry> {
    let caps = DMS_PAIR.captures(text)?;
    let component = |i: usize| -> Option<f64> { caps[i].parse().ok() };

    let lat = dms_to_decimal(component(1)?, component(2)?, component(3)?);
    let lon = dms_to_decimal(component(5)?, component(6)?, component(7)?);
    Some(Geometry::point(
        lon * hemisphere_sign(caps.get(8)),
        lat * hemisphere_sign(caps.get(4)),
    ))
}

#[must_use]
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

fn parse_wkt_polygon(text: &str) -> Option<Geometry> {
    let numbers: Vec<f64> = WKT_NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    if numbers.len() < 4 || numbers.len() % 2 != 0 {
        return None;
    }

    let mut ring: Vec<[f64; 2]> = numbers.chunks_exact(2).map(|p| [p[0], p[1]]).collect();
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }

    Some(Geometry::Polygon {
        coordinates: vec![ring],
    })
}

/// Normalize a khasra (survey plot) number to `123/45` form.
///
/// Only digits and `/` survive. A bare digit run longer than three gets a
/// slash after its third digit. That split point follows the usual district
/// record layout and is not a general rule.
pub fn normalize_khasra(text: &str) -> Option<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '/')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    if !cleaned.contains('/') && cleaned.len() > KHASRA_SPLIT_AT {
        let (head, tail) = cleaned.split_at(KHASRA_SPLIT_AT);
        return Some(format!("{head}/{tail}"));
    }

    Some(cleaned)
}

/// Collapse whitespace and title-case each word.
pub fn title_case(text: &str) -> Option<String> {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// First integer in the text, if it is a plausible age.
pub fn normalize_age(text: &str) -> Option<u32> {
    let number = FIRST_NUMBER.find(text)?.as_str();
    let digits: String = number.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|age| (1..=150).contains(age))
}

pub fn normalize_gender(text: &str) -> Option<&'static str> {
    match text.trim().to_lowercase().as_str() {
        "m" | "male" | "man" => Some("Male"),
        "f" | "female" | "woman" => Some("Female"),
        "o" | "other" | "transgender" => Some("Other"),
        _ => None,
    }
}
