//! Place coordinate parsing.
//!
//! Archives store coordinates as free text: decimal degrees (`50.45`) or
//! degree/minute/second strings (`50°27'00"N`). Southern and western
//! hemispheres are negative.

use crate::model::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("valid coordinate number regex"));

/// Converts one coordinate string into signed decimal degrees.
///
/// Returns `None` for text without numbers or with more than three numeric
/// parts (degrees, minutes, seconds).
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    let parts = NUMBER_RE
        .find_iter(raw)
        .map(|found| found.as_str().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut degrees = parts[0];
    if let Some(minutes) = parts.get(1) {
        degrees += minutes / 60.0;
    }
    if let Some(seconds) = parts.get(2) {
        degrees += seconds / 3600.0;
    }

    let trimmed = raw.trim();
    if trimmed.starts_with('-') || trimmed.contains('S') || trimmed.contains('W') {
        degrees = -degrees;
    }
    Some(degrees)
}

/// Reads `(latitude, longitude)` from a place record's `coord` field.
pub fn place_coordinates(place: &Record) -> Option<(f64, f64)> {
    let coord = place.get("coord")?.as_record()?;
    let lat = parse_coordinate(coord.text("lat")?)?;
    let long = parse_coordinate(coord.text("long")?)?;
    Some((lat, long))
}

#[cfg(test)]
mod tests {
    use super::parse_coordinate;

    #[test]
    fn parses_decimal_and_sexagesimal_forms() {
        assert_eq!(parse_coordinate("50.5"), Some(50.5));
        assert_eq!(parse_coordinate("-30.25"), Some(-30.25));
        let value = parse_coordinate("50°30'36\"N").unwrap();
        assert!((value - 50.51).abs() < 1e-9);
        let west = parse_coordinate("30°15'W").unwrap();
        assert!((west + 30.25).abs() < 1e-9);
    }

    #[test]
    fn rejects_text_without_numbers_or_extra_parts() {
        assert_eq!(parse_coordinate("north"), None);
        assert_eq!(parse_coordinate("1 2 3 4"), None);
    }
}
