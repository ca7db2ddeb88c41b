//! Point validation and the point input surface.
//!
//! A [`Point`] is only ever produced by [`validate`], which is a total
//! function: malformed, empty, non-finite or missing input all collapse into
//! `None`. Callers have no separate error channel, so there is nothing to
//! propagate.

use std::fmt;

use parking_lot::RwLock;

/// A validated latitude/longitude pair.
///
/// The canonical token keeps the user's original text (after trimming) so
/// precision and formatting survive the trip to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Point {
    lat: String,
    lon: String,
}

impl Point {
    /// Trimmed latitude text as entered.
    pub fn lat(&self) -> &str {
        &self.lat
    }

    /// Trimmed longitude text as entered.
    pub fn lon(&self) -> &str {
        &self.lon
    }

    /// The canonical `"<lat>,<lon>"` location token.
    pub fn token(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Validate raw coordinate text into a [`Point`].
///
/// Each field is trimmed of Unicode white space and byte order marks, then
/// coerced the way a browser form coerces numeric text: decimal notation
/// with optional sign and exponent, or an unsigned `0x`, `0o` or `0b`
/// integer literal. Returns `None` when either trimmed value is empty or
/// does not coerce to a finite number (`NaN`, `inf`, `Infinity` and
/// non-numeric text included).
///
/// # Example
///
/// ```
/// use pointquery::point::validate;
///
/// let point = validate(" 12.5", "-8.30 ").unwrap();
/// assert_eq!(point.token(), "12.5,-8.30");
/// assert!(validate("", "4").is_none());
/// ```
pub fn validate(raw_lat: &str, raw_lon: &str) -> Option<Point> {
    let lat = raw_lat.trim_matches(is_field_space);
    let lon = raw_lon.trim_matches(is_field_space);

    if lat.is_empty() || lon.is_empty() {
        return None;
    }

    if !is_finite_number(lat) || !is_finite_number(lon) {
        return None;
    }

    Some(Point {
        lat: lat.to_string(),
        lon: lon.to_string(),
    })
}

/// Space stripped around a field: Unicode white space except NEL, plus the
/// byte order mark.
fn is_field_space(c: char) -> bool {
    c == '\u{feff}' || (c.is_whitespace() && c != '\u{85}')
}

fn is_finite_number(text: &str) -> bool {
    parse_radix_literal(text)
        .or_else(|| text.parse::<f64>().ok())
        .is_some_and(f64::is_finite)
}

/// Value of an unsigned `0x`/`0o`/`0b` literal, or `None` if `text` is not one.
fn parse_radix_literal(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'0' {
        return None;
    }
    let radix = match bytes[1] {
        b'x' | b'X' => 16,
        b'o' | b'O' => 8,
        b'b' | b'B' => 2,
        _ => return None,
    };

    text[2..].chars().try_fold(0.0f64, |value, c| {
        c.to_digit(radix)
            .map(|digit| value * f64::from(radix) + f64::from(digit))
    })
}

/// Source of the two raw coordinate fields, read synchronously.
///
/// A field that cannot be read (absent widget, detached form) returns `None`,
/// which the coordinator treats exactly like invalid input.
pub trait PointInput: Send + Sync {
    /// Raw latitude field contents.
    fn latitude(&self) -> Option<String>;

    /// Raw longitude field contents.
    fn longitude(&self) -> Option<String>;

    /// Read both fields and validate them.
    fn read_point(&self) -> Option<Point> {
        let lat = self.latitude()?;
        let lon = self.longitude()?;
        validate(&lat, &lon)
    }
}

/// In-memory two-field form.
///
/// Fields start out present and empty. [`PointForm::detach`] removes them,
/// modelling a form whose inputs can no longer be found.
#[derive(Debug)]
pub struct PointForm {
    fields: RwLock<Option<(String, String)>>,
}

impl Default for PointForm {
    fn default() -> Self {
        Self::new()
    }
}

impl PointForm {
    /// Create a form with empty fields.
    pub fn new() -> Self {
        Self {
            fields: RwLock::new(Some((String::new(), String::new()))),
        }
    }

    /// Create a form pre-filled with the given text.
    pub fn with_values(lat: impl Into<String>, lon: impl Into<String>) -> Self {
        Self {
            fields: RwLock::new(Some((lat.into(), lon.into()))),
        }
    }

    /// Replace the latitude text. No-op on a detached form.
    pub fn set_latitude(&self, value: impl Into<String>) {
        if let Some((lat, _)) = self.fields.write().as_mut() {
            *lat = value.into();
        }
    }

    /// Replace the longitude text. No-op on a detached form.
    pub fn set_longitude(&self, value: impl Into<String>) {
        if let Some((_, lon)) = self.fields.write().as_mut() {
            *lon = value.into();
        }
    }

    /// Remove both fields.
    pub fn detach(&self) {
        *self.fields.write() = None;
    }
}

impl PointInput for PointForm {
    fn latitude(&self) -> Option<String> {
        self.fields.read().as_ref().map(|(lat, _)| lat.clone())
    }

    fn longitude(&self) -> Option<String> {
        self.fields.read().as_ref().map(|(_, lon)| lon.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_trims_and_preserves_text() {
        let point = validate("  12.50 ", "\t-8.3\n").unwrap();
        assert_eq!(point.lat(), "12.50");
        assert_eq!(point.lon(), "-8.3");
        assert_eq!(point.token(), "12.50,-8.3");
        assert_eq!(point.to_string(), "12.50,-8.3");
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(validate("", "4").is_none());
        assert!(validate("4", "   ").is_none());
        assert!(validate("", "").is_none());
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        for bad in ["NaN", "nan", "inf", "-inf", "Infinity", "-Infinity", "abc", "1,2", "1e999"] {
            assert!(validate(bad, "1").is_none(), "lat {:?} should be invalid", bad);
            assert!(validate("1", bad).is_none(), "lon {:?} should be invalid", bad);
        }
    }

    #[test]
    fn test_validate_accepts_exponent_and_signs() {
        assert_eq!(validate("1e1", "+3").unwrap().token(), "1e1,+3");
        assert_eq!(validate(".5", "-0").unwrap().token(), ".5,-0");
    }

    #[test]
    fn test_validate_accepts_radix_literals() {
        assert_eq!(validate("0x1A", "5").unwrap().token(), "0x1A,5");
        assert_eq!(validate("0o17", "0B101").unwrap().token(), "0o17,0B101");

        for bad in ["-0x1A", "+0b1", "0x", "0xG1", "0o8", "0b102", "0x1.5"] {
            assert!(validate(bad, "1").is_none(), "{:?} should be invalid", bad);
        }
    }

    #[test]
    fn test_validate_strips_byte_order_mark() {
        let point = validate("\u{feff}12.5", "-8.3\u{feff} ").unwrap();
        assert_eq!(point.token(), "12.5,-8.3");

        assert!(validate("\u{feff}", "1").is_none());
        assert!(validate("\u{a0}4\u{3000}", "1").is_some());
    }

    #[test]
    fn test_point_form_read() {
        let form = PointForm::with_values("12.5", "-8.3");
        assert_eq!(form.read_point().unwrap().token(), "12.5,-8.3");

        form.set_longitude("");
        assert!(form.read_point().is_none());
    }

    #[test]
    fn test_detached_form_is_invalid() {
        let form = PointForm::with_values("1", "2");
        form.detach();
        assert!(form.latitude().is_none());
        assert!(form.read_point().is_none());

        // Setting a field on a detached form does not bring it back.
        form.set_latitude("3");
        assert!(form.read_point().is_none());
    }

    proptest! {
        #[test]
        fn prop_finite_values_round_trip(
            lat in -90.0f64..90.0,
            lon in -180.0f64..180.0,
            pad in "[ \t]{0,3}",
        ) {
            let raw_lat = format!("{}{}{}", pad, lat, pad);
            let raw_lon = format!("{}{}", lon, pad);
            let point = validate(&raw_lat, &raw_lon).unwrap();
            prop_assert_eq!(point.token(), format!("{},{}", lat, lon));
        }

        #[test]
        fn prop_blank_fields_are_invalid(blank in "[ \t\n]{0,4}", other in -90.0f64..90.0) {
            let other = other.to_string();
            prop_assert!(validate(&blank, &other).is_none());
            prop_assert!(validate(&other, &blank).is_none());
        }

        #[test]
        fn prop_alphabetic_text_is_invalid(word in "[g-zG-Z]{1,8}") {
            prop_assert!(validate(&word, "1").is_none());
        }
    }
}
