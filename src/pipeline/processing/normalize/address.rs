//! Free-text US address tagging.
//!
//! Tokens are labelled with the usual component names (AddressNumber,
//! StreetName, PlaceName, ...) by position and vocabulary: ZIP and state are
//! read from the tail, house number and pre-directional from the head, and a
//! USPS street suffix splits the street from occupancy and place tokens.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressLabel {
    AddressNumber,
    StreetNamePreDirectional,
    StreetName,
    StreetNamePostType,
    StreetNamePostDirectional,
    OccupancyType,
    OccupancyIdentifier,
    PlaceName,
    StateName,
    ZipCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address is empty")]
    Empty,

    #[error("no address tokens recognized in '{0}'")]
    Unrecognized(String),

    #[error("label {label:?} appears more than once in '{text}'")]
    RepeatedLabel { label: AddressLabel, text: String },
}

/// Tokens of one address with their labels, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub tokens: Vec<(String, AddressLabel)>,
}

impl ParsedAddress {
    /// All tokens carrying `label`, space-joined.
    pub fn get(&self, label: AddressLabel) -> Option<String> {
        let parts: Vec<&str> = self
            .tokens
            .iter()
            .filter(|(_, l)| *l == label)
            .map(|(t, _)| t.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn components(&self) -> AddressComponents {
        use AddressLabel::*;

        let street = match (self.get(StreetName), self.get(StreetNamePostType), self.get(OccupancyIdentifier)) {
            (Some(name), Some(post), Some(occ)) => format!("{name} {post} {occ}"),
            (Some(name), Some(post), None) => format!("{name} {post}"),
            (Some(name), _, _) => name,
            _ => String::new(),
        };

        AddressComponents {
            number: self.get(AddressNumber).unwrap_or_default(),
            direction: self.get(StreetNamePreDirectional).unwrap_or_default(),
            street,
            city: self.get(PlaceName).unwrap_or_default(),
            state: self.get(StateName).unwrap_or_default(),
            zip: self.get(ZipCode).unwrap_or_default(),
        }
    }
}

/// Structured address as stored on an establishment; empty string when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressComponents {
    pub number: String,
    pub direction: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl AddressComponents {
    pub fn blank() -> Self {
        Self::default()
    }
}

/// Parse, falling back to all-blank components when tagging fails.
pub fn extract(text: &str) -> AddressComponents {
    match parse(text) {
        Ok(parsed) => parsed.components(),
        Err(_) => AddressComponents::blank(),
    }
}

/// Collapse spaced hyphens (`1200 - 1204` → `1200-1204`).
pub fn normalize_address_text(address: &str) -> String {
    address
        .replace(" - ", "-")
        .replace(" -", "-")
        .replace("- ", "-")
        .trim()
        .to_string()
}

/// Join the raw address fields into one line for [`parse`], skipping blanks.
pub fn full_address_line(
    address: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
    zip: Option<&str>,
) -> String {
    let address = address.map(normalize_address_text);
    [address.as_deref(), city, state, zip]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn zip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("valid zip regex"))
}

fn house_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d+[A-Z]?(-\d+[A-Z]?)?$").expect("valid house number regex")
    })
}

const DIRECTIONALS: &[&str] = &[
    "N", "S", "E", "W", "NE", "NW", "SE", "SW", "NORTH", "SOUTH", "EAST", "WEST",
];

// Unambiguous suffixes only: PARK, LAKE, SHORE etc. are left out because they
// start street names ("LAKE SHORE DR") and end place names ("OAK PARK").
const STREET_SUFFIXES: &[&str] = &[
    "AVE", "AV", "AVENUE", "ST", "STREET", "BLVD", "BOULEVARD", "RD", "ROAD", "DR", "DRIVE",
    "PL", "PLACE", "CT", "COURT", "PKWY", "PARKWAY", "LN", "LANE", "HWY", "HIGHWAY", "TER",
    "TERRACE", "WAY", "SQ", "SQUARE", "PLZ", "PLAZA", "CIR", "CIRCLE", "TRL", "TRAIL", "EXPY",
    "ROW",
];

const OCCUPANCY_TYPES: &[&str] = &[
    "STE", "SUITE", "UNIT", "APT", "FL", "FLOOR", "RM", "ROOM", "BLDG", "SPC", "LBBY", "LOBBY",
    "#",
];

const STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY", "ILLINOIS", "INDIANA", "WISCONSIN",
];

fn is_one_of(token: &str, vocab: &[&str]) -> bool {
    let upper = token.trim_end_matches('.').to_ascii_uppercase();
    vocab.contains(&upper.as_str())
}

fn is_zip(token: &str) -> bool {
    zip_re().is_match(token)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .map(|t| t.trim_matches(|c: char| c == ';' || c == '"'))
        .filter(|t| t.chars().any(|c| c.is_alphanumeric() || c == '#'))
        .map(str::to_string)
        .collect()
}

/// Tag every token of `text` with an [`AddressLabel`].
pub fn parse(text: &str) -> Result<ParsedAddress, AddressParseError> {
    use AddressLabel::*;

    if text.trim().is_empty() {
        return Err(AddressParseError::Empty);
    }
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Err(AddressParseError::Unrecognized(text.to_string()));
    }

    let n = tokens.len();
    let mut labels: Vec<Option<AddressLabel>> = vec![None; n];
    let mut start = 0usize;
    let mut end = n;

    // Tail: ZIP then state
    if is_zip(&tokens[end - 1]) && end > 1 {
        labels[end - 1] = Some(ZipCode);
        end -= 1;
        if end > 1 && is_zip(&tokens[end - 1]) {
            return Err(AddressParseError::RepeatedLabel {
                label: ZipCode,
                text: text.to_string(),
            });
        }
    }
    if end > 1 && is_one_of(&tokens[end - 1], STATES) {
        labels[end - 1] = Some(StateName);
        end -= 1;
    }

    // Head: house number then pre-directional (only when a name follows)
    if start < end && house_number_re().is_match(&tokens[start].to_ascii_uppercase()) {
        labels[start] = Some(AddressNumber);
        start += 1;
    }
    if start + 1 < end && is_one_of(&tokens[start], DIRECTIONALS) {
        labels[start] = Some(StreetNamePreDirectional);
        start += 1;
    }

    // The suffix must follow at least one name token ("ST LOUIS AVE")
    let suffix_at = (start + 1..end).find(|&i| is_one_of(&tokens[i], STREET_SUFFIXES));

    match suffix_at {
        Some(s) => {
            for label in labels.iter_mut().take(s).skip(start) {
                *label = Some(StreetName);
            }
            labels[s] = Some(StreetNamePostType);
            let mut i = s + 1;
            if i + 1 < end && is_one_of(&tokens[i], DIRECTIONALS) {
                labels[i] = Some(StreetNamePostDirectional);
                i += 1;
            }
            if i < end && tokens[i].starts_with('#') && tokens[i].len() > 1 {
                labels[i] = Some(OccupancyIdentifier);
                i += 1;
            } else if i < end && is_one_of(&tokens[i], OCCUPANCY_TYPES) {
                labels[i] = Some(OccupancyType);
                i += 1;
                if i < end {
                    labels[i] = Some(OccupancyIdentifier);
                    i += 1;
                }
            }
            for label in labels.iter_mut().take(end).skip(i) {
                *label = Some(PlaceName);
            }
        }
        None if end > start + 1 => {
            // No suffix: the final token before the state is the place
            for label in labels.iter_mut().take(end - 1).skip(start) {
                *label = Some(StreetName);
            }
            labels[end - 1] = Some(PlaceName);
        }
        None if end == start + 1 => {
            let lone = if start > 0 { StreetName } else { PlaceName };
            labels[start] = Some(lone);
        }
        None => {}
    }

    let tagged = tokens
        .into_iter()
        .zip(labels)
        .filter_map(|(t, l)| l.map(|l| (t, l)))
        .collect::<Vec<_>>();

    if tagged.is_empty() {
        return Err(AddressParseError::Unrecognized(text.to_string()));
    }
    Ok(ParsedAddress { tokens: tagged })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(number: &str, direction: &str, street: &str, city: &str, state: &str, zip: &str) -> AddressComponents {
        AddressComponents {
            number: number.into(),
            direction: direction.into(),
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip: zip.into(),
        }
    }

    #[test]
    fn test_typical_chicago_address() {
        assert_eq!(
            extract("3301 N CLARK ST CHICAGO IL 60657"),
            components("3301", "N", "CLARK ST", "CHICAGO", "IL", "60657")
        );
    }

    #[test]
    fn test_multi_word_street_and_place() {
        assert_eq!(
            extract("5700 S LAKE SHORE DR CHICAGO IL 60637"),
            components("5700", "S", "LAKE SHORE DR", "CHICAGO", "IL", "60637")
        );
        assert_eq!(
            extract("1100 N HARLEM AVE OAK PARK IL 60302"),
            components("1100", "N", "HARLEM AVE", "OAK PARK", "IL", "60302")
        );
    }

    #[test]
    fn test_saint_is_a_street_name_not_a_suffix() {
        assert_eq!(
            extract("400 N ST LOUIS AVE CHICAGO IL 60624").street,
            "ST LOUIS AVE"
        );
    }

    #[test]
    fn test_occupancy_joins_street() {
        let parsed = extract("35 E WACKER DR STE 100 CHICAGO IL 60601");
        assert_eq!(parsed.street, "WACKER DR 100");
        assert_eq!(parsed.city, "CHICAGO");

        let hash = extract("35 E WACKER DR #7 CHICAGO IL 60601");
        assert_eq!(hash.street, "WACKER DR #7");
    }

    #[test]
    fn test_number_range_and_no_suffix() {
        let parsed = extract(&full_address_line(
            Some("1200 - 1204 W BROADWAY "),
            Some("CHICAGO"),
            Some("IL"),
            Some("60660"),
        ));
        assert_eq!(parsed, components("1200-1204", "W", "BROADWAY", "CHICAGO", "IL", "60660"));
    }

    #[test]
    fn test_empty_input_falls_back_to_blank() {
        assert_eq!(parse(""), Err(AddressParseError::Empty));
        assert_eq!(parse("   "), Err(AddressParseError::Empty));
        assert_eq!(extract(""), AddressComponents::blank());
    }

    #[test]
    fn test_punctuation_only_is_unrecognized() {
        assert!(matches!(parse(" - , "), Err(AddressParseError::Unrecognized(_))));
        assert_eq!(extract(" - , "), AddressComponents::blank());
    }

    #[test]
    fn test_repeated_zip_is_rejected() {
        assert!(matches!(
            parse("100 W MAIN ST CHICAGO 60601 60602"),
            Err(AddressParseError::RepeatedLabel { label: AddressLabel::ZipCode, .. })
        ));
        assert_eq!(extract("100 W MAIN ST CHICAGO 60601 60602"), AddressComponents::blank());
    }

    #[test]
    fn test_missing_fields_never_render_as_nan() {
        let line = full_address_line(Some("1 E ERIE ST"), None, None, None);
        assert_eq!(line, "1 E ERIE ST");
        let parsed = extract(&line);
        assert_eq!(parsed.street, "ERIE ST");
        assert!(!format!("{parsed:?}").contains("nan"));
    }
}
