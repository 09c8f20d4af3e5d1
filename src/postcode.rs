//! UK postcode shape handling.

use std::sync::OnceLock;

use regex::Regex;

/// Inward code length ("0AA" in "SW1A 0AA").
const INWARD_LEN: usize = 3;

/// Standard outward/inward shape, plus the non-geographic Girobank code and
/// the overseas territory codes that share the postcode address file.
const SHAPE_PATTERN: &str = concat!(
    r"^(?:[A-Z]{1,2}[0-9]{1,2}[A-Z]?[0-9][A-Z]{2}",
    r"|GIR0AA",
    r"|(?:ASCN|STHL|TDCU|BBND|BIQQ|FIQQ|PCRN|SIQQ|TKCA)1ZZ",
    r")$",
);

static POSTCODE_SHAPE: OnceLock<Regex> = OnceLock::new();

fn shape() -> &'static Regex {
    // Constant pattern, checked by test_pattern_compiles.
    POSTCODE_SHAPE.get_or_init(|| {
        Regex::new(SHAPE_PATTERN).expect("postcode shape pattern is a valid regex")
    })
}

/// Removes all whitespace and upper-cases.
///
/// # Examples
///
/// ```
/// use seatmap::postcode::canonical_postcode;
///
/// assert_eq!(canonical_postcode(" sw1a 0aa "), "SW1A0AA");
/// ```
#[must_use]
pub fn canonical_postcode(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Returns true if `raw` has the shape of a UK postcode.
///
/// Case and surrounding or embedded whitespace are ignored. This is the one
/// gate both the source reader and the lookup service apply, so anything
/// written to an artifact can be queried back.
#[must_use]
pub fn is_valid_postcode(raw: &str) -> bool {
    shape().is_match(&canonical_postcode(raw))
}

/// The outward part of a canonical postcode ("SW1A" for "SW1A0AA").
///
/// Returns `None` for input too short to carry an inward code or containing
/// non-ASCII characters.
#[must_use]
pub fn postcode_area(canonical: &str) -> Option<&str> {
    if !canonical.is_ascii() || canonical.len() <= INWARD_LEN {
        return None;
    }
    Some(&canonical[..canonical.len() - INWARD_LEN])
}

/// Renders a postcode in display form with a single space before the
/// inward code ("M219WQ" becomes "M21 9WQ").
#[must_use]
pub fn format_postcode(raw: &str) -> String {
    let canonical = canonical_postcode(raw);
    match postcode_area(&canonical) {
        Some(area) if canonical.len() >= INWARD_LEN + 2 => {
            format!("{area} {}", &canonical[area.len()..])
        }
        _ => canonical,
    }
}
