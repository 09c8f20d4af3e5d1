//! Area name canonicalization.
//!
//! Every comparison between the postcode source, the roster and the alias
//! table goes through [`normalize_area_name`], so the three sources agree on
//! one key per area regardless of casing, quoting or spacing.

/// Quote characters stripped from either end of a name.
const QUOTES: &[char] = &['"', '\'', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];

/// Punctuation stripped from the edges of a token before fuzzy comparison.
const TOKEN_EDGE_PUNCTUATION: &[char] = &[',', ';', '(', ')'];

fn is_enclosing(c: char) -> bool {
    c.is_whitespace() || QUOTES.contains(&c)
}

/// Canonicalizes a raw area name into a comparable key.
///
/// Strips surrounding whitespace and enclosing quotes, collapses internal
/// whitespace runs to a single space and lower-cases the result. The function
/// is idempotent and never fails; blank input yields an empty string.
///
/// # Examples
///
/// ```
/// use seatmap::normalize_area_name;
///
/// assert_eq!(normalize_area_name("  \"Bristol   West\" "), "bristol west");
/// assert_eq!(normalize_area_name("bristol west"), "bristol west");
/// ```
#[must_use]
pub fn normalize_area_name(raw: &str) -> String {
    let trimmed = raw.trim_matches(is_enclosing);
    let mut out = String::with_capacity(trimmed.len());
    for (i, word) in trimmed.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Splits a normalized name into comparison tokens.
///
/// Tokens are whitespace-separated words with list punctuation removed from
/// their edges, so "west," and "west" compare equal. Empty tokens are skipped.
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split_whitespace()
        .map(|t| t.trim_matches(TOKEN_EDGE_PUNCTUATION))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_quotes_whitespace_and_case() {
        assert_eq!(normalize_area_name("\"Test Constituency\""), "test constituency");
        assert_eq!(normalize_area_name("  Oldham West,   Chadderton and Royton "), "oldham west, chadderton and royton");
        assert_eq!(normalize_area_name("\u{201C}Ynys Môn\u{201D}"), "ynys môn");
        assert_eq!(normalize_area_name("Weston-super-Mare"), "weston-super-mare");
    }

    #[test]
    fn test_blank_input_is_empty() {
        assert_eq!(normalize_area_name(""), "");
        assert_eq!(normalize_area_name("   "), "");
        assert_eq!(normalize_area_name("\"\""), "");
        assert_eq!(normalize_area_name(" ' \" "), "");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let samples = [
            "  \"Bristol   West\" ",
            "' \"Nested\" '",
            "Na h-Eileanan an Iar",
            "\tTabs\tand\nnewlines ",
            "İSTANBUL Road",
            "",
            "\"",
        ];
        for raw in samples {
            let once = normalize_area_name(raw);
            assert_eq!(normalize_area_name(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn test_tokens_drop_list_punctuation() {
        let name = normalize_area_name("Oldham West, Chadderton and Royton");
        let toks: Vec<&str> = tokens(&name).collect();
        assert_eq!(toks, vec!["oldham", "west", "chadderton", "and", "royton"]);
        assert_eq!(tokens(" , ").count(), 0);
    }
}
