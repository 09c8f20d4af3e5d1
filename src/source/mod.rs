//! Pipeline inputs.
//!
//! The postcode source is a large delimited file read row by row through
//! [`PostcodeReader`]; the roster is a small JSON document loaded whole.

mod csv;
mod read_ahead;
mod roster;

pub use csv::{split_fields, ColumnLayout, PostcodeReader, ReaderOptions};
pub use read_ahead::{ReadAhead, ReadTimeout};
pub use roster::load_roster;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::postcode::format_postcode;

/// One row of the postcode source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostcodeRecord {
    /// 1-based line number in the source, header included.
    pub row: u64,
    /// Postcode as written in the source.
    pub postcode: String,
    /// Raw administrative area name.
    pub area_name: String,
    /// Whether the postcode is in use.
    pub is_active: bool,
    /// Non-required columns as `(header, value)` pairs, in column order.
    /// Empty unless the reader was asked to carry them.
    pub auxiliary: Vec<(String, String)>,
}

impl PostcodeRecord {
    /// The artifact key for this row: the postcode in display form.
    #[must_use]
    pub fn postcode_key(&self) -> String {
        format_postcode(&self.postcode)
    }
}

/// Why a row was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    /// Postcode column absent or blank.
    MissingPostcode,
    /// Area name column absent or blank on an active row.
    MissingAreaName,
    /// Postcode present but not shaped like a UK postcode.
    InvalidPostcode,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPostcode => write!(f, "missing postcode"),
            Self::MissingAreaName => write!(f, "missing area name"),
            Self::InvalidPostcode => write!(f, "invalid postcode"),
        }
    }
}

/// Item yielded by [`PostcodeReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRow {
    /// A complete row.
    Record(PostcodeRecord),
    /// A row missing a required value; it is counted and skipped.
    Malformed {
        /// 1-based line number.
        row: u64,
        /// What was missing.
        reason: MalformedReason,
    },
}
