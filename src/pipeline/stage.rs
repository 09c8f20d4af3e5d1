//! Per-row classification shared by the inline and pooled match stages.

use std::collections::HashMap;

use crate::matcher::{AreaMatch, Matcher};
use crate::normalize::normalize_area_name;
use crate::source::{MalformedReason, PostcodeRecord, SourceRow};

/// What happened to one source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RowOutcome {
    Malformed {
        row: u64,
        reason: MalformedReason,
    },
    Inactive,
    Matched {
        record: PostcodeRecord,
        normalized_area: String,
        area: AreaMatch,
    },
    Unmatched {
        row: u64,
        normalized_area: String,
    },
}

/// Matches rows, remembering each distinct area name's result.
///
/// A source with millions of rows names only a few hundred areas, so the
/// cache turns matching into a hash lookup for almost every row.
pub(crate) struct RowMatcher {
    matcher: Matcher,
    cache: HashMap<String, Option<AreaMatch>>,
}

impl RowMatcher {
    pub fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            cache: HashMap::new(),
        }
    }

    pub fn classify(&mut self, row: SourceRow) -> RowOutcome {
        let record = match row {
            SourceRow::Malformed { row, reason } => return RowOutcome::Malformed { row, reason },
            SourceRow::Record(record) if !record.is_active => return RowOutcome::Inactive,
            SourceRow::Record(record) => record,
        };

        let normalized_area = normalize_area_name(&record.area_name);
        let matcher = &self.matcher;
        let hit = self
            .cache
            .entry(normalized_area.clone())
            .or_insert_with(|| matcher.match_normalized(&normalized_area))
            .clone();

        match hit {
            Some(area) => RowOutcome::Matched {
                record,
                normalized_area,
                area,
            },
            None => RowOutcome::Unmatched {
                row: record.row,
                normalized_area,
            },
        }
    }
}
