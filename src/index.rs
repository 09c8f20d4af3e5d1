//! Representative index keyed by canonical area name.
//!
//! The index is the only place roster data is consulted during matching. It
//! iterates in sorted key order, which is what makes the fuzzy tier
//! reproducible across runs.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::IntegrityError;
use crate::normalize::normalize_area_name;
use crate::representative::{Representative, RepresentativeId};

/// Counts describing what the index build kept and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexBuildSummary {
    /// Roster records seen.
    pub roster_size: usize,
    /// Records skipped because `is_active` was false.
    pub inactive: usize,
    /// Active records skipped because their area name normalized to empty.
    pub without_area: usize,
}

/// In-memory map from canonical area name to the active representative.
#[derive(Debug, Clone)]
pub struct RepresentativeIndex {
    by_area: BTreeMap<String, Representative>,
    area_by_id: HashMap<RepresentativeId, String>,
    summary: IndexBuildSummary,
}

impl RepresentativeIndex {
    /// Builds the index from the active subset of a roster.
    ///
    /// # Errors
    /// - `DuplicateRepresentativeArea` if two active representatives
    ///   normalize to the same area; both ids are reported.
    /// - `EmptyRoster` if no active representative has an area name.
    pub fn build(representatives: &[Representative]) -> Result<Self, IntegrityError> {
        let mut by_area: BTreeMap<String, Representative> = BTreeMap::new();
        let mut area_by_id = HashMap::new();
        let mut summary = IndexBuildSummary {
            roster_size: representatives.len(),
            ..IndexBuildSummary::default()
        };

        for rep in representatives {
            if !rep.is_active {
                summary.inactive += 1;
                continue;
            }
            let key = normalize_area_name(&rep.area_name);
            if key.is_empty() {
                summary.without_area += 1;
                continue;
            }
            if let Some(existing) = by_area.get(&key) {
                return Err(IntegrityError::DuplicateRepresentativeArea {
                    area: key,
                    first: existing.id.to_string(),
                    second: rep.id.to_string(),
                });
            }
            if area_by_id.contains_key(&rep.id) {
                warn!(id = %rep.id, area = %key, "representative id appears for more than one area");
            } else {
                area_by_id.insert(rep.id.clone(), key.clone());
            }
            by_area.insert(key, rep.clone());
        }

        if by_area.is_empty() {
            return Err(IntegrityError::EmptyRoster);
        }

        debug!(
            areas = by_area.len(),
            inactive = summary.inactive,
            without_area = summary.without_area,
            "representative index built"
        );

        Ok(Self {
            by_area,
            area_by_id,
            summary,
        })
    }

    /// Looks up the representative id for a canonical area name.
    #[must_use]
    pub fn get(&self, canonical_area: &str) -> Option<&RepresentativeId> {
        self.by_area.get(canonical_area).map(|rep| &rep.id)
    }

    /// Looks up the full representative record for a canonical area name.
    #[must_use]
    pub fn representative_for_area(&self, canonical_area: &str) -> Option<&Representative> {
        self.by_area.get(canonical_area)
    }

    /// Looks up an indexed representative by id.
    #[must_use]
    pub fn representative(&self, id: &RepresentativeId) -> Option<&Representative> {
        self.area_by_id
            .get(id)
            .and_then(|area| self.by_area.get(area))
    }

    /// Returns true if the canonical area name has an active representative.
    #[must_use]
    pub fn contains_area(&self, canonical_area: &str) -> bool {
        self.by_area.contains_key(canonical_area)
    }

    /// Iterates `(canonical area, representative)` pairs in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Representative)> {
        self.by_area.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of indexed areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_area.len()
    }

    /// Returns true if nothing is indexed. A built index is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_area.is_empty()
    }

    /// What the build kept and dropped.
    #[must_use]
    pub const fn summary(&self) -> IndexBuildSummary {
        self.summary
    }
}
