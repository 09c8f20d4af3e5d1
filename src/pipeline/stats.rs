//! Run statistics and the single-owner accumulator that produces them.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::alias::IneffectiveAlias;
use crate::error::SeatmapResult;
use crate::matcher::{FuzzyPolicy, MatchResult, MatchTier, Matcher};
use crate::postcode::{canonical_postcode, postcode_area};
use crate::representative::RepresentativeId;
use crate::source::MalformedReason;

use super::artifact::{EnrichedEntry, EnrichedLookup, LookupArtifact};
use super::config::ArtifactGranularity;
use super::stage::RowOutcome;

const DUPLICATE_SAMPLE_LIMIT: usize = 20;
const TOP_AREA_LIMIT: usize = 10;

/// Row-level totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    /// Data rows read, malformed rows included.
    pub rows_scanned: u64,
    pub malformed: u64,
    pub inactive: u64,
    pub active: u64,
    pub matched: u64,
    pub unmatched: u64,
    /// Active rows whose postcode had already been seen.
    pub duplicate_postcodes: u64,
    /// Entries in the published artifact.
    pub artifact_entries: u64,
}

/// Matched rows per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub exact: u64,
    pub alias: u64,
    pub fuzzy: u64,
}

impl TierCounts {
    fn bump(&mut self, tier: MatchTier) {
        match tier {
            MatchTier::Exact => self.exact += 1,
            MatchTier::Alias => self.alias += 1,
            MatchTier::Fuzzy => self.fuzzy += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.exact + self.alias + self.fuzzy
    }
}

/// A name with an occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCount {
    pub name: String,
    pub count: u64,
}

/// A postcode that appeared on more than one active row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePostcode {
    pub postcode: String,
    /// Row whose mapping was kept (the later one).
    pub kept_row: u64,
    pub dropped_row: u64,
    /// Whether the two rows resolved to different representatives.
    pub conflicting: bool,
}

/// Usage of one alias rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasUsage {
    pub from_name: String,
    pub to_name: String,
    pub rows: u64,
}

/// Alias table health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasReport {
    pub rules: usize,
    pub used: Vec<AliasUsage>,
    pub ineffective: Vec<IneffectiveAlias>,
}

/// How much of the roster the artifact reaches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub indexed_representatives: usize,
    pub representatives_with_postcodes: usize,
    /// Areas holding the most artifact entries.
    pub top_areas: Vec<NameCount>,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub granularity: ArtifactGranularity,
    pub fuzzy_policy: FuzzyPolicy,
    pub totals: RunTotals,
    pub tiers: TierCounts,
    pub malformed_by_reason: BTreeMap<MalformedReason, u64>,
    /// matched / active, 0 when nothing was active.
    pub match_rate: f64,
    pub distinct_unmatched: usize,
    pub top_unmatched: Vec<NameCount>,
    pub duplicate_samples: Vec<DuplicatePostcode>,
    pub aliases: AliasReport,
    pub coverage: Coverage,
    /// Hex blake3 digest of the published artifact bytes.
    pub artifact_digest: String,
}

struct Kept {
    row: u64,
    result: MatchResult,
    enriched: Option<EnrichedEntry>,
}

/// Everything [`Accumulator::finish`] produces.
pub(crate) struct Finished {
    pub artifact: LookupArtifact,
    pub enriched: Option<EnrichedLookup>,
    pub report: StatisticsReport,
    pub results: Vec<MatchResult>,
    pub unmatched: BTreeMap<String, u64>,
}

/// Settings the accumulator needs at finish time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReportSettings {
    pub granularity: ArtifactGranularity,
    pub top_unmatched: usize,
    pub elapsed_ms: u64,
}

/// Folds row outcomes into the artifact and report. Owned by exactly one
/// thread, so no locking.
pub(crate) struct Accumulator {
    totals: RunTotals,
    tiers: TierCounts,
    malformed: BTreeMap<MalformedReason, u64>,
    unmatched: HashMap<String, u64>,
    alias_rows: HashMap<String, u64>,
    entries: HashMap<String, Kept>,
    duplicate_samples: Vec<DuplicatePostcode>,
    carry_enriched: bool,
    progress_interval: u64,
}

impl Accumulator {
    pub fn new(carry_enriched: bool, progress_interval: u64) -> Self {
        Self {
            totals: RunTotals::default(),
            tiers: TierCounts::default(),
            malformed: BTreeMap::new(),
            unmatched: HashMap::new(),
            alias_rows: HashMap::new(),
            entries: HashMap::new(),
            duplicate_samples: Vec::new(),
            carry_enriched,
            progress_interval,
        }
    }

    pub fn record(&mut self, outcome: RowOutcome) {
        self.totals.rows_scanned += 1;
        match outcome {
            RowOutcome::Malformed { row, reason } => {
                debug!(row, %reason, "malformed row skipped");
                self.totals.malformed += 1;
                *self.malformed.entry(reason).or_insert(0) += 1;
            }
            RowOutcome::Inactive => self.totals.inactive += 1,
            RowOutcome::Unmatched { row, normalized_area } => {
                trace!(row, area = %normalized_area, "no representative for area");
                self.totals.active += 1;
                self.totals.unmatched += 1;
                *self.unmatched.entry(normalized_area).or_insert(0) += 1;
            }
            RowOutcome::Matched {
                record,
                normalized_area,
                area,
            } => {
                self.totals.active += 1;
                self.totals.matched += 1;
                self.tiers.bump(area.tier);
                if area.tier == MatchTier::Alias {
                    *self.alias_rows.entry(normalized_area).or_insert(0) += 1;
                }

                let enriched = self.carry_enriched.then(|| EnrichedEntry {
                    representative_id: area.representative_id.clone(),
                    area_name: record.area_name.clone(),
                    match_tier: area.tier,
                    auxiliary: record.auxiliary.iter().cloned().collect(),
                });
                let key = record.postcode_key();
                self.keep(
                    key.clone(),
                    Kept {
                        row: record.row,
                        result: MatchResult::new(key, area),
                        enriched,
                    },
                );
            }
        }

        if self.progress_interval > 0 && self.totals.rows_scanned % self.progress_interval == 0 {
            info!(
                rows = self.totals.rows_scanned,
                matched = self.totals.matched,
                unmatched = self.totals.unmatched,
                "progress"
            );
        }
    }

    /// Later rows win regardless of arrival order, so parallel runs agree
    /// with sequential ones.
    fn keep(&mut self, key: String, incoming: Kept) {
        let Some(existing) = self.entries.get_mut(&key) else {
            self.entries.insert(key, incoming);
            return;
        };

        self.totals.duplicate_postcodes += 1;
        let conflicting = existing.result.representative_id != incoming.result.representative_id;
        let (kept_row, dropped_row) = if incoming.row > existing.row {
            let dropped = existing.row;
            *existing = incoming;
            (existing.row, dropped)
        } else {
            (existing.row, incoming.row)
        };
        if conflicting {
            warn!(postcode = %key, kept_row, dropped_row, "duplicate postcode with conflicting representatives");
        } else {
            debug!(postcode = %key, kept_row, dropped_row, "duplicate postcode");
        }
        if self.duplicate_samples.len() < DUPLICATE_SAMPLE_LIMIT {
            self.duplicate_samples.push(DuplicatePostcode {
                postcode: key,
                kept_row,
                dropped_row,
                conflicting,
            });
        }
    }

    pub fn finish(mut self, matcher: &Matcher, settings: ReportSettings) -> SeatmapResult<Finished> {
        let mut entries: Vec<(String, Kept)> = std::mem::take(&mut self.entries).into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let enriched: Option<EnrichedLookup> = self.carry_enriched.then(|| {
            entries
                .iter_mut()
                .filter_map(|(key, kept)| kept.enriched.take().map(|e| (key.clone(), e)))
                .collect()
        });

        let artifact: LookupArtifact = match settings.granularity {
            ArtifactGranularity::Postcode => entries
                .iter()
                .map(|(key, kept)| (key.clone(), kept.result.representative_id.clone()))
                .collect(),
            ArtifactGranularity::District => district_artifact(&entries),
        };
        // Sorted by postcode; duplicates already resolved to the later row.
        let results: Vec<MatchResult> = entries.into_iter().map(|(_, kept)| kept.result).collect();
        self.totals.artifact_entries = artifact.len() as u64;

        if self.totals.duplicate_postcodes > 0 {
            warn!(
                duplicates = self.totals.duplicate_postcodes,
                "duplicate postcodes in source; later rows kept"
            );
        }

        let unmatched: BTreeMap<String, u64> = self.unmatched.into_iter().collect();
        let top_unmatched = top_counts(unmatched.iter().map(|(k, v)| (k.clone(), *v)), settings.top_unmatched);

        let index = matcher.index();
        let aliases = matcher.aliases();
        let mut used: Vec<AliasUsage> = self
            .alias_rows
            .into_iter()
            .map(|(from_name, rows)| AliasUsage {
                to_name: aliases.resolve(&from_name).unwrap_or_default().to_string(),
                from_name,
                rows,
            })
            .collect();
        used.sort_by(|a, b| b.rows.cmp(&a.rows).then_with(|| a.from_name.cmp(&b.from_name)));
        let ineffective = aliases.ineffective(index);
        if !ineffective.is_empty() {
            warn!(count = ineffective.len(), "alias entries point at unindexed areas");
        }

        let mut per_rep: HashMap<&RepresentativeId, u64> = HashMap::new();
        for (_, id) in artifact.iter() {
            *per_rep.entry(id).or_insert(0) += 1;
        }
        let top_areas = top_counts(
            per_rep.iter().map(|(id, count)| {
                let name = index
                    .representative(id)
                    .map_or_else(|| id.to_string(), |r| r.area_name.clone());
                (name, *count)
            }),
            TOP_AREA_LIMIT,
        );
        let coverage = Coverage {
            indexed_representatives: index.len(),
            representatives_with_postcodes: per_rep.len(),
            top_areas,
        };

        let match_rate = if self.totals.active == 0 {
            0.0
        } else {
            self.totals.matched as f64 / self.totals.active as f64
        };

        let report = StatisticsReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            elapsed_ms: settings.elapsed_ms,
            granularity: settings.granularity,
            fuzzy_policy: matcher.policy(),
            totals: self.totals,
            tiers: self.tiers,
            malformed_by_reason: self.malformed,
            match_rate,
            distinct_unmatched: unmatched.len(),
            top_unmatched,
            duplicate_samples: self.duplicate_samples,
            aliases: AliasReport {
                rules: aliases.len(),
                used,
                ineffective,
            },
            coverage,
            artifact_digest: artifact.digest()?,
        };

        Ok(Finished {
            artifact,
            enriched,
            report,
            results,
            unmatched,
        })
    }
}

/// Each district goes to the representative holding most of its postcodes;
/// ties go to the smallest id.
fn district_artifact(entries: &[(String, Kept)]) -> LookupArtifact {
    let mut votes: BTreeMap<String, BTreeMap<RepresentativeId, u64>> = BTreeMap::new();
    for (key, kept) in entries {
        let canonical = canonical_postcode(key);
        let Some(district) = postcode_area(&canonical) else {
            debug!(postcode = %key, "postcode has no district; left out");
            continue;
        };
        *votes
            .entry(district.to_string())
            .or_default()
            .entry(kept.result.representative_id.clone())
            .or_insert(0) += 1;
    }

    votes
        .into_iter()
        .filter_map(|(district, tally)| {
            // BTreeMap iterates ids ascending; only a strictly larger count
            // displaces the current winner.
            let mut winner: Option<(RepresentativeId, u64)> = None;
            for (id, count) in tally {
                if winner.as_ref().map_or(true, |(_, best)| count > *best) {
                    winner = Some((id, count));
                }
            }
            winner.map(|(id, _)| (district, id))
        })
        .collect()
}

fn top_counts(items: impl Iterator<Item = (String, u64)>, limit: usize) -> Vec<NameCount> {
    let mut all: Vec<NameCount> = items.map(|(name, count)| NameCount { name, count }).collect();
    all.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    all.truncate(limit);
    all
}
