//! The batch pipeline: postcode source in, lookup artifact and report out.
//!
//! A run streams the source once. Rows are classified (malformed, inactive,
//! matched, unmatched) either inline on the reading thread or by a fixed pool
//! of match workers, and every outcome is folded into a single accumulator.
//! Nothing is written until the run completes; [`publish`] then writes all
//! documents atomically.
//!
//! Only source failures and roster integrity violations abort a run.
//! Everything else is counted.

mod artifact;
mod config;
mod publish;
mod stage;
mod stats;
mod workers;

pub use artifact::{EnrichedEntry, EnrichedLookup, LookupArtifact};
pub use config::{ArtifactGranularity, PipelineConfig};
pub use publish::{publish, PublishedPaths};
pub use stats::{
    AliasReport, AliasUsage, Coverage, DuplicatePostcode, NameCount, RunTotals, StatisticsReport, TierCounts,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::alias::AliasTable;
use crate::error::{SeatmapResult, SourceError};
use crate::index::RepresentativeIndex;
use crate::matcher::{FuzzyPolicy, MatchResult, Matcher};
use crate::representative::Representative;
use crate::source::{load_roster, PostcodeReader, SourceRow};

use stage::RowMatcher;
use stats::{Accumulator, ReportSettings};
use workers::MatchPool;

/// Results of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub artifact: LookupArtifact,
    /// Present when the run carried auxiliary columns.
    pub enriched: Option<EnrichedLookup>,
    pub report: StatisticsReport,
    /// One resolution per distinct matched postcode, sorted by postcode.
    /// Kept at postcode level whatever the artifact granularity.
    pub results: Vec<MatchResult>,
    /// Every unresolved normalized area name with its row count.
    pub unmatched: BTreeMap<String, u64>,
}

/// Execution settings for [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub fuzzy_policy: FuzzyPolicy,
    pub granularity: ArtifactGranularity,
    pub match_workers: usize,
    pub channel_capacity: usize,
    pub batch_size: usize,
    pub top_unmatched: usize,
    pub progress_interval: u64,
    /// Build the enriched lookup alongside the artifact.
    pub carry_enriched: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for RunOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            fuzzy_policy: config.fuzzy_policy,
            granularity: config.granularity,
            match_workers: config.match_workers,
            channel_capacity: config.channel_capacity,
            batch_size: config.batch_size,
            top_unmatched: config.top_unmatched,
            progress_interval: config.progress_interval,
            carry_enriched: config.enriched_file_name.is_some(),
        }
    }
}

/// A validated roster and alias table, ready to process sources.
#[derive(Debug, Clone)]
pub struct Pipeline {
    matcher: Matcher,
    options: RunOptions,
}

impl Pipeline {
    /// Builds the representative index.
    ///
    /// # Errors
    /// `IntegrityError` if two active representatives share an area or the
    /// roster has no active representatives.
    pub fn new(representatives: &[Representative], aliases: AliasTable, options: RunOptions) -> SeatmapResult<Self> {
        let index = RepresentativeIndex::build(representatives)?;
        let summary = index.summary();
        info!(
            indexed = index.len(),
            roster = summary.roster_size,
            inactive = summary.inactive,
            without_area = summary.without_area,
            aliases = aliases.len(),
            "representative index built"
        );
        let matcher = Matcher::new(Arc::new(index), Arc::new(aliases)).with_policy(options.fuzzy_policy);
        Ok(Self { matcher, options })
    }

    /// The matcher this pipeline resolves area names with.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Streams `source` to completion.
    ///
    /// # Errors
    /// The first `SourceError` the source yields aborts the run and no
    /// output is produced.
    pub fn run<I>(&self, source: I) -> SeatmapResult<PipelineOutput>
    where
        I: IntoIterator<Item = Result<SourceRow, SourceError>>,
    {
        let started = Instant::now();
        let options = &self.options;
        info!(
            workers = options.match_workers,
            policy = ?options.fuzzy_policy,
            granularity = ?options.granularity,
            "pipeline run started"
        );

        let accumulator = Accumulator::new(options.carry_enriched, options.progress_interval);
        let accumulator = if options.match_workers <= 1 {
            self.run_inline(source, accumulator)?
        } else {
            self.run_pooled(source, accumulator)?
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let finished = accumulator.finish(
            &self.matcher,
            ReportSettings {
                granularity: options.granularity,
                top_unmatched: options.top_unmatched,
                elapsed_ms,
            },
        )?;

        let report = &finished.report;
        info!(
            rows = report.totals.rows_scanned,
            active = report.totals.active,
            matched = report.totals.matched,
            unmatched = report.totals.unmatched,
            match_rate = report.match_rate,
            entries = report.totals.artifact_entries,
            elapsed_ms,
            "pipeline run finished"
        );
        if report.totals.unmatched > 0 {
            warn!(
                distinct = report.distinct_unmatched,
                rows = report.totals.unmatched,
                "area names without a representative"
            );
        }

        Ok(PipelineOutput {
            artifact: finished.artifact,
            enriched: finished.enriched,
            report: finished.report,
            results: finished.results,
            unmatched: finished.unmatched,
        })
    }

    fn run_inline<I>(&self, source: I, mut accumulator: Accumulator) -> SeatmapResult<Accumulator>
    where
        I: IntoIterator<Item = Result<SourceRow, SourceError>>,
    {
        let mut rows = RowMatcher::new(self.matcher.clone());
        for row in source {
            accumulator.record(rows.classify(row?));
        }
        Ok(accumulator)
    }

    fn run_pooled<I>(&self, source: I, accumulator: Accumulator) -> SeatmapResult<Accumulator>
    where
        I: IntoIterator<Item = Result<SourceRow, SourceError>>,
    {
        let options = &self.options;
        let batch_size = options.batch_size.max(1);
        let pool = MatchPool::start(options.match_workers, options.channel_capacity, &self.matcher, accumulator)?;

        let mut batch = Vec::with_capacity(batch_size);
        for row in source {
            match row {
                Ok(row) => batch.push(row),
                Err(e) => {
                    // Let the pool wind down before reporting.
                    let _ = pool.finish();
                    return Err(e.into());
                }
            }
            if batch.len() == batch_size {
                pool.submit(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)))?;
            }
        }
        if !batch.is_empty() {
            pool.submit(batch)?;
        }
        debug!("source drained");
        pool.finish()
    }
}

/// Runs one source against a roster and alias table.
///
/// # Errors
/// See [`Pipeline::new`] and [`Pipeline::run`].
pub fn run<I>(
    source: I,
    representatives: &[Representative],
    aliases: AliasTable,
    options: RunOptions,
) -> SeatmapResult<PipelineOutput>
where
    I: IntoIterator<Item = Result<SourceRow, SourceError>>,
{
    Pipeline::new(representatives, aliases, options)?.run(source)
}

/// The alias table a config asks for: entries from `alias_path` first,
/// then the built-in table for names the file does not cover.
///
/// # Errors
/// Source or integrity errors from the alias file.
pub fn load_aliases(config: &PipelineConfig) -> SeatmapResult<AliasTable> {
    let mut table = match &config.alias_path {
        Some(path) => AliasTable::from_json_file(path)?,
        None => AliasTable::new(),
    };
    if config.builtin_aliases {
        let shadowed = table.extend_from(&AliasTable::boundary_review_2024());
        if !shadowed.is_empty() {
            debug!(count = shadowed.len(), "built-in aliases overridden by alias file");
        }
    }
    Ok(table)
}

/// Loads every input named by `config` and runs the pipeline.
///
/// # Errors
/// Config, source or integrity errors. The roster is validated before the
/// postcode source is opened.
pub fn run_from_config(config: &PipelineConfig) -> SeatmapResult<PipelineOutput> {
    let config = config.clone().validate()?;
    let roster = load_roster(&config.roster_path)?;
    let aliases = load_aliases(&config)?;
    let pipeline = Pipeline::new(&roster, aliases, RunOptions::from(&config))?;

    let reader = PostcodeReader::open(&config.postcode_source, &config.reader_options())?;
    info!(
        source = %config.postcode_source.display(),
        area_column = reader.layout().area_header(),
        "postcode source opened"
    );
    pipeline.run(reader)
}

/// Runs the pipeline and publishes its outputs.
///
/// # Errors
/// Any run error, or a publish error. Nothing is published unless the run
/// completed.
pub fn build(config: &PipelineConfig) -> SeatmapResult<(PipelineOutput, PublishedPaths)> {
    let output = run_from_config(config)?;
    let paths = publish(&output, config)?;
    Ok((output, paths))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::SeatmapError;
    use crate::matcher::MatchTier;
    use crate::representative::RepresentativeId;
    use crate::source::PostcodeRecord;

    fn roster() -> Vec<Representative> {
        vec![
            Representative::new("1", "A", "Ipswich", "X"),
            Representative::new("2", "B", "Norwich North", "Y"),
        ]
    }

    fn row(row: u64, postcode: &str, area: &str) -> Result<SourceRow, SourceError> {
        Ok(SourceRow::Record(PostcodeRecord {
            row,
            postcode: postcode.to_string(),
            area_name: area.to_string(),
            is_active: true,
            auxiliary: Vec::new(),
        }))
    }

    #[test]
    fn test_inline_and_pooled_runs_agree() {
        let source = || {
            (0..500u64).map(|i| {
                let area = match i % 3 {
                    0 => "Ipswich",
                    1 => "Norwich North",
                    _ => "Atlantis",
                };
                row(i + 2, &format!("IP{} {}AA", i % 40, i % 9), area)
            })
        };

        let inline = run(source(), &roster(), AliasTable::new(), RunOptions::default()).unwrap();
        let pooled = run(
            source(),
            &roster(),
            AliasTable::new(),
            RunOptions {
                match_workers: 4,
                batch_size: 7,
                channel_capacity: 2,
                ..RunOptions::default()
            },
        )
        .unwrap();

        assert_eq!(inline.artifact, pooled.artifact);
        assert_eq!(inline.report.totals, pooled.report.totals);
        assert_eq!(inline.report.artifact_digest, pooled.report.artifact_digest);
        assert_eq!(inline.unmatched, pooled.unmatched);
        assert_eq!(inline.results, pooled.results);
        assert_eq!(inline.results.len(), inline.artifact.len());
    }

    fn failing_source() -> Vec<Result<SourceRow, SourceError>> {
        vec![
            row(2, "IP1 1AA", "Ipswich"),
            Err(SourceError::Read {
                path: "pc.csv".into(),
                row: 3,
                reason: "disk gone".to_string(),
            }),
            row(4, "IP1 1AB", "Ipswich"),
        ]
    }

    #[test]
    fn test_source_error_aborts_run() {
        for workers in [1, 3] {
            let options = RunOptions {
                match_workers: workers,
                batch_size: 1,
                ..RunOptions::default()
            };
            let err = run(failing_source(), &roster(), AliasTable::new(), options).unwrap_err();
            assert!(err.is_source());
        }
    }

    #[test]
    fn test_roster_conflict_fails_before_reading() {
        let mut reps = roster();
        reps.push(Representative::new("3", "C", "IPSWICH", "Z"));
        let mut pulled = false;
        let source = std::iter::from_fn(|| {
            pulled = true;
            None::<Result<SourceRow, SourceError>>
        });
        let err = run(source, &reps, AliasTable::new(), RunOptions::default()).unwrap_err();
        assert!(matches!(err, SeatmapError::Integrity(_)));
        assert!(!pulled);
    }

    #[test]
    fn test_alias_rows_are_reported() {
        let aliases = AliasTable::from_entries([("norwich n", "norwich north")]).unwrap();
        let out = run(
            vec![row(2, "nr11aa", "Norwich N"), row(3, "IP1 1AA", "Ipswich")],
            &roster(),
            aliases,
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(out.artifact.get("NR1 1AA"), Some(&RepresentativeId::from("2")));
        assert_eq!(out.report.tiers.alias, 1);
        assert_eq!(out.report.tiers.exact, 1);
        assert_eq!(out.report.aliases.used[0].rows, 1);

        let tiers: Vec<_> = out
            .results
            .iter()
            .map(|r| (r.postcode.as_str(), r.match_tier, r.matched_area_name.as_str()))
            .collect();
        assert_eq!(
            tiers,
            vec![
                ("IP1 1AA", MatchTier::Exact, "ipswich"),
                ("NR1 1AA", MatchTier::Alias, "norwich north"),
            ]
        );
    }

    #[test]
    fn test_config_aliases_prefer_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(&path, r#"[{"from": "Angus", "to": "Dundee Central"}]"#).unwrap();

        let config = PipelineConfig {
            alias_path: Some(path),
            ..PipelineConfig::default()
        };
        let table = load_aliases(&config).unwrap();
        assert_eq!(table.resolve("angus"), Some("dundee central"));
        assert!(table.len() > 1);

        let config = PipelineConfig {
            builtin_aliases: false,
            ..PipelineConfig::default()
        };
        assert!(load_aliases(&config).unwrap().is_empty());
    }
}
