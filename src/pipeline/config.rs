//! Pipeline configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SeatmapResult, SourceError};
use crate::matcher::FuzzyPolicy;
use crate::source::ReaderOptions;

/// Key granularity of the published artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactGranularity {
    /// One entry per postcode.
    #[default]
    Postcode,
    /// One entry per postcode district (outward code), assigned to the
    /// representative holding most of its postcodes.
    District,
}

/// Everything a pipeline run needs, as passed to the entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Comma-separated postcode source.
    pub postcode_source: PathBuf,
    /// JSON roster of representatives.
    pub roster_path: PathBuf,
    /// Optional JSON alias entries, applied ahead of the built-in table.
    pub alias_path: Option<PathBuf>,
    /// Whether to include the built-in boundary review aliases.
    pub builtin_aliases: bool,
    /// Directory receiving the published documents.
    pub output_dir: PathBuf,
    pub artifact_file_name: String,
    pub stats_file_name: String,
    /// When set, an enriched lookup with auxiliary columns is also published.
    pub enriched_file_name: Option<String>,
    pub granularity: ArtifactGranularity,
    pub fuzzy_policy: FuzzyPolicy,
    /// 1 matches inline on the reading thread; more starts a worker pool.
    pub match_workers: usize,
    /// Batches buffered between reader, workers and accumulator.
    pub channel_capacity: usize,
    /// Rows per batch handed to a worker.
    pub batch_size: usize,
    pub read_buffer_bytes: usize,
    /// Per-read timeout for sources on slow or remote mounts.
    pub read_timeout_ms: Option<u64>,
    /// How many unmatched names (by frequency) the report lists.
    pub top_unmatched: usize,
    /// Log progress every this many rows; 0 disables.
    pub progress_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            postcode_source: PathBuf::from("postcodes.csv"),
            roster_path: PathBuf::from("representatives.json"),
            alias_path: None,
            builtin_aliases: true,
            output_dir: PathBuf::from("out"),
            artifact_file_name: "postcode-lookup.json".to_string(),
            stats_file_name: "postcode-lookup-stats.json".to_string(),
            enriched_file_name: None,
            granularity: ArtifactGranularity::Postcode,
            fuzzy_policy: FuzzyPolicy::Strict,
            match_workers: 1,
            channel_capacity: 16,
            batch_size: 4096,
            read_buffer_bytes: 256 * 1024,
            read_timeout_ms: None,
            top_unmatched: 20,
            progress_interval: 100_000,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn check_file_name(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid(field, "must be a bare file name"));
    }
    Ok(())
}

impl PipelineConfig {
    const MAX_WORKERS: usize = 256;
    const MIN_READ_BUFFER: usize = 4 * 1024;

    /// Checks field ranges, returning the config unchanged on success.
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad field.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.postcode_source.as_os_str().is_empty() {
            return Err(invalid("postcode_source", "must not be empty"));
        }
        if self.roster_path.as_os_str().is_empty() {
            return Err(invalid("roster_path", "must not be empty"));
        }
        check_file_name("artifact_file_name", &self.artifact_file_name)?;
        check_file_name("stats_file_name", &self.stats_file_name)?;
        if let Some(name) = &self.enriched_file_name {
            check_file_name("enriched_file_name", name)?;
        }

        let mut names = vec![&self.artifact_file_name, &self.stats_file_name];
        names.extend(self.enriched_file_name.as_ref());
        names.sort();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(invalid("stats_file_name", "output file names must be distinct"));
        }

        if self.match_workers == 0 || self.match_workers > Self::MAX_WORKERS {
            return Err(invalid(
                "match_workers",
                format!("must be between 1 and {} (got {})", Self::MAX_WORKERS, self.match_workers),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(invalid("channel_capacity", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.read_buffer_bytes < Self::MIN_READ_BUFFER {
            return Err(invalid(
                "read_buffer_bytes",
                format!("must be at least {} bytes (got {})", Self::MIN_READ_BUFFER, self.read_buffer_bytes),
            ));
        }
        if self.read_timeout_ms == Some(0) {
            return Err(invalid("read_timeout_ms", "must be positive when set"));
        }
        Ok(self)
    }

    /// Loads and validates a JSON config file. Missing fields take defaults.
    ///
    /// # Errors
    /// Source errors for unreadable files, config errors for bad values.
    pub fn from_json_file(path: impl AsRef<Path>) -> SeatmapResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| SourceError::Unavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| SourceError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(config.validate()?)
    }

    /// Reader settings derived from this config.
    #[must_use]
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            buffer_bytes: self.read_buffer_bytes,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            carry_auxiliary: self.enriched_file_name.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = PipelineConfig::default().validate().unwrap();
        assert_eq!(cfg.match_workers, 1);
        assert_eq!(cfg.fuzzy_policy, FuzzyPolicy::Strict);
        assert!(!cfg.reader_options().carry_auxiliary);
    }

    #[test]
    fn test_rejects_out_of_range_fields() {
        let cfg = PipelineConfig {
            match_workers: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field, .. }) if field == "match_workers"));

        let cfg = PipelineConfig {
            artifact_file_name: "../escape.json".to_string(),
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig {
            stats_file_name: "postcode-lookup.json".to_string(),
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig {
            read_timeout_ms: Some(0),
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_json_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seatmap.json");
        fs::write(
            &path,
            r#"{"postcode_source": "pc.csv", "fuzzy_policy": "loose", "granularity": "district",
                "enriched_file_name": "enriched.json", "read_timeout_ms": 250}"#,
        )
        .unwrap();

        let cfg = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.postcode_source, PathBuf::from("pc.csv"));
        assert_eq!(cfg.fuzzy_policy, FuzzyPolicy::Loose);
        assert_eq!(cfg.granularity, ArtifactGranularity::District);
        assert_eq!(cfg.batch_size, 4096);

        let opts = cfg.reader_options();
        assert!(opts.carry_auxiliary);
        assert_eq!(opts.read_timeout, Some(Duration::from_millis(250)));
    }
}
