//! Atomic publication of the run outputs.
//!
//! Every document is staged to a uuid-suffixed temp file next to its final
//! path and fsynced. Renames only start once all documents are staged, and
//! the lookup artifact is renamed last, so a consumer that sees a new
//! artifact also sees the matching report. If the artifact rename fails, the
//! companion documents already renamed are rolled back to their previous
//! contents.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::PublishError;

use super::artifact::to_pretty_json;
use super::config::PipelineConfig;
use super::PipelineOutput;

/// Final locations of the published documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPaths {
    pub artifact: PathBuf,
    pub report: PathBuf,
    pub enriched: Option<PathBuf>,
}

fn io_error(path: &Path, e: &io::Error) -> PublishError {
    PublishError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// One document written to a temp file and renamed into place on commit.
///
/// Dropping an uncommitted writer removes the temp file.
struct StagedFile {
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
}

impl StagedFile {
    fn write(final_path: PathBuf, bytes: &[u8]) -> Result<Self, PublishError> {
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = final_path.with_file_name(format!(".{file_name}.tmp.{}", Uuid::new_v4()));

        // Construct first so a failed write still cleans up.
        let staged = Self {
            temp_path: Some(temp_path.clone()),
            final_path,
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| io_error(&temp_path, &e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes).map_err(|e| io_error(&temp_path, &e))?;
        writer.flush().map_err(|e| io_error(&temp_path, &e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| io_error(&temp_path, &e))?;

        Ok(staged)
    }

    fn commit(mut self) -> Result<Committed, PublishError> {
        let final_path = self.final_path.clone();
        let Some(temp_path) = self.temp_path.take() else {
            return Ok(Committed {
                final_path,
                backup: None,
            });
        };

        let backup = match preserve(&final_path) {
            Ok(backup) => backup,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            if let Some(backup) = backup {
                let _ = fs::remove_file(backup);
            }
            return Err(io_error(&final_path, &e));
        }
        Ok(Committed { final_path, backup })
    }
}

/// Links the current document at `path` to a side name so it can be put
/// back. `None` when nothing was published there yet.
fn preserve(path: &Path) -> Result<Option<PathBuf>, PublishError> {
    if !path.exists() {
        return Ok(None);
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup = path.with_file_name(format!(".{file_name}.bak.{}", Uuid::new_v4()));
    if fs::hard_link(path, &backup).is_err() {
        fs::copy(path, &backup).map_err(|e| io_error(path, &e))?;
    }
    Ok(Some(backup))
}

/// A document renamed into place, still able to roll back.
struct Committed {
    final_path: PathBuf,
    backup: Option<PathBuf>,
}

impl Committed {
    /// Drops the previous version.
    fn settle(self) -> PathBuf {
        if let Some(ref backup) = self.backup {
            let _ = fs::remove_file(backup);
        }
        self.final_path
    }

    /// Puts the previous version back, or removes the document if there
    /// was none.
    fn restore(self) {
        let result = match &self.backup {
            Some(backup) => fs::rename(backup, &self.final_path),
            None => fs::remove_file(&self.final_path),
        };
        if let Err(e) = result {
            warn!(path = %self.final_path.display(), error = %e, "could not roll back published document");
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(ref temp_path) = self.temp_path {
            let _ = fs::remove_file(temp_path);
        }
    }
}

fn sync_dir(dir: &Path) {
    // Not supported on every platform; the renames are already visible.
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

/// Writes the artifact, report and optional enriched lookup under
/// `config.output_dir`.
///
/// # Errors
/// Serialization or I/O failures. A failure before the commit phase leaves
/// any previously published documents untouched.
pub fn publish(output: &PipelineOutput, config: &PipelineConfig) -> Result<PublishedPaths, PublishError> {
    let dir = &config.output_dir;
    fs::create_dir_all(dir).map_err(|e| io_error(dir, &e))?;

    let artifact_bytes = output.artifact.to_json_bytes()?;
    let report_bytes = to_pretty_json(&output.report)?;

    let enriched = match (&output.enriched, &config.enriched_file_name) {
        (Some(enriched), Some(name)) => Some(StagedFile::write(dir.join(name), &enriched.to_json_bytes()?)?),
        _ => None,
    };
    let report = StagedFile::write(dir.join(&config.stats_file_name), &report_bytes)?;
    let artifact = StagedFile::write(dir.join(&config.artifact_file_name), &artifact_bytes)?;
    debug!(dir = %dir.display(), "outputs staged");

    let enriched = enriched.map(StagedFile::commit).transpose()?;
    let report = match report.commit() {
        Ok(report) => report,
        Err(e) => {
            if let Some(enriched) = enriched {
                enriched.restore();
            }
            return Err(e);
        }
    };
    let artifact = match artifact.commit() {
        Ok(artifact) => artifact.settle(),
        Err(e) => {
            report.restore();
            if let Some(enriched) = enriched {
                enriched.restore();
            }
            sync_dir(dir);
            return Err(e);
        }
    };
    let report = report.settle();
    let enriched = enriched.map(Committed::settle);
    sync_dir(dir);

    info!(
        artifact = %artifact.display(),
        entries = output.artifact.len(),
        digest = %output.report.artifact_digest,
        "lookup published"
    );
    Ok(PublishedPaths {
        artifact,
        report,
        enriched,
    })
}
