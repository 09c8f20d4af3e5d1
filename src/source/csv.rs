//! Streaming reader for the comma-separated postcode source.
//!
//! Rows are read one line at a time; the file is never materialized. A quoted
//! field may run over several lines, in which case the record keeps the row
//! number of its first line. Required columns are located by case-insensitive
//! substring match on the header row.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::read_ahead::{ReadAhead, ReadTimeout};
use super::{MalformedReason, PostcodeRecord, SourceRow};
use crate::error::SourceError;
use crate::postcode::is_valid_postcode;

/// Header fragments for the postcode column, most specific first.
const POSTCODE_COLUMNS: &[&str] = &["postcode"];

/// Header fragments for the area name column, most specific first. The
/// current boundary set is preferred over older columns when both exist.
const AREA_COLUMNS: &[&str] = &[
    "constituency name 2024",
    "constituency name",
    "parliamentary constituency",
];

/// Header fragments for the in-use flag column.
const IN_USE_COLUMNS: &[&str] = &["in use"];

/// Splits one line into trimmed fields.
///
/// Double quotes toggle quoting; commas inside quotes are kept and a doubled
/// quote inside a quoted field is a literal quote.
///
/// # Examples
///
/// ```
/// use seatmap::source::split_fields;
///
/// let fields = split_fields(r#"AB1 0AA,"Oldham West, Chadderton and Royton",Yes"#);
/// assert_eq!(fields, vec!["AB1 0AA", "Oldham West, Chadderton and Royton", "Yes"]);
/// ```
#[must_use]
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn find_column(headers: &[String], fragments: &[&str]) -> Option<usize> {
    fragments.iter().find_map(|fragment| {
        headers
            .iter()
            .position(|h| h.to_lowercase().contains(fragment))
    })
}

fn is_truthy(value: &str) -> bool {
    let v = value.trim();
    ["yes", "y", "true", "1"]
        .iter()
        .any(|t| v.eq_ignore_ascii_case(t))
}

/// Positions of the required columns within a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    headers: Vec<String>,
    postcode: usize,
    area: usize,
    in_use: usize,
}

impl ColumnLayout {
    /// Locates the required columns in a header row.
    ///
    /// # Errors
    /// `MissingColumn` naming the first required column not found.
    pub fn from_header(path: &Path, header_line: &str) -> Result<Self, SourceError> {
        let headers = split_fields(header_line);
        let missing = |column: &str| SourceError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        };

        let postcode = find_column(&headers, POSTCODE_COLUMNS).ok_or_else(|| missing("postcode"))?;
        let area = find_column(&headers, AREA_COLUMNS).ok_or_else(|| missing("constituency name"))?;
        let in_use = find_column(&headers, IN_USE_COLUMNS).ok_or_else(|| missing("in use"))?;

        Ok(Self {
            headers,
            postcode,
            area,
            in_use,
        })
    }

    /// Header names as they appear in the source.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Header of the column used for area names.
    #[must_use]
    pub fn area_header(&self) -> &str {
        &self.headers[self.area]
    }

    fn is_required(&self, idx: usize) -> bool {
        idx == self.postcode || idx == self.area || idx == self.in_use
    }

    /// Interprets the fields of one data row.
    #[must_use]
    pub fn parse(&self, row: u64, fields: Vec<String>, carry_auxiliary: bool) -> SourceRow {
        let field = |idx: usize| fields.get(idx).map_or("", String::as_str);

        let postcode = field(self.postcode);
        if postcode.is_empty() {
            return SourceRow::Malformed {
                row,
                reason: MalformedReason::MissingPostcode,
            };
        }
        if !is_valid_postcode(postcode) {
            return SourceRow::Malformed {
                row,
                reason: MalformedReason::InvalidPostcode,
            };
        }

        let is_active = is_truthy(field(self.in_use));
        let area_name = field(self.area);
        if is_active && area_name.is_empty() {
            return SourceRow::Malformed {
                row,
                reason: MalformedReason::MissingAreaName,
            };
        }

        let auxiliary = if carry_auxiliary {
            self.headers
                .iter()
                .enumerate()
                .filter(|(idx, _)| !self.is_required(*idx))
                .filter_map(|(idx, header)| {
                    fields
                        .get(idx)
                        .filter(|v| !v.is_empty())
                        .map(|v| (header.clone(), v.clone()))
                })
                .collect()
        } else {
            Vec::new()
        };

        SourceRow::Record(PostcodeRecord {
            row,
            postcode: postcode.to_string(),
            area_name: area_name.to_string(),
            is_active,
            auxiliary,
        })
    }
}

/// How to open and read the postcode source.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Size of the buffered read window.
    pub buffer_bytes: usize,
    /// Longest a single read may block; `None` reads directly without a
    /// background thread.
    pub read_timeout: Option<Duration>,
    /// Whether to keep non-required columns on each record.
    pub carry_auxiliary: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            buffer_bytes: 256 * 1024,
            read_timeout: None,
            carry_auxiliary: false,
        }
    }
}

/// Row-by-row iterator over the postcode source.
pub struct PostcodeReader<R> {
    reader: R,
    path: PathBuf,
    layout: ColumnLayout,
    row: u64,
    buf: Vec<u8>,
    carry_auxiliary: bool,
    finished: bool,
}

impl PostcodeReader<Box<dyn BufRead + Send>> {
    /// Opens a file and reads its header row.
    ///
    /// # Errors
    /// `Unavailable` if the file cannot be opened or is empty, `MissingColumn`
    /// if the header lacks a required column.
    pub fn open(path: impl AsRef<Path>, options: &ReaderOptions) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SourceError::Unavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let capacity = options.buffer_bytes.max(4096);
        let reader: Box<dyn BufRead + Send> = match options.read_timeout {
            Some(timeout) => {
                let ahead = ReadAhead::spawn(file, capacity, 4, Some(timeout)).map_err(|e| {
                    SourceError::Unavailable {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    }
                })?;
                Box::new(BufReader::with_capacity(capacity, ahead))
            }
            None => Box::new(BufReader::with_capacity(capacity, file)),
        };

        Self::from_reader(reader, path, options.carry_auxiliary)
    }
}

impl<R: BufRead> PostcodeReader<R> {
    /// Wraps an already-open reader. `path` is only used in error messages.
    ///
    /// # Errors
    /// As for [`PostcodeReader::open`].
    pub fn from_reader(
        mut reader: R,
        path: impl Into<PathBuf>,
        carry_auxiliary: bool,
    ) -> Result<Self, SourceError> {
        let path = path.into();
        let mut buf = Vec::new();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| map_io(&path, 1, &e))?;
        if n == 0 {
            return Err(SourceError::Unavailable {
                path,
                reason: "source is empty; expected a header row".to_string(),
            });
        }

        let header = String::from_utf8_lossy(&buf);
        let header = header.trim_start_matches('\u{feff}').trim_end();
        let layout = ColumnLayout::from_header(&path, header)?;
        debug!(
            path = %path.display(),
            area_column = layout.area_header(),
            columns = layout.headers().len(),
            "postcode source header parsed"
        );

        Ok(Self {
            reader,
            path,
            layout,
            row: 1,
            buf,
            carry_auxiliary,
            finished: false,
        })
    }

    /// The resolved column layout.
    #[must_use]
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// The source path used in diagnostics.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads one record into `buf`, following an open quote onto the next
    /// line. Returns false at end of input.
    fn read_record(&mut self) -> io::Result<bool> {
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(false);
        }
        while has_open_quote(&self.buf) {
            // An unterminated quote at end of input keeps what was read.
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                break;
            }
            self.row += 1;
        }
        Ok(true)
    }
}

fn has_open_quote(bytes: &[u8]) -> bool {
    bytes.iter().filter(|&&b| b == b'"').count() % 2 == 1
}

fn map_io(path: &Path, row: u64, err: &io::Error) -> SourceError {
    if err.kind() == io::ErrorKind::TimedOut {
        if let Some(timeout) = err.get_ref().and_then(|e| e.downcast_ref::<ReadTimeout>()) {
            return SourceError::Timeout {
                path: path.to_path_buf(),
                timeout_ms: timeout.timeout_ms,
            };
        }
    }
    SourceError::Read {
        path: path.to_path_buf(),
        row,
        reason: err.to_string(),
    }
}

impl<R: BufRead> Iterator for PostcodeReader<R> {
    type Item = Result<SourceRow, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buf.clear();
            self.row += 1;
            let start_row = self.row;
            match self.read_record() {
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Ok(true) => {
                    let line = String::from_utf8_lossy(&self.buf);
                    let line = line.trim_end_matches(&['\n', '\r'][..]);
                    if line.trim().is_empty() {
                        continue;
                    }
                    let fields = split_fields(line);
                    return Some(Ok(self.layout.parse(start_row, fields, self.carry_auxiliary)));
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(map_io(&self.path, self.row, &e)));
                }
            }
        }
        None
    }
}
