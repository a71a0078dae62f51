//! Writing cleaned frames to disk.
//!
//! Files are laid out per domain:
//!
//! ```text
//! {output_dir}/{domain}/data.csv
//! {output_dir}/{domain}/data.parquet
//! {output_dir}/{domain}/{column}={value}/data.parquet   (partitioned)
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! failed export never leaves a truncated `data.*` behind.

mod csv;
mod parquet;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::frame::{Cell, Frame};

pub use self::csv::write_csv;
pub use self::parquet::write_parquet;

/// Base file name of every exported artifact.
pub const DATA_FILE_STEM: &str = "data";

/// Directory label used for null partition values.
pub const NULL_PARTITION_LABEL: &str = "__HIVE_DEFAULT_PARTITION__";

/// Errors raised while exporting a frame.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The frame has no rows.
    #[error("nothing to export for domain {domain}: the frame has no rows")]
    NothingToExport {
        /// Domain being exported.
        domain: String,
    },

    /// Partitioned export named a column the frame does not have.
    #[error("cannot partition domain {domain} by {column:?}: no such column (available: {available})")]
    MissingPartitionColumn {
        /// Domain being exported.
        domain: String,
        /// Requested partition column.
        column: String,
        /// Comma-separated list of existing columns.
        available: String,
    },

    /// Neither CSV nor Parquet was requested.
    #[error("no output format selected: enable at least one of CSV or Parquet")]
    NoFormatSelected,

    /// Filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding failure.
    #[error("CSV write failed for {path}: {source}")]
    Csv {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ::csv::Error,
    },

    /// Parquet encoding failure.
    #[error("Parquet write failed for {path}: {source}")]
    Parquet {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ::parquet::errors::ParquetError,
    },
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// On-disk output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Comma-separated text with a header row.
    Csv,
    /// Columnar Apache Parquet.
    Parquet,
}

impl ExportFormat {
    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which formats an export should write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSelection {
    /// Write `data.csv`.
    pub csv: bool,
    /// Write `data.parquet`.
    pub parquet: bool,
}

impl Default for FormatSelection {
    fn default() -> Self {
        Self {
            csv: true,
            parquet: true,
        }
    }
}

impl FormatSelection {
    /// Builds a selection from two flags.
    #[must_use]
    pub fn new(csv: bool, parquet: bool) -> Self {
        Self { csv, parquet }
    }

    /// Fails unless at least one format is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::NoFormatSelected`] when both flags are off.
    pub fn validate(self) -> Result<Self, ExportError> {
        if self.csv || self.parquet {
            Ok(self)
        } else {
            Err(ExportError::NoFormatSelected)
        }
    }

    /// Enabled formats in write order.
    #[must_use]
    pub fn formats(self) -> Vec<ExportFormat> {
        let mut formats = Vec::with_capacity(2);
        if self.csv {
            formats.push(ExportFormat::Csv);
        }
        if self.parquet {
            formats.push(ExportFormat::Parquet);
        }
        formats
    }
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParquetCompression {
    /// Snappy (default).
    #[default]
    Snappy,
    /// Gzip at the default level.
    Gzip,
    /// Brotli at the default level.
    Brotli,
    /// Uncompressed pages.
    None,
}

impl ParquetCompression {
    /// Accepted names, as shown to users.
    pub const NAMES: [&'static str; 4] = ["snappy", "gzip", "brotli", "none"];

    /// Lowercase codec name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::Brotli => "brotli",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ParquetCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParquetCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "gzip" => Ok(Self::Gzip),
            "brotli" => Ok(Self::Brotli),
            "none" | "uncompressed" => Ok(Self::None),
            other => Err(format!(
                "unknown compression {other:?}; expected one of: {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Files written by one export call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportArtifacts {
    entries: Vec<(ExportFormat, PathBuf)>,
}

impl ExportArtifacts {
    /// Records a written file.
    pub fn push(&mut self, format: ExportFormat, path: PathBuf) {
        self.entries.push((format, path));
    }

    /// Moves every entry of `other` onto the end of this set.
    pub fn append(&mut self, mut other: ExportArtifacts) {
        self.entries.append(&mut other.entries);
    }

    /// All `(format, path)` pairs in write order.
    #[must_use]
    pub fn entries(&self) -> &[(ExportFormat, PathBuf)] {
        &self.entries
    }

    /// Paths only.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(_, path)| path.as_path())
    }

    /// First path written in `format`, if any.
    #[must_use]
    pub fn path_for(&self, format: ExportFormat) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, path)| path.as_path())
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes `frame` to `{output_dir}/{domain_code}/data.{ext}` for each selected format.
///
/// # Errors
///
/// Fails before touching the filesystem if the frame is empty or no format is
/// selected; otherwise returns the first I/O or encoding error.
#[instrument(skip(frame, output_dir), fields(rows = frame.len(), dir = %output_dir.display()))]
pub fn export(
    frame: &Frame,
    domain_code: &str,
    output_dir: &Path,
    formats: FormatSelection,
    compression: ParquetCompression,
) -> Result<ExportArtifacts, ExportError> {
    if frame.is_empty() {
        return Err(ExportError::NothingToExport {
            domain: domain_code.to_string(),
        });
    }
    let formats = formats.validate()?;

    let dir = output_dir.join(domain_code);
    ensure_dir(&dir)?;

    let mut artifacts = ExportArtifacts::default();
    for format in formats.formats() {
        let path = dir.join(format!("{DATA_FILE_STEM}.{}", format.extension()));
        match format {
            ExportFormat::Csv => write_csv(frame, &path)?,
            ExportFormat::Parquet => write_parquet(frame, &path, compression)?,
        }
        debug!(%format, path = %path.display(), "wrote artifact");
        artifacts.push(format, path);
    }

    info!(domain = domain_code, files = artifacts.len(), rows = frame.len(), "export complete");
    Ok(artifacts)
}

/// Writes one Parquet file per distinct value of `partition_column`.
///
/// Files land in `{output_dir}/{domain_code}/{column}={value}/data.parquet`;
/// null values use [`NULL_PARTITION_LABEL`].
///
/// # Errors
///
/// Fails before touching the filesystem if the frame is empty or lacks the
/// column; otherwise returns the first I/O or encoding error.
#[instrument(skip(frame, output_dir), fields(rows = frame.len(), dir = %output_dir.display()))]
pub fn export_partitioned(
    frame: &Frame,
    domain_code: &str,
    partition_column: &str,
    output_dir: &Path,
    compression: ParquetCompression,
) -> Result<ExportArtifacts, ExportError> {
    if frame.is_empty() {
        return Err(ExportError::NothingToExport {
            domain: domain_code.to_string(),
        });
    }
    let groups = frame
        .partition_by(partition_column)
        .ok_or_else(|| ExportError::MissingPartitionColumn {
            domain: domain_code.to_string(),
            column: partition_column.to_string(),
            available: frame.columns().join(", "),
        })?;

    let base = output_dir.join(domain_code);
    let mut artifacts = ExportArtifacts::default();
    for (value, group) in &groups {
        let dir = base.join(format!("{partition_column}={}", partition_label(value)));
        ensure_dir(&dir)?;
        let path = dir.join(format!("{DATA_FILE_STEM}.{}", ExportFormat::Parquet.extension()));
        write_parquet(group, &path, compression)?;
        debug!(partition = %value, rows = group.len(), path = %path.display(), "wrote partition");
        artifacts.push(ExportFormat::Parquet, path);
    }

    info!(
        domain = domain_code,
        column = partition_column,
        partitions = artifacts.len(),
        "partitioned export complete"
    );
    Ok(artifacts)
}

/// Directory-safe label for a partition value.
#[must_use]
pub fn partition_label(value: &Cell) -> String {
    if value.is_null() {
        return NULL_PARTITION_LABEL.to_string();
    }
    value
        .to_string()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

fn ensure_dir(dir: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))
}

/// Temporary sibling used while `path` is being written.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Runs `write` against a temporary file, then renames it over `path`.
///
/// The temporary file is removed if `write` fails.
fn write_atomically<F>(path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(fs::File, &Path) -> Result<(), ExportError>,
{
    let tmp = temp_path(path);
    let file = fs::File::create(&tmp).map_err(|e| ExportError::io(&tmp, e))?;
    if let Err(error) = write(file, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(error);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ExportError::io(path, e)
    })
}
