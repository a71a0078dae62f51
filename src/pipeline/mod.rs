//! Fetch, clean and export orchestration.
//!
//! [`run_pipeline`] drives one domain through
//! `Sizing -> Fetching -> ValidatingRaw -> Cleaning -> ValidatingClean -> Exporting`.
//! Only the sizing step recovers locally; every other failure ends the run
//! with a [`PipelineError`] naming the stage.
//!
//! [`run_pipeline_batch`] runs domains one after another through the same
//! client, so the shared rate limit applies across the whole batch. A
//! failing domain is recorded in the [`BatchReport`] and the batch moves on.

mod error;

use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, truncate_chars};
use crate::endpoints::{self, DEFAULT_LANG, DataQuery, datasize_payload, estimated_rows};
use crate::export::{
    ExportArtifacts, ExportError, FormatSelection, ParquetCompression, export, export_partitioned,
};
use crate::frame::{clean_response, has_data};

pub use error::{PipelineError, PipelineStage};

/// Characters of the raw response kept in diagnostics.
pub const RAW_PREVIEW_CHARS: usize = 500;

/// Characters of the first list item kept in debug output.
const FIRST_ITEM_PREVIEW_CHARS: usize = 300;

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Settings shared by every domain of a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Language segment of the API paths.
    pub lang: String,
    /// Root directory for exported files.
    pub output_dir: PathBuf,
    /// Formats to write.
    pub formats: FormatSelection,
    /// Parquet codec.
    pub compression: ParquetCompression,
    /// Filters and display flags for the data request.
    pub query: DataQuery,
    /// Request a row-count estimate before fetching.
    pub check_size_first: bool,
    /// Split Parquet output by this column's values.
    pub partition_by: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            lang: DEFAULT_LANG.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            formats: FormatSelection::default(),
            compression: ParquetCompression::default(),
            query: DataQuery::default(),
            check_size_first: true,
            partition_by: None,
        }
    }
}

impl PipelineOptions {
    /// Checks options that can be rejected without any request.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidOptions`] when no format is selected.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.formats
            .validate()
            .map(|_| ())
            .map_err(|source| PipelineError::InvalidOptions { source })
    }
}

/// Outcome of [`run_pipeline_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    artifacts: Vec<(String, ExportArtifacts)>,
    failures: Vec<(String, PipelineError)>,
}

impl BatchReport {
    /// Written files per successful domain, in processing order.
    #[must_use]
    pub fn artifacts(&self) -> &[(String, ExportArtifacts)] {
        &self.artifacts
    }

    /// Files written for one domain, if it succeeded.
    #[must_use]
    pub fn artifacts_for(&self, domain_code: &str) -> Option<&ExportArtifacts> {
        self.artifacts
            .iter()
            .find(|(domain, _)| domain == domain_code)
            .map(|(_, artifacts)| artifacts)
    }

    /// Domains that failed, with their errors, in processing order.
    #[must_use]
    pub fn failures(&self) -> &[(String, PipelineError)] {
        &self.failures
    }

    /// Codes of the domains that succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.artifacts.iter().map(|(domain, _)| domain.as_str())
    }

    /// True when every domain succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the pipeline for one domain.
///
/// # Errors
///
/// Returns a [`PipelineError`] for invalid options (before any request), a
/// failed data request, a response without records, a response that cleans
/// to nothing, or a failed export.
pub async fn run_pipeline(
    client: &ApiClient,
    domain_code: &str,
    options: &PipelineOptions,
) -> Result<ExportArtifacts, PipelineError> {
    run_pipeline_with(client, domain_code, options, |_, _| {}).await
}

/// Like [`run_pipeline`], calling `on_stage` as each stage starts.
///
/// # Errors
///
/// See [`run_pipeline`].
#[instrument(skip(client, options, on_stage), fields(lang = %options.lang))]
pub async fn run_pipeline_with<F>(
    client: &ApiClient,
    domain_code: &str,
    options: &PipelineOptions,
    on_stage: F,
) -> Result<ExportArtifacts, PipelineError>
where
    F: Fn(&str, PipelineStage),
{
    options.validate()?;

    if options.check_size_first {
        on_stage(domain_code, PipelineStage::Sizing);
        estimate_size(client, domain_code, options).await;
    }

    on_stage(domain_code, PipelineStage::Fetching);
    let raw = endpoints::data(client, domain_code, &options.lang, &options.query)
        .await
        .map_err(|source| PipelineError::Api {
            domain: domain_code.to_string(),
            source,
        })?;
    log_response_shape(domain_code, &raw);

    on_stage(domain_code, PipelineStage::ValidatingRaw);
    if !has_data(&raw) {
        return Err(empty_upstream(domain_code, &raw));
    }

    on_stage(domain_code, PipelineStage::Cleaning);
    let keys = response_keys(&raw);
    let preview = truncate_chars(&raw.to_string(), RAW_PREVIEW_CHARS);
    let frame = clean_response(raw);

    on_stage(domain_code, PipelineStage::ValidatingClean);
    if frame.is_empty() {
        return Err(PipelineError::EmptyAfterClean {
            domain: domain_code.to_string(),
            keys,
            preview,
        });
    }

    on_stage(domain_code, PipelineStage::Exporting);
    let export_error = |source: ExportError| PipelineError::Export {
        domain: domain_code.to_string(),
        source,
    };
    let artifacts = match &options.partition_by {
        None => export(
            &frame,
            domain_code,
            &options.output_dir,
            options.formats,
            options.compression,
        )
        .map_err(export_error)?,
        Some(column) => {
            // rejected even when only CSV is written
            if frame.column_index(column).is_none() {
                return Err(export_error(ExportError::MissingPartitionColumn {
                    domain: domain_code.to_string(),
                    column: column.clone(),
                    available: frame.columns().join(", "),
                }));
            }
            let mut artifacts = ExportArtifacts::default();
            if options.formats.parquet {
                artifacts.append(
                    export_partitioned(
                        &frame,
                        domain_code,
                        column,
                        &options.output_dir,
                        options.compression,
                    )
                    .map_err(export_error)?,
                );
            }
            if options.formats.csv {
                let csv_only = FormatSelection::new(true, false);
                artifacts.append(
                    export(&frame, domain_code, &options.output_dir, csv_only, options.compression)
                        .map_err(export_error)?,
                );
            }
            artifacts
        }
    };

    on_stage(domain_code, PipelineStage::Done);
    info!(
        domain = domain_code,
        rows = frame.len(),
        files = artifacts.len(),
        "pipeline finished"
    );
    Ok(artifacts)
}

/// Runs the pipeline for each domain in turn.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidOptions`] before any request if the
/// options are unusable. Per-domain failures never abort the batch; they
/// are recorded in the report.
pub async fn run_pipeline_batch(
    client: &ApiClient,
    domain_codes: &[String],
    options: &PipelineOptions,
) -> Result<BatchReport, PipelineError> {
    run_pipeline_batch_with(client, domain_codes, options, |_, _| {}).await
}

/// Like [`run_pipeline_batch`], calling `on_stage` as each stage starts.
///
/// # Errors
///
/// See [`run_pipeline_batch`].
#[instrument(skip_all, fields(domains = domain_codes.len()))]
pub async fn run_pipeline_batch_with<F>(
    client: &ApiClient,
    domain_codes: &[String],
    options: &PipelineOptions,
    on_stage: F,
) -> Result<BatchReport, PipelineError>
where
    F: Fn(&str, PipelineStage),
{
    options.validate()?;

    let mut report = BatchReport::default();
    for (index, code) in domain_codes.iter().enumerate() {
        info!(domain = %code, position = index + 1, total = domain_codes.len(), "processing domain");
        match run_pipeline_with(client, code, options, &on_stage).await {
            Ok(artifacts) => report.artifacts.push((code.clone(), artifacts)),
            Err(error) => {
                warn!(domain = %code, stage = %error.stage(), error = %error, "domain failed");
                report.failures.push((code.clone(), error));
            }
        }
    }

    info!(
        succeeded = report.artifacts.len(),
        failed = report.failures.len(),
        "batch finished"
    );
    Ok(report)
}

/// Best-effort row-count estimate; never fails the run.
async fn estimate_size(client: &ApiClient, domain_code: &str, options: &PipelineOptions) {
    let payload = datasize_payload(domain_code, &options.query.filters);
    match endpoints::datasize(client, &payload, &options.lang).await {
        Ok(response) => match estimated_rows(&response) {
            Some(rows) => info!(domain = domain_code, estimated_rows = rows, "size estimate"),
            None => debug!(domain = domain_code, "size estimate unavailable in response"),
        },
        Err(error) => debug!(domain = domain_code, %error, "size estimate failed; continuing"),
    }
}

fn log_response_shape(domain_code: &str, raw: &Value) {
    match raw {
        Value::Object(map) => debug!(
            domain = domain_code,
            keys = ?map.keys().collect::<Vec<_>>(),
            preview = %truncate_chars(&raw.to_string(), RAW_PREVIEW_CHARS),
            "response is an object"
        ),
        Value::Array(items) => debug!(
            domain = domain_code,
            length = items.len(),
            first_item = %items
                .first()
                .map_or_else(|| "(empty)".to_string(), |item| truncate_chars(&item.to_string(), FIRST_ITEM_PREVIEW_CHARS)),
            "response is a list"
        ),
        other => debug!(
            domain = domain_code,
            preview = %truncate_chars(&other.to_string(), RAW_PREVIEW_CHARS),
            "response is a scalar"
        ),
    }
}

fn response_keys(raw: &Value) -> Vec<String> {
    raw.as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

/// Builds the no-data error, pulling status and message out of the envelope.
fn empty_upstream(domain_code: &str, raw: &Value) -> PipelineError {
    PipelineError::EmptyUpstream {
        domain: domain_code.to_string(),
        keys: response_keys(raw),
        status: first_truthy(raw, &["status_code", "status"]),
        message: first_truthy(raw, &["message", "description", "text"])
            .map(|message| truncate_chars(&message, FIRST_ITEM_PREVIEW_CHARS)),
    }
}

/// First of `names` holding a non-empty, non-zero value, rendered as text.
fn first_truthy(raw: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| raw.get(*name))
        .find(|value| is_truthy(value))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_upstream_extracts_status_and_message() {
        let raw = json!({"status_code": 0, "status": 404, "message": "", "description": "not found"});
        match empty_upstream("QCL", &raw) {
            PipelineError::EmptyUpstream {
                keys,
                status,
                message,
                ..
            } => {
                assert_eq!(keys, vec!["status_code", "status", "message", "description"]);
                assert_eq!(status.as_deref(), Some("404"));
                assert_eq!(message.as_deref(), Some("not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_upstream_for_bare_list() {
        match empty_upstream("QCL", &json!([])) {
            PipelineError::EmptyUpstream {
                keys,
                status,
                message,
                ..
            } => {
                assert!(keys.is_empty());
                assert!(status.is_none());
                assert!(message.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_options_validate() {
        let mut options = PipelineOptions::default();
        assert!(options.validate().is_ok());
        options.formats = FormatSelection::new(false, false);
        let err = options.validate().unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Preflight);
    }

    #[test]
    fn test_options_defaults() {
        let options = PipelineOptions::default();
        assert_eq!(options.lang, "en");
        assert_eq!(options.output_dir, PathBuf::from("./output"));
        assert!(options.check_size_first);
        assert_eq!(options.compression, ParquetCompression::Snappy);
        assert!(options.partition_by.is_none());
    }
}
