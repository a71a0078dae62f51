//! Pipeline error types.

use std::fmt;

use thiserror::Error;

use crate::api::ApiError;
use crate::export::ExportError;

/// Step of the per-domain state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Option checks before any network activity.
    Preflight,
    /// Best-effort row-count estimate.
    Sizing,
    /// The data request.
    Fetching,
    /// Presence check on the raw response.
    ValidatingRaw,
    /// Normalisation into a frame.
    Cleaning,
    /// Emptiness check on the cleaned frame.
    ValidatingClean,
    /// Writing files.
    Exporting,
    /// Finished.
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preflight => "preflight",
            Self::Sizing => "sizing",
            Self::Fetching => "fetching",
            Self::ValidatingRaw => "validating response",
            Self::Cleaning => "cleaning",
            Self::ValidatingClean => "validating cleaned data",
            Self::Exporting => "exporting",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that end a domain's pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Options are unusable; raised before any request is made.
    #[error("invalid pipeline options: {source}")]
    InvalidOptions {
        /// Underlying validation error.
        #[source]
        source: ExportError,
    },

    /// The data request failed.
    #[error("request for domain {domain} failed: {source}")]
    Api {
        /// Domain being processed.
        domain: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// The response carried no data records.
    #[error(
        "no records returned for domain {domain:?} (response keys: [{key_list}]{status_part}{message_part}). \
         The domain may be empty, or the filters may be too restrictive. Use -v for debug output",
        key_list = .keys.join(", "),
        status_part = .status.as_deref().map(|s| format!(", status: {s}")).unwrap_or_default(),
        message_part = .message.as_deref().map(|m| format!(", message: {m}")).unwrap_or_default()
    )]
    EmptyUpstream {
        /// Domain being processed.
        domain: String,
        /// Top-level keys of the response, if it was an object.
        keys: Vec<String>,
        /// Embedded status field, if any.
        status: Option<String>,
        /// Embedded message field, if any.
        message: Option<String>,
    },

    /// Records were present but cleaning kept none of them.
    #[error(
        "no usable records after cleaning for domain {domain:?} (response keys: [{key_list}]); \
         the response format may not match the expected structure. Raw preview: {preview}",
        key_list = .keys.join(", ")
    )]
    EmptyAfterClean {
        /// Domain being processed.
        domain: String,
        /// Top-level keys of the response, if it was an object.
        keys: Vec<String>,
        /// Truncated rendering of the raw response.
        preview: String,
    },

    /// Writing the output failed.
    #[error("export for domain {domain} failed: {source}")]
    Export {
        /// Domain being processed.
        domain: String,
        /// Underlying export error.
        #[source]
        source: ExportError,
    },
}

impl PipelineError {
    /// Stage in which the run failed.
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::InvalidOptions { .. } => PipelineStage::Preflight,
            Self::Api { .. } => PipelineStage::Fetching,
            Self::EmptyUpstream { .. } => PipelineStage::ValidatingRaw,
            Self::EmptyAfterClean { .. } => PipelineStage::ValidatingClean,
            Self::Export { .. } => PipelineStage::Exporting,
        }
    }

    /// Domain the error belongs to, if it is domain specific.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::InvalidOptions { .. } => None,
            Self::Api { domain, .. }
            | Self::EmptyUpstream { domain, .. }
            | Self::EmptyAfterClean { domain, .. }
            | Self::Export { domain, .. } => Some(domain),
        }
    }

    /// Returns the API error if the run failed on a request.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True for authentication failures, which will fail every domain alike.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_auth)
    }
}
