//! FAOSTAT Pipeline Core Library
//!
//! This library fetches tabular statistics from the rate-limited, token
//! authenticated FAOSTAT REST API, normalises them into a consistent schema,
//! and writes them to CSV and Parquet.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Rate limiter, retry policy and the authenticated HTTP client
//! - [`endpoints`] - Typed wrappers for the API endpoints
//! - [`frame`] - Response envelope extraction and record cleaning
//! - [`export`] - CSV and Parquet writers, including partitioned output
//! - [`pipeline`] - Single-domain and batch fetch/clean/export runs
//! - [`config`] - Environment-backed client configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod endpoints;
pub mod export;
pub mod frame;
pub mod pipeline;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, FailureType, RateLimiter, RetryDecision, RetryPolicy, classify_error};
pub use config::{ClientConfig, ConfigError};
pub use endpoints::{DataQuery, Filters};
pub use export::{ExportArtifacts, ExportError, ExportFormat, FormatSelection, ParquetCompression};
pub use frame::{Cell, Frame};
pub use pipeline::{
    BatchReport, PipelineError, PipelineOptions, PipelineStage, run_pipeline, run_pipeline_batch,
};
