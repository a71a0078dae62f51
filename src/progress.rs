//! Progress UI (spinner) for network-bound steps.

use std::future::Future;
use std::time::Duration;

use faostat_core::PipelineStage;
use indicatif::{ProgressBar, ProgressStyle};

/// Creates a ticking spinner, or `None` when progress output is disabled.
pub(crate) fn new_spinner(enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}

/// Awaits `future` behind a spinner labelled `label`.
pub(crate) async fn spin_while<F: Future>(enabled: bool, label: &str, future: F) -> F::Output {
    let spinner = new_spinner(enabled, format!("{label}..."));
    let output = future.await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    output
}

/// Spinner text for a pipeline stage.
pub(crate) fn stage_message(domain: &str, stage: PipelineStage) -> String {
    match stage {
        PipelineStage::Sizing => format!("Estimating size of {domain}..."),
        PipelineStage::Fetching => format!("Fetching {domain}..."),
        PipelineStage::Cleaning => format!("Cleaning {domain}..."),
        PipelineStage::Exporting => format!("Exporting {domain}..."),
        PipelineStage::Done => format!("Finished {domain}"),
        other => format!("{domain}: {other}..."),
    }
}
