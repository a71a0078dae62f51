//! CLI entry point for the FAOSTAT pipeline.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use faostat_core::endpoints::{self, datasize_payload, estimated_rows};
use faostat_core::frame::extract_records;
use faostat_core::{
    ApiClient, ClientConfig, DataQuery, FormatSelection, PipelineOptions, RateLimiter,
};
use faostat_core::pipeline::{run_pipeline_batch_with, run_pipeline_with};
use serde_json::Value;
use tracing::{debug, error, info};

mod cli;
mod progress;

use cli::{Args, Command, FetchArgs};
use progress::{new_spinner, spin_while, stage_message};

/// Exit status when some, but not all, domains of a batch failed.
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let show_progress = !args.quiet && io::stderr().is_terminal();
    let lang = args.lang;

    // Option errors are reported before credentials are even looked at
    let fetch_options = match &args.command {
        Command::Fetch(fetch) => Some(pipeline_options(fetch, &lang)?),
        _ => None,
    };

    let config = ClientConfig::from_env()?;
    let client = ApiClient::from_config(&config, Arc::new(RateLimiter::default()))?;
    debug!(?config, "client ready");

    match args.command {
        Command::Ping => {
            let health = spin_while(show_progress, "Pinging API", endpoints::ping(&client)).await?;
            print_json(&health)?;
        }
        Command::ListGroups => {
            let groups =
                spin_while(show_progress, "Fetching groups", endpoints::groups(&client, &lang)).await?;
            print_code_table(groups);
        }
        Command::ListDomains { group } => {
            let domains = spin_while(
                show_progress,
                &format!("Fetching domains of {group}"),
                endpoints::domains(&client, &group, &lang),
            )
            .await?;
            print_code_table(domains);
        }
        Command::Dimensions { domain } => {
            let dimensions = spin_while(
                show_progress,
                &format!("Fetching dimensions of {domain}"),
                endpoints::dimensions(&client, &domain, &lang),
            )
            .await?;
            print_json(&dimensions)?;
        }
        Command::Metadata { domain } => {
            let metadata = spin_while(
                show_progress,
                &format!("Fetching metadata of {domain}"),
                endpoints::metadata(&client, &domain, &lang),
            )
            .await?;
            print_json(&metadata)?;
        }
        Command::Datasize { domain, filters } => {
            let payload = datasize_payload(&domain, &filters.into());
            let response = spin_while(
                show_progress,
                &format!("Estimating size of {domain}"),
                endpoints::datasize(&client, &payload, &lang),
            )
            .await?;
            match estimated_rows(&response) {
                Some(rows) => println!("{domain}: ~{rows} rows"),
                None => print_json(&response)?,
            }
        }
        Command::Fetch(fetch) => {
            let options = fetch_options.context("fetch options were not prepared")?;
            return run_fetch(&client, fetch.domains, &options, show_progress).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn pipeline_options(fetch: &FetchArgs, lang: &str) -> Result<PipelineOptions> {
    let options = PipelineOptions {
        lang: lang.to_string(),
        output_dir: fetch.output.clone(),
        formats: FormatSelection::new(!fetch.no_csv, !fetch.no_parquet),
        compression: fetch.compression,
        query: DataQuery::with_filters(fetch.filters.clone().into()),
        check_size_first: !fetch.no_size_check,
        partition_by: fetch.partition_by.clone(),
    };
    if options.validate().is_err() {
        bail!("--no-csv and --no-parquet together leave nothing to write; enable at least one format");
    }
    Ok(options)
}

async fn run_fetch(
    client: &ApiClient,
    domains: Vec<String>,
    options: &PipelineOptions,
    show_progress: bool,
) -> Result<ExitCode> {
    let spinner = new_spinner(show_progress, "Starting...");
    let on_stage = |domain: &str, stage| {
        if let Some(spinner) = &spinner {
            spinner.set_message(stage_message(domain, stage));
        }
    };

    // A single domain propagates its error so it is shown unaltered
    if let [domain] = domains.as_slice() {
        let result = run_pipeline_with(client, domain, options, on_stage).await;
        if let Some(spinner) = &spinner {
            spinner.finish_and_clear();
        }
        let artifacts = result?;
        for (format, path) in artifacts.entries() {
            println!("{domain}\t{format}\t{}", path.display());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = run_pipeline_batch_with(client, &domains, options, on_stage).await;
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let report = report?;

    for (domain, artifacts) in report.artifacts() {
        for (format, path) in artifacts.entries() {
            println!("{domain}\t{format}\t{}", path.display());
        }
    }
    for (domain, failure) in report.failures() {
        error!(domain = %domain, stage = %failure.stage(), "{failure}");
    }

    let succeeded = report.artifacts().len();
    info!(succeeded, failed = report.failures().len(), "fetch complete");
    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else if succeeded == 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints records as an aligned two-column code/label table.
fn print_code_table(raw: Value) {
    let rows: Vec<(String, String)> = extract_records(raw)
        .into_records()
        .iter()
        .map(|record| (field_text(record, &["code", "Code"]), field_text(record, &["label", "Label"])))
        .collect();
    let width = rows.iter().map(|(code, _)| code.chars().count()).max().unwrap_or(0).max(4);

    println!("{:<width$}  LABEL", "CODE");
    for (code, label) in &rows {
        println!("{code:<width$}  {label}");
    }
}

fn field_text(record: &Value, names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| record.get(*name))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}
