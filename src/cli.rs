//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use faostat_core::endpoints::DEFAULT_LANG;
use faostat_core::pipeline::DEFAULT_OUTPUT_DIR;
use faostat_core::{Filters, ParquetCompression};

/// Fetch, clean and export FAOSTAT statistical data.
///
/// Reads the API token from FAOSTAT_API_TOKEN (a .env file in the working
/// directory is loaded first).
#[derive(Parser, Debug)]
#[command(name = "faostat-pipeline")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Language code used in API paths
    #[arg(long, default_value = DEFAULT_LANG, global = true)]
    pub lang: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check API health
    Ping,

    /// List top-level data groups
    ListGroups,

    /// List the domains of a group
    ListDomains {
        /// Group code (e.g. "Q")
        group: String,
    },

    /// Show the dimensions (filters) of a domain
    Dimensions {
        /// Domain code (e.g. "QCL")
        domain: String,
    },

    /// Show the metadata of a domain
    Metadata {
        /// Domain code (e.g. "QCL")
        domain: String,
    },

    /// Estimate how many rows a query returns
    Datasize {
        /// Domain code (e.g. "QCL")
        domain: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Fetch, clean and export one or more domains
    Fetch(FetchArgs),
}

/// Arguments of the `fetch` subcommand.
#[derive(ClapArgs, Debug)]
pub struct FetchArgs {
    /// Domain codes to process, in order
    #[arg(required = true)]
    pub domains: Vec<String>,

    /// Output directory
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Skip CSV output
    #[arg(long)]
    pub no_csv: bool,

    /// Skip Parquet output
    #[arg(long)]
    pub no_parquet: bool,

    /// Parquet compression codec (snappy, gzip, brotli, none)
    #[arg(long, default_value = "snappy")]
    pub compression: ParquetCompression,

    /// Write one Parquet file per value of this column
    #[arg(long, value_name = "COLUMN")]
    pub partition_by: Option<String>,

    /// Skip the row-count estimate before fetching
    #[arg(long)]
    pub no_size_check: bool,

    #[command(flatten)]
    pub filters: FilterArgs,
}

/// Row filters; each takes a comma-separated code list.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Area codes (e.g. "231" or "231,79")
    #[arg(long)]
    pub area: Option<String>,

    /// Element codes (e.g. "5510")
    #[arg(long)]
    pub element: Option<String>,

    /// Item codes (e.g. "56")
    #[arg(long)]
    pub item: Option<String>,

    /// Year codes (e.g. "2018,2019,2020")
    #[arg(long)]
    pub year: Option<String>,

    /// Area code set name
    #[arg(long)]
    pub area_cs: Option<String>,

    /// Element code set name
    #[arg(long)]
    pub element_cs: Option<String>,

    /// Item code set name
    #[arg(long)]
    pub item_cs: Option<String>,

    /// Year code set name
    #[arg(long)]
    pub year_cs: Option<String>,
}

impl From<FilterArgs> for Filters {
    fn from(args: FilterArgs) -> Self {
        Self {
            area: args.area,
            element: args.element,
            item: args.item,
            year: args.year,
            area_cs: args.area_cs,
            element_cs: args.element_cs,
            item_cs: args.item_cs,
            year_cs: args.year_cs,
        }
    }
}
