//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use fedsearch::{DEFAULT_INDEX_NODE, search::DEFAULT_MAX_RESULTS};

/// Bulk-discover files and datasets on a federated faceted search index.
///
/// Terms are `name:value` facet constraints (repeat a name to match any of
/// several values); a bare term without a colon is free-text search.
#[derive(Parser, Debug)]
#[command(name = "fedsearch")]
#[command(author, version, about)]
pub struct Args {
    /// Search terms (`name:value` or free text)
    pub terms: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Search datasets instead of files
    #[arg(long)]
    pub datasets: bool,

    /// Only print the total hit count, fetching no documents
    #[arg(long)]
    pub count_only: bool,

    /// Skip the first N results
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Maximum number of results to fetch (0 for unlimited)
    #[arg(short = 'm', long, default_value_t = DEFAULT_MAX_RESULTS)]
    pub max: usize,

    /// Results per request (defaults to the configured page size)
    #[arg(long)]
    pub page_limit: Option<usize>,

    /// Drop records whose fingerprint was already seen in this run
    #[arg(long)]
    pub dedup: bool,

    /// Query every index node of the federation, not just the target
    #[arg(long)]
    pub distrib: bool,

    /// Only match the latest version of each record
    #[arg(long)]
    pub latest: bool,

    /// Index node to query
    #[arg(long, default_value = DEFAULT_INDEX_NODE)]
    pub index_node: String,

    /// Configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
