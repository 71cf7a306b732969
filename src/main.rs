//! CLI entry point for the federated search tool.

use anyhow::{Context, Result};
use clap::Parser;
use fedsearch::{
    DocType, Options, Query, SearchConfig, SearchParams, Selection, Session,
    query::OptionValue,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
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

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let config = match &args.config {
        Some(path) => SearchConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => SearchConfig::default(),
    };

    let query = build_query(&args)?;
    debug!(sha = query.sha(), "query fingerprint");

    let session = Session::new(config);
    let queries = vec![query];
    let doc_type = if args.datasets {
        DocType::Dataset
    } else {
        DocType::File
    };

    if args.count_only {
        let hits = session
            .hits(&queries, doc_type, Some(&args.index_node))
            .await?;
        println!("{}", hits.iter().sum::<usize>());
        return Ok(());
    }

    let params = SearchParams {
        offset: args.offset,
        max_total: (args.max > 0).then_some(args.max),
        page_limit: args.page_limit,
        keep_duplicates: !args.dedup,
        index_node: Some(args.index_node.clone()),
        ..SearchParams::default()
    };

    if args.datasets {
        let results = session.search_datasets(&queries, &params).await?;
        report(results.failures.len(), results.request_count);
        for record in &results.records {
            println!("{}", serde_json::to_string(record)?);
        }
        info!(datasets = results.records.len(), "search complete");
    } else {
        let results = session.search_files(&queries, &params).await?;
        report(results.failures.len(), results.request_count);
        for record in &results.records {
            println!("{}", serde_json::to_string(record)?);
        }
        info!(files = results.records.len(), "search complete");
    }

    Ok(())
}

fn report(failed: usize, total: usize) {
    if failed > 0 {
        warn!(failed, total, "some search requests failed; results are partial");
    }
}

/// Builds one query from CLI terms and option flags.
///
/// `name:value` terms accumulate per facet name; bare terms are collected
/// into the free-text clause.
fn build_query(args: &Args) -> Result<Query> {
    let mut facet_terms: Vec<(String, Vec<String>)> = Vec::new();
    let mut free_text: Vec<&str> = Vec::new();
    for term in &args.terms {
        match term.split_once(':') {
            Some((name, value)) if !name.is_empty() && !value.is_empty() => {
                match facet_terms.iter_mut().find(|(n, _)| n == name) {
                    Some((_, values)) => values.push(value.to_string()),
                    None => facet_terms.push((name.to_string(), vec![value.to_string()])),
                }
            }
            _ => free_text.push(term),
        }
    }

    let mut selection = Selection::new();
    for (name, values) in &facet_terms {
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        selection
            .set(name, values)
            .with_context(|| format!("invalid term for facet {name}"))?;
    }
    if !free_text.is_empty() {
        selection.set_term(&free_text.join(" "))?;
    }

    let mut options = Options::new();
    if args.distrib {
        options.set("distrib", OptionValue::True)?;
    }
    if args.latest {
        options.set("latest", OptionValue::True)?;
    }

    Ok(Query::new(selection, options))
}
