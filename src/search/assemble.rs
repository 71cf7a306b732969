//! Streams fetched pages into typed records.
//!
//! Malformed documents are dropped and counted, never fatal; optional
//! de-duplication keys on record fingerprints. After a batch the caller
//! logs expected-vs-actual counts for observability.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::fetch::Outcome;
use crate::record::IndexRecord;

/// Per-batch accounting of assembled and discarded records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Records successfully emitted.
    pub assembled: usize,
    /// Documents dropped for missing or malformed required fields.
    pub dropped: usize,
    /// Records dropped because their fingerprint was already seen.
    pub duplicates: usize,
}

/// Converts the successful outcomes of a page-mode batch into records.
///
/// Failed outcomes are skipped here; the caller accounts for them via the
/// fetch engine's aggregate error. The first malformed document of a batch
/// is logged with its payload as a sample; the rest are only counted.
pub(crate) fn assemble<R: IndexRecord>(
    outcomes: &[Outcome],
    keep_duplicates: bool,
) -> (Vec<R>, AssemblyStats) {
    let mut records: Vec<R> = Vec::new();
    let mut stats = AssemblyStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut sampled = false;

    for outcome in outcomes {
        let Some(json) = outcome.json() else {
            continue;
        };
        let Some(docs) = json.pointer("/response/docs").and_then(Value::as_array) else {
            warn!(host = %outcome.request.host, "payload missing response.docs, skipping page");
            continue;
        };
        for doc in docs {
            match R::from_doc(doc) {
                Ok(record) => {
                    if !keep_duplicates && !seen.insert(record.sha().to_string()) {
                        debug!(sha = record.sha(), "dropping duplicate record");
                        stats.duplicates += 1;
                    } else {
                        stats.assembled += 1;
                        records.push(record);
                    }
                }
                Err(error) => {
                    if !sampled {
                        warn!(%error, %doc, "record with invalid metadata (first occurrence)");
                        sampled = true;
                    }
                    stats.dropped += 1;
                }
            }
        }
    }
    (records, stats)
}

/// Logs the delta between expected and assembled record counts.
///
/// `expected` is `min(sum(hits), max_total)`. The delta is attributed to
/// malformed drops and duplicate drops; anything left over points at pages
/// lost to failed requests. Diagnostic only, never an error.
pub(crate) fn log_batch_summary(expected: usize, stats: &AssemblyStats) {
    if stats.dropped > 0 {
        warn!(
            dropped = stats.dropped,
            "dropped records with invalid metadata"
        );
    }
    if stats.duplicates > 0 {
        info!(duplicates = stats.duplicates, "dropped duplicate records");
    }
    let unaccounted = expected.saturating_sub(stats.assembled + stats.dropped + stats.duplicates);
    if unaccounted > 0 {
        warn!(
            expected,
            assembled = stats.assembled,
            unaccounted,
            "fewer records than expected; check failed requests"
        );
    }
}
