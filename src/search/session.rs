//! Search session: the facade wiring prober, distributor, builder, fetch
//! engine and assembler together.
//!
//! A [`Session`] owns one [`FetchEngine`] and a cloned [`SearchConfig`].
//! Each public operation is one top-level invocation: it prepares a batch,
//! runs it to completion, and accounts for every outcome. Sessions hold no
//! ambient state; two sessions never interfere.

use std::collections::HashMap;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::assemble::{AssemblyStats, assemble, log_batch_summary};
use super::distribute::distribute_hits;
use super::error::SearchError;
use super::fetch::{AggregateError, FetchEngine, FetchError, Outcome};
use super::request::{DocType, PreparedRequest, RequestSpec, index_to_url};
use crate::config::SearchConfig;
use crate::query::Query;
use crate::record::{DatasetRecord, FileRecord, IndexRecord};

/// Default cap on results fetched by one search invocation.
pub const DEFAULT_MAX_RESULTS: usize = 200;

/// Facet-count map: facet name to value/count pairs.
pub type FacetCounts = HashMap<String, HashMap<String, usize>>;

/// Tuning knobs for one search invocation.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Pre-computed hit counts; probed when `None`.
    pub hits: Option<Vec<usize>>,
    /// Global starting offset across all queries.
    pub offset: usize,
    /// Global cap on fetched results; `None` fetches everything past the
    /// offset.
    pub max_total: Option<usize>,
    /// Page size override; the configured default applies when `None`.
    pub page_limit: Option<usize>,
    /// Keep records whose fingerprint was already seen in this batch.
    pub keep_duplicates: bool,
    /// Index node override; the configured default applies when `None`.
    pub index_node: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            hits: None,
            offset: 0,
            max_total: Some(DEFAULT_MAX_RESULTS),
            page_limit: None,
            keep_duplicates: true,
            index_node: None,
        }
    }
}

/// Everything one search invocation produced.
///
/// Partial success is always observable: assembled records, per-request
/// failures and drop counts sit side by side. [`Self::into_result`] gives
/// strict semantics for callers that cannot accept partial results.
#[derive(Debug)]
pub struct SearchResults<R> {
    /// Assembled records, in fetch-completion order.
    pub records: Vec<R>,
    /// Assembly accounting (dropped, duplicates).
    pub stats: AssemblyStats,
    /// Captured errors of failed requests, in completion order.
    pub failures: Vec<FetchError>,
    /// Number of requests the batch dispatched.
    pub request_count: usize,
}

impl<R> SearchResults<R> {
    /// True if every request of the batch succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Strict view: the records, or the aggregate failure carrying every
    /// captured error.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Fetch`] if any request in the batch failed.
    pub fn into_result(self) -> Result<Vec<R>, SearchError> {
        if self.failures.is_empty() {
            Ok(self.records)
        } else {
            Err(AggregateError {
                errors: self.failures,
                total: self.request_count,
            }
            .into())
        }
    }
}

/// Client for the federated faceted search API.
#[derive(Debug)]
pub struct Session {
    config: SearchConfig,
    engine: FetchEngine,
}

impl Session {
    /// Creates a session with a default transport.
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        let engine = FetchEngine::new(&config);
        Self { config, engine }
    }

    /// Creates a session around an injected transport, typically one
    /// carrying client-certificate state from the credential collaborator.
    #[must_use]
    pub fn with_transport(config: SearchConfig, client: Client) -> Self {
        let engine = FetchEngine::with_transport(&config, client);
        Self { config, engine }
    }

    /// The injected configuration.
    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Resets per-host limiter state; see [`FetchEngine::reset`].
    pub fn reset(&self) {
        self.engine.reset();
    }

    fn endpoint(&self, index_node: Option<&str>) -> Result<Url, SearchError> {
        index_to_url(index_node.unwrap_or(&self.config.index_node))
    }

    /// Probes the total hit count of each query.
    ///
    /// A failed probe yields zero for that query instead of failing the
    /// batch; each substitution is logged so outages are not silent.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidIndex`] if the index node cannot be
    /// resolved. Per-request failures are not propagated.
    #[instrument(skip(self, queries), fields(queries = queries.len(), doc_type = doc_type.as_str()))]
    pub async fn hits(
        &self,
        queries: &[Query],
        doc_type: DocType,
        index_node: Option<&str>,
    ) -> Result<Vec<usize>, SearchError> {
        let endpoint = self.endpoint(index_node)?;
        let mut prepared = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            prepared.push(RequestSpec::count(query, i, doc_type).build(&endpoint)?);
        }
        let outcomes = self.engine.fetch(prepared).await;

        let mut hits = vec![0_usize; queries.len()];
        let mut failed = 0_usize;
        for outcome in outcomes {
            match outcome.result {
                Ok(json) => hits[outcome.request.query_index] = num_found(&json),
                Err(error) => {
                    failed += 1;
                    warn!(%error, "hit-count probe failed, substituting zero");
                }
            }
        }
        if failed > 0 {
            warn!(
                failed,
                total = queries.len(),
                "some hit-count probes failed; totals undercount"
            );
        }
        debug!(?hits, "hit counts");
        Ok(hits)
    }

    /// Probes facet counts for each query.
    ///
    /// Like [`Self::hits`], a failed probe yields an empty map rather than
    /// failing the batch.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::UnstableQuery`] before any request is issued
    /// if the projection is known to destabilize the backend, or
    /// [`SearchError::InvalidIndex`] for an unresolvable index node.
    #[instrument(skip(self, queries, facets), fields(queries = queries.len()))]
    pub async fn hints(
        &self,
        queries: &[Query],
        facets: &[String],
        doc_type: DocType,
        index_node: Option<&str>,
    ) -> Result<Vec<FacetCounts>, SearchError> {
        let endpoint = self.endpoint(index_node)?;
        let mut prepared = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            prepared.push(
                RequestSpec::count(query, i, doc_type)
                    .with_facets(facets)
                    .build(&endpoint)?,
            );
        }
        let outcomes = self.engine.fetch(prepared).await;

        let mut hints = vec![FacetCounts::new(); queries.len()];
        for outcome in outcomes {
            match outcome.result {
                Ok(json) => {
                    hints[outcome.request.query_index] = facet_counts(&json);
                }
                Err(error) => {
                    warn!(%error, "facet-count probe failed, substituting empty counts");
                }
            }
        }
        Ok(hints)
    }

    /// Searches file records matching the queries.
    ///
    /// # Errors
    ///
    /// Returns guard and index-resolution errors before any I/O. Fetch
    /// failures are captured in the returned [`SearchResults`] instead.
    #[instrument(skip(self, queries, params), fields(queries = queries.len()))]
    pub async fn search_files(
        &self,
        queries: &[Query],
        params: &SearchParams,
    ) -> Result<SearchResults<FileRecord>, SearchError> {
        let fields = vec!["*".to_string()];
        self.search_records::<FileRecord>(queries, DocType::File, &fields, params)
            .await
    }

    /// Searches dataset records matching the queries.
    ///
    /// Dataset pages project only identity and size; duplicates are always
    /// kept since replicas collapse onto one instance id upstream.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::search_files`].
    #[instrument(skip(self, queries, params), fields(queries = queries.len()))]
    pub async fn search_datasets(
        &self,
        queries: &[Query],
        params: &SearchParams,
    ) -> Result<SearchResults<DatasetRecord>, SearchError> {
        let fields = vec!["instance_id".to_string(), "size".to_string()];
        self.search_records::<DatasetRecord>(queries, DocType::Dataset, &fields, params)
            .await
    }

    async fn search_records<R: IndexRecord>(
        &self,
        queries: &[Query],
        doc_type: DocType,
        fields: &[String],
        params: &SearchParams,
    ) -> Result<SearchResults<R>, SearchError> {
        let endpoint = self.endpoint(params.index_node.as_deref())?;
        let hits = match &params.hits {
            Some(hits) => hits.clone(),
            None => {
                self.hits(queries, doc_type, params.index_node.as_deref())
                    .await?
            }
        };
        let page_limit = params.page_limit.unwrap_or(self.config.page_limit);
        let windows = distribute_hits(&hits, params.offset, params.max_total, page_limit);

        let mut prepared: Vec<PreparedRequest> = Vec::new();
        for (i, (query, query_windows)) in queries.iter().zip(&windows).enumerate() {
            for window in query_windows {
                prepared.push(
                    RequestSpec::page(query, i, doc_type, window.start, window.len(), fields)
                        .build(&endpoint)?,
                );
            }
        }
        let request_count = prepared.len();
        info!(
            requests = request_count,
            total_hits = hits.iter().sum::<usize>(),
            "dispatching paginated search"
        );

        let outcomes = self.engine.fetch(prepared).await;
        let (records, stats) = assemble::<R>(&outcomes, params.keep_duplicates);
        let failures: Vec<FetchError> = outcomes
            .into_iter()
            .filter_map(|outcome: Outcome| outcome.result.err())
            .collect();

        let total_hits: usize = hits.iter().sum();
        let expected = params
            .max_total
            .map_or(total_hits, |cap| cap.min(total_hits));
        log_batch_summary(expected, &stats);
        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                total = request_count,
                "search batch completed with failures"
            );
        }

        Ok(SearchResults {
            records,
            stats,
            failures,
            request_count,
        })
    }
}

/// Reads `response.numFound` from a count-mode payload.
fn num_found(json: &Value) -> usize {
    let Some(n) = json.pointer("/response/numFound").and_then(Value::as_u64) else {
        warn!("count payload missing response.numFound, substituting zero");
        return 0;
    };
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Parses `facet_counts.facet_fields` flat alternating value/count arrays,
/// paired by position.
fn facet_counts(json: &Value) -> FacetCounts {
    let mut counts = FacetCounts::new();
    let Some(fields) = json
        .pointer("/facet_counts/facet_fields")
        .and_then(Value::as_object)
    else {
        return counts;
    };
    for (name, flat) in fields {
        let Some(flat) = flat.as_array() else {
            continue;
        };
        if flat.is_empty() {
            continue;
        }
        let mut value_counts = HashMap::new();
        for pair in flat.chunks_exact(2) {
            if let (Some(value), Some(count)) = (pair[0].as_str(), pair[1].as_u64()) {
                value_counts.insert(
                    value.to_string(),
                    usize::try_from(count).unwrap_or(usize::MAX),
                );
            }
        }
        counts.insert(name.clone(), value_counts);
    }
    counts
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_num_found_parses() {
        let json = json!({ "response": { "numFound": 42, "docs": [] } });
        assert_eq!(num_found(&json), 42);
    }

    #[test]
    fn test_num_found_missing_is_zero() {
        assert_eq!(num_found(&json!({})), 0);
        assert_eq!(num_found(&json!({ "response": {} })), 0);
    }

    #[test]
    fn test_facet_counts_pairs_by_position() {
        let json = json!({
            "facet_counts": {
                "facet_fields": {
                    "project": ["CMIP5", 10, "CMIP6", 32],
                    "empty": []
                }
            }
        });
        let counts = facet_counts(&json);
        assert_eq!(counts["project"]["CMIP5"], 10);
        assert_eq!(counts["project"]["CMIP6"], 32);
        assert!(!counts.contains_key("empty"));
    }

    #[test]
    fn test_facet_counts_missing_section_is_empty() {
        assert!(facet_counts(&json!({})).is_empty());
    }

    #[test]
    fn test_default_params() {
        let params = SearchParams::default();
        assert_eq!(params.offset, 0);
        assert_eq!(params.max_total, Some(DEFAULT_MAX_RESULTS));
        assert!(params.keep_duplicates);
        assert!(params.hits.is_none());
    }

    #[test]
    fn test_results_into_result_strict() {
        let complete: SearchResults<FileRecord> = SearchResults {
            records: Vec::new(),
            stats: AssemblyStats::default(),
            failures: Vec::new(),
            request_count: 2,
        };
        assert!(complete.is_complete());
        assert!(complete.into_result().is_ok());

        let partial: SearchResults<FileRecord> = SearchResults {
            records: Vec::new(),
            stats: AssemblyStats::default(),
            failures: vec![FetchError::Cancelled {
                url: "https://idx.example/esg-search/search".to_string(),
            }],
            request_count: 2,
        };
        assert!(!partial.is_complete());
        let error = partial.into_result().unwrap_err();
        assert!(matches!(error, SearchError::Fetch(_)));
    }
}
