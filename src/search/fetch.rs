//! Concurrency core: executes batches of prepared requests with per-host
//! throttling.
//!
//! The engine bounds in-flight requests per destination host with one
//! lazily-created [`Semaphore`] per host, sized from configuration. A
//! request failure is captured as that request's [`Outcome`] and never
//! cancels its siblings: the batch always runs to completion, and callers
//! inspect every outcome before deciding whether the aggregate failure
//! matters to them.
//!
//! # Reuse across runtimes
//!
//! The semaphore map is instance state, never ambient. Tokio semaphores are
//! not bound to an event loop, but the map caches sizing and accumulates
//! hosts; call [`FetchEngine::reset`] when reusing one engine across
//! independent top-level invocations so stale per-host state is discarded.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use super::request::PreparedRequest;
use crate::config::SearchConfig;

/// Per-request failure captured as an outcome.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, TLS, timeout).
    #[error("network error querying {url}: {source}")]
    Network {
        /// The endpoint that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The index node answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// The endpoint that answered.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body was not valid JSON.
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        /// The endpoint that answered.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// The request was cancelled before it could be dispatched.
    #[error("request to {url} cancelled")]
    Cancelled {
        /// The endpoint that was targeted.
        url: String,
    },
}

/// Aggregate failure carrying every captured per-request error of a batch.
///
/// Raised only after the full batch has completed, so partial success is
/// always observable through the individual outcomes first.
#[derive(Debug, Error)]
#[error("{} of {total} search requests failed", errors.len())]
pub struct AggregateError {
    /// Every captured per-request error, in completion order.
    pub errors: Vec<FetchError>,
    /// Number of requests in the batch.
    pub total: usize,
}

/// The result of one dispatched request: parsed payload or captured error,
/// never both, never silently dropped.
#[derive(Debug)]
pub struct Outcome {
    /// The request this outcome belongs to.
    pub request: PreparedRequest,
    /// Parsed JSON payload on success, captured error on failure.
    pub result: Result<Value, FetchError>,
}

impl Outcome {
    /// True if the request produced a payload.
    #[must_use]
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    /// The payload, if the request succeeded.
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }
}

/// Executes batches of search requests with bounded per-host concurrency.
#[derive(Debug)]
pub struct FetchEngine {
    /// Injected transport; certificate state is owned by the credential
    /// collaborator that built it.
    client: Client,
    /// Per-request timeout.
    timeout: Duration,
    /// Limiter size for newly seen hosts.
    max_concurrent: usize,
    /// Lazily-populated per-host limiters. Instance-scoped: engines never
    /// share limiters.
    semaphores: DashMap<String, Arc<Semaphore>>,
}

impl FetchEngine {
    /// Creates an engine with a default transport.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: &SearchConfig) -> Self {
        let client = Client::builder()
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self::with_transport(config, client)
    }

    /// Creates an engine around an injected transport, typically one
    /// carrying the credential collaborator's client certificate.
    #[must_use]
    pub fn with_transport(config: &SearchConfig, client: Client) -> Self {
        Self {
            client,
            timeout: config.http_timeout(),
            max_concurrent: config.max_concurrent,
            semaphores: DashMap::new(),
        }
    }

    /// Drops all per-host limiters.
    ///
    /// Call when reusing the engine across independent top-level
    /// invocations that may run on a different runtime.
    pub fn reset(&self) {
        self.semaphores.clear();
    }

    /// Executes a batch to completion, returning one outcome per request in
    /// completion order.
    ///
    /// Every dispatched request yields exactly one outcome; failures never
    /// abort the batch. Use [`check`](Self::check) afterwards for aggregate
    /// failure semantics.
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub async fn fetch(&self, requests: Vec<PreparedRequest>) -> Vec<Outcome> {
        let total = requests.len();
        let mut in_flight: FuturesUnordered<_> = requests
            .into_iter()
            .map(|request| self.fetch_one(request))
            .collect();
        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = in_flight.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Splits a completed batch into payloads and an aggregate failure.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] carrying every captured error if one or
    /// more requests failed. Callers that need the successful payloads
    /// alongside the failure partition the outcomes themselves.
    pub fn check(outcomes: Vec<Outcome>) -> Result<Vec<Outcome>, AggregateError> {
        let total = outcomes.len();
        if outcomes.iter().all(Outcome::success) {
            return Ok(outcomes);
        }
        let errors: Vec<FetchError> = outcomes
            .into_iter()
            .filter_map(|outcome| outcome.result.err())
            .collect();
        Err(AggregateError { errors, total })
    }

    /// Dispatches one request under its host's limiter.
    async fn fetch_one(&self, request: PreparedRequest) -> Outcome {
        // Clone the Arc so the DashMap shard lock is released before the
        // await on the semaphore.
        let semaphore = self
            .semaphores
            .entry(request.host.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_concurrent)))
            .clone();

        let result = match semaphore.acquire_owned().await {
            Ok(permit) => {
                // Permit is held for the whole request and released on every
                // path when it drops.
                let _permit = permit;
                debug!(host = %request.host, params = ?request.params, "GET search");
                self.send(&request).await
            }
            Err(_) => Err(FetchError::Cancelled {
                url: request.url.to_string(),
            }),
        };

        match &result {
            Ok(_) => debug!(host = %request.host, "fetched"),
            Err(error) => debug!(host = %request.host, %error, "request failed"),
        }
        Outcome { request, result }
    }

    async fn send(&self, request: &PreparedRequest) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(request.url.clone())
            .query(&request.params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: request.url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: request.url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|source| FetchError::Decode {
                url: request.url.to_string(),
                source,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;

    fn prepared(host: &str) -> PreparedRequest {
        PreparedRequest {
            query_index: 0,
            url: Url::parse(&format!("https://{host}/esg-search/search")).unwrap(),
            host: host.to_string(),
            params: Vec::new(),
        }
    }

    fn outcome_ok() -> Outcome {
        Outcome {
            request: prepared("a.example"),
            result: Ok(serde_json::json!({})),
        }
    }

    fn outcome_err(status: u16) -> Outcome {
        Outcome {
            request: prepared("a.example"),
            result: Err(FetchError::Status {
                url: "https://a.example/esg-search/search".to_string(),
                status,
            }),
        }
    }

    #[test]
    fn test_check_all_ok_passes_outcomes_through() {
        let outcomes = vec![outcome_ok(), outcome_ok()];
        let checked = FetchEngine::check(outcomes).unwrap();
        assert_eq!(checked.len(), 2);
    }

    #[test]
    fn test_check_collects_every_error() {
        let outcomes = vec![outcome_ok(), outcome_err(500), outcome_err(404)];
        let aggregate = FetchEngine::check(outcomes).unwrap_err();
        assert_eq!(aggregate.total, 3);
        assert_eq!(aggregate.errors.len(), 2);
        assert_eq!(aggregate.to_string(), "2 of 3 search requests failed");
    }

    #[tokio::test]
    async fn test_reset_clears_host_limiters() {
        let engine = FetchEngine::new(&SearchConfig::default());
        engine
            .semaphores
            .insert("a.example".to_string(), Arc::new(Semaphore::new(1)));
        assert_eq!(engine.semaphores.len(), 1);
        engine.reset();
        assert!(engine.semaphores.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_empty_batch() {
        let engine = FetchEngine::new(&SearchConfig::default());
        let outcomes = engine.fetch(Vec::new()).await;
        assert!(outcomes.is_empty());
    }
}
