//! Error types for the search module.

use thiserror::Error;

use super::fetch::AggregateError;
use crate::query::QueryError;

/// Errors raised by search operations.
///
/// Guard and configuration errors fire synchronously before any network
/// I/O. Per-request failures are captured in fetch outcomes and only
/// surface here, aggregated, after a batch has run to completion.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The requested facet-count projection is known to destabilize the
    /// distributed search backend. Raised before any request is issued.
    #[error(
        "unstable query: facet counts over [{facets}] produce inconsistent results \
         from the federated index"
    )]
    UnstableQuery {
        /// The offending projection list, comma-joined.
        facets: String,
    },

    /// The index node or URL could not be parsed into a request target.
    #[error("invalid index node {value}: {source}")]
    InvalidIndex {
        /// The rejected node or URL string.
        value: String,
        /// The underlying URL parse error.
        #[source]
        source: url::ParseError,
    },

    /// Query construction failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// One or more requests in a completed batch failed.
    #[error(transparent)]
    Fetch(#[from] AggregateError),
}
