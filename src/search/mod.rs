//! Bulk discovery against the federated faceted search index.
//!
//! The pipeline is linear: a [`Session`] probes hit counts, distributes
//! them into pagination windows, builds one request per window, runs the
//! batch through the throttled [`FetchEngine`], and assembles the pages
//! into typed records with full accounting of drops and failures.

mod assemble;
mod distribute;
mod error;
mod fetch;
mod request;
mod session;

pub use assemble::AssemblyStats;
pub use distribute::{Window, distribute_hits};
pub use error::SearchError;
pub use fetch::{AggregateError, FetchEngine, FetchError, Outcome};
pub use request::{DANGEROUS_FACETS, DocType, PreparedRequest, RequestSpec, index_to_url, url_to_index};
pub use session::{DEFAULT_MAX_RESULTS, FacetCounts, SearchParams, SearchResults, Session};
