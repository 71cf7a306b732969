//! Fedsearch Core Library
//!
//! This library provides the core functionality for the fedsearch tool,
//! which bulk-discovers files and datasets described by a federation of
//! Solr-backed search index nodes exposing a faceted query API.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`query`] - Immutable faceted query model with content fingerprints
//! - [`search`] - Request building, page distribution, concurrent fetch
//!   engine and result assembly
//! - [`record`] - Typed records deserialized from search-index documents
//! - [`config`] - Injected search configuration
//! - [`auth`] - Certificate bundle state for the credential collaborator
//! - [`store`] - Storage boundary for finished records

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod query;
pub mod record;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use auth::{AuthStatus, CertBundle};
pub use config::{
    DEFAULT_INDEX_NODE, DEFAULT_MAX_CONCURRENT, DEFAULT_PAGE_LIMIT, ConfigError, SearchConfig,
};
pub use query::{Options, Query, QueryError, Selection};
pub use record::{DatasetRecord, FileRecord, RecordError};
pub use search::{
    DocType, FacetCounts, FetchEngine, FetchError, Outcome, PreparedRequest, SearchError,
    SearchParams, SearchResults, Session, Window, distribute_hits,
};
pub use store::{MemoryStore, RecordStore, StoreError};
