//! Builds one well-formed search request from a query and a pagination
//! window.
//!
//! The builder renders a [`Query`] into the index node's faceted query
//! parameters: facet terms become `name:value` (or `name:(v1 v2)` for
//! multi-valued facets) joined with logical AND, the reserved free-text
//! facet is inserted as a bare clause, and boolean options render only when
//! explicitly set. Count-mode requests force a page size of zero, which the
//! server interprets as "count only, no documents".
//!
//! Facet-count projections over identity-like facets (or a `*` wildcard
//! combined with distributed search) are rejected here, before any network
//! I/O, because they are known to produce inconsistent results from the
//! federated backend.

use url::Url;

use super::error::SearchError;
use crate::query::{FREETEXT_FACET, OptionValue, Query};

/// Facet names whose count projection destabilizes the distributed backend.
pub const DANGEROUS_FACETS: [&str; 5] = [
    "instance_id",
    "dataset_id",
    "master_id",
    "tracking_id",
    "url",
];

/// Path of the faceted search endpoint on every index node.
const SEARCH_PATH: &str = "/esg-search/search";

/// Wire format requested from the index.
const SOLR_JSON: &str = "application/solr+json";

/// Document type targeted by a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    /// Downloadable files.
    File,
    /// Datasets grouping files.
    Dataset,
}

impl DocType {
    /// Wire value for the `type` parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Dataset => "Dataset",
        }
    }
}

/// One fully-formed request descriptor, ready for the fetch engine.
///
/// Carries the index of the query it was built from so that outcomes,
/// observed in completion order, can be mapped back to their query.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Position of the originating query in the caller's batch.
    pub query_index: usize,
    /// Target endpoint URL (no query string; parameters travel separately).
    pub url: Url,
    /// Destination host, the key for per-host throttling.
    pub host: String,
    /// Query parameters in render order.
    pub params: Vec<(String, String)>,
}

/// Inputs for building one search request.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpec<'a> {
    query: &'a Query,
    query_index: usize,
    doc_type: DocType,
    offset: usize,
    page_limit: usize,
    fields: Option<&'a [String]>,
    facets: Option<&'a [String]>,
}

impl<'a> RequestSpec<'a> {
    /// Spec for a count-mode request: page size zero, no documents.
    #[must_use]
    pub fn count(query: &'a Query, query_index: usize, doc_type: DocType) -> Self {
        Self {
            query,
            query_index,
            doc_type,
            offset: 0,
            page_limit: 0,
            fields: None,
            facets: None,
        }
    }

    /// Spec for a page-mode request over one result window.
    #[must_use]
    pub fn page(
        query: &'a Query,
        query_index: usize,
        doc_type: DocType,
        offset: usize,
        page_limit: usize,
        fields: &'a [String],
    ) -> Self {
        Self {
            query,
            query_index,
            doc_type,
            offset,
            page_limit,
            fields: Some(fields),
            facets: None,
        }
    }

    /// Adds a facet-count projection (used by hint probes).
    #[must_use]
    pub fn with_facets(mut self, facets: &'a [String]) -> Self {
        self.facets = Some(facets);
        self
    }

    /// Renders the spec into a [`PreparedRequest`] against one index node.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::UnstableQuery`] if the facet projection names
    /// a dangerous facet, or combines a `*` wildcard with `distrib=true`.
    /// Returns [`SearchError::InvalidIndex`] if the endpoint URL has no
    /// host.
    pub fn build(&self, index_url: &Url) -> Result<PreparedRequest, SearchError> {
        let mut params: Vec<(String, String)> = vec![
            ("type".to_string(), self.doc_type.as_str().to_string()),
            ("offset".to_string(), self.offset.to_string()),
            ("limit".to_string(), self.page_limit.to_string()),
            ("format".to_string(), SOLR_JSON.to_string()),
        ];

        match self.fields {
            Some(fields) => params.push(("fields".to_string(), fields.join(","))),
            None => params.push(("fields".to_string(), "instance_id".to_string())),
        }

        let mut facets_star = false;
        if let Some(facets) = self.facets {
            if facets
                .iter()
                .any(|f| DANGEROUS_FACETS.contains(&f.as_str()))
            {
                return Err(SearchError::UnstableQuery {
                    facets: facets.join(","),
                });
            }
            facets_star = facets.iter().any(|f| f == "*");
            params.push(("facets".to_string(), facets.join(",")));
        }

        let mut terms: Vec<String> = Vec::new();
        for (name, values) in self.query.selection().iter() {
            let value_term = values.join(" ");
            if name == FREETEXT_FACET {
                terms.push(value_term);
            } else if values.len() > 1 {
                terms.push(format!("{name}:({value_term})"));
            } else {
                terms.push(format!("{name}:{value_term}"));
            }
        }
        if !terms.is_empty() {
            params.push(("query".to_string(), terms.join(" AND ")));
        }

        let mut distrib = false;
        for (name, value) in self.query.options().iter() {
            if let Some(rendered) = value.as_param() {
                if name == "distrib" && value == OptionValue::True {
                    distrib = true;
                }
                params.push((name.to_string(), rendered.to_string()));
            }
        }

        if distrib && facets_star {
            return Err(SearchError::UnstableQuery {
                facets: self.facets.map(|f| f.join(",")).unwrap_or_default(),
            });
        }

        let host = index_url
            .host_str()
            .ok_or(SearchError::InvalidIndex {
                value: index_url.to_string(),
                source: url::ParseError::EmptyHost,
            })?
            .to_string();

        Ok(PreparedRequest {
            query_index: self.query_index,
            url: index_url.clone(),
            host,
            params,
        })
    }
}

/// Resolves an index node hostname (or full URL) into the search endpoint
/// URL.
///
/// A bare hostname becomes `https://<host>/esg-search/search`; a full URL
/// keeps its scheme, host and port but is normalized onto the search path.
///
/// # Errors
///
/// Returns [`SearchError::InvalidIndex`] if the value parses to no usable
/// host.
pub fn index_to_url(index: &str) -> Result<Url, SearchError> {
    if let Ok(mut url) = Url::parse(index)
        && url.host_str().is_some()
    {
        url.set_path(SEARCH_PATH);
        url.set_query(None);
        return Ok(url);
    }
    Url::parse(&format!("https://{index}{SEARCH_PATH}")).map_err(|source| {
        SearchError::InvalidIndex {
            value: index.to_string(),
            source,
        }
    })
}

/// Extracts the bare hostname from an index node value that may be a full
/// URL.
#[must_use]
pub fn url_to_index(value: &str) -> String {
    if let Ok(url) = Url::parse(value)
        && let Some(host) = url.host_str()
    {
        return host.to_string();
    }
    value.trim_end_matches('/').to_string()
}
