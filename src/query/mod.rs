//! Typed representation of a faceted search query.
//!
//! A [`Query`] is an immutable value object bundling a [`Selection`] (facet
//! constraints plus an optional free-text term), explicitly-set boolean
//! [`Options`], and an optional `require` link to a parent query's
//! fingerprint. Every constructor recomputes the query's own SHA-1
//! fingerprint from its content, so two queries with the same constraints
//! always share an identity regardless of how they were built.
//!
//! # Combining
//!
//! [`Query::combine`] is a binary, right-biased merge producing a new query:
//! facets are unioned (same facet with different values is a
//! [`QueryError::FacetConflict`]), options take the right side's value, and
//! the right side's `require` link is dropped rather than merged.

mod fingerprint;
mod options;
mod selection;

pub use options::{KNOWN_OPTIONS, OptionValue, Options};
pub use selection::{FREETEXT_FACET, Selection};

pub(crate) use fingerprint::FingerprintHasher;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while constructing or combining queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The same facet is set to different values on both sides.
    #[error("facet {name} already set to [{existing}], refusing to overwrite with [{incoming}]")]
    FacetConflict {
        /// The conflicting facet name.
        name: String,
        /// Values already present.
        existing: String,
        /// Values that were rejected.
        incoming: String,
    },

    /// A facet was given no values.
    #[error("facet {name} has no values")]
    EmptyFacet {
        /// The facet name.
        name: String,
    },

    /// Option name not understood by the search backend.
    #[error("unknown search option: {name}")]
    UnknownOption {
        /// The rejected option name.
        name: String,
    },
}

/// One logical search: facet constraints, options, and an optional parent
/// link, identified by a content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    selection: Selection,
    options: Options,
    require: Option<String>,
    sha: String,
}

impl Query {
    /// Creates a query from a selection and options.
    #[must_use]
    pub fn new(selection: Selection, options: Options) -> Self {
        Self::with_require(selection, options, None)
    }

    /// Creates a query linked to a parent query's fingerprint.
    #[must_use]
    pub fn with_require(
        selection: Selection,
        options: Options,
        require: Option<String>,
    ) -> Self {
        let sha = compute_sha(&selection, &options, require.as_deref());
        Self {
            selection,
            options,
            require,
            sha,
        }
    }

    /// The facet constraints.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The explicitly-set options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Fingerprint of the parent query this one refines, if any.
    #[must_use]
    pub fn require(&self) -> Option<&str> {
        self.require.as_deref()
    }

    /// The query's own content fingerprint (40-hex SHA-1).
    #[must_use]
    pub fn sha(&self) -> &str {
        &self.sha
    }

    /// Folds another query's constraints into this one, producing a new
    /// query.
    ///
    /// Facets are unioned; options are overwritten right-biased; the
    /// resulting query keeps this query's `require` link while the folded-in
    /// side's link is dropped. Combining a query with itself changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::FacetConflict`] if both queries set the same
    /// facet to different values.
    pub fn combine(&self, other: &Query) -> Result<Query, QueryError> {
        let selection = self.selection.merged(&other.selection)?;
        let options = self.options.merged(&other.options);
        Ok(Query::with_require(
            selection,
            options,
            self.require.clone(),
        ))
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new(Selection::new(), Options::new())
    }
}

/// Canonical fingerprint over all query fields except the fingerprint
/// itself.
fn compute_sha(selection: &Selection, options: &Options, require: Option<&str>) -> String {
    let mut hasher = FingerprintHasher::new();
    selection.hash_into(&mut hasher);
    options.hash_into(&mut hasher);
    if let Some(parent) = require {
        hasher.field("require", parent);
    }
    hasher.finish()
}
