//! Faceted selection: facet-name to ordered values.

use serde::Serialize;

use super::QueryError;
use super::fingerprint::FingerprintHasher;

/// Reserved facet name holding a free-text search term.
///
/// Values under this name are rendered as bare Solr clauses instead of
/// `name:value` terms.
pub const FREETEXT_FACET: &str = "query";

/// One facet constraint: a name and its ordered values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Facet {
    name: String,
    values: Vec<String>,
}

/// Immutable-by-convention set of facet constraints.
///
/// Insertion order of facets and values is preserved for display; matching
/// and conflict detection are keyed by facet name. A facet name is set at
/// most once per selection: setting it again with different values is a
/// [`QueryError::FacetConflict`], never a silent overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    facets: Vec<Facet>,
}

impl Selection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a facet to the given values.
    ///
    /// Re-setting a facet with the same values (order-insensitive) is a
    /// no-op, so merging a selection into itself never conflicts.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyFacet`] for an empty value list and
    /// [`QueryError::FacetConflict`] if the facet is already set to
    /// different values.
    pub fn set<N, V>(&mut self, name: N, values: Vec<V>) -> Result<(), QueryError>
    where
        N: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(QueryError::EmptyFacet { name });
        }
        if let Some(existing) = self.facets.iter().find(|f| f.name == name) {
            if same_values(&existing.values, &values) {
                return Ok(());
            }
            return Err(QueryError::FacetConflict {
                name,
                existing: existing.values.join(","),
                incoming: values.join(","),
            });
        }
        self.facets.push(Facet { name, values });
        Ok(())
    }

    /// Sets the free-text term under the reserved [`FREETEXT_FACET`] name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::FacetConflict`] if a different term is already
    /// set.
    pub fn set_term(&mut self, term: impl Into<String>) -> Result<(), QueryError> {
        self.set(FREETEXT_FACET, vec![term.into()])
    }

    /// Returns the values of a facet, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.facets
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.values.as_slice())
    }

    /// Returns the free-text term, if set.
    #[must_use]
    pub fn term(&self) -> Option<&str> {
        self.get(FREETEXT_FACET)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Iterates facets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.facets
            .iter()
            .map(|f| (f.name.as_str(), f.values.as_slice()))
    }

    /// Returns true if no facet is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Returns the number of set facets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    /// Right-biased union with another selection.
    ///
    /// Facets only present on one side are kept; facets present on both
    /// sides must agree on their values.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::FacetConflict`] if both sides set the same
    /// facet to different values.
    pub fn merged(&self, other: &Selection) -> Result<Selection, QueryError> {
        let mut result = self.clone();
        for facet in &other.facets {
            result.set(facet.name.clone(), facet.values.clone())?;
        }
        Ok(result)
    }

    /// Feeds the selection into a fingerprint digest, facets sorted by name
    /// so that insertion order does not change identity.
    pub(crate) fn hash_into(&self, hasher: &mut FingerprintHasher) {
        let mut sorted: Vec<&Facet> = self.facets.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        for facet in sorted {
            hasher.field(&facet.name, &facet.values.join("\u{1f}"));
        }
    }
}

/// Order-insensitive value comparison for conflict detection.
fn same_values(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted: Vec<&String> = a.iter().collect();
    let mut b_sorted: Vec<&String> = b.iter().collect();
    a_sorted.sort();
    b_sorted.sort();
    a_sorted == b_sorted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_preserves_insertion_order() {
        let mut selection = Selection::new();
        selection.set("project", vec!["CMIP6"]).unwrap();
        selection
            .set("variable_id", vec!["tas", "pr"])
            .unwrap();

        assert_eq!(selection.len(), 2);
        assert_eq!(selection.get("project").unwrap(), ["CMIP6"]);
        let names: Vec<&str> = selection.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["project", "variable_id"]);
    }

    #[test]
    fn test_set_same_values_is_noop() {
        let mut selection = Selection::new();
        selection.set("variable_id", vec!["tas", "pr"]).unwrap();
        // Same values in a different order do not conflict.
        selection.set("variable_id", vec!["pr", "tas"]).unwrap();
        assert_eq!(selection.get("variable_id").unwrap(), ["tas", "pr"]);
    }

    #[test]
    fn test_set_conflicting_values_errors() {
        let mut selection = Selection::new();
        selection.set("project", vec!["CMIP5"]).unwrap();
        let result = selection.set("project", vec!["CMIP6"]);
        assert!(matches!(
            result,
            Err(QueryError::FacetConflict { name, .. }) if name == "project"
        ));
        // The original value is untouched.
        assert_eq!(selection.get("project").unwrap(), ["CMIP5"]);
    }

    #[test]
    fn test_set_empty_values_errors() {
        let mut selection = Selection::new();
        let result = selection.set("project", Vec::<String>::new());
        assert!(matches!(result, Err(QueryError::EmptyFacet { .. })));
    }

    #[test]
    fn test_free_text_term() {
        let mut selection = Selection::new();
        selection.set_term("temperature").unwrap();
        assert_eq!(selection.term(), Some("temperature"));
        assert_eq!(selection.get(FREETEXT_FACET).unwrap(), ["temperature"]);
    }

    #[test]
    fn test_merged_disjoint_is_union() {
        let mut a = Selection::new();
        a.set("project", vec!["CMIP6"]).unwrap();
        let mut b = Selection::new();
        b.set("mip_era", vec!["CMIP6"]).unwrap();

        let ab = a.merged(&b).unwrap();
        let ba = b.merged(&a).unwrap();
        assert_eq!(ab.get("project"), ba.get("project"));
        assert_eq!(ab.get("mip_era"), ba.get("mip_era"));
        assert_eq!(ab.len(), 2);
    }

    #[test]
    fn test_merged_conflict_errors() {
        let mut a = Selection::new();
        a.set("project", vec!["CMIP5"]).unwrap();
        let mut b = Selection::new();
        b.set("project", vec!["CMIP6"]).unwrap();
        assert!(matches!(
            a.merged(&b),
            Err(QueryError::FacetConflict { .. })
        ));
    }
}
