//! Boolean search options with explicit-default semantics.

use serde::Serialize;

use super::QueryError;
use super::fingerprint::FingerprintHasher;

/// Option names understood by the federated search backend.
pub const KNOWN_OPTIONS: [&str; 4] = ["distrib", "latest", "replica", "retracted"];

/// Value of one search option.
///
/// `Default` is an explicit reset: it is recorded on the query (so combines
/// can overwrite an earlier `True`/`False`) but renders nothing on the wire,
/// letting the server default apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptionValue {
    /// Render `name=true`.
    True,
    /// Render `name=false`.
    False,
    /// Explicitly unset; nothing is rendered.
    Default,
}

impl OptionValue {
    /// Wire value for this option, or `None` when the server default applies.
    #[must_use]
    pub fn as_param(self) -> Option<&'static str> {
        match self {
            Self::True => Some("true"),
            Self::False => Some("false"),
            Self::Default => None,
        }
    }

    /// Stable label used in fingerprints and display.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Default => "default",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

/// Ordered map of explicitly-set search options.
///
/// Unlike facets, options are overwritable: combining queries takes the
/// right-hand side's value for any option both sides set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Options {
    entries: Vec<(String, OptionValue)>,
}

impl Options {
    /// Creates an empty options map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownOption`] for names outside
    /// [`KNOWN_OPTIONS`].
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: OptionValue,
    ) -> Result<(), QueryError> {
        let name = name.into();
        if !KNOWN_OPTIONS.contains(&name.as_str()) {
            return Err(QueryError::UnknownOption { name });
        }
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
        Ok(())
    }

    /// Returns the value of an option, if explicitly set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Iterates explicitly-set options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, OptionValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Returns true if no option is explicitly set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Right-biased merge: the other side's value wins for shared names.
    #[must_use]
    pub fn merged(&self, other: &Options) -> Options {
        let mut result = self.clone();
        for (name, value) in &other.entries {
            if let Some(entry) = result.entries.iter_mut().find(|(n, _)| n == name) {
                entry.1 = *value;
            } else {
                result.entries.push((name.clone(), *value));
            }
        }
        result
    }

    /// Feeds the options into a fingerprint digest, sorted by name.
    pub(crate) fn hash_into(&self, hasher: &mut FingerprintHasher) {
        let mut sorted: Vec<&(String, OptionValue)> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in sorted {
            hasher.field(name, value.as_str());
        }
    }
}
