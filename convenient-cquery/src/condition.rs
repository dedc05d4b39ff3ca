//! Configuration identity and config-condition match results

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque token naming one build configuration (its checksum)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationToken(String);

impl ConfigurationToken {
    /// Wrap an existing checksum
    pub fn new(checksum: impl Into<String>) -> Self {
        Self(checksum.into())
    }

    /// Derive a checksum from build options.
    ///
    /// Options are hashed as sorted `key=value` lines, so the token does not
    /// depend on the order options were collected in.
    pub fn from_build_options(options: &BTreeMap<String, String>) -> Self {
        let mut hasher = Sha256::new();
        for (key, value) in options {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Checksum string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigurationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Match results of the config conditions visible to one configured target.
///
/// Maps condition label to whether it matches the target's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigConditions(BTreeMap<String, bool>);

impl ConfigConditions {
    /// No conditions
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the match result for a condition
    pub fn with(mut self, label: &str, matches: bool) -> Self {
        let _ = self.0.insert(label.to_string(), matches);
        self
    }

    /// Match result for a condition, `None` if the condition is unknown
    pub fn get(&self, label: &str) -> Option<bool> {
        self.0.get(label).copied()
    }

    /// Whether the condition is known and matches
    pub fn matches(&self, label: &str) -> bool {
        self.get(label).unwrap_or(false)
    }

    /// Number of known conditions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No conditions known
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for ConfigConditions {
    fn from_iter<T: IntoIterator<Item = (S, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
