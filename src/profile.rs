//! User profile: the key/value facts the model grounds its answers in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An ordered collection of (key, value) rows plus optional writing
/// samples. Rows keep their entry order; duplicate keys are resolved
/// last-write-wins when the profile is flattened for a fill request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    rows: Vec<(String, String)>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a profile from raw key/value rows, skipping any row with an
    /// empty key or empty value.
    pub fn from_rows<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut profile = Self::new();
        for (key, value) in rows {
            profile.set(key, value);
        }
        profile
    }

    /// Append a row. Rows with an empty key or empty value are ignored.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || value.is_empty() {
            return;
        }
        self.rows.push((key, value));
    }

    /// Append a writing sample under `writing_sample_<n>`, numbered after
    /// the samples already present.
    pub fn add_writing_sample(&mut self, text: impl Into<String>) {
        let n = self
            .rows
            .iter()
            .filter(|(k, _)| k.starts_with("writing_sample_"))
            .count()
            + 1;
        self.set(format!("writing_sample_{n}"), text);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    /// Flatten to the wire map, resolving duplicate keys last-write-wins.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.rows.iter().cloned().collect()
    }
}
