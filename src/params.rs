//! Request parameters.
//!
//! A [`ParameterSet`] is a flat map of string keys to string values. Numbers
//! travel as their string form; each manipulator interprets the keys it knows
//! and ignores the rest. One set is shared by reference across every stage
//! of a run and never mutated by them.
//!
//! ## Resolution order
//!
//! [`ParameterSet::resolve`] layers parameters from lowest to highest
//! priority:
//!
//! 1. Configured `[defaults]`
//! 2. Presets named in `p` (comma-separated, applied left to right)
//! 3. Explicit request parameters
//!
//! ```
//! use imgpipe::params::ParameterSet;
//! use std::collections::BTreeMap;
//!
//! let defaults = ParameterSet::from_iter([("q", "80")]);
//! let mut presets = BTreeMap::new();
//! presets.insert("thumb".to_string(), ParameterSet::from_iter([("w", "200"), ("q", "70")]));
//!
//! let request = ParameterSet::from_query("p=thumb&fm=webp");
//! let resolved = request.resolve(&defaults, &presets);
//! assert_eq!(resolved.get("q"), Some("70"));
//! assert_eq!(resolved.get("w"), Some("200"));
//! assert_eq!(resolved.get("fm"), Some("webp"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Key selecting named presets.
pub const PRESET_KEY: &str = "p";

#[derive(Error, Debug, PartialEq)]
#[error("invalid parameter '{0}': expected key=value")]
pub struct ParseParamError(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Parse a single `key=value` argument. The value may be empty or contain `=`.
    pub fn parse_pair(arg: &str) -> Result<(String, String), ParseParamError> {
        match arg.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(ParseParamError(arg.to_string())),
        }
    }

    /// Parse a URL-style query string (`fm=webp&q=80`).
    ///
    /// Values are taken literally; no percent-decoding. Segments without a
    /// key are skipped, a bare key maps to an empty value, and a later
    /// occurrence of a key wins.
    pub fn from_query(query: &str) -> Self {
        query
            .trim_start_matches('?')
            .split('&')
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
                (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect()
    }

    /// Preset names listed in `p`, in order, with blanks dropped.
    pub fn preset_names(&self) -> Vec<&str> {
        self.get(PRESET_KEY)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Layer `defaults`, then selected presets, then `self`.
    ///
    /// Unknown preset names are skipped with a warning.
    pub fn resolve(
        &self,
        defaults: &ParameterSet,
        presets: &BTreeMap<String, ParameterSet>,
    ) -> ParameterSet {
        let mut resolved = defaults.clone();
        for name in self.preset_names() {
            match presets.get(name) {
                Some(preset) => resolved.extend_from(preset),
                None => tracing::warn!(preset = name, "Unknown preset, ignoring"),
            }
        }
        resolved.extend_from(self);
        resolved
    }

    fn extend_from(&mut self, other: &ParameterSet) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.iter() {
            if !first {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}
