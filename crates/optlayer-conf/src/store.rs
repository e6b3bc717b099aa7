//! Flat key→string config store with the line-oriented file format
//!
//! Files hold one `key = value` entry per line. Keys are restricted to
//! alphanumerics, `.` and `_`; anything else on a line (such as a `#`
//! comment) causes the line to be skipped. Double quotes inside values are
//! dropped. A `[name]` line opens a profile section whose entries apply only
//! when `name` matches the profile the file is loaded for.

use crate::value::ConfigValue;
use crate::{Error, Result, io};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Ordered mapping from dotted option names to their string encodings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigStore {
    options: BTreeMap<String, String>,
}

impl ConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config text; profile sections are ignored.
    pub fn parse(text: &str) -> Self {
        Self::parse_for_profile(text, None)
    }

    /// Parse config text, honoring `[name]` sections that match `profile`.
    pub fn parse_for_profile(text: &str, profile: Option<&str>) -> Self {
        let mut store = Self::new();
        let mut active = true;
        for line in text.lines() {
            store.parse_line(line, profile, &mut active);
        }
        store
    }

    fn parse_line(&mut self, line: &str, profile: Option<&str>, active: &mut bool) {
        let line = line.trim_start_matches(is_whitespace);

        if let Some(section) = line.strip_prefix('[') {
            let name = section.rfind(']').map_or(section, |end| &section[..end]);
            *active = profile == Some(name);
            return;
        }

        let key_len = line.find(|c: char| !is_valid_key_char(c)).unwrap_or(line.len());
        let (key, rest) = line.split_at(key_len);
        if key.is_empty() {
            return;
        }
        let Some(value) = rest.trim_start_matches(is_whitespace).strip_prefix('=') else {
            return;
        };

        let value: String = value
            .trim_start_matches(is_whitespace)
            .chars()
            .filter(|&c| c != '"')
            .collect();

        if *active {
            self.options.insert(key.to_string(), value);
        }
    }

    /// Load a config file. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_for_profile(path, None)
    }

    /// Load a config file, honoring `[name]` sections that match `profile`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load_for_profile(path: &Path, profile: Option<&str>) -> Result<Self> {
        match io::read_locked(path)? {
            Some(text) => {
                tracing::info!(path = %path.display(), "Found config file");
                Ok(Self::parse_for_profile(&text, profile))
            }
            None => {
                tracing::info!(path = %path.display(), "No config file found");
                Ok(Self::new())
            }
        }
    }

    /// Render entries whose key contains `filter` (all entries when `None`).
    pub fn to_text(&self, filter: Option<&str>) -> String {
        self.options
            .iter()
            .filter(|(key, _)| filter.is_none_or(|f| key.contains(f)))
            .map(|(key, value)| format!("{key} = {value}\n"))
            .collect()
    }

    /// Write the store to `path` atomically, keeping only keys that contain
    /// `filter` when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or locked.
    pub fn save(&self, path: &Path, filter: Option<&str>) -> Result<()> {
        tracing::info!(path = %path.display(), "Serializing config file");
        io::write_atomic(path, self.to_text(filter).as_bytes())
    }

    /// Raw string stored for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Parse the value stored for `key`.
    ///
    /// A value that fails to parse is logged and treated as absent.
    pub fn get<T: ConfigValue>(&self, key: &str) -> Option<T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unparsable config value");
                None
            }
        }
    }

    /// Parse the value stored for `key`, reporting invalid values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if an entry exists but does not parse.
    pub fn try_get<T: ConfigValue>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_str(key) else {
            return Ok(None);
        };
        T::parse_config(raw).map(Some).ok_or_else(|| Error::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected: T::TYPE_NAME,
        })
    }

    /// Parse the value for `key`, preferring an environment override when
    /// one is supplied and valid.
    pub fn get_or<T: ConfigValue>(&self, key: &str, default: T, env_override: Option<&str>) -> T {
        if let Some(value) = env_override.filter(|v| !v.is_empty()).and_then(T::parse_config) {
            return value;
        }
        self.get(key).unwrap_or(default)
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    pub fn set<T: ConfigValue>(&mut self, key: impl Into<String>, value: &T) {
        self.set_str(key, value.to_config_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.options.remove(key)
    }

    /// Copy every entry of `other` into this store, overwriting duplicates.
    pub fn merge(&mut self, other: &ConfigStore) {
        for (key, value) in &other.options {
            self.options.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Dump every entry at `info` level under a heading.
    pub fn log_options(&self, name: &str) {
        if self.options.is_empty() {
            return;
        }
        tracing::info!("{name} configuration:");
        for (key, value) in &self.options {
            tracing::info!("  {key} = {value}");
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

fn is_valid_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_'
}
