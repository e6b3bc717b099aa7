//! Built-in per-application configs selected by executable name

use crate::{ConfigStore, Error, Result};
use regex::{Regex, RegexBuilder};

/// Ordered table of executable-name patterns and the config each one
/// contributes. The first pattern that matches wins.
#[derive(Debug, Default, Clone)]
pub struct AppProfiles {
    entries: Vec<(Regex, ConfigStore)>,
}

impl AppProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a profile. Patterns match case-insensitively anywhere in the
    /// executable path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` is not a valid regex.
    pub fn add(&mut self, pattern: &str, config: ConfigStore) -> Result<()> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        self.entries.push((regex, config));
        Ok(())
    }

    /// Builder-style variant of [`AppProfiles::add`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` is not a valid regex.
    pub fn with(mut self, pattern: &str, config: ConfigStore) -> Result<Self> {
        self.add(pattern, config)?;
        Ok(self)
    }

    pub fn find(&self, exe_path: &str) -> Option<&ConfigStore> {
        self.entries
            .iter()
            .find(|(regex, _)| regex.is_match(exe_path))
            .map(|(_, config)| config)
    }

    /// Config for `exe_path`, or an empty store when no profile matches.
    pub fn config_for(&self, exe_path: &str) -> ConfigStore {
        match self.find(exe_path) {
            Some(config) => {
                tracing::info!(exe = exe_path, "Found app config for executable");
                config.clone()
            }
            None => {
                tracing::info!(exe = exe_path, "Did not find app config for executable");
                ConfigStore::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles() -> AppProfiles {
        AppProfiles::new()
            .with(r"\\portal2\.exe$", ConfigStore::parse("app.fps = 60\n"))
            .unwrap()
            .with(r"game", ConfigStore::parse("app.fps = 30\n"))
            .unwrap()
    }

    #[test]
    fn first_match_wins() {
        let config = profiles().config_for(r"C:\Games\Portal2.EXE");
        assert_eq!(config.get::<i32>("app.fps"), Some(60));
    }

    #[test]
    fn falls_through_to_later_patterns() {
        let config = profiles().config_for("/opt/mygame/run");
        assert_eq!(config.get::<i32>("app.fps"), Some(30));
    }

    #[test]
    fn no_match_is_empty() {
        assert!(profiles().config_for("/usr/bin/editor").is_empty());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = AppProfiles::new().add("(", ConfigStore::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
