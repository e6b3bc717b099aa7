//! Startup creation of the built-in layers

use super::{LayerHandle, OptionManager};
use crate::env::{EnvSource, split_paths};
use crate::error::Result;
use crate::flags::OptionFlags;
use crate::layer::{LayerDescriptor, LayerKey, SystemLayer};
use crate::value::OptionValue;
use optlayer_conf::{AppProfiles, ConfigStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A config file location that an environment variable can override with
/// a comma-separated list of paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub env_var: String,
    pub default_file: PathBuf,
}

impl ConfigPaths {
    pub fn new(env_var: impl Into<String>, default_file: impl Into<PathBuf>) -> Self {
        Self {
            env_var: env_var.into(),
            default_file: default_file.into(),
        }
    }

    /// Paths listed in the environment variable, else the default file.
    pub fn resolve(&self, env: &dyn EnvSource) -> Vec<PathBuf> {
        match env.var(&self.env_var) {
            Some(list) => {
                tracing::info!(variable = %self.env_var, paths = %list, "Using config paths from environment");
                split_paths(&list).into_iter().map(PathBuf::from).collect()
            }
            None => vec![self.default_file.clone()],
        }
    }
}

/// Where [`OptionManager::initialize_system_layers`] finds each layer's
/// contents.
#[derive(Debug, Clone)]
pub struct SystemLayerSources {
    pub base_config: ConfigPaths,
    pub project_config: ConfigPaths,
    pub user_config: PathBuf,
    pub app_profiles: AppProfiles,
    /// Variable that overrides the executable path used for profile lookup
    pub app_exe_env_var: String,
    pub exe_path: Option<String>,
    pub mod_config: Option<PathBuf>,
}

impl Default for SystemLayerSources {
    fn default() -> Self {
        Self {
            base_config: ConfigPaths::new("OPTLAYER_BASE_CONFIG", "base.conf"),
            project_config: ConfigPaths::new("OPTLAYER_PROJECT_CONFIG", "project.conf"),
            user_config: PathBuf::from("user.conf"),
            app_profiles: AppProfiles::new(),
            app_exe_env_var: "OPTLAYER_APP_EXE".to_string(),
            exe_path: None,
            mod_config: None,
        }
    }
}

impl SystemLayerSources {
    /// Default file names resolved inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        let defaults = Self::default();
        Self {
            base_config: ConfigPaths::new(defaults.base_config.env_var, dir.join("base.conf")),
            project_config: ConfigPaths::new(defaults.project_config.env_var, dir.join("project.conf")),
            user_config: dir.join("user.conf"),
            ..defaults
        }
    }
}

/// Names for several files of one layer kind. The last file keeps the plain
/// name; earlier ones get `"<base> (NN)"`, numbered by distance from the
/// last file.
///
/// Equal priorities break ties by name, so the plain name is consulted
/// first and earlier files rank lower.
pub(crate) fn layer_name(index: usize, total: usize, base: &str) -> String {
    if total <= 1 || index + 1 >= total {
        base.to_string()
    } else {
        format!("{base} ({:02})", total - 1 - index)
    }
}

impl OptionManager {
    /// Create the built-in layers in priority order and load environment
    /// overrides. Returns the merged config of the file-backed layers.
    pub fn initialize_system_layers(
        self: &Arc<Self>,
        sources: &SystemLayerSources,
        env: &dyn EnvSource,
    ) -> Result<ConfigStore> {
        tracing::info!("Initializing system layers");
        let mut merged = ConfigStore::new();

        for layer in self.acquire_file_layers(&sources.base_config, SystemLayer::BaseConfig, env)? {
            merged.merge(&layer.config());
        }

        let exe_path = sources
            .exe_path
            .clone()
            .or_else(|| env.var(&sources.app_exe_env_var))
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .map(|path| path.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        let app_config = sources.app_profiles.config_for(&exe_path);
        let app = self.acquire_layer(LayerDescriptor::system(SystemLayer::AppConfig).config(app_config))?;
        merged.merge(&app.config());

        let project_layers = self.acquire_file_layers(&sources.project_config, SystemLayer::ProjectConfig, env)?;
        for layer in &project_layers {
            merged.merge(&layer.config());
        }
        if let Some(last) = project_layers.last() {
            self.lock().project_layer = Some(last.key().clone());
        }

        if let Some(path) = &sources.mod_config {
            tracing::info!(path = %path.display(), "Loading mod config");
            let layer = self.acquire_layer(LayerDescriptor::system(SystemLayer::ModConfig).file(path))?;
            merged.merge(&layer.config());
        }

        merged.log_options("Effective combined config");

        for layer in [SystemLayer::Derived, SystemLayer::Environment, SystemLayer::Quality] {
            self.acquire_layer(LayerDescriptor::system(layer))?;
        }

        let user = self.acquire_layer(LayerDescriptor::system(SystemLayer::User).file(&sources.user_config))?;
        user.set_category_flags(OptionFlags::USER_SETTING);

        self.load_environment_variables(env);
        tracing::info!("System layer initialization complete");
        Ok(merged)
    }

    fn acquire_file_layers(
        self: &Arc<Self>,
        paths: &ConfigPaths,
        base: SystemLayer,
        env: &dyn EnvSource,
    ) -> Result<Vec<LayerHandle>> {
        let files = paths.resolve(env);
        let total = files.len();
        files
            .into_iter()
            .enumerate()
            .map(|(index, file)| {
                let key = LayerKey::new(base.priority(), layer_name(index, total, base.name()));
                let mut descriptor = LayerDescriptor::new(key).file(file);
                descriptor.is_system = true;
                self.acquire_layer(descriptor)
            })
            .collect()
    }

    /// Read every option's declared environment variable into the
    /// environment layer. Returns the number of overrides applied.
    pub fn load_environment_variables(&self, env: &dyn EnvSource) -> usize {
        let mut state = self.lock();
        let layer = state.get_or_create_system_layer(SystemLayer::Environment.key());
        let blend = layer.blend();
        let mut loaded = Vec::new();

        for option in state.options.values_mut() {
            let Some(variable) = option.environment().map(str::to_string) else {
                continue;
            };
            let Some(raw) = env.var(&variable) else {
                continue;
            };
            match OptionValue::parse(option.kind(), &raw) {
                Some(value) => {
                    tracing::info!(option = option.full_name(), variable = %variable, value = %raw, "Environment override");
                    option.set_layer_value(layer.key().clone(), value, blend);
                    loaded.push(option.id());
                }
                None => tracing::warn!(
                    option = option.full_name(),
                    variable = %variable,
                    value = %raw,
                    expected = %option.kind(),
                    "Ignoring unparsable environment override"
                ),
            }
        }

        for id in &loaded {
            state.after_layer_write(*id, &layer);
        }
        loaded.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[rstest]
    #[case(0, 1, "Base Config")]
    #[case(0, 3, "Base Config (02)")]
    #[case(1, 3, "Base Config (01)")]
    #[case(2, 3, "Base Config")]
    fn numbered_layer_names(#[case] index: usize, #[case] total: usize, #[case] expected: &str) {
        assert_eq!(layer_name(index, total, "Base Config"), expected);
    }

    #[test]
    fn later_files_outrank_earlier_ones() {
        let total = 3;
        let keys: Vec<LayerKey> = (0..total)
            .map(|index| LayerKey::new(SystemLayer::BaseConfig.priority(), layer_name(index, total, "Base Config")))
            .collect();
        let mut ordered = keys.clone();
        ordered.sort();
        // Strongest first
        assert_eq!(ordered, vec![keys[2].clone(), keys[1].clone(), keys[0].clone()]);
    }

    #[test]
    fn env_var_overrides_default_file() {
        let paths = ConfigPaths::new("CONF", "default.conf");
        let mut env = HashMap::new();
        assert_eq!(paths.resolve(&env), vec![PathBuf::from("default.conf")]);

        env.insert("CONF".to_string(), "a.conf, b.conf".to_string());
        assert_eq!(paths.resolve(&env), vec![PathBuf::from("a.conf"), PathBuf::from("b.conf")]);
    }
}
