//! Saving layers to their files and comparing live values with saved ones

use super::{ManagerState, OptionManager};
use crate::error::{Error, Result};
use crate::flags::OptionFlags;
use crate::hash_set_layer::HashSetLayer;
use crate::layer::{Layer, SystemLayer};
use crate::option::{OptionId, OptionImpl};
use crate::value::OptionValue;
use optlayer_conf::ConfigStore;
use std::path::Path;
use std::sync::Arc;

/// How a layer value relates to the layer's saved config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    /// Live value with no saved entry
    Added,
    /// Live value that differs from the saved entry
    Modified,
    /// Live value equal to the saved entry, or any value of a layer without
    /// a file
    Unchanged,
    /// Saved entry with no live value
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerChange {
    pub full_name: String,
    pub kind: ChangeKind,
    /// Live value held by the layer; `None` for removals
    pub value: Option<OptionValue>,
    /// Saved config text; `None` for additions
    pub saved: Option<String>,
}

impl OptionManager {
    pub(crate) fn for_each_change(&self, layer: &Arc<Layer>, mut visitor: impl FnMut(&LayerChange)) {
        // Visit unlocked so the visitor may query the manager
        let changes = collect_changes(&self.lock(), layer);
        for change in &changes {
            visitor(change);
        }
    }

    pub(crate) fn layer_has_values(&self, layer: &Arc<Layer>) -> bool {
        let state = self.lock();
        let mut layer_state = layer.state();
        if !layer_state.has_values {
            return false;
        }
        let has_values = state
            .options
            .values()
            .any(|option| option.has_value_in_layer(layer.key()));
        layer_state.has_values = has_values;
        has_values
    }

    pub(crate) fn has_unsaved_changes(&self, layer: &Arc<Layer>) -> bool {
        if layer.file_path().is_none() {
            return false;
        }
        if let Some(cached) = layer.state().unsaved_changes {
            return cached;
        }
        let state = self.lock();
        let unsaved = collect_changes(&state, layer).iter().any(|change| match change.kind {
            ChangeKind::Added | ChangeKind::Modified => change
                .value
                .as_ref()
                .is_some_and(|value| !value.to_config_string().is_empty()),
            ChangeKind::Removed => true,
            ChangeKind::Unchanged => false,
        });
        layer.state().unsaved_changes = Some(unsaved);
        unsaved
    }

    /// Saved entries whose option no longer has a value in the layer.
    pub(crate) fn has_pending_removals(&self, layer: &Arc<Layer>) -> bool {
        if layer.file_path().is_none() {
            return false;
        }
        let state = self.lock();
        let layer_state = layer.state();
        layer_state.config.keys().any(|name| {
            state
                .options
                .get(&OptionId::from_full_name(name))
                .is_some_and(|option| {
                    !option
                        .layer_value(layer.key())
                        .is_some_and(|value| !value.to_config_string().is_empty())
                })
        })
    }

    pub(crate) fn save_layer(&self, layer: &Arc<Layer>) -> Result<()> {
        let Some(path) = layer.file_path() else {
            tracing::warn!(layer = %layer.key(), "Cannot save a layer without a config file");
            return Err(Error::NoConfigFile {
                layer: layer.key().clone(),
            });
        };

        let mut config = ConfigStore::new();
        self.lock().write_options(&mut config, Some(layer.key()), false);
        config.save(path, None)?;
        {
            let mut layer_state = layer.state();
            layer_state.config = config;
            layer_state.unsaved_changes = Some(false);
        }
        tracing::info!(layer = %layer.key(), path = %path.display(), "Saved layer config");
        Ok(())
    }

    pub(crate) fn reload_layer(&self, layer: &Arc<Layer>) -> Result<()> {
        let Some(path) = layer.file_path() else {
            tracing::warn!(layer = %layer.key(), "Cannot reload a layer without a config file");
            return Err(Error::NoConfigFile {
                layer: layer.key().clone(),
            });
        };

        let config = ConfigStore::load(path)?;
        let mut state = self.lock();
        // NoReset values survive the reload unless the file overrides them
        state.remove_layer_values(layer.key(), true);
        {
            let mut layer_state = layer.state();
            layer_state.config = config;
            layer_state.has_values = false;
        }
        if state.is_registered(layer) {
            state.apply_layer_config(layer);
        }
        tracing::info!(layer = %layer.key(), path = %path.display(), "Reloaded layer config");
        Ok(())
    }

    pub(crate) fn export_unsaved_changes(&self, layer: &Arc<Layer>, path: &Path) -> Result<bool> {
        if !self.has_unsaved_changes(layer) {
            tracing::warn!(layer = %layer.key(), "No unsaved changes to export");
            return Ok(false);
        }

        let mut export = ConfigStore::load(path)?;
        let is_new_file = export.is_empty();
        let changes = collect_changes(&self.lock(), layer);

        for change in &changes {
            if !matches!(change.kind, ChangeKind::Added | ChangeKind::Modified) {
                continue;
            }
            let Some(value) = &change.value else {
                continue;
            };
            match value {
                OptionValue::HashSet(live) => {
                    // Only the opinions this session added
                    let saved = HashSetLayer::parse(change.saved.as_deref().unwrap_or_default());
                    let mut added = live.compute_added_opinions(&saved);
                    if added.is_empty() {
                        continue;
                    }
                    if let Some(existing) = export.get_str(&change.full_name) {
                        added.merge_from(&HashSetLayer::parse(existing));
                    }
                    export.set_str(change.full_name.as_str(), added.to_string());
                }
                other => {
                    let text = other.to_config_string();
                    if !text.is_empty() {
                        export.set_str(change.full_name.as_str(), text);
                    }
                }
            }
        }

        export.save(path, None)?;
        if is_new_file {
            tracing::info!(path = %path.display(), "Created config file with unsaved changes");
        } else {
            tracing::info!(path = %path.display(), "Merged unsaved changes into existing config file");
        }
        Ok(true)
    }

    pub(crate) fn count_miscategorized_options(&self, layer: &Arc<Layer>) -> u32 {
        if let Some(cached) = layer.state().miscategorized {
            return cached;
        }
        let state = self.lock();
        let layer_flags = layer.state().category_flags;
        let count = state
            .options
            .values()
            .filter(|option| option.has_value_in_layer(layer.key()))
            .filter(|option| is_miscategorized(option, layer_flags))
            .count() as u32;
        layer.state().miscategorized = Some(count);
        count
    }

    /// Move values that do not belong in `layer` to the User layer
    /// (UserSetting options) or the project layer (everything else).
    pub(crate) fn migrate_miscategorized_options(&self, layer: &Arc<Layer>) -> u32 {
        let mut state = self.lock();
        let layer_flags = layer.state().category_flags;
        let project_key = state.project_key();
        let moves: Vec<(OptionId, bool)> = state
            .options
            .values()
            .filter(|option| option.has_value_in_layer(layer.key()))
            .filter(|option| is_miscategorized(option, layer_flags))
            .map(|option| (option.id(), option.flags().contains(OptionFlags::USER_SETTING)))
            .collect();

        let mut migrated = 0;
        for (id, user_setting) in moves {
            let destination = if user_setting {
                SystemLayer::User.key()
            } else {
                project_key.clone()
            };
            if destination == *layer.key() || !state.layers.contains_key(&destination) {
                continue;
            }
            if state.move_value(id, layer.key(), &destination) {
                migrated += 1;
            }
        }
        if migrated > 0 {
            tracing::info!(layer = %layer.key(), migrated, "Migrated miscategorized options");
        }
        migrated
    }

    pub(crate) fn remove_redundant_values(&self, layer: &Arc<Layer>) -> usize {
        let mut state = self.lock();
        let redundant: Vec<OptionId> = state
            .options
            .values()
            .filter(|option| option.is_layer_value_redundant(layer.key()))
            .map(OptionImpl::id)
            .collect();
        for id in &redundant {
            if let Some(option) = state.options.get_mut(id) {
                option.remove_layer_value(layer.key());
            }
            state.dirty.insert(*id);
        }
        if !redundant.is_empty() {
            layer.on_value_changed();
            tracing::debug!(layer = %layer.key(), removed = redundant.len(), "Removed redundant layer values");
        }
        redundant.len()
    }
}

/// A value is miscategorized when its option's category flags miss the
/// layer's, or when a general layer holds a categorized option.
fn is_miscategorized(option: &OptionImpl, layer_flags: OptionFlags) -> bool {
    let option_flags = option.flags().category();
    if layer_flags.is_empty() {
        !option_flags.is_empty()
    } else {
        !option_flags.intersects(layer_flags)
    }
}

fn collect_changes(state: &ManagerState, layer: &Layer) -> Vec<LayerChange> {
    let has_file = layer.file_path().is_some();
    let layer_state = layer.state();
    let saved = &layer_state.config;
    let mut changes = Vec::new();

    for option in state.options.values() {
        if option.flags().contains(OptionFlags::NO_SAVE) {
            continue;
        }
        let Some(value) = option.layer_value(layer.key()) else {
            continue;
        };
        let saved_text = saved.get_str(option.full_name());
        let kind = match saved_text {
            _ if !has_file => ChangeKind::Unchanged,
            None => ChangeKind::Added,
            Some(text) if matches_saved(value, text) => ChangeKind::Unchanged,
            Some(_) => ChangeKind::Modified,
        };
        changes.push(LayerChange {
            full_name: option.full_name().to_string(),
            kind,
            value: Some(value.clone()),
            saved: saved_text.map(str::to_string),
        });
    }

    if has_file {
        for (name, text) in saved.iter() {
            let removed = state
                .options
                .get(&OptionId::from_full_name(name))
                .is_some_and(|option| !option.has_value_in_layer(layer.key()));
            if removed {
                changes.push(LayerChange {
                    full_name: name.to_string(),
                    kind: ChangeKind::Removed,
                    value: None,
                    saved: Some(text.to_string()),
                });
            }
        }
    }
    changes
}

/// Hash sets compare as sets, everything else by config text.
fn matches_saved(value: &OptionValue, saved: &str) -> bool {
    match value {
        OptionValue::HashSet(live) => *live == HashSetLayer::parse(saved),
        other => other.to_config_string() == saved,
    }
}
