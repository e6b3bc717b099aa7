//! Option and layer registries plus the per-frame resolver
//!
//! A single mutex guards both registries and the dirty set. Per-layer state
//! sits behind its own lock, which is always taken after the manager lock and
//! never held while calling back into the manager. Change callbacks run with
//! no lock held so they may read and write other options freely.

mod handle;
mod persistence;
mod system;

pub use handle::LayerHandle;
pub use persistence::{ChangeKind, LayerChange};
pub use system::{ConfigPaths, SystemLayerSources};

use crate::edit_target::{self, EditTarget};
use crate::error::{Error, Result};
use crate::flags::{MAX_DYNAMIC_PRIORITY, MAX_RESOLVES, MIN_DYNAMIC_PRIORITY, OptionFlags, is_dynamic_priority};
use crate::layer::{Layer, LayerBlend, LayerDescriptor, LayerKey, SystemLayer};
use crate::option::{ConfigOption, DeviceHandle, OnChange, OptionId, OptionImpl, OptionParts};
use crate::value::{OptionKind, OptionType, OptionValue};
use optlayer_conf::ConfigStore;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

static GLOBAL: LazyLock<Arc<OptionManager>> = LazyLock::new(OptionManager::new);

/// Owns every registered option and layer.
///
/// Use [`OptionManager::global`] for the process-wide instance or
/// [`OptionManager::new`] for an isolated one (tests, tools).
pub struct OptionManager {
    state: Mutex<ManagerState>,
    initialized: AtomicBool,
}

#[derive(Default)]
pub(crate) struct ManagerState {
    pub options: BTreeMap<OptionId, OptionImpl>,
    pub layers: BTreeMap<LayerKey, Arc<Layer>>,
    pub dirty: BTreeSet<OptionId>,
    /// Options resolved outside a pass whose callback is still owed
    pub notify: BTreeSet<OptionId>,
    /// Key of the layer that user edits to project settings land in
    pub project_layer: Option<LayerKey>,
    missed: HashSet<String>,
}

/// Outcome of one [`OptionManager::apply_pending_values`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub passes: usize,
    pub callbacks: usize,
    /// Options still dirty after the last pass, by full name
    pub abandoned: Vec<String>,
}

/// Snapshot of one option whose resolved value differs from its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveValue {
    pub name: String,
    pub kind: String,
    pub value: String,
    pub default: String,
}

impl OptionManager {
    /// Create an isolated manager with only the default layer registered.
    pub fn new() -> Arc<Self> {
        let mut state = ManagerState::default();
        let default_layer = Layer::new(LayerDescriptor::system(SystemLayer::Default), ConfigStore::new());
        state
            .layers
            .insert(SystemLayer::Default.key(), Arc::new(default_layer));
        Arc::new(Self {
            state: Mutex::new(state),
            initialized: AtomicBool::new(false),
        })
    }

    /// The process-wide manager.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------

    pub(crate) fn register_option(&self, parts: OptionParts) -> Result<OptionId> {
        let mut option = OptionImpl::new(parts);
        let id = option.id();
        let mut state = self.lock();
        if state.options.contains_key(&id) {
            return Err(Error::DuplicateOption {
                name: option.full_name().to_string(),
            });
        }

        let mut read_any = false;
        for layer in state.layers.values() {
            if read_layer_value(&mut option, layer) {
                layer.on_value_changed();
                read_any = true;
            }
        }
        if read_any && option.resolve() {
            // Visible right away; the callback fires on the next pass
            state.dirty.insert(id);
            state.notify.insert(id);
        }

        tracing::debug!(option = option.full_name(), kind = %option.kind(), "Registered option");
        state.options.insert(id, option);
        Ok(id)
    }

    pub(crate) fn with_option<R>(&self, id: OptionId, f: impl FnOnce(&OptionImpl) -> R) -> Option<R> {
        self.lock().options.get(&id).map(f)
    }

    /// Write `value` into `layer`, or into the edit target layer when `None`.
    pub(crate) fn write_value(
        &self,
        id: OptionId,
        value: OptionValue,
        layer: Option<&LayerHandle>,
        immediate: bool,
    ) {
        let mut state = self.lock();
        let Some(target) = state.resolve_target(id, layer) else {
            return;
        };
        let Some(option) = state.options.get_mut(&id) else {
            return;
        };
        if value.kind() != option.kind() {
            tracing::warn!(
                option = option.full_name(),
                expected = %option.kind(),
                actual = %value.kind(),
                "Ignoring value of the wrong type"
            );
            return;
        }
        option.set_layer_value(target.key().clone(), value, target.blend());
        let changed = immediate && option.resolve();
        state.after_layer_write(id, &target);
        if changed {
            state.notify.insert(id);
        }
    }

    /// Edit the value held by the target layer in place, seeding it first
    /// when the layer holds none. Hash sets start empty, other kinds start
    /// at the default.
    pub(crate) fn edit_layer_value(
        &self,
        id: OptionId,
        layer: Option<&LayerHandle>,
        edit: impl FnOnce(&mut OptionValue),
    ) {
        let mut state = self.lock();
        let Some(target) = state.resolve_target(id, layer) else {
            return;
        };
        let Some(option) = state.options.get_mut(&id) else {
            return;
        };
        let key = target.key().clone();
        if !option.has_value_in_layer(&key) {
            let seed = match option.kind() {
                OptionKind::HashSet => OptionValue::HashSet(Default::default()),
                _ => option.default_value().clone(),
            };
            option.set_layer_value(key.clone(), seed, target.blend());
        }
        if let Some(value) = option.layer_value_mut(&key) {
            edit(value);
        }
        state.after_layer_write(id, &target);
    }

    pub(crate) fn remove_value(&self, id: OptionId, layer: &LayerHandle) -> bool {
        let mut state = self.lock();
        if !state.is_registered(layer.layer()) {
            state.note_miss("layer", &layer.key().to_string());
            return false;
        }
        let removed = state
            .options
            .get_mut(&id)
            .and_then(|option| option.remove_layer_value(layer.key()))
            .is_some();
        if removed {
            state.dirty.insert(id);
            layer.layer().on_value_changed();
        }
        removed
    }

    pub(crate) fn set_bound(&self, id: OptionId, value: OptionValue, is_min: bool) {
        let mut state = self.lock();
        let Some(option) = state.options.get_mut(&id) else {
            return;
        };
        let changed = if is_min {
            option.set_min(Some(value))
        } else {
            option.set_max(Some(value))
        };
        if changed {
            state.dirty.insert(id);
        }
    }

    pub(crate) fn set_callback(&self, id: OptionId, on_change: Option<OnChange>) {
        if let Some(option) = self.lock().options.get_mut(&id) {
            option.set_on_change(on_change);
        }
    }

    /// Copy every layer value of `from` into `to` through `transform`, then
    /// remove them from `from`. Layers whose value `transform` rejects keep it.
    pub(crate) fn migrate_values(
        &self,
        from: OptionId,
        to: OptionId,
        transform: impl Fn(&OptionValue) -> Option<OptionValue>,
    ) -> usize {
        if from == to {
            return 0;
        }
        let mut state = self.lock();
        let Some(source) = state.options.get(&from) else {
            return 0;
        };
        let to_kind = match state.options.get(&to) {
            Some(option) => option.kind(),
            None => return 0,
        };
        let default_key = SystemLayer::Default.key();
        let moved: Vec<(LayerKey, OptionValue, LayerBlend)> = source
            .layer_values()
            .filter(|(key, _)| **key != default_key)
            .filter_map(|(key, pv)| {
                transform(&pv.value)
                    .filter(|value| value.kind() == to_kind)
                    .map(|value| (key.clone(), value, pv.blend))
            })
            .collect();

        for (key, value, blend) in &moved {
            if let Some(option) = state.options.get_mut(&to) {
                option.set_layer_value(key.clone(), value.clone(), *blend);
            }
            if let Some(option) = state.options.get_mut(&from) {
                option.remove_layer_value(key);
            }
            if let Some(layer) = state.layers.get(key) {
                layer.on_value_changed();
                layer.state().has_values = true;
            }
        }
        if !moved.is_empty() {
            state.dirty.insert(from);
            state.dirty.insert(to);
        }
        moved.len()
    }

    pub(crate) fn move_layer_value(&self, id: OptionId, from: &LayerKey, to: &LayerKey) -> bool {
        self.lock().move_value(id, from, to)
    }

    /// Kind of the option registered under `full_name`.
    pub fn option_type(&self, full_name: &str) -> Option<OptionKind> {
        let mut state = self.lock();
        match state.options.get(&OptionId::from_full_name(full_name)) {
            Some(option) => Some(option.kind()),
            None => {
                state.note_miss("option", full_name);
                None
            }
        }
    }

    /// Resolved value of `full_name`, or `T::default()` when the option is
    /// unknown or of another type.
    pub fn read<T: OptionType>(&self, full_name: &str) -> T {
        let mut state = self.lock();
        let Some(option) = state.options.get(&OptionId::from_full_name(full_name)) else {
            state.note_miss("option", full_name);
            return T::default();
        };
        match T::from_value(option.resolved()) {
            Some(value) => value,
            None => {
                let actual = option.kind();
                state.note_type_mismatch(full_name, T::KIND, actual);
                T::default()
            }
        }
    }

    /// Typed handle to an already registered option.
    pub fn option_handle<T: OptionType>(self: &Arc<Self>, full_name: &str) -> Option<ConfigOption<T>> {
        let id = OptionId::from_full_name(full_name);
        let mut state = self.lock();
        let Some(option) = state.options.get(&id) else {
            state.note_miss("option", full_name);
            return None;
        };
        let actual = option.kind();
        if actual != T::KIND {
            state.note_type_mismatch(full_name, T::KIND, actual);
            return None;
        }
        Some(ConfigOption::from_parts(id, Arc::clone(self)))
    }

    /// Full names of every registered option, sorted.
    pub fn option_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .options
            .values()
            .map(|option| option.full_name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Whether the option still waits for the next resolution pass.
    pub fn is_dirty(&self, full_name: &str) -> bool {
        self.lock()
            .dirty
            .contains(&OptionId::from_full_name(full_name))
    }

    /// Queue every option with a change callback for the next pass.
    pub fn mark_options_with_callbacks_dirty(&self) {
        let mut state = self.lock();
        let ids: Vec<OptionId> = state
            .options
            .values()
            .filter(|option| option.has_callback())
            .map(OptionImpl::id)
            .collect();
        state.dirty.extend(ids);
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    /// Create a layer, or add a reference to the existing layer with the same
    /// key and file.
    ///
    /// Non-system priorities are clamped into the dynamic range. The layer's
    /// config is read from `descriptor.config`, else from its file (a missing
    /// file yields an empty layer), and applied to every registered option.
    pub fn acquire_layer(self: &Arc<Self>, descriptor: LayerDescriptor) -> Result<LayerHandle> {
        let mut descriptor = descriptor;
        let priority = descriptor.key.priority;
        if descriptor.is_system {
            if is_dynamic_priority(priority) {
                return Err(Error::SystemPriorityInDynamicRange {
                    priority,
                    name: descriptor.key.name,
                });
            }
        } else if !is_dynamic_priority(priority) {
            let clamped = priority.clamp(MIN_DYNAMIC_PRIORITY, MAX_DYNAMIC_PRIORITY);
            tracing::warn!(
                layer = %descriptor.key.name,
                priority,
                clamped,
                "Layer priority outside the dynamic range, clamping"
            );
            descriptor.key.priority = clamped;
        }

        if let Some(existing) = self.lock().reuse_layer(&descriptor)? {
            return Ok(LayerHandle::new(existing, Arc::clone(self)));
        }

        // File I/O stays outside the lock
        let config = match (descriptor.config.take(), &descriptor.file_path) {
            (Some(config), _) => config,
            (None, Some(path)) => ConfigStore::load(path)?,
            (None, None) => ConfigStore::new(),
        };

        let mut state = self.lock();
        if let Some(existing) = state.reuse_layer(&descriptor)? {
            return Ok(LayerHandle::new(existing, Arc::clone(self)));
        }
        let layer = Arc::new(Layer::new(descriptor, config));
        state.layers.insert(layer.key().clone(), Arc::clone(&layer));
        let applied = state.apply_layer_config(&layer);
        tracing::debug!(
            layer = %layer.key(),
            file = ?layer.file_path(),
            options = applied,
            "Created option layer"
        );
        Ok(LayerHandle::new(layer, Arc::clone(self)))
    }

    /// Drop one reference to `handle`'s layer, destroying the layer when the
    /// count reaches zero. Unknown and already released layers are ignored
    /// with a warning.
    pub fn release_layer(&self, handle: &LayerHandle) {
        let layer = handle.layer();
        if !self.lock().is_registered(layer) {
            tracing::warn!(layer = %layer.key(), "Releasing a layer that is not registered");
            return;
        }
        match layer.release_ref() {
            None => {
                tracing::warn!(layer = %layer.key(), "Layer reference count is already zero");
            }
            Some(0) => {
                let mut state = self.lock();
                // Re-acquired or already destroyed since the decrement
                if layer.ref_count() != 0 || !state.is_registered(layer) {
                    return;
                }
                let removed = state.remove_layer_values(layer.key(), false);
                state.layers.remove(layer.key());
                if state.project_layer.as_ref() == Some(layer.key()) {
                    state.project_layer = None;
                }
                tracing::debug!(layer = %layer.key(), options = removed, "Destroyed option layer");
            }
            Some(_) => {}
        }
    }

    /// Handle to the registered layer with `key`.
    pub fn layer(self: &Arc<Self>, key: &LayerKey) -> Option<LayerHandle> {
        let mut state = self.lock();
        match state.layers.get(key).cloned() {
            Some(layer) => Some(LayerHandle::new(layer, Arc::clone(self))),
            None => {
                state.note_miss("layer", &key.to_string());
                None
            }
        }
    }

    pub fn system_layer(self: &Arc<Self>, layer: SystemLayer) -> Option<LayerHandle> {
        self.layer(&layer.key())
    }

    /// The layer user edits to non-user settings are saved to.
    pub fn project_layer(self: &Arc<Self>) -> Option<LayerHandle> {
        let key = self.lock().project_key();
        self.layer(&key)
    }

    /// Every registered layer, highest priority first.
    pub fn layers(self: &Arc<Self>) -> Vec<LayerHandle> {
        self.lock()
            .layers
            .values()
            .map(|layer| LayerHandle::new(Arc::clone(layer), Arc::clone(self)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Per-frame update: fold layer requests, then resolve dirty options in
    /// up to [`MAX_RESOLVES`] passes so callbacks that write other options
    /// settle within the frame.
    ///
    /// Callbacks fire for options whose resolved value changed, or for every
    /// resolved option when `force_on_change` is set.
    pub fn apply_pending_values(&self, device: &DeviceHandle, force_on_change: bool) -> ResolveSummary {
        {
            let mut state = self.lock();
            let layers: Vec<Arc<Layer>> = state.layers.values().cloned().collect();
            for layer in layers {
                layer.resolve_pending_requests();
                if let Some(blend) = layer.take_pending_change() {
                    state.refresh_layer_blend(layer.key(), blend);
                }
            }
        }

        let mut summary = ResolveSummary::default();
        while summary.passes < MAX_RESOLVES {
            let callbacks: Vec<OnChange> = {
                let mut state = self.lock();
                let dirty = std::mem::take(&mut state.dirty);
                let mut callbacks = Vec::new();
                for id in dirty {
                    let owed = state.notify.remove(&id);
                    let Some(option) = state.options.get_mut(&id) else {
                        continue;
                    };
                    let changed = option.resolve();
                    if changed {
                        tracing::debug!(option = option.full_name(), value = %option.resolved(), "Resolved option");
                    }
                    if changed || owed || force_on_change {
                        if let Some(callback) = option.on_change() {
                            callbacks.push(callback);
                        }
                    }
                }
                callbacks
            };

            summary.passes += 1;
            summary.callbacks += callbacks.len();
            for callback in &callbacks {
                callback(device);
            }

            if self.lock().dirty.is_empty() {
                break;
            }
        }

        let mut state = self.lock();
        if !state.dirty.is_empty() {
            let dirty = std::mem::take(&mut state.dirty);
            // Owed callbacks go with the abandoned values
            state.notify.clear();
            summary.abandoned = dirty
                .iter()
                .filter_map(|id| state.options.get(id))
                .map(|option| option.full_name().to_string())
                .collect();
            tracing::warn!(
                passes = MAX_RESOLVES,
                remaining = summary.abandoned.len(),
                "Options still changing after the last resolve pass, likely a cyclic dependency between callbacks"
            );
            for name in &summary.abandoned {
                tracing::warn!(option = %name, "Abandoned resolve");
            }
        }
        summary
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Every option whose resolved value differs from its default.
    pub fn effective_values(&self) -> Vec<EffectiveValue> {
        let state = self.lock();
        let mut values: Vec<EffectiveValue> = state
            .options
            .values()
            .filter(|option| !option.is_default())
            .map(|option| EffectiveValue {
                name: option.full_name().to_string(),
                kind: option.kind().to_string(),
                value: option.resolved().to_config_string(),
                default: option.default_value().to_config_string(),
            })
            .collect();
        values.sort_by(|a, b| a.name.cmp(&b.name));
        values
    }

    pub fn log_effective_values(&self) {
        let values = self.effective_values();
        tracing::info!(count = values.len(), "Effective (non-default) option values");
        for value in &values {
            tracing::info!(option = %value.name, value = %value.value, "  effective");
        }
    }

    /// Serialize options into `config`.
    ///
    /// With a layer, writes the values that layer holds; otherwise writes
    /// resolved values. `changed_only` skips values equal to the default.
    /// NoSave options are never written.
    pub fn write_options(&self, config: &mut ConfigStore, layer: Option<&LayerHandle>, changed_only: bool) {
        self.lock().write_options(config, layer.map(LayerHandle::key), changed_only);
    }
}

impl ManagerState {
    pub fn write_options(&self, config: &mut ConfigStore, layer: Option<&LayerKey>, changed_only: bool) {
        for option in self.options.values() {
            if option.flags().contains(OptionFlags::NO_SAVE) {
                continue;
            }
            let value = match layer {
                Some(key) => match option.layer_value(key) {
                    Some(value) => value,
                    None => continue,
                },
                None => option.resolved(),
            };
            if changed_only && value == option.default_value() {
                continue;
            }
            let text = value.to_config_string();
            // Empty sets and strings mean "no opinion" on disk
            if layer.is_some() && text.is_empty() {
                continue;
            }
            config.set_str(option.full_name(), text);
        }
    }

    /// Move one option's value between registered layers. Hash sets merge
    /// into an existing destination set, the destination keeping its own
    /// opinions.
    pub fn move_value(&mut self, id: OptionId, from: &LayerKey, to: &LayerKey) -> bool {
        if from == to || *from == SystemLayer::Default.key() {
            return false;
        }
        let Some(target) = self.layers.get(to).cloned() else {
            self.note_miss("layer", &to.to_string());
            return false;
        };
        let Some(option) = self.options.get_mut(&id) else {
            return false;
        };
        let Some(moved) = option.remove_layer_value(from) else {
            return false;
        };
        let value = match (option.layer_value(to), moved.value) {
            (Some(OptionValue::HashSet(existing)), OptionValue::HashSet(incoming)) => {
                let mut merged = existing.clone();
                merged.merge_from(&incoming);
                OptionValue::HashSet(merged)
            }
            (_, value) => value,
        };
        option.set_layer_value(to.clone(), value, target.blend());
        if let Some(source) = self.layers.get(from) {
            source.on_value_changed();
        }
        self.after_layer_write(id, &target);
        true
    }

    pub fn is_registered(&self, layer: &Arc<Layer>) -> bool {
        self.layers
            .get(layer.key())
            .is_some_and(|registered| Arc::ptr_eq(registered, layer))
    }

    pub fn project_key(&self) -> LayerKey {
        self.project_layer
            .clone()
            .unwrap_or_else(|| SystemLayer::ProjectConfig.key())
    }

    /// Warn the first time a given lookup misses.
    pub fn note_miss(&mut self, what: &str, name: &str) {
        if self.missed.insert(format!("{what}:{name}")) {
            tracing::warn!(name, "Unknown {what}");
        }
    }

    fn note_type_mismatch(&mut self, full_name: &str, expected: OptionKind, actual: OptionKind) {
        if self.missed.insert(format!("type:{full_name}:{expected}")) {
            tracing::warn!(
                option = full_name,
                %expected,
                %actual,
                "Option accessed as the wrong type, using the default"
            );
        }
    }

    /// Existing layer for the descriptor's key, with a reference added, when
    /// it is backed by the same file.
    fn reuse_layer(&self, descriptor: &LayerDescriptor) -> Result<Option<Arc<Layer>>> {
        let Some(existing) = self.layers.get(&descriptor.key) else {
            return Ok(None);
        };
        if existing.file_path() != descriptor.file_path.as_deref() {
            return Err(Error::PriorityCollision {
                key: descriptor.key.clone(),
                existing: existing.file_path().map(Into::into),
                requested: descriptor.file_path.clone(),
            });
        }
        existing.add_ref();
        Ok(Some(Arc::clone(existing)))
    }

    /// Read `layer`'s config into every option. Returns the number of options
    /// that received a value.
    pub fn apply_layer_config(&mut self, layer: &Arc<Layer>) -> usize {
        let mut applied = 0;
        for option in self.options.values_mut() {
            if read_layer_value(option, layer) {
                self.dirty.insert(option.id());
                applied += 1;
            }
        }
        if applied > 0 {
            layer.state().has_values = true;
        }
        layer.on_value_changed();
        applied
    }

    /// Strip `key`'s values from every option. With `keep_no_reset`, options
    /// flagged NoReset keep theirs.
    pub fn remove_layer_values(&mut self, key: &LayerKey, keep_no_reset: bool) -> usize {
        let mut removed = 0;
        for option in self.options.values_mut() {
            if keep_no_reset && option.flags().contains(OptionFlags::NO_RESET) {
                continue;
            }
            if option.remove_layer_value(key).is_some() {
                self.dirty.insert(option.id());
                removed += 1;
            }
        }
        if let Some(layer) = self.layers.get(key) {
            layer.on_value_changed();
        }
        removed
    }

    fn refresh_layer_blend(&mut self, key: &LayerKey, blend: LayerBlend) {
        for option in self.options.values_mut() {
            if option.update_layer_blend(key, blend) {
                self.dirty.insert(option.id());
            }
        }
    }

    fn after_layer_write(&mut self, id: OptionId, layer: &Layer) {
        self.dirty.insert(id);
        layer.on_value_changed();
        layer.state().has_values = true;
    }

    /// Layer a write lands in: `layer` when given and still registered,
    /// otherwise the edit target for the option's flags.
    fn resolve_target(&mut self, id: OptionId, layer: Option<&LayerHandle>) -> Option<Arc<Layer>> {
        if let Some(handle) = layer {
            if self.is_registered(handle.layer()) {
                return Some(Arc::clone(handle.layer()));
            }
            self.note_miss("layer", &handle.key().to_string());
            return None;
        }
        let flags = self.options.get(&id)?.flags();
        let key = match target_system_layer(flags, edit_target::current()) {
            Some(system) => system.key(),
            None => self.project_key(),
        };
        Some(self.get_or_create_system_layer(key))
    }

    pub fn get_or_create_system_layer(&mut self, key: LayerKey) -> Arc<Layer> {
        if let Some(layer) = self.layers.get(&key) {
            return Arc::clone(layer);
        }
        let mut descriptor = LayerDescriptor::new(key.clone());
        descriptor.is_system = true;
        let layer = Arc::new(Layer::new(descriptor, ConfigStore::new()));
        self.layers.insert(key, Arc::clone(&layer));
        tracing::debug!(layer = %layer.key(), "Created edit target layer on demand");
        layer
    }
}

/// System layer that writes through the edit target land in. `None` means
/// the project layer, whose key depends on the loaded config files.
fn target_system_layer(flags: OptionFlags, target: EditTarget) -> Option<SystemLayer> {
    let user_setting = flags.contains(OptionFlags::USER_SETTING);
    if flags.contains(OptionFlags::NO_SAVE) {
        return Some(SystemLayer::Derived);
    }
    match target {
        EditTarget::User if user_setting => Some(SystemLayer::User),
        EditTarget::User => None,
        EditTarget::Derived if user_setting => Some(SystemLayer::Quality),
        EditTarget::Derived => Some(SystemLayer::Derived),
    }
}

/// Copy the option's value out of `layer`'s config, if present. The default
/// layer never reads from config.
fn read_layer_value(option: &mut OptionImpl, layer: &Layer) -> bool {
    if *layer.key() == SystemLayer::Default.key() {
        return false;
    }
    let state = layer.state();
    let Some(raw) = state.config.get_str(option.full_name()) else {
        return false;
    };
    match OptionValue::parse(option.kind(), raw) {
        Some(value) => {
            option.set_layer_value(layer.key().clone(), value, state.blend());
            true
        }
        None => {
            if !raw.trim().is_empty() {
                tracing::warn!(
                    option = option.full_name(),
                    layer = %layer.key(),
                    value = raw,
                    expected = %option.kind(),
                    "Could not parse stored value"
                );
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_follows_flags_and_target() {
        let user = OptionFlags::USER_SETTING;
        let none = OptionFlags::NONE;
        assert_eq!(target_system_layer(none, EditTarget::Derived), Some(SystemLayer::Derived));
        assert_eq!(target_system_layer(user, EditTarget::Derived), Some(SystemLayer::Quality));
        assert_eq!(target_system_layer(user, EditTarget::User), Some(SystemLayer::User));
        assert_eq!(target_system_layer(none, EditTarget::User), None);
        assert_eq!(
            target_system_layer(OptionFlags::NO_SAVE | user, EditTarget::User),
            Some(SystemLayer::Derived)
        );
    }

    #[test]
    fn new_manager_holds_only_the_default_layer() {
        let manager = OptionManager::new();
        let keys: Vec<LayerKey> = manager.layers().iter().map(|l| l.key().clone()).collect();
        assert_eq!(keys, vec![SystemLayer::Default.key()]);
        assert!(!manager.is_initialized());
    }

    #[test]
    fn system_priority_in_dynamic_range_is_rejected() {
        let manager = OptionManager::new();
        let mut descriptor = LayerDescriptor::new(LayerKey::new(500, "bogus"));
        descriptor.is_system = true;
        let err = manager.acquire_layer(descriptor).unwrap_err();
        assert!(matches!(err, Error::SystemPriorityInDynamicRange { priority: 500, .. }));
    }

    #[test]
    fn dynamic_priority_is_clamped() {
        let manager = OptionManager::new();
        let low = manager.acquire_layer(LayerDescriptor::new(LayerKey::new(3, "low"))).unwrap();
        let high = manager
            .acquire_layer(LayerDescriptor::new(LayerKey::new(u32::MAX, "high")))
            .unwrap();
        assert_eq!(low.priority(), MIN_DYNAMIC_PRIORITY);
        assert_eq!(high.priority(), MAX_DYNAMIC_PRIORITY);
    }
}
