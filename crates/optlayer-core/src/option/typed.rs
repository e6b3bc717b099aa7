//! Typed option handles

use super::{DeviceHandle, OnChange, OptionId, OptionParts};
use crate::error::{Error, Result};
use crate::flags::OptionFlags;
use crate::hash_set_layer::HashSetLayer;
use crate::manager::{LayerHandle, OptionManager};
use crate::value::{Clampable, OptionType, OptionValue};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Declares an option before registering it with a manager.
///
/// ```
/// use optlayer_core::{OptionBuilder, OptionManager};
///
/// let manager = OptionManager::new();
/// let exposure = OptionBuilder::new("tonemap", "exposure", 1.0f32)
///     .description("Exposure bias applied before tone mapping")
///     .min(0.0)
///     .max(16.0)
///     .register(&manager)
///     .unwrap();
/// manager.set_initialized(true);
/// assert_eq!(exposure.get(), 1.0);
/// ```
pub struct OptionBuilder<T: OptionType> {
    category: String,
    name: String,
    default: T,
    description: String,
    flags: OptionFlags,
    environment: Option<String>,
    min: Option<T>,
    max: Option<T>,
    on_change: Option<OnChange>,
}

impl<T: OptionType> OptionBuilder<T> {
    pub fn new(category: impl Into<String>, name: impl Into<String>, default: T) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            default,
            description: String::new(),
            flags: OptionFlags::NONE,
            environment: None,
            min: None,
            max: None,
            on_change: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn flags(mut self, flags: OptionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Environment variable read into the environment layer at startup.
    pub fn environment(mut self, variable: impl Into<String>) -> Self {
        self.environment = Some(variable.into());
        self
    }

    /// Lower bound. Registration fails for types that cannot be clamped.
    pub fn min(mut self, min: T) -> Self {
        self.min = Some(min);
        self
    }

    /// Upper bound. Registration fails for types that cannot be clamped.
    pub fn max(mut self, max: T) -> Self {
        self.max = Some(max);
        self
    }

    pub fn on_change(mut self, callback: impl Fn(&DeviceHandle) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(callback));
        self
    }

    /// Register with `manager`. Values already present in the configs of
    /// existing layers are picked up immediately.
    pub fn register(self, manager: &Arc<OptionManager>) -> Result<ConfigOption<T>> {
        if (self.min.is_some() || self.max.is_some()) && !T::KIND.is_clampable() {
            return Err(Error::NotClampable {
                name: super::full_name(&self.category, &self.name),
                kind: T::KIND,
            });
        }
        let id = manager.register_option(OptionParts {
            category: self.category,
            name: self.name,
            description: self.description,
            default: self.default.into_value(),
            flags: self.flags,
            environment: self.environment,
            min: self.min.map(OptionType::into_value),
            max: self.max.map(OptionType::into_value),
            on_change: self.on_change,
        })?;
        Ok(ConfigOption::from_parts(id, Arc::clone(manager)))
    }
}

/// Typed handle to a registered option.
///
/// Cheap to clone; every clone refers to the same option.
pub struct ConfigOption<T: OptionType> {
    id: OptionId,
    manager: Arc<OptionManager>,
    _type: PhantomData<fn() -> T>,
}

impl<T: OptionType> Clone for ConfigOption<T> {
    fn clone(&self) -> Self {
        Self::from_parts(self.id, Arc::clone(&self.manager))
    }
}

impl<T: OptionType> fmt::Debug for ConfigOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOption")
            .field("name", &self.full_name())
            .field("kind", &T::KIND)
            .finish()
    }
}

impl<T: OptionType> ConfigOption<T> {
    pub(crate) fn from_parts(id: OptionId, manager: Arc<OptionManager>) -> Self {
        Self {
            id,
            manager,
            _type: PhantomData,
        }
    }

    pub fn id(&self) -> OptionId {
        self.id
    }

    pub fn manager(&self) -> &Arc<OptionManager> {
        &self.manager
    }

    pub fn full_name(&self) -> String {
        self.manager
            .with_option(self.id, |o| o.full_name().to_string())
            .unwrap_or_default()
    }

    pub fn description(&self) -> String {
        self.manager
            .with_option(self.id, |o| o.description().to_string())
            .unwrap_or_default()
    }

    pub fn flags(&self) -> OptionFlags {
        self.manager
            .with_option(self.id, |o| o.flags())
            .unwrap_or_default()
    }

    /// Resolved value.
    ///
    /// # Panics
    ///
    /// Panics when called before the manager is marked initialized, since the
    /// value could still change once the config layers load.
    pub fn get(&self) -> T {
        assert!(
            self.manager.is_initialized(),
            "option '{}' read before option initialization completed",
            self.full_name()
        );
        self.resolved()
    }

    /// Resolved value, or [`Error::NotInitialized`] before initialization.
    pub fn try_get(&self) -> Result<T> {
        if !self.manager.is_initialized() {
            return Err(Error::NotInitialized {
                name: self.full_name(),
            });
        }
        Ok(self.resolved())
    }

    fn resolved(&self) -> T {
        self.manager
            .with_option(self.id, |o| T::from_value(o.resolved()))
            .flatten()
            .unwrap_or_default()
    }

    /// Write into `layer` (or the current edit target) and resolve on the
    /// next [`OptionManager::apply_pending_values`].
    pub fn set_deferred(&self, value: T, layer: Option<&LayerHandle>) {
        self.manager
            .write_value(self.id, value.into_value(), layer, false);
    }

    /// Write and resolve right away. The change callback still fires on the
    /// next pass.
    pub fn set_immediately(&self, value: T, layer: Option<&LayerHandle>) {
        self.manager
            .write_value(self.id, value.into_value(), layer, true);
    }

    pub fn default_value(&self) -> T {
        self.manager
            .with_option(self.id, |o| T::from_value(o.default_value()))
            .flatten()
            .unwrap_or_default()
    }

    pub fn is_default(&self) -> bool {
        self.manager
            .with_option(self.id, |o| o.is_default())
            .unwrap_or(true)
    }

    /// Write the default into the current edit target layer.
    pub fn reset_to_default(&self) {
        self.set_deferred(self.default_value(), None);
    }

    pub fn has_value_in_layer(&self, layer: &LayerHandle) -> bool {
        self.manager
            .with_option(self.id, |o| o.has_value_in_layer(layer.key()))
            .unwrap_or(false)
    }

    /// Value held by `layer`, if any.
    pub fn layer_value(&self, layer: &LayerHandle) -> Option<T> {
        self.manager
            .with_option(self.id, |o| o.layer_value(layer.key()).and_then(T::from_value))
            .flatten()
    }

    /// Remove this option's value from `layer`.
    pub fn disable_layer_value(&self, layer: &LayerHandle) -> bool {
        self.manager.remove_value(self.id, layer)
    }

    /// Move `from`'s value into `to`.
    pub fn move_layer_value(&self, from: &LayerHandle, to: &LayerHandle) -> bool {
        self.manager.move_layer_value(self.id, from.key(), to.key())
    }

    /// Move every layer value of this option into `other`, converting each
    /// through `transform`. Returns the number of layers migrated.
    pub fn migrate_values_to<U: OptionType>(&self, other: &ConfigOption<U>, transform: impl Fn(T) -> U) -> usize {
        self.manager.migrate_values(self.id, other.id, |value| {
            T::from_value(value).map(|v| transform(v).into_value())
        })
    }

    pub fn set_on_change(&self, callback: impl Fn(&DeviceHandle) + Send + Sync + 'static) {
        self.manager.set_callback(self.id, Some(Arc::new(callback)));
    }

    pub fn clear_on_change(&self) {
        self.manager.set_callback(self.id, None);
    }
}

impl<T: Clampable> ConfigOption<T> {
    pub fn set_min_value(&self, min: T) {
        self.manager.set_bound(self.id, min.into_value(), true);
    }

    pub fn set_max_value(&self, max: T) {
        self.manager.set_bound(self.id, max.into_value(), false);
    }

    pub fn min_value(&self) -> Option<T> {
        self.manager
            .with_option(self.id, |o| o.min_value().and_then(T::from_value))
            .flatten()
    }

    pub fn max_value(&self) -> Option<T> {
        self.manager
            .with_option(self.id, |o| o.max_value().and_then(T::from_value))
            .flatten()
    }
}

impl ConfigOption<HashSetLayer> {
    /// Add a positive opinion in `layer` (or the edit target).
    pub fn add_hash(&self, hash: u64, layer: Option<&LayerHandle>) {
        self.edit_set(layer, |set| set.add(hash));
    }

    /// Add a negative opinion in `layer` (or the edit target).
    pub fn remove_hash(&self, hash: u64, layer: Option<&LayerHandle>) {
        self.edit_set(layer, |set| set.remove(hash));
    }

    /// Drop any opinion about `hash` in `layer` (or the edit target).
    pub fn clear_hash(&self, hash: u64, layer: Option<&LayerHandle>) {
        self.edit_set(layer, |set| set.clear(hash));
    }

    /// Whether the resolved set contains `hash`.
    pub fn contains_hash(&self, hash: u64) -> bool {
        self.manager
            .with_option(self.id, |o| match o.resolved() {
                OptionValue::HashSet(set) => set.contains(hash),
                _ => false,
            })
            .unwrap_or(false)
    }

    fn edit_set(&self, layer: Option<&LayerHandle>, edit: impl FnOnce(&mut HashSetLayer)) {
        self.manager.edit_layer_value(self.id, layer, |value| {
            if let OptionValue::HashSet(set) = value {
                edit(set);
            }
        });
    }
}
