//! Per-option layered value storage and resolution
//!
//! Every option keeps one value per layer that has an opinion about it,
//! ordered by layer priority, plus the cached resolved value. Resolution
//! walks the layers from lowest to highest priority starting at the default
//! value:
//!
//! - continuous kinds interpolate towards each enabled layer's value by its
//!   blend strength,
//! - hash sets merge every enabled layer, stronger opinions replacing weaker
//!   ones hash by hash,
//! - everything else takes the value of the highest active layer.
//!
//! The result is clamped to the option's bounds and compared against the
//! previous resolved value.

mod typed;

pub use typed::{ConfigOption, OptionBuilder};

use crate::flags::OptionFlags;
use crate::hash_set_layer::HashSetLayer;
use crate::layer::{LayerBlend, LayerKey, SystemLayer};
use crate::value::{OptionKind, OptionValue};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Stable 64-bit identifier derived from an option's full name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionId(u64);

impl OptionId {
    /// Identifier for `category.name`: the first eight bytes of its SHA-256
    /// digest.
    pub fn from_full_name(full_name: &str) -> Self {
        let digest = Sha256::digest(full_name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(bytes))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Opaque handle passed through to change callbacks.
#[derive(Clone, Default)]
pub struct DeviceHandle(Option<Arc<dyn Any + Send + Sync>>);

impl DeviceHandle {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send + Sync>(device: T) -> Self {
        Self(Some(Arc::new(device)))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref()?.downcast_ref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceHandle")
            .field(&self.0.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Callback invoked after an option's resolved value changes.
pub type OnChange = Arc<dyn Fn(&DeviceHandle) + Send + Sync>;

/// A layer's opinion on one option.
#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizedValue {
    pub value: OptionValue,
    pub blend: LayerBlend,
}

/// Type-erased registry entry for one option.
pub struct OptionImpl {
    id: OptionId,
    category: String,
    name: String,
    full_name: String,
    description: String,
    kind: OptionKind,
    flags: OptionFlags,
    environment: Option<String>,
    resolved: OptionValue,
    min: Option<OptionValue>,
    max: Option<OptionValue>,
    on_change: Option<OnChange>,
    values: BTreeMap<LayerKey, PrioritizedValue>,
}

impl fmt::Debug for OptionImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionImpl")
            .field("full_name", &self.full_name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("resolved", &self.resolved)
            .field("layers", &self.values.len())
            .finish_non_exhaustive()
    }
}

pub(crate) struct OptionParts {
    pub category: String,
    pub name: String,
    pub description: String,
    pub default: OptionValue,
    pub flags: OptionFlags,
    pub environment: Option<String>,
    pub min: Option<OptionValue>,
    pub max: Option<OptionValue>,
    pub on_change: Option<OnChange>,
}

pub(crate) fn full_name(category: &str, name: &str) -> String {
    if category.is_empty() {
        name.to_string()
    } else {
        format!("{category}.{name}")
    }
}

impl OptionImpl {
    pub(crate) fn new(parts: OptionParts) -> Self {
        let full_name = full_name(&parts.category, &parts.name);
        let kind = parts.default.kind();
        let mut values = BTreeMap::new();
        values.insert(
            SystemLayer::Default.key(),
            PrioritizedValue {
                value: parts.default.clone(),
                blend: LayerBlend::FULL,
            },
        );
        let mut option = Self {
            id: OptionId::from_full_name(&full_name),
            category: parts.category,
            name: parts.name,
            full_name,
            description: parts.description,
            kind,
            flags: parts.flags,
            environment: parts.environment,
            resolved: parts.default,
            min: parts.min,
            max: parts.max,
            on_change: parts.on_change,
            values,
        };
        option.resolved = option.clamp(option.resolved.clone());
        option
    }

    pub fn id(&self) -> OptionId {
        self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn flags(&self) -> OptionFlags {
        self.flags
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn resolved(&self) -> &OptionValue {
        &self.resolved
    }

    pub fn min_value(&self) -> Option<&OptionValue> {
        self.min.as_ref()
    }

    pub fn max_value(&self) -> Option<&OptionValue> {
        self.max.as_ref()
    }

    pub fn has_callback(&self) -> bool {
        self.on_change.is_some()
    }

    pub(crate) fn on_change(&self) -> Option<OnChange> {
        self.on_change.clone()
    }

    pub(crate) fn set_on_change(&mut self, on_change: Option<OnChange>) {
        self.on_change = on_change;
    }

    pub fn default_value(&self) -> &OptionValue {
        // The default layer entry is inserted at construction and never removed
        self.values
            .get(&SystemLayer::Default.key())
            .map(|pv| &pv.value)
            .unwrap_or(&self.resolved)
    }

    /// Whether the resolved value equals the default.
    pub fn is_default(&self) -> bool {
        self.resolved == *self.default_value()
    }

    pub fn layer_value(&self, key: &LayerKey) -> Option<&OptionValue> {
        self.values.get(key).map(|pv| &pv.value)
    }

    pub fn has_value_in_layer(&self, key: &LayerKey) -> bool {
        self.values.contains_key(key)
    }

    /// Layers holding a value, highest priority first (default included).
    pub fn layer_values(&self) -> impl Iterator<Item = (&LayerKey, &PrioritizedValue)> {
        self.values.iter()
    }

    pub(crate) fn set_layer_value(&mut self, key: LayerKey, value: OptionValue, blend: LayerBlend) {
        self.values.insert(key, PrioritizedValue { value, blend });
    }

    pub(crate) fn layer_value_mut(&mut self, key: &LayerKey) -> Option<&mut OptionValue> {
        self.values.get_mut(key).map(|pv| &mut pv.value)
    }

    /// Remove the opinion held by `key`. The default layer cannot be removed.
    pub(crate) fn remove_layer_value(&mut self, key: &LayerKey) -> Option<PrioritizedValue> {
        if *key == SystemLayer::Default.key() {
            return None;
        }
        self.values.remove(key)
    }

    /// Refresh the blend snapshot stored with this layer's value.
    pub(crate) fn update_layer_blend(&mut self, key: &LayerKey, blend: LayerBlend) -> bool {
        match self.values.get_mut(key) {
            Some(pv) if pv.blend != blend => {
                pv.blend = blend;
                true
            }
            _ => false,
        }
    }

    /// Returns true when the bound actually changed.
    pub(crate) fn set_min(&mut self, min: Option<OptionValue>) -> bool {
        if self.min == min {
            return false;
        }
        self.min = min;
        true
    }

    /// Returns true when the bound actually changed.
    pub(crate) fn set_max(&mut self, max: Option<OptionValue>) -> bool {
        if self.max == max {
            return false;
        }
        self.max = max;
        true
    }

    pub(crate) fn clamp(&self, value: OptionValue) -> OptionValue {
        if !self.kind.is_clampable() {
            return value;
        }
        value.clamp(self.min.as_ref(), self.max.as_ref())
    }

    /// Recompute the resolved value. Returns whether it changed.
    pub(crate) fn resolve(&mut self) -> bool {
        let value = self.clamp(self.compute_resolved(None));
        let changed = value != self.resolved;
        self.resolved = value;
        changed
    }

    /// Whether the value held by `key` has no effect on the resolved value.
    pub(crate) fn is_layer_value_redundant(&self, key: &LayerKey) -> bool {
        self.has_value_in_layer(key)
            && *key != SystemLayer::Default.key()
            && self.clamp(self.compute_resolved(Some(key))) == self.resolved
    }

    fn compute_resolved(&self, excluded: Option<&LayerKey>) -> OptionValue {
        let default_key = SystemLayer::Default.key();
        let default = self.default_value().clone();
        let survives_disable = self.flags.contains(OptionFlags::NO_RESET);

        // Strongest first; the default entry seeds every branch instead
        let layers = self
            .values
            .iter()
            .filter(|(key, _)| **key != default_key && Some(*key) != excluded)
            .filter(|(_, pv)| pv.blend.enabled || survives_disable)
            .map(|(_, pv)| pv);

        if self.kind.is_continuous() {
            let weakest_first: Vec<&PrioritizedValue> = layers.collect();
            return weakest_first.into_iter().rev().fold(default, |acc, pv| {
                acc.lerp(&pv.value, pv.blend.strength.clamp(0.0, 1.0))
            });
        }

        if self.kind == OptionKind::HashSet {
            let mut merged = HashSetLayer::new();
            for pv in layers.chain(self.values.get(&default_key)) {
                if let OptionValue::HashSet(set) = &pv.value {
                    merged.merge_from(set);
                }
            }
            return OptionValue::HashSet(merged.positives_only());
        }

        layers
            .into_iter()
            .find(|pv| pv.blend.strength >= pv.blend.threshold)
            .map(|pv| pv.value.clone())
            .unwrap_or(default)
    }
}
