//! Layers: prioritized containers of option opinions
//!
//! A layer's authoritative state (enabled, blend strength, blend threshold)
//! only changes when the manager resolves the requests accumulated during a
//! frame. Any number of independent callers may share control of one layer:
//! an enable request from anyone wins, strength takes the maximum request and
//! threshold the minimum.

use crate::flags::{
    DEFAULT_BLEND_THRESHOLD, DEFAULT_DYNAMIC_PRIORITY, EMPTY_STRENGTH_REQUEST,
    EMPTY_THRESHOLD_REQUEST, OptionFlags,
};
use optlayer_conf::ConfigStore;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{self, AtomicU32};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identity of a layer: priority first, then name.
///
/// Keys order from highest to lowest priority; equal priorities order by
/// name alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerKey {
    pub priority: u32,
    pub name: String,
}

impl LayerKey {
    pub fn new(priority: u32, name: impl Into<String>) -> Self {
        Self {
            priority,
            name: name.into(),
        }
    }

    /// Key of a dynamic layer at the default dynamic priority.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_DYNAMIC_PRIORITY, name)
    }
}

impl Ord for LayerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for LayerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' (priority {})", self.name, self.priority)
    }
}

/// The layers the engine itself creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemLayer {
    /// Option defaults; every option always holds a value here
    Default,
    /// Base engine config files
    BaseConfig,
    /// Built-in per-application profile
    AppConfig,
    /// Project config files, the developer-facing save target
    ProjectConfig,
    /// Config shipped with the base game mod
    ModConfig,
    /// Values taken from environment variables
    Environment,
    /// Values computed by code at runtime
    Derived,
    /// End-user settings file
    User,
    /// Quality preset values
    Quality,
}

impl SystemLayer {
    pub const ALL: [SystemLayer; 9] = [
        SystemLayer::Default,
        SystemLayer::BaseConfig,
        SystemLayer::AppConfig,
        SystemLayer::ProjectConfig,
        SystemLayer::ModConfig,
        SystemLayer::Environment,
        SystemLayer::Derived,
        SystemLayer::User,
        SystemLayer::Quality,
    ];

    pub const fn priority(self) -> u32 {
        match self {
            SystemLayer::Default => 0,
            SystemLayer::BaseConfig => 1,
            SystemLayer::AppConfig => 2,
            SystemLayer::ProjectConfig => 3,
            SystemLayer::ModConfig => 4,
            SystemLayer::Environment => 5,
            SystemLayer::Derived => 6,
            SystemLayer::User => 0xFFFF_FFFE,
            SystemLayer::Quality => 0xFFFF_FFFF,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SystemLayer::Default => "Default Values",
            SystemLayer::BaseConfig => "Base Config",
            SystemLayer::AppConfig => "App Config",
            SystemLayer::ProjectConfig => "Project Config",
            SystemLayer::ModConfig => "Mod Config",
            SystemLayer::Environment => "Environment Variable Overrides",
            SystemLayer::Derived => "Derived Settings",
            SystemLayer::User => "User Settings",
            SystemLayer::Quality => "Quality Presets",
        }
    }

    pub fn key(self) -> LayerKey {
        LayerKey::new(self.priority(), self.name())
    }
}

/// Snapshot of a layer's blending state, copied into every value it holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerBlend {
    pub enabled: bool,
    pub strength: f32,
    pub threshold: f32,
}

impl LayerBlend {
    pub const FULL: LayerBlend = LayerBlend {
        enabled: true,
        strength: 1.0,
        threshold: DEFAULT_BLEND_THRESHOLD,
    };

    /// Enabled and strong enough for discrete values to apply.
    pub fn is_active(&self) -> bool {
        self.enabled && self.strength >= self.threshold
    }
}

/// Per-frame enable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnabledRequest {
    #[default]
    NoRequest,
    RequestDisabled,
    RequestEnabled,
}

/// How a layer should be created by [`OptionManager::acquire_layer`].
///
/// [`OptionManager::acquire_layer`]: crate::OptionManager::acquire_layer
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    pub key: LayerKey,
    pub file_path: Option<PathBuf>,
    pub blend_strength: f32,
    pub blend_threshold: f32,
    pub is_system: bool,
    pub config: Option<ConfigStore>,
}

impl LayerDescriptor {
    pub fn new(key: LayerKey) -> Self {
        Self {
            key,
            file_path: None,
            blend_strength: 1.0,
            blend_threshold: DEFAULT_BLEND_THRESHOLD,
            is_system: false,
            config: None,
        }
    }

    /// Descriptor for one of the engine's own layers.
    pub fn system(layer: SystemLayer) -> Self {
        Self {
            is_system: true,
            ..Self::new(layer.key())
        }
    }

    /// Back the layer with a config file.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn blend(mut self, strength: f32, threshold: f32) -> Self {
        self.blend_strength = strength;
        self.blend_threshold = threshold;
        self
    }

    /// Use this config instead of reading the file.
    pub fn config(mut self, config: ConfigStore) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Debug)]
pub(crate) struct LayerState {
    pub enabled: bool,
    pub blend_strength: f32,
    pub blend_threshold: f32,
    pub dirty: bool,
    pub blend_dirty: bool,
    pub pending_enabled: EnabledRequest,
    pub pending_max_strength: f32,
    pub pending_min_threshold: f32,
    pub category_flags: OptionFlags,
    pub config: ConfigStore,
    /// False only when the layer is known to hold no values
    pub has_values: bool,
    pub unsaved_changes: Option<bool>,
    pub miscategorized: Option<u32>,
}

impl LayerState {
    pub fn blend(&self) -> LayerBlend {
        LayerBlend {
            enabled: self.enabled,
            strength: self.blend_strength,
            threshold: self.blend_threshold,
        }
    }
}

/// Registry entry for a layer.
///
/// The refcount is atomic and touched without the manager's lock; all other
/// state sits behind a per-layer mutex that is only ever taken last.
#[derive(Debug)]
pub(crate) struct Layer {
    key: LayerKey,
    file_path: Option<PathBuf>,
    is_system: bool,
    ref_count: AtomicU32,
    state: Mutex<LayerState>,
}

impl Layer {
    pub fn new(descriptor: LayerDescriptor, config: ConfigStore) -> Self {
        Self {
            key: descriptor.key,
            file_path: descriptor.file_path,
            is_system: descriptor.is_system,
            ref_count: AtomicU32::new(1),
            state: Mutex::new(LayerState {
                enabled: true,
                blend_strength: descriptor.blend_strength.clamp(0.0, 1.0),
                blend_threshold: descriptor.blend_threshold.clamp(0.0, 1.0),
                dirty: false,
                blend_dirty: false,
                pending_enabled: EnabledRequest::NoRequest,
                pending_max_strength: EMPTY_STRENGTH_REQUEST,
                pending_min_threshold: EMPTY_THRESHOLD_REQUEST,
                category_flags: OptionFlags::NONE,
                has_values: !config.is_empty(),
                config,
                unsaved_changes: None,
                miscategorized: None,
            }),
        }
    }

    pub fn key(&self) -> &LayerKey {
        &self.key
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    pub fn state(&self) -> MutexGuard<'_, LayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn blend(&self) -> LayerBlend {
        self.state().blend()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(atomic::Ordering::Acquire)
    }

    pub fn add_ref(&self) -> u32 {
        self.ref_count.fetch_add(1, atomic::Ordering::AcqRel) + 1
    }

    /// Decrement unless already zero. Returns the new count, or `None` when
    /// the count was zero.
    pub fn release_ref(&self) -> Option<u32> {
        let mut current = self.ref_count.load(atomic::Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }
            match self.ref_count.compare_exchange_weak(
                current,
                current - 1,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            ) {
                Ok(_) => return Some(current - 1),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn request_enabled(&self, enabled: bool) {
        let mut state = self.state();
        if enabled {
            state.pending_enabled = EnabledRequest::RequestEnabled;
        } else if state.pending_enabled == EnabledRequest::NoRequest {
            state.pending_enabled = EnabledRequest::RequestDisabled;
        }
    }

    pub fn request_blend_strength(&self, strength: f32) {
        let mut state = self.state();
        state.pending_max_strength = state.pending_max_strength.max(strength.clamp(0.0, 1.0));
    }

    pub fn request_blend_threshold(&self, threshold: f32) {
        let mut state = self.state();
        state.pending_min_threshold = state.pending_min_threshold.min(threshold.clamp(0.0, 1.0));
    }

    /// Fold this frame's requests into the authoritative state and reset the
    /// request accumulators.
    pub fn resolve_pending_requests(&self) {
        let mut state = self.state();

        if state.pending_enabled != EnabledRequest::NoRequest {
            let enabled = state.pending_enabled == EnabledRequest::RequestEnabled;
            if state.enabled != enabled {
                state.enabled = enabled;
                state.dirty = true;
            }
            state.pending_enabled = EnabledRequest::NoRequest;
        }

        if state.pending_max_strength > EMPTY_STRENGTH_REQUEST {
            if state.blend_strength != state.pending_max_strength {
                state.blend_strength = state.pending_max_strength;
                state.blend_dirty = true;
            }
            state.pending_max_strength = EMPTY_STRENGTH_REQUEST;
        }

        if state.pending_min_threshold < EMPTY_THRESHOLD_REQUEST {
            if state.blend_threshold != state.pending_min_threshold {
                state.blend_threshold = state.pending_min_threshold;
                state.blend_dirty = true;
            }
            state.pending_min_threshold = EMPTY_THRESHOLD_REQUEST;
        }
    }

    /// Consume the dirty flags set by [`Layer::resolve_pending_requests`].
    ///
    /// Returns the new blend state when options holding values in this layer
    /// must be revisited.
    pub fn take_pending_change(&self) -> Option<LayerBlend> {
        let mut state = self.state();
        if !state.dirty && !state.blend_dirty {
            return None;
        }
        state.dirty = false;
        state.blend_dirty = false;
        Some(state.blend())
    }

    /// Invalidate caches derived from the layer's values.
    pub fn on_value_changed(&self) {
        let mut state = self.state();
        state.unsaved_changes = None;
        state.miscategorized = None;
    }
}
