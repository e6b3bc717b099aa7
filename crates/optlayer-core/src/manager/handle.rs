use super::OptionManager;
use super::persistence::LayerChange;
use crate::error::Result;
use crate::flags::OptionFlags;
use crate::layer::{Layer, LayerKey};
use optlayer_conf::ConfigStore;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Shared handle to a registered layer.
///
/// Cloning a handle does not touch the layer's reference count; only
/// [`OptionManager::acquire_layer`] and [`OptionManager::release_layer`] do.
#[derive(Clone)]
pub struct LayerHandle {
    layer: Arc<Layer>,
    manager: Arc<OptionManager>,
}

impl fmt::Debug for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerHandle")
            .field("key", self.layer.key())
            .field("file", &self.layer.file_path())
            .field("ref_count", &self.layer.ref_count())
            .finish()
    }
}

impl PartialEq for LayerHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.layer, &other.layer)
    }
}

impl Eq for LayerHandle {}

impl LayerHandle {
    pub(crate) fn new(layer: Arc<Layer>, manager: Arc<OptionManager>) -> Self {
        Self { layer, manager }
    }

    pub(crate) fn layer(&self) -> &Arc<Layer> {
        &self.layer
    }

    pub fn key(&self) -> &LayerKey {
        self.layer.key()
    }

    pub fn name(&self) -> &str {
        &self.layer.key().name
    }

    pub fn priority(&self) -> u32 {
        self.layer.key().priority
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.layer.file_path()
    }

    pub fn is_system(&self) -> bool {
        self.layer.is_system()
    }

    pub fn ref_count(&self) -> u32 {
        self.layer.ref_count()
    }

    /// Whether the layer is still in the manager's registry.
    pub fn is_registered(&self) -> bool {
        self.manager.lock().is_registered(&self.layer)
    }

    pub fn is_enabled(&self) -> bool {
        self.layer.state().enabled
    }

    pub fn blend_strength(&self) -> f32 {
        self.layer.state().blend_strength
    }

    pub fn blend_threshold(&self) -> f32 {
        self.layer.state().blend_threshold
    }

    /// Enabled with a strength at or above its threshold.
    pub fn is_active(&self) -> bool {
        self.layer.blend().is_active()
    }

    pub fn category_flags(&self) -> OptionFlags {
        self.layer.state().category_flags
    }

    pub fn set_category_flags(&self, flags: OptionFlags) {
        let mut state = self.layer.state();
        state.category_flags = flags.category();
        state.miscategorized = None;
    }

    /// Request the layer's enabled state for this frame. Any enable request
    /// wins over disable requests.
    pub fn request_enabled(&self, enabled: bool) {
        self.layer.request_enabled(enabled);
    }

    /// Request a blend strength for this frame. The largest request wins.
    pub fn request_blend_strength(&self, strength: f32) {
        self.layer.request_blend_strength(strength);
    }

    /// Request a blend threshold for this frame. The smallest request wins.
    pub fn request_blend_threshold(&self, threshold: f32) {
        self.layer.request_blend_threshold(threshold);
    }

    /// Snapshot of the layer's saved (or supplied) config.
    pub fn config(&self) -> ConfigStore {
        self.layer.state().config.clone()
    }

    /// Whether any option holds a value in this layer.
    pub fn has_values(&self) -> bool {
        self.manager.layer_has_values(&self.layer)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.manager.has_unsaved_changes(&self.layer)
    }

    pub fn has_pending_removals(&self) -> bool {
        self.manager.has_pending_removals(&self.layer)
    }

    /// Visit every difference between the live values and the saved config.
    pub fn for_each_change(&self, visitor: impl FnMut(&LayerChange)) {
        self.manager.for_each_change(&self.layer, visitor);
    }

    /// Collected form of [`LayerHandle::for_each_change`].
    pub fn changes(&self) -> Vec<LayerChange> {
        let mut changes = Vec::new();
        self.for_each_change(|change| changes.push(change.clone()));
        changes
    }

    /// Write the layer's values to its file.
    pub fn save(&self) -> Result<()> {
        self.manager.save_layer(&self.layer)
    }

    /// Discard live values and re-read the layer's file.
    pub fn reload(&self) -> Result<()> {
        self.manager.reload_layer(&self.layer)
    }

    /// Merge this layer's unsaved changes into the config file at `path`.
    /// Returns `Ok(false)` when there is nothing to export.
    pub fn export_unsaved_changes(&self, path: &Path) -> Result<bool> {
        self.manager.export_unsaved_changes(&self.layer, path)
    }

    pub fn count_miscategorized_options(&self) -> u32 {
        self.manager.count_miscategorized_options(&self.layer)
    }

    /// Move miscategorized values to the layer matching their category.
    /// Returns the number of values moved.
    pub fn migrate_miscategorized_options(&self) -> u32 {
        self.manager.migrate_miscategorized_options(&self.layer)
    }

    /// Remove values that do not affect the resolved value. Returns the
    /// number removed.
    pub fn remove_redundant_values(&self) -> usize {
        self.manager.remove_redundant_values(&self.layer)
    }
}
