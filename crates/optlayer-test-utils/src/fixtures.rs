//! Manager, environment and callback fixtures.

use optlayer_core::{DeviceHandle, OptionManager, ResolveSummary};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fresh isolated manager already marked initialized.
pub fn initialized_manager() -> Arc<OptionManager> {
    let manager = OptionManager::new();
    manager.set_initialized(true);
    manager
}

/// Run one frame of resolution without a device.
pub fn frame(manager: &OptionManager) -> ResolveSummary {
    manager.apply_pending_values(&DeviceHandle::none(), false)
}

/// Environment made of the given pairs, for `EnvSource` consumers.
pub fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Change callback that counts its invocations.
///
/// ```rust
/// use optlayer_test_utils::recording_callback;
///
/// let (count, callback) = recording_callback();
/// callback(&optlayer_core::DeviceHandle::none());
/// assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
/// ```
pub fn recording_callback() -> (Arc<AtomicUsize>, impl Fn(&DeviceHandle) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    (count, move |_: &DeviceHandle| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}
