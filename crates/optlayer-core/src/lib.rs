//! Layered runtime option resolution
//!
//! Options are named, typed settings. Layers are independent sources of
//! opinions about them: default values, config files, environment overrides,
//! user edits, quality presets, derived settings and layers created at
//! runtime. Once per frame the manager folds every layer's opinion into one
//! resolved value per option:
//!
//! - **Priority**: higher priority layers win for discrete values
//! - **Blending**: floats and vectors interpolate by each layer's strength
//! - **Hash sets**: positive and negative opinions merge by priority
//! - **Reference counting**: runtime layers live while anyone holds them
//! - **Cascades**: change callbacks may write other options; resolution
//!   re-runs a bounded number of times within the frame
//!
//! # Architecture
//!
//! ```text
//!        OptionManager  (registries, dirty set, resolver)
//!          |        |
//!   OptionImpl    Layer ---- optlayer-conf (config files)
//!   (per-layer values, resolved value)
//! ```
//!
//! # Example
//!
//! ```
//! use optlayer_core::{DeviceHandle, LayerDescriptor, LayerKey, OptionBuilder, OptionManager};
//!
//! let manager = OptionManager::new();
//! let bounces = OptionBuilder::new("render", "bounces", 2)
//!     .description("Indirect bounce count")
//!     .register(&manager)
//!     .unwrap();
//! manager.set_initialized(true);
//!
//! let preset = manager
//!     .acquire_layer(LayerDescriptor::new(LayerKey::dynamic("preset")))
//!     .unwrap();
//! bounces.set_deferred(4, Some(&preset));
//! manager.apply_pending_values(&DeviceHandle::none(), false);
//! assert_eq!(bounces.get(), 4);
//!
//! manager.release_layer(&preset);
//! manager.apply_pending_values(&DeviceHandle::none(), false);
//! assert_eq!(bounces.get(), 2);
//! ```

pub mod docs;
pub mod edit_target;
pub mod env;
pub mod error;
pub mod flags;
pub mod hash_set_layer;
pub mod keys;
pub mod layer;
pub mod logging;
pub mod manager;
pub mod math;
pub mod option;
pub mod value;

pub use edit_target::{EditTarget, EditTargetGuard};
pub use env::{EnvSource, ProcessEnv};
pub use error::{Error, Result};
pub use flags::{
    DEFAULT_BLEND_THRESHOLD, DEFAULT_DYNAMIC_PRIORITY, MAX_DYNAMIC_PRIORITY, MAX_RESOLVES, MIN_DYNAMIC_PRIORITY,
    OptionFlags,
};
pub use hash_set_layer::HashSetLayer;
pub use keys::{VirtualKey, VirtualKeys};
pub use layer::{LayerBlend, LayerDescriptor, LayerKey, SystemLayer};
pub use manager::{
    ChangeKind, ConfigPaths, EffectiveValue, LayerChange, LayerHandle, OptionManager, ResolveSummary,
    SystemLayerSources,
};
pub use math::{Vector2, Vector2i, Vector3, Vector4};
pub use option::{ConfigOption, DeviceHandle, OnChange, OptionBuilder, OptionId, OptionImpl};
pub use value::{Clampable, OptionKind, OptionType, OptionValue};
