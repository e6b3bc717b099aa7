//! Error types for optlayer-core

use crate::layer::LayerKey;
use crate::value::OptionKind;
use std::path::PathBuf;

/// Result type for optlayer-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in optlayer-core operations
///
/// Only construction-time conflicts and I/O surface as errors. Lookup misses
/// and type mismatches at runtime are logged and degrade to defaults.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two options registered under the same `category.name`
    #[error("Option '{name}' is already registered")]
    DuplicateOption { name: String },

    /// A layer key is already held by a layer backed by a different file
    #[error("Layer {key} is already registered from {existing:?}, cannot acquire it from {requested:?}")]
    PriorityCollision {
        key: LayerKey,
        existing: Option<PathBuf>,
        requested: Option<PathBuf>,
    },

    /// System layers must stay clear of the range reserved for dynamic layers
    #[error("System layer '{name}' uses priority {priority} inside the dynamic layer range")]
    SystemPriorityInDynamicRange { priority: u32, name: String },

    /// Bounds were supplied for an option type that cannot be clamped
    #[error("Option '{name}' of type {kind} does not support min/max bounds")]
    NotClampable { name: String, kind: OptionKind },

    /// Resolved values were read before the manager finished initializing
    #[error("Option '{name}' was read before option initialization completed")]
    NotInitialized { name: String },

    /// Save/reload on a layer that has no backing file
    #[error("Layer {layer} has no associated config file")]
    NoConfigFile { layer: LayerKey },

    /// Config-file boundary error from optlayer-conf
    #[error(transparent)]
    Conf(#[from] optlayer_conf::Error),

    /// Standard I/O error
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
