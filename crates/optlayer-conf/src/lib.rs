//! Config-file boundary for the optlayer option engine
//!
//! Layers associate with flat `key = value` files. This crate owns that
//! boundary: the line parser and serializer, typed value codecs, atomic
//! locked writes, and the executable-name profile table used for built-in
//! application configs.

pub mod error;
pub mod io;
pub mod profile;
pub mod store;
pub mod value;

pub use error::{Error, Result};
pub use profile::AppProfiles;
pub use store::ConfigStore;
pub use value::ConfigValue;
