//! Shared test utilities for the optlayer workspace.
//!
//! This crate provides standardised fixtures so crate test suites do not
//! each rebuild conf-file trees and managers by hand. It is a dev-dependency
//! only and never published.
//!
//! # Modules
//!
//! - [`conf`]: [`TestConfDir`] temporary directory of conf files
//! - [`fixtures`]: managers, environments and per-frame helpers

pub mod conf;
pub mod fixtures;

pub use conf::TestConfDir;
pub use fixtures::{env_of, frame, initialized_manager, recording_callback};
