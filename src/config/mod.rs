//! Configuration for Stackyard.
//!
//! User-wide settings live in a TOML file (see [`GlobalConfig`]) and control how
//! manifests are fetched and how variables resolve. The manifest itself is not
//! configuration; see [`crate::manifest`].
//!
//! Lookup order for the file:
//!
//! 1. `--config <path>` on the command line
//! 2. the `STACKYARD_CONFIG` environment variable
//! 3. `~/.stackyard/config.toml`
//!
//! A missing file means defaults.

mod global;

pub use global::{GlobalConfig, ResolutionConfig, SourcesConfig};
