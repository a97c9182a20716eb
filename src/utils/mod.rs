//! Cross-platform helpers shared by the source fetchers and the configuration layer.

pub mod platform;

pub use platform::{get_git_command, get_home_dir, is_windows, resolve_path};
