//! Path utilities for deadwood
//!
//! Handles tilde expansion and the application root.

use std::path::PathBuf;

/// Expands a leading tilde (~) to the user's home directory.
/// Examples:
/// "~/.deadwood/cache.json" -> "/home/ana/.deadwood/cache.json"
/// "/tmp/foo" -> "/tmp/foo" (no change)
pub fn expand_tilde(path: &str) -> String {
    if path == "~" {
        return home_dir();
    }

    match path.strip_prefix("~/") {
        Some(rest) => format!("{}/{}", home_dir(), rest),
        None => path.to_string(),
    }
}

/// Helper to convert a potentially tilde-containing string into a PathBuf.
pub fn get_path(path: &str) -> PathBuf {
    PathBuf::from(expand_tilde(path))
}

/// Resolves the deadwood root using the DEADWOOD_ROOT env var.
/// Handles absolute paths, tilde expansion, and names relative to $HOME.
pub fn get_app_root() -> PathBuf {
    let root_name = std::env::var("DEADWOOD_ROOT").unwrap_or_else(|_| ".deadwood".to_string());

    if root_name.starts_with('/') {
        PathBuf::from(root_name)
    } else if root_name.starts_with('~') {
        get_path(&root_name)
    } else {
        PathBuf::from(home_dir()).join(root_name)
    }
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}
