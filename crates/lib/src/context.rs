//! Context document loader: the resume text embedded in every prompt.
//!
//! Loaded once at startup and shared read-only by all connections.

use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Substituted when the context file is missing or unreadable.
pub const NO_CONTEXT: &str = "No resume context provided.";

/// Load the context document from `path`.
///
/// Returns the file contents as-is (empty files included); falls back to [`NO_CONTEXT`]
/// when the file cannot be read.
pub fn load_context(path: &Path) -> Arc<str> {
    match fs::read_to_string(path) {
        Ok(s) => {
            log::info!("loaded context document from {} ({} bytes)", path.display(), s.len());
            Arc::from(s)
        }
        Err(e) => {
            log::warn!("context document {} not loaded: {}", path.display(), e);
            Arc::from(NO_CONTEXT)
        }
    }
}
