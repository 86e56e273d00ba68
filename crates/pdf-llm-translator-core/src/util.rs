//! Utility functions shared across the crate.

use std::path::PathBuf;

/// Directory name used under the XDG config and cache roots.
pub const APP_DIR: &str = "pdf-llm-translator";

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Get the user's cache directory following XDG conventions.
///
/// Returns `$XDG_CACHE_HOME` if set, otherwise `$HOME/.cache`.
pub fn cache_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
}

/// Default location of the on-disk page result cache.
pub fn page_cache_path() -> PathBuf {
    cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_DIR)
}

/// Clear the on-disk page cache at `path` (or the default location).
///
/// Returns the number of entries removed.
pub fn clear_page_cache(path: Option<PathBuf>) -> crate::Result<usize> {
    let cache_path = path.unwrap_or_else(page_cache_path);

    if !cache_path.exists() {
        return Ok(0);
    }

    let db = sled::open(&cache_path)
        .map_err(|e| crate::Error::CacheInit(format!("Failed to open cache: {e}")))?;

    let count = db.len();
    db.clear()
        .map_err(|e| crate::Error::CacheWrite(format!("Failed to clear cache: {e}")))?;
    db.flush()
        .map_err(|e| crate::Error::CacheWrite(format!("Failed to flush cache: {e}")))?;

    Ok(count)
}

/// Truncate `text` to at most `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
