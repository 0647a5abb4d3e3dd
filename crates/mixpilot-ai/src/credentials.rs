//! API key resolution
//!
//! The key comes from the `ANTHROPIC_API_KEY` environment variable, falling
//! back to a one-line file at `~/.config/mixpilot/anthropic_api_key`.
//! Absence is a "not configured" state, not an error.

use std::fs;
use std::path::PathBuf;

const ENV_VAR: &str = "ANTHROPIC_API_KEY";
const KEY_FILE: &str = "anthropic_api_key";

/// Directory holding mixpilot's per-user configuration
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixpilot")
}

/// Path of the fallback key file
pub fn key_file_path() -> PathBuf {
    config_dir().join(KEY_FILE)
}

/// Resolve the API key, or `None` when not configured
pub fn resolve_api_key() -> Option<String> {
    if let Ok(key) = std::env::var(ENV_VAR) {
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Some(key);
        }
    }

    let path = key_file_path();
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let key = contents.lines().next().unwrap_or("").trim().to_string();
            if key.is_empty() {
                tracing::debug!("key file {} exists but is empty", path.display());
                None
            } else {
                Some(key)
            }
        }
        Err(_) => None,
    }
}
