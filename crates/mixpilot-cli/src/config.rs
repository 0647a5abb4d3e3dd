//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for mixpilot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// Step cap per request
    pub max_steps: Option<u32>,
    /// Whether to stream responses
    pub stream: Option<bool>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for MIXPILOT_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("MIXPILOT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        mixpilot_ai::credentials::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }
}

pub fn example_config() -> &'static str {
    r#"# mixpilot configuration
# model = "claude-sonnet-4-20250514"
# max_steps = 10
# stream = true
"#
}
