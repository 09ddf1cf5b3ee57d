//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for quill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model identifier sent to the endpoint
    pub model: Option<String>,
    /// Endpoint base URL; a URL containing `bedrock` selects the Converse API
    pub base_url: Option<String>,
    /// Environment variable holding the credential
    pub api_key_env: Option<String>,
    /// Show the waiting spinner
    pub spinner: Option<bool>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quill")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("QUILL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`; a missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
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

    /// Write the example config to `path` unless a file already exists.
    pub fn init_at(path: &Path) -> std::io::Result<()> {
        if path.exists() {
            return Ok(());
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, example_config())
    }

    /// Create the default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        Self::init_at(&path)?;
        Ok(path)
    }

    /// Model id: flag, then `QUILL_MODEL`/`OPENAI_MODEL`, then file, then default.
    pub fn resolve_model(&self, flag: Option<&str>) -> String {
        pick(
            flag,
            &["QUILL_MODEL", "OPENAI_MODEL"],
            self.model.as_deref(),
            DEFAULT_MODEL,
        )
    }

    /// Base URL, with the same precedence as [`Config::resolve_model`].
    pub fn resolve_base_url(&self, flag: Option<&str>) -> String {
        pick(
            flag,
            &["QUILL_BASE_URL", "OPENAI_BASE_URL"],
            self.base_url.as_deref(),
            DEFAULT_BASE_URL,
        )
    }
}

fn pick(flag: Option<&str>, env_vars: &[&str], file: Option<&str>, default: &str) -> String {
    let from_env = env_vars
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|v| !v.trim().is_empty());

    flag.map(str::to_string)
        .or(from_env)
        .or_else(|| file.map(str::to_string))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# quill configuration file
# Place at ~/.config/quill/config.toml (Linux), ~/Library/Application Support/quill/config.toml (macOS)
# or %APPDATA%\quill\config.toml (Windows), or point QUILL_CONFIG_PATH at it.

# Model identifier sent to the endpoint
model = "gpt-4o"

# Endpoint base URL. Any OpenAI-compatible chat/completions endpoint works;
# a URL containing "bedrock" uses the Bedrock converse-stream API.
base_url = "https://api.openai.com/v1"

# Environment variable holding the bearer credential
# (defaults to OPENAI_API_KEY, or AWS_BEARER_TOKEN_BEDROCK for Bedrock)
# api_key_env = "OPENAI_API_KEY"

# Show the waiting spinner
spinner = true
"#
}
