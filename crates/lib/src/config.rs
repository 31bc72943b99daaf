//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `./prompter.json`) and environment.
//! The API key is never read from the file; it comes from `GROQ_API_KEY` only.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the completion service credential.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Relay server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion service endpoint and model identifiers.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Where the context document (resume) is read from.
    #[serde(default)]
    pub context: ContextConfig,

    /// Where per-connection transcripts are written.
    #[serde(default)]
    pub transcripts: TranscriptsConfig,
}

/// Relay bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for HTTP and WebSocket (default 8000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    8000
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// OpenAI-compatible completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Base URL of the OpenAI-compatible API (default Groq).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used when no image is attached.
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Vision-capable model used when a screen capture is attached.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Whole-request timeout in seconds. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    crate::llm::DEFAULT_BASE_URL.to_string()
}

fn default_text_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_vision_model() -> String {
    "llama-3.2-11b-vision-preview".to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            request_timeout_secs: None,
        }
    }
}

/// Context document location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    /// Plain-text file read once at startup (default "resume.txt", relative to the working directory).
    #[serde(default = "default_context_path")]
    pub path: PathBuf,
}

fn default_context_path() -> PathBuf {
    PathBuf::from("resume.txt")
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            path: default_context_path(),
        }
    }
}

/// Transcript output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptsConfig {
    /// Directory for `transcript_<timestamp>.txt` files; created on first save.
    #[serde(default = "default_transcripts_dir")]
    pub directory: PathBuf,
}

fn default_transcripts_dir() -> PathBuf {
    PathBuf::from("transcripts")
}

impl Default for TranscriptsConfig {
    fn default() -> Self {
        Self {
            directory: default_transcripts_dir(),
        }
    }
}

/// Resolve the API key from `GROQ_API_KEY`. Empty or whitespace-only counts as unset.
pub fn resolve_api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PROMPTER_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("prompter.json"))
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
