use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::errors::ConfigError;

// Env var fallback chains, first non-empty wins
pub const OPENAI_KEY_VARS: &[&str] = &["OPENAI_APIKEY", "OPENAI_API_KEY"];
pub const APIFY_TOKEN_VARS: &[&str] = &["APIFY", "APIFY_TOKEN", "APIFY_API_TOKEN"];

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "sitebot")]
#[command(about = "Retrieval-augmented chatbot over a configured set of websites")]
pub struct Args {
    // Path to the JSON config file holding the website list
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    // Directory the vector index is persisted to; its existence decides build vs load
    #[arg(long, default_value = "./storage_index")]
    pub persist_dir: PathBuf,

    // Directory for rolling log files
    #[arg(long, default_value = "./logs")]
    pub log_dir: PathBuf,

    // Run the HTTP surface instead of the interactive prompt
    #[arg(long, default_value_t = false)]
    pub serve: bool,

    // Port for --serve
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 12)]
    pub rate_limit: usize,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Cooldown in seconds once the window limit is hit
    #[arg(long, default_value_t = 30)]
    pub cooldown: u64,

    // Answer cache TTL in seconds
    #[arg(long, default_value_t = 300)]
    pub cache_ttl: u64,

    // Maximum question length in characters
    #[arg(long, default_value_t = 500)]
    pub max_question_len: usize,

    // Characters the input validator rejects outright
    #[arg(long, default_value = "![]<>@'\"/;")]
    pub banned_chars: String,

    // Number of passages retrieved per question
    #[arg(long, default_value_t = 4)]
    pub top_k: usize,

    // Embedding model used for both indexing and querying
    #[arg(long, default_value = "text-embedding-ada-002")]
    pub embedding_model: String,

    // Chat completion model
    #[arg(long, default_value = "gpt-3.5-turbo")]
    pub chat_model: String,
}

// Contents of the JSON config file
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub websites: Vec<String>,
}

impl Settings {
    // Load the website list, dropping blank entries. An empty list is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.websites.retain(|url| !url.trim().is_empty());
        if settings.websites.is_empty() {
            return Err(ConfigError::NoWebsites);
        }
        Ok(settings)
    }
}

// Walk a fallback chain of env var names and return the first non-empty value
pub fn resolve_env(variables: &'static [&'static str]) -> Result<String, ConfigError> {
    for name in variables {
        if let Ok(value) = env::var(name) {
            if !value.trim().is_empty() {
                return Ok(value);
            }
        }
    }
    Err(ConfigError::MissingCredential { variables })
}
