use std::path::PathBuf;

use thiserror::Error;

// Startup-time failures. These abort the process; nothing else does.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {}", path.display(), source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no websites found in config file")]
    NoWebsites,

    #[error("missing credential, set one of {variables:?}")]
    MissingCredential { variables: &'static [&'static str] },
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to crawl configured websites: {0}")]
    Crawl(#[source] ApiError),

    #[error("failed to build the vector index: {0}")]
    BuildIndex(#[source] ApiError),

    #[error("failed to persist the vector index: {0}")]
    PersistIndex(#[source] IndexError),

    #[error("failed to load the persisted index: {0}")]
    LoadIndex(#[source] IndexError),
}

// Failures from the external HTTP collaborators (crawler, embeddings, completions).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("malformed api response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read {}: {}", path.display(), source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {}", path.display(), source)]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode index at {}: {}", path.display(), source)]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode index: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Question is too long ({length} characters, the limit is {max}).")]
    TooLong { length: usize, max: usize },

    #[error("Question contains an invalid character: {found:?}.")]
    InvalidCharacters { found: char },
}

// Per-question outcome. Surfaces render these as text; the loop never dies on one.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("Rate limit exceeded. Try again in {retry_after_secs} seconds.")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("Error answering question: {0}")]
    Downstream(#[from] ApiError),
}
