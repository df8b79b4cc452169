use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the persistent index store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Sled(#[from] sled::Error),
    /// Raised inside a transaction body; the store retries or surfaces it.
    #[error("store transaction interrupted: {0}")]
    Interrupted(#[from] sled::transaction::UnabortableTransactionError),
    #[error("failed to encode or decode stored value: {0}")]
    Codec(#[from] bincode::Error),
    #[error("word '{0}' violates the 3..=32 character bound")]
    InvalidWord(String),
    #[error("posting for document {doc} and word {word} has a zero count")]
    ZeroCount { doc: u64, word: u64 },
    #[error("corrupt store entry: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    /// Nothing survived tokenization and the length filter.
    #[error("query too short")]
    EmptyQuery,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("empty body from {0}")]
    EmptyBody(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for [{section}] {key}: {reason}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        reason: String,
    },
}
