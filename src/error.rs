//! Error types for tiercache
//!
//! Only [`Error::Config`] (and the I/O and YAML errors that lead to it) can
//! leave the public cache API. Everything else is produced and consumed inside
//! the remote client, where it is logged and turned into a fail-open result.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tiercache
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Cache configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // Remote Tier Errors
    // =========================================================================
    /// Could not open a connection to a cache server
    #[error("Connection to {server} failed: {reason}")]
    ConnectionFailed { server: String, reason: String },

    /// Server is marked dead for the rest of the process
    #[error("Server {0} is unavailable")]
    ServerUnavailable(String),

    /// Operation did not complete within its deadline
    #[error("{operation} on {server} timed out after {timeout_ms}ms")]
    Timeout {
        operation: String,
        server: String,
        timeout_ms: u64,
    },

    /// Unexpected or malformed response from a cache server
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server answered with ERROR, CLIENT_ERROR or SERVER_ERROR
    #[error("Server replied with error: {0}")]
    ServerReply(String),

    /// Key cannot be sent to the remote tier
    #[error("Invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    // =========================================================================
    // Instrumentation Errors
    // =========================================================================
    /// Query log category is not one of the known categories
    #[error("Invalid query category: {category} (must be one of {valid})")]
    UnknownCategory { category: String, valid: String },

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // =========================================================================
    // Compression Errors
    // =========================================================================
    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },
}

impl Error {
    /// Whether this error should kill the connection it happened on.
    ///
    /// After a timeout or protocol error the stream position is unknown, so
    /// the connection can't be reused.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Timeout { .. }
                | Error::Protocol(_)
                | Error::ConnectionFailed { .. }
        )
    }
}
