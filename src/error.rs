//! Error types shared by every fan-out verb and connection primitive.
//!
//! Fan-out verbs (exec, push, pull, replicate, copy-id) never short-circuit on one
//! node's failure: they record it and return a single [`PiclError::AggregateFailure`]
//! at the end, carrying the failed/total counts.

use thiserror::Error;

/// Errors that can occur while dialing, executing, transferring or aggregating.
#[derive(Error, Debug)]
pub enum PiclError {
    /// TCP dial or key-exchange failed.
    #[error("network error connecting to {0}: {1}")]
    NetworkError(String, String),

    /// Authentication was rejected by the remote host.
    #[error("authentication failed for {0}")]
    AuthError(String),

    /// The host key presented by the remote did not match `known_hosts`.
    #[error("host key mismatch for {0}")]
    HostKeyMismatch(String),

    /// A remote command failed to run, or returned a non-zero exit status.
    #[error("command '{command}' failed on {node} with status {status}")]
    ExecError {
        node: String,
        command: String,
        status: String,
    },

    /// A local or remote file was expected to exist and did not.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// A node name in a filter or a `host:path` spec did not resolve to a pooled
    /// connection.
    #[error("unknown node: {0}")]
    InvalidNode(String),

    /// A `host:path` remote spec could not be parsed.
    #[error("invalid remote spec: {0}")]
    InvalidRemoteSpec(String),

    /// Both `included` and `excluded` were non-empty on the same filter.
    #[error("filter specifies both an include list and an exclude list")]
    DuplicateFilter,

    /// AES-GCM/PBKDF2 encryption or decryption failed.
    #[error("crypto error: {0}")]
    CryptoError(String),

    /// The cluster config document could not be read or parsed.
    #[error("config error: {0}")]
    ConfigError(String),

    /// One or more targets in a fan-out operation failed.
    #[error("{failed} of {total} targets failed")]
    AggregateFailure { failed: usize, total: usize },

    /// The operation was cancelled; not reported as a failure to the operator.
    #[error("cancelled")]
    Cancelled,

    /// Underlying SFTP protocol error.
    #[error("sftp error: {0}")]
    SftpError(#[from] russh_sftp::client::error::Error),

    /// Underlying russh error.
    #[error("ssh error: {0}")]
    SshError(#[from] russh::Error),

    /// Underlying async-ssh2-tokio error.
    #[error("ssh client error: {0}")]
    Ssh2Error(#[from] async_ssh2_tokio::Error),

    /// Underlying local I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Underlying HTTP client error.
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Underlying JSON (de)serialization error.
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PiclError {
    /// Wraps an aggregate result: `Ok(())` if `failed == 0`, else `AggregateFailure`.
    pub fn from_failures(failed: usize, total: usize) -> Result<(), PiclError> {
        if failed == 0 {
            Ok(())
        } else {
            Err(PiclError::AggregateFailure { failed, total })
        }
    }
}
