//! Fetch error types.

use std::time::Duration;

use sshpoint_transfer::PathOrigin;

/// Why an SSH session could not be established.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("authentication rejected for user {username}")]
    AuthenticationRejected { username: String },

    #[error("SSH protocol error: {0}")]
    Protocol(String),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("host {addr} unreachable: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced while fetching a remote tree.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("{origin} path not found: {path}")]
    NotFound { origin: PathOrigin, path: String },

    #[error("not connected")]
    NotConnected,

    #[error("SFTP error on {path}: {message}")]
    Sftp { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
