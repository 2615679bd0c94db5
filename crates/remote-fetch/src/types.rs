//! Shared types for remote listings, SSH targets and fetch results.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Kind of a remote directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlink, device, socket, fifo or anything else not fetched.
    Other,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes; meaningful for files only.
    pub size: u64,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    pub fn other(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Other,
            size: 0,
        }
    }
}

/// How to authenticate against the SSH host.
#[derive(Clone)]
pub enum Credential {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(***)"),
            Credential::PrivateKey { path, .. } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .finish_non_exhaustive(),
        }
    }
}

/// SSH connection parameters.
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
    pub timeout: Duration,
}

impl SshTarget {
    /// Target on the default port with the default timeout.
    pub fn new(host: impl Into<String>, username: impl Into<String>, credential: Credential) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            credential,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// `host:port` form used for logging and error reports.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Result of a completed directory fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    /// Local directory mirroring the remote root.
    pub local_root: PathBuf,
    /// Number of files downloaded.
    pub files: u64,
    /// Bytes written across all files.
    pub bytes: u64,
}
