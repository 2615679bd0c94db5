//! Recursive remote directory fetch over SSH/SFTP.
//!
//! [`RemoteFetcher`] owns one multiplexed SSH session, walks a remote tree,
//! mirrors it into a local directory and reports byte-level progress
//! through a [`ProgressSink`](sshpoint_transfer::ProgressSink).
//!
//! The filesystem operations go through the [`RemoteFs`] trait; the
//! production implementation is [`SftpRemote`].

pub mod error;
pub mod fetcher;
pub mod remote;
pub mod sftp;
pub mod types;

pub use error::{ConnectionError, FetchError};
pub use fetcher::RemoteFetcher;
pub use remote::RemoteFs;
pub use sftp::SftpRemote;
pub use types::{Credential, EntryKind, FetchSummary, RemoteEntry, SshTarget};
