//! Remote filesystem trait.
//!
//! `SftpRemote` implements this on top of a russh session. Keeping the
//! fetch walk behind a trait lets it run against in-memory mocks.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::error::FetchError;
use crate::types::RemoteEntry;

/// Abstract remote filesystem reachable over one live session.
pub trait RemoteFs: Send + Sync {
    /// Returns the entry for `path`, or `None` if it does not exist.
    fn stat<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<RemoteEntry>, FetchError>> + Send + 'a>>;

    /// Lists the entries of a directory.
    fn list_dir<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RemoteEntry>, FetchError>> + Send + 'a>>;

    /// Streams `remote` into the local file `local`.
    ///
    /// `on_progress` receives the cumulative byte count after each write.
    /// Returns the total number of bytes written.
    fn download<'a>(
        &'a self,
        remote: &'a str,
        local: &'a Path,
        on_progress: &'a mut (dyn FnMut(u64) + Send),
    ) -> Pin<Box<dyn Future<Output = Result<u64, FetchError>> + Send + 'a>>;

    /// Releases the session. Never fails.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
