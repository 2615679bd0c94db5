//! Recursive directory fetch with progress accounting.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use sshpoint_transfer::{PathOrigin, ProgressSink, sanitize_file_name, validate_entry_name};
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::remote::RemoteFs;
use crate::sftp::SftpRemote;
use crate::types::{EntryKind, FetchSummary, RemoteEntry, SshTarget};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Mirrors remote directory trees into local directories.
///
/// Holds at most one remote session, acquired by [`connect`](Self::connect)
/// and released by [`close`](Self::close).
pub struct RemoteFetcher {
    progress: Arc<dyn ProgressSink>,
    session: Option<Box<dyn RemoteFs>>,
}

impl RemoteFetcher {
    /// Creates a disconnected fetcher.
    pub fn new(progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            progress,
            session: None,
        }
    }

    /// Creates a fetcher bound to an already open session.
    pub fn with_session(progress: Arc<dyn ProgressSink>, session: Box<dyn RemoteFs>) -> Self {
        Self {
            progress,
            session: Some(session),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Opens the SSH/SFTP session. No-op when already connected.
    pub async fn connect(&mut self, target: &SshTarget) -> Result<(), FetchError> {
        if self.session.is_some() {
            debug!(addr = %target.addr(), "already connected");
            return Ok(());
        }
        let remote = SftpRemote::connect(target).await?;
        self.session = Some(Box::new(remote));
        info!(addr = %target.addr(), "connected");
        Ok(())
    }

    /// Releases the session, if any.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
            info!("remote session closed");
        }
    }

    /// Downloads `remote_path` into `local_parent/<basename(remote_path)>`.
    ///
    /// Regular files are downloaded, directories recursed into and every
    /// other entry kind skipped.
    pub async fn fetch_directory(
        &self,
        remote_path: &str,
        local_parent: &Path,
    ) -> Result<FetchSummary, FetchError> {
        let session = self.session.as_deref().ok_or(FetchError::NotConnected)?;

        match session.stat(remote_path).await? {
            Some(entry) if entry.kind == EntryKind::Directory => {}
            _ => {
                return Err(FetchError::NotFound {
                    origin: PathOrigin::Remote,
                    path: remote_path.to_string(),
                });
            }
        }

        let local_root = match remote_basename(remote_path) {
            Some(name) => local_parent.join(name),
            None => local_parent.to_path_buf(),
        };
        tokio::fs::create_dir_all(&local_root).await?;

        let total = count_files(session, remote_path.to_string()).await;
        self.progress.set_total_file_count(total);
        self.progress
            .set_status_text(&format!("Downloading {total} files..."));
        info!(remote = remote_path, local = %local_root.display(), files = total, "fetching directory");

        let mut summary = FetchSummary {
            local_root: local_root.clone(),
            files: 0,
            bytes: 0,
        };
        self.fetch_tree(session, remote_path.to_string(), local_root, &mut summary)
            .await?;

        info!(
            remote = remote_path,
            files = summary.files,
            bytes = summary.bytes,
            "directory fetched"
        );
        Ok(summary)
    }

    fn fetch_tree<'a>(
        &'a self,
        session: &'a dyn RemoteFs,
        remote_dir: String,
        local_dir: PathBuf,
        summary: &'a mut FetchSummary,
    ) -> BoxFuture<'a, Result<(), FetchError>> {
        Box::pin(async move {
            let entries = session.list_dir(&remote_dir).await?;
            for entry in entries {
                if !is_fetchable_name(&entry) {
                    continue;
                }
                let remote_child = join_remote(&remote_dir, &entry.name);
                match entry.kind {
                    EntryKind::Directory => {
                        let local_child = local_dir.join(local_component(&entry.name));
                        tokio::fs::create_dir_all(&local_child).await?;
                        self.fetch_tree(session, remote_child, local_child, summary)
                            .await?;
                    }
                    EntryKind::File => {
                        let local_file = local_dir.join(local_component(&sanitize_file_name(&entry.name)));
                        let bytes = self
                            .download_file(session, &remote_child, &local_file, &entry)
                            .await?;
                        summary.files += 1;
                        summary.bytes += bytes;
                    }
                    EntryKind::Other => {
                        debug!(path = %remote_child, "skipping non-regular entry");
                    }
                }
            }
            Ok(())
        })
    }

    async fn download_file(
        &self,
        session: &dyn RemoteFs,
        remote: &str,
        local: &Path,
        entry: &RemoteEntry,
    ) -> Result<u64, FetchError> {
        let task = self.progress.add_task(&entry.name, entry.size);
        let progress = Arc::clone(&self.progress);
        let mut last = 0u64;
        let mut forward = move |current: u64| {
            if current > last {
                progress.update_task(task, current - last);
                last = current;
            }
        };

        match session.download(remote, local, &mut forward).await {
            Ok(bytes) => {
                self.progress.complete_task(task);
                debug!(remote, local = %local.display(), bytes, "file downloaded");
                Ok(bytes)
            }
            Err(e) => {
                warn!(remote, error = %e, "download failed");
                remove_partial(local).await;
                Err(e)
            }
        }
    }
}

/// Counts regular files below `dir`. Listing failures count as zero.
fn count_files<'a>(session: &'a dyn RemoteFs, dir: String) -> BoxFuture<'a, u64> {
    Box::pin(async move {
        let entries = match session.list_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir, error = %e, "could not count files");
                return 0;
            }
        };
        let mut count = 0;
        for entry in entries {
            if !is_fetchable_name(&entry) {
                continue;
            }
            match entry.kind {
                EntryKind::File => count += 1,
                EntryKind::Directory => {
                    count += count_files(session, join_remote(&dir, &entry.name)).await;
                }
                EntryKind::Other => {}
            }
        }
        count
    })
}

fn is_fetchable_name(entry: &RemoteEntry) -> bool {
    if entry.name == "." || entry.name == ".." {
        return false;
    }
    if let Err(e) = validate_entry_name(&entry.name) {
        warn!(name = %entry.name, error = %e, "skipping entry");
        return false;
    }
    true
}

/// Maps characters the local platform treats as separators (`\` on
/// Windows) to `_` so a remote name stays a single local component.
fn local_component(name: &str) -> String {
    name.chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect()
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial download"),
    }
}

fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Last path component; `None` for the filesystem root.
fn remote_basename(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().filter(|name| !name.is_empty())
}
