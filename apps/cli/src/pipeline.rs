//! Operation modes wired from the command line.
//!
//! - `sshpoint <path>`: upload a file, or compress a directory, upload the
//!   archive and delete it.
//! - `--upload-only <file>`: upload one file.
//! - `--use-ssh`: fetch a remote directory, optionally compress it and
//!   upload the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use sshpoint_cloud_upload::{GraphClient, ResumableUploader, UploadSettings, UploadedItem};
use sshpoint_remote_fetch::{Credential, RemoteFetcher, SshTarget};
use sshpoint_transfer::{ProgressSink, ProgressTracker};
use tracing::{info, warn};

use crate::archive::{self, ArchiveSummary};
use crate::cli::Cli;
use crate::config::{AppConfig, SshSection};
use crate::render::TerminalProgress;

/// What the invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    UploadPath(PathBuf),
    UploadOnly(PathBuf),
    Ssh,
}

impl Mode {
    /// A positional path wins over `--upload-only`, which wins over `--use-ssh`.
    pub fn select(cli: &Cli) -> anyhow::Result<Self> {
        if let Some(path) = &cli.path {
            return Ok(Mode::UploadPath(path.clone()));
        }
        if let Some(path) = &cli.upload_only {
            return Ok(Mode::UploadOnly(path.clone()));
        }
        if cli.use_ssh {
            return Ok(Mode::Ssh);
        }
        anyhow::bail!(
            "no operation specified; pass a path, --upload-only or --use-ssh (see --help)"
        )
    }
}

/// What happens to a fetched tree before upload.
#[derive(Debug, Clone, Copy)]
struct PostFetch {
    compress: bool,
    keep_original: bool,
    upload: bool,
    level: u8,
}

pub async fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    let mode = Mode::select(cli)?;

    let tracker = Arc::new(ProgressTracker::new());
    let display = TerminalProgress::attach(&tracker);
    let progress: Arc<dyn ProgressSink> = tracker.clone();

    let folder = cli
        .sharepoint_folder
        .clone()
        .unwrap_or_else(|| config.upload.folder.clone());

    let result = match mode {
        Mode::UploadPath(path) => {
            upload_path(&path, &folder, cli.compression_level, config, progress).await
        }
        Mode::UploadOnly(path) if !path.is_file() => {
            Err(anyhow::anyhow!("file not found: {}", path.display()))
        }
        Mode::UploadOnly(path) => upload(&path, &folder, config, progress).await.map(|_| ()),
        Mode::Ssh => ssh_transfer(cli, config, &folder, progress).await,
    };

    display.finish();
    result
}

/// Uploads a file as is, or a directory as a temporary archive.
async fn upload_path(
    path: &Path,
    folder: &str,
    level: u8,
    config: &AppConfig,
    progress: Arc<dyn ProgressSink>,
) -> anyhow::Result<()> {
    if path.is_file() {
        info!(file = %path.display(), "uploading file");
        return upload(path, folder, config, progress).await.map(|_| ());
    }
    if !path.is_dir() {
        anyhow::bail!("path not found: {}", path.display());
    }

    let summary = compress(path.to_path_buf(), level).await?;
    let result = upload(&summary.path, folder, config, progress).await;
    remove_file_logged(&summary.path).await;
    result.map(|_| ())
}

async fn ssh_transfer(
    cli: &Cli,
    config: &AppConfig,
    folder: &str,
    progress: Arc<dyn ProgressSink>,
) -> anyhow::Result<()> {
    let remote_path = cli
        .remote_path
        .as_deref()
        .context("--remote-path is required for SSH transfer")?;
    let target = ssh_target(cli, &config.ssh, config.ssh_timeout())?;

    let (base, temp) = match &cli.local_path {
        Some(path) => (path.clone(), None),
        None if cli.upload_to_sharepoint => {
            let dir = tempfile::Builder::new()
                .prefix("sshpoint_ssh_")
                .tempdir()
                .context("cannot create temporary directory")?;
            info!(dir = %dir.path().display(), "using temporary directory");
            (dir.path().to_path_buf(), Some(dir))
        }
        None => anyhow::bail!("--local-path is required when not uploading to SharePoint"),
    };
    tokio::fs::create_dir_all(&base).await?;

    let mut fetcher = RemoteFetcher::new(progress.clone());
    info!(addr = %target.addr(), user = %target.username, "connecting");
    fetcher.connect(&target).await?;
    let fetched = fetcher.fetch_directory(remote_path, &base).await;
    fetcher.close().await;
    let fetched = fetched?;
    info!(files = fetched.files, bytes = fetched.bytes, "download completed");

    let downloaded = if fetched.local_root.exists() {
        fetched.local_root
    } else {
        base.clone()
    };
    let post = PostFetch {
        compress: cli.compress,
        keep_original: cli.keep_original,
        upload: cli.upload_to_sharepoint,
        level: cli.compression_level,
    };
    let archive = finish_fetched(&downloaded, &base, post).await?;

    if let (true, Some(archive)) = (post.upload, archive) {
        upload(&archive.path, folder, config, progress).await?;
    }

    if let Some(dir) = temp {
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => info!(dir = %path.display(), "temporary directory removed"),
            Err(e) => warn!(dir = %path.display(), error = %e, "could not remove temporary directory"),
        }
    }
    info!("all operations completed");
    Ok(())
}

/// Compresses `downloaded` when asked to (or when it must be uploaded)
/// and drops the original tree unless it should be kept.
async fn finish_fetched(
    downloaded: &Path,
    base: &Path,
    post: PostFetch,
) -> anyhow::Result<Option<ArchiveSummary>> {
    if !post.compress && !post.upload {
        return Ok(None);
    }
    let summary = compress(downloaded.to_path_buf(), post.level).await?;

    if post.compress && !post.keep_original && downloaded != base {
        tokio::fs::remove_dir_all(downloaded).await?;
        info!(dir = %downloaded.display(), "removed original directory");
    }
    Ok(Some(summary))
}

async fn compress(dir: PathBuf, level: u8) -> anyhow::Result<ArchiveSummary> {
    tokio::task::spawn_blocking(move || archive::compress_directory(&dir, None, level))
        .await
        .context("compression task panicked")?
}

async fn upload(
    file: &Path,
    folder: &str,
    config: &AppConfig,
    progress: Arc<dyn ProgressSink>,
) -> anyhow::Result<UploadedItem> {
    let settings = UploadSettings {
        chunk_size: config.upload.chunk_size,
        ..UploadSettings::default()
    };
    let uploader = ResumableUploader::new(
        Arc::new(GraphClient::new()?),
        Arc::new(config.credentials()?),
        config.graph_config(),
        progress,
    )
    .with_settings(settings);

    info!(file = %file.display(), folder, "uploading to SharePoint");
    let item = uploader.upload_file(file, folder).await?;
    info!(
        name = %item.name,
        id = %item.id,
        size = item.size,
        url = item.web_url.as_deref().unwrap_or("-"),
        "upload successful"
    );
    Ok(item)
}

/// Builds the SSH target; flags override `[ssh]` values.
fn ssh_target(
    cli: &Cli,
    section: &SshSection,
    timeout: std::time::Duration,
) -> anyhow::Result<SshTarget> {
    let host = cli
        .ssh_host
        .clone()
        .or_else(|| section.host.clone())
        .context("--ssh-host is required for SSH transfer")?;
    let user = cli
        .ssh_user
        .clone()
        .or_else(|| section.username.clone())
        .context("--ssh-user is required for SSH transfer")?;

    let key = cli.ssh_key.clone().or_else(|| section.key_path.clone());
    let password = cli.ssh_pass.clone().or_else(|| section.password.clone());
    let credential = match (key, password) {
        (Some(path), passphrase) => Credential::PrivateKey { path, passphrase },
        (None, Some(password)) => Credential::Password(password),
        (None, None) => anyhow::bail!("either --ssh-pass or --ssh-key is required"),
    };

    let mut target = SshTarget::new(host, user, credential);
    target.port = cli.ssh_port.unwrap_or(section.port);
    target.timeout = timeout;
    Ok(target)
}

async fn remove_file_logged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(file = %path.display(), "removed temporary archive"),
        Err(e) => warn!(file = %path.display(), error = %e, "could not remove archive"),
    }
}
