//! SFTP-backed [`RemoteFs`] over a single russh session.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use russh::client;
use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ConnectionError, FetchError};
use crate::remote::RemoteFs;
use crate::types::{Credential, EntryKind, RemoteEntry, SshTarget};

/// Read buffer for file streaming.
const READ_BUF_SIZE: usize = 32 * 1024;

/// russh client handler.
struct SshHandler {
    host: String,
}

#[async_trait::async_trait]
impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // No known_hosts store: the key is accepted and its fingerprint logged.
        warn!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "accepting unverified host key"
        );
        Ok(true)
    }
}

/// Live SSH transport plus SFTP subsystem session.
pub struct SftpRemote {
    sftp: SftpSession,
    handle: Mutex<client::Handle<SshHandler>>,
}

impl SftpRemote {
    /// Connects, authenticates and opens the SFTP subsystem.
    ///
    /// The whole handshake is bounded by `target.timeout`.
    pub async fn connect(target: &SshTarget) -> Result<Self, ConnectionError> {
        let addr = target.addr();
        info!(addr = %addr, user = %target.username, "connecting via SSH");

        match tokio::time::timeout(target.timeout, establish(target)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout(target.timeout)),
        }
    }
}

async fn establish(target: &SshTarget) -> Result<SftpRemote, ConnectionError> {
    let addr = target.addr();
    let config = Arc::new(client::Config {
        inactivity_timeout: None,
        ..Default::default()
    });
    let handler = SshHandler {
        host: target.host.clone(),
    };

    let mut handle = client::connect(config, (target.host.as_str(), target.port), handler)
        .await
        .map_err(|e| classify_connect_error(e, &addr))?;
    debug!(addr = %addr, "SSH transport established");

    let authenticated = match &target.credential {
        Credential::Password(password) => handle
            .authenticate_password(&target.username, password)
            .await
            .map_err(|e| ConnectionError::Protocol(e.to_string()))?,
        Credential::PrivateKey { path, passphrase } => {
            debug!(path = %path.display(), "loading private key");
            let key = russh_keys::load_secret_key(path, passphrase.as_deref()).map_err(|e| {
                ConnectionError::Protocol(format!(
                    "failed to load private key {}: {e}",
                    path.display()
                ))
            })?;
            handle
                .authenticate_publickey(&target.username, Arc::new(key))
                .await
                .map_err(|e| ConnectionError::Protocol(e.to_string()))?
        }
    };

    if !authenticated {
        return Err(ConnectionError::AuthenticationRejected {
            username: target.username.clone(),
        });
    }

    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| ConnectionError::Protocol(format!("failed to open channel: {e}")))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| ConnectionError::Protocol(format!("sftp subsystem refused: {e}")))?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| ConnectionError::Protocol(format!("sftp handshake failed: {e}")))?;

    info!(addr = %addr, "SFTP session ready");
    Ok(SftpRemote {
        sftp,
        handle: Mutex::new(handle),
    })
}

fn classify_connect_error(err: russh::Error, addr: &str) -> ConnectionError {
    match err {
        russh::Error::IO(source) => ConnectionError::Unreachable {
            addr: addr.to_string(),
            source,
        },
        russh::Error::ConnectionTimeout => {
            ConnectionError::Protocol("connection timed out during handshake".into())
        }
        other => ConnectionError::Protocol(other.to_string()),
    }
}

fn entry_kind(attrs: &FileAttributes) -> EntryKind {
    if attrs.is_dir() {
        EntryKind::Directory
    } else if attrs.is_regular() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

fn sftp_error(path: &str, err: SftpError) -> FetchError {
    FetchError::Sftp {
        path: path.to_string(),
        message: err.to_string(),
    }
}

fn is_missing(err: &SftpError) -> bool {
    matches!(err, SftpError::Status(status) if status.status_code == StatusCode::NoSuchFile)
}

impl RemoteFs for SftpRemote {
    fn stat<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<RemoteEntry>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            match self.sftp.metadata(path).await {
                Ok(attrs) => Ok(Some(RemoteEntry {
                    name: path.to_string(),
                    kind: entry_kind(&attrs),
                    size: attrs.size.unwrap_or(0),
                })),
                Err(e) if is_missing(&e) => Ok(None),
                Err(e) => Err(sftp_error(path, e)),
            }
        })
    }

    fn list_dir<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RemoteEntry>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let dir = self
                .sftp
                .read_dir(path)
                .await
                .map_err(|e| sftp_error(path, e))?;
            Ok(dir
                .map(|entry| {
                    let attrs = entry.metadata();
                    RemoteEntry {
                        name: entry.file_name(),
                        kind: entry_kind(&attrs),
                        size: attrs.size.unwrap_or(0),
                    }
                })
                .collect())
        })
    }

    fn download<'a>(
        &'a self,
        remote: &'a str,
        local: &'a Path,
        on_progress: &'a mut (dyn FnMut(u64) + Send),
    ) -> Pin<Box<dyn Future<Output = Result<u64, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let mut src = self
                .sftp
                .open(remote)
                .await
                .map_err(|e| sftp_error(remote, e))?;
            let mut dst = tokio::fs::File::create(local).await?;

            let mut buf = vec![0u8; READ_BUF_SIZE];
            let mut transferred = 0u64;
            loop {
                let n = src.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                dst.write_all(&buf[..n]).await?;
                transferred += n as u64;
                on_progress(transferred);
            }
            dst.flush().await?;

            if let Err(e) = src.shutdown().await {
                debug!(path = remote, error = %e, "closing remote file failed");
            }
            Ok(transferred)
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Err(e) = self.sftp.close().await {
                debug!(error = %e, "SFTP session already closed");
            }
            let handle = self.handle.lock().await;
            if let Err(e) = handle
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
            {
                debug!(error = %e, "SSH transport already closed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut target = SshTarget::new("127.0.0.1", "user", Credential::Password("pw".into()));
        target.port = port;
        target.timeout = Duration::from_secs(5);

        let err = SftpRemote::connect(&target).await.err().unwrap();
        assert!(
            matches!(err, ConnectionError::Unreachable { .. }),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // Accepts TCP but never sends an SSH banner.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut target = SshTarget::new("127.0.0.1", "user", Credential::Password("pw".into()));
        target.port = port;
        target.timeout = Duration::from_millis(200);

        let err = SftpRemote::connect(&target).await.err().unwrap();
        assert!(matches!(err, ConnectionError::Timeout(_)), "unexpected error: {err}");
    }
}
