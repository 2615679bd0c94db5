//! Resumable chunked upload driver.
//!
//! One file at a time: allocate (or resume) an upload session, stream
//! fixed-size chunks in offset order and persist the acknowledged offset
//! after every accepted chunk.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use sshpoint_transfer::{
    ChunkReader, ContentRange, PathOrigin, ProgressSink, Sleeper, TokioSleeper,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::client::HttpTransport;
use crate::endpoint;
use crate::error::UploadError;
use crate::state::StateFile;
use crate::types::{GraphConfig, HttpResponse, UploadSettings, UploadState, UploadedItem};

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
}

/// Uploads local files into a Graph drive through upload sessions.
pub struct ResumableUploader {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    graph: GraphConfig,
    progress: Arc<dyn ProgressSink>,
    sleeper: Arc<dyn Sleeper>,
    settings: UploadSettings,
    token: OnceCell<String>,
}

impl ResumableUploader {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenProvider>,
        graph: GraphConfig,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            transport,
            tokens,
            graph,
            progress,
            sleeper: Arc::new(TokioSleeper),
            settings: UploadSettings::default(),
            token: OnceCell::new(),
        }
    }

    pub fn with_settings(mut self, settings: UploadSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Bearer token, acquired on first use and reused afterwards.
    async fn bearer(&self) -> Result<&str, UploadError> {
        let tokens = &self.tokens;
        let token = self
            .token
            .get_or_try_init(|| async move {
                self.settings
                    .api_retry
                    .run(self.sleeper.as_ref(), UploadError::is_transient, move |_| {
                        tokens.access_token()
                    })
                    .await
                    .map_err(UploadError::from)
            })
            .await?;
        Ok(token.as_str())
    }

    /// Allocates an upload session for `local_file` under `remote_folder`.
    ///
    /// Returns the pre-authorized session URL.
    pub async fn create_upload_session(
        &self,
        local_file: &Path,
        remote_folder: &str,
    ) -> Result<String, UploadError> {
        let file_name = file_name_of(local_file)?;
        let item = endpoint::item_path(remote_folder, &file_name);
        let url = endpoint::create_session_url(&self.graph, &item);
        let token = self.bearer().await?;
        let body = serde_json::json!({
            "item": { "@microsoft.graph.conflictBehavior": "replace" }
        });

        let transport = &self.transport;
        let (url_ref, body_ref) = (url.as_str(), &body);
        let resp = self
            .settings
            .api_retry
            .run(self.sleeper.as_ref(), UploadError::is_transient, move |_| async move {
                let resp = transport.post_json(url_ref, token, body_ref).await?;
                if resp.is_success() {
                    Ok(resp)
                } else {
                    Err(UploadError::Service {
                        status: resp.status,
                        body: resp.text(),
                    })
                }
            })
            .await?;

        let session: SessionResponse = serde_json::from_slice(&resp.body)?;
        info!(item = %item, "upload session created");
        Ok(session.upload_url)
    }

    /// Uploads `local_file`, resuming from its sidecar when one is valid.
    pub async fn upload_file(
        &self,
        local_file: &Path,
        remote_folder: &str,
    ) -> Result<UploadedItem, UploadError> {
        let total = match tokio::fs::metadata(local_file).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(local_not_found(local_file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(local_not_found(local_file));
            }
            Err(e) => return Err(e.into()),
        };
        let file_name = file_name_of(local_file)?;
        let state_file = StateFile::for_file(local_file);

        let (upload_url, mut offset) = match state_file.load().await {
            Some(state) if state.offset < total => {
                info!(file = %file_name, offset = state.offset, total, "resuming upload");
                (state.upload_url, state.offset)
            }
            Some(state) => {
                warn!(
                    file = %file_name,
                    offset = state.offset,
                    total,
                    "saved offset is past the resumable range, starting fresh"
                );
                self.start_session(local_file, remote_folder, &state_file)
                    .await?
            }
            None => {
                self.start_session(local_file, remote_folder, &state_file)
                    .await?
            }
        };

        let task = self.progress.add_task(&file_name, total);
        if offset > 0 {
            self.progress.update_task(task, offset);
        }

        let mut reader = ChunkReader::open(local_file, self.settings.chunk_size).await?;
        reader.seek_to(offset).await?;

        while let Some(chunk) = reader.next_chunk().await? {
            let len = chunk.len() as u64;
            let range = chunk.content_range(total);
            let resp = self.upload_chunk(&upload_url, range, chunk.data).await?;

            match resp.status {
                200 | 201 => {
                    state_file.clear().await?;
                    self.progress.update_task(task, len);
                    self.progress.complete_task(task);
                    let item = parse_item(&resp, &file_name, total);
                    info!(name = %item.name, id = %item.id, size = item.size, "upload complete");
                    return Ok(item);
                }
                202 => {
                    offset += len;
                    state_file
                        .save(&UploadState {
                            upload_url: upload_url.clone(),
                            offset,
                        })
                        .await?;
                    self.progress.update_task(task, len);
                }
                status => return Err(UploadError::UnexpectedStatus(status)),
            }
        }

        Err(UploadError::NoFinalResponse)
    }

    async fn start_session(
        &self,
        local_file: &Path,
        remote_folder: &str,
        state_file: &StateFile,
    ) -> Result<(String, u64), UploadError> {
        let upload_url = self.create_upload_session(local_file, remote_folder).await?;
        state_file
            .save(&UploadState {
                upload_url: upload_url.clone(),
                offset: 0,
            })
            .await?;
        Ok((upload_url, 0))
    }

    /// PUTs one chunk under the chunk retry policy.
    ///
    /// 200/201/202 and other non-error statuses are returned; 4xx fails at
    /// once, 5xx and transport errors are retried.
    async fn upload_chunk(
        &self,
        upload_url: &str,
        range: ContentRange,
        data: Vec<u8>,
    ) -> Result<HttpResponse, UploadError> {
        debug!(range = %range, "uploading chunk");
        let transport = &self.transport;
        let resp = self
            .settings
            .chunk_retry
            .run(self.sleeper.as_ref(), UploadError::is_transient, move |_| {
                let data = data.clone();
                async move {
                    let resp = transport.put_chunk(upload_url, range, data).await?;
                    if resp.status >= 400 {
                        return Err(UploadError::Service {
                            status: resp.status,
                            body: resp.text(),
                        });
                    }
                    Ok(resp)
                }
            })
            .await?;
        Ok(resp)
    }
}

fn file_name_of(path: &Path) -> Result<String, UploadError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| local_not_found(path))
}

fn local_not_found(path: &Path) -> UploadError {
    UploadError::NotFound {
        origin: PathOrigin::Local,
        path: path.display().to_string(),
    }
}

fn parse_item(resp: &HttpResponse, file_name: &str, total: u64) -> UploadedItem {
    match serde_json::from_slice(&resp.body) {
        Ok(item) => item,
        Err(e) => {
            warn!(error = %e, "could not parse uploaded item metadata");
            UploadedItem {
                name: file_name.to_string(),
                size: total,
                ..UploadedItem::default()
            }
        }
    }
}
