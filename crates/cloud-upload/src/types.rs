use serde::{Deserialize, Serialize};
use sshpoint_transfer::{DEFAULT_CHUNK_SIZE, RetryPolicy};

/// Microsoft Graph v1.0 endpoint.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Which drive uploads land in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    pub site_id: Option<String>,
    pub drive_id: Option<String>,
}

impl GraphConfig {
    /// Targets a specific site and drive; empty ids fall back to the default drive.
    pub fn new(site_id: impl Into<String>, drive_id: impl Into<String>) -> Self {
        let non_empty = |s: String| (!s.trim().is_empty()).then_some(s);
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            site_id: non_empty(site_id.into()),
            drive_id: non_empty(drive_id.into()),
        }
    }

    /// Overrides the API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            site_id: None,
            drive_id: None,
        }
    }
}

/// Resumption state persisted next to the file being uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadState {
    pub upload_url: String,
    /// Bytes acknowledged by the remote session.
    pub offset: u64,
}

/// Metadata of the drive item created by a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct UploadedItem {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "webUrl")]
    pub web_url: Option<String>,
}

/// Tunables for [`ResumableUploader`](crate::ResumableUploader).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    /// Bytes per chunk PUT.
    pub chunk_size: usize,
    /// Policy for chunk PUTs.
    pub chunk_retry: RetryPolicy,
    /// Policy for session creation and token requests.
    pub api_retry: RetryPolicy,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_retry: RetryPolicy::default(),
            api_retry: RetryPolicy::api_default(),
        }
    }
}

/// Status and body of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error reports.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
