//! Application configuration.
//!
//! Stored as TOML (`sshpoint.toml` by default) with three sections:
//! `[graph]` for the SharePoint tenant and drive, `[ssh]` for fallback
//! connection settings and `[upload]` for the destination folder.
//! Environment variables override the `[graph]` section when the full set
//! of required ones is present.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sshpoint_cloud_upload::{ClientCredentials, GraphConfig, default_scope};
use sshpoint_remote_fetch::types::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_SSH_PORT};
use sshpoint_transfer::DEFAULT_CHUNK_SIZE;

/// Environment variables that must all be set to take over `[graph]`.
const REQUIRED_ENV: [&str; 5] = ["TENANT_ID", "CLIENT_ID", "CLIENT_SECRET", "SITE_ID", "DRIVE_ID"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub graph: GraphSection,

    #[serde(default)]
    pub ssh: SshSection,

    #[serde(default)]
    pub upload: UploadSection,
}

/// Microsoft Graph tenant and target drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSection {
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub site_id: String,

    #[serde(default)]
    pub drive_id: String,

    /// Resource host used to derive the token scope.
    #[serde(default = "default_host")]
    pub host: String,

    /// Explicit token scope; derived from `host` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Fallback SSH settings; command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,

    /// Connection and handshake timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSection {
    /// Destination folder inside the drive ("" is the root).
    #[serde(default)]
    pub folder: String,

    /// Upload chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_host() -> String {
    "graph.microsoft.com".into()
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            site_id: String::new(),
            drive_id: String::new(),
            host: default_host(),
            scope: None,
        }
    }
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            host: None,
            port: default_ssh_port(),
            username: None,
            password: None,
            key_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            folder: String::new(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl AppConfig {
    /// Template written when no configuration file exists.
    pub fn template() -> Self {
        Self {
            graph: GraphSection {
                tenant_id: "your-tenant-id-here".into(),
                client_id: "your-client-id-here".into(),
                client_secret: "your-client-secret-here".into(),
                site_id: "your-site-id-here".into(),
                drive_id: "your-drive-id-here".into(),
                ..GraphSection::default()
            },
            ..Self::default()
        }
    }

    /// Loads `path`, writing the template there first if it does not exist.
    ///
    /// Environment overrides are applied afterwards.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: AppConfig = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            config
        } else {
            let config = Self::template();
            config.save(path)?;
            tracing::warn!(
                path = %path.display(),
                "configuration file not found, wrote a template; fill in your Graph credentials"
            );
            config
        };

        if config.apply_env(|key| std::env::var(key).ok()) {
            tracing::info!("using Graph settings from environment");
        }
        for field in config.placeholder_fields() {
            tracing::warn!(field, "configuration still contains a placeholder value");
        }
        Ok(config)
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Holds a client secret.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Replaces `[graph]` from `lookup` when every required variable is set.
    ///
    /// Returns whether the override was applied.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if !REQUIRED_ENV.iter().all(|key| get(key).is_some()) {
            return false;
        }

        let required = |key: &str| get(key).unwrap_or_default();
        self.graph = GraphSection {
            tenant_id: required("TENANT_ID"),
            client_id: required("CLIENT_ID"),
            client_secret: required("CLIENT_SECRET"),
            site_id: required("SITE_ID"),
            drive_id: required("DRIVE_ID"),
            host: get("SHAREPOINT_HOST").unwrap_or_else(default_host),
            scope: get("SCOPES"),
        };
        true
    }

    /// Names of `[graph]` fields that still hold template values.
    pub fn placeholder_fields(&self) -> Vec<&'static str> {
        let g = &self.graph;
        [
            ("tenant_id", &g.tenant_id),
            ("client_id", &g.client_id),
            ("client_secret", &g.client_secret),
            ("site_id", &g.site_id),
            ("drive_id", &g.drive_id),
        ]
        .into_iter()
        .filter(|(_, value)| is_placeholder(value))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig::new(self.graph.site_id.clone(), self.graph.drive_id.clone())
    }

    pub fn token_scope(&self) -> String {
        self.graph
            .scope
            .clone()
            .unwrap_or_else(|| default_scope(&self.graph.host))
    }

    /// Client-credentials provider for the configured tenant.
    pub fn credentials(&self) -> anyhow::Result<ClientCredentials> {
        let g = &self.graph;
        if g.tenant_id.is_empty() || g.client_id.is_empty() || g.client_secret.is_empty() {
            anyhow::bail!("Graph credentials are incomplete: set tenant_id, client_id and client_secret");
        }
        Ok(ClientCredentials::new(
            g.tenant_id.clone(),
            g.client_id.clone(),
            g.client_secret.clone(),
            self.token_scope(),
        )?)
    }

    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.timeout_secs)
    }
}

fn is_placeholder(value: &str) -> bool {
    value.starts_with("your-") && value.ends_with("-here")
}
