//! Access tokens for Graph calls.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::UploadError;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Supplies bearer tokens for session creation.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String, UploadError>> + Send + '_>>;
}

/// `.default` scope for a resource host, e.g. `graph.microsoft.com`.
pub fn default_scope(host: &str) -> String {
    format!("https://{}/.default", host.trim_end_matches('/'))
}

/// OAuth2 client-credentials flow against Microsoft identity.
pub struct ClientCredentials {
    http: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ClientCredentials {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
        })
    }

    /// Sets a custom authority host (for testing).
    #[cfg(test)]
    pub(crate) fn with_authority(mut self, url: String) -> Self {
        self.authority = url;
        self
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }

    async fn request_token(&self) -> Result<String, UploadError> {
        let url = self.token_url();
        debug!(url = %url, client_id = %self.client_id, "requesting token");

        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;

        if status >= 500 {
            return Err(UploadError::Service {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&body)?;
        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                info!(tenant = %self.tenant_id, "access token acquired");
                Ok(token)
            }
            _ => Err(UploadError::Credential(format!(
                "{} - {}",
                parsed.error.as_deref().unwrap_or("unknown_error"),
                parsed
                    .error_description
                    .as_deref()
                    .unwrap_or("No error description provided.")
            ))),
        }
    }
}

impl TokenProvider for ClientCredentials {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String, UploadError>> + Send + '_>> {
        Box::pin(self.request_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn mock_server(
        status: u16,
        body: &str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).await.unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]).into_owned();

            let resp = format!(
                "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
            request
        });

        (url, handle)
    }

    fn credentials(authority: String) -> ClientCredentials {
        ClientCredentials::new("tenant-1", "client-1", "s3cret", default_scope("graph.microsoft.com"))
            .unwrap()
            .with_authority(authority)
    }

    #[test]
    fn scope_from_host() {
        assert_eq!(
            default_scope("contoso.sharepoint.com"),
            "https://contoso.sharepoint.com/.default"
        );
    }

    #[test]
    fn token_url_includes_tenant() {
        let creds = credentials("https://login.example".into());
        assert_eq!(
            creds.token_url(),
            "https://login.example/tenant-1/oauth2/v2.0/token"
        );
    }

    #[tokio::test]
    async fn returns_access_token() {
        let (url, handle) = mock_server(
            200,
            r#"{"token_type":"Bearer","expires_in":3599,"access_token":"eyJ0eXAi"}"#,
        )
        .await;

        let token = credentials(url).access_token().await.unwrap();
        assert_eq!(token, "eyJ0eXAi");

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /tenant-1/oauth2/v2.0/token"));
    }

    #[tokio::test]
    async fn surfaces_error_description() {
        let (url, handle) = mock_server(
            401,
            r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret."}"#,
        )
        .await;

        let err = credentials(url).access_token().await.unwrap_err();
        match &err {
            UploadError::Credential(msg) => {
                assert!(msg.contains("invalid_client"));
                assert!(msg.contains("AADSTS7000215"));
            }
            other => panic!("unexpected: {other}"),
        }
        assert!(!err.is_transient());
        handle.abort();
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let (url, handle) = mock_server(503, "unavailable").await;
        let err = credentials(url).access_token().await.unwrap_err();
        assert!(err.is_transient());
        handle.abort();
    }
}
