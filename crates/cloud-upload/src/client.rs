//! HTTP transport for Graph upload sessions.
//!
//! `HttpTransport` is the seam between upload logic and the wire;
//! `GraphClient` implements it with `reqwest`.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderValue};
use sshpoint_transfer::ContentRange;
use tracing::debug;

use crate::error::UploadError;
use crate::types::HttpResponse;

/// Abstract HTTP exchange used by the uploader.
///
/// Non-2xx statuses are returned as responses, not errors; only
/// transport-level failures produce `Err`.
pub trait HttpTransport: Send + Sync {
    /// POSTs a JSON body with a bearer token.
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        bearer: &'a str,
        body: &'a serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, UploadError>> + Send + 'a>>;

    /// PUTs one chunk to a pre-authorized session URL.
    fn put_chunk<'a>(
        &'a self,
        url: &'a str,
        range: ContentRange,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, UploadError>> + Send + 'a>>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
}

impl GraphClient {
    pub fn new() -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sshpoint/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    async fn collect(resp: reqwest::Response) -> Result<HttpResponse, UploadError> {
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

impl HttpTransport for GraphClient {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        bearer: &'a str,
        body: &'a serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            let auth = HeaderValue::from_str(&format!("Bearer {bearer}"))
                .map_err(|_| UploadError::InvalidToken)?;
            debug!(url, "POST");
            let resp = self
                .http
                .post(url)
                .header(AUTHORIZATION, auth)
                .json(body)
                .send()
                .await?;
            Self::collect(resp).await
        })
    }

    fn put_chunk<'a>(
        &'a self,
        url: &'a str,
        range: ContentRange,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            debug!(range = %range, "PUT chunk");
            // Content-Length comes from the sized body.
            let resp = self
                .http
                .put(url)
                .header(CONTENT_RANGE, range.to_string())
                .body(data)
                .send()
                .await?;
            Self::collect(resp).await
        })
    }
}
