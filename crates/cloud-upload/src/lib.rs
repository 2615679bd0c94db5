//! Resumable chunked upload to Microsoft Graph drives.
//!
//! [`ResumableUploader`] drives the upload-session protocol: it allocates
//! a session, PUTs fixed-size chunks with `Content-Range` headers, retries
//! transient failures with exponential backoff and keeps a
//! `<file>.state.json` sidecar so an interrupted upload resumes where the
//! service left off.

pub mod auth;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod state;
pub mod types;
pub mod uploader;

pub use auth::{ClientCredentials, TokenProvider, default_scope};
pub use client::{GraphClient, HttpTransport};
pub use error::UploadError;
pub use state::StateFile;
pub use types::{
    DEFAULT_GRAPH_BASE_URL, GraphConfig, HttpResponse, UploadSettings, UploadState, UploadedItem,
};
pub use uploader::ResumableUploader;
