//! Upload error types.

use sshpoint_transfer::{PathOrigin, RetryError, TransferError};

/// Errors produced while uploading to a Graph drive.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service error {status}: {body}")]
    Service { status: u16, body: String },

    #[error("unexpected response status: {0}")]
    UnexpectedStatus(u16),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<UploadError>,
    },

    #[error("upload completed but no final response received")]
    NoFinalResponse,

    #[error("{origin} path not found: {path}")]
    NotFound { origin: PathOrigin, path: String },

    #[error("authentication failed: {0}")]
    Credential(String),

    #[error("invalid access token")]
    InvalidToken,

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

impl UploadError {
    /// Whether another attempt may succeed: transport failures and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            UploadError::Http(_) => true,
            UploadError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<RetryError<UploadError>> for UploadError {
    fn from(err: RetryError<UploadError>) -> Self {
        match err {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, last } => UploadError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = UploadError::Service {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 401, 404, 409, 416] {
            let err = UploadError::Service {
                status,
                body: String::new(),
            };
            assert!(!err.is_transient(), "{status} should not retry");
        }
        assert!(!UploadError::UnexpectedStatus(204).is_transient());
        assert!(!UploadError::NoFinalResponse.is_transient());
    }

    #[test]
    fn exhausted_retry_wraps_last_error() {
        let err: UploadError = RetryError::Exhausted {
            attempts: 3,
            last: UploadError::Service {
                status: 502,
                body: "bad gateway".into(),
            },
        }
        .into();
        match err {
            UploadError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, UploadError::Service { status: 502, .. }));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn permanent_retry_error_unwraps() {
        let err: UploadError = RetryError::Permanent(UploadError::InvalidToken).into();
        assert!(matches!(err, UploadError::InvalidToken));
    }
}
