use serde_json::Value;
use thiserror::Error;

use crate::core::auth::AuthError;
use crate::core::http::TransportError;

/// What went wrong while talking to Google Docs.
#[derive(Debug, Error)]
pub enum DocsErrorKind {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No status came back. Propagated unchanged for outer-layer logging.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The script ran and returned a structured `error`.
    #[error("{message}")]
    RemoteMethod {
        message: String,
        error_type: String,
        stack: Option<Value>,
    },

    #[error("The document is locked by another editing session")]
    LockedDocument,

    #[error("The signed-in Google account cannot access this document")]
    WrongAccount,

    #[error("Google Auth permission to access Google Docs not granted")]
    PermissionNotGranted,

    /// 5xx from the REST API; reported to the repository before surfacing.
    #[error("{status}: Google Docs request failed.\n\n{body}")]
    ServerFault { status: u16, body: String },

    #[error("{status}: Google Docs request failed.\n\n{body}")]
    Http { status: u16, body: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed Google Docs response: {0}")]
    MalformedResponse(String),
}

/// Error returned by every Docs operation.
///
/// `already_reported` is set when the user has already been shown a prompt
/// for this failure; callers must not report it a second time.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct DocsError {
    pub kind: DocsErrorKind,
    pub already_reported: bool,
}

impl DocsError {
    pub fn new(kind: DocsErrorKind) -> Self {
        Self {
            kind,
            already_reported: false,
        }
    }

    /// The user has seen a prompt about this; upstream stays quiet.
    pub fn reported(kind: DocsErrorKind) -> Self {
        Self {
            kind,
            already_reported: true,
        }
    }

    /// A 5xx from the REST API. Callers may fall back to the script bridge.
    pub fn is_server_fault(&self) -> bool {
        matches!(self.kind, DocsErrorKind::ServerFault { .. })
    }

    /// Cancelled authorization. Shown as a plain alert, not an error report.
    pub fn is_alert(&self) -> bool {
        matches!(&self.kind, DocsErrorKind::Auth(e) if e.is_alert())
    }
}

impl From<DocsErrorKind> for DocsError {
    fn from(kind: DocsErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<AuthError> for DocsError {
    fn from(e: AuthError) -> Self {
        Self::new(e.into())
    }
}

impl From<TransportError> for DocsError {
    fn from(e: TransportError) -> Self {
        Self::new(e.into())
    }
}

impl From<serde_json::Error> for DocsError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_carry_status_and_body() {
        let err = DocsError::new(DocsErrorKind::Http {
            status: 502,
            body: "Bad Gateway".into(),
        });

        assert_eq!(
            err.to_string(),
            "502: Google Docs request failed.\n\nBad Gateway"
        );
        assert!(!err.already_reported);
        assert!(!err.is_server_fault());
    }

    #[test]
    fn transport_errors_keep_their_message() {
        let err: DocsError = TransportError::Network("connection reset".into()).into();

        assert_eq!(err.to_string(), "Network error: connection reset");
        assert!(matches!(err.kind, DocsErrorKind::Transport(_)));
    }

    #[test]
    fn cancelled_auth_is_an_alert() {
        let err: DocsError = AuthError::Cancelled.into();
        assert!(err.is_alert());

        let err = DocsError::reported(DocsErrorKind::WrongAccount);
        assert!(err.already_reported);
        assert!(!err.is_alert());
    }
}
