use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header set attached to every authenticated request.
pub type AuthHeaders = BTreeMap<String, String>;

/// OAuth scope the Docs integration needs. `email` lets us remember who signed in.
pub const DOCS_SCOPE: &str = "https://www.googleapis.com/auth/documents";
pub const REQUESTED_SCOPES: &str = "https://www.googleapis.com/auth/documents email";
pub const AUTH_STATE: &str = "google-docs-auth-callback";

/// Seconds shaved off the provider's `expires_in` so clock skew never lets us
/// send a token the provider already considers dead.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Cached bearer credentials. Persisted between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<AuthHeaders>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }
}

/// Why an authorization attempt failed. Cloned to every caller waiting on the
/// same pending authorization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Google Auth permission to access Google Docs not granted")]
    Denied,

    #[error("Google Auth permission to access Google Docs not granted (missing documents scope)")]
    ScopeNotGranted,

    #[error("Google Auth error: {0}")]
    Provider(String),

    #[error("Google Docs Access Token invalid {0}")]
    TokenInvalid(String),

    #[error("Google Docs authorization was cancelled")]
    Cancelled,

    #[error("Malformed authorization callback: {0}")]
    MalformedCallback(String),

    #[error("Google Docs token verification failed: {0}")]
    Verification(String),

    #[error("Could not open the authorization window: {0}")]
    Window(String),

    #[error("Invalid OAuth configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// The user never granted the Docs scope (explicit denial or unchecked box).
    pub fn is_permission_not_granted(&self) -> bool {
        matches!(self, AuthError::Denied | AuthError::ScopeNotGranted)
    }

    /// Errors the user caused themselves; show them as a plain alert, don't report.
    pub fn is_alert(&self) -> bool {
        matches!(self, AuthError::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistent key-value slot for credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Credentials, StoreError>;
    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError>;
}

/// Opaque id of a window (or browser tab) opened for the auth flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct WindowError(pub String);

/// Lifecycle events of windows opened through `BrowserWindows`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Navigated { handle: WindowHandle, url: String },
    Closed { handle: WindowHandle },
}

/// Window/tab opening capability used by the interactive auth flow and for
/// help links shown from prompts.
#[async_trait]
pub trait BrowserWindows: Send + Sync {
    async fn open_auth_window(&self, url: &str) -> Result<WindowHandle, WindowError>;
    async fn close(&self, handle: WindowHandle);
    async fn open_tab(&self, url: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn credentials_expire_strictly_after_expiry_time() {
        let now = Utc::now();
        let credentials = Credentials {
            headers: None,
            last_email: None,
            expires_at: Some(now),
        };

        assert!(!credentials.is_expired_at(now));
        assert!(credentials.is_expired_at(now + Duration::milliseconds(1)));
        assert!(!Credentials::default().is_expired_at(now));
    }

    #[test]
    fn credentials_serialize_with_camel_case_keys() {
        let mut headers = AuthHeaders::new();
        headers.insert("Authorization".into(), "Bearer t".into());
        let credentials = Credentials {
            headers: Some(headers),
            last_email: Some("a@example.org".into()),
            expires_at: None,
        };

        let json = serde_json::to_string(&credentials).unwrap();

        assert!(json.contains("\"lastEmail\""));
        assert!(!json.contains("expiresAt"));
    }

    #[test]
    fn only_denials_count_as_permission_not_granted() {
        assert!(AuthError::Denied.is_permission_not_granted());
        assert!(AuthError::ScopeNotGranted.is_permission_not_granted());
        assert!(!AuthError::Provider("server_error".into()).is_permission_not_granted());
        assert!(!AuthError::Cancelled.is_permission_not_granted());
        assert!(AuthError::Cancelled.is_alert());
    }
}
