// Configuration for the Docs bridge.
//
// Everything comes from environment variables (optionally loaded from a
// `.env` file in `main`). `from_lookup` takes the variable source as a
// closure so tests never have to touch the process environment.
//
// **Environment Variables:**
// - `GOOGLE_DOCS_CLIENT_ID` - OAuth client id (required)
// - `GOOGLE_DOCS_CALLBACK_URL` - OAuth redirect URI (required)
// - `GOOGLE_DOCS_API_URL` - Apps Script bridge endpoint (required)
// - `GOOGLE_DOCS_AUTHORIZE_URL` / `GOOGLE_DOCS_ACCESS_URL` - OAuth endpoints
// - `GOOGLE_DOCS_REST_URL` - Docs REST API base
// - `ZOTERO_REPOSITORY_URL` - where server faults are reported
// - `CLIENT_NAME` - product name shown in prompts
// - `GOOGLE_DOCS_DEV_MODE` - forwarded to the script as `devMode`
// - `GOOGLE_DOCS_MAX_REAUTH_RETRIES` - retries after a stale-token rejection
// - `GOOGLE_DOCS_CREDENTIALS_FILE` - where credentials are persisted

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_ACCESS_URL: &str = "https://www.googleapis.com/oauth2/v3/tokeninfo";
pub const DEFAULT_DOCS_API_URL: &str = "https://docs.googleapis.com";
pub const DEFAULT_REPOSITORY_URL: &str = "https://repo.zotero.org/repo/";
pub const DEFAULT_CREDENTIALS_PATH: &str = "data/google_docs_auth.json";

/// Version of the method-call protocol spoken by the Apps Script bridge.
pub const API_VERSION: u32 = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// OAuth2 settings used by the auth manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub callback_url: String,
    pub authorize_url: String,
    pub access_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsConfig {
    pub oauth: OAuthConfig,
    /// Apps Script endpoint receiving `callMethod` requests.
    pub script_url: String,
    /// Base of the Docs REST API (no trailing slash).
    pub docs_api_url: String,
    /// Base of the error-report endpoint (with trailing slash).
    pub repository_url: String,
    pub client_name: String,
    pub dev_mode: bool,
    pub api_version: u32,
    pub max_reauth_retries: u32,
    pub call_timeout: Option<Duration>,
    pub fetch_timeout: Duration,
    pub batch_update_timeout: Duration,
    pub credentials_path: PathBuf,
}

impl DocsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let or_default = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let dev_mode = match lookup("GOOGLE_DOCS_DEV_MODE") {
            Some(value) => value.parse::<bool>().map_err(|_| ConfigError::Invalid {
                name: "GOOGLE_DOCS_DEV_MODE",
                value,
            })?,
            None => false,
        };

        let max_reauth_retries = match lookup("GOOGLE_DOCS_MAX_REAUTH_RETRIES") {
            Some(value) => value.parse::<u32>().map_err(|_| ConfigError::Invalid {
                name: "GOOGLE_DOCS_MAX_REAUTH_RETRIES",
                value,
            })?,
            None => 1,
        };

        let mut repository_url = or_default("ZOTERO_REPOSITORY_URL", DEFAULT_REPOSITORY_URL);
        if !repository_url.ends_with('/') {
            repository_url.push('/');
        }

        Ok(Self {
            oauth: OAuthConfig {
                client_id: required("GOOGLE_DOCS_CLIENT_ID")?,
                callback_url: required("GOOGLE_DOCS_CALLBACK_URL")?,
                authorize_url: or_default("GOOGLE_DOCS_AUTHORIZE_URL", DEFAULT_AUTHORIZE_URL),
                access_url: or_default("GOOGLE_DOCS_ACCESS_URL", DEFAULT_ACCESS_URL),
            },
            script_url: required("GOOGLE_DOCS_API_URL")?,
            docs_api_url: or_default("GOOGLE_DOCS_REST_URL", DEFAULT_DOCS_API_URL)
                .trim_end_matches('/')
                .to_string(),
            repository_url,
            client_name: or_default("CLIENT_NAME", "Zotero"),
            dev_mode,
            api_version: API_VERSION,
            max_reauth_retries,
            call_timeout: None,
            fetch_timeout: Duration::from_secs(60),
            batch_update_timeout: Duration::from_secs(120),
            credentials_path: PathBuf::from(or_default(
                "GOOGLE_DOCS_CREDENTIALS_FILE",
                DEFAULT_CREDENTIALS_PATH,
            )),
        })
    }
}
