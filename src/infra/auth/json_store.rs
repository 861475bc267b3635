use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::auth::{CredentialStore, Credentials, StoreError};

/// JSON file holding the Google Docs credentials between runs.
pub struct JsonCredentialStore {
    path: PathBuf,
}

impl JsonCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn load(&self) -> Result<Credentials, StoreError> {
        if !self.path.exists() {
            return Ok(Credentials::default());
        }

        let text = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let text = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AuthHeaders;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn missing_file_loads_as_empty_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("auth.json"));

        assert_eq!(store.load().await.unwrap(), Credentials::default());
    }

    #[tokio::test]
    async fn save_creates_parent_directories_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.json");
        let store = JsonCredentialStore::new(&path);

        let mut headers = AuthHeaders::new();
        headers.insert("Authorization".into(), "Bearer abc".into());
        let credentials = Credentials {
            headers: Some(headers),
            last_email: Some("writer@example.org".into()),
            expires_at: Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()),
        };
        store.save(&credentials).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"expiresAt\": \"2030-01-02T03:04:05"));
        assert_eq!(store.load().await.unwrap(), credentials);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonCredentialStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
