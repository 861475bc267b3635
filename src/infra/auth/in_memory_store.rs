// In-memory implementation of CredentialStore.
//
// Used when the user asks for a session that leaves nothing on disk, and by
// the tests so they never touch the filesystem.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::core::auth::{CredentialStore, Credentials, StoreError};

#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<Credentials>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: RwLock::new(credentials),
        }
    }

    /// Current contents, for inspection.
    pub fn snapshot(&self) -> Credentials {
        self.credentials
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> Result<Credentials, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        // A poisoned lock still holds a usable value; overwrite it.
        let mut slot = match self.credentials.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = credentials.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty() {
        let store = InMemoryCredentialStore::new();
        assert_eq!(store.load().await.unwrap(), Credentials::default());
    }

    #[tokio::test]
    async fn save_replaces_previous_value() {
        let store = InMemoryCredentialStore::with_credentials(Credentials {
            last_email: Some("old@example.org".into()),
            ..Default::default()
        });

        let updated = Credentials {
            last_email: Some("new@example.org".into()),
            ..Default::default()
        };
        store.save(&updated).await.unwrap();

        assert_eq!(store.snapshot(), updated);
    }
}
