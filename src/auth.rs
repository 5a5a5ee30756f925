//! Bearer token cache on disk.
//!
//! The backend issues opaque bearer tokens out of band; this module only
//! loads and saves the cached value. Expiry is detected by the API layer
//! (HTTP 401), not guessed here.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Serialized shape of `token.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// File-backed token store.
#[derive(Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the cached token; `None` when the file does not exist yet.
    pub async fn load(&self) -> Result<Option<String>> {
        match fs::read(&self.path).await {
            Ok(data) => {
                let parsed: TokenFile = serde_json::from_slice(&data)
                    .with_context(|| format!("malformed token file {}", self.path.display()))?;
                Ok(Some(parsed.token))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    /// Persist a token, creating parent directories if needed.
    pub async fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(&TokenFile {
            token: token.to_string(),
        })?;
        fs::write(&self.path, data)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let store = TokenStore::new(
            std::env::temp_dir().join(format!("token-{}.json", uuid::Uuid::new_v4())),
        );
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let path = std::env::temp_dir().join(format!("token-{}.json", uuid::Uuid::new_v4()));
        let store = TokenStore::new(&path);
        store.save("tok-123").await.unwrap();
        let loaded = store.load().await.unwrap();
        let _ = fs::remove_file(&path).await;
        assert_eq!(loaded.as_deref(), Some("tok-123"));
    }
}
