// JSON document store
// One object per file inside the configured cache directory

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document name is empty")]
    EmptyName,
    #[error("failed to serialize {name}: {source}")]
    Serialize {
        name: String,
        source: serde_json::Error,
    },
    #[error("malformed {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("writes to {0} are held until the file is repaired")]
    Held(String),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Reads and writes whole JSON documents
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
    prefix: String,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.prefix, name))
    }

    /// Load a document. Missing, unreadable and malformed files all come back as `None`.
    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        match self.read(name).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring {}", e);
                None
            }
        }
    }

    /// Like `load`, but a file that exists and cannot be used is an error,
    /// so callers can tell it apart from a file that was never written.
    pub async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let path = self.path_for(name);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist yet", path.display());
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Parse { path, source })
    }

    /// Copy a document next to itself as `<file>.bak`, replacing an older backup
    pub async fn backup(&self, name: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_for(name);
        let mut backup = path.clone().into_os_string();
        backup.push(".bak");
        let backup = PathBuf::from(backup);

        tokio::fs::copy(&path, &backup)
            .await
            .map_err(|source| StoreError::Io {
                path: backup.clone(),
                source,
            })?;
        Ok(backup)
    }

    /// Overwrite a document, creating the directory on first use
    pub async fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
            name: name.to_string(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(name);
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| StoreError::Io { path, source })?;

        debug!("Saved {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::guild::GuildConfigMap;
    use crate::utils::template::default_guild_config;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "");

        let mut configs = GuildConfigMap::new();
        configs.insert("923969098185068594".to_string(), default_guild_config());

        store.save("discord_config.json", &configs).await.unwrap();
        let loaded: GuildConfigMap = store.load("discord_config.json").await.unwrap();
        assert_eq!(loaded, configs);
    }

    #[tokio::test]
    async fn test_empty_object_is_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "");

        store.save("tips.json", &json!({})).await.unwrap();
        let loaded: Option<Value> = store.load("tips.json").await;
        assert_eq!(loaded, Some(json!({})));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "");

        let missing: Option<Value> = store.load("nope.json").await;
        assert!(missing.is_none());

        tokio::fs::write(dir.path().join("broken.json"), "{ not json").await.unwrap();
        let broken: Option<Value> = store.load("broken.json").await;
        assert!(broken.is_none());

        let unnamed: Option<Value> = store.load("").await;
        assert!(unnamed.is_none());
    }

    #[tokio::test]
    async fn test_read_tells_missing_from_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "");

        let missing: Result<Option<Value>, _> = store.read("nope.json").await;
        assert!(matches!(missing, Ok(None)));

        tokio::fs::write(dir.path().join("broken.json"), "{ not json").await.unwrap();
        let broken: Result<Option<Value>, _> = store.read("broken.json").await;
        assert!(matches!(broken, Err(StoreError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_backup_copies_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "bot_");
        tokio::fs::write(dir.path().join("bot_discord_config.json"), "{ half").await.unwrap();

        let backup = store.backup("discord_config.json").await.unwrap();

        assert_eq!(backup, dir.path().join("bot_discord_config.json.bak"));
        assert_eq!(tokio::fs::read_to_string(&backup).await.unwrap(), "{ half");
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_applies_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("json").join("shard0");
        let store = JsonStore::new(&nested, "bot_");

        store.save("tests.json", &json!({"a": 1})).await.unwrap();
        assert!(nested.join("bot_tests.json").exists());
    }

    #[tokio::test]
    async fn test_save_failure_is_a_value() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be
        let blocker = dir.path().join("blocked");
        tokio::fs::write(&blocker, "x").await.unwrap();
        let store = JsonStore::new(&blocker, "");

        let result = store.save("tips.json", &json!({})).await;
        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert!(matches!(store.save("", &json!({})).await, Err(StoreError::EmptyName)));
    }
}
