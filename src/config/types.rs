use crate::auth::user::UserDecoder;
use crate::storage::kv::DEFAULT_KEY_PREFIX;
use crate::storage::{FileStore, KvSessionStorage, MemoryStore, SharedStorage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use validator::Validate;

/// File-level settings, usually read from `authkit.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct AuthSettings {
    #[validate(length(min = 1, message = "default_provider_id cannot be empty"))]
    pub default_provider_id: Option<String>,
    pub auto_refresh_on_expiry: bool,
    #[validate(nested)]
    pub storage: StorageSettings,
    pub log_level: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            default_provider_id: None,
            auto_refresh_on_expiry: true,
            storage: StorageSettings::default(),
            log_level: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Directory for the file backend; `~` and `$VARS` are expanded
    pub path: Option<String>,
    #[validate(length(min = 1, message = "key_prefix cannot be empty"))]
    pub key_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

impl StorageSettings {
    /// Directory the file backend writes to
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            // Unset variables leave the path as-is apart from `~`
            Some(path) => match shellexpand::full(path) {
                Ok(expanded) => PathBuf::from(expanded.into_owned()),
                Err(_) => PathBuf::from(shellexpand::tilde(path).into_owned()),
            },
            None => FileStore::default_location().dir().to_path_buf(),
        }
    }

    pub fn build(&self) -> SharedStorage {
        self.build_with_decoder(None)
    }

    /// Storage for these settings, decoding users with `decoder` when given
    pub fn build_with_decoder(&self, decoder: Option<UserDecoder>) -> SharedStorage {
        match self.backend {
            StorageBackend::File => {
                let store = FileStore::new(self.resolved_path());
                let storage = KvSessionStorage::with_prefix(store, &self.key_prefix);
                match decoder {
                    Some(decoder) => Arc::new(storage.with_user_decoder(decoder)),
                    None => Arc::new(storage),
                }
            }
            StorageBackend::Memory => {
                let storage = KvSessionStorage::with_prefix(MemoryStore::new(), &self.key_prefix);
                match decoder {
                    Some(decoder) => Arc::new(storage.with_user_decoder(decoder)),
                    None => Arc::new(storage),
                }
            }
        }
    }
}
