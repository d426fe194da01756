use crate::auth::provider::SharedProvider;
use crate::config::types::AuthSettings;
use crate::storage::{KvSessionStorage, SharedStorage};
use std::sync::Arc;

/// Runtime configuration handed to [`AuthEngine::configure`](crate::AuthEngine::configure)
#[derive(Clone)]
pub struct AuthConfig {
    /// Registered into the engine's registry when the config is applied
    pub providers: Vec<SharedProvider>,
    pub default_provider_id: Option<String>,
    pub storage: SharedStorage,
    pub auto_refresh_on_expiry: bool,
}

impl AuthConfig {
    /// Disk-backed storage, no providers, auto-refresh on
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            default_provider_id: None,
            storage: Arc::new(KvSessionStorage::on_disk()),
            auto_refresh_on_expiry: true,
        }
    }

    pub fn from_settings(settings: &AuthSettings, providers: Vec<SharedProvider>) -> Self {
        Self {
            providers,
            default_provider_id: settings.default_provider_id.clone(),
            storage: settings.storage.build(),
            auto_refresh_on_expiry: settings.auto_refresh_on_expiry,
        }
    }

    pub fn with_provider(mut self, provider: SharedProvider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_default_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.default_provider_id = Some(provider_id.into());
        self
    }

    pub fn with_storage(mut self, storage: SharedStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh_on_expiry = enabled;
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.providers.iter().map(|p| p.provider_id()).collect();
        f.debug_struct("AuthConfig")
            .field("providers", &ids)
            .field("default_provider_id", &self.default_provider_id)
            .field("auto_refresh_on_expiry", &self.auto_refresh_on_expiry)
            .finish_non_exhaustive()
    }
}
