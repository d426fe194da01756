//! [`SessionStorage`] over any [`KeyValueStore`], JSON-encoded
use crate::auth::token::Token;
use crate::auth::user::{basic_user_decoder, SharedUser, User, UserDecoder};
use crate::storage::{FileStore, KeyValueStore, MemoryStore, SessionStorage};
use crate::utils::errors::AuthResult;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_KEY_PREFIX: &str = "authkit";

pub struct KvSessionStorage<S> {
    store: S,
    decoder: UserDecoder,
    user_key: String,
    token_key: String,
    provider_key: String,
}

impl<S: KeyValueStore> KvSessionStorage<S> {
    pub fn new(store: S) -> Self {
        Self::with_prefix(store, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(store: S, prefix: &str) -> Self {
        Self {
            store,
            decoder: basic_user_decoder(),
            user_key: format!("{}.user", prefix),
            token_key: format!("{}.token", prefix),
            provider_key: format!("{}.provider_id", prefix),
        }
    }

    /// Decoder for integrator-defined user shapes
    pub fn with_user_decoder(mut self, decoder: UserDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    pub fn provider_key(&self) -> &str {
        &self.provider_key
    }

    /// Read and decode an entry; anything undecodable is deleted and treated as absent
    async fn load<T>(&self, key: &str, decode: impl FnOnce(&str) -> AuthResult<T>) -> AuthResult<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        match decode(raw.as_str()) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding corrupt storage entry");
                self.store.delete(key).await?;
                Ok(None)
            }
        }
    }
}

impl KvSessionStorage<MemoryStore> {
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl KvSessionStorage<FileStore> {
    pub fn on_disk() -> Self {
        Self::new(FileStore::default_location())
    }
}

#[async_trait]
impl<S: KeyValueStore> SessionStorage for KvSessionStorage<S> {
    async fn save_user(&self, user: &dyn User) -> AuthResult<()> {
        let encoded = serde_json::to_string(&user.to_value())?;
        self.store.set(&self.user_key, &encoded).await?;
        debug!(user_id = %user.id(), "Saved user");
        Ok(())
    }

    async fn get_user(&self) -> AuthResult<Option<SharedUser>> {
        let decoder = self.decoder.clone();
        self.load(&self.user_key, move |raw| {
            let value: Value = serde_json::from_str(raw)?;
            decoder(value)
        })
        .await
    }

    async fn clear_user(&self) -> AuthResult<()> {
        self.store.delete(&self.user_key).await?;
        Ok(())
    }

    async fn save_token(&self, token: &Token) -> AuthResult<()> {
        let encoded = serde_json::to_string(token)?;
        self.store.set(&self.token_key, &encoded).await
    }

    async fn get_token(&self) -> AuthResult<Option<Token>> {
        self.load(&self.token_key, |raw| Ok(serde_json::from_str::<Token>(raw)?))
            .await
    }

    async fn clear_token(&self) -> AuthResult<()> {
        self.store.delete(&self.token_key).await?;
        Ok(())
    }

    async fn save_provider_id(&self, provider_id: &str) -> AuthResult<()> {
        self.store.set(&self.provider_key, provider_id).await
    }

    async fn get_provider_id(&self) -> AuthResult<Option<String>> {
        Ok(self
            .store
            .get(&self.provider_key)
            .await?
            .filter(|id| !id.is_empty()))
    }

    async fn clear_provider_id(&self) -> AuthResult<()> {
        self.store.delete(&self.provider_key).await?;
        Ok(())
    }
}
