//! Session persistence contracts and reference backends
//!
//! [`SessionStorage`] is what the engine talks to. [`KvSessionStorage`] adapts
//! any [`KeyValueStore`] (memory, files, a platform keychain) into it.

pub mod file;
pub mod kv;
pub mod memory;

pub use file::FileStore;
pub use kv::KvSessionStorage;
pub use memory::MemoryStore;

use crate::auth::token::Token;
use crate::auth::user::{SharedUser, User};
use crate::utils::errors::AuthResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Persists the current user, token and provider id.
///
/// Reads with nothing saved return `Ok(None)`. Entries that fail to decode are
/// cleared and reported as absent.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save_user(&self, user: &dyn User) -> AuthResult<()>;

    async fn get_user(&self) -> AuthResult<Option<SharedUser>>;

    async fn clear_user(&self) -> AuthResult<()>;

    async fn save_token(&self, token: &Token) -> AuthResult<()>;

    async fn get_token(&self) -> AuthResult<Option<Token>>;

    async fn clear_token(&self) -> AuthResult<()>;

    async fn save_provider_id(&self, _provider_id: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn get_provider_id(&self) -> AuthResult<Option<String>> {
        Ok(None)
    }

    async fn clear_provider_id(&self) -> AuthResult<()> {
        Ok(())
    }

    async fn clear_all(&self) -> AuthResult<()> {
        self.clear_token().await?;
        self.clear_user().await?;
        self.clear_provider_id().await
    }
}

pub type SharedStorage = Arc<dyn SessionStorage>;

/// Raw string key-value backend
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> AuthResult<()>;

    /// Returns whether something was removed
    async fn delete(&self, key: &str) -> AuthResult<bool>;

    async fn has(&self, key: &str) -> AuthResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
