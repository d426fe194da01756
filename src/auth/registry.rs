//! Provider registry keyed by provider id

use crate::auth::provider::SharedProvider;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, SharedProvider>,
    order: Vec<String>,
}

/// Provider registry that manages all providers.
///
/// Writes take an exclusive lock, lookups share a read lock. Enumeration
/// follows first-registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: RwLock<Entries>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; the last registration for an id wins
    pub fn register(&self, provider: SharedProvider) {
        let id = provider.provider_id().to_string();
        let mut entries = self.entries.write();
        if entries.by_id.insert(id.clone(), provider).is_none() {
            entries.order.push(id.clone());
            debug!(provider_id = %id, "Registered provider");
        } else {
            debug!(provider_id = %id, "Replaced provider");
        }
    }

    pub fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        if entries.by_id.remove(id).is_some() {
            entries.order.retain(|existing| existing != id);
            debug!(provider_id = %id, "Unregistered provider");
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: &str) -> Option<SharedProvider> {
        self.entries.read().by_id.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().by_id.contains_key(id)
    }

    pub fn providers(&self) -> Vec<SharedProvider> {
        let entries = self.entries.read();
        entries
            .order
            .iter()
            .filter_map(|id| entries.by_id.get(id).cloned())
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.read().order.clone()
    }

    /// Earliest registered provider still present
    pub fn first(&self) -> Option<SharedProvider> {
        let entries = self.entries.read();
        entries
            .order
            .first()
            .and_then(|id| entries.by_id.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.by_id.clear();
        entries.order.clear();
        debug!("Cleared provider registry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::{AuthProvider, AuthSession, Credentials};
    use crate::utils::errors::{AuthError, AuthResult};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Named {
        id: String,
        tag: u32,
    }

    #[async_trait]
    impl AuthProvider for Named {
        fn provider_id(&self) -> &str {
            &self.id
        }

        async fn login(&self, _credentials: Credentials) -> AuthResult<AuthSession> {
            Err(AuthError::provider(format!("tag {}", self.tag)))
        }
    }

    fn named(id: &str, tag: u32) -> SharedProvider {
        Arc::new(Named {
            id: id.to_string(),
            tag,
        })
    }

    #[test]
    fn test_register_and_get() {
        let registry = ProviderRegistry::new();
        registry.register(named("a", 1));
        registry.register(named("b", 2));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("a"));
        assert!(registry.get("b").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.ids(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_last_writer_wins_and_keeps_position() {
        let registry = ProviderRegistry::new();
        registry.register(named("a", 1));
        registry.register(named("b", 2));
        registry.register(named("a", 3));

        assert_eq!(registry.ids(), vec!["a", "b"]);
        let err = registry
            .get("a")
            .unwrap()
            .login(Credentials::new())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "tag 3");
    }

    #[test]
    fn test_unregister_and_clear() {
        let registry = ProviderRegistry::new();
        registry.register(named("a", 1));
        registry.register(named("b", 2));

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.first().unwrap().provider_id(), "b");

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.first().is_none());
        assert!(registry.providers().is_empty());
    }
}
