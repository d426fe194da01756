//! Registry and event bus bundle injected into engines
//!
//! Applications normally share one process-wide context. Isolation mode makes
//! every `shared()` call build a fresh one instead, which keeps automated
//! tests from leaking providers, events or sessions into each other.

use crate::auth::registry::ProviderRegistry;
use crate::events::EventBus;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

static ISOLATED: AtomicBool = AtomicBool::new(false);

static SHARED: Lazy<AuthContext> = Lazy::new(AuthContext::new);

/// Toggle isolation mode for `shared()` constructors
pub fn set_isolation(enabled: bool) {
    ISOLATED.store(enabled, Ordering::SeqCst);
    info!(enabled, "Auth context isolation mode changed");
}

pub fn is_isolated() -> bool {
    ISOLATED.load(Ordering::SeqCst)
}

#[derive(Clone, Default)]
pub struct AuthContext {
    registry: Arc<ProviderRegistry>,
    events: Arc<EventBus>,
}

impl AuthContext {
    /// Fresh registry and bus, unrelated to the process-wide pair
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(registry: Arc<ProviderRegistry>, events: Arc<EventBus>) -> Self {
        Self { registry, events }
    }

    /// The process-wide context, or a fresh one in isolation mode
    pub fn shared() -> Self {
        if is_isolated() {
            Self::new()
        } else {
            SHARED.clone()
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }
}
