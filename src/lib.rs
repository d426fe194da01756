//! authkit: client-side authentication session orchestrator
//!
//! One [`AuthEngine`] owns the current session (status, user, token and
//! active provider id), restores it from storage on `configure`, and drives
//! login, logout and refresh through pluggable [`AuthProvider`]s. Observers
//! subscribe to state streams; side effects hang off the [`EventBus`].

pub mod auth;
pub mod config;
pub mod context;
pub mod events;
pub mod session;
pub mod storage;
pub mod utils;

pub use auth::{
    AnonymousProvider, AuthProvider, AuthSession, BasicUser, Credentials, ProviderRegistry,
    SharedProvider, SharedUser, StaticCredentialsProvider, Token, User, UserDecoder,
};
pub use config::{AuthConfig, AuthSettings};
pub use context::AuthContext;
pub use events::{AuthEvent, EventBus, EventStream, LoginEvent, LogoutEvent, TokenRefreshEvent};
pub use session::{AuthEngine, SessionState, SessionStatus, StateStream};
pub use storage::{KeyValueStore, KvSessionStorage, SessionStorage, SharedStorage};
pub use utils::errors::{AuthError, AuthErrorKind, AuthResult};

use std::sync::Arc;

/// The default engine instance; see [`AuthEngine::shared`]
pub fn engine() -> Arc<AuthEngine> {
    AuthEngine::shared()
}
