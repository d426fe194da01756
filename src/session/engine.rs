//! Session orchestration engine
//!
//! Owns the authoritative [`SessionState`] and runs the restore, login,
//! logout and refresh protocols against the configured providers and storage.
//!
//! ## State Diagram
//!
//! ```text
//!  * --configure--> Loading --(restore ok)--------------------> Authenticated
//!  * --configure--> Loading --(absent / expired / rejected)---> Unauthenticated
//!  Unauthenticated|Authenticated --login--> Loading --ok-----> Authenticated
//!                                            Loading --error--> Unauthenticated
//!  Authenticated --logout--> Loading --> Unauthenticated
//!  Authenticated --refresh_session--> Authenticated   (never via Loading)
//! ```
//!
//! Mutating operations are serialized per engine: a second `login` issued
//! while the first is in flight waits, then runs against whatever state the
//! first one left behind.

use crate::auth::provider::{AuthSession, Credentials, SharedProvider};
use crate::auth::registry::ProviderRegistry;
use crate::auth::token::Token;
use crate::auth::user::SharedUser;
use crate::config::AuthConfig;
use crate::context::{self, AuthContext};
use crate::events::{EventBus, LoginEvent, LogoutEvent, TokenRefreshEvent};
use crate::session::state::{SessionCell, SessionState, SessionStatus, StateStream};
use crate::storage::SharedStorage;
use crate::utils::errors::{AuthError, AuthResult};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const REFRESH_UNAVAILABLE: &str = "refresh not supported or failed";

static SHARED_ENGINE: Lazy<Arc<AuthEngine>> =
    Lazy::new(|| Arc::new(AuthEngine::new(AuthContext::shared())));

/// The parts of [`AuthConfig`] the engine keeps between operations
#[derive(Clone)]
struct Policy {
    storage: Option<SharedStorage>,
    default_provider_id: Option<String>,
    auto_refresh_on_expiry: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            storage: None,
            default_provider_id: None,
            auto_refresh_on_expiry: true,
        }
    }
}

pub struct AuthEngine {
    context: AuthContext,
    cell: Arc<SessionCell>,
    policy: RwLock<Policy>,
    op_lock: Mutex<()>,
}

impl AuthEngine {
    /// Unconfigured engine; status is `Loading` until [`configure`](Self::configure) runs
    pub fn new(context: AuthContext) -> Self {
        Self {
            context,
            cell: SessionCell::new(SessionState::Loading),
            policy: RwLock::new(Policy::default()),
            op_lock: Mutex::new(()),
        }
    }

    /// Process-wide engine, or a fresh one in isolation mode
    pub fn shared() -> Arc<AuthEngine> {
        if context::is_isolated() {
            Arc::new(AuthEngine::new(AuthContext::new()))
        } else {
            SHARED_ENGINE.clone()
        }
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.context.registry()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.context.events()
    }

    // Synchronous accessors. Each reads one settled snapshot.

    pub fn snapshot(&self) -> SessionState {
        self.cell.snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.cell.snapshot().status()
    }

    pub fn current_user(&self) -> Option<SharedUser> {
        self.cell.snapshot().user()
    }

    pub fn current_token(&self) -> Option<Token> {
        self.cell.snapshot().token()
    }

    pub fn current_provider_id(&self) -> Option<String> {
        self.cell.snapshot().provider_id()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell.snapshot().is_authenticated()
    }

    // Observable channels. Each replays the current value first.

    pub fn status_stream(&self) -> StateStream<SessionStatus> {
        self.cell.stream(SessionState::status)
    }

    pub fn user_stream(&self) -> StateStream<Option<SharedUser>> {
        self.cell.stream(SessionState::user)
    }

    pub fn token_stream(&self) -> StateStream<Option<Token>> {
        self.cell.stream(SessionState::token)
    }

    pub fn provider_stream(&self) -> StateStream<Option<String>> {
        self.cell.stream(SessionState::provider_id)
    }

    /// Whole snapshots, for observers that need several fields together
    pub fn session_stream(&self) -> StateStream<SessionState> {
        self.cell.stream(SessionState::clone)
    }

    /// Apply `config` and restore the persisted session.
    ///
    /// May be called again to swap providers or storage; restore then runs
    /// against the new configuration.
    pub async fn configure(&self, config: AuthConfig) -> AuthResult<()> {
        let _guard = self.op_lock.lock().await;

        for provider in &config.providers {
            self.registry().register(provider.clone());
        }
        *self.policy.write() = Policy {
            storage: Some(config.storage.clone()),
            default_provider_id: config.default_provider_id.clone(),
            auto_refresh_on_expiry: config.auto_refresh_on_expiry,
        };
        info!(
            providers = config.providers.len(),
            default_provider = ?config.default_provider_id,
            auto_refresh = config.auto_refresh_on_expiry,
            "Auth engine configured"
        );

        let active_provider = self.cell.snapshot().provider_id();
        self.cell.publish(SessionState::Loading);
        self.restore(active_provider).await
    }

    /// Log in with the default provider, else the active one, else the first registered.
    ///
    /// A configured default is used as-is: if it is not registered the login
    /// fails with a `Provider` error instead of falling back.
    pub async fn login(&self, credentials: Credentials) -> AuthResult<AuthSession> {
        let _guard = self.op_lock.lock().await;
        let provider_id = self
            .resolve_login_provider()
            .ok_or_else(|| AuthError::provider("no provider available for login"))?;
        self.login_locked(&provider_id, credentials).await
    }

    pub async fn login_with_provider(
        &self,
        provider_id: &str,
        credentials: Credentials,
    ) -> AuthResult<AuthSession> {
        let _guard = self.op_lock.lock().await;
        self.login_locked(provider_id, credentials).await
    }

    /// Adopt a session obtained elsewhere.
    ///
    /// Persistence is best effort: a storage failure is logged and the
    /// in-memory session stays authoritative.
    pub async fn set_session(&self, user: SharedUser, token: Token, provider_id: Option<String>) {
        let _guard = self.op_lock.lock().await;
        self.apply_session(user, token, provider_id).await;
    }

    /// Sign out locally, whatever the provider or storage say.
    ///
    /// Provider logout failures are logged and ignored. A storage failure is
    /// returned after the local session has already been cleared.
    pub async fn logout(&self) -> AuthResult<()> {
        let _guard = self.op_lock.lock().await;

        let previous = self.cell.snapshot();
        let user = previous.user();
        let provider_id = previous.provider_id();
        self.cell.publish(SessionState::Loading);

        if let Some(provider) = provider_id.as_deref().and_then(|id| self.registry().get(id)) {
            if let Err(e) = provider.logout().await {
                warn!(provider_id = ?provider_id, error = %e, "Provider logout failed; clearing local session anyway");
            }
        }

        let cleared = match self.storage() {
            Some(storage) => storage.clear_all().await,
            None => Ok(()),
        };
        if let Err(e) = &cleared {
            warn!(error = %e, "Failed to clear stored session on logout");
        }

        info!(user_id = ?user.as_ref().map(|u| u.id().to_string()), "Logged out");
        self.events().dispatch(LogoutEvent { user, provider_id });
        self.cell.publish(SessionState::Unauthenticated);
        cleared
    }

    /// Ask the active provider for a new token.
    ///
    /// `Ok(None)` means the provider could not or would not refresh; the
    /// session is left as it was and a failed `TokenRefresh` event is published.
    pub async fn refresh_session(&self) -> AuthResult<Option<Token>> {
        let _guard = self.op_lock.lock().await;

        let SessionState::Authenticated {
            user,
            token,
            provider_id: Some(provider_id),
        } = self.cell.snapshot()
        else {
            return Err(AuthError::custom("no active session"));
        };

        let provider = self
            .registry()
            .get(&provider_id)
            .ok_or_else(|| AuthError::provider_not_found(&provider_id))?;

        let outcome = provider.refresh_token(&token, user.as_ref()).await;
        match outcome {
            Ok(Some(new_token)) => {
                info!(provider_id = %provider_id, "Token refreshed");
                self.apply_session(user.clone(), new_token.clone(), Some(provider_id.clone()))
                    .await;
                self.events()
                    .dispatch(refresh_success(&user, &provider_id, token, new_token.clone()));
                Ok(Some(new_token))
            }
            Ok(None) => {
                debug!(provider_id = %provider_id, "Provider produced no token on refresh");
                let error = AuthError::custom(REFRESH_UNAVAILABLE);
                self.events()
                    .dispatch(refresh_failure(&user, &provider_id, token, error));
                Ok(None)
            }
            Err(e) => {
                warn!(provider_id = %provider_id, error = %e, "Token refresh failed");
                self.events()
                    .dispatch(refresh_failure(&user, &provider_id, token, e.clone()));
                let message = format!("token refresh failed: {}", e.message());
                Err(AuthError::custom(message).with_cause(e))
            }
        }
    }

    /// Force `Unauthenticated` and forget all providers. Storage is left alone.
    pub async fn reset(&self) {
        let _guard = self.op_lock.lock().await;
        self.cell.publish(SessionState::Unauthenticated);
        self.registry().clear();
        info!("Auth engine reset");
    }

    fn storage(&self) -> Option<SharedStorage> {
        self.policy.read().storage.clone()
    }

    fn resolve_login_provider(&self) -> Option<String> {
        if let Some(id) = self.policy.read().default_provider_id.clone() {
            return Some(id);
        }

        let registry = self.registry();
        self.current_provider_id()
            .filter(|id| registry.contains(id))
            .or_else(|| registry.first().map(|p| p.provider_id().to_string()))
    }

    /// Caller holds `op_lock`
    async fn login_locked(&self, provider_id: &str, credentials: Credentials) -> AuthResult<AuthSession> {
        self.cell.publish(SessionState::Loading);

        let Some(provider) = self.registry().get(provider_id) else {
            warn!(provider_id = %provider_id, "Login requested for unknown provider");
            self.cell.publish(SessionState::Unauthenticated);
            return Err(AuthError::provider_not_found(provider_id));
        };

        match provider.login(credentials).await {
            Ok(session) => {
                info!(provider_id = %provider_id, user_id = %session.user.id(), "Login succeeded");
                self.apply_session(
                    session.user.clone(),
                    session.token.clone(),
                    Some(provider_id.to_string()),
                )
                .await;
                Ok(session)
            }
            Err(e) => {
                warn!(provider_id = %provider_id, error = %e, "Login failed");
                self.cell.publish(SessionState::Unauthenticated);
                Err(e)
            }
        }
    }

    /// Provider used during restore: active, persisted, default, then first registered
    fn resolve_restore_provider(
        &self,
        active: Option<String>,
        persisted: Option<String>,
    ) -> (Option<String>, Option<SharedProvider>) {
        let registry = self.registry();
        let provider_id = active
            .or(persisted)
            .or_else(|| self.policy.read().default_provider_id.clone())
            .or_else(|| registry.first().map(|p| p.provider_id().to_string()));
        let provider = provider_id.as_deref().and_then(|id| registry.get(id));
        (provider_id, provider)
    }

    /// Set-Session: one atomic publish, then best-effort persist, then `Login`
    async fn apply_session(&self, user: SharedUser, token: Token, provider_id: Option<String>) {
        self.cell.publish(SessionState::authenticated(
            user.clone(),
            token.clone(),
            provider_id.clone(),
        ));

        if let Some(storage) = self.storage() {
            if let Err(e) = persist(&storage, &user, &token, provider_id.as_deref()).await {
                warn!(user_id = %user.id(), error = %e, "Failed to persist session; keeping in-memory session");
            }
        }

        self.events().dispatch(LoginEvent {
            user,
            token,
            provider_id,
        });
    }

    async fn restore(&self, active_provider: Option<String>) -> AuthResult<()> {
        let Some(storage) = self.storage() else {
            self.cell.publish(SessionState::Unauthenticated);
            return Ok(());
        };

        let stored = async {
            let user = storage.get_user().await?;
            let token = storage.get_token().await?;
            AuthResult::Ok((user, token))
        }
        .await;

        let (user, token) = match stored {
            Ok((Some(user), Some(token))) => (user, token),
            Ok(_) => {
                info!("No stored session to restore");
                self.cell.publish(SessionState::Unauthenticated);
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                self.cell.publish(SessionState::Unauthenticated);
                return Err(e);
            }
        };

        let persisted = storage.get_provider_id().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stored provider id");
            None
        });
        let (provider_id, provider) = self.resolve_restore_provider(active_provider, persisted);
        let auto_refresh = self.policy.read().auto_refresh_on_expiry;

        if token.is_expired() {
            let (Some(provider), true) = (provider, auto_refresh) else {
                info!(user_id = %user.id(), "Stored token expired; refresh unavailable");
                return self.discard_stored(&storage).await;
            };
            let provider_id = provider.provider_id().to_string();

            // The expired session is visible as authenticated until refresh settles
            self.cell.publish(SessionState::authenticated(
                user.clone(),
                token.clone(),
                Some(provider_id.clone()),
            ));

            let outcome = provider.refresh_token(&token, user.as_ref()).await;
            return match outcome {
                Ok(Some(new_token)) => {
                    info!(user_id = %user.id(), provider_id = %provider_id, "Refreshed expired session on restore");
                    self.apply_session(user.clone(), new_token.clone(), Some(provider_id.clone()))
                        .await;
                    self.events()
                        .dispatch(refresh_success(&user, &provider_id, token, new_token));
                    Ok(())
                }
                outcome => {
                    let error = match outcome {
                        Err(e) => e,
                        Ok(_) => AuthError::custom(REFRESH_UNAVAILABLE),
                    };
                    warn!(user_id = %user.id(), provider_id = %provider_id, error = %error, "Could not refresh expired session on restore");
                    let cleared = self.discard_stored(&storage).await;
                    self.events()
                        .dispatch(refresh_failure(&user, &provider_id, token, error));
                    cleared
                }
            };
        }

        if let Some(provider) = &provider {
            if !provider.check_session(&token, user.as_ref()).await {
                info!(user_id = %user.id(), provider_id = ?provider_id, "Provider rejected stored session");
                return self.discard_stored(&storage).await;
            }
        }

        info!(user_id = %user.id(), provider_id = ?provider_id, "Restored session");
        self.cell
            .publish(SessionState::authenticated(user, token, provider_id));
        Ok(())
    }

    /// Clear storage and go `Unauthenticated`; a clear failure is returned afterwards
    async fn discard_stored(&self, storage: &SharedStorage) -> AuthResult<()> {
        let cleared = storage.clear_all().await;
        self.cell.publish(SessionState::Unauthenticated);
        if let Err(e) = &cleared {
            warn!(error = %e, "Failed to clear stored session");
        }
        cleared
    }
}

async fn persist(
    storage: &SharedStorage,
    user: &SharedUser,
    token: &Token,
    provider_id: Option<&str>,
) -> AuthResult<()> {
    storage.save_user(user.as_ref()).await?;
    storage.save_token(token).await?;
    match provider_id {
        Some(id) => storage.save_provider_id(id).await,
        None => storage.clear_provider_id().await,
    }
}

fn refresh_success(
    user: &SharedUser,
    provider_id: &str,
    old_token: Token,
    new_token: Token,
) -> TokenRefreshEvent {
    TokenRefreshEvent {
        new_token: Some(new_token),
        old_token: Some(old_token),
        user: user.clone(),
        provider_id: provider_id.to_string(),
        is_success: true,
        error: None,
    }
}

fn refresh_failure(
    user: &SharedUser,
    provider_id: &str,
    old_token: Token,
    error: AuthError,
) -> TokenRefreshEvent {
    TokenRefreshEvent {
        new_token: None,
        old_token: Some(old_token),
        user: user.clone(),
        provider_id: provider_id.to_string(),
        is_success: false,
        error: Some(error),
    }
}
