//! Cross-cutting authentication notifications
//!
//! The bus is independent from the session state channels: it carries
//! side-effect style events (audit, analytics) rather than UI state.

pub mod bus;

pub use bus::{EventBus, EventStream, Subscription};

use crate::auth::token::Token;
use crate::auth::user::SharedUser;
use crate::utils::errors::AuthError;

#[derive(Debug, Clone)]
pub struct LoginEvent {
    pub user: SharedUser,
    pub token: Token,
    pub provider_id: Option<String>,
}

/// Carries the identity that was signed out, if there was one
#[derive(Debug, Clone)]
pub struct LogoutEvent {
    pub user: Option<SharedUser>,
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenRefreshEvent {
    pub new_token: Option<Token>,
    pub old_token: Option<Token>,
    pub user: SharedUser,
    pub provider_id: String,
    pub is_success: bool,
    pub error: Option<AuthError>,
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    Login(LoginEvent),
    Logout(LogoutEvent),
    TokenRefresh(TokenRefreshEvent),
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::Login(_) => "login",
            AuthEvent::Logout(_) => "logout",
            AuthEvent::TokenRefresh(_) => "token_refresh",
        }
    }
}

/// A payload type that can be picked out of an [`AuthEvent`]
pub trait EventVariant: Clone + Send + Sync + 'static {
    fn from_event(event: &AuthEvent) -> Option<&Self>;
}

impl EventVariant for LoginEvent {
    fn from_event(event: &AuthEvent) -> Option<&Self> {
        match event {
            AuthEvent::Login(e) => Some(e),
            _ => None,
        }
    }
}

impl EventVariant for LogoutEvent {
    fn from_event(event: &AuthEvent) -> Option<&Self> {
        match event {
            AuthEvent::Logout(e) => Some(e),
            _ => None,
        }
    }
}

impl EventVariant for TokenRefreshEvent {
    fn from_event(event: &AuthEvent) -> Option<&Self> {
        match event {
            AuthEvent::TokenRefresh(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LoginEvent> for AuthEvent {
    fn from(e: LoginEvent) -> Self {
        AuthEvent::Login(e)
    }
}

impl From<LogoutEvent> for AuthEvent {
    fn from(e: LogoutEvent) -> Self {
        AuthEvent::Logout(e)
    }
}

impl From<TokenRefreshEvent> for AuthEvent {
    fn from(e: TokenRefreshEvent) -> Self {
        AuthEvent::TokenRefresh(e)
    }
}
