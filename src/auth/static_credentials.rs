//! Email/password provider backed by a fixed account table
use crate::auth::provider::{AuthProvider, AuthSession, Credentials};
use crate::auth::token::Token;
use crate::auth::user::{BasicUser, User};
use crate::utils::errors::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_STATIC_ID: &str = "static";

struct Account {
    password: String,
    user: BasicUser,
}

/// Static credentials (for development/simple deployments)
pub struct StaticCredentialsProvider {
    id: String,
    ttl: Duration,
    accounts: HashMap<String, Account>,
    /// refresh token -> user id
    issued: DashMap<String, String>,
}

impl StaticCredentialsProvider {
    pub fn new() -> Self {
        Self {
            id: DEFAULT_STATIC_ID.to_string(),
            ttl: Duration::hours(1),
            accounts: HashMap::new(),
            issued: DashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Add an account; the email doubles as the user id
    pub fn with_account(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        let email = email.into();
        let user = BasicUser::new(email.clone()).with_email(email.clone());
        self.accounts.insert(
            email,
            Account {
                password: password.into(),
                user,
            },
        );
        self
    }

    fn issue(&self, user_id: &str) -> Token {
        let refresh = Uuid::new_v4().to_string();
        self.issued.insert(refresh.clone(), user_id.to_string());
        Token::new(Uuid::new_v4().to_string())
            .with_refresh_token(refresh)
            .expiring_in(self.ttl)
    }
}

impl Default for StaticCredentialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for StaticCredentialsProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn login(&self, credentials: Credentials) -> AuthResult<AuthSession> {
        let email = credentials.require_str("email")?;
        let password = credentials.require_str("password")?;

        match self.accounts.get(email) {
            Some(account) if account.password == password => {
                debug!(user_id = %account.user.id, "Static credentials accepted");
                let token = self.issue(&account.user.id);
                Ok(AuthSession::new(account.user.clone().shared(), token))
            }
            _ => {
                warn!(provider_id = %self.id, "Static credentials rejected");
                Err(AuthError::credentials("invalid email or password"))
            }
        }
    }

    /// Revokes every refresh token this provider handed out
    async fn logout(&self) -> AuthResult<()> {
        self.issued.clear();
        Ok(())
    }

    async fn refresh_token(&self, current: &Token, user: &dyn User) -> AuthResult<Option<Token>> {
        let Some(refresh) = current.refresh_token.as_deref() else {
            return Ok(None);
        };

        match self.issued.remove(refresh) {
            Some((_, owner)) if owner == user.id() => Ok(Some(self.issue(&owner))),
            _ => Err(AuthError::provider("refresh token rejected")
                .with_details(serde_json::json!({ "provider_id": self.id }))),
        }
    }
}
