//! Anonymous provider: no credentials, throwaway identity
use crate::auth::provider::{AuthProvider, AuthSession, Credentials};
use crate::auth::token::Token;
use crate::auth::user::{BasicUser, User};
use crate::utils::errors::AuthResult;
use async_trait::async_trait;
use chrono::Duration;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_ANONYMOUS_ID: &str = "anonymous";

/// Issues a fresh anonymous user with a seven-day token on every login
pub struct AnonymousProvider {
    id: String,
    ttl: Duration,
}

impl AnonymousProvider {
    pub fn new() -> Self {
        Self {
            id: DEFAULT_ANONYMOUS_ID.to_string(),
            ttl: Duration::days(7),
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

    fn issue(&self, refresh_token: String) -> Token {
        Token::new(Uuid::new_v4().to_string())
            .with_refresh_token(refresh_token)
            .expiring_in(self.ttl)
    }
}

impl Default for AnonymousProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for AnonymousProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn login(&self, _credentials: Credentials) -> AuthResult<AuthSession> {
        let user = BasicUser::anonymous(format!("anon-{}", Uuid::new_v4()));
        debug!(user_id = %user.id, "Issued anonymous identity");
        let token = self.issue(Uuid::new_v4().to_string());
        Ok(AuthSession::new(user.shared(), token))
    }

    /// Rotates the access token; the refresh token stays the same
    async fn refresh_token(&self, current: &Token, _user: &dyn User) -> AuthResult<Option<Token>> {
        Ok(current
            .refresh_token
            .as_ref()
            .map(|refresh| self.issue(refresh.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_issues_anonymous_user() {
        let provider = AnonymousProvider::new();
        let session = provider.login(Credentials::new()).await.unwrap();

        assert!(session.user.is_anonymous());
        assert!(session.user.id().starts_with("anon-"));
        let remaining = session.token.expires_in().unwrap();
        assert!(remaining > Duration::days(7) - Duration::minutes(1));
        assert!(remaining <= Duration::days(7));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let provider = AnonymousProvider::new().with_id("anon");
        let session = provider.login(Credentials::new()).await.unwrap();

        let refreshed = provider
            .refresh_token(&session.token, session.user.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(refreshed.access_token, session.token.access_token);
        assert_eq!(refreshed.refresh_token, session.token.refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_is_unsupported() {
        let provider = AnonymousProvider::new();
        let user = BasicUser::anonymous("anon-1");
        let result = provider.refresh_token(&Token::new("t"), &user).await.unwrap();
        assert!(result.is_none());
    }
}
