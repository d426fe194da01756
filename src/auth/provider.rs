//! Authentication provider trait
use crate::auth::token::Token;
use crate::auth::user::{SharedUser, User};
use crate::utils::errors::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Credential input handed to a provider's `login`.
///
/// The engine cannot know each provider's input shape, so it carries an
/// untyped JSON object; providers turn it into their own type with
/// [`Credentials::parse`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials(Map<String, Value>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Non-empty string field, or a `Credentials` error naming it
    pub fn require_str(&self, key: &str) -> AuthResult<&str> {
        match self.get_str(key) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(AuthError::credentials(format!("missing credential field: {}", key))
                .with_details(serde_json::json!({ "field": key }))),
        }
    }

    /// Deserialize into a provider-defined input type
    pub fn parse<T: DeserializeOwned>(&self) -> AuthResult<T> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|e| {
            AuthError::credentials(format!("malformed credentials: {}", e)).with_cause(e)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Credentials {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Credentials {
    type Error = AuthError;

    fn try_from(value: Value) -> AuthResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(AuthError::credentials(format!(
                "credentials must be an object, got {}",
                other
            ))),
        }
    }
}

/// Successful login result: the identity and its credential
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: SharedUser,
    pub token: Token,
}

impl AuthSession {
    pub fn new(user: SharedUser, token: Token) -> Self {
        Self { user, token }
    }
}

/// Pluggable credential-verification strategy
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Stable identifier used for registry lookup and persisted with the session
    fn provider_id(&self) -> &str;

    /// Verify credentials and produce a session. Must not touch engine state.
    async fn login(&self, credentials: Credentials) -> AuthResult<AuthSession>;

    /// Remote cleanup hook
    async fn logout(&self) -> AuthResult<()> {
        Ok(())
    }

    /// Whether a restored session is still usable
    async fn check_session(&self, token: &Token, _user: &dyn User) -> bool {
        !token.is_expired()
    }

    /// Obtain a replacement token. `Ok(None)` means refresh is unsupported or
    /// produced nothing, which is not an error.
    async fn refresh_token(&self, _current: &Token, _user: &dyn User) -> AuthResult<Option<Token>> {
        Ok(None)
    }
}

pub type SharedProvider = Arc<dyn AuthProvider>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct EmailPassword {
        email: String,
        password: String,
    }

    #[test]
    fn test_parse_typed_credentials() {
        let creds = Credentials::new()
            .with("email", "a@example.com")
            .with("password", "hunter2");

        let parsed: EmailPassword = creds.parse().unwrap();
        assert_eq!(parsed.email, "a@example.com");
        assert_eq!(parsed.password, "hunter2");
    }

    #[test]
    fn test_parse_reports_credentials_error() {
        let creds = Credentials::new().with("email", "a@example.com");
        let err = creds.parse::<EmailPassword>().unwrap_err();
        assert_eq!(err.kind(), crate::utils::errors::AuthErrorKind::Credentials);
    }

    #[test]
    fn test_require_str_rejects_empty() {
        let creds = Credentials::new().with("email", "");
        assert!(creds.require_str("email").is_err());
        assert!(creds.require_str("password").is_err());
    }

    #[test]
    fn test_try_from_value() {
        assert!(Credentials::try_from(serde_json::json!({ "a": 1 })).is_ok());
        assert!(Credentials::try_from(Value::Null).unwrap().is_empty());
        assert!(Credentials::try_from(serde_json::json!([1, 2])).is_err());
    }

    struct Minimal;

    #[async_trait]
    impl AuthProvider for Minimal {
        fn provider_id(&self) -> &str {
            "minimal"
        }

        async fn login(&self, _credentials: Credentials) -> AuthResult<AuthSession> {
            Err(AuthError::provider("unused"))
        }
    }

    #[tokio::test]
    async fn test_default_hooks() {
        let provider = Minimal;
        let user = crate::auth::user::BasicUser::new("u1");
        let live = Token::new("t").expiring_in(chrono::Duration::hours(1));
        let dead = Token::new("t").expiring_in(chrono::Duration::hours(-1));

        assert!(provider.logout().await.is_ok());
        assert!(provider.check_session(&live, &user).await);
        assert!(!provider.check_session(&dead, &user).await);
        assert!(provider.refresh_token(&live, &user).await.unwrap().is_none());
    }
}
