//! Opaque credential value object

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An access token with optional refresh token and expiry.
///
/// Tokens are never mutated; a refresh produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the expiry relative to now
    pub fn expiring_in(self, ttl: Duration) -> Self {
        self.with_expires_at(Utc::now() + ttl)
    }

    /// Tokens without an expiry never expire
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Remaining lifetime, `None` when the token has no expiry.
    /// Already-expired tokens report zero.
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - Utc::now()).max(Duration::zero()))
    }
}
