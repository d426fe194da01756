//! Identity capability and the default user shape

use crate::utils::errors::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Minimal capability set the engine needs from an identity.
///
/// Concrete shapes belong to the integrator. Two users are equal when their
/// ids are equal, whatever else they carry.
pub trait User: Send + Sync + Debug {
    fn id(&self) -> &str;

    fn email(&self) -> Option<&str> {
        None
    }

    fn display_name(&self) -> Option<&str> {
        None
    }

    fn is_anonymous(&self) -> bool {
        false
    }

    /// Serialized form handed to storage
    fn to_value(&self) -> Value;
}

impl PartialEq for dyn User {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for dyn User {}

pub type SharedUser = Arc<dyn User>;

/// Turns a stored value back into a user; supplied alongside the storage
pub type UserDecoder = Arc<dyn Fn(Value) -> AuthResult<SharedUser> + Send + Sync>;

/// General-purpose user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl BasicUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
            is_anonymous: false,
        }
    }

    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            is_anonymous: true,
            ..Self::new(id)
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn shared(self) -> SharedUser {
        Arc::new(self)
    }
}

impl PartialEq for BasicUser {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BasicUser {}

impl User for BasicUser {
    fn id(&self) -> &str {
        &self.id
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }

    fn to_value(&self) -> Value {
        // A struct of strings and bools always serializes
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Decoder for [`BasicUser`], the default when none is configured
pub fn basic_user_decoder() -> UserDecoder {
    Arc::new(|value: Value| {
        let user: BasicUser = serde_json::from_value(value).map_err(|e| {
            AuthError::custom("stored user is not a valid BasicUser").with_cause(e)
        })?;
        Ok(Arc::new(user) as SharedUser)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_id_only() {
        let a: SharedUser = BasicUser::new("u1").with_email("a@example.com").shared();
        let b: SharedUser = BasicUser::new("u1").with_display_name("Other").shared();
        let c: SharedUser = BasicUser::new("u2").shared();

        assert_eq!(&a, &b);
        assert_ne!(&a, &c);
    }

    #[test]
    fn test_round_trip_through_decoder() {
        let decoder = basic_user_decoder();
        let users = [
            BasicUser::new("u1")
                .with_email("a@example.com")
                .with_display_name("Ada"),
            BasicUser::new("u2"),
            BasicUser::anonymous("anon-1"),
        ];

        for user in users {
            let decoded = decoder(user.to_value()).unwrap();
            assert_eq!(decoded.id(), user.id());
            assert_eq!(decoded.email(), user.email());
            assert_eq!(decoded.display_name(), user.display_name());
            assert_eq!(decoded.is_anonymous(), user.is_anonymous());
        }
    }

    #[test]
    fn test_decoder_rejects_garbage() {
        let decoder = basic_user_decoder();
        let err = decoder(serde_json::json!({ "name": 42 })).unwrap_err();
        assert_eq!(err.kind(), crate::utils::errors::AuthErrorKind::Custom);
    }
}
