use serde_json::Value;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Shared underlying cause attached to an [`AuthError`]
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Closed error taxonomy for every failure the engine surfaces
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// Malformed or missing credential input
    #[error("credentials error: {message}")]
    Credentials {
        message: String,
        #[source]
        cause: Option<Cause>,
        details: Option<Value>,
    },

    /// Provider not found, or a provider-internal failure
    #[error("provider error: {message}")]
    Provider {
        message: String,
        #[source]
        cause: Option<Cause>,
        details: Option<Value>,
    },

    /// Integrator-defined failure with free-form details
    #[error("{message}")]
    Custom {
        message: String,
        #[source]
        cause: Option<Cause>,
        details: Option<Value>,
    },

    /// Catch-all target of normalization
    #[error("unknown error: {message}")]
    Unknown {
        message: String,
        #[source]
        cause: Option<Cause>,
        details: Option<Value>,
    },
}

/// Discriminant of [`AuthError`], handy for exhaustive matching without payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    Credentials,
    Provider,
    Custom,
    Unknown,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthErrorKind::Credentials => write!(f, "credentials"),
            AuthErrorKind::Provider => write!(f, "provider"),
            AuthErrorKind::Custom => write!(f, "custom"),
            AuthErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl AuthError {
    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials {
            message: message.into(),
            cause: None,
            details: None,
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            cause: None,
            details: None,
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
            cause: None,
            details: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
            cause: None,
            details: None,
        }
    }

    /// Provider lookup failure for `provider_id`
    pub fn provider_not_found(provider_id: &str) -> Self {
        Self::provider(format!("provider not found: {}", provider_id))
            .with_details(serde_json::json!({ "provider_id": provider_id }))
    }

    /// Attach an underlying cause
    pub fn with_cause<E>(mut self, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        *self.cause_slot() = Some(Arc::new(err));
        self
    }

    /// Attach structured context
    pub fn with_details(mut self, value: Value) -> Self {
        *self.details_slot() = Some(value);
        self
    }

    /// Normalize any error into the taxonomy.
    ///
    /// Errors that already are an `AuthError` pass through unchanged; everything
    /// else becomes [`AuthError::Unknown`] with the original kept as its cause.
    pub fn from_any<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        let boxed: Box<dyn StdError + Send + Sync + 'static> = err.into();
        match boxed.downcast::<AuthError>() {
            Ok(typed) => *typed,
            Err(other) => Self::Unknown {
                message: other.to_string(),
                cause: Some(Arc::from(other)),
                details: None,
            },
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::Credentials { .. } => AuthErrorKind::Credentials,
            Self::Provider { .. } => AuthErrorKind::Provider,
            Self::Custom { .. } => AuthErrorKind::Custom,
            Self::Unknown { .. } => AuthErrorKind::Unknown,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Credentials { .. } => "CREDENTIALS_ERROR",
            Self::Provider { .. } => "PROVIDER_ERROR",
            Self::Custom { .. } => "CUSTOM_ERROR",
            Self::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Credentials { message, .. }
            | Self::Provider { message, .. }
            | Self::Custom { message, .. }
            | Self::Unknown { message, .. } => message,
        }
    }

    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Credentials { cause, .. }
            | Self::Provider { cause, .. }
            | Self::Custom { cause, .. }
            | Self::Unknown { cause, .. } => cause.as_ref(),
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Credentials { details, .. }
            | Self::Provider { details, .. }
            | Self::Custom { details, .. }
            | Self::Unknown { details, .. } => details.as_ref(),
        }
    }

    fn cause_slot(&mut self) -> &mut Option<Cause> {
        match self {
            Self::Credentials { cause, .. }
            | Self::Provider { cause, .. }
            | Self::Custom { cause, .. }
            | Self::Unknown { cause, .. } => cause,
        }
    }

    fn details_slot(&mut self) -> &mut Option<Value> {
        match self {
            Self::Credentials { details, .. }
            | Self::Provider { details, .. }
            | Self::Custom { details, .. }
            | Self::Unknown { details, .. } => details,
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(e: std::io::Error) -> Self {
        AuthError::from_any(e)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::from_any(e)
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(e: toml::de::Error) -> Self {
        AuthError::from_any(e)
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<AuthError>() {
            Ok(typed) => typed,
            Err(other) => AuthError::from_any(other),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
