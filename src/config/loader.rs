//! Reading [`AuthSettings`] from TOML
use crate::config::types::AuthSettings;
use crate::utils::errors::{AuthError, AuthResult};
use std::path::Path;
use tracing::{debug, info};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

pub const DEFAULT_CONFIG_FILE: &str = "authkit.toml";

impl AuthSettings {
    pub fn from_toml_str(content: &str) -> AuthResult<Self> {
        let settings: AuthSettings = toml::from_str(content)
            .map_err(|e| AuthError::custom(format!("invalid auth config: {}", e)).with_cause(e))?;
        settings.validated()
    }

    /// Run field validation, collecting every failing field into the error details
    pub fn validated(self) -> AuthResult<Self> {
        if let Err(errors) = self.validate() {
            let mut fields = Vec::new();
            collect_fields("", &errors, &mut fields);
            fields.sort();
            return Err(AuthError::custom(format!("auth config validation failed: {}", errors))
                .with_details(serde_json::json!({ "fields": fields })));
        }
        Ok(self)
    }

    pub async fn load(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AuthError::custom(format!("failed to read {}: {}", path.display(), e)).with_cause(e)
        })?;
        let settings = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded auth config");
        Ok(settings)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub async fn load_or_default(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            _ => {
                debug!(path = %path.display(), "No auth config file; using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Dotted paths of every failing field, nested structs and lists included
fn collect_fields(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(_) => out.push(path),
            ValidationErrorsKind::Struct(inner) => collect_fields(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_fields(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}
