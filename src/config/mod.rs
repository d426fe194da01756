//! Engine configuration: the runtime [`AuthConfig`] and file-level [`AuthSettings`]

pub mod auth;
pub mod loader;
pub mod types;

pub use auth::AuthConfig;
pub use loader::DEFAULT_CONFIG_FILE;
pub use types::{AuthSettings, StorageBackend, StorageSettings};
