//! Settings file to running engine

use authkit::config::StorageBackend;
use authkit::{
    AnonymousProvider, AuthConfig, AuthContext, AuthEngine, AuthSettings, Credentials,
    SessionStatus, SharedProvider, StaticCredentialsProvider, User,
};
use std::sync::Arc;

fn providers() -> Vec<SharedProvider> {
    vec![
        Arc::new(AnonymousProvider::new()),
        Arc::new(StaticCredentialsProvider::new().with_account("ada@example.com", "lovelace")),
    ]
}

#[tokio::test]
async fn test_default_provider_from_settings() {
    let settings = AuthSettings::from_toml_str(
        r#"
        default_provider_id = "static"

        [storage]
        backend = "memory"
        "#,
    )
    .unwrap();
    assert_eq!(settings.storage.backend, StorageBackend::Memory);

    let engine = AuthEngine::new(AuthContext::new());
    engine
        .configure(AuthConfig::from_settings(&settings, providers()))
        .await
        .unwrap();

    let session = engine
        .login(
            Credentials::new()
                .with("email", "ada@example.com")
                .with("password", "lovelace"),
        )
        .await
        .unwrap();
    assert_eq!(session.user.email(), Some("ada@example.com"));
    assert_eq!(engine.current_provider_id().as_deref(), Some("static"));
}

#[tokio::test]
async fn test_file_backend_from_settings() {
    let dir = tempfile::tempdir().unwrap();
    let content = format!(
        "[storage]\nbackend = \"file\"\npath = {:?}\nkey_prefix = \"demo\"\n",
        dir.path().display().to_string()
    );
    let settings = AuthSettings::from_toml_str(&content).unwrap();

    let engine = AuthEngine::new(AuthContext::new());
    engine
        .configure(AuthConfig::from_settings(&settings, providers()))
        .await
        .unwrap();
    engine
        .login_with_provider("anonymous", Credentials::new())
        .await
        .unwrap();

    assert_eq!(engine.status(), SessionStatus::Authenticated);
    assert!(dir.path().join("demo.token").exists());
    assert!(dir.path().join("demo.user").exists());
}

#[tokio::test]
async fn test_load_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("authkit.toml");
    tokio::fs::write(&path, "auto_refresh_on_expiry = false\nlog_level = \"warn\"\n")
        .await
        .unwrap();

    let settings = AuthSettings::load(&path).await.unwrap();
    assert!(!settings.auto_refresh_on_expiry);
    assert_eq!(settings.log_level.as_deref(), Some("warn"));
    assert!(!AuthConfig::from_settings(&settings, Vec::new()).auto_refresh_on_expiry);
}
