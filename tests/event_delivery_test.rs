//! Event subscribers never hold up or break engine operations

use authkit::{
    AnonymousProvider, AuthConfig, AuthContext, AuthEngine, Credentials, KvSessionStorage,
    LoginEvent, LogoutEvent, SessionStatus,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn configured() -> AuthEngine {
    let engine = AuthEngine::new(AuthContext::new());
    engine
        .configure(
            AuthConfig::new()
                .with_storage(Arc::new(KvSessionStorage::in_memory()))
                .with_provider(Arc::new(AnonymousProvider::new())),
        )
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn test_slow_subscriber_does_not_delay_login() {
    let engine = configured().await;
    engine
        .events()
        .on::<LoginEvent, _>(|_| std::thread::sleep(Duration::from_millis(500)));

    let started = Instant::now();
    engine.login(Credentials::new()).await.unwrap();
    engine.logout().await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(engine.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_panicking_subscriber_does_not_strand_logout() {
    let engine = configured().await;
    engine
        .events()
        .on::<LogoutEvent, _>(|_| panic!("subscriber failure"));
    engine.login(Credentials::new()).await.unwrap();

    engine.logout().await.unwrap();
    assert_eq!(engine.status(), SessionStatus::Unauthenticated);

    // The engine keeps working afterwards
    engine.login(Credentials::new()).await.unwrap();
    engine.logout().await.unwrap();
    assert_eq!(engine.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_events_arrive_in_operation_order() {
    let engine = configured().await;
    let mut events = engine.events().listen();

    engine.login(Credentials::new()).await.unwrap();
    engine.refresh_session().await.unwrap();
    engine.logout().await.unwrap();

    let mut names = Vec::new();
    while let Some(event) = events.try_recv() {
        names.push(event.name());
    }
    assert_eq!(names, vec!["login", "login", "token_refresh", "logout"]);
}
