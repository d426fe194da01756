//! Session snapshot and its observable channels
//!
//! All four channels (status, user, token, provider id) are projections of a
//! single [`SessionState`] value. A transition replaces the whole snapshot at
//! once, so no observer can pair a new token with an old user.

use crate::auth::token::Token;
use crate::auth::user::SharedUser;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Loading => write!(f, "loading"),
            SessionStatus::Authenticated => write!(f, "authenticated"),
            SessionStatus::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// The authoritative session.
///
/// User and token exist only in the `Authenticated` variant, which makes
/// "authenticated iff user and token are present" hold by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Unauthenticated,
    Authenticated {
        user: SharedUser,
        token: Token,
        provider_id: Option<String>,
    },
}

impl SessionState {
    pub fn authenticated(user: SharedUser, token: Token, provider_id: Option<String>) -> Self {
        SessionState::Authenticated {
            user,
            token,
            provider_id,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Loading => SessionStatus::Loading,
            SessionState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionState::Authenticated { .. } => SessionStatus::Authenticated,
        }
    }

    pub fn user(&self) -> Option<SharedUser> {
        match self {
            SessionState::Authenticated { user, .. } => Some(user.clone()),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<Token> {
        match self {
            SessionState::Authenticated { token, .. } => Some(token.clone()),
            _ => None,
        }
    }

    pub fn provider_id(&self) -> Option<String> {
        match self {
            SessionState::Authenticated { provider_id, .. } => provider_id.clone(),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

struct CellInner {
    current: SessionState,
    tx: broadcast::Sender<SessionState>,
}

/// Holds the current snapshot and fans transitions out to streams
pub(crate) struct SessionCell {
    inner: Mutex<CellInner>,
}

impl SessionCell {
    pub(crate) fn new(initial: SessionState) -> Arc<Self> {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            inner: Mutex::new(CellInner { current: initial, tx }),
        })
    }

    pub(crate) fn snapshot(&self) -> SessionState {
        self.inner.lock().current.clone()
    }

    /// Replace the snapshot. Observers are only woken when it actually changed.
    pub(crate) fn publish(&self, next: SessionState) -> bool {
        let mut inner = self.inner.lock();
        if inner.current == next {
            inner.current = next;
            return false;
        }

        debug!(
            old_status = %inner.current.status(),
            new_status = %next.status(),
            "Session state transition"
        );
        inner.current = next.clone();
        // No receivers is fine
        let _ = inner.tx.send(next);
        true
    }

    pub(crate) fn stream<T>(self: &Arc<Self>, project: fn(&SessionState) -> T) -> StateStream<T>
    where
        T: Clone + PartialEq,
    {
        // Subscribing and reading the snapshot under one lock means the
        // stream neither misses nor repeats a transition.
        let inner = self.inner.lock();
        let rx = inner.tx.subscribe();
        let initial = project(&inner.current);
        drop(inner);

        StateStream {
            cell: Arc::downgrade(self),
            rx,
            project,
            pending: Some(initial),
            last: None,
        }
    }
}

/// Observable projection of the session.
///
/// The first [`next`](StateStream::next) yields the current value
/// immediately; later calls yield only values different from the previous
/// one, in the order they were applied.
pub struct StateStream<T> {
    cell: Weak<SessionCell>,
    rx: broadcast::Receiver<SessionState>,
    project: fn(&SessionState) -> T,
    pending: Option<T>,
    last: Option<T>,
}

impl<T: Clone + PartialEq> StateStream<T> {
    /// Latest value, without waiting
    pub fn current(&self) -> Option<T> {
        self.cell.upgrade().map(|cell| (self.project)(&cell.snapshot()))
    }

    /// `None` once the owning engine is gone
    pub async fn next(&mut self) -> Option<T> {
        if let Some(value) = self.pending.take() {
            self.last = Some(value.clone());
            return Some(value);
        }

        loop {
            let state = match self.rx.recv().await {
                Ok(state) => state,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session observer lagged; resyncing to latest state");
                    self.cell.upgrade()?.snapshot()
                }
                Err(RecvError::Closed) => return None,
            };

            let value = (self.project)(&state);
            if self.last.as_ref() != Some(&value) {
                self.last = Some(value.clone());
                return Some(value);
            }
        }
    }

    /// Wait until a value satisfies `predicate`, checking the current one first
    pub async fn wait_for(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        loop {
            let value = self.next().await?;
            if predicate(&value) {
                return Some(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::BasicUser;

    fn authed(user: &str, token: &str) -> SessionState {
        SessionState::authenticated(
            BasicUser::new(user).shared(),
            Token::new(token),
            Some("p".to_string()),
        )
    }

    #[test]
    fn test_projections() {
        let state = authed("u1", "t1");
        assert_eq!(state.status(), SessionStatus::Authenticated);
        assert_eq!(state.user().unwrap().id(), "u1");
        assert_eq!(state.token().unwrap().access_token, "t1");
        assert_eq!(state.provider_id().as_deref(), Some("p"));

        for state in [SessionState::Loading, SessionState::Unauthenticated] {
            assert!(state.user().is_none());
            assert!(state.token().is_none());
            assert!(state.provider_id().is_none());
            assert!(!state.is_authenticated());
        }
    }

    #[test]
    fn test_publish_suppresses_duplicates() {
        let cell = SessionCell::new(SessionState::Unauthenticated);
        assert!(!cell.publish(SessionState::Unauthenticated));
        assert!(cell.publish(SessionState::Loading));
        assert!(cell.publish(authed("u1", "t1")));
        assert!(!cell.publish(authed("u1", "t1")));
    }

    #[tokio::test]
    async fn test_stream_replays_current_then_changes() {
        let cell = SessionCell::new(SessionState::Unauthenticated);
        cell.publish(authed("u1", "t1"));

        let mut status = cell.stream(SessionState::status);
        assert_eq!(status.next().await, Some(SessionStatus::Authenticated));

        cell.publish(SessionState::Loading);
        cell.publish(SessionState::Unauthenticated);
        assert_eq!(status.next().await, Some(SessionStatus::Loading));
        assert_eq!(status.next().await, Some(SessionStatus::Unauthenticated));
    }

    #[tokio::test]
    async fn test_field_stream_skips_unrelated_changes() {
        let cell = SessionCell::new(SessionState::Unauthenticated);
        let mut users = cell.stream(SessionState::user);
        assert_eq!(users.next().await, Some(None));

        cell.publish(authed("u1", "t1"));
        cell.publish(authed("u1", "t2"));
        cell.publish(authed("u2", "t3"));

        assert_eq!(users.next().await.unwrap().unwrap().id(), "u1");
        assert_eq!(users.next().await.unwrap().unwrap().id(), "u2");
    }

    #[tokio::test]
    async fn test_stream_ends_when_cell_dropped() {
        let cell = SessionCell::new(SessionState::Unauthenticated);
        let mut status = cell.stream(SessionState::status);
        assert!(status.next().await.is_some());

        drop(cell);
        assert!(status.next().await.is_none());
        assert!(status.current().is_none());
    }

    #[tokio::test]
    async fn test_lagged_stream_resyncs() {
        let cell = SessionCell::new(SessionState::Unauthenticated);
        let mut tokens = cell.stream(SessionState::token);
        assert_eq!(tokens.next().await, Some(None));

        for i in 0..(CHANNEL_CAPACITY * 2) {
            cell.publish(authed("u1", &format!("t{}", i)));
        }

        let latest = (0..CHANNEL_CAPACITY * 2)
            .map(|i| format!("t{}", i))
            .last()
            .unwrap();
        let seen = tokens
            .wait_for(|t| t.as_ref().map(|t| t.access_token == latest).unwrap_or(false))
            .await;
        assert!(seen.is_some());
    }
}
