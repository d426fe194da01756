//! Publish/subscribe bus with replay of the most recent event
use crate::events::{AuthEvent, EventVariant};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Handle returned by the subscribe calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<AuthEvent>,
}

#[derive(Default)]
struct BusState {
    last: Option<AuthEvent>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

/// Event bus.
///
/// The last dispatched event is kept and handed to every new subscriber, so
/// a listener attaching just after a dispatch still sees it. Dispatch only
/// queues: each subscriber owns an unbounded queue and receives events in
/// dispatch order, never on the dispatching task.
#[derive(Default)]
pub struct EventBus {
    state: Mutex<BusState>,
}

/// Queue of events for one listener; see [`EventBus::listen`]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<AuthEvent>,
}

impl EventStream {
    /// `None` once the bus is dropped or cleared
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<AuthEvent> {
        self.rx.try_recv().ok()
    }

    /// Next event of variant `E`, skipping the others
    pub async fn recv_of<E: EventVariant>(&mut self) -> Option<E> {
        loop {
            let event = self.rx.recv().await?;
            if let Some(payload) = E::from_event(&event) {
                return Some(payload.clone());
            }
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide bus, or a fresh one in isolation mode
    pub fn shared() -> Arc<EventBus> {
        crate::context::AuthContext::shared().events().clone()
    }

    /// Queue for every current subscriber and retain for later ones. Never blocks.
    pub fn dispatch(&self, event: impl Into<AuthEvent>) {
        let event = event.into();
        let mut state = self.state.lock();
        state.last = Some(event.clone());
        // A send only fails once the receiving side is gone
        state.subscribers.retain(|sub| sub.tx.send(event.clone()).is_ok());
        debug!(event = event.name(), subscribers = state.subscribers.len(), "Dispatched auth event");
    }

    /// Stream of every event, starting with the retained one. Dropping the
    /// stream ends the subscription.
    pub fn listen(&self) -> EventStream {
        let (_, rx) = self.register();
        EventStream { rx }
    }

    /// Run `callback` for every event, starting with the retained one.
    ///
    /// Callbacks run on a dedicated thread per subscriber. A panicking
    /// callback is logged and keeps receiving later events.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + 'static,
    {
        let (id, mut rx) = self.register();
        let spawned = std::thread::Builder::new()
            .name(format!("authkit-events-{}", id))
            .spawn(move || {
                while let Some(event) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                        warn!(event = event.name(), subscription = id, "Auth event subscriber panicked");
                    }
                }
            });

        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start auth event subscriber");
            self.unsubscribe(Subscription(id));
        }
        Subscription(id)
    }

    /// Run `callback` for events of variant `E` only
    ///
    /// ```
    /// use authkit::events::{EventBus, TokenRefreshEvent};
    ///
    /// let bus = EventBus::new();
    /// bus.on::<TokenRefreshEvent, _>(|e| println!("refresh ok: {}", e.is_success));
    /// ```
    pub fn on<E, F>(&self, callback: F) -> Subscription
    where
        E: EventVariant,
        F: Fn(&E) + Send + 'static,
    {
        self.subscribe(move |event| {
            if let Some(payload) = E::from_event(event) {
                callback(payload);
            }
        })
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|sub| sub.id != subscription.0);
        state.subscribers.len() != before
    }

    pub fn last_event(&self) -> Option<AuthEvent> {
        self.state.lock().last.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Drop subscribers and the retained event
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.subscribers.clear();
        state.last = None;
    }

    /// Replay and registration happen under one lock, so the retained event
    /// is always first in the new queue.
    fn register(&self) -> (u64, mpsc::UnboundedReceiver<AuthEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        if let Some(event) = &state.last {
            let _ = tx.send(event.clone());
        }
        state.subscribers.push(Subscriber { id, tx });
        (id, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::Token;
    use crate::auth::user::BasicUser;
    use crate::events::{LoginEvent, LogoutEvent, TokenRefreshEvent};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn login_event() -> LoginEvent {
        LoginEvent {
            user: BasicUser::new("u1").shared(),
            token: Token::new("t"),
            provider_id: Some("anon".to_string()),
        }
    }

    fn logout_event() -> LogoutEvent {
        LogoutEvent {
            user: None,
            provider_id: None,
        }
    }

    fn record_names(bus: &EventBus) -> (Subscription, std_mpsc::Receiver<&'static str>) {
        let (tx, rx) = std_mpsc::channel();
        let sub = bus.subscribe(move |e| {
            let _ = tx.send(e.name());
        });
        (sub, rx)
    }

    #[test]
    fn test_dispatch_reaches_all_subscribers() {
        let bus = EventBus::new();
        let receivers: Vec<_> = (0..3).map(|_| record_names(&bus).1).collect();

        bus.dispatch(login_event());
        for rx in receivers {
            assert_eq!(rx.recv_timeout(WAIT).unwrap(), "login");
        }
    }

    #[test]
    fn test_late_subscriber_gets_replay_first() {
        let bus = EventBus::new();
        bus.dispatch(login_event());

        let (_, rx) = record_names(&bus);
        bus.dispatch(logout_event());
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "login");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "logout");
    }

    #[tokio::test]
    async fn test_listen_preserves_order() {
        let bus = EventBus::new();
        bus.dispatch(logout_event());
        let mut events = bus.listen();
        bus.dispatch(login_event());
        bus.dispatch(logout_event());

        assert_eq!(events.recv().await.unwrap().name(), "logout");
        assert_eq!(events.recv().await.unwrap().name(), "login");
        assert_eq!(events.recv().await.unwrap().name(), "logout");
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_recv_of_skips_other_variants() {
        let bus = EventBus::new();
        let mut events = bus.listen();
        bus.dispatch(logout_event());
        bus.dispatch(login_event());

        let login = events.recv_of::<LoginEvent>().await.unwrap();
        assert_eq!(login.user.id(), "u1");
    }

    #[test]
    fn test_on_filters_by_variant() {
        let bus = EventBus::new();
        let (tx, rx) = std_mpsc::channel();
        let refresh_tx = tx.clone();

        bus.on::<LoginEvent, _>(move |e| {
            let _ = tx.send(format!("login:{}", e.user.id()));
        });
        bus.on::<TokenRefreshEvent, _>(move |_| {
            let _ = refresh_tx.send("refresh".to_string());
        });

        bus.dispatch(login_event());
        bus.dispatch(logout_event());
        bus.dispatch(login_event());

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "login:u1");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "login:u1");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_replay_respects_filter() {
        let bus = EventBus::new();
        bus.dispatch(logout_event());

        let (tx, rx) = std_mpsc::channel();
        bus.on::<LoginEvent, _>(move |_| {
            let _ = tx.send(());
        });
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (sub, rx) = record_names(&bus);

        assert!(bus.unsubscribe(sub));
        assert!(!bus.unsubscribe(sub));
        bus.dispatch(login_event());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let bus = EventBus::new();
        let events = bus.listen();
        assert_eq!(bus.subscriber_count(), 1);

        drop(events);
        bus.dispatch(login_event());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_keeps_receiving() {
        let bus = EventBus::new();
        let (tx, rx) = std_mpsc::channel();
        bus.subscribe(move |e| {
            if e.name() == "login" {
                panic!("subscriber failure");
            }
            let _ = tx.send(e.name());
        });

        bus.dispatch(login_event());
        bus.dispatch(logout_event());
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "logout");
    }

    #[test]
    fn test_slow_subscriber_does_not_block_dispatch() {
        let bus = EventBus::new();
        bus.subscribe(|_| std::thread::sleep(Duration::from_millis(500)));

        let started = std::time::Instant::now();
        bus.dispatch(login_event());
        bus.dispatch(logout_event());
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn test_subscriber_may_reenter_bus() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        let (tx, rx) = std_mpsc::channel();
        bus.subscribe(move |_| {
            let _ = tx.send(inner.last_event().is_some());
        });
        bus.dispatch(login_event());
        assert!(rx.recv_timeout(WAIT).unwrap());
    }
}
