//! Realtime channel manager.
//!
//! Opens a fresh connection whenever a user is published and tears it down
//! when the user goes away. Room membership lives and dies with the
//! connection.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use campus_core::domain::AuthUser;
use campus_core::ports::{RealtimeConnection, RealtimeConnector, TransportEvent, TransportListener};
use campus_shared::events::{JOIN_BATCH, LEAVE_BATCH};

use crate::slot::SessionSnapshot;

/// Channel manager configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Upper bound for connect plus handshake.
    pub connect_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RealtimeConfig {
    pub fn from_env() -> Self {
        Self {
            connect_timeout: Duration::from_secs(
                std::env::var("SOCKET_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

#[derive(Default)]
struct ChannelSession {
    /// Bumped on every open and teardown; events from older connections are ignored.
    epoch: u64,
    user_id: Option<i64>,
    connection: Option<Arc<dyn RealtimeConnection>>,
    connected: bool,
    rooms: BTreeSet<String>,
}

pub struct RealtimeChannelManager {
    connector: Arc<dyn RealtimeConnector>,
    config: RealtimeConfig,
    state: Arc<Mutex<ChannelSession>>,
}

impl RealtimeChannelManager {
    pub fn new(connector: Arc<dyn RealtimeConnector>, config: RealtimeConfig) -> Self {
        Self {
            connector,
            config,
            state: Arc::new(Mutex::new(ChannelSession::default())),
        }
    }

    pub fn connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Rooms joined on the current connection.
    pub fn rooms(&self) -> Vec<String> {
        self.state.lock().rooms.iter().cloned().collect()
    }

    /// Join `room`. Returns false (and does nothing) while disconnected.
    pub async fn join_room(&self, room: &str) -> bool {
        self.membership(JOIN_BATCH, room).await
    }

    /// Leave `room`. Returns false (and does nothing) while disconnected.
    pub async fn leave_room(&self, room: &str) -> bool {
        self.membership(LEAVE_BATCH, room).await
    }

    /// Follow the published session until the sender goes away.
    ///
    /// Only user identity matters here: a profile-completion update on the
    /// same user keeps the connection. A user change while a connect is still
    /// in flight abandons that attempt.
    pub async fn run(self: Arc<Self>, mut session: watch::Receiver<SessionSnapshot>) {
        let mut current = user_id(&session.borrow_and_update());

        loop {
            self.close().await;
            let next = match current {
                Some(user_id) => tokio::select! {
                    _ = self.open(user_id) => user_change(&mut session, current).await,
                    next = user_change(&mut session, current) => next,
                },
                None => user_change(&mut session, current).await,
            };
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        self.close().await;
    }

    /// Close the connection and forget all rooms.
    pub async fn close(&self) {
        let connection = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.user_id = None;
            state.connected = false;
            state.rooms.clear();
            state.connection.take()
        };

        if let Some(connection) = connection {
            connection.close().await;
            tracing::info!("Realtime channel torn down");
        }
    }

    async fn open(&self, user_id: i64) {
        let epoch = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.user_id = Some(user_id);
            state.epoch
        };

        let listener = listener(Arc::downgrade(&self.state), epoch);
        let attempt =
            tokio::time::timeout(self.config.connect_timeout, self.connector.connect(listener))
                .await;

        match attempt {
            Ok(Ok(connection)) => {
                let stale = {
                    let mut state = self.state.lock();
                    if state.epoch == epoch {
                        state.connection = Some(connection.clone());
                        state.connected = true;
                        false
                    } else {
                        true
                    }
                };
                if stale {
                    connection.close().await;
                } else {
                    tracing::info!(user_id, "Realtime channel open");
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(user_id, error = %e, "Realtime connection failed");
            }
            Err(_) => {
                tracing::warn!(
                    user_id,
                    timeout_secs = self.config.connect_timeout.as_secs(),
                    "Realtime connection timed out"
                );
            }
        }
    }

    async fn membership(&self, event: &'static str, room: &str) -> bool {
        let target = {
            let state = self.state.lock();
            match (&state.connection, state.connected) {
                (Some(connection), true) => Some((connection.clone(), state.epoch)),
                _ => None,
            }
        };

        let Some((connection, epoch)) = target else {
            tracing::debug!(event, room, "Realtime channel not connected, ignoring");
            return false;
        };

        if let Err(e) = connection.emit(event, room).await {
            tracing::warn!(event, room, error = %e, "Realtime emit failed");
            return false;
        }

        let mut state = self.state.lock();
        if state.epoch != epoch {
            return false;
        }
        if event == JOIN_BATCH {
            state.rooms.insert(room.to_string());
        } else {
            state.rooms.remove(room);
        }
        true
    }
}

fn user_id(snapshot: &SessionSnapshot) -> Option<i64> {
    snapshot.user.as_ref().map(AuthUser::user_id)
}

/// Wait for the published user to differ from `current`.
/// `None` once the sender is gone.
async fn user_change(
    session: &mut watch::Receiver<SessionSnapshot>,
    current: Option<i64>,
) -> Option<Option<i64>> {
    while session.changed().await.is_ok() {
        let next = user_id(&session.borrow_and_update());
        if next != current {
            return Some(next);
        }
    }
    None
}

fn listener(state: Weak<Mutex<ChannelSession>>, epoch: u64) -> TransportListener {
    Arc::new(move |event| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = state.lock();
        if state.epoch != epoch {
            return;
        }

        match event {
            TransportEvent::Connected => {
                tracing::debug!(user_id = ?state.user_id, "Realtime transport connected");
            }
            TransportEvent::Disconnected(reason) => {
                tracing::warn!(
                    user_id = ?state.user_id,
                    reason = %reason,
                    "Realtime channel disconnected"
                );
                state.connected = false;
                state.rooms.clear();
            }
            TransportEvent::ConnectError(message) | TransportEvent::Error(message) => {
                tracing::warn!(
                    user_id = ?state.user_id,
                    error = %message,
                    "Realtime channel error"
                );
                state.connected = false;
                state.rooms.clear();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::ResolverPhase;
    use crate::testing::FakeConnector;
    use campus_core::domain::{AuthToken, BackendSession, ProviderIdentity, Role};
    use std::sync::atomic::Ordering;

    fn snapshot(user_id: Option<i64>, profile_complete: bool) -> SessionSnapshot {
        SessionSnapshot {
            user: user_id.map(|id| {
                AuthUser::new(
                    ProviderIdentity::new(format!("uid-{}", id), None),
                    BackendSession {
                        role: Role::Student,
                        user_id: id,
                        token: AuthToken::new("t"),
                    },
                    profile_complete,
                )
            }),
            loading: false,
            phase: if user_id.is_some() {
                ResolverPhase::Resolved
            } else {
                ResolverPhase::SignedOut
            },
        }
    }

    fn manager(connector: Arc<FakeConnector>) -> Arc<RealtimeChannelManager> {
        Arc::new(RealtimeChannelManager::new(connector, RealtimeConfig::default()))
    }

    /// Let the manager task react to the last publish.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_channel_follows_session() {
        let connector = FakeConnector::new();
        let manager = manager(connector.clone());
        let (tx, rx) = watch::channel(snapshot(None, false));
        let task = tokio::spawn(manager.clone().run(rx));

        settle().await;
        assert!(!manager.connected());
        assert!(!manager.join_room("batch-1").await);

        tx.send_replace(snapshot(Some(1), false));
        settle().await;
        assert!(manager.connected());
        assert!(manager.join_room("batch-1").await);
        assert!(manager.join_room("batch-2").await);
        assert!(manager.leave_room("batch-1").await);
        assert_eq!(manager.rooms(), vec!["batch-2".to_string()]);

        let first = connector.last().unwrap();
        assert_eq!(
            first.emitted(),
            vec![
                (JOIN_BATCH.to_string(), "batch-1".to_string()),
                (JOIN_BATCH.to_string(), "batch-2".to_string()),
                (LEAVE_BATCH.to_string(), "batch-1".to_string()),
            ]
        );

        tx.send_replace(snapshot(None, false));
        settle().await;
        assert!(!manager.connected());
        assert!(manager.rooms().is_empty());
        assert!(first.is_closed());
        assert!(!manager.join_room("batch-3").await);
        assert_eq!(first.emitted().len(), 3);

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_profile_update_keeps_connection_user_switch_reconnects() {
        let connector = FakeConnector::new();
        let manager = manager(connector.clone());
        let (tx, rx) = watch::channel(snapshot(Some(1), false));
        tokio::spawn(manager.clone().run(rx));
        settle().await;
        manager.join_room("batch-1").await;

        tx.send_replace(snapshot(Some(1), true));
        settle().await;
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.rooms(), vec!["batch-1".to_string()]);

        tx.send_replace(snapshot(Some(2), false));
        settle().await;
        let connections = connector.connections();
        assert_eq!(connections.len(), 2);
        assert!(connections[0].is_closed());
        assert!(!connections[1].is_closed());
        assert!(manager.connected());
        assert!(manager.rooms().is_empty());
    }

    #[tokio::test]
    async fn test_transport_loss_marks_disconnected_without_retry() {
        let connector = FakeConnector::new();
        let manager = manager(connector.clone());
        let (_tx, rx) = watch::channel(snapshot(Some(1), false));
        tokio::spawn(manager.clone().run(rx));
        settle().await;
        manager.join_room("batch-1").await;

        connector.report(TransportEvent::Disconnected("transport close".to_string()));
        settle().await;

        assert!(!manager.connected());
        assert!(manager.rooms().is_empty());
        assert!(!manager.join_room("batch-1").await);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connection_stays_disconnected() {
        let connector = FakeConnector::new();
        connector.refuse.store(true, Ordering::SeqCst);
        let manager = manager(connector.clone());
        let (_tx, rx) = watch::channel(snapshot(Some(1), false));
        tokio::spawn(manager.clone().run(rx));
        settle().await;

        assert!(!manager.connected());
        assert!(connector.connections().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let connector = FakeConnector::new();
        connector.hang.store(true, Ordering::SeqCst);
        let manager = Arc::new(RealtimeChannelManager::new(
            connector.clone(),
            RealtimeConfig {
                connect_timeout: Duration::from_secs(2),
            },
        ));

        manager.open(1).await;

        assert!(!manager.connected());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_connect_opens_nothing() {
        let connector = FakeConnector::new();
        connector.delay_connect(Duration::from_secs(5));
        let manager = manager(connector.clone());
        let (tx, rx) = watch::channel(snapshot(None, false));
        let task = tokio::spawn(manager.clone().run(rx));
        settle().await;

        tx.send_replace(snapshot(Some(1), false));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);

        tx.send_replace(snapshot(None, false));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(connector.connections().is_empty());
        assert!(!manager.connected());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_switch_during_connect_connects_new_user_only() {
        let connector = FakeConnector::new();
        connector.delay_connect(Duration::from_secs(5));
        let manager = manager(connector.clone());
        let (tx, rx) = watch::channel(snapshot(Some(1), false));
        tokio::spawn(manager.clone().run(rx));
        tokio::time::sleep(Duration::from_millis(10)).await;

        tx.send_replace(snapshot(Some(2), false));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(connector.connections().len(), 1);
        assert!(manager.connected());
        assert_eq!(manager.state.lock().user_id, Some(2));
    }

    #[tokio::test]
    async fn test_events_from_old_connection_are_ignored() {
        let connector = FakeConnector::new();
        let manager = manager(connector.clone());

        manager.open(1).await;
        let stale = listener(Arc::downgrade(&manager.state), manager.state.lock().epoch);
        manager.close().await;
        manager.open(2).await;
        manager.join_room("batch-9").await;

        stale(TransportEvent::Disconnected("old".to_string()));
        assert!(manager.connected());
        assert_eq!(manager.rooms(), vec!["batch-9".to_string()]);
    }
}
