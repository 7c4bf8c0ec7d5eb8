//! Scripted collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use campus_core::domain::{AuthToken, BackendSession, Profile, Role};
use campus_core::ports::{
    BackendApi, BackendError, RateLimitError, RateLimitResult, RateLimiter, RealtimeConnection,
    RealtimeConnector, Registration, TransportError, TransportEvent, TransportListener,
};

pub fn text(s: &str) -> Option<String> {
    Some(s.to_string())
}

pub fn complete_teacher() -> Profile {
    Profile {
        name: text("Ada Lovelace"),
        college_name: text("MIT"),
        ..Default::default()
    }
}

/// In-memory backend with per-uid lookup latency and failure switches.
#[derive(Default)]
pub struct ScriptedBackend {
    users: Mutex<HashMap<String, BackendSession>>,
    profiles: Mutex<HashMap<String, Profile>>,
    lookup_delays: Mutex<HashMap<String, Duration>>,
    registrations: Mutex<Vec<Registration>>,
    next_user_id: AtomicI64,
    pub fail_profile: AtomicBool,
    pub fail_register: AtomicBool,
    pub profile_fetches: AtomicUsize,
    pub lookups: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.next_user_id.store(100, Ordering::SeqCst);
        Arc::new(backend)
    }

    /// Register `uid` as an existing application user. Returns the session.
    pub fn add_user(&self, uid: &str, role: Role, profile: Profile) -> BackendSession {
        let user_id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let session = BackendSession {
            role,
            user_id,
            token: AuthToken::new(format!("tok-{}", user_id)),
        };
        self.users.lock().insert(uid.to_string(), session.clone());
        self.profiles
            .lock()
            .insert(session.token.as_str().to_string(), profile);
        session
    }

    pub fn delay_lookup(&self, uid: &str, delay: Duration) {
        self.lookup_delays.lock().insert(uid.to_string(), delay);
    }

    pub fn set_profile(&self, token: &AuthToken, profile: Profile) {
        self.profiles.lock().insert(token.as_str().to_string(), profile);
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.lock().clone()
    }

    pub fn fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendApi for ScriptedBackend {
    async fn lookup_user(&self, provider_id: &str) -> Result<BackendSession, BackendError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = self.lookup_delays.lock().get(provider_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.users
            .lock()
            .get(provider_id)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn register(&self, registration: &Registration) -> Result<(), BackendError> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                detail: "database unavailable".to_string(),
            });
        }
        self.registrations.lock().push(registration.clone());
        self.add_user(
            &registration.provider_id,
            registration.role,
            Profile {
                name: Some(registration.name.clone()),
                email: Some(registration.email.clone()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn fetch_profile(&self, token: &AuthToken) -> Result<Profile, BackendError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection reset".to_string()));
        }
        self.profiles
            .lock()
            .get(token.as_str())
            .cloned()
            .ok_or(BackendError::Unauthorized)
    }

    async fn update_profile(
        &self,
        token: &AuthToken,
        profile: &Profile,
    ) -> Result<Profile, BackendError> {
        let mut profiles = self.profiles.lock();
        let stored = profiles.get_mut(token.as_str()).ok_or(BackendError::Unauthorized)?;
        *stored = profile.clone();
        Ok(profile.clone())
    }
}

/// Limiter that always reports a broken backend.
pub struct BrokenLimiter;

#[async_trait]
impl RateLimiter for BrokenLimiter {
    async fn check(&self, _key: &str) -> Result<RateLimitResult, RateLimitError> {
        Err(RateLimitError::Backend("store offline".to_string()))
    }

    async fn time_until_next_call(&self, _key: &str) -> Duration {
        Duration::ZERO
    }

    async fn clear(&self, _key: &str) {}
}

/// Connector handing out recorded fake connections.
#[derive(Default)]
pub struct FakeConnector {
    pub refuse: AtomicBool,
    /// Never completes the handshake.
    pub hang: AtomicBool,
    pub attempts: AtomicUsize,
    /// Time spent in the handshake before the connection is handed out.
    delay: Mutex<Option<Duration>>,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    listeners: Mutex<Vec<TransportListener>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delay_connect(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn connections(&self) -> Vec<Arc<FakeConnection>> {
        self.connections.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<FakeConnection>> {
        self.connections.lock().last().cloned()
    }

    /// Report a lifecycle event on the most recent connection.
    pub fn report(&self, event: TransportEvent) {
        let listener = self.listeners.lock().last().cloned();
        if let Some(listener) = listener {
            listener(event);
        }
    }
}

#[async_trait]
impl RealtimeConnector for FakeConnector {
    async fn connect(
        &self,
        listener: TransportListener,
    ) -> Result<Arc<dyn RealtimeConnection>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            listener(TransportEvent::ConnectError("refused".to_string()));
            return Err(TransportError::Connect("refused".to_string()));
        }

        listener(TransportEvent::Connected);
        let connection = Arc::new(FakeConnection::default());
        self.connections.lock().push(connection.clone());
        self.listeners.lock().push(listener);
        Ok(connection)
    }
}

#[derive(Default)]
pub struct FakeConnection {
    emitted: Mutex<Vec<(String, String)>>,
    closed: AtomicBool,
}

impl FakeConnection {
    pub fn emitted(&self) -> Vec<(String, String)> {
        self.emitted.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeConnection for FakeConnection {
    async fn emit(&self, event: &str, room: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.emitted.lock().push((event.to_string(), room.to_string()));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
