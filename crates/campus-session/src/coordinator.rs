//! Wires provider, resolver, store and channel manager into one running session.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use campus_core::domain::{RedirectIntent, SessionEvent};
use campus_core::ports::{
    BackendApi, IdentityProvider, RateLimiter, RealtimeConnector, Subscription,
};

use crate::completion::{CompletionConfig, ProfileCompletionCache};
use crate::realtime::{RealtimeChannelManager, RealtimeConfig};
use crate::resolver::IdentityResolver;
use crate::slot::{SessionSlot, SessionSnapshot};
use crate::store::SessionStore;

/// Coordinator configuration.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    pub completion: CompletionConfig,
    pub realtime: RealtimeConfig,
}

impl CoordinatorConfig {
    pub fn from_env() -> Self {
        Self {
            completion: CompletionConfig::from_env(),
            realtime: RealtimeConfig::from_env(),
        }
    }
}

/// A running session: owns the provider subscription and background tasks.
pub struct SessionCoordinator {
    store: Arc<SessionStore>,
    resolver: Arc<IdentityResolver>,
    channel: Arc<RealtimeChannelManager>,
    subscription: Mutex<Option<Subscription>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionCoordinator {
    /// Subscribe to the provider and start following its auth state.
    /// Must be called from within a tokio runtime.
    pub fn start(
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn BackendApi>,
        limiter: Arc<dyn RateLimiter>,
        connector: Arc<dyn RealtimeConnector>,
        config: CoordinatorConfig,
    ) -> Self {
        let slot = Arc::new(SessionSlot::new());
        let cache = Arc::new(ProfileCompletionCache::new(
            backend.clone(),
            limiter,
            config.completion,
        ));
        let resolver = Arc::new(IdentityResolver::new(
            backend.clone(),
            cache.clone(),
            slot.clone(),
        ));
        let store = Arc::new(SessionStore::new(
            provider.clone(),
            backend,
            cache,
            resolver.clone(),
            slot.clone(),
        ));
        let channel = Arc::new(RealtimeChannelManager::new(connector, config.realtime));

        // Provider callbacks only enqueue; events are applied in order by one task.
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        let subscription = provider.subscribe(Arc::new(move |event| {
            let _ = tx.send(event);
        }));

        let events = {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    resolver.handle_event(event);
                }
            })
        };
        let realtime = tokio::spawn(channel.clone().run(slot.subscribe()));

        tracing::info!("Session coordinator started");

        Self {
            store,
            resolver,
            channel,
            subscription: Mutex::new(Some(subscription)),
            tasks: Mutex::new(vec![events, realtime]),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn channel(&self) -> &Arc<RealtimeChannelManager> {
        &self.channel
    }

    pub fn session(&self) -> watch::Receiver<SessionSnapshot> {
        self.store.subscribe()
    }

    pub fn redirects(&self) -> broadcast::Receiver<RedirectIntent> {
        self.resolver.redirects()
    }

    pub fn set_active_view(&self, path: impl Into<String>) {
        self.resolver.set_active_view(path);
    }

    /// Detach from the provider, stop background tasks and close the channel.
    /// The provider session itself is left alone.
    pub async fn shutdown(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
        }
        self.channel.close().await;
        tracing::info!("Session coordinator stopped");
    }
}
