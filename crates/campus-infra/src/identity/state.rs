//! Current identity plus listener registry shared by the provider implementations.

use std::sync::Arc;

use parking_lot::Mutex;

use campus_core::domain::{ProviderIdentity, SessionEvent};
use campus_core::ports::{AuthStateListener, Subscription};

struct Registry {
    next_id: u64,
    listeners: Vec<(u64, AuthStateListener)>,
    current: Option<ProviderIdentity>,
}

/// Tracks the signed-in identity and fans transitions out to listeners.
///
/// Transitions are delivered in the order they were applied; `delivery` is held
/// for the whole update-and-notify step. Listeners must not call back into the
/// provider synchronously.
pub(crate) struct AuthState {
    registry: Arc<Mutex<Registry>>,
    delivery: Mutex<()>,
}

impl AuthState {
    pub(crate) fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
                current: None,
            })),
            delivery: Mutex::new(()),
        }
    }

    pub(crate) fn current(&self) -> Option<ProviderIdentity> {
        self.registry.lock().current.clone()
    }

    /// Replace the current identity, notifying listeners if it changed.
    pub(crate) fn set(&self, identity: Option<ProviderIdentity>) {
        let _delivery = self.delivery.lock();

        let listeners = {
            let mut registry = self.registry.lock();
            let unchanged =
                registry.current.as_ref().map(|i| &i.uid) == identity.as_ref().map(|i| &i.uid);
            registry.current = identity.clone();
            if unchanged {
                return;
            }
            registry
                .listeners
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect::<Vec<_>>()
        };

        let event = to_event(identity);
        for listener in listeners {
            listener(event.clone());
        }
    }

    pub(crate) fn subscribe(&self, listener: AuthStateListener) -> Subscription {
        let _delivery = self.delivery.lock();

        let (id, current) = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, listener.clone()));
            (id, registry.current.clone())
        };

        listener(to_event(current));

        let registry = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().listeners.retain(|(other, _)| *other != id);
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

fn to_event(identity: Option<ProviderIdentity>) -> SessionEvent {
    match identity {
        Some(identity) => SessionEvent::SignedIn(identity),
        None => SessionEvent::SignedOut,
    }
}
