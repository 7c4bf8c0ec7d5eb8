//! Identity resolver.
//!
//! Turns provider auth-state transitions into published application users.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use campus_core::domain::{AuthUser, ProviderIdentity, RedirectIntent, SessionEvent};
use campus_core::ports::BackendApi;

use crate::completion::ProfileCompletionCache;
use crate::slot::SessionSlot;

const REDIRECT_CAPACITY: usize = 16;

pub struct IdentityResolver {
    backend: Arc<dyn BackendApi>,
    cache: Arc<ProfileCompletionCache>,
    slot: Arc<SessionSlot>,
    /// Identity of the latest signed-in event.
    identity: Mutex<Option<ProviderIdentity>>,
    active_view: RwLock<String>,
    redirects: broadcast::Sender<RedirectIntent>,
}

impl IdentityResolver {
    pub(crate) fn new(
        backend: Arc<dyn BackendApi>,
        cache: Arc<ProfileCompletionCache>,
        slot: Arc<SessionSlot>,
    ) -> Self {
        let (redirects, _) = broadcast::channel(REDIRECT_CAPACITY);
        Self {
            backend,
            cache,
            slot,
            identity: Mutex::new(None),
            active_view: RwLock::new("/".to_string()),
            redirects,
        }
    }

    /// Apply one provider transition. Events must be fed in delivery order.
    ///
    /// A signed-in event starts a resolution in the background and returns
    /// its handle; a later event supersedes it.
    pub fn handle_event(self: &Arc<Self>, event: SessionEvent) -> Option<JoinHandle<()>> {
        match event {
            SessionEvent::SignedIn(identity) => {
                *self.identity.lock() = Some(identity.clone());
                Some(self.start(identity))
            }
            SessionEvent::SignedOut => {
                self.sign_out();
                None
            }
        }
    }

    /// Resolve the current provider identity again.
    pub fn resync(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let identity = self.identity.lock().clone()?;
        tracing::debug!(uid = %identity.uid, "Resolving provider identity again");
        Some(self.start(identity))
    }

    /// Publish "no user" and drop any resolution in flight.
    pub fn sign_out(&self) {
        *self.identity.lock() = None;
        self.slot.sign_out();
    }

    pub fn set_active_view(&self, path: impl Into<String>) {
        *self.active_view.write() = path.into();
    }

    pub fn active_view(&self) -> String {
        self.active_view.read().clone()
    }

    /// Redirect intents emitted when a session resolves on an entry view.
    pub fn redirects(&self) -> broadcast::Receiver<RedirectIntent> {
        self.redirects.subscribe()
    }

    fn start(self: &Arc<Self>, identity: ProviderIdentity) -> JoinHandle<()> {
        let generation = self.slot.begin_resolution();
        tracing::debug!(uid = %identity.uid, generation, "Resolving provider identity");

        let this = self.clone();
        tokio::spawn(async move { this.resolve(identity, generation).await })
    }

    async fn resolve(&self, identity: ProviderIdentity, generation: u64) {
        let session = match self.backend.lookup_user(&identity.uid).await {
            Ok(session) => session,
            Err(e) => {
                if e.is_not_found() {
                    tracing::warn!(
                        uid = %identity.uid,
                        "No application account for provider identity"
                    );
                } else {
                    tracing::warn!(uid = %identity.uid, error = %e, "User lookup failed");
                }
                if !self.slot.complete_resolution(generation, None) {
                    tracing::debug!(
                        uid = %identity.uid,
                        generation,
                        "Discarding superseded lookup failure"
                    );
                }
                return;
            }
        };

        let profile_complete = self
            .cache
            .get_completion_status(session.user_id, session.role, &session.token)
            .await
            .into_value();

        let user = AuthUser::new(identity, session, profile_complete);
        let (user_id, role) = (user.user_id(), user.role());

        if !self.slot.complete_resolution(generation, Some(user)) {
            tracing::debug!(user_id, generation, "Discarding superseded resolution");
            return;
        }

        tracing::info!(user_id, role = %role, profile_complete, "Session resolved");

        if let Some(intent) = RedirectIntent::from_view(&self.active_view(), role) {
            tracing::debug!(from = %intent.from, to = intent.to, "Redirect intent");
            // No subscribers is fine.
            let _ = self.redirects.send(intent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionConfig;
    use crate::slot::ResolverPhase;
    use crate::testing::{ScriptedBackend, complete_teacher};
    use campus_core::domain::{Profile, Role};
    use campus_infra::SlidingWindowRateLimiter;
    use std::time::Duration;

    fn resolver(backend: Arc<ScriptedBackend>) -> (Arc<IdentityResolver>, Arc<SessionSlot>) {
        let cache = Arc::new(ProfileCompletionCache::new(
            backend.clone(),
            Arc::new(SlidingWindowRateLimiter::default()),
            CompletionConfig::default(),
        ));
        let slot = Arc::new(SessionSlot::new());
        let resolver = Arc::new(IdentityResolver::new(backend, cache, slot.clone()));
        (resolver, slot)
    }

    fn signed_in(uid: &str) -> SessionEvent {
        SessionEvent::SignedIn(ProviderIdentity::new(uid, Some(format!("{}@campus.edu", uid))))
    }

    #[tokio::test]
    async fn test_signed_in_publishes_enriched_user() {
        let backend = ScriptedBackend::new();
        let session = backend.add_user("ada", Role::Teacher, complete_teacher());
        let (resolver, slot) = resolver(backend);

        let resolution = resolver.handle_event(signed_in("ada")).unwrap();
        assert!(slot.snapshot().loading);
        assert_eq!(slot.snapshot().phase, ResolverPhase::Authenticating);
        resolution.await.unwrap();

        let snapshot = slot.snapshot();
        let user = snapshot.user.unwrap();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.phase, ResolverPhase::Resolved);
        assert_eq!(user.uid(), "ada");
        assert_eq!(user.role(), Role::Teacher);
        assert_eq!(user.user_id(), session.user_id);
        assert_eq!(user.token(), &session.token);
        assert!(user.profile_complete);
    }

    #[tokio::test]
    async fn test_lookup_failure_publishes_no_user() {
        let backend = ScriptedBackend::new();
        let (resolver, slot) = resolver(backend);

        resolver.handle_event(signed_in("ghost")).unwrap().await.unwrap();

        let snapshot = slot.snapshot();
        assert!(snapshot.user.is_none());
        assert!(!snapshot.loading);
        assert_eq!(snapshot.phase, ResolverPhase::Unresolvable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_resolution_does_not_overwrite_later_sign_out() {
        let backend = ScriptedBackend::new();
        backend.add_user("ada", Role::Teacher, complete_teacher());
        backend.delay_lookup("ada", Duration::from_millis(100));
        let (resolver, slot) = resolver(backend);

        let resolution = resolver.handle_event(signed_in("ada")).unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(resolver.handle_event(SessionEvent::SignedOut).is_none());
        tokio::time::advance(Duration::from_millis(60)).await;
        resolution.await.unwrap();

        let snapshot = slot.snapshot();
        assert!(snapshot.user.is_none());
        assert_eq!(snapshot.phase, ResolverPhase::SignedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_identity_wins() {
        let backend = ScriptedBackend::new();
        backend.add_user("slow", Role::Teacher, complete_teacher());
        let fast = backend.add_user("fast", Role::Student, Profile::default());
        backend.delay_lookup("slow", Duration::from_millis(100));
        let (resolver, slot) = resolver(backend);

        let first = resolver.handle_event(signed_in("slow")).unwrap();
        let second = resolver.handle_event(signed_in("fast")).unwrap();
        second.await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        first.await.unwrap();

        assert_eq!(slot.snapshot().user.map(|u| u.user_id()), Some(fast.user_id));
    }

    #[tokio::test]
    async fn test_redirect_intent_only_on_entry_views() {
        let backend = ScriptedBackend::new();
        backend.add_user("ada", Role::Teacher, complete_teacher());
        let (resolver, _slot) = resolver(backend);
        let mut redirects = resolver.redirects();

        resolver.set_active_view("/teacher/batches/4");
        resolver.handle_event(signed_in("ada")).unwrap().await.unwrap();
        assert!(redirects.try_recv().is_err());

        resolver.set_active_view("/login");
        resolver.resync().unwrap().await.unwrap();
        let intent = redirects.try_recv().unwrap();
        assert_eq!(intent.to, "/teacher/dashboard");
        assert_eq!(intent.from, "/login");
    }

    #[tokio::test]
    async fn test_resync_without_identity_is_noop() {
        let backend = ScriptedBackend::new();
        let (resolver, _slot) = resolver(backend.clone());

        assert!(resolver.resync().is_none());
        resolver.handle_event(SessionEvent::SignedOut);
        assert!(resolver.resync().is_none());
        assert_eq!(backend.lookups.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
