//! The single published session.

use parking_lot::Mutex;
use tokio::sync::watch;

use campus_core::domain::AuthUser;

/// Where the identity resolver stands for the latest provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverPhase {
    SignedOut,
    /// Exchanging a provider identity for an application session.
    Authenticating,
    Resolved,
    /// Signed in with the provider but no application session could be
    /// obtained. No user is published.
    Unresolvable,
}

/// What session consumers observe.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<AuthUser>,
    /// True until the first provider event has been handled and while a
    /// resolution is in flight.
    pub loading: bool,
    pub phase: ResolverPhase,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            user: None,
            loading: true,
            phase: ResolverPhase::SignedOut,
        }
    }
}

/// Holds the current session and the generation of the latest resolution.
///
/// Every write that depends on a resolution compares its generation under
/// `generation`'s lock, so a superseded result can never be published.
pub(crate) struct SessionSlot {
    generation: Mutex<u64>,
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionSlot {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::initial());
        Self {
            generation: Mutex::new(0),
            tx,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// Start a new resolution. Earlier generations become stale.
    /// The current user, if any, stays published until the result lands.
    pub(crate) fn begin_resolution(&self) -> u64 {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.tx.send_modify(|snapshot| {
            snapshot.loading = true;
            snapshot.phase = ResolverPhase::Authenticating;
        });
        *generation
    }

    /// Publish the outcome of resolution `generation` if it is still current.
    pub(crate) fn complete_resolution(&self, generation: u64, user: Option<AuthUser>) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            return false;
        }
        let phase = if user.is_some() {
            ResolverPhase::Resolved
        } else {
            ResolverPhase::Unresolvable
        };
        self.tx.send_replace(SessionSnapshot {
            user,
            loading: false,
            phase,
        });
        true
    }

    /// Publish "no user", superseding any resolution in flight.
    pub(crate) fn sign_out(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.tx.send_if_modified(|snapshot| {
            let signed_out = SessionSnapshot {
                user: None,
                loading: false,
                phase: ResolverPhase::SignedOut,
            };
            if *snapshot == signed_out {
                return false;
            }
            *snapshot = signed_out;
            true
        });
    }

    /// The published user with the generation it belongs to.
    pub(crate) fn current_user(&self) -> Option<(u64, AuthUser)> {
        let generation = self.generation.lock();
        let snapshot = self.tx.borrow();
        snapshot.user.clone().map(|user| (*generation, user))
    }

    /// Update `profile_complete` on the published user if it is still the
    /// user of `generation`. Returns whether the user still matched.
    pub(crate) fn set_profile_complete(
        &self,
        generation: u64,
        user_id: i64,
        complete: bool,
    ) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            return false;
        }
        let mut matched = false;
        self.tx.send_if_modified(|snapshot| match snapshot.user.as_mut() {
            Some(user) if user.user_id() == user_id => {
                matched = true;
                let changed = user.profile_complete != complete;
                user.profile_complete = complete;
                changed
            }
            _ => false,
        });
        matched
    }
}
