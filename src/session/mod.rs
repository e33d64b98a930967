mod error;
mod mutations;
mod queries;
mod state;
mod sync;
mod validate;

pub use error::{SessionError, ValidationError};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::info;

use crate::locale::Lang;
use crate::store::DocumentStore;

use state::SessionState;
use sync::Subscriptions;

/// Live mirror of one user's apartments, reservations and expenses.
///
/// Subscribes to the apartment list and keeps one reservation and one
/// expense subscription per listed apartment. All writes go to the store;
/// the mirror only ever changes through subscription snapshots.
pub struct Session {
    store: Arc<dyn DocumentStore>,
    user: String,
    lang: Lang,
    state: SessionState,
    subs: Mutex<Subscriptions>,
    /// Held while a per-apartment snapshot is checked and applied. Lock
    /// order is `subs` then `apply_gate`.
    apply_gate: Mutex<()>,
    closed: AtomicBool,
    /// Bumped after every applied snapshot.
    changes: watch::Sender<u64>,
}

impl Session {
    /// Start mirroring `user`'s collections. The current store contents are
    /// mirrored before this returns.
    pub fn open(store: Arc<dyn DocumentStore>, user: impl Into<String>, lang: Lang) -> Arc<Self> {
        let (changes, _) = watch::channel(0);
        let session = Arc::new(Self {
            store,
            user: user.into(),
            lang,
            state: SessionState::default(),
            subs: Mutex::new(Subscriptions::default()),
            apply_gate: Mutex::new(()),
            closed: AtomicBool::new(false),
            changes,
        });
        session.start();
        info!(
            "session opened for {} ({} apartments)",
            session.user,
            session.state.apartments().len()
        );
        session
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Receiver that sees a new value after every mirror change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Live store subscriptions: the apartment list plus two per apartment.
    pub fn subscription_count(&self) -> usize {
        self.lock_subs().count()
    }

    /// Cancel every subscription exactly once. The mirror keeps its last
    /// contents but never changes again.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subs = std::mem::take(&mut *self.lock_subs());
        let cancelled = subs.count();
        drop(subs);
        // Wait out any delivery that passed its closed check before the swap.
        drop(self.lock_apply());
        info!("session for {} closed, {cancelled} subscriptions cancelled", self.user);
        self.notify_changed();
    }

    fn lock_subs(&self) -> MutexGuard<'_, Subscriptions> {
        self.subs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_apply(&self) -> MutexGuard<'_, ()> {
        self.apply_gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_changed(&self) {
        self.changes.send_modify(|n| *n = n.wrapping_add(1));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
