use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use ulid::Ulid;

use crate::store::{CollectionPath, Listener, Snapshot};

/// A registered listener plus its liveness flag. The flag is cleared on
/// cancel so a delivery already in flight stops before invoking it.
#[derive(Clone)]
pub struct Registration {
    pub id: Ulid,
    active: Arc<AtomicBool>,
    listener: Listener,
}

impl Registration {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Invoke the listener unless it was cancelled in the meantime.
    pub fn deliver(&self, snapshot: Snapshot) -> bool {
        if !self.is_active() {
            return false;
        }
        (self.listener)(snapshot);
        true
    }
}

/// Listener registry per collection.
pub struct ListenerHub {
    channels: DashMap<CollectionPath, Vec<Registration>>,
}

impl Default for ListenerHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Register a listener for a collection. Creates the channel if needed.
    pub fn subscribe(&self, path: &CollectionPath, listener: Listener) -> Registration {
        let registration = Registration {
            id: Ulid::new(),
            active: Arc::new(AtomicBool::new(true)),
            listener,
        };
        self.channels
            .entry(path.clone())
            .or_default()
            .push(registration.clone());
        registration
    }

    /// Deactivate and drop a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, path: &CollectionPath, id: Ulid) -> bool {
        let mut removed = false;
        if let Some(mut regs) = self.channels.get_mut(path) {
            regs.retain(|r| {
                if r.id == id {
                    r.active.store(false, Ordering::Release);
                    removed = true;
                    false
                } else {
                    true
                }
            });
        }
        self.channels.remove_if(path, |_, regs| regs.is_empty());
        removed
    }

    /// Clone out the listeners of a collection so delivery runs without
    /// holding the map lock. Listeners may subscribe or cancel re-entrantly.
    pub fn listeners(&self, path: &CollectionPath) -> Vec<Registration> {
        self.channels
            .get(path)
            .map(|regs| regs.value().clone())
            .unwrap_or_default()
    }

    /// Deliver a snapshot to every live listener. No-op if nobody is listening.
    pub fn send(&self, snapshot: &Snapshot) -> usize {
        self.listeners(&snapshot.path)
            .iter()
            .filter(|r| r.deliver(snapshot.clone()))
            .count()
    }

    pub fn listener_count(&self, path: &CollectionPath) -> usize {
        self.channels.get(path).map(|regs| regs.len()).unwrap_or(0)
    }

    pub fn total_listeners(&self) -> usize {
        self.channels.iter().map(|e| e.value().len()).sum()
    }
}
