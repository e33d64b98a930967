use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::model::*;
use crate::observability;
use crate::schema;
use crate::store::{CollectionPath, Listener, Snapshot, Subscription};

use super::Session;

// ── Subscription bookkeeping ─────────────────────────────────────

/// A store subscription counted in the active-subscriptions gauge.
struct Tracked {
    _sub: Subscription,
}

impl Tracked {
    fn new(sub: Subscription) -> Self {
        metrics::gauge!(observability::SUBSCRIPTIONS_ACTIVE).increment(1.0);
        Self { _sub: sub }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        metrics::gauge!(observability::SUBSCRIPTIONS_ACTIVE).decrement(1.0);
    }
}

/// Both sub-collection subscriptions of one apartment. `live` is cleared
/// before the subscriptions are cancelled so a delivery already in flight
/// cannot touch the mirror.
pub(super) struct ApartmentSubscriptions {
    live: Arc<AtomicBool>,
    _reservations: Tracked,
    _expenses: Tracked,
}

impl Drop for ApartmentSubscriptions {
    fn drop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(super) struct Subscriptions {
    apartments: Option<Tracked>,
    per_apartment: HashMap<DocId, ApartmentSubscriptions>,
}

impl Subscriptions {
    pub fn count(&self) -> usize {
        usize::from(self.apartments.is_some()) + 2 * self.per_apartment.len()
    }
}

// ── Snapshot handling ────────────────────────────────────────────

impl Session {
    /// Subscribe to the apartment list. The first snapshot arrives, and is
    /// reconciled, before this returns.
    pub(super) fn start(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let listener: Listener = Arc::new(move |snapshot| {
            if let Some(session) = weak.upgrade() {
                session.on_apartments(snapshot);
            }
        });
        let sub = self
            .store
            .subscribe(&CollectionPath::apartments(&self.user), listener);

        let mut subs = self.lock_subs();
        if self.is_closed() {
            return;
        }
        subs.apartments = Some(Tracked::new(sub));
    }

    fn on_apartments(self: &Arc<Self>, snapshot: Snapshot) {
        let mut subs = self.lock_subs();
        if self.is_closed() {
            return;
        }
        let list: Vec<Apartment> = snapshot.docs.iter().map(schema::apartment_from_doc).collect();
        let present: HashSet<DocId> = list.iter().map(|a| a.id).collect();
        if !self.state.replace_apartments(snapshot.version, list) {
            metrics::counter!(observability::SNAPSHOTS_STALE_TOTAL).increment(1);
            debug!("dropped stale apartment snapshot v{}", snapshot.version);
            return;
        }
        metrics::counter!(observability::SNAPSHOTS_APPLIED_TOTAL, "collection" => "apartments").increment(1);

        // Reconcile: keep, add new, cancel removed.
        let gone: Vec<DocId> = subs
            .per_apartment
            .keys()
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        let mut cancelled = Vec::with_capacity(gone.len());
        if !gone.is_empty() {
            let _gate = self.lock_apply();
            for id in &gone {
                if let Some(s) = subs.per_apartment.remove(id) {
                    s.live.store(false, Ordering::SeqCst);
                    cancelled.push(s);
                }
                self.state.forget(*id);
            }
        }
        let mut added = 0usize;
        for id in present {
            if !subs.per_apartment.contains_key(&id) {
                let s = self.subscribe_apartment(id);
                subs.per_apartment.insert(id, s);
                added += 1;
            }
        }
        let kept = subs.per_apartment.len() - added;
        drop(subs);
        drop(cancelled);

        debug!(
            "apartments v{}: {added} added, {} removed, {kept} kept",
            snapshot.version,
            gone.len()
        );
        self.notify_changed();
    }

    fn subscribe_apartment(self: &Arc<Self>, apartment: DocId) -> ApartmentSubscriptions {
        let live = Arc::new(AtomicBool::new(true));

        let reservations: Listener = {
            let weak = Arc::downgrade(self);
            let live = live.clone();
            Arc::new(move |snapshot| {
                if let Some(session) = weak.upgrade() {
                    session.on_reservations(apartment, &live, snapshot);
                }
            })
        };
        let expenses: Listener = {
            let weak = Arc::downgrade(self);
            let live = live.clone();
            Arc::new(move |snapshot| {
                if let Some(session) = weak.upgrade() {
                    session.on_expenses(apartment, &live, snapshot);
                }
            })
        };

        let reservations = self
            .store
            .subscribe(&CollectionPath::reservations(&self.user, apartment), reservations);
        let expenses = self
            .store
            .subscribe(&CollectionPath::expenses(&self.user, apartment), expenses);
        ApartmentSubscriptions {
            live,
            _reservations: Tracked::new(reservations),
            _expenses: Tracked::new(expenses),
        }
    }

    fn on_reservations(&self, apartment: DocId, live: &AtomicBool, snapshot: Snapshot) {
        let gate = self.lock_apply();
        if !live.load(Ordering::SeqCst) || self.is_closed() {
            return;
        }
        let list = snapshot
            .docs
            .iter()
            .filter_map(|doc| schema::reservation_from_doc(apartment, doc))
            .collect();
        if self.state.replace_reservations(apartment, snapshot.version, list) {
            metrics::counter!(observability::SNAPSHOTS_APPLIED_TOTAL, "collection" => "reservations").increment(1);
            debug!("reservations of {apartment} at v{}", snapshot.version);
            drop(gate);
            self.notify_changed();
        } else {
            metrics::counter!(observability::SNAPSHOTS_STALE_TOTAL).increment(1);
        }
    }

    fn on_expenses(&self, apartment: DocId, live: &AtomicBool, snapshot: Snapshot) {
        let gate = self.lock_apply();
        if !live.load(Ordering::SeqCst) || self.is_closed() {
            return;
        }
        let list = snapshot
            .docs
            .iter()
            .filter_map(|doc| schema::expense_from_doc(apartment, doc))
            .collect();
        if self.state.replace_expenses(apartment, snapshot.version, list) {
            metrics::counter!(observability::SNAPSHOTS_APPLIED_TOTAL, "collection" => "expenses").increment(1);
            debug!("expenses of {apartment} at v{}", snapshot.version);
            drop(gate);
            self.notify_changed();
        } else {
            metrics::counter!(observability::SNAPSHOTS_STALE_TOTAL).increment(1);
        }
    }
}
