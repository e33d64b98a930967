use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;

use crate::model::*;

/// One mirrored collection and the snapshot version it was built from.
struct Versioned<T> {
    version: u64,
    items: Arc<Vec<T>>,
}

impl<T> Default for Versioned<T> {
    fn default() -> Self {
        Self {
            version: 0,
            items: Arc::new(Vec::new()),
        }
    }
}

/// Local mirror of the remote collections. Readers get cheap `Arc` clones of
/// whole lists; a list is only ever swapped, never edited in place.
#[derive(Default)]
pub(super) struct SessionState {
    apartments: RwLock<Versioned<Apartment>>,
    reservations: DashMap<DocId, Versioned<Reservation>>,
    expenses: DashMap<DocId, Versioned<Expense>>,
}

fn apartment_order(a: &Apartment, b: &Apartment) -> std::cmp::Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
        .then(a.created_at.cmp(&b.created_at))
}

impl SessionState {
    pub fn apartments(&self) -> Arc<Vec<Apartment>> {
        self.apartments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .clone()
    }

    pub fn reservations(&self, apartment: DocId) -> Arc<Vec<Reservation>> {
        self.reservations
            .get(&apartment)
            .map(|v| v.items.clone())
            .unwrap_or_default()
    }

    pub fn expenses(&self, apartment: DocId) -> Arc<Vec<Expense>> {
        self.expenses
            .get(&apartment)
            .map(|v| v.items.clone())
            .unwrap_or_default()
    }

    /// Replace the apartment list, sorted by name then creation time.
    /// Returns false when `version` is older than what is already mirrored.
    pub fn replace_apartments(&self, version: u64, mut list: Vec<Apartment>) -> bool {
        let mut guard = self.apartments.write().unwrap_or_else(PoisonError::into_inner);
        if version < guard.version {
            return false;
        }
        list.sort_by(apartment_order);
        *guard = Versioned {
            version,
            items: Arc::new(list),
        };
        true
    }

    /// Replace one apartment's reservations, sorted by start day.
    pub fn replace_reservations(&self, apartment: DocId, version: u64, mut list: Vec<Reservation>) -> bool {
        let mut entry = self.reservations.entry(apartment).or_default();
        if version < entry.version {
            return false;
        }
        list.sort_by_key(|r| r.range.start);
        *entry = Versioned {
            version,
            items: Arc::new(list),
        };
        true
    }

    /// Replace one apartment's expenses, sorted by day.
    pub fn replace_expenses(&self, apartment: DocId, version: u64, mut list: Vec<Expense>) -> bool {
        let mut entry = self.expenses.entry(apartment).or_default();
        if version < entry.version {
            return false;
        }
        list.sort_by_key(|e| e.day);
        *entry = Versioned {
            version,
            items: Arc::new(list),
        };
        true
    }

    /// Drop everything mirrored for an apartment that left the list.
    pub fn forget(&self, apartment: DocId) {
        self.reservations.remove(&apartment);
        self.expenses.remove(&apartment);
    }
}
