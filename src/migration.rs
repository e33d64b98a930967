use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::calendar::now_ms;
use crate::legacy::{self, LegacyError, LegacyStore};
use crate::model::ApartmentDraft;
use crate::observability;
use crate::schema;
use crate::store::{CollectionPath, DocumentStore, StoreError};

/// Apartments created when there is nothing to import.
pub const SEED_APARTMENTS: [&str; 2] = ["Apt 1", "Apt 2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// This migrator already ran (or is running).
    AlreadyDone,
    /// The account already has apartments; nothing was written.
    RemoteNotEmpty,
    Seeded,
    Imported {
        apartments: usize,
        reservations: usize,
        expenses: usize,
    },
    /// Stopped part way. Whatever was written stays; there is no retry.
    Failed,
}

impl MigrationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MigrationOutcome::AlreadyDone => "already_done",
            MigrationOutcome::RemoteNotEmpty => "remote_not_empty",
            MigrationOutcome::Seeded => "seeded",
            MigrationOutcome::Imported { .. } => "imported",
            MigrationOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug)]
enum MigrationError {
    Store(StoreError),
    Legacy(LegacyError),
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::Store(e) => write!(f, "{e}"),
            MigrationError::Legacy(e) => write!(f, "{e}"),
        }
    }
}

impl From<StoreError> for MigrationError {
    fn from(e: StoreError) -> Self {
        MigrationError::Store(e)
    }
}

impl From<LegacyError> for MigrationError {
    fn from(e: LegacyError) -> Self {
        MigrationError::Legacy(e)
    }
}

/// One-time import of the old on-device records into an empty account.
pub struct Migrator {
    store: Arc<dyn DocumentStore>,
    legacy: Arc<dyn LegacyStore>,
    user: String,
    done: AtomicBool,
}

impl Migrator {
    pub fn new(store: Arc<dyn DocumentStore>, legacy: Arc<dyn LegacyStore>, user: impl Into<String>) -> Self {
        Self {
            store,
            legacy,
            user: user.into(),
            done: AtomicBool::new(false),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Import legacy records if the account has no apartments yet. Runs at
    /// most once per migrator and never fails: errors are logged and the
    /// migrator is marked done anyway.
    pub async fn migrate_if_empty(&self) -> MigrationOutcome {
        if self.done.swap(true, Ordering::SeqCst) {
            return MigrationOutcome::AlreadyDone;
        }
        let outcome = match self.run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("migration for {} stopped: {e}", self.user);
                MigrationOutcome::Failed
            }
        };
        metrics::counter!(observability::MIGRATIONS_TOTAL, "outcome" => outcome.label()).increment(1);
        info!("migration for {}: {outcome:?}", self.user);
        outcome
    }

    async fn run(&self) -> Result<MigrationOutcome, MigrationError> {
        let apartments = CollectionPath::apartments(&self.user);
        if !self.store.get_all(&apartments).await?.is_empty() {
            return Ok(MigrationOutcome::RemoteNotEmpty);
        }

        let imported = legacy::load(self.legacy.as_ref()).await?;
        if imported.is_empty() {
            for name in SEED_APARTMENTS {
                let draft = ApartmentDraft {
                    name: name.to_string(),
                    price_per_day: None,
                };
                self.store
                    .add(&apartments, schema::apartment_fields(&draft, now_ms()))
                    .await?;
            }
            return Ok(MigrationOutcome::Seeded);
        }

        let (mut reservations, mut expenses) = (0, 0);
        for apt in &imported {
            // Fresh id; the legacy id is only used to find the children.
            let id = self
                .store
                .add(&apartments, schema::apartment_fields(&apt.draft, now_ms()))
                .await?;
            let path = CollectionPath::reservations(&self.user, id);
            for draft in &apt.reservations {
                self.store.add(&path, schema::reservation_fields(draft, now_ms())).await?;
                reservations += 1;
            }
            let path = CollectionPath::expenses(&self.user, id);
            for draft in &apt.expenses {
                self.store.add(&path, schema::expense_fields(draft, now_ms())).await?;
                expenses += 1;
            }
        }
        Ok(MigrationOutcome::Imported {
            apartments: imported.len(),
            reservations,
            expenses,
        })
    }
}
