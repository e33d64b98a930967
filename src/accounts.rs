use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::compactor;
use crate::limits::*;
use crate::store::MemoryStore;

/// Lazily opened per-user stores. Each account gets its own WAL file under
/// the data directory and its own compactor task.
pub struct AccountManager {
    stores: DashMap<String, Arc<MemoryStore>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

/// File-name-safe form of an account name.
pub fn sanitize(user: &str) -> String {
    user.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

impl AccountManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            stores: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    pub fn wal_path(&self, user: &str) -> PathBuf {
        self.data_dir.join(format!("{}.wal", sanitize(user)))
    }

    /// Get or lazily open the store for `user`. Must run inside a tokio runtime.
    pub fn get_or_open(&self, user: &str) -> io::Result<Arc<MemoryStore>> {
        if let Some(store) = self.stores.get(user) {
            return Ok(store.value().clone());
        }
        if user.len() > MAX_ACCOUNT_NAME_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "account name too long"));
        }
        if self.stores.len() >= MAX_ACCOUNTS {
            return Err(io::Error::other("too many accounts"));
        }
        if sanitize(user).is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty account name"));
        }

        // Two callers racing on the same new account share whichever store
        // wins the entry; the loser's store is never exposed.
        let store = match self.stores.entry(user.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => return Ok(e.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let store = Arc::new(MemoryStore::open(self.wal_path(user))?);
                e.insert(store.clone());
                store
            }
        };

        let compacting = store.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compacting, threshold).await;
        });

        metrics::gauge!(crate::observability::ACCOUNTS_ACTIVE).set(self.stores.len() as f64);
        info!("opened account {user} at {}", self.wal_path(user).display());
        Ok(store)
    }

    pub fn account_count(&self) -> usize {
        self.stores.len()
    }
}
