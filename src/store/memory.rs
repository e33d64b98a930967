use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;
use ulid::Ulid;

use crate::model::DocId;
use crate::notify::ListenerHub;
use crate::observability;
use crate::wal::Wal;

use super::*;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: StoreEvent,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<StoreEvent>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (StoreEvent, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that queue up while a flush is running are written
/// together and share one fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let mut batch: Vec<PendingAppend> = Vec::new();
        let mut deferred = None;
        match cmd {
            WalCommand::Append { event, response } => batch.push((event, response)),
            other => deferred = Some(other),
        }
        while deferred.is_none() {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => deferred = Some(other),
                Err(_) => break,
            }
        }
        if !batch.is_empty() {
            flush_batch(&mut wal, batch);
        }
        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let mut result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-written bytes never leak into
    // the next batch.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for (_, response) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = response.send(r);
    }
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => flush_batch(wal, vec![(event, response)]),
    }
}

// ── Store ────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Collection {
    version: u64,
    docs: Vec<Document>,
}

/// In-process [`DocumentStore`]. Documents keep insertion order inside a
/// collection. With a WAL every write is durable before it is applied and
/// announced.
pub struct MemoryStore {
    collections: DashMap<CollectionPath, Collection>,
    hub: Arc<ListenerHub>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
    /// Serializes commit so WAL order, apply order and delivery order agree.
    commit_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store, nothing survives the process.
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            hub: Arc::new(ListenerHub::new()),
            wal_tx: None,
            commit_lock: Mutex::new(()),
        }
    }

    /// Replay `wal_path` and keep appending to it. Must run inside a tokio
    /// runtime: the WAL writer is a spawned task.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut store = Self::new();
        store.wal_tx = Some(wal_tx);
        for event in &events {
            store.apply(event);
        }
        debug!("replayed {} events from {}", events.len(), wal_path.display());
        Ok(store)
    }

    pub fn is_durable(&self) -> bool {
        self.wal_tx.is_some()
    }

    /// Apply a committed event and return the collection's new snapshot.
    fn apply(&self, event: &StoreEvent) -> Snapshot {
        let path = event.path().clone();
        let mut col = self.collections.entry(path.clone()).or_default();
        match event {
            StoreEvent::DocumentAdded { id, fields, .. } => {
                col.docs.push(Document {
                    id: *id,
                    fields: fields.clone(),
                });
            }
            StoreEvent::DocumentUpdated { id, patch, .. } => {
                if let Some(doc) = col.docs.iter_mut().find(|d| d.id == *id) {
                    for (k, v) in patch {
                        doc.fields.insert(k.clone(), v.clone());
                    }
                }
            }
            StoreEvent::DocumentDeleted { id, .. } => {
                col.docs.retain(|d| d.id != *id);
            }
        }
        col.version += 1;
        Snapshot {
            path,
            version: col.version,
            docs: col.docs.clone(),
        }
    }

    fn contains(&self, path: &CollectionPath, id: DocId) -> bool {
        self.collections
            .get(path)
            .is_some_and(|col| col.docs.iter().any(|d| d.id == id))
    }

    fn snapshot(&self, path: &CollectionPath) -> Snapshot {
        match self.collections.get(path) {
            Some(col) => Snapshot {
                path: path.clone(),
                version: col.version,
                docs: col.docs.clone(),
            },
            None => Snapshot {
                path: path.clone(),
                version: 0,
                docs: Vec::new(),
            },
        }
    }

    async fn wal_append(&self, event: &StoreEvent) -> Result<(), StoreError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    /// WAL-append + apply + notify, in commit order.
    async fn commit(&self, op: &'static str, event: StoreEvent) -> Result<(), StoreError> {
        let started = Instant::now();
        let _guard = self.commit_lock.lock().await;
        if let Err(e) = self.wal_append(&event).await {
            metrics::counter!(observability::STORE_WRITES_TOTAL, "op" => op, "status" => "error").increment(1);
            return Err(e);
        }
        let snapshot = self.apply(&event);
        let delivered = self.hub.send(&snapshot);
        debug!(
            "{op} on {} -> version {} ({delivered} listeners)",
            snapshot.path, snapshot.version
        );
        metrics::counter!(observability::STORE_WRITES_TOTAL, "op" => op, "status" => "ok").increment(1);
        metrics::histogram!(observability::STORE_WRITE_DURATION_SECONDS, "op" => op)
            .record(started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Rewrite the WAL as one `DocumentAdded` per live document.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let _guard = self.commit_lock.lock().await;

        let mut paths: Vec<CollectionPath> = self.collections.iter().map(|e| e.key().clone()).collect();
        // Apartments sort before their sub-collections.
        paths.sort();
        let mut events = Vec::new();
        for path in paths {
            if let Some(col) = self.collections.get(&path) {
                events.extend(col.docs.iter().map(|doc| StoreEvent::DocumentAdded {
                    path: path.clone(),
                    id: doc.id,
                    fields: doc.fields.clone(),
                }));
            }
        }

        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let Some(wal_tx) = &self.wal_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub fn document_count(&self, path: &CollectionPath) -> usize {
        self.collections.get(path).map(|col| col.docs.len()).unwrap_or(0)
    }

    pub fn listener_count(&self, path: &CollectionPath) -> usize {
        self.hub.listener_count(path)
    }

    pub fn total_listeners(&self) -> usize {
        self.hub.total_listeners()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_all(&self, path: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        Ok(self.snapshot(path).docs)
    }

    async fn add(&self, path: &CollectionPath, fields: Fields) -> Result<DocId, StoreError> {
        let id = Ulid::new();
        self.commit(
            "add",
            StoreEvent::DocumentAdded {
                path: path.clone(),
                id,
                fields,
            },
        )
        .await?;
        Ok(id)
    }

    async fn update(&self, path: &CollectionPath, id: DocId, patch: Fields) -> Result<(), StoreError> {
        if !self.contains(path, id) {
            return Err(StoreError::NotFound {
                path: path.clone(),
                id,
            });
        }
        self.commit(
            "update",
            StoreEvent::DocumentUpdated {
                path: path.clone(),
                id,
                patch,
            },
        )
        .await
    }

    async fn delete(&self, path: &CollectionPath, id: DocId) -> Result<(), StoreError> {
        if !self.contains(path, id) {
            return Ok(());
        }
        self.commit(
            "delete",
            StoreEvent::DocumentDeleted {
                path: path.clone(),
                id,
            },
        )
        .await
    }

    fn subscribe(&self, path: &CollectionPath, listener: Listener) -> Subscription {
        let registration = self.hub.subscribe(path, listener);
        let id = registration.id;
        registration.deliver(self.snapshot(path));

        let hub = Arc::downgrade(&self.hub);
        let path = path.clone();
        Subscription::new(id, move || {
            if let Some(hub) = hub.upgrade() {
                hub.unsubscribe(&path, id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("homeday_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn recorder() -> (Listener, Arc<StdMutex<Vec<Snapshot>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();
        let listener: Listener = Arc::new(move |snap: Snapshot| s.lock().unwrap().push(snap));
        (listener, seen)
    }

    #[tokio::test]
    async fn add_update_delete() {
        let store = MemoryStore::new();
        let path = CollectionPath::apartments("u1");

        let id = store
            .add(&path, fields(&[("name", "Apt 1".into())]))
            .await
            .unwrap();
        store
            .update(&path, id, fields(&[("pricePerDay", 80.0.into())]))
            .await
            .unwrap();

        let docs = store.get_all(&path).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("name"), Some(&FieldValue::from("Apt 1")));
        assert_eq!(docs[0].get("pricePerDay"), Some(&FieldValue::Number(80.0)));

        store.delete(&path, id).await.unwrap();
        assert!(store.get_all(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryStore::new();
        let path = CollectionPath::apartments("u1");
        let result = store.update(&path, Ulid::new(), Fields::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_missing_document_is_ok() {
        let store = MemoryStore::new();
        let path = CollectionPath::apartments("u1");
        store.delete(&path, Ulid::new()).await.unwrap();
    }

    #[tokio::test]
    async fn subscribe_delivers_current_then_changes() {
        let store = MemoryStore::new();
        let path = CollectionPath::apartments("u1");
        store.add(&path, fields(&[("name", "A".into())])).await.unwrap();

        let (listener, seen) = recorder();
        let sub = store.subscribe(&path, listener);
        store.add(&path, fields(&[("name", "B".into())])).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].docs.len(), 1);
        assert_eq!(seen[1].docs.len(), 2);
        assert!(seen[1].version > seen[0].version);
        drop(sub);
    }

    #[tokio::test]
    async fn cancelled_subscription_gets_nothing() {
        let store = MemoryStore::new();
        let path = CollectionPath::apartments("u1");
        let (listener, seen) = recorder();
        let sub = store.subscribe(&path, listener);
        assert_eq!(store.listener_count(&path), 1);

        sub.cancel();
        assert_eq!(store.listener_count(&path), 0);
        store.add(&path, Fields::new()).await.unwrap();
        // Only the initial empty snapshot.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryStore::new();
        let apt = Ulid::new();
        let res = CollectionPath::reservations("u1", apt);
        let exp = CollectionPath::expenses("u1", apt);
        let (listener, seen) = recorder();
        let _sub = store.subscribe(&res, listener);

        store.add(&exp, Fields::new()).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(store.document_count(&exp), 1);
        assert_eq!(store.document_count(&res), 0);
    }

    #[tokio::test]
    async fn listener_may_subscribe_reentrantly() {
        let store = Arc::new(MemoryStore::new());
        let path = CollectionPath::apartments("u1");
        let inner_subs = Arc::new(StdMutex::new(Vec::new()));

        let s = store.clone();
        let subs = inner_subs.clone();
        let listener: Listener = Arc::new(move |snap: Snapshot| {
            for doc in &snap.docs {
                let sub = s.subscribe(&CollectionPath::reservations("u1", doc.id), Arc::new(|_| {}));
                subs.lock().unwrap().push(sub);
            }
        });
        let _outer = store.subscribe(&path, listener);
        store.add(&path, Fields::new()).await.unwrap();
        assert_eq!(inner_subs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wal_replay_restores_documents() {
        let path = test_wal_path("replay.wal");
        let apts = CollectionPath::apartments("u1");
        let (kept, gone) = {
            let store = MemoryStore::open(path.clone()).unwrap();
            let kept = store.add(&apts, fields(&[("name", "Kept".into())])).await.unwrap();
            let gone = store.add(&apts, fields(&[("name", "Gone".into())])).await.unwrap();
            store.update(&apts, kept, fields(&[("pricePerDay", 55.0.into())])).await.unwrap();
            store.delete(&apts, gone).await.unwrap();
            (kept, gone)
        };

        let store = MemoryStore::open(path).unwrap();
        let docs = store.get_all(&apts).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, kept);
        assert_ne!(docs[0].id, gone);
        assert_eq!(docs[0].get("pricePerDay"), Some(&FieldValue::Number(55.0)));
    }

    #[tokio::test]
    async fn writes_after_torn_tail_survive_restart() {
        let path = test_wal_path("torn_restart.wal");
        let apts = CollectionPath::apartments("u1");
        {
            let store = MemoryStore::open(path.clone()).unwrap();
            store.add(&apts, fields(&[("name", "Before".into())])).await.unwrap();
        }
        {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[50u8, 0, 0, 0, 1, 2]).unwrap();
        }
        {
            let store = MemoryStore::open(path.clone()).unwrap();
            assert_eq!(store.document_count(&apts), 1);
            store.add(&apts, fields(&[("name", "After".into())])).await.unwrap();
            assert_eq!(store.document_count(&apts), 2);
        }

        let store = MemoryStore::open(path).unwrap();
        let names: Vec<_> = store
            .get_all(&apts)
            .await
            .unwrap()
            .iter()
            .filter_map(|d| d.get("name").and_then(FieldValue::as_str).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["Before", "After"]);
    }

    #[tokio::test]
    async fn compaction_keeps_state() {
        let path = test_wal_path("compact.wal");
        let apts = CollectionPath::apartments("u1");
        {
            let store = MemoryStore::open(path.clone()).unwrap();
            let mut last = None;
            for i in 0..20 {
                let id = store.add(&apts, fields(&[("name", format!("A{i}").into())])).await.unwrap();
                if let Some(prev) = last.replace(id) {
                    store.delete(&apts, prev).await.unwrap();
                }
            }
            assert_eq!(store.wal_appends_since_compact().await, 39);
            store.compact_wal().await.unwrap();
            assert_eq!(store.wal_appends_since_compact().await, 0);
        }
        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed.len(), 1);

        let store = MemoryStore::open(path).unwrap();
        let docs = store.get_all(&apts).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("name"), Some(&FieldValue::from("A19")));
    }

    #[tokio::test]
    async fn volatile_store_has_no_wal() {
        let store = MemoryStore::new();
        assert!(!store.is_durable());
        assert_eq!(store.wal_appends_since_compact().await, 0);
        store.compact_wal().await.unwrap();
    }
}
