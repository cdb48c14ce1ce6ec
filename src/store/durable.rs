use std::io;
use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::observability;
use crate::wal::Wal;

use super::{InMemoryStore, ResourceStore, StoreError, WindowStore};

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that queue up while a flush is running are written
/// together and acknowledged after a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_control(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }
        commit_batch(&mut wal, batch);
        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let mut result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-written bytes don't bleed into the next batch.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let reply = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
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
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Durable store: an [`InMemoryStore`] whose every mutation is first
/// committed to a write-ahead log. State is rebuilt by replay on open.
pub struct WalStore {
    memory: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared across append+apply; compaction takes it
    /// exclusively so the snapshot never misses an acknowledged append.
    apply_gate: RwLock<()>,
}

impl WalStore {
    /// Replay `wal_path` and start the writer task. Must run inside a tokio runtime.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let memory = InMemoryStore::new();
        for event in &events {
            memory.apply_event(event);
        }
        info!(
            path = %wal_path.display(),
            events = events.len(),
            resources = memory.resource_count(),
            windows = memory.window_count(),
            "replayed WAL"
        );

        Ok(Self {
            memory,
            wal_tx,
            apply_gate: RwLock::new(()),
        })
    }

    /// Read-only view of the replayed state.
    pub fn memory(&self) -> &InMemoryStore {
        &self.memory
    }

    pub async fn register_resource(&self, resource: Resource) -> Result<(), StoreError> {
        if self.memory.contains_resource(&resource.id) {
            return Err(StoreError::AlreadyExists(resource.id));
        }
        self.persist_and_apply(Event::ResourceRegistered {
            id: resource.id,
            name: resource.name,
            operational: resource.operational,
        })
        .await
    }

    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
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

    async fn persist_and_apply(&self, event: Event) -> Result<(), StoreError> {
        let _gate = self.apply_gate.read().await;
        self.wal_append(&event).await?;
        self.memory.apply_event(&event);
        Ok(())
    }

    /// Rewrite the WAL to the minimal event set for the current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _gate = self.apply_gate.write().await;
        let events = self.memory.snapshot_events();
        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))?;
        metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!(events = count, "compacted WAL");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl ResourceStore for WalStore {
    async fn get_resource(&self, id: Ulid) -> Result<Option<Resource>, StoreError> {
        self.memory.get_resource(id).await
    }

    async fn set_operational(&self, id: Ulid, operational: bool) -> Result<(), StoreError> {
        if !self.memory.contains_resource(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.persist_and_apply(Event::OperationalSet { id, operational })
            .await
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        self.memory.list_resources().await
    }
}

#[async_trait]
impl WindowStore for WalStore {
    async fn get_window(&self, id: Ulid) -> Result<Option<Window>, StoreError> {
        self.memory.get_window(id).await
    }

    async fn insert_window(&self, window: &Window) -> Result<(), StoreError> {
        if self.memory.contains_window(&window.id) {
            return Err(StoreError::AlreadyExists(window.id));
        }
        self.persist_and_apply(Event::WindowInserted {
            window: window.clone(),
        })
        .await
    }

    async fn update_window(&self, window: &Window) -> Result<(), StoreError> {
        if !self.memory.contains_window(&window.id) {
            return Err(StoreError::NotFound(window.id));
        }
        self.persist_and_apply(Event::WindowUpdated {
            window: window.clone(),
        })
        .await
    }

    async fn delete_window(&self, id: Ulid) -> Result<(), StoreError> {
        let resource_id = self
            .memory
            .get_window(id)
            .await?
            .map(|w| w.resource_id)
            .ok_or(StoreError::NotFound(id))?;
        self.persist_and_apply(Event::WindowDeleted { id, resource_id })
            .await
    }

    async fn list_all(&self) -> Result<Vec<Window>, StoreError> {
        self.memory.list_all().await
    }

    async fn list_active_by_resource(&self, resource_id: Ulid) -> Result<Vec<Window>, StoreError> {
        self.memory.list_active_by_resource(resource_id).await
    }

    async fn list_by_resource(&self, resource_id: Ulid) -> Result<Vec<Window>, StoreError> {
        self.memory.list_by_resource(resource_id).await
    }
}
