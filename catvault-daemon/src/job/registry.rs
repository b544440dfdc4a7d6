use crate::job::{Execution, Id, Snapshot};
use catvault_core::descriptor::Direction;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
};
use tokio::sync::RwLock;

/// Shared handle to one execution record. The execution worker holds the
/// only writer on the hot path; pollers take read locks for snapshots.
pub type Record = Arc<RwLock<Execution>>;

/// Process-wide index of execution records, keyed by job id. Created once at
/// service startup and injected wherever jobs are launched or observed;
/// records are retained for the process lifetime.
#[derive(Debug)]
pub struct Registry {
    jobs: RwLock<HashMap<Id, Record>>,
    next_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            jobs: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The next job id. Ids are monotonic and never handed out twice, even
    /// for jobs that fail to launch.
    pub fn next_id(&self) -> Id {
        Id(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn insert(&self, record: Record) {
        let id = record.read().await.id();
        let mut jobs = self.jobs.write().await;
        jobs.insert(id, record);
    }

    pub async fn get(&self, id: Id) -> Option<Record> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).cloned()
    }

    pub async fn snapshot(&self, id: Id) -> Option<Snapshot> {
        let record = self.get(id).await?;
        let execution = record.read().await;
        Some(execution.snapshot())
    }

    /// All jobs of one direction, most recently started first.
    pub async fn list(&self, direction: Direction) -> Vec<Snapshot> {
        let jobs = self.jobs.read().await;
        let mut snapshots = Vec::new();
        for record in jobs.values() {
            let execution = record.read().await;
            if execution.direction() == direction {
                snapshots.push(execution.snapshot());
            }
        }
        drop(jobs);
        snapshots.sort_by_key(|snapshot| (snapshot.started, snapshot.id));
        snapshots.reverse();
        snapshots
    }
}
