use crate::job::{registry::Registry, Failure, Id, Snapshot, State};
use catvault_core::descriptor::Direction;
use std::{sync::Arc, time::Duration};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// How a watched job ended, resolved exactly once per watch.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// the run collected failures; the first one is surfaced to the user
    Failed(Failure),
    /// the job was stopped on request; nothing to show
    QuietStop,
    /// the run ended cleanly; show the detail view for this job
    Detail { id: Id, direction: Direction },
}

#[derive(Debug, thiserror::Error)]
#[error("no such job {0}")]
pub struct UnknownJob(pub Id);

/// Fixed-interval polling client over the job registry. `watch` is a plain
/// future: dropping it (for example when the surrounding client context is
/// torn down) tears the timer down with it, no orphaned timers remain.
#[derive(Debug, Clone)]
pub struct Poller {
    registry: Arc<Registry>,
    interval: Duration,
}

impl Poller {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_interval(registry, DEFAULT_INTERVAL)
    }

    pub fn with_interval(registry: Arc<Registry>, interval: Duration) -> Self {
        Poller { registry, interval }
    }

    /// Polls the job on a fixed timer, invoking `on_tick` with each active
    /// snapshot, until the job leaves the active states. Reads are
    /// eventually consistent snapshots; the loop keeps polling through
    /// STOPPING until the worker has applied its final state.
    pub async fn watch(
        &self,
        id: Id,
        mut on_tick: impl FnMut(&Snapshot) + Send,
    ) -> Result<Outcome, UnknownJob> {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            let snapshot = self.registry.snapshot(id).await.ok_or(UnknownJob(id))?;
            if snapshot.state.is_active() {
                on_tick(&snapshot);
                continue;
            }
            return Ok(Self::resolve(snapshot));
        }
    }

    fn resolve(snapshot: Snapshot) -> Outcome {
        if let Some(first) = snapshot.failures.first() {
            return Outcome::Failed(first.clone());
        }
        match snapshot.state {
            State::Stopped => Outcome::QuietStop,
            _ => Outcome::Detail {
                id: snapshot.id,
                direction: snapshot.direction,
            },
        }
    }
}
