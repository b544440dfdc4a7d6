use crate::job::{
    registry::Registry,
    runtime::{Runtime, RuntimeError},
    Execution, Id, Snapshot, State,
};
use catvault_core::descriptor::{Descriptor, Direction};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("no such job {0}")]
    NoSuchJob(Id),
    #[error("job {0} is not running")]
    NotRunning(Id),
    #[error("job {0} is not resumable")]
    NotResumable(Id),
    #[error("job {0} cannot be abandoned in its current state")]
    IllegalAbandon(Id),
    #[error("could not launch job")]
    LaunchFailed(#[source] RuntimeError),
    #[error("could not resume job {id}")]
    ResumeFailed {
        id: Id,
        #[source]
        source: RuntimeError,
    },
    #[error("runtime error for job {id}")]
    Runtime {
        id: Id,
        #[source]
        source: RuntimeError,
    },
}

/// Control surface over the job state machine: validates legal transitions
/// before handing signals to the execution runtime, and translates runtime
/// errors into the control taxonomy.
#[derive(Debug, Clone)]
pub struct Controller {
    registry: Arc<Registry>,
    runtime: Arc<dyn Runtime>,
}

impl Controller {
    pub fn new(registry: Arc<Registry>, runtime: Arc<dyn Runtime>) -> Self {
        Controller { registry, runtime }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Launches a job for a validated descriptor and returns its id. The
    /// record is registered before the id is returned; if the runtime
    /// rejects the submission no record is registered at all.
    #[tracing::instrument(skip_all, fields(direction = %descriptor.direction))]
    pub async fn launch(&self, descriptor: Descriptor) -> Result<Id, ControlError> {
        let id = self.registry.next_id();
        let record = Arc::new(RwLock::new(Execution::new(id, &descriptor)));
        self.runtime
            .submit(record.clone(), descriptor)
            .await
            .map_err(ControlError::LaunchFailed)?;
        self.registry.insert(record).await;
        tracing::info!(%id, "launched");
        Ok(id)
    }

    /// Requests a cooperative stop. Returns once the stop signal is handed
    /// off; poll until the state leaves STOPPING to observe the actual stop.
    /// Calling this again while the job is already STOPPING is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self, id: Id) -> Result<(), ControlError> {
        let record = self
            .registry
            .get(id)
            .await
            .ok_or(ControlError::NoSuchJob(id))?;
        {
            let mut execution = record.write().await;
            match execution.state() {
                State::Starting | State::Started => execution.mark_stopping(),
                State::Stopping => return Ok(()),
                State::Stopped | State::Completed | State::Failed | State::Abandoned => {
                    return Err(ControlError::NotRunning(id))
                }
            }
        }
        tracing::info!("stopping");
        match self.runtime.request_stop(id).await {
            Ok(()) => Ok(()),
            // the run finished in between; the worker's final state stands
            Err(RuntimeError::ExecutionNotRunning(_)) => Ok(()),
            Err(source) => Err(ControlError::Runtime { id, source }),
        }
    }

    /// Resumes a stopped job from its last checkpoint. The job keeps its id,
    /// so an existing poller keeps observing the same record.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, id: Id) -> Result<Id, ControlError> {
        let record = self
            .registry
            .get(id)
            .await
            .ok_or(ControlError::NoSuchJob(id))?;
        {
            let execution = record.read().await;
            if execution.state() != State::Stopped {
                return Err(ControlError::NotResumable(id));
            }
        }
        tracing::info!("resuming");
        self.runtime
            .request_resume(id)
            .await
            .map_err(|source| ControlError::ResumeFailed { id, source })?;
        Ok(id)
    }

    /// Marks a job that will never finish on its own as abandoned. Only
    /// legal for jobs stuck in STOPPING or resting in STOPPED; an active job
    /// must be stopped first, and terminal jobs never change again.
    #[tracing::instrument(skip(self))]
    pub async fn abandon(&self, id: Id) -> Result<(), ControlError> {
        let record = self
            .registry
            .get(id)
            .await
            .ok_or(ControlError::NoSuchJob(id))?;
        {
            let execution = record.read().await;
            match execution.state() {
                State::Stopping | State::Stopped => {}
                _ => return Err(ControlError::IllegalAbandon(id)),
            }
        }
        match self.runtime.request_abandon(id).await {
            Ok(()) => {}
            // nothing left to release; still mark the record
            Err(RuntimeError::NoSuchExecution(_)) => {}
            Err(source) => return Err(ControlError::Runtime { id, source }),
        }
        record.write().await.mark_abandoned();
        tracing::info!("abandoned");
        Ok(())
    }

    /// Read-only snapshot of a job's current state for pollers.
    pub async fn status(&self, id: Id) -> Result<Snapshot, ControlError> {
        self.registry
            .snapshot(id)
            .await
            .ok_or(ControlError::NoSuchJob(id))
    }

    /// All known jobs of one direction, most recently started first.
    pub async fn list(&self, direction: Direction) -> Vec<Snapshot> {
        self.registry.list(direction).await
    }
}
