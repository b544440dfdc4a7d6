use crate::job::{registry::Record, Id};
use catvault_core::descriptor::Descriptor;

/// Errors raised by an execution runtime. The controller translates these
/// into its own taxonomy without dropping the original cause.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("no execution for job {0}")]
    NoSuchExecution(Id),
    #[error("execution for job {0} is not running")]
    ExecutionNotRunning(Id),
    #[error("execution for job {0} is already running")]
    ExecutionAlreadyRunning(Id),
    #[error("job {0} already ran to completion")]
    InstanceAlreadyComplete(Id),
    #[error("restart of job {0} was rejected")]
    RestartRejected(Id, #[source] eyre::Report),
    #[error("invalid job parameters")]
    InvalidParameters(#[source] eyre::Report),
    #[error(transparent)]
    Other(#[from] eyre::Report),
}

/// The batch execution runtime the job control layer drives. It owns the
/// worker that mutates an execution record while a job runs; the control
/// layer only submits work and hands over signals.
#[async_trait::async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Starts executing the descriptor's steps, mutating `record` as the run
    /// progresses. On error nothing was started.
    async fn submit(&self, record: Record, descriptor: Descriptor) -> Result<(), RuntimeError>;

    /// Signals a cooperative stop. Returns once the signal is handed off,
    /// not once the job stopped.
    async fn request_stop(&self, id: Id) -> Result<(), RuntimeError>;

    /// Restarts a stopped job from its last checkpoint, under the same id.
    async fn request_resume(&self, id: Id) -> Result<(), RuntimeError>;

    /// Releases any resources still held for a job that will never resume.
    async fn request_abandon(&self, id: Id) -> Result<(), RuntimeError>;
}
