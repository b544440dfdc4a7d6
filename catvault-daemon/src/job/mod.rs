use catvault_core::descriptor::{Descriptor, Direction, OptionFlags};
use std::path::PathBuf;
use time::OffsetDateTime;

pub mod cancellation;
pub mod controller;
pub mod registry;
pub mod runner;
pub mod runtime;

/// Job id, assigned once by the registry at launch and never reused. The
/// only stable external handle for a job.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone)]
pub struct Id(pub u64);

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum State {
    Starting,
    Started,
    Stopping,
    Stopped,
    Completed,
    Failed,
    Abandoned,
}

impl State {
    /// Terminal states permit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Completed | State::Failed | State::Abandoned)
    }

    /// True while a poller should keep polling.
    pub fn is_active(&self) -> bool {
        matches!(self, State::Starting | State::Started | State::Stopping)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Starting => "starting",
            State::Started => "started",
            State::Stopping => "stopping",
            State::Stopped => "stopped",
            State::Completed => "completed",
            State::Failed => "failed",
            State::Abandoned => "abandoned",
        };
        write!(f, "{}", s)
    }
}

/// A captured error or warning with its full cause chain, outermost message
/// first. Kept as data on the execution record rather than thrown at
/// pollers.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Failure {
    pub chain: Vec<String>,
}

impl Failure {
    pub fn message(&self) -> &str {
        self.chain.first().map(String::as_str).unwrap_or("unknown error")
    }
}

impl From<&eyre::Report> for Failure {
    fn from(report: &eyre::Report) -> Self {
        Failure {
            chain: report.chain().map(|cause| cause.to_string()).collect(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Mutable record of one job, owned by the registry. All mutation goes
/// through the transition methods below, which enforce the legal state
/// edges, keep progress monotonic, and freeze the record once it reaches a
/// terminal state.
#[derive(Debug, Clone)]
pub struct Execution {
    id: Id,
    direction: Direction,
    state: State,
    started: OffsetDateTime,
    progress: f64,
    failures: Vec<Failure>,
    warnings: Vec<Failure>,
    archive: PathBuf,
    options: OptionFlags,
}

impl Execution {
    pub(crate) fn new(id: Id, descriptor: &Descriptor) -> Self {
        Execution {
            id,
            direction: descriptor.direction,
            state: State::Starting,
            started: OffsetDateTime::now_utc(),
            progress: 0.0,
            failures: Vec::new(),
            warnings: Vec::new(),
            archive: descriptor.archive.clone(),
            options: descriptor.options,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn mark_started(&mut self) {
        if matches!(self.state, State::Starting) {
            self.state = State::Started;
        }
    }

    pub fn mark_stopping(&mut self) {
        if matches!(self.state, State::Starting | State::Started) {
            self.state = State::Stopping;
        }
    }

    pub fn mark_stopped(&mut self) {
        if matches!(self.state, State::Starting | State::Started | State::Stopping) {
            self.state = State::Stopped;
        }
    }

    pub fn mark_resuming(&mut self) {
        if matches!(self.state, State::Stopped) {
            self.state = State::Starting;
        }
    }

    pub fn mark_abandoned(&mut self) {
        if matches!(self.state, State::Stopping | State::Stopped) {
            self.state = State::Abandoned;
        }
    }

    /// Final transition of a run: FAILED when any failures were collected,
    /// COMPLETED otherwise.
    pub fn finish(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = if self.failures.is_empty() {
            State::Completed
        } else {
            State::Failed
        };
    }

    /// Progress never decreases over the lifetime of an id. A resumed run
    /// that restarts its interrupted step re-earns the same fraction, it
    /// never reports below the last published value.
    pub fn update_progress(&mut self, fraction: f64) {
        if self.state.is_terminal() {
            return;
        }
        self.progress = self.progress.max(fraction.clamp(0.0, 1.0));
    }

    pub fn push_failure(&mut self, failure: Failure) {
        if self.state.is_terminal() {
            return;
        }
        self.failures.push(failure);
    }

    pub fn push_warning(&mut self, warning: Failure) {
        if self.state.is_terminal() {
            return;
        }
        self.warnings.push(warning);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            id: self.id,
            direction: self.direction,
            state: self.state,
            started: self.started,
            progress: self.progress,
            failures: self.failures.clone(),
            warnings: self.warnings.clone(),
            archive: self.archive.clone(),
            options: self.options,
        }
    }
}

/// Read-only view of an execution record as observed by a poller at one
/// instant. Re-poll for a fresher one; never assume it reflects the very
/// latest write.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: Id,
    pub direction: Direction,
    pub state: State,
    pub started: OffsetDateTime,
    pub progress: f64,
    pub failures: Vec<Failure>,
    pub warnings: Vec<Failure>,
    pub archive: PathBuf,
    pub options: OptionFlags,
}

#[cfg(test)]
mod tests {
    use super::*;
    use catvault_core::filter::Selectors;

    fn execution() -> Execution {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");
        let descriptor = Descriptor::new(
            Direction::Backup,
            path,
            Selectors::default(),
            OptionFlags::default(),
        )
        .unwrap();
        Execution::new(Id(1), &descriptor)
    }

    #[test]
    fn should_walk_the_happy_path_edges() {
        let mut execution = execution();
        assert_eq!(execution.state(), State::Starting);

        execution.mark_started();
        assert_eq!(execution.state(), State::Started);

        execution.finish();
        assert_eq!(execution.state(), State::Completed);
    }

    #[test]
    fn should_finish_as_failed_when_failures_were_collected() {
        let mut execution = execution();
        execution.mark_started();
        execution.push_failure(Failure {
            chain: vec!["boom".to_string()],
        });

        execution.finish();

        assert_eq!(execution.state(), State::Failed);
    }

    #[test]
    fn should_freeze_terminal_records() {
        let mut execution = execution();
        execution.mark_started();
        execution.update_progress(0.5);
        execution.finish();
        assert_eq!(execution.state(), State::Completed);

        execution.mark_stopping();
        execution.mark_stopped();
        execution.mark_abandoned();
        execution.update_progress(1.0);
        execution.push_failure(Failure {
            chain: vec!["late".to_string()],
        });

        assert_eq!(execution.state(), State::Completed);
        assert_eq!(execution.snapshot().progress, 0.5);
        assert!(execution.snapshot().failures.is_empty());
    }

    #[test]
    fn should_keep_progress_monotonic() {
        let mut execution = execution();
        execution.mark_started();
        execution.update_progress(0.6);
        execution.update_progress(0.3);

        assert_eq!(execution.snapshot().progress, 0.6);
    }

    #[test]
    fn should_only_abandon_stopping_or_stopped_jobs() {
        let mut execution = execution();
        execution.mark_started();
        execution.mark_abandoned();
        assert_eq!(execution.state(), State::Started);

        execution.mark_stopping();
        execution.mark_stopped();
        execution.mark_abandoned();
        assert_eq!(execution.state(), State::Abandoned);
    }

    #[test]
    fn should_resume_only_from_stopped() {
        let mut execution = execution();
        execution.mark_started();
        execution.mark_resuming();
        assert_eq!(execution.state(), State::Started);

        execution.mark_stopping();
        execution.mark_stopped();
        execution.mark_resuming();
        assert_eq!(execution.state(), State::Starting);
    }

    #[test]
    fn should_capture_the_full_cause_chain() {
        let report = eyre::eyre!("root cause").wrap_err("middle").wrap_err("outer");
        let failure = Failure::from(&report);

        assert_eq!(failure.chain, vec!["outer", "middle", "root cause"]);
        assert_eq!(failure.message(), "outer");
    }
}
