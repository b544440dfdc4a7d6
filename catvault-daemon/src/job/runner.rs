use crate::job::{
    cancellation,
    registry::Record,
    runtime::{Runtime, RuntimeError},
    Failure, Id,
};
use catvault_core::{
    descriptor::{Descriptor, Direction},
    engine::{Engine, Plan},
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::Mutex;

struct Slot {
    record: Record,
    descriptor: Descriptor,
    plan: Plan,
    checkpoint: Arc<AtomicUsize>,
    cancellation: Option<cancellation::Send>,
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("descriptor", &self.descriptor)
            .field("checkpoint", &self.checkpoint)
            .finish()
    }
}

/// In-process execution runtime: one spawned worker task per running job,
/// driving an [`Engine`] step by step. The worker is the only writer of its
/// record while the run is in flight; stop/resume hand signals across.
#[derive(Debug)]
pub struct LocalRuntime {
    engine: Arc<dyn Engine>,
    workers: Mutex<HashMap<Id, Slot>>,
}

impl LocalRuntime {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        LocalRuntime {
            engine,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// An unscoped restore adopts the selectors embedded in the archive, if
    /// any. Request selectors always win over embedded ones.
    async fn resolve_scope(&self, descriptor: Descriptor) -> Result<Descriptor, RuntimeError> {
        if descriptor.direction != Direction::Restore || !descriptor.scope.is_match_all() {
            return Ok(descriptor);
        }
        let embedded = self
            .engine
            .embedded_selectors(&descriptor.archive)
            .await
            .map_err(RuntimeError::InvalidParameters)?;
        match embedded {
            Some(selectors) => {
                tracing::info!(?selectors, "using scope embedded in the archive");
                Ok(descriptor.with_selectors(selectors))
            }
            None => Ok(descriptor),
        }
    }

    fn spawn_worker(&self, id: Id, slot: &mut Slot) {
        let (cancellation_send, cancellation_recv) = cancellation::new();
        slot.cancellation = Some(cancellation_send);
        let engine = self.engine.clone();
        let record = slot.record.clone();
        let descriptor = slot.descriptor.clone();
        let plan = slot.plan.clone();
        let checkpoint = slot.checkpoint.clone();
        tokio::spawn(async move {
            run_worker(
                id,
                engine,
                record,
                descriptor,
                plan,
                checkpoint,
                cancellation_recv,
            )
            .await;
        });
    }
}

#[async_trait::async_trait]
impl Runtime for LocalRuntime {
    async fn submit(&self, record: Record, descriptor: Descriptor) -> Result<(), RuntimeError> {
        let descriptor = self.resolve_scope(descriptor).await?;
        let plan = self
            .engine
            .plan(&descriptor)
            .await
            .map_err(RuntimeError::InvalidParameters)?;
        let id = record.read().await.id();

        let mut workers = self.workers.lock().await;
        if workers.contains_key(&id) {
            return Err(RuntimeError::ExecutionAlreadyRunning(id));
        }
        let mut slot = Slot {
            record,
            descriptor,
            plan,
            checkpoint: Arc::new(AtomicUsize::new(0)),
            cancellation: None,
        };
        self.spawn_worker(id, &mut slot);
        workers.insert(id, slot);
        Ok(())
    }

    async fn request_stop(&self, id: Id) -> Result<(), RuntimeError> {
        let cancellation = {
            let mut workers = self.workers.lock().await;
            let slot = workers
                .get_mut(&id)
                .ok_or(RuntimeError::NoSuchExecution(id))?;
            slot.cancellation
                .take()
                .ok_or(RuntimeError::ExecutionNotRunning(id))?
        };
        cancellation.cancel().await;
        Ok(())
    }

    async fn request_resume(&self, id: Id) -> Result<(), RuntimeError> {
        let mut workers = self.workers.lock().await;
        let slot = workers
            .get_mut(&id)
            .ok_or(RuntimeError::NoSuchExecution(id))?;
        {
            let mut execution = slot.record.write().await;
            if execution.state().is_terminal() {
                return Err(RuntimeError::InstanceAlreadyComplete(id));
            }
            if execution.state().is_active() {
                return Err(RuntimeError::ExecutionAlreadyRunning(id));
            }
            execution.mark_resuming();
        }
        let checkpoint = slot.checkpoint.load(Ordering::SeqCst);
        tracing::info!(%id, checkpoint, "resuming from checkpoint");
        self.spawn_worker(id, slot);
        Ok(())
    }

    async fn request_abandon(&self, id: Id) -> Result<(), RuntimeError> {
        let mut workers = self.workers.lock().await;
        workers
            .remove(&id)
            .ok_or(RuntimeError::NoSuchExecution(id))?;
        Ok(())
    }
}

#[tracing::instrument(
    name = "job",
    skip_all,
    fields(id = %id, direction = %descriptor.direction)
)]
async fn run_worker(
    id: Id,
    engine: Arc<dyn Engine>,
    record: Record,
    descriptor: Descriptor,
    plan: Plan,
    checkpoint: Arc<AtomicUsize>,
    mut cancellation: cancellation::Recv,
) {
    record.write().await.mark_started();
    let total = plan.steps.len().max(1);
    let mut index = checkpoint.load(Ordering::SeqCst);
    let mut stop_requested = false;

    while index < plan.steps.len() && !stop_requested {
        let label = plan.steps[index].label.clone();
        // The stop signal is acknowledged as soon as it arrives, but the
        // step in flight runs to completion; how long STOPPING lasts is
        // bounded by the current step, never by the whole plan.
        let step = engine.run_step(&descriptor, &plan, index);
        tokio::pin!(step);
        let result = loop {
            tokio::select! {
                request = cancellation.recv(), if !stop_requested => {
                    request.acknowledge();
                    stop_requested = true;
                    tracing::info!(step = %label, "stop requested, finishing current step");
                }
                result = &mut step => break result,
            }
        };
        match result {
            Ok(report) => {
                let mut execution = record.write().await;
                for warning in &report.warnings {
                    tracing::warn!(step = %label, warning = %warning);
                    execution.push_warning(Failure::from(warning));
                }
                index += 1;
                checkpoint.store(index, Ordering::SeqCst);
                execution.update_progress(index as f64 / total as f64);
            }
            Err(error) => {
                tracing::error!(step = %label, %error, "step failed");
                let mut execution = record.write().await;
                execution.push_failure(Failure::from(&error));
                if !descriptor.options.best_effort {
                    execution.finish();
                    tracing::info!(state = %execution.state(), "finished");
                    return;
                }
                index += 1;
                checkpoint.store(index, Ordering::SeqCst);
                execution.update_progress(index as f64 / total as f64);
            }
        }
    }

    if stop_requested && index < plan.steps.len() {
        record.write().await.mark_stopped();
        tracing::info!(checkpoint = index, "stopped");
        return;
    }

    // the plan is drained here; an empty plan still counts as fully done
    let mut execution = record.write().await;
    execution.update_progress(1.0);
    execution.finish();
    tracing::info!(state = %execution.state(), "finished");
}
