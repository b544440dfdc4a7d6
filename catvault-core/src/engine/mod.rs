use crate::{catalog::Entity, descriptor::Descriptor, filter::Selectors};
use std::path::Path;

pub mod manifest;

/// One unit of work of a planned job. `entity` is set for steps that
/// serialize or apply a single catalog entry.
#[derive(Debug, Clone)]
pub struct Step {
    pub label: String,
    pub entity: Option<Entity>,
}

impl Step {
    pub fn new(label: impl Into<String>) -> Self {
        Step {
            label: label.into(),
            entity: None,
        }
    }

    pub fn for_entity(entity: Entity) -> Self {
        Step {
            label: entity.label(),
            entity: Some(entity),
        }
    }
}

/// Ordered steps implementing one backup or restore run. The execution
/// runtime drives the steps in order and derives progress from their count.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub steps: Vec<Step>,
}

/// Non-fatal anomalies raised by a single step. Step failures are returned
/// as errors instead.
#[derive(Debug, Default)]
pub struct StepReport {
    pub warnings: Vec<eyre::Report>,
}

/// The archive serialization collaborator. Implementations turn a descriptor
/// into an ordered step plan and perform the actual reading/writing; the job
/// control layer never interprets archive contents itself.
#[async_trait::async_trait]
pub trait Engine: Send + Sync + std::fmt::Debug {
    /// Plans the steps for a run. Errors here reject the submission, no job
    /// is started.
    async fn plan(&self, descriptor: &Descriptor) -> eyre::Result<Plan>;

    /// Runs a single step of a previously returned plan.
    async fn run_step(
        &self,
        descriptor: &Descriptor,
        plan: &Plan,
        index: usize,
    ) -> eyre::Result<StepReport>;

    /// The selectors embedded in an existing archive, if it carries any.
    async fn embedded_selectors(&self, archive: &Path) -> eyre::Result<Option<Selectors>>;
}
