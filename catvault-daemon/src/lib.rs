use catvault_core::{catalog::Catalog, engine::Engine};
use std::sync::Arc;

pub mod job;
pub mod poll;

use job::{controller::Controller, registry::Registry, runner::LocalRuntime};

/// One assembled job service: registry, runtime and controller wired
/// together at startup. Everything is shared by handle, nothing is a
/// process-level global.
#[derive(Debug, Clone)]
pub struct Daemon {
    pub catalog: Arc<Catalog>,
    pub registry: Arc<Registry>,
    pub controller: Controller,
}

impl Daemon {
    pub fn new(catalog: Arc<Catalog>, engine: Arc<dyn Engine>) -> Self {
        let registry = Arc::new(Registry::new());
        let runtime = Arc::new(LocalRuntime::new(engine));
        let controller = Controller::new(registry.clone(), runtime);
        Daemon {
            catalog,
            registry,
            controller,
        }
    }

    pub fn poller(&self) -> poll::Poller {
        poll::Poller::new(self.registry.clone())
    }
}
