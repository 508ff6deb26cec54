use crate::coordinator::MutationCoordinator;
use crate::engine::EvolutionEngine;
use crate::settings::EvolutionSettings;
use evoflow_core::cache::VerificationCache;
use evoflow_core::capability::{
    FitnessEvaluator, Gateway, ModelCatalog, RunPersistence, WorkflowVerifier,
};
use evoflow_core::domain::cancel::CancelToken;
use evoflow_core::domain::executor::Executor;
use evoflow_core::tracker::FailureTracker;
use evoflow_error::{EvoflowResult, evoflow_err};
use std::sync::Arc;

/// Fluent construction for [EvolutionEngine]. Settings are validated and
/// the required capabilities checked once, at `build()`.
#[derive(Default)]
pub struct EvolutionEngineBuilder {
    settings: EvolutionSettings,
    gateway: Option<Arc<dyn Gateway>>,
    evaluator: Option<Arc<dyn FitnessEvaluator>>,
    verifier: Option<Arc<dyn WorkflowVerifier>>,
    catalog: Option<Arc<dyn ModelCatalog>>,
    persistence: Option<Arc<dyn RunPersistence>>,
    cancel: Option<CancelToken>,
    num_workers: Option<usize>,
}

impl EvolutionEngineBuilder {
    pub fn settings(mut self, settings: EvolutionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn FitnessEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn WorkflowVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn ModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn RunPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Overrides the worker count; defaults to the settings'
    /// `max_concurrent_evaluations`.
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = Some(num_workers);
        self
    }

    pub fn build(self) -> EvoflowResult<EvolutionEngine> {
        self.settings.validate()?;

        let gateway = self
            .gateway
            .ok_or_else(|| evoflow_err!(InvalidConfig: "a gateway capability is required"))?;
        let evaluator = self
            .evaluator
            .ok_or_else(|| evoflow_err!(InvalidConfig: "an evaluator capability is required"))?;
        let verifier = self
            .verifier
            .ok_or_else(|| evoflow_err!(InvalidConfig: "a verifier capability is required"))?;
        let catalog = self
            .catalog
            .ok_or_else(|| evoflow_err!(InvalidConfig: "a model catalog is required"))?;

        let workers = self
            .num_workers
            .unwrap_or(self.settings.max_concurrent_evaluations);
        let executor = if workers <= 1 {
            Executor::serial()
        } else {
            Executor::worker_pool(workers)
        };

        let tracker = Arc::new(FailureTracker::new());
        let coordinator = Arc::new(MutationCoordinator::new(
            self.settings.evolution_mode,
            Arc::clone(&tracker),
        ));

        Ok(EvolutionEngine {
            settings: self.settings,
            gateway,
            catalog,
            verifier,
            evaluator,
            persistence: self.persistence,
            executor: Arc::new(executor),
            cancel: self.cancel.unwrap_or_default(),
            tracker,
            cache: Arc::new(VerificationCache::new()),
            coordinator,
        })
    }
}
