use crate::builder::EvolutionEngineBuilder;
use crate::coordinator::MutationCoordinator;
use crate::factory::GenomeFactory;
use crate::population::Population;
use crate::run::RunService;
use crate::selection::Breeder;
use crate::settings::EvolutionSettings;
use crate::stats::{StatsTracker, StopReason};
use evoflow_core::cache::VerificationCache;
use evoflow_core::capability::{
    FitnessEvaluator, Gateway, ModelCatalog, RunPersistence, RunStatus, WorkflowVersionRecord,
    WorkflowVerifier,
};
use evoflow_core::domain::cancel::CancelToken;
use evoflow_core::domain::executor::Executor;
use evoflow_core::domain::retry::{RetryPolicy, retry};
use evoflow_core::genome::{EvaluationInputs, Fitness, Genome};
use evoflow_core::stats::PopulationStats;
use evoflow_core::tracker::{FailureKind, FailureSnapshot, FailureTracker};
use evoflow_error::{EvoflowError, EvoflowResult, evoflow_err};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What the engine is asked to optimize: the goal text, the evaluation
/// dataset, and the workflow the run belongs to.
#[derive(Clone, Debug, Default)]
pub struct EvolutionObjective {
    pub goal: String,
    pub dataset_id: String,
    pub workflow_id: String,
    pub problem_analysis: String,
    pub notes: String,
    /// Resume this run from its last completed generation.
    pub continue_run_id: Option<String>,
}

/// The final state of a finished run.
#[derive(Clone, Debug)]
pub struct EvolutionOutcome {
    pub best: Option<Genome>,
    pub status: RunStatus,
    pub stop_reason: Option<StopReason>,
    pub total_cost_usd: f64,
    pub history: Vec<PopulationStats>,
    pub failures: FailureSnapshot,
    pub session_id: String,
}

enum EvaluationJobResult {
    Success {
        fitness: Fitness,
        feedback: Option<String>,
        usd_cost: f64,
    },
    Failed {
        errors: Vec<String>,
        usd_cost: f64,
    },
    Cancelled {
        usd_cost: f64,
    },
}

/// The genetic-programming engine over LLM-agent workflow graphs. Owns the
/// population, run bookkeeping, stats, and verification cache for the
/// lifetime of a run; collaborators are borrowed capabilities.
pub struct EvolutionEngine {
    pub(crate) settings: EvolutionSettings,
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) catalog: Arc<dyn ModelCatalog>,
    pub(crate) verifier: Arc<dyn WorkflowVerifier>,
    pub(crate) evaluator: Arc<dyn FitnessEvaluator>,
    pub(crate) persistence: Option<Arc<dyn RunPersistence>>,
    pub(crate) executor: Arc<Executor>,
    pub(crate) cancel: CancelToken,
    pub(crate) tracker: Arc<FailureTracker>,
    pub(crate) cache: Arc<VerificationCache>,
    pub(crate) coordinator: Arc<MutationCoordinator>,
}

impl EvolutionEngine {
    pub fn builder() -> EvolutionEngineBuilder {
        EvolutionEngineBuilder::default()
    }

    /// The token that cancels this run. Cancel it from another thread to
    /// abort pending work and close the run as `Interrupted`.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the full evolution loop and returns the outcome. On abort the
    /// run record is closed (`Failed`, or `Interrupted` on cancellation)
    /// before the error is surfaced.
    pub fn evolve(&mut self, objective: EvolutionObjective) -> EvoflowResult<EvolutionOutcome> {
        let mut run = RunService::new(self.persistence.clone(), self.cancel.clone());
        let mut stats = StatsTracker::new(
            self.settings.max_cost_usd,
            self.settings.maximum_time_minutes,
            self.settings.max_evaluations_per_hour,
        );

        match self.evolve_inner(&objective, &mut run, &mut stats) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let status = if matches!(err, EvoflowError::Cancelled) {
                    RunStatus::Interrupted
                } else {
                    RunStatus::Failed
                };
                error!(error = %err, ?status, "evolution aborted");

                if run.run_id().is_ok() {
                    if let Err(close_err) = run.complete_run(status, &err.to_string()) {
                        warn!(error = %close_err, "failed to close aborted run");
                    }
                }

                Err(err)
            }
        }
    }

    fn evolve_inner(
        &mut self,
        objective: &EvolutionObjective,
        run: &mut RunService,
        stats: &mut StatsTracker,
    ) -> EvoflowResult<EvolutionOutcome> {
        let inputs = EvaluationInputs {
            goal: objective.goal.clone(),
            dataset_id: objective.dataset_id.clone(),
            workflow_id: objective.workflow_id.clone(),
        };

        let config_json = serde_json::to_string(&self.settings)
            .map_err(|e| evoflow_err!(Engine: "serializing settings: {}", e))?;

        let factory = Arc::new(GenomeFactory::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.catalog),
            Arc::clone(&self.verifier),
            Arc::clone(&self.coordinator),
            self.cancel.clone(),
            self.settings.initial_population_method,
            self.settings.base_workflow.clone(),
            objective.problem_analysis.clone(),
            self.settings.mutation_params.mutation_instructions.clone(),
        ));

        let breeder = Breeder::new(
            self.settings.clone(),
            Arc::clone(&self.gateway),
            Arc::clone(&self.catalog),
            Arc::clone(&self.verifier),
            Arc::clone(&self.coordinator),
            Arc::clone(&factory),
            Arc::clone(&self.cache),
            Arc::clone(&self.tracker),
            Arc::clone(&self.executor),
            self.cancel.clone(),
        );

        let resuming = objective.continue_run_id.is_some();
        run.create_run(
            &objective.goal,
            config_json,
            &objective.notes,
            objective.continue_run_id.as_deref(),
        )?;

        let first_generation = if resuming {
            run.generation_number() + 1
        } else {
            0
        };

        info!(
            session = %self.tracker.session_id(),
            generations = self.settings.generations,
            population = self.settings.population_size,
            first_generation,
            "evolution starting"
        );

        let mut population = Population::new(self.settings.initial_population_method);

        run.create_new_generation(first_generation)?;
        let context = run.context()?;
        population.initialize(
            self.settings.population_size,
            &factory,
            &self.executor,
            &inputs,
            &context,
        );

        self.evaluate_population(&mut population, stats)?;
        population.remove_unevaluated(&factory, &inputs, &context)?;
        self.close_generation(&population, run, stats, first_generation)?;

        for generation in (first_generation + 1)..self.settings.generations {
            if let Some(reason) = stats.should_stop() {
                info!(%reason, generation, "stop predicate fired");
                break;
            }
            self.cancel.ensure_active()?;

            run.create_new_generation(generation)?;
            population.increment_generation();
            let context = run.context()?;

            breeder.create_next_generation(&mut population, &inputs, &context)?;
            self.record_workflow_versions(&population, run)?;

            self.evaluate_population(&mut population, stats)?;
            population.remove_unevaluated(&factory, &inputs, &context)?;
            self.close_generation(&population, run, stats, generation)?;
        }

        let best = population.get_best().ok().cloned();
        let stop_reason = stats.should_stop();
        // A run halted by a stop predicate ended on its own terms; only a
        // run cut short without one counts as interrupted.
        let status = if stop_reason.is_some() {
            RunStatus::Completed
        } else {
            stats.final_status(self.settings.generations)
        };

        let summary = match &best {
            Some(genome) => format!(
                "best fitness {:.4} at cost ${:.4}",
                genome.score(),
                stats.total_cost_usd()
            ),
            None => "no evaluated genome survived".to_string(),
        };
        info!(
            ?status,
            total_cost = stats.total_cost_usd(),
            evaluations = stats.evaluation_count(),
            %summary,
            "evolution finished"
        );
        run.complete_run(status, &summary)?;

        Ok(EvolutionOutcome {
            best,
            status,
            stop_reason,
            total_cost_usd: stats.total_cost_usd(),
            history: stats.history().to_vec(),
            failures: self.tracker.snapshot(),
            session_id: self.tracker.session_id().to_string(),
        })
    }

    /// Evaluates every unevaluated genome through the bounded worker pool.
    /// Results are applied positionally once the whole batch has settled;
    /// the loop never proceeds past a generation with evaluations in
    /// flight.
    fn evaluate_population(
        &self,
        population: &mut Population,
        stats: &mut StatsTracker,
    ) -> EvoflowResult<()> {
        self.cancel.ensure_active()?;

        let pending = population
            .genomes()
            .iter()
            .enumerate()
            .filter(|(_, g)| !g.is_evaluated())
            .map(|(idx, g)| (idx, g.clone()))
            .collect::<Vec<_>>();

        if pending.is_empty() {
            return Ok(());
        }

        let jobs = pending
            .iter()
            .map(|(_, genome)| {
                let genome = genome.clone();
                let evaluator = Arc::clone(&self.evaluator);
                let tracker = Arc::clone(&self.tracker);
                let cancel = self.cancel.clone();
                move || Self::evaluate_one(&genome, evaluator, tracker, cancel)
            })
            .collect::<Vec<_>>();

        let results = self.executor.execute_batch(jobs);

        let genomes = population.genomes_mut();
        for ((index, _), result) in pending.iter().zip(results) {
            match result {
                EvaluationJobResult::Success {
                    fitness,
                    feedback,
                    usd_cost,
                } => {
                    genomes[*index].set_fitness_and_feedback(fitness, feedback, usd_cost);
                    genomes[*index].add_cost(usd_cost);
                    stats.add_cost(usd_cost);
                    stats.add_evaluations(1);
                }
                EvaluationJobResult::Failed { errors, usd_cost } => {
                    for error in errors {
                        genomes[*index].record_error(error);
                    }
                    stats.add_cost(usd_cost);
                    stats.add_evaluations(1);
                }
                EvaluationJobResult::Cancelled { usd_cost } => {
                    stats.add_cost(usd_cost);
                }
            }
        }

        self.cancel.ensure_active()
    }

    /// One genome's evaluation: up to three attempts with exponential
    /// backoff between them. A cancelled attempt counts as a failure but
    /// never re-enters the retry path.
    fn evaluate_one(
        genome: &Genome,
        evaluator: Arc<dyn FitnessEvaluator>,
        tracker: Arc<FailureTracker>,
        cancel: CancelToken,
    ) -> EvaluationJobResult {
        let mut usd_cost = 0.0;
        let mut errors = Vec::new();

        let policy = RetryPolicy::exponential(3, Duration::from_millis(1000));
        let outcome = retry(policy, &cancel, |_attempt| {
            tracker.record_attempt(FailureKind::Evaluation);

            let response = evaluator.evaluate(genome, genome.context(), &cancel);
            usd_cost += response.usd_cost;

            match response.data {
                Some(evaluated) => Ok(evaluated),
                None => {
                    let message = response.error_message();
                    errors.push(message.clone());
                    Err(evoflow_err!(Evaluation: "{}", message))
                }
            }
        });

        match outcome {
            Ok(evaluated) => EvaluationJobResult::Success {
                fitness: evaluated.fitness,
                feedback: evaluated.feedback,
                usd_cost,
            },
            Err(EvoflowError::Cancelled) => {
                tracker.record_failure(FailureKind::Evaluation);
                EvaluationJobResult::Cancelled { usd_cost }
            }
            Err(_) => {
                tracker.record_failure(FailureKind::Evaluation);
                EvaluationJobResult::Failed { errors, usd_cost }
            }
        }
    }

    /// Upserts workflow-version rows for freshly bred genomes.
    fn record_workflow_versions(
        &self,
        population: &Population,
        run: &RunService,
    ) -> EvoflowResult<()> {
        if self.persistence.is_none() {
            return Ok(());
        }

        let generation_id = run.generation_id()?.to_string();
        for genome in population.genomes() {
            let dsl = genome.config().canonical_json()?;
            run.ensure_workflow_version(WorkflowVersionRecord {
                workflow_version_id: genome.workflow_version_id().to_string(),
                workflow_id: genome.inputs().workflow_id.clone(),
                commit_message: format!("{} genome", genome.operation()),
                dsl,
                generation_id: generation_id.clone(),
                operation: genome.operation(),
            })?;
        }

        Ok(())
    }

    /// Records the generation's stats row and closes its run record.
    fn close_generation(
        &self,
        population: &Population,
        run: &RunService,
        stats: &mut StatsTracker,
        generation: usize,
    ) -> EvoflowResult<()> {
        let fitness = population.stats();
        let evaluation_cost = population
            .genomes()
            .iter()
            .map(|g| g.results().cost_of_evaluation)
            .sum();
        let row = stats.record_generation(generation, &fitness, evaluation_cost);

        let best = population.get_best()?;
        info!(
            generation,
            best = row.best_fitness,
            avg = row.avg_fitness,
            cost = row.evaluation_cost,
            "generation closed"
        );

        run.complete_generation(
            best.workflow_version_id(),
            &format!("generation {} best {:.4}", generation, row.best_fitness),
            best.feedback().map(|s| s.to_string()),
            &row,
        )
    }
}
