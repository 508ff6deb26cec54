use crate::coordinator::{MutationCoordinator, normalize_intensity};
use crate::factory::GenomeFactory;
use crate::operators::{Crossover, OperatorContext};
use crate::population::Population;
use crate::settings::EvolutionSettings;
use evoflow_core::cache::VerificationCache;
use evoflow_core::capability::{Gateway, ModelCatalog, WorkflowVerifier};
use evoflow_core::domain::cancel::CancelToken;
use evoflow_core::domain::executor::Executor;
use evoflow_core::domain::random_provider;
use evoflow_core::genome::{EvaluationInputs, EvolutionContext, Genome, OperationTag};
use evoflow_core::math::poisson;
use evoflow_core::tracker::{FailureKind, FailureTracker};
use evoflow_error::{EvoflowResult, ensure};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Elite parents: the top `elite_size` valid genomes by fitness.
pub fn select_elite(genomes: &[Genome], elite_size: usize) -> Vec<Genome> {
    let mut valid = genomes
        .iter()
        .filter(|g| g.is_valid_parent())
        .collect::<Vec<_>>();
    valid.sort_by(|a, b| b.score().total_cmp(&a.score()));
    valid.into_iter().take(elite_size).cloned().collect()
}

/// One tournament round: `tournament_size` candidates drawn uniformly with
/// replacement; the winner is the maximum fitness, ties broken by the
/// first-seen candidate.
pub fn select_tournament(genomes: &[Genome], tournament_size: usize) -> Option<Genome> {
    let valid = genomes
        .iter()
        .filter(|g| g.is_valid_parent())
        .collect::<Vec<_>>();
    if valid.is_empty() {
        return None;
    }

    let mut winner: Option<&Genome> = None;
    for _ in 0..tournament_size.max(1) {
        let candidate = *random_provider::choose(&valid);
        match winner {
            Some(current) if candidate.score() > current.score() => winner = Some(candidate),
            None => winner = Some(candidate),
            _ => {}
        }
    }

    winner.cloned()
}

/// Breeds the next generation: elite + tournament parent pool, batched
/// offspring slots, cached verification, and μ+λ truncation survival.
#[derive(Clone)]
pub struct Breeder {
    settings: EvolutionSettings,
    gateway: Arc<dyn Gateway>,
    catalog: Arc<dyn ModelCatalog>,
    verifier: Arc<dyn WorkflowVerifier>,
    coordinator: Arc<MutationCoordinator>,
    factory: Arc<GenomeFactory>,
    cache: Arc<VerificationCache>,
    tracker: Arc<FailureTracker>,
    executor: Arc<Executor>,
    cancel: CancelToken,
    crossover: Crossover,
}

impl Breeder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: EvolutionSettings,
        gateway: Arc<dyn Gateway>,
        catalog: Arc<dyn ModelCatalog>,
        verifier: Arc<dyn WorkflowVerifier>,
        coordinator: Arc<MutationCoordinator>,
        factory: Arc<GenomeFactory>,
        cache: Arc<VerificationCache>,
        tracker: Arc<FailureTracker>,
        executor: Arc<Executor>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            settings,
            gateway,
            catalog,
            verifier,
            coordinator,
            factory,
            cache,
            tracker,
            executor,
            cancel,
            crossover: Crossover,
        }
    }

    fn operator_context(&self, intensity: f64) -> OperatorContext<'_> {
        OperatorContext {
            gateway: self.gateway.as_ref(),
            catalog: self.catalog.as_ref(),
            verifier: self.verifier.as_ref(),
            cancel: &self.cancel,
            intensity,
            mutation_instructions: &self.settings.mutation_params.mutation_instructions,
        }
    }

    /// The parent pool: elites first, then tournament winners until the
    /// pool can serve a breeding draw.
    fn parent_pool(&self, population: &Population) -> EvoflowResult<Vec<Genome>> {
        let genomes = population.genomes();
        let valid_count = genomes.iter().filter(|g| g.is_valid_parent()).count();
        ensure!(
            valid_count >= self.settings.number_of_parents_creating_offspring,
            Population: "{} valid genomes cannot serve {}-parent breeding",
            valid_count,
            self.settings.number_of_parents_creating_offspring
        );

        let target = (self.settings.elite_size + self.settings.number_of_parents_creating_offspring)
            .max(2);

        let mut pool = select_elite(genomes, self.settings.elite_size);
        while pool.len() < target {
            match select_tournament(genomes, self.settings.tournament_size) {
                Some(winner) => pool.push(winner),
                None => break,
            }
        }

        ensure!(!pool.is_empty(), Population: "parent pool is empty");
        Ok(pool)
    }

    fn draw_parents(&self, pool: &[Genome], count: usize) -> Vec<Genome> {
        let count = count.min(pool.len()).max(1);
        random_provider::sample_indices(0..pool.len(), count)
            .into_iter()
            .map(|i| pool[i].clone())
            .collect()
    }

    /// One breeding slot. Failures are swallowed after being counted; the
    /// slot then yields no child.
    fn breed_slot(
        &self,
        pool: &[Genome],
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
    ) -> Option<Genome> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let draw = random_provider::random::<f64>();
        let crossover_bound = self.settings.crossover_rate;
        let mutation_bound = crossover_bound + self.settings.mutation_rate;
        let parent_count = self.settings.number_of_parents_creating_offspring;

        if draw < crossover_bound {
            self.tracker.record_attempt(FailureKind::Crossover);

            // Crossover takes exactly two parents regardless of the
            // configured draw count; lineage records the two that
            // actually contributed.
            let parents = self.draw_parents(pool, 2);
            if parents.len() < 2 {
                self.tracker.record_failure(FailureKind::Crossover);
                debug!("crossover slot could not draw two parents");
                return None;
            }
            let ctx = self.operator_context(0.5);
            match self
                .crossover
                .apply(&ctx, parents[0].config(), parents[1].config())
            {
                Ok(outcome) => {
                    let lineage = parents
                        .iter()
                        .map(|p| p.workflow_version_id().to_string())
                        .collect();
                    let mut child = Genome::from_config(
                        outcome.config,
                        lineage,
                        OperationTag::Crossover,
                        inputs.clone(),
                        context.clone(),
                    );
                    child.add_cost(outcome.usd_cost);
                    Some(child)
                }
                Err(err) => {
                    self.tracker.record_failure(FailureKind::Crossover);
                    debug!(error = %err, "crossover slot failed");
                    None
                }
            }
        } else if draw < mutation_bound {
            let parent = self.draw_parents(pool, 1).pop()?;
            let intensity = normalize_intensity(poisson(1.0, Some(1), Some(5)));
            let ctx = self.operator_context(intensity);
            match self.coordinator.mutate(&ctx, &parent) {
                Ok((mut child, cost)) => {
                    child.add_cost(cost);
                    Some(child)
                }
                Err(err) => {
                    debug!(error = %err, "mutation slot failed");
                    None
                }
            }
        } else {
            self.tracker.record_attempt(FailureKind::Immigration);

            let lineage = self
                .draw_parents(pool, parent_count)
                .iter()
                .map(|p| p.workflow_version_id().to_string())
                .collect();
            match self.factory.create_immigrant(inputs, context, lineage) {
                Ok(child) => Some(child),
                Err(err) => {
                    self.tracker.record_failure(FailureKind::Immigration);
                    debug!(error = %err, "immigration slot failed");
                    None
                }
            }
        }
    }

    /// Verification filter over candidate offspring, memoized through the
    /// cache. Stops verifying for the generation once the invalid count
    /// trips the circuit breaker.
    fn filter_verified(&self, candidates: Vec<Genome>) -> Vec<Genome> {
        let breaker_limit = 50.max(self.settings.offspring_count * 5);
        let mut invalid = 0usize;
        let mut valid = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if invalid >= breaker_limit {
                warn!(invalid, breaker_limit, "verification circuit breaker tripped");
                break;
            }

            let verifier = Arc::clone(&self.verifier);
            let verdict = self
                .cache
                .verify_with(candidate.config(), move |config| verifier.verify(config));

            match verdict {
                Ok(verdict) if verdict.is_valid => valid.push(candidate),
                Ok(verdict) => {
                    invalid += 1;
                    debug!(errors = ?verdict.errors, "offspring rejected by verifier");
                }
                Err(err) => {
                    invalid += 1;
                    debug!(error = %err, "offspring verification errored");
                }
            }
        }

        valid
    }

    /// Breeds λ offspring, filters them through verification, and applies
    /// μ+λ truncation survival. Survivors are reset into `context`.
    pub fn create_next_generation(
        &self,
        population: &mut Population,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
    ) -> EvoflowResult<()> {
        let lambda = self.settings.offspring_count;
        let mut offspring = Vec::with_capacity(lambda);

        if lambda > 0 {
            let pool = Arc::new(self.parent_pool(population)?);
            let budget = 50.max(lambda * 20).min(1000);
            let mut attempts = 0usize;

            while offspring.len() < lambda && attempts < budget {
                self.cancel.ensure_active()?;

                let batch_size = (lambda - offspring.len()).min(budget - attempts);
                let jobs = (0..batch_size)
                    .map(|_| {
                        let breeder = self.clone();
                        let pool = Arc::clone(&pool);
                        let inputs = inputs.clone();
                        let context = context.clone();
                        move || breeder.breed_slot(&pool, &inputs, &context)
                    })
                    .collect::<Vec<_>>();

                attempts += batch_size;
                offspring.extend(self.executor.execute_batch(jobs).into_iter().flatten());
            }

            info!(
                bred = offspring.len(),
                requested = lambda,
                attempts,
                "offspring generation settled"
            );
        }

        let valid_offspring = self.filter_verified(offspring);

        // μ+λ truncation: current population plus valid offspring, ranked
        // by (evaluated, fitness), cut back to μ.
        let mut combined = population.genomes().to_vec();
        combined.extend(valid_offspring);
        combined.sort_by(|a, b| {
            b.is_evaluated()
                .cmp(&a.is_evaluated())
                .then(b.score().total_cmp(&a.score()))
        });
        combined.truncate(self.settings.population_size);

        population.set_population(combined);
        population.reset_genomes(context);

        Ok(())
    }
}
