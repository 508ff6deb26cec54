use crate::factory::GenomeFactory;
use crate::settings::InitialPopulationMethod;
use evoflow_core::domain::executor::Executor;
use evoflow_core::fingerprint::{fingerprint_distance, structural_fingerprint};
use evoflow_core::genome::{EvaluationInputs, EvolutionContext, Genome};
use evoflow_core::stats::{FitnessStats, calculate_stats};
use evoflow_error::{EvoflowResult, ensure, evoflow_err};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The population never drops below this floor after filtering; it is
/// replenished with fresh genomes first and the run aborts only when even
/// replenishment cannot reach two survivors.
pub const MIN_VIABLE: usize = 4;

/// The ordered set of genomes under evolution. `set_population` is the
/// single writer of the genome vector; workers never touch it directly.
pub struct Population {
    genomes: Vec<Genome>,
    generation_number: usize,
    method: InitialPopulationMethod,
}

impl Population {
    pub fn new(method: InitialPopulationMethod) -> Self {
        Self {
            genomes: Vec::new(),
            generation_number: 0,
            method,
        }
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub fn genomes_mut(&mut self) -> &mut [Genome] {
        &mut self.genomes
    }

    pub fn set_population(&mut self, genomes: Vec<Genome>) {
        self.genomes = genomes;
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    pub fn method(&self) -> InitialPopulationMethod {
        self.method
    }

    pub fn generation_number(&self) -> usize {
        self.generation_number
    }

    pub fn increment_generation(&mut self) {
        self.generation_number += 1;
    }

    /// Seeds `size` genomes in parallel through the factory. Individual
    /// failures are tolerated; a success rate under 50% is logged as
    /// critical but initialization still proceeds with what it has.
    pub fn initialize(
        &mut self,
        size: usize,
        factory: &Arc<GenomeFactory>,
        executor: &Executor,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
    ) {
        let jobs = (0..size)
            .map(|_| {
                let factory = Arc::clone(factory);
                let inputs = inputs.clone();
                let context = context.clone();
                let prepared = self.method == InitialPopulationMethod::Prepared;
                move || {
                    if prepared {
                        factory.create_prepared(&inputs, &context)
                    } else {
                        factory.create_random(&inputs, &context)
                    }
                }
            })
            .collect::<Vec<_>>();

        let results = executor.execute_batch(jobs);
        let total = results.len();
        let genomes = results
            .into_iter()
            .filter_map(|result| match result {
                Ok(genome) => Some(genome),
                Err(err) => {
                    warn!(error = %err, "initial genome creation failed");
                    None
                }
            })
            .collect::<Vec<Genome>>();

        if genomes.len() * 2 < total {
            error!(
                created = genomes.len(),
                requested = total,
                "less than half of the initial population could be created"
            );
        } else {
            info!(created = genomes.len(), requested = total, "population initialized");
        }

        self.genomes = genomes;
    }

    /// The best evaluated genome. Requires at least one evaluated genome.
    pub fn get_best(&self) -> EvoflowResult<&Genome> {
        self.genomes
            .iter()
            .filter(|g| g.is_evaluated())
            .max_by(|a, b| a.score().total_cmp(&b.score()))
            .ok_or_else(|| evoflow_err!(Population: "no evaluated genome in population"))
    }

    pub fn get_worst(&self) -> Option<&Genome> {
        self.genomes
            .iter()
            .filter(|g| g.is_evaluated())
            .min_by(|a, b| a.score().total_cmp(&b.score()))
    }

    /// The top `n` evaluated genomes by fitness, best first.
    pub fn get_top(&self, n: usize) -> Vec<&Genome> {
        let mut evaluated = self
            .genomes
            .iter()
            .filter(|g| g.is_evaluated())
            .collect::<Vec<_>>();
        evaluated.sort_by(|a, b| b.score().total_cmp(&a.score()));
        evaluated.truncate(n);
        evaluated
    }

    /// Drops unevaluated genomes, replenishes up to [MIN_VIABLE] with fresh
    /// genomes, and fails the run when fewer than two genomes remain.
    pub fn remove_unevaluated(
        &mut self,
        factory: &Arc<GenomeFactory>,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
    ) -> EvoflowResult<()> {
        let before = self.genomes.len();
        self.genomes.retain(|g| g.is_evaluated());
        if before != self.genomes.len() {
            info!(
                removed = before - self.genomes.len(),
                remaining = self.genomes.len(),
                "pruned unevaluated genomes"
            );
        }

        if self.genomes.len() < MIN_VIABLE {
            let mut attempts = 0;
            let max_attempts = MIN_VIABLE * 2;
            while self.genomes.len() < MIN_VIABLE && attempts < max_attempts {
                attempts += 1;
                match factory.create_for_replenishment(inputs, context) {
                    Ok(genome) => self.genomes.push(genome),
                    Err(err) => warn!(error = %err, "replenishment genome failed"),
                }
            }
        }

        ensure!(
            self.genomes.len() >= 2,
            Population: "population collapsed to {} genomes", self.genomes.len()
        );

        Ok(())
    }

    /// Groups genomes whose fingerprints sit within `threshold` of each
    /// other and keeps only the fittest member of each group.
    pub fn prune_similar(&mut self, threshold: f32) {
        let prints = self
            .genomes
            .iter()
            .map(|g| structural_fingerprint(g.config()))
            .collect::<Vec<_>>();

        let n = self.genomes.len();
        let mut keep = vec![true; n];

        for i in 0..n {
            if !keep[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !keep[j] {
                    continue;
                }
                let Ok(distance) = fingerprint_distance(&prints[i], &prints[j]) else {
                    continue;
                };
                if distance <= threshold {
                    // Same group: drop whichever scores lower.
                    if self.genomes[i].score() >= self.genomes[j].score() {
                        keep[j] = false;
                    } else {
                        keep[i] = false;
                        break;
                    }
                }
            }
        }

        let mut index = 0;
        self.genomes.retain(|_| {
            let kept = keep[index];
            index += 1;
            kept
        });

        let removed = n - self.genomes.len();
        if removed > 0 {
            info!(removed, threshold, "pruned near-duplicate genomes");
        }
    }

    /// Advances every genome into the current generation and marks it
    /// unevaluated.
    pub fn reset_genomes(&mut self, context: &EvolutionContext) {
        for genome in &mut self.genomes {
            genome.reset(context.clone());
        }
    }

    pub fn stats(&self) -> FitnessStats {
        calculate_stats(&self.genomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::sampling_only;
    use crate::operators::tests_support::{TestCatalog, TestGateway, TestVerifier, two_node_config};
    use crate::settings::EvolutionMode;
    use evoflow_core::capability::AiResponse;
    use evoflow_core::domain::cancel::CancelToken;
    use evoflow_core::genome::{Fitness, OperationTag};

    fn factory() -> Arc<GenomeFactory> {
        Arc::new(GenomeFactory::new(
            Arc::new(TestGateway::default()),
            Arc::new(TestCatalog::with_models(&["gpt-4o"])),
            Arc::new(TestVerifier::formalizing(AiResponse::success(
                two_node_config(),
                0.0,
            ))),
            Arc::new(sampling_only(EvolutionMode::Gp)),
            CancelToken::new(),
            InitialPopulationMethod::Random,
            None,
            String::new(),
            String::new(),
        ))
    }

    fn failing_factory() -> Arc<GenomeFactory> {
        Arc::new(GenomeFactory::new(
            Arc::new(TestGateway::default()),
            Arc::new(TestCatalog::with_models(&["gpt-4o"])),
            Arc::new(TestVerifier::formalizing(AiResponse::failure("down", 0.0))),
            Arc::new(sampling_only(EvolutionMode::Gp)),
            CancelToken::new(),
            InitialPopulationMethod::Random,
            None,
            String::new(),
            String::new(),
        ))
    }

    fn scored(score: f64) -> Genome {
        let mut genome = Genome::from_config(
            two_node_config(),
            vec![],
            OperationTag::Init,
            EvaluationInputs::default(),
            EvolutionContext::default(),
        );
        genome.set_fitness_and_feedback(
            Fitness {
                score,
                ..Fitness::zero()
            },
            None,
            0.0,
        );
        genome
    }

    #[test]
    fn initialize_fills_the_population() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        population.initialize(
            6,
            &factory(),
            &Executor::serial(),
            &EvaluationInputs::default(),
            &EvolutionContext::default(),
        );

        assert_eq!(population.len(), 6);
    }

    #[test]
    fn initialize_tolerates_total_failure() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        population.initialize(
            4,
            &failing_factory(),
            &Executor::serial(),
            &EvaluationInputs::default(),
            &EvolutionContext::default(),
        );

        assert_eq!(population.len(), 0);
    }

    #[test]
    fn best_and_worst_ignore_unevaluated() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        let mut unevaluated = scored(99.0);
        unevaluated.clear_evaluation_state();
        population.set_population(vec![scored(0.2), scored(0.8), unevaluated]);

        assert_eq!(population.get_best().unwrap().score(), 0.8);
        assert_eq!(population.get_worst().unwrap().score(), 0.2);
    }

    #[test]
    fn get_best_requires_an_evaluated_genome() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        let mut unevaluated = scored(1.0);
        unevaluated.clear_evaluation_state();
        population.set_population(vec![unevaluated]);

        assert!(population.get_best().is_err());
    }

    #[test]
    fn get_top_orders_by_fitness() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        population.set_population(vec![scored(0.1), scored(0.9), scored(0.5)]);

        let top = population.get_top(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].score(), 0.9);
        assert_eq!(top[1].score(), 0.5);
    }

    #[test]
    fn remove_unevaluated_replenishes_to_the_floor() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        let mut unevaluated = scored(1.0);
        unevaluated.clear_evaluation_state();
        population.set_population(vec![
            scored(0.5),
            scored(0.6),
            unevaluated.clone(),
            unevaluated,
        ]);

        population
            .remove_unevaluated(
                &factory(),
                &EvaluationInputs::default(),
                &EvolutionContext::default(),
            )
            .unwrap();

        assert_eq!(population.len(), MIN_VIABLE);
    }

    #[test]
    fn collapse_below_two_is_fatal() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        let mut unevaluated = scored(1.0);
        unevaluated.clear_evaluation_state();
        population.set_population(vec![scored(0.5), unevaluated]);

        let result = population.remove_unevaluated(
            &failing_factory(),
            &EvaluationInputs::default(),
            &EvolutionContext::default(),
        );

        assert!(result.is_err());
    }

    #[test]
    fn prune_similar_keeps_the_fittest_of_a_group() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        // Identical configs: distance zero, one group.
        population.set_population(vec![scored(0.3), scored(0.7), scored(0.5)]);

        population.prune_similar(0.1);

        assert_eq!(population.len(), 1);
        assert_eq!(population.genomes()[0].score(), 0.7);
    }

    #[test]
    fn reset_advances_every_genome() {
        let mut population = Population::new(InitialPopulationMethod::Random);
        population.set_population(vec![scored(0.3), scored(0.7)]);

        let context = EvolutionContext {
            run_id: "run".to_string(),
            generation_id: "gen-3".to_string(),
            generation_number: 3,
        };
        population.reset_genomes(&context);

        for genome in population.genomes() {
            assert!(!genome.is_evaluated());
            assert_eq!(genome.context().generation_number, 3);
        }
    }
}
