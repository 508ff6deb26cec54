use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::{EvoflowResult, ensure};
use serde::{Deserialize, Serialize};

/// How the initial population is produced.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InitialPopulationMethod {
    #[default]
    Random,
    BaseWorkflow,
    Prepared,
}

/// `GP` runs the full genetic-programming operator set; `Iterative`
/// restricts breeding to the cultural (instruction-guided) operator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvolutionMode {
    #[default]
    Gp,
    Iterative,
}

/// Free-text guidance threaded into the cultural mutation operator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationParams {
    pub mutation_instructions: String,
}

/// The full configuration surface of an evolution run. Validated once at
/// engine construction; an invalid combination is fatal before any
/// collaborator is called.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionSettings {
    /// μ, the survivor count per generation.
    pub population_size: usize,
    /// Total generation budget for the run.
    pub generations: usize,
    pub elite_size: usize,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    /// λ, offspring bred per generation.
    pub offspring_count: usize,
    pub number_of_parents_creating_offspring: usize,
    pub max_cost_usd: f64,
    pub maximum_time_minutes: f64,
    /// Named per hour, but enforced as an absolute per-run ceiling on the
    /// evaluation counter, matching the original system's behavior.
    pub max_evaluations_per_hour: usize,
    pub initial_population_method: InitialPopulationMethod,
    pub evolution_mode: EvolutionMode,
    pub mutation_params: MutationParams,
    /// Worker cap for the bounded evaluation and breeding pools.
    pub max_concurrent_evaluations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_workflow: Option<WorkflowConfig>,
}

impl Default for EvolutionSettings {
    fn default() -> Self {
        Self {
            population_size: 10,
            generations: 5,
            elite_size: 2,
            tournament_size: 3,
            crossover_rate: 0.3,
            mutation_rate: 0.5,
            offspring_count: 8,
            number_of_parents_creating_offspring: 2,
            max_cost_usd: 10.0,
            maximum_time_minutes: 60.0,
            max_evaluations_per_hour: 500,
            initial_population_method: InitialPopulationMethod::Random,
            evolution_mode: EvolutionMode::Gp,
            mutation_params: MutationParams::default(),
            max_concurrent_evaluations: 4,
            base_workflow: None,
        }
    }
}

impl EvolutionSettings {
    pub fn validate(&self) -> EvoflowResult<()> {
        ensure!(self.population_size > 0, InvalidConfig: "populationSize must be positive");
        ensure!(self.generations > 0, InvalidConfig: "generations must be positive");
        ensure!(self.tournament_size > 0, InvalidConfig: "tournamentSize must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.crossover_rate),
            InvalidConfig: "crossoverRate {} outside [0, 1]", self.crossover_rate
        );
        ensure!(
            (0.0..=1.0).contains(&self.mutation_rate),
            InvalidConfig: "mutationRate {} outside [0, 1]", self.mutation_rate
        );
        ensure!(
            self.crossover_rate + self.mutation_rate <= 1.0 + f64::EPSILON,
            InvalidConfig: "crossoverRate + mutationRate exceeds 1.0"
        );
        ensure!(
            self.number_of_parents_creating_offspring > 0,
            InvalidConfig: "numberOfParentsCreatingOffspring must be positive"
        );
        ensure!(self.max_cost_usd >= 0.0, InvalidConfig: "maxCostUSD must be non-negative");
        ensure!(
            self.maximum_time_minutes > 0.0,
            InvalidConfig: "maximumTimeMinutes must be positive"
        );
        ensure!(
            self.max_evaluations_per_hour > 0,
            InvalidConfig: "maxEvaluationsPerHour must be positive"
        );
        ensure!(
            self.max_concurrent_evaluations > 0,
            InvalidConfig: "maxConcurrentEvaluations must be positive"
        );
        if self.initial_population_method == InitialPopulationMethod::BaseWorkflow {
            ensure!(
                self.base_workflow.is_some(),
                InvalidConfig: "baseWorkflow method requires a base workflow"
            );
        }

        Ok(())
    }

    /// The immigration probability left after crossover and mutation.
    pub fn immigration_rate(&self) -> f64 {
        (1.0 - self.crossover_rate - self.mutation_rate).max(0.0)
    }
}
