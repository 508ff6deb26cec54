use crate::workflow::WorkflowConfig;
use chrono::{DateTime, Utc};
use evoflow_error::{EvoflowResult, evoflow_err};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// How a genome came to exist. Unknown tags are rejected at the serde
/// boundary rather than carried as strings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationTag {
    Init,
    Crossover,
    Mutation,
    Immigrant,
}

impl Display for OperationTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OperationTag::Init => write!(f, "init"),
            OperationTag::Crossover => write!(f, "crossover"),
            OperationTag::Mutation => write!(f, "mutation"),
            OperationTag::Immigrant => write!(f, "immigrant"),
        }
    }
}

/// Fitness as reported by the external evaluator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fitness {
    pub score: f64,
    pub total_cost_usd: f64,
    pub total_time_seconds: f64,
    pub accuracy: f64,
}

impl Fitness {
    pub fn zero() -> Self {
        Self {
            score: 0.0,
            total_cost_usd: 0.0,
            total_time_seconds: 0.0,
            accuracy: 0.0,
        }
    }
}

impl Default for Fitness {
    fn default() -> Self {
        Self::zero()
    }
}

/// Evaluation state of a genome for the generation it currently sits in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResults {
    pub workflow_version_id: String,
    pub has_been_evaluated: bool,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub fitness: Fitness,
    pub cost_of_evaluation: f64,
    pub errors: Vec<String>,
    pub feedback: Option<String>,
}

impl EvaluationResults {
    pub fn fresh(workflow_version_id: impl Into<String>) -> Self {
        Self {
            workflow_version_id: workflow_version_id.into(),
            has_been_evaluated: false,
            evaluated_at: None,
            fitness: Fitness::zero(),
            cost_of_evaluation: 0.0,
            errors: Vec::new(),
            feedback: None,
        }
    }
}

/// The (runId, generationId, generationNumber) triple every genome carries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionContext {
    pub run_id: String,
    pub generation_id: String,
    pub generation_number: usize,
}

/// What the evaluator needs alongside the workflow itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationInputs {
    pub goal: String,
    pub dataset_id: String,
    pub workflow_id: String,
}

/// A workflow configuration plus its evolution bookkeeping: where it came
/// from (lineage + operation tag) and which workflow version it carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGenome {
    pub config: WorkflowConfig,
    pub parent_workflow_version_ids: Vec<String>,
    pub workflow_version_id: String,
    pub operation: OperationTag,
}

/// The population member. Mutated only through the narrow set of lifecycle
/// methods below; operators receive a read-only view and return new genomes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genome {
    genome: WorkflowGenome,
    inputs: EvaluationInputs,
    context: EvolutionContext,
    results: EvaluationResults,
    evolution_cost_usd: f64,
    is_evaluated: bool,
}

impl Genome {
    /// Wraps a workflow config into a genome carrying a freshly allocated
    /// workflow-version id.
    pub fn from_config(
        config: WorkflowConfig,
        parent_workflow_version_ids: Vec<String>,
        operation: OperationTag,
        inputs: EvaluationInputs,
        context: EvolutionContext,
    ) -> Self {
        let workflow_version_id = Uuid::new_v4().to_string();

        Self {
            results: EvaluationResults::fresh(workflow_version_id.clone()),
            genome: WorkflowGenome {
                config,
                parent_workflow_version_ids,
                workflow_version_id,
                operation,
            },
            inputs,
            context,
            evolution_cost_usd: 0.0,
            is_evaluated: false,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.genome.config
    }

    pub fn genome_value(&self) -> &WorkflowGenome {
        &self.genome
    }

    pub fn workflow_version_id(&self) -> &str {
        &self.genome.workflow_version_id
    }

    pub fn parent_workflow_version_ids(&self) -> &[String] {
        &self.genome.parent_workflow_version_ids
    }

    pub fn operation(&self) -> OperationTag {
        self.genome.operation
    }

    pub fn inputs(&self) -> &EvaluationInputs {
        &self.inputs
    }

    pub fn context(&self) -> &EvolutionContext {
        &self.context
    }

    pub fn results(&self) -> &EvaluationResults {
        &self.results
    }

    pub fn is_evaluated(&self) -> bool {
        self.is_evaluated
    }

    /// The evaluated score, or zero when the genome has not been scored in
    /// its current generation.
    pub fn score(&self) -> f64 {
        if self.is_evaluated {
            self.results.fitness.score
        } else {
            0.0
        }
    }

    pub fn fitness(&self) -> &Fitness {
        &self.results.fitness
    }

    pub fn feedback(&self) -> Option<&str> {
        self.results.feedback.as_deref()
    }

    pub fn evolution_cost_usd(&self) -> f64 {
        self.evolution_cost_usd
    }

    /// A genome is valid parent material once it carries a positive score.
    pub fn is_valid_parent(&self) -> bool {
        self.is_evaluated && self.results.fitness.score > 0.0
    }

    pub fn set_fitness_and_feedback(
        &mut self,
        fitness: Fitness,
        feedback: Option<String>,
        cost_of_evaluation: f64,
    ) {
        self.results.fitness = fitness;
        self.results.feedback = feedback;
        self.results.cost_of_evaluation = cost_of_evaluation;
        self.results.has_been_evaluated = true;
        self.results.evaluated_at = Some(Utc::now());
        self.is_evaluated = true;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.results.errors.push(error.into());
    }

    /// Clears fitness and feedback without touching the evolution context.
    pub fn clear_evaluation_state(&mut self) {
        self.results = EvaluationResults::fresh(self.genome.workflow_version_id.clone());
        self.is_evaluated = false;
    }

    /// Clears evaluation state and advances the genome into a new
    /// generation. Idempotent for a fixed context.
    pub fn reset(&mut self, context: EvolutionContext) {
        self.clear_evaluation_state();
        self.context = context;
    }

    pub fn add_cost(&mut self, usd: f64) {
        self.evolution_cost_usd += usd;
    }

    /// A stable content hash: `genome-<versionId>-<sha256 of the canonical
    /// JSON of the genome value>`. A pure function of the genome value and
    /// its workflow-version id.
    pub fn hash(&self) -> EvoflowResult<String> {
        let canonical = serde_json::to_string(&self.genome)
            .map_err(|e| evoflow_err!(Engine: "serializing genome: {}", e))?;

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            hex.push_str(&format!("{:02x}", byte));
        }

        Ok(format!(
            "genome-{}-{}",
            self.genome.workflow_version_id, hex
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowNode;

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            entry_node_id: "entry".to_string(),
            nodes: vec![WorkflowNode {
                node_id: "entry".to_string(),
                description: "does everything".to_string(),
                system_prompt: "You are the only agent.".to_string(),
                model_name: "gpt-4o-mini".to_string(),
                mcp_tools: vec![],
                code_tools: vec![],
                hand_offs: vec![],
                memory: None,
            }],
            memory: None,
        }
    }

    fn genome() -> Genome {
        Genome::from_config(
            config(),
            vec![],
            OperationTag::Init,
            EvaluationInputs::default(),
            EvolutionContext::default(),
        )
    }

    #[test]
    fn creation_starts_unevaluated_with_zero_fitness() {
        let genome = genome();

        assert!(!genome.is_evaluated());
        assert_eq!(genome.score(), 0.0);
        assert!(!genome.results().has_been_evaluated);
        assert_eq!(genome.results().workflow_version_id, genome.workflow_version_id());
    }

    #[test]
    fn hash_is_deterministic() {
        let genome = genome();
        assert_eq!(genome.hash().unwrap(), genome.hash().unwrap());
        assert!(genome.hash().unwrap().starts_with("genome-"));
    }

    #[test]
    fn hash_changes_with_content() {
        let one = genome();
        let mut two = one.clone();
        two.genome.config.node_mut("entry").unwrap().model_name = "gpt-4o".to_string();

        assert_ne!(one.hash().unwrap(), two.hash().unwrap());
    }

    #[test]
    fn hash_ignores_evaluation_state() {
        let mut genome = genome();
        let before = genome.hash().unwrap();

        genome.set_fitness_and_feedback(
            Fitness {
                score: 0.9,
                ..Fitness::zero()
            },
            Some("good".to_string()),
            0.01,
        );

        assert_eq!(genome.hash().unwrap(), before);
    }

    #[test]
    fn set_then_clear_round_trips() {
        let mut genome = genome();
        let fitness = Fitness {
            score: 0.42,
            ..Fitness::zero()
        };

        genome.set_fitness_and_feedback(fitness.clone(), Some("fine".to_string()), 0.02);
        assert!(genome.is_evaluated());
        assert_eq!(genome.score(), 0.42);

        genome.clear_evaluation_state();
        assert!(!genome.is_evaluated());
        assert_eq!(genome.score(), 0.0);

        genome.set_fitness_and_feedback(fitness, None, 0.02);
        assert!(genome.is_evaluated());
        assert_eq!(genome.score(), 0.42);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut genome = genome();
        genome.set_fitness_and_feedback(
            Fitness {
                score: 1.0,
                ..Fitness::zero()
            },
            None,
            0.0,
        );

        let context = EvolutionContext {
            run_id: "run-1".to_string(),
            generation_id: "gen-2".to_string(),
            generation_number: 2,
        };

        genome.reset(context.clone());
        let first = genome.clone();
        genome.reset(context);

        assert_eq!(genome, first);
    }

    #[test]
    fn valid_parents_need_positive_scores() {
        let mut genome = genome();
        assert!(!genome.is_valid_parent());

        genome.set_fitness_and_feedback(Fitness::zero(), None, 0.0);
        assert!(!genome.is_valid_parent());

        genome.set_fitness_and_feedback(
            Fitness {
                score: 0.1,
                ..Fitness::zero()
            },
            None,
            0.0,
        );
        assert!(genome.is_valid_parent());
    }

    #[test]
    fn cost_accumulates() {
        let mut genome = genome();
        genome.add_cost(0.01);
        genome.add_cost(0.02);

        assert!((genome.evolution_cost_usd() - 0.03).abs() < 1e-9);
    }
}
