//! Capability interfaces for the engine's external collaborators: the LLM
//! gateway, the fitness evaluator, the workflow verifier, persistence, and
//! the model catalog. The engine owns none of their internals; it consumes
//! them as `Arc<dyn Trait>` seams so tests can substitute mocks.

use crate::domain::cancel::CancelToken;
use crate::genome::{EvolutionContext, Fitness, Genome, OperationTag};
use crate::stats::PopulationStats;
use crate::workflow::WorkflowConfig;
use evoflow_error::EvoflowResult;
use serde::{Deserialize, Serialize};

/// The priced result shape every model-backed collaborator conforms to.
/// Cost accrues whether or not the call produced usable data.
#[derive(Clone, Debug, PartialEq)]
pub struct AiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub usd_cost: f64,
}

impl<T> AiResponse<T> {
    pub fn success(data: T, usd_cost: f64) -> Self {
        Self {
            data: Some(data),
            error: None,
            usd_cost,
        }
    }

    pub fn failure(error: impl Into<String>, usd_cost: f64) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
            usd_cost,
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }

    /// The error message, or a generic fallback when the collaborator
    /// returned neither data nor a reason.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "collaborator returned no data".to_string())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: MessageRole,
    pub content: String,
}

impl AiMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiRequest {
    pub model: String,
    pub messages: Vec<AiMessage>,
}

/// A structured tool-mutation action emitted by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAction {
    pub action: ToolActionKind,
    pub tool: String,
    /// Which node set the tool belongs to.
    pub tool_kind: ToolKind,
    /// Target node ids; the single sentinel `all` targets every node.
    pub target_node_ids: Vec<String>,
    pub from_node_id: Option<String>,
    pub to_node_id: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolActionKind {
    Add,
    Remove,
    Move,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Mcp,
    Code,
}

/// The LLM gateway: free-text and structured modes used by the operators.
pub trait Gateway: Send + Sync {
    fn send_text(&self, request: AiRequest) -> AiResponse<String>;
    fn send_workflow(&self, request: AiRequest) -> AiResponse<WorkflowConfig>;
    fn send_tool_action(&self, request: AiRequest) -> AiResponse<ToolAction>;
}

/// What the external evaluator reports for one genome.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluatedFitness {
    pub fitness: Fitness,
    pub feedback: Option<String>,
}

/// The external fitness evaluator. Side-effect free apart from cost accrual.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(
        &self,
        genome: &Genome,
        context: &EvolutionContext,
        cancel: &CancelToken,
    ) -> AiResponse<EvaluatedFitness>;
}

/// Outcome of verifying a workflow config.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Verdict {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl Verdict {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FormalizeOptions {
    /// An existing config for the formalizer to start from.
    pub workflow_config: Option<WorkflowConfig>,
    pub verify_workflow: bool,
    pub repair_after_generation: bool,
}

/// The workflow validator/repair collaborator.
pub trait WorkflowVerifier: Send + Sync {
    /// Turns a natural-language instruction block into a workflow config.
    fn formalize(&self, instruction: &str, options: FormalizeOptions)
    -> AiResponse<WorkflowConfig>;

    fn verify(&self, config: &WorkflowConfig) -> Verdict;

    /// Repairs the config, retrying internally up to `max_retries` times.
    fn validate_and_repair(
        &self,
        config: WorkflowConfig,
        max_retries: usize,
    ) -> EvoflowResult<WorkflowConfig>;
}

/// Model catalog and per-user registry, read-only.
pub trait ModelCatalog: Send + Sync {
    fn active_model_names(&self) -> Vec<String>;
    fn is_tool_known(&self, name: &str) -> bool;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRecord {
    pub goal_text: String,
    /// Serialized engine settings, stored for later inspection.
    pub config: String,
    pub status: RunStatus,
    pub evolution_type: String,
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewGeneration {
    pub generation_number: usize,
    pub run_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedGeneration {
    pub generation_id: String,
    pub best_workflow_version_id: String,
    pub comment: String,
    pub feedback: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowVersionRecord {
    pub workflow_version_id: String,
    pub workflow_id: String,
    pub commit_message: String,
    pub dsl: String,
    pub generation_id: String,
    pub operation: OperationTag,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastGeneration {
    pub run_id: String,
    pub generation_number: usize,
    pub generation_id: String,
}

/// Optional persistence for runs, generations, and workflow versions.
/// Implementations surface failures as `EvoflowError::Persistence` with a
/// `PersistenceKind` so the retry layer can tell transient from terminal.
pub trait RunPersistence: Send + Sync {
    fn create_run(&self, run: RunRecord) -> EvoflowResult<String>;
    fn create_generation(&self, generation: NewGeneration) -> EvoflowResult<String>;
    fn generation_exists(&self, run_id: &str, number: usize) -> EvoflowResult<bool>;
    fn generation_id_by_number(&self, run_id: &str, number: usize)
    -> EvoflowResult<Option<String>>;
    fn last_completed_generation(&self, run_id: &str) -> EvoflowResult<Option<LastGeneration>>;
    fn complete_generation(
        &self,
        generation: CompletedGeneration,
        stats: &PopulationStats,
    ) -> EvoflowResult<()>;
    fn complete_run(&self, run_id: &str, status: RunStatus, notes: &str) -> EvoflowResult<()>;
    fn create_workflow_version(&self, version: WorkflowVersionRecord) -> EvoflowResult<()>;
}
