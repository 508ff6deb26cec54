//! The genetic operator set. Each operator is a small strategy over a
//! read-only [WorkflowConfig]; it returns a new config plus the usd cost it
//! incurred against the LLM gateway. Failures are recoverable at the
//! breeding layer: the slot simply yields no child.

mod add_node;
mod crossover;
mod delete_node;
mod model;
mod prompt;
mod structure;
mod tool;

#[cfg(test)]
pub(crate) mod tests_support;

pub use add_node::AddNode;
pub use crossover::{Crossover, CrossoverKind};
pub use delete_node::DeleteNode;
pub use model::ModelMutation;
pub use prompt::PromptMutation;
pub use structure::{STRUCTURE_PATTERNS, StructureMutation};
pub use tool::ToolMutation;

use crate::settings::EvolutionMode;
use evoflow_core::domain::cancel::CancelToken;
use evoflow_core::capability::{Gateway, ModelCatalog, WorkflowVerifier};
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::EvoflowResult;

/// The mutation families the coordinator samples between.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MutationType {
    Model,
    Prompt,
    Tool,
    Cultural,
    Structure,
    AddNode,
    DeleteNode,
}

impl MutationType {
    pub const ALL: [MutationType; 7] = [
        MutationType::Model,
        MutationType::Prompt,
        MutationType::Tool,
        MutationType::Cultural,
        MutationType::Structure,
        MutationType::AddNode,
        MutationType::DeleteNode,
    ];

    /// The fixed sampling weight of each family. Renormalized by the
    /// coordinator over whichever families the active mode keeps.
    pub fn weight(&self) -> f64 {
        match self {
            MutationType::Model => 0.22,
            MutationType::Prompt => 0.18,
            MutationType::Tool => 0.18,
            MutationType::Cultural => 0.15,
            MutationType::Structure => 0.13,
            MutationType::AddNode => 0.07,
            MutationType::DeleteNode => 0.07,
        }
    }

    /// Whether the family participates under the given mode. `Gp` excludes
    /// the cultural operator; `Iterative` exposes only it.
    pub fn available_in(&self, mode: EvolutionMode) -> bool {
        match mode {
            EvolutionMode::Gp => !matches!(self, MutationType::Cultural),
            EvolutionMode::Iterative => matches!(self, MutationType::Cultural),
        }
    }
}

/// Shared state handed to each operator invocation.
pub struct OperatorContext<'a> {
    pub gateway: &'a dyn Gateway,
    pub catalog: &'a dyn ModelCatalog,
    pub verifier: &'a dyn WorkflowVerifier,
    pub cancel: &'a CancelToken,
    /// Normalized mutation intensity in [0, 1].
    pub intensity: f64,
    /// Free-text guidance for the cultural operator.
    pub mutation_instructions: &'a str,
}

/// A modified config plus the cost the operator incurred producing it.
#[derive(Clone, Debug)]
pub struct OperatorOutcome {
    pub config: WorkflowConfig,
    pub usd_cost: f64,
}

impl OperatorOutcome {
    pub fn free(config: WorkflowConfig) -> Self {
        Self {
            config,
            usd_cost: 0.0,
        }
    }

    pub fn priced(config: WorkflowConfig, usd_cost: f64) -> Self {
        Self { config, usd_cost }
    }
}

/// Uniform contract for single-parent operators. Implementations never
/// mutate the input; they clone, transform, and return.
pub trait MutationOperator: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        ctx: &OperatorContext<'_>,
        config: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome>;
}
