use super::{MutationOperator, OperatorContext, OperatorOutcome};
use evoflow_core::domain::random_provider;
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::{EvoflowResult, evoflow_bail};

/// Swaps one node's model for a uniformly random choice from the active
/// pool. The entry node is only eligible when it is the sole node.
#[derive(Debug, Default, Clone)]
pub struct ModelMutation;

impl MutationOperator for ModelMutation {
    fn name(&self) -> &'static str {
        "model"
    }

    fn apply(
        &self,
        ctx: &OperatorContext<'_>,
        config: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome> {
        ctx.cancel.ensure_active()?;

        let candidates = config.mutable_nodes();
        if candidates.is_empty() {
            evoflow_bail!(Operator: "no node eligible for model mutation");
        }

        let target_id = random_provider::choose(&candidates).node_id.clone();
        let current_model = config
            .node(&target_id)
            .map(|n| n.model_name.clone())
            .unwrap_or_default();

        let pool = ctx
            .catalog
            .active_model_names()
            .into_iter()
            .filter(|name| *name != current_model)
            .collect::<Vec<String>>();

        if pool.is_empty() {
            evoflow_bail!(Operator: "active model pool has no alternative to '{}'", current_model);
        }

        let mut child = config.clone();
        let replacement = random_provider::choose(&pool).clone();
        if let Some(node) = child.node_mut(&target_id) {
            node.model_name = replacement;
        }

        Ok(OperatorOutcome::free(child))
    }
}
