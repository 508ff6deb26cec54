use super::{MutationOperator, OperatorContext, OperatorOutcome};
use evoflow_core::domain::random_provider;
use evoflow_core::memory::relocate_deleted_memory;
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::{EvoflowResult, evoflow_bail};

/// Removes a random leaf node (never the entry node) and relocates its
/// memory so the preservation invariant keeps holding.
#[derive(Debug, Default, Clone)]
pub struct DeleteNode;

impl MutationOperator for DeleteNode {
    fn name(&self) -> &'static str {
        "deleteNode"
    }

    fn apply(
        &self,
        ctx: &OperatorContext<'_>,
        config: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome> {
        ctx.cancel.ensure_active()?;

        let leaves = config.leaf_nodes();
        if leaves.is_empty() {
            evoflow_bail!(Operator: "no deletable leaf node");
        }

        let victim_id = random_provider::choose(&leaves).node_id.clone();

        let mut child = config.clone();
        let Some(position) = child.nodes.iter().position(|n| n.node_id == victim_id) else {
            evoflow_bail!(Operator: "leaf '{}' vanished during deletion", victim_id);
        };
        let removed = child.nodes.remove(position);

        for node in &mut child.nodes {
            node.hand_offs.retain(|target| *target != victim_id);
        }

        relocate_deleted_memory(&mut child, &removed)?;

        Ok(OperatorOutcome::free(child))
    }
}
