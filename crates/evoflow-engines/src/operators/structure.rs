use super::{MutationOperator, OperatorContext, OperatorOutcome};
use evoflow_core::capability::FormalizeOptions;
use evoflow_core::domain::random_provider;
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::EvoflowResult;
use tracing::debug;

/// Structural patterns the restructure instruction can aim for.
pub const STRUCTURE_PATTERNS: [&str; 6] = [
    "sequential",
    "parallel",
    "branching",
    "merge",
    "hub-and-spoke",
    "pipeline",
];

/// Picks a random structural pattern and asks the formalizer to restructure
/// the hand-off topology toward it while keeping the graph connected. A
/// failed restructure leaves the config unchanged rather than killing the
/// breeding slot.
#[derive(Debug, Default, Clone)]
pub struct StructureMutation;

fn restructure_instruction(pattern: &str) -> String {
    format!(
        "Restructure the hand-offs of this workflow toward a {} topology. \
         Keep every node reachable from the entry node and do not rename, \
         add, or remove nodes.",
        pattern
    )
}

impl MutationOperator for StructureMutation {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn apply(
        &self,
        ctx: &OperatorContext<'_>,
        config: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome> {
        ctx.cancel.ensure_active()?;

        let pattern = *random_provider::choose(&STRUCTURE_PATTERNS);
        let response = ctx.verifier.formalize(
            &restructure_instruction(pattern),
            FormalizeOptions {
                workflow_config: Some(config.clone()),
                verify_workflow: true,
                repair_after_generation: true,
            },
        );
        ctx.cancel.ensure_active()?;

        match response.data {
            Some(restructured) => {
                Ok(OperatorOutcome::priced(restructured, response.usd_cost))
            }
            None => {
                debug!(
                    pattern,
                    error = %response.error_message(),
                    "structure mutation failed, keeping topology"
                );
                Ok(OperatorOutcome::priced(config.clone(), response.usd_cost))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::tests_support::{
        TestCatalog, TestGateway, TestVerifier, ctx, node, two_node_config,
    };
    use evoflow_core::capability::AiResponse;
    use evoflow_core::domain::cancel::CancelToken;

    #[test]
    fn replaces_topology_with_formalized_result() {
        let restructured = WorkflowConfig {
            entry_node_id: "entry".to_string(),
            nodes: vec![node("entry", &["leaf"]), node("leaf", &["entry"])],
            memory: None,
        };
        let gateway = TestGateway::default();
        let catalog = TestCatalog::with_models(&["gpt-4o"]);
        let verifier = TestVerifier::formalizing(AiResponse::success(restructured.clone(), 0.004));
        let cancel = CancelToken::new();
        let ctx = ctx(&gateway, &catalog, &verifier, &cancel);

        let outcome = StructureMutation.apply(&ctx, &two_node_config()).unwrap();

        assert_eq!(outcome.config, restructured);
        assert_eq!(outcome.usd_cost, 0.004);
    }

    #[test]
    fn failure_keeps_the_original_topology() {
        let gateway = TestGateway::default();
        let catalog = TestCatalog::with_models(&["gpt-4o"]);
        let verifier =
            TestVerifier::formalizing(AiResponse::failure("formalizer unavailable", 0.001));
        let cancel = CancelToken::new();
        let ctx = ctx(&gateway, &catalog, &verifier, &cancel);

        let config = two_node_config();
        let outcome = StructureMutation.apply(&ctx, &config).unwrap();

        assert_eq!(outcome.config, config);
        assert_eq!(outcome.usd_cost, 0.001);
    }
}
