use super::{MutationOperator, OperatorContext, OperatorOutcome};
use evoflow_core::capability::FormalizeOptions;
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::{EvoflowResult, evoflow_bail};

/// Asks the formalizer to insert one specialized node into the workflow,
/// then validates and repairs the result.
#[derive(Debug, Default, Clone)]
pub struct AddNode;

const INSERT_INSTRUCTION: &str =
    "Insert one new specialized agent node into this workflow where it adds \
     the most leverage. Wire it into the existing hand-off graph, give it a \
     distinct id, and keep every existing node unchanged.";

impl MutationOperator for AddNode {
    fn name(&self) -> &'static str {
        "addNode"
    }

    fn apply(
        &self,
        ctx: &OperatorContext<'_>,
        config: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome> {
        ctx.cancel.ensure_active()?;

        let response = ctx.verifier.formalize(
            INSERT_INSTRUCTION,
            FormalizeOptions {
                workflow_config: Some(config.clone()),
                verify_workflow: true,
                repair_after_generation: true,
            },
        );
        ctx.cancel.ensure_active()?;

        let Some(expanded) = response.data else {
            evoflow_bail!(Operator: "node insertion failed: {}", response.error_message());
        };

        let repaired = ctx.verifier.validate_and_repair(expanded, 2)?;
        repaired.validate_structure()?;

        Ok(OperatorOutcome::priced(repaired, response.usd_cost))
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
    fn inserts_the_formalized_node() {
        let expanded = WorkflowConfig {
            entry_node_id: "entry".to_string(),
            nodes: vec![
                node("entry", &["reviewer"]),
                node("reviewer", &["leaf"]),
                node("leaf", &[]),
            ],
            memory: None,
        };
        let gateway = TestGateway::default();
        let catalog = TestCatalog::with_models(&["gpt-4o"]);
        let verifier = TestVerifier::formalizing(AiResponse::success(expanded, 0.005));
        let cancel = CancelToken::new();
        let ctx = ctx(&gateway, &catalog, &verifier, &cancel);

        let outcome = AddNode.apply(&ctx, &two_node_config()).unwrap();

        assert_eq!(outcome.config.nodes.len(), 3);
        assert!(outcome.config.contains_node("reviewer"));
    }

    #[test]
    fn formalize_failure_fails_the_operator() {
        let gateway = TestGateway::default();
        let catalog = TestCatalog::with_models(&["gpt-4o"]);
        let verifier = TestVerifier::formalizing(AiResponse::failure("no insertion point", 0.0));
        let cancel = CancelToken::new();
        let ctx = ctx(&gateway, &catalog, &verifier, &cancel);

        assert!(AddNode.apply(&ctx, &two_node_config()).is_err());
    }

    #[test]
    fn malformed_result_is_rejected() {
        // Formalizer returns a graph whose hand-off dangles.
        let broken = WorkflowConfig {
            entry_node_id: "entry".to_string(),
            nodes: vec![node("entry", &["ghost"])],
            memory: None,
        };
        let gateway = TestGateway::default();
        let catalog = TestCatalog::with_models(&["gpt-4o"]);
        let verifier = TestVerifier::formalizing(AiResponse::success(broken, 0.0));
        let cancel = CancelToken::new();
        let ctx = ctx(&gateway, &catalog, &verifier, &cancel);

        assert!(AddNode.apply(&ctx, &two_node_config()).is_err());
    }
}
