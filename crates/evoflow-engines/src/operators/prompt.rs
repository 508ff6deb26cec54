use super::{MutationOperator, OperatorContext, OperatorOutcome};
use evoflow_core::capability::{AiMessage, AiRequest};
use evoflow_core::domain::random_provider;
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::{EvoflowResult, evoflow_bail};

/// Asks the gateway to rewrite one node's system prompt. Intensity scales
/// how far the rewrite is allowed to drift from the original.
#[derive(Debug, Default, Clone)]
pub struct PromptMutation;

fn rewrite_instruction(intensity: f64, instructions: &str) -> String {
    let register = if intensity > 0.7 {
        "Rework it substantially: change structure, emphasis, and strategy."
    } else if intensity > 0.4 {
        "Revise it moderately: keep the role but sharpen the approach."
    } else {
        "Make a light revision: preserve structure, improve clarity."
    };

    let mut text = format!(
        "Rewrite the system prompt of this workflow agent. {} \
         Return only the rewritten prompt.",
        register
    );
    if !instructions.is_empty() {
        text.push_str("\nAdditional guidance: ");
        text.push_str(instructions);
    }
    text
}

impl MutationOperator for PromptMutation {
    fn name(&self) -> &'static str {
        "prompt"
    }

    fn apply(
        &self,
        ctx: &OperatorContext<'_>,
        config: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome> {
        ctx.cancel.ensure_active()?;

        if config.nodes.is_empty() {
            evoflow_bail!(Operator: "no node eligible for prompt mutation");
        }

        let target_index = random_provider::range(0..config.nodes.len());
        let target = &config.nodes[target_index];

        let request = AiRequest {
            model: target.model_name.clone(),
            messages: vec![
                AiMessage::system(rewrite_instruction(
                    ctx.intensity,
                    ctx.mutation_instructions,
                )),
                AiMessage::user(target.system_prompt.clone()),
            ],
        };

        let response = ctx.gateway.send_text(request);
        ctx.cancel.ensure_active()?;

        let Some(rewritten) = response.data else {
            evoflow_bail!(Operator: "prompt rewrite failed: {}", response.error_message());
        };

        if rewritten.trim().is_empty() {
            evoflow_bail!(Operator: "prompt rewrite returned an empty prompt");
        }

        let mut child = config.clone();
        child.nodes[target_index].system_prompt = rewritten;

        Ok(OperatorOutcome::priced(child, response.usd_cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::tests_support::{TestCatalog, TestGateway, TestVerifier, ctx, two_node_config};
    use evoflow_core::capability::AiResponse;
    use evoflow_core::domain::cancel::CancelToken;

    #[test]
    fn rewrites_one_prompt_and_reports_cost() {
        let gateway =
            TestGateway::with_text(AiResponse::success("You are sharper now.".to_string(), 0.003));
        let catalog = TestCatalog::with_models(&["gpt-4o"]);
        let verifier = TestVerifier::default();
        let cancel = CancelToken::new();
        let ctx = ctx(&gateway, &catalog, &verifier, &cancel);

        let config = two_node_config();
        let outcome = PromptMutation.apply(&ctx, &config).unwrap();

        let rewritten = outcome
            .config
            .nodes
            .iter()
            .filter(|n| n.system_prompt == "You are sharper now.")
            .count();
        assert_eq!(rewritten, 1);
        assert_eq!(outcome.usd_cost, 0.003);
    }

    #[test]
    fn gateway_failure_is_an_operator_failure() {
        let gateway = TestGateway::with_text(AiResponse::failure("rate limited", 0.0));
        let catalog = TestCatalog::with_models(&["gpt-4o"]);
        let verifier = TestVerifier::default();
        let cancel = CancelToken::new();
        let ctx = ctx(&gateway, &catalog, &verifier, &cancel);

        assert!(PromptMutation.apply(&ctx, &two_node_config()).is_err());
    }

    #[test]
    fn empty_rewrite_is_rejected() {
        let gateway = TestGateway::with_text(AiResponse::success("   ".to_string(), 0.001));
        let catalog = TestCatalog::with_models(&["gpt-4o"]);
        let verifier = TestVerifier::default();
        let cancel = CancelToken::new();
        let ctx = ctx(&gateway, &catalog, &verifier, &cancel);

        assert!(PromptMutation.apply(&ctx, &two_node_config()).is_err());
    }

    #[test]
    fn instruction_register_scales_with_intensity() {
        assert!(rewrite_instruction(0.9, "").contains("substantially"));
        assert!(rewrite_instruction(0.5, "").contains("moderately"));
        assert!(rewrite_instruction(0.1, "").contains("light"));
    }
}
