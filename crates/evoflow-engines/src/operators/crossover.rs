use super::{OperatorContext, OperatorOutcome};
use evoflow_core::capability::FormalizeOptions;
use evoflow_core::domain::random_provider;
use evoflow_core::memory::{enforce_memory_preservation, preserve_crossover_memory};
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::{EvoflowResult, evoflow_bail};

/// The recombination strategies the crossover instruction can ask for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CrossoverKind {
    BehavioralBlend,
    StructureCrossover,
    PatternFusion,
    Hybrid,
}

impl CrossoverKind {
    pub const ALL: [CrossoverKind; 4] = [
        CrossoverKind::BehavioralBlend,
        CrossoverKind::StructureCrossover,
        CrossoverKind::PatternFusion,
        CrossoverKind::Hybrid,
    ];

    fn directive(&self) -> &'static str {
        match self {
            CrossoverKind::BehavioralBlend => {
                "Blend the behaviors: merge prompts and roles so the child \
                 combines both parents' strengths."
            }
            CrossoverKind::StructureCrossover => {
                "Cross the structures: take the topology of one parent and \
                 populate it with the strongest agents of both."
            }
            CrossoverKind::PatternFusion => {
                "Fuse the patterns: identify each parent's coordination \
                 pattern and compose them into one workflow."
            }
            CrossoverKind::Hybrid => {
                "Combine freely: mix structure, prompts, and tools from both \
                 parents into the strongest child you can."
            }
        }
    }
}

/// Breeds a child workflow from exactly two parents via the formalizer,
/// then repairs it and carries both parents' node memory across.
#[derive(Debug, Default, Clone)]
pub struct Crossover;

fn describe(config: &WorkflowConfig, label: &str) -> EvoflowResult<String> {
    Ok(format!("{}:\n{}\n", label, config.canonical_json()?))
}

impl Crossover {
    pub fn apply(
        &self,
        ctx: &OperatorContext<'_>,
        parent_one: &WorkflowConfig,
        parent_two: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome> {
        ctx.cancel.ensure_active()?;

        let kind = *random_provider::choose(&CrossoverKind::ALL);
        let instruction = format!(
            "Create one child workflow from these two parent workflows.\n{}\n{}{}",
            kind.directive(),
            describe(parent_one, "Parent one")?,
            describe(parent_two, "Parent two")?,
        );

        let response = ctx.verifier.formalize(
            &instruction,
            FormalizeOptions {
                workflow_config: None,
                verify_workflow: true,
                repair_after_generation: true,
            },
        );
        ctx.cancel.ensure_active()?;

        let Some(child) = response.data else {
            evoflow_bail!(Operator: "crossover formalization failed: {}", response.error_message());
        };

        let mut child = ctx.verifier.validate_and_repair(child, 2)?;
        child.validate_structure()?;

        preserve_crossover_memory(parent_one, parent_two, &mut child);
        enforce_memory_preservation(&[parent_one, parent_two], &child)?;

        Ok(OperatorOutcome::priced(child, response.usd_cost))
    }
}
