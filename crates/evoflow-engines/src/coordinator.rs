use crate::operators::{
    AddNode, DeleteNode, ModelMutation, MutationOperator, MutationType, OperatorContext,
    OperatorOutcome, PromptMutation, StructureMutation, ToolMutation,
};
use crate::settings::EvolutionMode;
use evoflow_core::domain::random_provider;
use evoflow_core::genome::{Genome, OperationTag};
use evoflow_core::memory::{enforce_memory_preservation, preserve_mutation_memory};
use evoflow_core::tracker::{FailureKind, FailureTracker};
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::EvoflowResult;
use std::sync::Arc;
use tracing::debug;

/// Picks a mutation family by weight, dispatches the operator, and enforces
/// the memory-preservation contract on the result. The weight table is
/// renormalized over the families the active mode keeps and sampled by
/// inverse CDF.
pub struct MutationCoordinator {
    cumulative: Vec<(MutationType, f64)>,
    tracker: Arc<FailureTracker>,
    model: ModelMutation,
    prompt: PromptMutation,
    tool: ToolMutation,
    structure: StructureMutation,
    add_node: AddNode,
    delete_node: DeleteNode,
}

impl MutationCoordinator {
    pub fn new(mode: EvolutionMode, tracker: Arc<FailureTracker>) -> Self {
        let kept = MutationType::ALL
            .iter()
            .copied()
            .filter(|t| t.available_in(mode))
            .collect::<Vec<_>>();

        let total: f64 = kept.iter().map(|t| t.weight()).sum();
        let mut cumulative = Vec::with_capacity(kept.len());
        let mut running = 0.0;
        for kind in kept {
            running += kind.weight() / total;
            cumulative.push((kind, running));
        }

        Self {
            cumulative,
            tracker,
            model: ModelMutation,
            prompt: PromptMutation,
            tool: ToolMutation,
            structure: StructureMutation,
            add_node: AddNode,
            delete_node: DeleteNode,
        }
    }

    /// Samples a mutation family from the renormalized weight table.
    pub fn sample_type(&self) -> MutationType {
        let draw = random_provider::random::<f64>();
        for (kind, bound) in &self.cumulative {
            if draw < *bound {
                return *kind;
            }
        }

        // Floating point can leave the last bound a hair under 1.0.
        self.cumulative
            .last()
            .map(|(kind, _)| *kind)
            .unwrap_or(MutationType::Model)
    }

    fn dispatch(
        &self,
        kind: MutationType,
        ctx: &OperatorContext<'_>,
        config: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome> {
        match kind {
            MutationType::Model => self.model.apply(ctx, config),
            MutationType::Prompt => self.prompt.apply(ctx, config),
            // The cultural operator is the prompt path steered entirely by
            // the configured mutation instructions.
            MutationType::Cultural => self.prompt.apply(ctx, config),
            MutationType::Tool => self.tool.apply(ctx, config),
            MutationType::Structure => self.structure.apply(ctx, config),
            MutationType::AddNode => self.add_node.apply(ctx, config),
            MutationType::DeleteNode => self.delete_node.apply(ctx, config),
        }
    }

    fn mutate_inner(
        &self,
        ctx: &OperatorContext<'_>,
        parent: &Genome,
    ) -> EvoflowResult<(Genome, f64)> {
        let kind = self.sample_type();
        let outcome = self.dispatch(kind, ctx, parent.config())?;

        let mut config = outcome.config;
        let mut cost = outcome.usd_cost;

        preserve_mutation_memory(parent.config(), &mut config);
        enforce_memory_preservation(&[parent.config()], &config)?;

        // High-intensity mutations also reshuffle a model assignment.
        if ctx.intensity > 0.6 && random_provider::bool(ctx.intensity) {
            match self.model.apply(ctx, &config) {
                Ok(extra) => {
                    config = extra.config;
                    cost += extra.usd_cost;
                    preserve_mutation_memory(parent.config(), &mut config);
                    enforce_memory_preservation(&[parent.config()], &config)?;
                }
                Err(err) => {
                    debug!(error = %err, "secondary model mutation skipped");
                }
            }
        }

        let config = ctx.verifier.validate_and_repair(config, 2)?;
        config.validate_structure()?;

        let child = Genome::from_config(
            config,
            vec![parent.workflow_version_id().to_string()],
            OperationTag::Mutation,
            parent.inputs().clone(),
            parent.context().clone(),
        );

        Ok((child, cost))
    }

    /// Produces a mutated child of `parent`, or an error after recording
    /// the failure. The returned cost is cumulative across every gateway
    /// call the mutation made.
    pub fn mutate(
        &self,
        ctx: &OperatorContext<'_>,
        parent: &Genome,
    ) -> EvoflowResult<(Genome, f64)> {
        self.tracker.record_attempt(FailureKind::Mutation);

        match self.mutate_inner(ctx, parent) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.tracker.record_failure(FailureKind::Mutation);
                Err(err)
            }
        }
    }

    /// The renormalized weight of each family under the active mode.
    pub fn normalized_weights(&self) -> Vec<(MutationType, f64)> {
        let mut previous = 0.0;
        self.cumulative
            .iter()
            .map(|(kind, bound)| {
                let weight = bound - previous;
                previous = *bound;
                (*kind, weight)
            })
            .collect()
    }
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("cumulative", &self.cumulative)
            .finish()
    }
}

/// A convenience for building the coordinator when only sampling behavior
/// matters (statistics tests and diagnostics).
pub fn sampling_only(mode: EvolutionMode) -> MutationCoordinator {
    MutationCoordinator::new(mode, Arc::new(FailureTracker::new()))
}

/// Normalizes a Poisson-drawn intensity into the [0, 1] scale operators
/// expect. The sampler is clamped to [4, 5], so the scale lands on 0.8 or
/// 1.0 for freshly seeded genomes.
pub fn normalize_intensity(poisson_sample: u32) -> f64 {
    (poisson_sample as f64 / 5.0).min(1.0)
}
