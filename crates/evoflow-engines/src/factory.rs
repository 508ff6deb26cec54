use crate::coordinator::{MutationCoordinator, normalize_intensity};
use crate::operators::{OperatorContext, STRUCTURE_PATTERNS};
use crate::settings::InitialPopulationMethod;
use evoflow_core::capability::{FormalizeOptions, Gateway, ModelCatalog, WorkflowVerifier};
use evoflow_core::domain::cancel::CancelToken;
use evoflow_core::domain::random_provider;
use evoflow_core::genome::{EvaluationInputs, EvolutionContext, Genome, OperationTag};
use evoflow_core::math::poisson;
use evoflow_core::workflow::WorkflowConfig;
use evoflow_error::{EvoflowResult, evoflow_bail};
use std::sync::Arc;

/// Builds genomes for population seeding, replenishment, and immigration.
/// Configured once per run from the settings and the evolution objective,
/// then shared across worker threads.
pub struct GenomeFactory {
    gateway: Arc<dyn Gateway>,
    catalog: Arc<dyn ModelCatalog>,
    verifier: Arc<dyn WorkflowVerifier>,
    coordinator: Arc<MutationCoordinator>,
    cancel: CancelToken,
    method: InitialPopulationMethod,
    base_workflow: Option<WorkflowConfig>,
    problem_analysis: String,
    mutation_instructions: String,
}

fn idea_instruction(goal: &str, pattern: &str, analysis: &str, deep: bool) -> String {
    let mut text = format!(
        "Design a new multi-agent workflow that accomplishes this goal:\n{}\n\
         Structure it as a {} workflow.",
        goal, pattern
    );

    if !analysis.is_empty() {
        if deep {
            text.push_str(
                "\nGround every node in this problem analysis; derive the \
                 agent roles, tools, and hand-offs directly from it:\n",
            );
        } else {
            text.push_str("\nProblem analysis:\n");
        }
        text.push_str(analysis);
    }

    text
}

impl GenomeFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn Gateway>,
        catalog: Arc<dyn ModelCatalog>,
        verifier: Arc<dyn WorkflowVerifier>,
        coordinator: Arc<MutationCoordinator>,
        cancel: CancelToken,
        method: InitialPopulationMethod,
        base_workflow: Option<WorkflowConfig>,
        problem_analysis: String,
        mutation_instructions: String,
    ) -> Self {
        Self {
            gateway,
            catalog,
            verifier,
            coordinator,
            cancel,
            method,
            base_workflow,
            problem_analysis,
            mutation_instructions,
        }
    }

    pub fn method(&self) -> InitialPopulationMethod {
        self.method
    }

    fn operator_context(&self, intensity: f64) -> OperatorContext<'_> {
        OperatorContext {
            gateway: self.gateway.as_ref(),
            catalog: self.catalog.as_ref(),
            verifier: self.verifier.as_ref(),
            cancel: &self.cancel,
            intensity,
            mutation_instructions: &self.mutation_instructions,
        }
    }

    /// Synthesizes or derives a fresh workflow config plus the cost spent
    /// producing it.
    fn create_config(
        &self,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
        deep: bool,
    ) -> EvoflowResult<(WorkflowConfig, f64)> {
        self.cancel.ensure_active()?;

        if self.method == InitialPopulationMethod::BaseWorkflow {
            if let Some(base) = &self.base_workflow {
                let seed = Genome::from_config(
                    base.clone(),
                    vec![],
                    OperationTag::Init,
                    inputs.clone(),
                    context.clone(),
                );

                let intensity = normalize_intensity(poisson(1.0, Some(4), Some(5)));
                let ctx = self.operator_context(intensity);
                let (child, cost) = self.coordinator.mutate(&ctx, &seed)?;

                return Ok((child.config().clone(), cost));
            }
        }

        let pattern = *random_provider::choose(&STRUCTURE_PATTERNS);
        let instruction = idea_instruction(&inputs.goal, pattern, &self.problem_analysis, deep);

        let response = self.verifier.formalize(
            &instruction,
            FormalizeOptions {
                workflow_config: None,
                verify_workflow: true,
                repair_after_generation: true,
            },
        );
        self.cancel.ensure_active()?;

        let Some(config) = response.data else {
            evoflow_bail!(Operator: "workflow synthesis failed: {}", response.error_message());
        };

        let config = self.verifier.validate_and_repair(config, 2)?;
        config.validate_structure()?;

        Ok((config, response.usd_cost))
    }

    fn wrap(
        config: WorkflowConfig,
        cost: f64,
        parents: Vec<String>,
        operation: OperationTag,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
    ) -> Genome {
        let mut genome =
            Genome::from_config(config, parents, operation, inputs.clone(), context.clone());
        genome.add_cost(cost);
        genome
    }

    /// A fresh genome: derived from the base workflow (with one coordinated
    /// mutation at Poisson intensity) when that method is configured, else
    /// synthesized from the goal, a random structural pattern, and the
    /// problem analysis.
    pub fn create_random(
        &self,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
    ) -> EvoflowResult<Genome> {
        let (config, cost) = self.create_config(inputs, context, false)?;
        Ok(Self::wrap(config, cost, vec![], OperationTag::Init, inputs, context))
    }

    /// Like [create_random], but the synthesis prompt consumes the problem
    /// analysis in depth.
    pub fn create_prepared(
        &self,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
    ) -> EvoflowResult<Genome> {
        let (config, cost) = self.create_config(inputs, context, true)?;
        Ok(Self::wrap(config, cost, vec![], OperationTag::Init, inputs, context))
    }

    /// Replenishment path: prepared when the run was configured that way,
    /// random otherwise.
    pub fn create_for_replenishment(
        &self,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
    ) -> EvoflowResult<Genome> {
        match self.method {
            InitialPopulationMethod::Prepared => self.create_prepared(inputs, context),
            _ => self.create_random(inputs, context),
        }
    }

    /// A fresh immigrant. Lineage is inherited from the parents drawn for
    /// the breeding slot, even though none of their genetic material is.
    pub fn create_immigrant(
        &self,
        inputs: &EvaluationInputs,
        context: &EvolutionContext,
        parent_ids: Vec<String>,
    ) -> EvoflowResult<Genome> {
        let (config, cost) = self.create_config(inputs, context, false)?;
        Ok(Self::wrap(
            config,
            cost,
            parent_ids,
            OperationTag::Immigrant,
            inputs,
            context,
        ))
    }
}
