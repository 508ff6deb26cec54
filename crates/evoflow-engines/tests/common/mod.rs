//! Mock collaborators shared by the engine scenario tests.

use evoflow_core::capability::{
    AiRequest, AiResponse, EvaluatedFitness, FitnessEvaluator, FormalizeOptions, Gateway,
    ModelCatalog, ToolAction, Verdict, WorkflowVerifier,
};
use evoflow_core::domain::cancel::CancelToken;
use evoflow_core::genome::{EvolutionContext, Fitness, Genome};
use evoflow_core::workflow::{WorkflowConfig, WorkflowNode};
use evoflow_error::EvoflowResult;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn node(id: &str, hand_offs: &[&str]) -> WorkflowNode {
    WorkflowNode {
        node_id: id.to_string(),
        description: format!("{} step", id),
        system_prompt: format!("You are the {} agent.", id),
        model_name: "gpt-4o-mini".to_string(),
        mcp_tools: vec![],
        code_tools: vec![],
        hand_offs: hand_offs.iter().map(|s| s.to_string()).collect(),
        memory: None,
    }
}

pub fn two_node_config() -> WorkflowConfig {
    WorkflowConfig {
        entry_node_id: "entry".to_string(),
        nodes: vec![node("entry", &["leaf"]), node("leaf", &[])],
        memory: None,
    }
}

/// An evaluator that cycles through a fixed score sequence, charging a
/// fixed cost per call. Optionally fails the first `failures` calls.
pub struct ScriptedEvaluator {
    scores: Vec<f64>,
    usd_cost: f64,
    calls: AtomicUsize,
    initial_failures: usize,
}

impl ScriptedEvaluator {
    pub fn cycling(scores: &[f64], usd_cost: f64) -> Self {
        Self {
            scores: scores.to_vec(),
            usd_cost,
            calls: AtomicUsize::new(0),
            initial_failures: 0,
        }
    }

    pub fn constant(score: f64, usd_cost: f64) -> Self {
        Self::cycling(&[score], usd_cost)
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.initial_failures = failures;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FitnessEvaluator for ScriptedEvaluator {
    fn evaluate(
        &self,
        _genome: &Genome,
        _context: &EvolutionContext,
        _cancel: &CancelToken,
    ) -> AiResponse<EvaluatedFitness> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if call < self.initial_failures {
            return AiResponse::failure("evaluator unavailable", self.usd_cost);
        }

        let score = self.scores[call % self.scores.len()];
        AiResponse::success(
            EvaluatedFitness {
                fitness: Fitness {
                    score,
                    total_cost_usd: self.usd_cost,
                    total_time_seconds: 1.0,
                    accuracy: score.clamp(0.0, 1.0),
                },
                feedback: Some(format!("scored {:.2}", score)),
            },
            self.usd_cost,
        )
    }
}

/// A gateway that answers every text request with a fixed rewrite.
pub struct StubGateway;

impl Gateway for StubGateway {
    fn send_text(&self, _request: AiRequest) -> AiResponse<String> {
        AiResponse::success("You are a rewritten agent.".to_string(), 0.001)
    }

    fn send_workflow(&self, _request: AiRequest) -> AiResponse<WorkflowConfig> {
        AiResponse::success(two_node_config(), 0.001)
    }

    fn send_tool_action(&self, _request: AiRequest) -> AiResponse<ToolAction> {
        AiResponse::failure("tool actions are not scripted", 0.0)
    }
}

/// A verifier that synthesizes the canned two-node workflow and accepts
/// every candidate.
pub struct AcceptingVerifier;

impl WorkflowVerifier for AcceptingVerifier {
    fn formalize(
        &self,
        _instruction: &str,
        options: FormalizeOptions,
    ) -> AiResponse<WorkflowConfig> {
        match options.workflow_config {
            Some(config) => AiResponse::success(config, 0.002),
            None => AiResponse::success(two_node_config(), 0.002),
        }
    }

    fn verify(&self, _config: &WorkflowConfig) -> Verdict {
        Verdict::valid()
    }

    fn validate_and_repair(
        &self,
        config: WorkflowConfig,
        _max_retries: usize,
    ) -> EvoflowResult<WorkflowConfig> {
        Ok(config)
    }
}

pub struct StaticCatalog;

impl ModelCatalog for StaticCatalog {
    fn active_model_names(&self) -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "claude-sonnet".to_string(),
        ]
    }

    fn is_tool_known(&self, name: &str) -> bool {
        matches!(name, "search" | "browser" | "python")
    }
}
