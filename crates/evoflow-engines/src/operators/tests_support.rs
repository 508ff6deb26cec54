//! Shared mock collaborators for operator tests.

use super::OperatorContext;
use evoflow_core::capability::{
    AiRequest, AiResponse, FormalizeOptions, Gateway, ModelCatalog, ToolAction, Verdict,
    WorkflowVerifier,
};
use evoflow_core::domain::cancel::CancelToken;
use evoflow_core::workflow::{WorkflowConfig, WorkflowNode};
use evoflow_error::{EvoflowResult, evoflow_err};
use std::sync::Mutex;

pub(crate) fn node(id: &str, hand_offs: &[&str]) -> WorkflowNode {
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

pub(crate) fn two_node_config() -> WorkflowConfig {
    WorkflowConfig {
        entry_node_id: "entry".to_string(),
        nodes: vec![node("entry", &["leaf"]), node("leaf", &[])],
        memory: None,
    }
}

/// A gateway returning canned responses.
#[derive(Default)]
pub(crate) struct TestGateway {
    pub text: Mutex<Option<AiResponse<String>>>,
    pub workflow: Mutex<Option<AiResponse<WorkflowConfig>>>,
    pub tool_action: Mutex<Option<AiResponse<ToolAction>>>,
}

impl TestGateway {
    pub fn with_text(response: AiResponse<String>) -> Self {
        Self {
            text: Mutex::new(Some(response)),
            ..Default::default()
        }
    }

    pub fn with_tool_action(response: AiResponse<ToolAction>) -> Self {
        Self {
            tool_action: Mutex::new(Some(response)),
            ..Default::default()
        }
    }
}

impl Gateway for TestGateway {
    fn send_text(&self, _request: AiRequest) -> AiResponse<String> {
        self.text
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| AiResponse::failure("no canned text", 0.0))
    }

    fn send_workflow(&self, _request: AiRequest) -> AiResponse<WorkflowConfig> {
        self.workflow
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| AiResponse::failure("no canned workflow", 0.0))
    }

    fn send_tool_action(&self, _request: AiRequest) -> AiResponse<ToolAction> {
        self.tool_action
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| AiResponse::failure("no canned tool action", 0.0))
    }
}

pub(crate) struct TestCatalog {
    models: Vec<String>,
    tools: Vec<String>,
}

impl TestCatalog {
    pub fn with_models(models: &[&str]) -> Self {
        Self {
            models: models.iter().map(|s| s.to_string()).collect(),
            tools: vec!["search".to_string(), "browser".to_string()],
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl ModelCatalog for TestCatalog {
    fn active_model_names(&self) -> Vec<String> {
        self.models.clone()
    }

    fn is_tool_known(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t == name)
    }
}

/// A verifier that formalizes to a canned config and accepts everything.
#[derive(Default)]
pub(crate) struct TestVerifier {
    pub formalized: Mutex<Option<AiResponse<WorkflowConfig>>>,
    pub reject_all: bool,
}

impl TestVerifier {
    pub fn formalizing(response: AiResponse<WorkflowConfig>) -> Self {
        Self {
            formalized: Mutex::new(Some(response)),
            reject_all: false,
        }
    }
}

impl WorkflowVerifier for TestVerifier {
    fn formalize(
        &self,
        _instruction: &str,
        options: FormalizeOptions,
    ) -> AiResponse<WorkflowConfig> {
        if let Some(canned) = self.formalized.lock().unwrap().clone() {
            return canned;
        }

        match options.workflow_config {
            Some(config) => AiResponse::success(config, 0.0),
            None => AiResponse::failure("nothing to formalize", 0.0),
        }
    }

    fn verify(&self, _config: &WorkflowConfig) -> Verdict {
        if self.reject_all {
            Verdict::invalid(vec!["rejected".to_string()])
        } else {
            Verdict::valid()
        }
    }

    fn validate_and_repair(
        &self,
        config: WorkflowConfig,
        _max_retries: usize,
    ) -> EvoflowResult<WorkflowConfig> {
        if self.reject_all {
            return Err(evoflow_err!(Verification: "rejected"));
        }
        Ok(config)
    }
}

pub(crate) fn ctx<'a>(
    gateway: &'a TestGateway,
    catalog: &'a TestCatalog,
    verifier: &'a TestVerifier,
    cancel: &'a CancelToken,
) -> OperatorContext<'a> {
    OperatorContext {
        gateway,
        catalog,
        verifier,
        cancel,
        intensity: 0.5,
        mutation_instructions: "",
    }
}
