use evoflow_error::{EvoflowResult, ensure, evoflow_bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;

/// Per-node memory. A `BTreeMap` keeps key order deterministic, which the
/// canonical-JSON genome hash depends on. Values are opaque strings.
pub type MemoryMap = BTreeMap<String, String>;

/// One LLM agent in the workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub node_id: String,
    pub description: String,
    pub system_prompt: String,
    pub model_name: String,
    #[serde(default)]
    pub mcp_tools: Vec<String>,
    #[serde(default)]
    pub code_tools: Vec<String>,
    /// Successor node ids this agent may hand control to.
    #[serde(default)]
    pub hand_offs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryMap>,
}

impl WorkflowNode {
    pub fn is_leaf(&self) -> bool {
        self.hand_offs.is_empty()
    }

    pub fn memory_mut(&mut self) -> &mut MemoryMap {
        self.memory.get_or_insert_with(MemoryMap::new)
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.mcp_tools.iter().any(|t| t == tool) || self.code_tools.iter().any(|t| t == tool)
    }
}

/// A directed workflow graph of LLM agents. The config is the unit the
/// genetic operators act on; the engine treats its contents as data and
/// relies on the external verifier for semantic validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    pub entry_node_id: String,
    pub nodes: Vec<WorkflowNode>,
    /// Workflow-level fallback memory. Memory of deleted nodes lands here
    /// under `deleted_<node_id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryMap>,
}

impl WorkflowConfig {
    pub fn node(&self, node_id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.iter_mut().find(|n| n.node_id == node_id)
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.node(node_id).is_some()
    }

    pub fn entry_node(&self) -> Option<&WorkflowNode> {
        self.node(&self.entry_node_id)
    }

    /// Nodes with no outgoing hand-offs, excluding the entry node.
    pub fn leaf_nodes(&self) -> Vec<&WorkflowNode> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf() && n.node_id != self.entry_node_id)
            .collect()
    }

    /// Nodes eligible for model mutation: everything but the entry node,
    /// unless the workflow has only one node.
    pub fn mutable_nodes(&self) -> Vec<&WorkflowNode> {
        if self.nodes.len() == 1 {
            return self.nodes.iter().collect();
        }

        self.nodes
            .iter()
            .filter(|n| n.node_id != self.entry_node_id)
            .collect()
    }

    pub fn memory_mut(&mut self) -> &mut MemoryMap {
        self.memory.get_or_insert_with(MemoryMap::new)
    }

    pub fn workflow_memory_value(&self, key: &str) -> Option<&String> {
        self.memory.as_ref().and_then(|m| m.get(key))
    }

    /// Structural invariants: unique node ids, resolvable hand-offs, and an
    /// entry node that exists. Semantic validity stays with the external
    /// verifier.
    pub fn validate_structure(&self) -> EvoflowResult<()> {
        ensure!(!self.nodes.is_empty(), Verification: "workflow has no nodes");
        ensure!(
            self.contains_node(&self.entry_node_id),
            Verification: "entry node '{}' does not exist", self.entry_node_id
        );

        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.node_id.as_str()) {
                evoflow_bail!(Verification: "duplicate node id '{}'", node.node_id);
            }
        }

        for node in &self.nodes {
            for target in &node.hand_offs {
                if !seen.contains(target.as_str()) {
                    evoflow_bail!(
                        Verification: "hand-off '{}' from node '{}' does not resolve",
                        target,
                        node.node_id
                    );
                }
            }
        }

        Ok(())
    }

    /// Deterministic JSON rendering. Struct fields serialize in declaration
    /// order and memory maps are sorted, so equal configs always produce
    /// byte-equal output.
    pub fn canonical_json(&self) -> EvoflowResult<String> {
        serde_json::to_string(self)
            .map_err(|e| evoflow_error::evoflow_err!(Engine: "serializing workflow: {}", e))
    }
}
