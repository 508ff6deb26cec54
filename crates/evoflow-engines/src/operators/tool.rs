use super::{MutationOperator, OperatorContext, OperatorOutcome};
use evoflow_core::capability::{AiMessage, AiRequest, ToolAction, ToolActionKind, ToolKind};
use evoflow_core::workflow::{WorkflowConfig, WorkflowNode};
use evoflow_error::{EvoflowResult, evoflow_bail};

/// Asks the gateway for a structured tool action (add, remove, or move) and
/// applies it. Tools unknown to the catalog are rejected before any node is
/// touched.
#[derive(Debug, Default, Clone)]
pub struct ToolMutation;

/// The sentinel target meaning "every node".
const ALL_NODES: &str = "all";

fn tool_set<'a>(node: &'a mut WorkflowNode, kind: ToolKind) -> &'a mut Vec<String> {
    match kind {
        ToolKind::Mcp => &mut node.mcp_tools,
        ToolKind::Code => &mut node.code_tools,
    }
}

fn add_tool(node: &mut WorkflowNode, kind: ToolKind, tool: &str) {
    let set = tool_set(node, kind);
    if !set.iter().any(|t| t == tool) {
        set.push(tool.to_string());
    }
}

fn remove_tool(node: &mut WorkflowNode, kind: ToolKind, tool: &str) -> bool {
    let set = tool_set(node, kind);
    let before = set.len();
    set.retain(|t| t != tool);
    set.len() != before
}

fn action_prompt(config: &WorkflowConfig) -> String {
    let mut text = String::from(
        "Choose one tool action (add, remove, or move) that would improve \
         this workflow. Nodes and their tools:\n",
    );
    for node in &config.nodes {
        text.push_str(&format!(
            "- {}: mcp={:?} code={:?}\n",
            node.node_id, node.mcp_tools, node.code_tools
        ));
    }
    text
}

fn targets(config: &WorkflowConfig, action: &ToolAction) -> EvoflowResult<Vec<String>> {
    if action.target_node_ids.len() == 1 && action.target_node_ids[0] == ALL_NODES {
        return Ok(config.nodes.iter().map(|n| n.node_id.clone()).collect());
    }

    for id in &action.target_node_ids {
        if !config.contains_node(id) {
            evoflow_bail!(Operator: "tool action targets unknown node '{}'", id);
        }
    }

    Ok(action.target_node_ids.clone())
}

fn apply_action(config: &mut WorkflowConfig, action: &ToolAction) -> EvoflowResult<()> {
    match action.action {
        ToolActionKind::Add => {
            let targets = targets(config, action)?;
            if targets.is_empty() {
                evoflow_bail!(Operator: "tool add action has no target nodes");
            }
            for id in targets {
                if let Some(node) = config.node_mut(&id) {
                    add_tool(node, action.tool_kind, &action.tool);
                }
            }
        }
        ToolActionKind::Remove => {
            let targets = targets(config, action)?;
            if targets.is_empty() {
                evoflow_bail!(Operator: "tool remove action has no target nodes");
            }
            let mut removed = false;
            for id in targets {
                if let Some(node) = config.node_mut(&id) {
                    removed |= remove_tool(node, action.tool_kind, &action.tool);
                }
            }
            if !removed {
                evoflow_bail!(Operator: "tool '{}' was not present on any target", action.tool);
            }
        }
        ToolActionKind::Move => {
            let (Some(from), Some(to)) = (&action.from_node_id, &action.to_node_id) else {
                evoflow_bail!(Operator: "tool move action is missing source or destination");
            };
            if !config.contains_node(from) || !config.contains_node(to) {
                evoflow_bail!(Operator: "tool move references unknown node");
            }

            let taken = config
                .node_mut(from)
                .map(|node| remove_tool(node, action.tool_kind, &action.tool))
                .unwrap_or(false);
            if !taken {
                evoflow_bail!(
                    Operator: "tool '{}' is not present on source node '{}'", action.tool, from
                );
            }

            if let Some(node) = config.node_mut(to) {
                add_tool(node, action.tool_kind, &action.tool);
            }
        }
    }

    Ok(())
}

impl MutationOperator for ToolMutation {
    fn name(&self) -> &'static str {
        "tool"
    }

    fn apply(
        &self,
        ctx: &OperatorContext<'_>,
        config: &WorkflowConfig,
    ) -> EvoflowResult<OperatorOutcome> {
        ctx.cancel.ensure_active()?;

        let Some(entry) = config.entry_node() else {
            evoflow_bail!(Operator: "workflow has no entry node");
        };

        let request = AiRequest {
            model: entry.model_name.clone(),
            messages: vec![
                AiMessage::system(
                    "You adjust tool assignments on an agent workflow. \
                     Respond with a structured tool action.",
                ),
                AiMessage::user(action_prompt(config)),
            ],
        };

        let response = ctx.gateway.send_tool_action(request);
        ctx.cancel.ensure_active()?;

        let Some(action) = response.data else {
            evoflow_bail!(Operator: "tool action request failed: {}", response.error_message());
        };

        if !ctx.catalog.is_tool_known(&action.tool) {
            evoflow_bail!(Operator: "tool '{}' is not in the catalog", action.tool);
        }

        let mut child = config.clone();
        apply_action(&mut child, &action)?;

        Ok(OperatorOutcome::priced(child, response.usd_cost))
    }
}
