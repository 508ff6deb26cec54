//! Node-memory preservation across genetic operations.
//!
//! The hard contract of the engine: no parent node's memory key may be
//! silently lost by mutation or crossover. Operators route memory into the
//! surviving node of the same id, or into the workflow-level memory under
//! `deleted_<node_id>` when the node itself was removed.

use crate::workflow::{MemoryMap, WorkflowConfig, WorkflowNode};
use evoflow_error::{EvoflowError, EvoflowResult, evoflow_err};

/// The workflow-memory key that carries a removed node's memory snapshot.
pub fn deleted_memory_key(node_id: &str) -> String {
    format!("deleted_{}", node_id)
}

fn merge_into(child: &mut WorkflowNode, parent_memory: &MemoryMap) {
    let memory = child.memory_mut();
    for (key, value) in parent_memory {
        // The child's value wins on key conflict.
        memory.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Copies every parent node's memory into the child node of the same id.
/// Existing child values win on conflict.
pub fn preserve_mutation_memory(parent: &WorkflowConfig, child: &mut WorkflowConfig) {
    for parent_node in &parent.nodes {
        let Some(memory) = parent_node.memory.as_ref().filter(|m| !m.is_empty()) else {
            continue;
        };

        if let Some(child_node) = child.node_mut(&parent_node.node_id) {
            merge_into(child_node, memory);
        }
    }
}

/// Crossover variant of [preserve_mutation_memory]: both parents contribute,
/// with the first parent resolved before the second.
pub fn preserve_crossover_memory(
    parent_one: &WorkflowConfig,
    parent_two: &WorkflowConfig,
    child: &mut WorkflowConfig,
) {
    preserve_mutation_memory(parent_one, child);
    preserve_mutation_memory(parent_two, child);
}

fn key_in_any_node(child: &WorkflowConfig, key: &str) -> bool {
    child
        .nodes
        .iter()
        .any(|n| n.memory.as_ref().is_some_and(|m| m.contains_key(key)))
}

/// Verifies that every memory key of every parent node is reachable in the
/// child: in the child node of the same id, or (when the node was removed)
/// relocated into a surviving node or snapshotted under the workflow memory
/// entry `deleted_<node_id>`. Violations fail with `MemoryLost` naming the
/// key and its origin node.
pub fn enforce_memory_preservation(
    parents: &[&WorkflowConfig],
    child: &WorkflowConfig,
) -> EvoflowResult<()> {
    for parent in parents {
        for parent_node in &parent.nodes {
            let Some(memory) = parent_node.memory.as_ref().filter(|m| !m.is_empty()) else {
                continue;
            };

            let snapshot_key = deleted_memory_key(&parent_node.node_id);
            match child.node(&parent_node.node_id) {
                Some(child_node) => {
                    let child_memory = child_node.memory.as_ref();
                    for key in memory.keys() {
                        let present = child_memory.is_some_and(|m| m.contains_key(key));
                        let snapshotted = child.workflow_memory_value(&snapshot_key).is_some();
                        if !present && !snapshotted {
                            return Err(EvoflowError::memory_lost(
                                key.clone(),
                                parent_node.node_id.clone(),
                            ));
                        }
                    }
                }
                None => {
                    let snapshotted = child.workflow_memory_value(&snapshot_key).is_some();
                    for key in memory.keys() {
                        if !snapshotted && !key_in_any_node(child, key) {
                            return Err(EvoflowError::memory_lost(
                                key.clone(),
                                parent_node.node_id.clone(),
                            ));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Relocates a removed node's memory: into the first remaining node by
/// insertion order, or into the workflow memory as a JSON snapshot under
/// `deleted_<node_id>` when no node remains.
pub fn relocate_deleted_memory(
    config: &mut WorkflowConfig,
    removed: &WorkflowNode,
) -> EvoflowResult<()> {
    let Some(memory) = removed.memory.as_ref().filter(|m| !m.is_empty()) else {
        return Ok(());
    };

    if let Some(target) = config.nodes.first_mut() {
        merge_into(target, memory);
        return Ok(());
    }

    let snapshot = serde_json::to_string(memory)
        .map_err(|e| evoflow_err!(Engine: "serializing memory snapshot: {}", e))?;
    config
        .memory_mut()
        .insert(deleted_memory_key(&removed.node_id), snapshot);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoflow_error::ErrorCode;

    fn node_with_memory(id: &str, entries: &[(&str, &str)]) -> WorkflowNode {
        let mut node = WorkflowNode {
            node_id: id.to_string(),
            description: String::new(),
            system_prompt: String::new(),
            model_name: "gpt-4o-mini".to_string(),
            mcp_tools: vec![],
            code_tools: vec![],
            hand_offs: vec![],
            memory: None,
        };
        if !entries.is_empty() {
            let memory = node.memory_mut();
            for (k, v) in entries {
                memory.insert(k.to_string(), v.to_string());
            }
        }
        node
    }

    fn config_of(nodes: Vec<WorkflowNode>) -> WorkflowConfig {
        WorkflowConfig {
            entry_node_id: nodes
                .first()
                .map(|n| n.node_id.clone())
                .unwrap_or_default(),
            nodes,
            memory: None,
        }
    }

    #[test]
    fn mutation_merge_keeps_parent_keys() {
        let parent = config_of(vec![node_with_memory("a", &[("seen", "10")])]);
        let mut child = config_of(vec![node_with_memory("a", &[])]);

        preserve_mutation_memory(&parent, &mut child);

        assert_eq!(
            child.node("a").unwrap().memory.as_ref().unwrap().get("seen"),
            Some(&"10".to_string())
        );
    }

    #[test]
    fn child_values_win_on_conflict() {
        let parent = config_of(vec![node_with_memory("a", &[("seen", "old")])]);
        let mut child = config_of(vec![node_with_memory("a", &[("seen", "new")])]);

        preserve_mutation_memory(&parent, &mut child);

        assert_eq!(
            child.node("a").unwrap().memory.as_ref().unwrap().get("seen"),
            Some(&"new".to_string())
        );
    }

    #[test]
    fn crossover_resolves_first_parent_before_second() {
        let parent_one = config_of(vec![node_with_memory("a", &[("shared", "one")])]);
        let parent_two = config_of(vec![node_with_memory("a", &[("shared", "two")])]);
        let mut child = config_of(vec![node_with_memory("a", &[])]);

        preserve_crossover_memory(&parent_one, &parent_two, &mut child);

        assert_eq!(
            child.node("a").unwrap().memory.as_ref().unwrap().get("shared"),
            Some(&"one".to_string())
        );
    }

    #[test]
    fn enforcement_flags_dropped_keys() {
        let parent = config_of(vec![node_with_memory("a", &[("token", "abc")])]);
        let child = config_of(vec![node_with_memory("a", &[])]);

        let err = enforce_memory_preservation(&[&parent], &child).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MemoryLost);
        assert!(err.to_string().contains("token"));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn enforcement_accepts_deleted_snapshot() {
        let parent = config_of(vec![
            node_with_memory("a", &[]),
            node_with_memory("b", &[("token", "abc")]),
        ]);
        let mut child = config_of(vec![node_with_memory("a", &[])]);
        child
            .memory_mut()
            .insert(deleted_memory_key("b"), "{\"token\":\"abc\"}".to_string());

        assert!(enforce_memory_preservation(&[&parent], &child).is_ok());
    }

    #[test]
    fn enforcement_accepts_memory_relocated_into_survivor() {
        let parent = config_of(vec![
            node_with_memory("a", &[]),
            node_with_memory("b", &[("token", "abc")]),
        ]);
        let child = config_of(vec![node_with_memory("a", &[("token", "abc")])]);

        assert!(enforce_memory_preservation(&[&parent], &child).is_ok());
    }

    #[test]
    fn enforcement_flags_removed_node_without_snapshot() {
        let parent = config_of(vec![
            node_with_memory("a", &[]),
            node_with_memory("b", &[("token", "abc")]),
        ]);
        let child = config_of(vec![node_with_memory("a", &[])]);

        let err = enforce_memory_preservation(&[&parent], &child).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MemoryLost);
    }

    #[test]
    fn relocation_prefers_first_remaining_node() {
        let removed = node_with_memory("leaf", &[("k", "v")]);
        let mut config = config_of(vec![node_with_memory("entry", &[])]);

        relocate_deleted_memory(&mut config, &removed).unwrap();

        assert_eq!(
            config.node("entry").unwrap().memory.as_ref().unwrap().get("k"),
            Some(&"v".to_string())
        );
    }

    #[test]
    fn relocation_snapshots_when_no_nodes_remain() {
        let removed = node_with_memory("leaf", &[("k", "v")]);
        let mut config = config_of(vec![]);

        relocate_deleted_memory(&mut config, &removed).unwrap();

        let snapshot = config.workflow_memory_value(&deleted_memory_key("leaf")).unwrap();
        assert_eq!(snapshot, "{\"k\":\"v\"}");
    }
}
