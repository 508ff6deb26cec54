use crate::genome::Genome;
use crate::math;
use crate::workflow::WorkflowConfig;
use evoflow_error::{EvoflowResult, evoflow_err};

pub const FINGERPRINT_LEN: usize = 9;

/// A structural summary of a workflow, used to measure how similar two
/// candidates are without invoking any model. The normalization constants
/// are fixed contracts; changing them silently changes what "similar" means
/// across persisted runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralFingerprint(Vec<f32>);

impl StructuralFingerprint {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[f32]> for StructuralFingerprint {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

/// Builds the 9-feature fingerprint from aggregated node statistics.
pub fn structural_fingerprint(config: &WorkflowConfig) -> StructuralFingerprint {
    let mut description_len = 0usize;
    let mut description_words = 0usize;
    let mut description_sentences = 0usize;
    let mut prompt_len = 0usize;
    let mut prompt_words = 0usize;
    let mut mcp_tools = 0usize;
    let mut code_tools = 0usize;
    let mut hand_offs = 0usize;

    for node in &config.nodes {
        description_len += node.description.len();
        description_words += word_count(&node.description);
        description_sentences += sentence_count(&node.description);
        prompt_len += node.system_prompt.len();
        prompt_words += word_count(&node.system_prompt);
        mcp_tools += node.mcp_tools.len();
        code_tools += node.code_tools.len();
        hand_offs += node.hand_offs.len();
    }

    StructuralFingerprint(vec![
        config.nodes.len() as f32 / 10.0,
        description_len as f32 / 1000.0,
        description_words as f32 / 100.0,
        description_sentences as f32 / 10.0,
        prompt_len as f32 / 1000.0,
        prompt_words as f32 / 100.0,
        mcp_tools as f32 / 10.0,
        code_tools as f32 / 10.0,
        hand_offs as f32 / 5.0,
    ])
}

/// Euclidean distance between two fingerprints. Fails with `ShapeMismatch`
/// when the vectors disagree in length.
pub fn fingerprint_distance(
    one: &StructuralFingerprint,
    two: &StructuralFingerprint,
) -> EvoflowResult<f32> {
    if one.len() != two.len() {
        return Err(evoflow_err!(ShapeMismatch: one.len(), two.len()));
    }

    Ok(math::euclidean(one.as_ref(), two.as_ref()))
}

/// Genomes whose fingerprint sits within `threshold` of the target,
/// excluding the target itself (by workflow-version id).
pub fn find_similar<'a>(
    population: &'a [Genome],
    target: &Genome,
    threshold: f32,
) -> Vec<&'a Genome> {
    let target_print = structural_fingerprint(target.config());

    population
        .iter()
        .filter(|candidate| {
            candidate.workflow_version_id() != target.workflow_version_id()
        })
        .filter(|candidate| {
            let print = structural_fingerprint(candidate.config());
            match fingerprint_distance(&print, &target_print) {
                Ok(distance) => distance <= threshold,
                Err(_) => false,
            }
        })
        .collect()
}
