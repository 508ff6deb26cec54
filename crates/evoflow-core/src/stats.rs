use crate::genome::Genome;
use crate::math::round2;
use serde::{Deserialize, Serialize};

/// Running statistics over the evaluated fitness of a population, each
/// rounded to two decimals. An empty population yields all zeros.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessStats {
    pub best_fitness: f64,
    pub worst_fitness: f64,
    pub avg_fitness: f64,
    pub std_dev: f64,
}

/// Computes [FitnessStats] over the evaluated genomes' scores.
pub fn calculate_stats(genomes: &[Genome]) -> FitnessStats {
    let scores = genomes
        .iter()
        .filter(|g| g.is_evaluated())
        .map(|g| g.score())
        .collect::<Vec<f64>>();

    if scores.is_empty() {
        return FitnessStats::default();
    }

    let best = scores.iter().cloned().fold(f64::MIN, f64::max);
    let worst = scores.iter().cloned().fold(f64::MAX, f64::min);
    let avg = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance = scores
        .iter()
        .map(|s| {
            let diff = s - avg;
            diff * diff
        })
        .sum::<f64>()
        / scores.len() as f64;

    FitnessStats {
        best_fitness: round2(best),
        worst_fitness: round2(worst),
        avg_fitness: round2(avg),
        std_dev: round2(variance.sqrt()),
    }
}

/// One generation's summary row, recorded by the stats tracker and written
/// to persistence when a generation completes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub worst_fitness: f64,
    pub avg_fitness: f64,
    pub fitness_std_dev: f64,
    pub evaluation_cost: f64,
    pub evaluations_per_hour: f64,
    pub improvement_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::{EvaluationInputs, EvolutionContext, Fitness, OperationTag};
    use crate::workflow::{WorkflowConfig, WorkflowNode};

    fn scored_genome(score: f64) -> Genome {
        let config = WorkflowConfig {
            entry_node_id: "a".to_string(),
            nodes: vec![WorkflowNode {
                node_id: "a".to_string(),
                description: String::new(),
                system_prompt: String::new(),
                model_name: "gpt-4o-mini".to_string(),
                mcp_tools: vec![],
                code_tools: vec![],
                hand_offs: vec![],
                memory: None,
            }],
            memory: None,
        };

        let mut genome = Genome::from_config(
            config,
            vec![],
            OperationTag::Init,
            EvaluationInputs::default(),
            EvolutionContext::default(),
        );
        genome.set_fitness_and_feedback(
            Fitness {
                score,
                ..Fitness::zero()
            },
            None,
            0.0,
        );
        genome
    }

    #[test]
    fn empty_population_yields_zeros() {
        assert_eq!(calculate_stats(&[]), FitnessStats::default());
    }

    #[test]
    fn stats_are_rounded_to_two_decimals() {
        let genomes = vec![scored_genome(0.111), scored_genome(0.333)];
        let stats = calculate_stats(&genomes);

        assert_eq!(stats.best_fitness, 0.33);
        assert_eq!(stats.worst_fitness, 0.11);
        assert_eq!(stats.avg_fitness, 0.22);
    }

    #[test]
    fn unevaluated_genomes_are_excluded() {
        let mut unevaluated = scored_genome(9.0);
        unevaluated.clear_evaluation_state();

        let genomes = vec![scored_genome(0.5), unevaluated];
        let stats = calculate_stats(&genomes);

        assert_eq!(stats.best_fitness, 0.5);
        assert_eq!(stats.worst_fitness, 0.5);
    }

    #[test]
    fn std_dev_of_uniform_scores_is_zero() {
        let genomes = vec![scored_genome(0.4), scored_genome(0.4)];
        assert_eq!(calculate_stats(&genomes).std_dev, 0.0);
    }
}
