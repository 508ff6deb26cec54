use evoflow_core::capability::RunStatus;
use evoflow_core::stats::{FitnessStats, PopulationStats};
use std::fmt::{self, Display, Formatter};
use std::time::Instant;

/// Why the evolution loop decided to halt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    CostBudget,
    TimeBudget,
    EvaluationCeiling,
    Converged,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::CostBudget => write!(f, "cost budget reached"),
            StopReason::TimeBudget => write!(f, "time budget exceeded"),
            StopReason::EvaluationCeiling => write!(f, "evaluation ceiling reached"),
            StopReason::Converged => write!(f, "fitness converged"),
        }
    }
}

/// Convergence window: this many trailing generations must each improve by
/// less than [CONVERGENCE_EPSILON] for the run to count as converged.
const CONVERGENCE_WINDOW: usize = 5;
const CONVERGENCE_EPSILON: f64 = 0.001;

/// Tracks cost, throughput, and per-generation statistics for one run, and
/// answers the stop predicates.
pub struct StatsTracker {
    started_at: Instant,
    total_cost_usd: f64,
    evaluation_count: usize,
    history: Vec<PopulationStats>,
    max_cost_usd: f64,
    maximum_time_minutes: f64,
    /// Named "per hour" for compatibility with the original configuration
    /// surface, but enforced as an absolute per-run ceiling.
    max_evaluations: usize,
}

impl StatsTracker {
    pub fn new(max_cost_usd: f64, maximum_time_minutes: f64, max_evaluations: usize) -> Self {
        Self {
            started_at: Instant::now(),
            total_cost_usd: 0.0,
            evaluation_count: 0,
            history: Vec::new(),
            max_cost_usd,
            maximum_time_minutes,
            max_evaluations,
        }
    }

    pub fn add_cost(&mut self, usd: f64) {
        self.total_cost_usd += usd;
    }

    pub fn add_evaluations(&mut self, count: usize) {
        self.evaluation_count += count;
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost_usd
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluation_count
    }

    pub fn history(&self) -> &[PopulationStats] {
        &self.history
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() / 60.0
    }

    /// Records one generation's summary row and returns it.
    pub fn record_generation(
        &mut self,
        generation: usize,
        fitness: &FitnessStats,
        evaluation_cost: f64,
    ) -> PopulationStats {
        let elapsed_hours = self.started_at.elapsed().as_secs_f64() / 3600.0;
        let evaluations_per_hour = if elapsed_hours > 0.0 {
            self.evaluation_count as f64 / elapsed_hours
        } else {
            0.0
        };

        let improvement_rate = self
            .history
            .last()
            .map(|previous| fitness.best_fitness - previous.best_fitness)
            .unwrap_or(fitness.best_fitness);

        let stats = PopulationStats {
            generation,
            best_fitness: fitness.best_fitness,
            worst_fitness: fitness.worst_fitness,
            avg_fitness: fitness.avg_fitness,
            fitness_std_dev: fitness.std_dev,
            evaluation_cost,
            evaluations_per_hour,
            improvement_rate,
        };

        self.history.push(stats.clone());
        stats
    }

    fn converged(&self) -> bool {
        if self.history.len() < CONVERGENCE_WINDOW {
            return false;
        }

        self.history
            .iter()
            .rev()
            .take(CONVERGENCE_WINDOW)
            .all(|stats| stats.improvement_rate.abs() < CONVERGENCE_EPSILON)
    }

    /// The first stop predicate that fires, if any.
    pub fn should_stop(&self) -> Option<StopReason> {
        if self.total_cost_usd >= self.max_cost_usd {
            return Some(StopReason::CostBudget);
        }
        if self.elapsed_minutes() > self.maximum_time_minutes {
            return Some(StopReason::TimeBudget);
        }
        if self.evaluation_count >= self.max_evaluations {
            return Some(StopReason::EvaluationCeiling);
        }
        if self.converged() {
            return Some(StopReason::Converged);
        }

        None
    }

    /// `Interrupted` when fewer generations than requested were recorded,
    /// `Completed` otherwise.
    pub fn final_status(&self, requested_generations: usize) -> RunStatus {
        if self.history.len() < requested_generations {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        }
    }
}
