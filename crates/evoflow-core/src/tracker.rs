use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// The operator families whose attempts and failures are tracked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Mutation,
    Crossover,
    Immigration,
    Evaluation,
}

#[derive(Default)]
struct Counter {
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl Counter {
    fn snapshot(&self) -> (u64, u64) {
        (
            self.attempts.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}

/// Process-scoped attempt/failure counters. Increments are monotonic and
/// relaxed, which makes the tracker safe to touch from evaluation workers
/// while the orchestration task reads rates.
pub struct FailureTracker {
    session_id: String,
    mutation: Counter,
    crossover: Counter,
    immigration: Counter,
    evaluation: Counter,
}

/// A point-in-time view of every counter, for logging and run summaries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FailureSnapshot {
    pub mutation_attempts: u64,
    pub mutation_failures: u64,
    pub crossover_attempts: u64,
    pub crossover_failures: u64,
    pub immigration_attempts: u64,
    pub immigration_failures: u64,
    pub evaluation_attempts: u64,
    pub evaluation_failures: u64,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            mutation: Counter::default(),
            crossover: Counter::default(),
            immigration: Counter::default(),
            evaluation: Counter::default(),
        }
    }

    /// Identifier for correlating engine logs with external systems.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn counter(&self, kind: FailureKind) -> &Counter {
        match kind {
            FailureKind::Mutation => &self.mutation,
            FailureKind::Crossover => &self.crossover,
            FailureKind::Immigration => &self.immigration,
            FailureKind::Evaluation => &self.evaluation,
        }
    }

    pub fn record_attempt(&self, kind: FailureKind) {
        self.counter(kind).attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: FailureKind) {
        self.counter(kind).failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempts(&self, kind: FailureKind) -> u64 {
        self.counter(kind).attempts.load(Ordering::Relaxed)
    }

    pub fn failures(&self, kind: FailureKind) -> u64 {
        self.counter(kind).failures.load(Ordering::Relaxed)
    }

    /// Failure rate in [0, 1]; zero attempts reads as a zero rate.
    pub fn rate(&self, kind: FailureKind) -> f64 {
        let (attempts, failures) = self.counter(kind).snapshot();
        if attempts == 0 {
            0.0
        } else {
            failures as f64 / attempts as f64
        }
    }

    pub fn snapshot(&self) -> FailureSnapshot {
        let (mutation_attempts, mutation_failures) = self.mutation.snapshot();
        let (crossover_attempts, crossover_failures) = self.crossover.snapshot();
        let (immigration_attempts, immigration_failures) = self.immigration.snapshot();
        let (evaluation_attempts, evaluation_failures) = self.evaluation.snapshot();

        FailureSnapshot {
            mutation_attempts,
            mutation_failures,
            crossover_attempts,
            crossover_failures,
            immigration_attempts,
            immigration_failures,
            evaluation_attempts,
            evaluation_failures,
        }
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new()
    }
}
