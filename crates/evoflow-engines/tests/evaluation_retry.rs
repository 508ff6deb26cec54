mod common;

use common::{AcceptingVerifier, ScriptedEvaluator, StaticCatalog, StubGateway};
use evoflow_engines::engine::{EvolutionEngine, EvolutionObjective};
use evoflow_engines::settings::EvolutionSettings;
use evoflow_error::ErrorCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn objective() -> EvolutionObjective {
    EvolutionObjective {
        goal: "triage incoming bug reports".to_string(),
        dataset_id: "dataset-1".to_string(),
        workflow_id: "workflow-1".to_string(),
        ..Default::default()
    }
}

fn engine(settings: EvolutionSettings, evaluator: Arc<ScriptedEvaluator>) -> EvolutionEngine {
    EvolutionEngine::builder()
        .settings(settings)
        .gateway(Arc::new(StubGateway))
        .evaluator(evaluator)
        .verifier(Arc::new(AcceptingVerifier))
        .catalog(Arc::new(StaticCatalog))
        .num_workers(1)
        .build()
        .unwrap()
}

#[test]
fn two_failures_then_success_backs_off_and_recovers() {
    let settings = EvolutionSettings {
        population_size: 1,
        offspring_count: 0,
        generations: 1,
        crossover_rate: 0.0,
        mutation_rate: 0.0,
        ..Default::default()
    };
    let evaluator = Arc::new(ScriptedEvaluator::constant(0.42, 0.01).failing_first(2));
    let mut engine = engine(settings, Arc::clone(&evaluator));

    let start = Instant::now();
    let outcome = engine.evolve(objective()).unwrap();

    // Backoff between the three attempts: at least 1s then at least 2s.
    assert!(start.elapsed() >= Duration::from_millis(3000));
    assert_eq!(evaluator.calls(), 3);

    let best = outcome.best.unwrap();
    assert_eq!(best.score(), 0.42);
    assert_eq!(outcome.failures.evaluation_attempts, 3);
    assert_eq!(outcome.failures.evaluation_failures, 0);
    // Every attempt accrued its cost.
    assert!((outcome.total_cost_usd - 0.03).abs() < 1e-9);
}

#[test]
fn three_failures_mark_the_genome_unevaluated() {
    let settings = EvolutionSettings {
        population_size: 2,
        offspring_count: 0,
        generations: 1,
        crossover_rate: 0.0,
        mutation_rate: 0.0,
        ..Default::default()
    };
    // The first genome burns all three attempts; the second succeeds on
    // its first call.
    let evaluator = Arc::new(ScriptedEvaluator::constant(0.6, 0.001).failing_first(3));
    let mut engine = engine(settings, Arc::clone(&evaluator));

    let outcome = engine.evolve(objective()).unwrap();

    assert_eq!(outcome.failures.evaluation_failures, 1);
    let best = outcome.best.unwrap();
    assert_eq!(best.score(), 0.6);
}

#[test]
fn cancelled_engines_surface_cancelled_and_interrupt_the_run() {
    let settings = EvolutionSettings {
        population_size: 1,
        offspring_count: 0,
        generations: 3,
        crossover_rate: 0.0,
        mutation_rate: 0.0,
        ..Default::default()
    };
    let evaluator = Arc::new(ScriptedEvaluator::constant(0.5, 0.001));
    let mut engine = engine(settings, evaluator);

    engine.cancel_token().cancel();
    let err = engine.evolve(objective()).unwrap_err();

    assert_eq!(err.code(), ErrorCode::Cancelled);
}
