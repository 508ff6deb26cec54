pub mod builder;
pub mod coordinator;
pub mod engine;
pub mod factory;
pub mod operators;
pub mod population;
pub mod run;
pub mod selection;
pub mod settings;
pub mod stats;

pub use builder::EvolutionEngineBuilder;
pub use coordinator::MutationCoordinator;
pub use engine::{EvolutionEngine, EvolutionObjective, EvolutionOutcome};
pub use factory::GenomeFactory;
pub use operators::{
    AddNode, Crossover, CrossoverKind, DeleteNode, ModelMutation, MutationOperator, MutationType,
    OperatorContext, OperatorOutcome, PromptMutation, STRUCTURE_PATTERNS, StructureMutation,
    ToolMutation,
};
pub use population::{MIN_VIABLE, Population};
pub use run::RunService;
pub use selection::{Breeder, select_elite, select_tournament};
pub use settings::{EvolutionMode, EvolutionSettings, InitialPopulationMethod, MutationParams};
pub use stats::{StatsTracker, StopReason};

pub use evoflow_core::*;
pub use evoflow_error::{EvoflowError, EvoflowResult, ensure, evoflow_err};

pub fn init_logging() {
    pub use std::sync::Once;
    static INIT_LOGGING: Once = Once::new();

    INIT_LOGGING.call_once(|| {
        use tracing_subscriber::fmt::format::FmtSpan;
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        std::panic::set_hook(Box::new(|info| {
            tracing::error!("PANIC: {}", info);
        }));

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                    .with_target(false)
                    .with_level(true)
                    .compact(),
            )
            .init();
    });
}
