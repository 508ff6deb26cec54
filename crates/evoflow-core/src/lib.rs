pub mod cache;
pub mod capability;
pub mod domain;
pub mod fingerprint;
pub mod genome;
pub mod math;
pub mod memory;
pub mod stats;
pub mod tracker;
pub mod workflow;

pub use cache::VerificationCache;
pub use capability::{
    AiMessage, AiRequest, AiResponse, CompletedGeneration, EvaluatedFitness, FitnessEvaluator,
    FormalizeOptions, Gateway, LastGeneration, MessageRole, ModelCatalog, NewGeneration,
    RunPersistence, RunRecord, RunStatus, ToolAction, ToolActionKind, ToolKind, Verdict,
    WorkflowVersionRecord, WorkflowVerifier,
};
pub use domain::*;
pub use fingerprint::{
    FINGERPRINT_LEN, StructuralFingerprint, find_similar, fingerprint_distance,
    structural_fingerprint,
};
pub use genome::{
    EvaluationInputs, EvaluationResults, EvolutionContext, Fitness, Genome, OperationTag,
    WorkflowGenome,
};
pub use stats::{FitnessStats, PopulationStats, calculate_stats};
pub use tracker::{FailureKind, FailureSnapshot, FailureTracker};
pub use workflow::{MemoryMap, WorkflowConfig, WorkflowNode};

pub use evoflow_error::{ErrorCode, EvoflowError, EvoflowResult, PersistenceKind};
