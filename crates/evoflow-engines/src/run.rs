use evoflow_core::capability::{
    CompletedGeneration, NewGeneration, RunPersistence, RunRecord, RunStatus,
    WorkflowVersionRecord,
};
use evoflow_core::domain::cancel::CancelToken;
use evoflow_core::domain::retry::{RetryPolicy, retry};
use evoflow_core::genome::EvolutionContext;
use evoflow_core::stats::PopulationStats;
use evoflow_error::{EvoflowResult, evoflow_bail, evoflow_err};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use tracing::info;

/// Tracks the active run and generation, with or without a persistence
/// store behind it. Without a store, identifiers are allocated locally and
/// every write is a no-op; the core state machine is identical either way.
pub struct RunService {
    persistence: Option<Arc<dyn RunPersistence>>,
    cancel: CancelToken,
    run_id: Option<String>,
    generation_id: Option<String>,
    generation_number: usize,
}

/// Transient persistence failures are retried up to three times with
/// exponential backoff; conflicts and not-found errors fail immediately.
fn persistence_policy() -> RetryPolicy {
    RetryPolicy::exponential(3, Duration::from_millis(500))
}

impl RunService {
    pub fn new(persistence: Option<Arc<dyn RunPersistence>>, cancel: CancelToken) -> Self {
        Self {
            persistence,
            cancel,
            run_id: None,
            generation_id: None,
            generation_number: 0,
        }
    }

    pub fn run_id(&self) -> EvoflowResult<&str> {
        self.run_id
            .as_deref()
            .ok_or_else(|| evoflow_err!(RunTracking: "no active run"))
    }

    pub fn generation_id(&self) -> EvoflowResult<&str> {
        self.generation_id
            .as_deref()
            .ok_or_else(|| evoflow_err!(RunTracking: "no active generation"))
    }

    pub fn generation_number(&self) -> usize {
        self.generation_number
    }

    /// The evolution context every genome of the current generation
    /// carries. Fails when no run or generation is active.
    pub fn context(&self) -> EvoflowResult<EvolutionContext> {
        Ok(EvolutionContext {
            run_id: self.run_id()?.to_string(),
            generation_id: self.generation_id()?.to_string(),
            generation_number: self.generation_number,
        })
    }

    /// Starts a new run, or resumes `continue_run_id` from its last
    /// completed generation. Resume without a completed generation (or
    /// without a persistence store) is a run-tracking error.
    pub fn create_run(
        &mut self,
        goal_text: &str,
        config_json: String,
        notes: &str,
        continue_run_id: Option<&str>,
    ) -> EvoflowResult<()> {
        if let Some(resume_id) = continue_run_id {
            let Some(store) = &self.persistence else {
                evoflow_bail!(RunTracking: "cannot resume '{}' without persistence", resume_id);
            };

            let last = retry(persistence_policy(), &self.cancel, |_| {
                store.last_completed_generation(resume_id)
            })?;

            let Some(last) = last else {
                evoflow_bail!(
                    RunTracking: "run '{}' has no completed generation to resume from", resume_id
                );
            };

            info!(
                run_id = %last.run_id,
                generation = last.generation_number,
                "resuming run from last completed generation"
            );
            self.run_id = Some(last.run_id);
            self.generation_id = Some(last.generation_id);
            self.generation_number = last.generation_number;
            return Ok(());
        }

        let run_id = match &self.persistence {
            Some(store) => {
                let record = RunRecord {
                    goal_text: goal_text.to_string(),
                    config: config_json,
                    status: RunStatus::Running,
                    evolution_type: "gp".to_string(),
                    notes: notes.to_string(),
                };
                retry(persistence_policy(), &self.cancel, |_| {
                    store.create_run(record.clone())
                })?
            }
            None => Uuid::new_v4().to_string(),
        };

        info!(run_id = %run_id, "run created");
        self.run_id = Some(run_id);
        self.generation_id = None;
        self.generation_number = 0;

        Ok(())
    }

    /// Opens the generation with the given number and makes it current.
    pub fn create_new_generation(&mut self, number: usize) -> EvoflowResult<()> {
        let run_id = self.run_id()?.to_string();

        let generation_id = match &self.persistence {
            Some(store) => retry(persistence_policy(), &self.cancel, |_| {
                store.create_generation(NewGeneration {
                    generation_number: number,
                    run_id: run_id.clone(),
                })
            })?,
            None => Uuid::new_v4().to_string(),
        };

        self.generation_id = Some(generation_id);
        self.generation_number = number;

        Ok(())
    }

    /// Closes the current generation, recording the best workflow version
    /// and the generation's stats summary.
    pub fn complete_generation(
        &self,
        best_workflow_version_id: &str,
        comment: &str,
        feedback: Option<String>,
        stats: &PopulationStats,
    ) -> EvoflowResult<()> {
        let generation_id = self.generation_id()?.to_string();

        if let Some(store) = &self.persistence {
            let completed = CompletedGeneration {
                generation_id,
                best_workflow_version_id: best_workflow_version_id.to_string(),
                comment: comment.to_string(),
                feedback,
            };
            retry(persistence_policy(), &self.cancel, |_| {
                store.complete_generation(completed.clone(), stats)
            })?;
        }

        Ok(())
    }

    pub fn complete_run(&self, status: RunStatus, notes: &str) -> EvoflowResult<()> {
        let run_id = self.run_id()?.to_string();

        if let Some(store) = &self.persistence {
            retry(persistence_policy(), &self.cancel, |_| {
                store.complete_run(&run_id, status, notes)
            })?;
        }

        info!(run_id = %run_id, ?status, "run completed");
        Ok(())
    }

    /// Upserts the workflow-version row for a genome entering the run.
    pub fn ensure_workflow_version(&self, record: WorkflowVersionRecord) -> EvoflowResult<()> {
        if let Some(store) = &self.persistence {
            retry(persistence_policy(), &self.cancel, |_| {
                store.create_workflow_version(record.clone())
            })?;
        }

        Ok(())
    }
}
