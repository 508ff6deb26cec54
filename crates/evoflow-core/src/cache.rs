use crate::capability::Verdict;
use crate::workflow::WorkflowConfig;
use evoflow_error::EvoflowResult;
use foldhash::fast::FixedState;
use hashbrown::HashMap;
use std::hash::{BuildHasher, Hasher};
use std::sync::Mutex;

/// Memoizes verifier verdicts for the lifetime of an evolution run, keyed
/// by a structural hash of the workflow config. Node order is significant:
/// two configs that differ only in node ordering hash to different keys.
pub struct VerificationCache {
    entries: Mutex<HashMap<u64, Verdict>>,
    hasher: FixedState,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
}

impl VerificationCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hasher: FixedState::default(),
            hits: Mutex::new(0),
            misses: Mutex::new(0),
        }
    }

    /// The deterministic structural key for a config.
    pub fn structural_key(&self, config: &WorkflowConfig) -> EvoflowResult<u64> {
        let canonical = config.canonical_json()?;
        let mut hasher = self.hasher.build_hasher();
        hasher.write(canonical.as_bytes());
        Ok(hasher.finish())
    }

    /// Returns the cached verdict, or verifies through `verify` and
    /// memoizes the outcome.
    pub fn verify_with<F>(&self, config: &WorkflowConfig, verify: F) -> EvoflowResult<Verdict>
    where
        F: FnOnce(&WorkflowConfig) -> Verdict,
    {
        let key = self.structural_key(config)?;

        if let Some(cached) = self.entries.lock().unwrap().get(&key) {
            *self.hits.lock().unwrap() += 1;
            return Ok(cached.clone());
        }

        let verdict = verify(config);
        *self.misses.lock().unwrap() += 1;
        self.entries
            .lock()
            .unwrap()
            .insert(key, verdict.clone());

        Ok(verdict)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        *self.hits.lock().unwrap()
    }

    pub fn misses(&self) -> u64 {
        *self.misses.lock().unwrap()
    }
}

impl Default for VerificationCache {
    fn default() -> Self {
        Self::new()
    }
}
