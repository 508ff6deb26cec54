use super::thread_pool::{ThreadPool, WaitGroup};

/// Execution strategy for batches of collaborator calls. `Serial` runs
/// everything on the caller's thread; `WorkerPool` caps concurrency at the
/// pool size. `execute_batch` is a barrier: it returns only after every job
/// in the batch has settled.
pub enum Executor {
    Serial,
    WorkerPool(ThreadPool),
}

impl Executor {
    pub fn serial() -> Self {
        Executor::Serial
    }

    pub fn worker_pool(num_workers: usize) -> Self {
        Executor::WorkerPool(ThreadPool::new(num_workers))
    }

    pub fn num_workers(&self) -> usize {
        match self {
            Executor::Serial => 1,
            Executor::WorkerPool(pool) => pool.num_workers(),
        }
    }

    pub fn execute<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self {
            Executor::Serial => f(),
            Executor::WorkerPool(pool) => pool.submit_with_result(f).result(),
        }
    }

    /// Runs every job in the batch and returns the results in submission
    /// order. Blocks until the whole batch has settled.
    pub fn execute_batch<F, R>(&self, jobs: Vec<F>) -> Vec<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self {
            Executor::Serial => jobs.into_iter().map(|job| job()).collect(),
            Executor::WorkerPool(pool) => {
                let wg = WaitGroup::new();
                let mut results = Vec::with_capacity(jobs.len());
                for job in jobs {
                    let guard = wg.guard();
                    let result = pool.submit_with_result(move || {
                        let res = job();
                        drop(guard);
                        res
                    });
                    results.push(result);
                }

                wg.wait();

                results.into_iter().map(|r| r.result()).collect()
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Executor::Serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_batch_preserves_order() {
        let executor = Executor::serial();
        let jobs = (0..5).map(|i| move || i * 2).collect::<Vec<_>>();

        assert_eq!(executor.execute_batch(jobs), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn worker_pool_batch_preserves_order() {
        let executor = Executor::worker_pool(4);
        let jobs = (0..20).map(|i| move || i + 100).collect::<Vec<_>>();

        let results = executor.execute_batch(jobs);
        assert_eq!(results, (100..120).collect::<Vec<_>>());
    }

    #[test]
    fn single_execute_returns_value() {
        let executor = Executor::worker_pool(2);
        assert_eq!(executor.execute(|| "done"), "done");
    }
}
