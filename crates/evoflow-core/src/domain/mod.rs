pub mod cancel;
pub mod executor;
pub mod random_provider;
pub mod retry;
pub mod thread_pool;

pub use cancel::CancelToken;
pub use executor::Executor;
pub use retry::{Backoff, RetryPolicy, retry};
pub use thread_pool::{ThreadPool, WaitGroup};
