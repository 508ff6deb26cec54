use rand::distr::{Distribution, StandardUniform, uniform::SampleUniform};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngExt, SeedableRng};
use std::cell::RefCell;
use std::ops::Range;
use std::sync::{Arc, LazyLock, Mutex};

static GLOBAL_RNG: LazyLock<Arc<Mutex<SmallRng>>> =
    LazyLock::new(|| Arc::new(Mutex::new(SmallRng::from_rng(&mut rand::rng()))));

thread_local! {
    static TLS_RNG: RefCell<SmallRng> = RefCell::new({
        let mut global = GLOBAL_RNG.lock().unwrap();
        SmallRng::seed_from_u64(global.next_u64())
    });
}

fn with_rng<R>(f: impl FnOnce(&mut SmallRng) -> R) -> R {
    TLS_RNG.with(|cell| f(&mut cell.borrow_mut()))
}

/// Seeds the thread-local random number generator with the given seed.
/// Every stochastic decision in the engine (operator sampling, tournament
/// draws, Poisson intensities) flows through this module, so seeding here
/// makes a run reproducible.
pub fn set_seed(seed: u64) {
    let mut global = GLOBAL_RNG.lock().unwrap();
    *global = SmallRng::seed_from_u64(seed);
    TLS_RNG.with(|cell| {
        *cell.borrow_mut() = SmallRng::seed_from_u64(seed);
    });
}

/// Temporarily seeds the thread-local generator for the duration of `f`,
/// then restores its previous state.
pub fn scoped_seed<R>(seed: u64, f: impl FnOnce() -> R) -> R {
    TLS_RNG.with(|cell| {
        let original = {
            let mut rng = cell.borrow_mut();
            let original = rng.clone();
            *rng = SmallRng::seed_from_u64(seed);
            original
        };

        let result = f();

        *cell.borrow_mut() = original;

        result
    })
}

/// For floating point types the number will be in the range [0, 1).
#[inline(always)]
pub fn random<T>() -> T
where
    T: SampleUniform,
    StandardUniform: Distribution<T>,
{
    with_rng(|rng| rng.random())
}

/// Generates a random boolean with the given probability of being true.
#[inline(always)]
pub fn bool(prob: f64) -> bool {
    with_rng(|rng| rng.random_bool(prob.clamp(0.0, 1.0)))
}

/// Generates a random number of type T in the given range.
pub fn range<T>(range: Range<T>) -> T
where
    T: SampleUniform + PartialOrd,
{
    with_rng(|rng| rng.random_range(range))
}

/// Chooses a random item from the given slice. Panics on an empty slice.
pub fn choose<T>(items: &[T]) -> &T {
    with_rng(|rng| {
        let index = rng.random_range(0..items.len());
        &items[index]
    })
}

/// Shuffles the given slice in place.
pub fn shuffle<T>(items: &mut [T]) {
    with_rng(|rng| items.shuffle(rng));
}

/// Samples `sample_size` distinct indexes from the given range in random order.
pub fn sample_indices(range: Range<usize>, sample_size: usize) -> Vec<usize> {
    with_rng(|rng| {
        let mut indexes = range.collect::<Vec<usize>>();
        indexes.shuffle(rng);
        indexes.truncate(sample_size);
        indexes
    })
}
