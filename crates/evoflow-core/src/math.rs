use crate::domain::random_provider;

/// Draws from a Poisson distribution with the given rate using Knuth's
/// algorithm, then clamps the sample into `[min, max]` when bounds are given.
/// Operator intensity is drawn this way (`poisson(1.0, Some(4), Some(5))`).
pub fn poisson(lambda: f64, min: Option<u32>, max: Option<u32>) -> u32 {
    let mut sample = if lambda <= 0.0 {
        0
    } else {
        let limit = (-lambda).exp();
        let mut k: u32 = 0;
        let mut p: f64 = 1.0;

        loop {
            k += 1;
            p *= random_provider::random::<f64>();
            if p <= limit {
                break;
            }
        }

        k - 1
    };

    if let Some(min) = min {
        sample = sample.max(min);
    }
    if let Some(max) = max {
        sample = sample.min(max);
    }

    sample
}

/// Rounds to two decimal places. Population statistics are reported at this
/// precision.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[inline]
pub fn euclidean(one: &[f32], two: &[f32]) -> f32 {
    one.iter()
        .zip(two.iter())
        .map(|(&a, &b)| {
            let diff = a - b;
            diff * diff
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::random_provider;

    #[test]
    fn poisson_respects_clamp() {
        for _ in 0..200 {
            let sample = poisson(1.0, Some(4), Some(5));
            assert!((4..=5).contains(&sample));
        }
    }

    #[test]
    fn poisson_zero_lambda_is_zero() {
        assert_eq!(poisson(0.0, None, None), 0);
    }

    #[test]
    fn poisson_mean_tracks_lambda() {
        random_provider::scoped_seed(1234, || {
            let n = 5_000;
            let total: u32 = (0..n).map(|_| poisson(3.0, None, None)).sum();
            let mean = total as f64 / n as f64;
            assert!((mean - 3.0).abs() < 0.15, "observed mean {}", mean);
        });
    }

    #[test]
    fn round2_truncates_to_cents() {
        assert_eq!(round2(0.12345), 0.12);
        assert_eq!(round2(2.675), 2.68);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn euclidean_of_identical_vectors_is_zero() {
        let v = vec![0.5, 1.0, 2.0];
        assert_eq!(euclidean(&v, &v), 0.0);
    }

    #[test]
    fn euclidean_simple_case() {
        assert_eq!(euclidean(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }
}
