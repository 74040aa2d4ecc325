//! Discretised Weibull transit kernel.
//!
//! The diffuse flow path releases each monthly inflow pulse over the following months
//! with weights drawn from a Weibull density. The drip generator scales the monthly
//! drip interval by the mean of the continuous distribution, [`mean`].
use crate::constants::{WEIBULL_NONFINITE_WEIGHT, WEIBULL_X_MAX};

/// Normalised Weibull weights `y[lag]` for lags `0..len`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeibullKernel {
    weights: Vec<f64>,
}

impl WeibullKernel {
    /// Build a kernel with scale `lambda`, shape `k` and `len` lags.
    ///
    /// The density is sampled on `len` evenly spaced points of `[0, 2]`. The weight at
    /// lag zero is forced to zero, so nothing leaves in the month it arrives.
    ///
    /// # Examples
    ///
    /// ```
    /// use karstolution::weibull::WeibullKernel;
    /// let y = WeibullKernel::new(1.0, 1.5, 12);
    /// let total: f64 = y.weights().iter().sum();
    /// assert!((total - 1.0).abs() < 1e-12);
    /// assert_eq!(y.weights()[0], 0.0);
    /// ```
    pub fn new(lambda: f64, k: f64, len: usize) -> Self {
        let len = len.max(2);
        let step = WEIBULL_X_MAX / (len - 1) as f64;
        let xs: Vec<f64> = (0..len).map(|i| i as f64 * step).collect();
        let mut weights: Vec<f64> = xs
            .iter()
            .map(|x| {
                let y = density(*x, lambda, k);
                if y.is_finite() {
                    y
                } else {
                    WEIBULL_NONFINITE_WEIGHT
                }
            })
            .collect();
        weights[0] = 0.0;
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter_mut().for_each(|w| *w /= total);
        } else {
            // degenerate density: release evenly after the first month
            let even = 1.0 / (len - 1) as f64;
            weights.iter_mut().skip(1).for_each(|w| *w = even);
        }
        WeibullKernel { weights }
    }

    /// Normalised weights, summing to one.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight at `lag`, zero past the end of the kernel.
    pub fn weight(&self, lag: usize) -> f64 {
        self.weights.get(lag).copied().unwrap_or(0.0)
    }

    /// Number of lags.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Always false; a kernel has at least two lags.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Mean of the Weibull distribution with scale `lambda` and shape `k`, `λ Γ(1 + 1/k)`.
///
/// # Examples
///
/// ```
/// use karstolution::weibull::mean;
/// // shape 1 is the exponential distribution
/// assert!((mean(2.5, 1.0) - 2.5).abs() < 1e-12);
/// ```
pub fn mean(lambda: f64, k: f64) -> f64 {
    lambda * libm::tgamma(1.0 + 1.0 / k)
}

/// Weibull probability density with scale `lambda` and shape `k`.
pub fn density(x: f64, lambda: f64, k: f64) -> f64 {
    if x < 0.0 {
        return 0.0;
    }
    let z = x / lambda;
    (k / lambda) * z.powf(k - 1.0) * (-z.powf(k)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    #[test]
    fn weights_normalised() {
        for &(l, k) in &[(0.5, 0.8), (1.0, 1.0), (1.2, 3.0), (3.0, 5.0)] {
            let y = WeibullKernel::new(l, k, 12);
            assert_approx(y.weights().iter().sum(), 1.0, 1e-12);
            assert!(y.weights().iter().all(|w| *w >= 0.0));
        }
    }

    #[test]
    fn first_weight_zero() {
        // shape < 1 makes the density infinite at zero
        let y = WeibullKernel::new(1.0, 0.5, 12);
        assert_eq!(y.weight(0), 0.0);
    }

    #[test]
    fn exponential_density() {
        // k = 1 reduces to the exponential with rate 1/lambda
        assert_approx(density(1.0, 2.0, 1.0), 0.5 * (-0.5f64).exp(), 1e-12);
        assert_eq!(density(-1.0, 2.0, 1.0), 0.0);
    }

    #[test]
    fn weight_past_end_is_zero() {
        let y = WeibullKernel::new(1.0, 1.5, 6);
        assert_eq!(y.len(), 6);
        assert_eq!(y.weight(6), 0.0);
    }

    #[test]
    fn mean_matches_closed_form() {
        // Γ(1 + 1/k) for k = 1, 2, 1.5 and 0.5
        assert_approx(mean(1.0, 1.0), 1.0, 1e-12);
        assert_approx(mean(5.0, 2.0), 5.0 * std::f64::consts::PI.sqrt() / 2.0, 1e-12);
        assert_approx(mean(3.0, 1.5), 3.0 * 0.902_745_292_950_934, 1e-9);
        assert_approx(mean(0.8, 0.5), 0.8 * 2.0, 1e-12);
    }

    #[test]
    fn mean_not_truncated_by_kernel_length() {
        // the discrete kernel stops at x = 2; the distribution mean does not
        let lambda = 5.0;
        let kernel = WeibullKernel::new(lambda, 2.0, 12);
        let truncated: f64 = kernel
            .weights()
            .iter()
            .enumerate()
            .map(|(i, w)| i as f64 * WEIBULL_X_MAX / 11.0 * w)
            .sum();
        assert!(truncated < WEIBULL_X_MAX);
        assert!(mean(lambda, 2.0) > 4.4);
    }

    #[test]
    fn short_kernel_is_padded_to_two_lags() {
        let y = WeibullKernel::new(1.0, 1.5, 1);
        assert_eq!(y.len(), 2);
        assert_eq!(y.weights(), &[0.0, 1.0]);
    }
}
