//! Scalar parameter filter
//!
//! Tracks the road friction coefficient under a constant-dynamics model
//! (A = 1, H = 1). The covariance update is the scalar `(1 - K) * P` form,
//! which is only valid because the state is one-dimensional and fully
//! observed; a vector generalisation would need `(I - K H) P`.

use crate::error::FilterError;

const NAME: &str = "parameter filter";

/// Initial estimate variance
const INITIAL_COVARIANCE: f64 = 0.01;

/// Share of the supplied process variance used as Q
const PROCESS_NOISE_FRACTION: f64 = 0.01;

/// Scalar recursive estimator
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterFilter {
    /// Current estimate
    x: f64,
    /// Estimate variance
    p: f64,
    /// Process noise
    q: f64,
    /// Measurement noise
    r: f64,
}

impl ParameterFilter {
    /// Create a filter seeded at `initial_value`.
    ///
    /// Q is 1% of `process_noise_variance`; R is `measurement_noise_variance`.
    pub fn new(initial_value: f64, process_noise_variance: f64, measurement_noise_variance: f64) -> Self {
        Self {
            x: initial_value,
            p: INITIAL_COVARIANCE,
            q: process_noise_variance * PROCESS_NOISE_FRACTION,
            r: measurement_noise_variance,
        }
    }

    /// Inflate the variance by Q; the estimate itself is held.
    pub fn predict(&mut self) {
        // x is unchanged (A = 1)
        self.p += self.q;
    }

    /// Correct the estimate with one observation and return the new estimate.
    pub fn update(&mut self, observed_value: f64) -> Result<f64, FilterError> {
        let y = observed_value - self.x;
        let s = self.p + self.r;

        if !s.is_finite() {
            return Err(FilterError::NonFiniteInnovation {
                filter: NAME,
                state: vec![self.x],
                covariance: vec![self.p],
            });
        }
        if s == 0.0 {
            return Err(FilterError::SingularInnovation {
                filter: NAME,
                state: vec![self.x],
                covariance: vec![self.p],
            });
        }

        let k = self.p / s;
        self.x += k * y;
        self.p *= 1.0 - k;
        Ok(self.x)
    }

    /// Current estimate
    pub fn estimate(&self) -> f64 {
        self.x
    }

    /// Current estimate variance
    pub fn covariance(&self) -> f64 {
        self.p
    }

    /// Q
    pub fn process_noise(&self) -> f64 {
        self.q
    }

    /// R
    pub fn measurement_noise(&self) -> f64 {
        self.r
    }
}

impl Default for ParameterFilter {
    fn default() -> Self {
        Self::new(0.8, 0.02, 0.05)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_construction_scales_process_noise() {
        let filter = ParameterFilter::new(0.8, 0.02, 0.05);
        assert_eq!(filter.estimate(), 0.8);
        assert_relative_eq!(filter.process_noise(), 0.0002, epsilon = 1e-15);
        assert_eq!(filter.measurement_noise(), 0.05);
        assert_eq!(filter.covariance(), 0.01);
    }

    #[test]
    fn test_matching_observation_keeps_estimate() {
        let mut filter = ParameterFilter::new(0.8, 0.02, 0.05);
        filter.predict();
        assert_relative_eq!(filter.covariance(), 0.0102, epsilon = 1e-12);

        let estimate = filter.update(0.8).unwrap();
        assert_eq!(estimate, 0.8);

        let k = 0.0102 / (0.0102 + 0.05);
        assert_relative_eq!(k, 0.169435, epsilon = 1e-6);
        assert_relative_eq!(filter.covariance(), (1.0 - k) * 0.0102, epsilon = 1e-12);
        assert_relative_eq!(filter.covariance(), 0.008472, epsilon = 1e-6);
    }

    #[test]
    fn test_converges_with_non_increasing_covariance() {
        let mut filter = ParameterFilter::new(0.3, 0.02, 0.05);
        let mut last_p = filter.covariance();
        for _ in 0..500 {
            filter.predict();
            filter.update(0.3).unwrap();
            assert!(filter.covariance() <= last_p + 1e-15);
            last_p = filter.covariance();
        }
        assert_relative_eq!(filter.estimate(), 0.3, epsilon = 1e-12);

        // steady state of P^2 + Q P - Q R = 0
        let (q, r) = (0.0002_f64, 0.05_f64);
        let p_inf = (-q + (q * q + 4.0 * q * r).sqrt()) / 2.0;
        assert_relative_eq!(filter.covariance(), p_inf, epsilon = 1e-9);
    }

    #[test]
    fn test_update_moves_towards_observation() {
        let mut filter = ParameterFilter::default();
        filter.predict();
        let estimate = filter.update(1.0).unwrap();
        assert!(estimate > 0.8 && estimate < 1.0);
    }

    #[test]
    fn test_zero_innovation_variance_is_reported() {
        let mut filter = ParameterFilter::new(0.5, 0.0, 0.0);
        filter.p = 0.0;
        let err = filter.update(0.6).unwrap_err();
        assert!(matches!(err, FilterError::SingularInnovation { .. }));
    }
}
