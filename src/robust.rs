//! Robust velocity/torque filter
//!
//! Two-state filter over `[velocity, torque]` with friction-dependent
//! dynamics. The gain is inflated by `1 / gamma` and the posterior
//! covariance is deflated by `gamma`. Q and R grow multiplicatively with the
//! mean absolute residual at every update; nothing resets or caps them, so a
//! persistently large residual makes both grow without bound over a run.
//! `noise_covariances` exposes the current values for monitoring.

use nalgebra::{Matrix2, Vector2};

use crate::error::FilterError;
use crate::params::RobustFilterParams;
use crate::state::StateEstimate;

const NAME: &str = "robust state filter";

/// State transition for friction `mu`:
///
/// ```text
/// [ 1  -mu*dt/(m*r) ]
/// [ 0   alpha       ]
/// ```
pub fn transition_matrix(mu: f64, params: &RobustFilterParams) -> Matrix2<f64> {
    let coupling = -mu * params.dt / (params.mass_kg * params.wheel_radius_m);
    Matrix2::new(1.0, coupling, 0.0, params.alpha)
}

/// Friction-aware `[velocity, torque]` estimator with adaptive Q and R
#[derive(Debug, Clone)]
pub struct RobustStateFilter {
    params: RobustFilterParams,
    /// Current road friction
    mu: f64,
    x: Vector2<f64>,
    a: Matrix2<f64>,
    h: Matrix2<f64>,
    q: Matrix2<f64>,
    r: Matrix2<f64>,
    p: Matrix2<f64>,
}

impl RobustStateFilter {
    /// Start at the zero state with unit covariance and the default noise levels.
    pub fn new(params: RobustFilterParams) -> Self {
        Self {
            params,
            mu: params.mu,
            x: Vector2::zeros(),
            a: transition_matrix(params.mu, &params),
            h: Matrix2::identity(),
            q: Matrix2::from_diagonal(&Vector2::new(1e-4, 1e-4)),
            r: Matrix2::from_diagonal(&Vector2::new(0.1, 0.1)),
            p: Matrix2::identity(),
        }
    }

    /// Filter parameters
    pub fn params(&self) -> &RobustFilterParams {
        &self.params
    }

    /// Friction used by the last transition
    pub fn friction(&self) -> f64 {
        self.mu
    }

    /// Replace the friction for the next `predict`.
    pub fn set_friction(&mut self, mu: f64) {
        self.mu = mu;
    }

    /// Propagate the state, optionally adopting a new friction value first.
    pub fn predict(&mut self, road_friction: Option<f64>) {
        if let Some(mu) = road_friction {
            self.mu = mu;
        }
        self.a = transition_matrix(self.mu, &self.params);
        self.x = self.a * self.x;
        self.p = self.a * self.p * self.a.transpose() + self.q;
    }

    /// Correct the state with a `[velocity, torque]` measurement.
    ///
    /// On error the filter is left exactly as it was before the call.
    pub fn update(&mut self, measurement: &Vector2<f64>) -> Result<StateEstimate, FilterError> {
        let y = *measurement - self.h * self.x;
        let (q, r) = self.adapted_covariances(&y);

        let k = self.gain_for(&r)?;
        self.q = q;
        self.r = r;
        self.x += k * y;
        self.p = (Matrix2::identity() - k * self.h) * self.p * self.params.gamma;
        Ok(self.state())
    }

    /// Robustness-weighted gain `P H^T S^-1 / gamma` for the current P, H, R.
    pub fn gain(&self) -> Result<Matrix2<f64>, FilterError> {
        self.gain_for(&self.r)
    }

    fn gain_for(&self, r: &Matrix2<f64>) -> Result<Matrix2<f64>, FilterError> {
        let s = self.h * self.p * self.h.transpose() + r;
        if !s.iter().all(|v| v.is_finite()) {
            return Err(FilterError::NonFiniteInnovation {
                filter: NAME,
                state: self.x.iter().copied().collect(),
                covariance: self.p.iter().copied().collect(),
            });
        }
        let s_inv = s.try_inverse().ok_or_else(|| FilterError::SingularInnovation {
            filter: NAME,
            state: self.x.iter().copied().collect(),
            covariance: self.p.iter().copied().collect(),
        })?;
        Ok(self.p * self.h.transpose() * s_inv * (1.0 / self.params.gamma))
    }

    /// Scale Q and R by `1 + mean(|residual|) * scale`.
    pub fn adapt_covariance(&mut self, residual: &Vector2<f64>) {
        let (q, r) = self.adapted_covariances(residual);
        self.q = q;
        self.r = r;
    }

    fn adapted_covariances(&self, residual: &Vector2<f64>) -> (Matrix2<f64>, Matrix2<f64>) {
        let mean_abs = residual.abs().mean();
        (
            self.q * (1.0 + mean_abs * self.params.q_scale),
            self.r * (1.0 + mean_abs * self.params.r_scale),
        )
    }

    /// Current `[velocity, torque]` estimate
    pub fn state(&self) -> StateEstimate {
        StateEstimate::new(self.x[0], self.x[1])
    }

    /// Current state as a vector
    pub fn state_vector(&self) -> Vector2<f64> {
        self.x
    }

    /// Posterior covariance P
    pub fn covariance(&self) -> Matrix2<f64> {
        self.p
    }

    /// Transition matrix from the last `predict`
    pub fn transition(&self) -> Matrix2<f64> {
        self.a
    }

    /// Current `(Q, R)`
    pub fn noise_covariances(&self) -> (Matrix2<f64>, Matrix2<f64>) {
        (self.q, self.r)
    }
}
