//! Physical and filter parameters
//!
//! Plain parameter sets for the vehicle, the robust state filter and the
//! whole cascade. All of them are fixed for the duration of a run.

use crate::error::EstimationError;

/// Physical constants of the reference vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleParams {
    /// Vehicle mass [kg]
    pub mass_kg: f64,
    /// Effective wheel radius [m]
    pub wheel_radius_m: f64,
    /// Gravitational acceleration [m/s^2]
    pub gravity_mps2: f64,
}

impl VehicleParams {
    pub fn new(mass_kg: f64, wheel_radius_m: f64, gravity_mps2: f64) -> Self {
        Self {
            mass_kg,
            wheel_radius_m,
            gravity_mps2,
        }
    }

    /// Regenerative torque implied by a longitudinal acceleration.
    ///
    /// Deceleration (negative acceleration) yields positive braking torque.
    pub fn torque_from_acceleration(&self, acceleration_mps2: f64) -> f64 {
        -acceleration_mps2 * self.mass_kg * self.wheel_radius_m
    }

    /// Friction coefficient implied by a braking torque: `(torque / r) / (m * g)`.
    pub fn friction_from_torque(&self, torque_nm: f64) -> f64 {
        let braking_force = torque_nm / self.wheel_radius_m;
        braking_force / (self.mass_kg * self.gravity_mps2)
    }

    pub fn validate(&self) -> Result<(), EstimationError> {
        if !(self.mass_kg.is_finite() && self.mass_kg > 0.0) {
            return Err(EstimationError::InvalidConfig(
                "mass_kg must be finite and > 0".to_string(),
            ));
        }
        if !(self.wheel_radius_m.is_finite() && self.wheel_radius_m > 0.0) {
            return Err(EstimationError::InvalidConfig(
                "wheel_radius_m must be finite and > 0".to_string(),
            ));
        }
        if !(self.gravity_mps2.is_finite() && self.gravity_mps2 > 0.0) {
            return Err(EstimationError::InvalidConfig(
                "gravity_mps2 must be finite and > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            mass_kg: 1500.0,
            wheel_radius_m: 0.3,
            gravity_mps2: 9.81,
        }
    }
}

/// Hyperparameters of the robust velocity/torque filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustFilterParams {
    /// Robustness parameter (gamma > 0); smaller is more aggressive
    pub gamma: f64,
    /// Vehicle mass [kg]
    pub mass_kg: f64,
    /// Effective wheel radius [m]
    pub wheel_radius_m: f64,
    /// Discrete time step [s]
    pub dt: f64,
    /// Initial road friction coefficient
    pub mu: f64,
    /// Torque self-decay factor in [0, 1)
    pub alpha: f64,
    /// Growth rate of Q per unit mean absolute residual
    pub q_scale: f64,
    /// Growth rate of R per unit mean absolute residual
    pub r_scale: f64,
}

impl RobustFilterParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gamma: f64,
        mass_kg: f64,
        wheel_radius_m: f64,
        dt: f64,
        mu: f64,
        alpha: f64,
        q_scale: f64,
        r_scale: f64,
    ) -> Self {
        Self {
            gamma,
            mass_kg,
            wheel_radius_m,
            dt,
            mu,
            alpha,
            q_scale,
            r_scale,
        }
    }

    pub fn validate(&self) -> Result<(), EstimationError> {
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(EstimationError::InvalidConfig(
                "gamma must be finite and > 0".to_string(),
            ));
        }
        if !(self.mass_kg > 0.0 && self.wheel_radius_m > 0.0) {
            return Err(EstimationError::InvalidConfig(
                "mass and wheel radius must be > 0".to_string(),
            ));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(EstimationError::InvalidConfig(
                "dt must be finite and > 0".to_string(),
            ));
        }
        if !self.mu.is_finite() {
            return Err(EstimationError::InvalidConfig(
                "mu must be finite".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.alpha) {
            return Err(EstimationError::InvalidConfig(
                "alpha must be in [0, 1)".to_string(),
            ));
        }
        if !(self.q_scale >= 0.0 && self.r_scale >= 0.0) {
            return Err(EstimationError::InvalidConfig(
                "q_scale and r_scale must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RobustFilterParams {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            mass_kg: 1500.0,
            wheel_radius_m: 0.3,
            dt: 0.1,
            mu: 0.8,
            alpha: 0.95,
            q_scale: 0.1,
            r_scale: 0.05,
        }
    }
}

/// Parameters of a full cascade run.
///
/// The time step, initial friction and friction process noise are not
/// listed here; they are derived from the input series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeConfig {
    pub vehicle: VehicleParams,
    /// Robustness parameter handed to the state filter
    pub gamma: f64,
    /// Torque self-decay factor
    pub torque_decay: f64,
    pub q_scale: f64,
    pub r_scale: f64,
    /// Std-dev of the synthetic noise added to the observed friction
    pub friction_noise_std: f64,
    /// Measurement variance of the friction filter
    pub friction_measurement_variance: f64,
    /// Used when the series contains no deceleration samples
    pub fallback_friction: Option<f64>,
}

impl CascadeConfig {
    pub fn validate(&self) -> Result<(), EstimationError> {
        self.vehicle.validate()?;
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(EstimationError::InvalidConfig(
                "gamma must be finite and > 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.torque_decay) {
            return Err(EstimationError::InvalidConfig(
                "torque_decay must be in [0, 1)".to_string(),
            ));
        }
        if !(self.q_scale >= 0.0 && self.r_scale >= 0.0) {
            return Err(EstimationError::InvalidConfig(
                "q_scale and r_scale must be >= 0".to_string(),
            ));
        }
        if !(self.friction_noise_std.is_finite() && self.friction_noise_std >= 0.0) {
            return Err(EstimationError::InvalidConfig(
                "friction_noise_std must be finite and >= 0".to_string(),
            ));
        }
        if !(self.friction_measurement_variance.is_finite()
            && self.friction_measurement_variance > 0.0)
        {
            return Err(EstimationError::InvalidConfig(
                "friction_measurement_variance must be finite and > 0".to_string(),
            ));
        }
        if let Some(mu) = self.fallback_friction {
            if !mu.is_finite() {
                return Err(EstimationError::InvalidConfig(
                    "fallback_friction must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// State filter parameters for a derived time step and initial friction.
    pub fn robust_params(&self, dt: f64, mu: f64) -> RobustFilterParams {
        RobustFilterParams::new(
            self.gamma,
            self.vehicle.mass_kg,
            self.vehicle.wheel_radius_m,
            dt,
            mu,
            self.torque_decay,
            self.q_scale,
            self.r_scale,
        )
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            vehicle: VehicleParams::default(),
            gamma: 0.9,
            torque_decay: 0.95,
            q_scale: 0.1,
            r_scale: 0.05,
            friction_noise_std: 0.05,
            friction_measurement_variance: 0.05,
            fallback_friction: None,
        }
    }
}
