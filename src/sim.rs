//! Synthetic driving scenarios
//!
//! Generates noise-free straight-line deceleration series for exercising
//! the cascade without a recorded dataset.

use crate::params::VehicleParams;
use crate::state::TimeSeriesRecord;

/// Constant-deceleration scenario
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecelerationScenario {
    /// Initial speed [m/s]
    pub initial_speed_mps: f64,
    /// Constant acceleration [m/s^2], negative when braking
    pub acceleration_mps2: f64,
    /// Sample period [s]
    pub dt: f64,
    /// Number of samples
    pub steps: usize,
    pub vehicle: VehicleParams,
}

impl Default for DecelerationScenario {
    fn default() -> Self {
        Self {
            initial_speed_mps: 20.0,
            acceleration_mps2: -0.5,
            dt: 0.1,
            steps: 300,
            vehicle: VehicleParams::default(),
        }
    }
}

impl DecelerationScenario {
    /// Records with torque derived from the constant acceleration.
    ///
    /// Speed is clamped at zero; once stopped the acceleration is zero too.
    pub fn records(&self) -> Vec<TimeSeriesRecord> {
        (0..self.steps)
            .map(|step| {
                let t = step as f64 * self.dt;
                let speed = self.initial_speed_mps + self.acceleration_mps2 * t;
                let (speed, accel) = if speed > 0.0 {
                    (speed, self.acceleration_mps2)
                } else {
                    (0.0, 0.0)
                };
                TimeSeriesRecord::from_kinematics(t, speed, accel, &self.vehicle)
            })
            .collect()
    }

    /// Friction implied by the braking torque, `-a / g` for this model.
    pub fn implied_friction(&self) -> f64 {
        let torque = self.vehicle.torque_from_acceleration(self.acceleration_mps2);
        self.vehicle.friction_from_torque(torque)
    }
}
