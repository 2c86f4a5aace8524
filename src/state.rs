//! Input records and state estimates
//!
//! - `TimeSeriesRecord`: one read-only sample of the prepared driving cycle
//! - `StateEstimate`: velocity/torque estimate of the robust filter

use crate::params::VehicleParams;

/// One sample of the prepared time series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesRecord {
    /// Time [s]
    pub time_s: f64,
    /// Velocity [m/s]
    pub velocity_mps: f64,
    /// Longitudinal acceleration [m/s^2]
    pub acceleration_mps2: f64,
    /// Regenerative torque [Nm]
    pub torque_nm: f64,
}

impl TimeSeriesRecord {
    pub fn new(time_s: f64, velocity_mps: f64, acceleration_mps2: f64, torque_nm: f64) -> Self {
        Self {
            time_s,
            velocity_mps,
            acceleration_mps2,
            torque_nm,
        }
    }

    /// Build a record whose torque is derived from the acceleration.
    pub fn from_kinematics(
        time_s: f64,
        velocity_mps: f64,
        acceleration_mps2: f64,
        vehicle: &VehicleParams,
    ) -> Self {
        Self::new(
            time_s,
            velocity_mps,
            acceleration_mps2,
            vehicle.torque_from_acceleration(acceleration_mps2),
        )
    }

    pub fn is_deceleration(&self) -> bool {
        self.acceleration_mps2 < 0.0
    }
}

/// Velocity/torque estimate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateEstimate {
    /// Velocity [m/s]
    pub velocity_mps: f64,
    /// Regenerative torque [Nm]
    pub torque_nm: f64,
}

impl StateEstimate {
    pub fn new(velocity_mps: f64, torque_nm: f64) -> Self {
        Self {
            velocity_mps,
            torque_nm,
        }
    }

    /// Flattened `[velocity, torque]`
    pub fn to_array(self) -> [f64; 2] {
        [self.velocity_mps, self.torque_nm]
    }
}
