use std::fs;
use std::path::Path;

use anyhow::Context;
use regen_kf::{CascadeConfig, VehicleParams};
use serde::{Deserialize, Serialize};

/// Runtime configuration for a cascade run over a driving cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// H-infinity robustness parameter
    pub gamma: f64,
    /// Process noise growth factor
    pub q_scale: f64,
    /// Measurement noise growth factor
    pub r_scale: f64,
    /// Torque self-decay factor
    pub torque_decay: f64,
    /// Vehicle mass [kg]
    pub mass_kg: f64,
    /// Effective wheel radius [m]
    pub wheel_radius_m: f64,
    /// Gravitational acceleration [m/s^2]
    pub gravity_mps2: f64,
    /// Std-dev of the synthetic observed-friction noise
    pub friction_noise_std: f64,
    /// Measurement variance of the friction filter
    pub friction_measurement_variance: f64,
    /// Friction used when the series has no deceleration samples
    pub fallback_friction: Option<f64>,
    /// RNG seed for the friction noise
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            q_scale: 0.1,
            r_scale: 0.05,
            torque_decay: 0.95,
            mass_kg: 1500.0,
            wheel_radius_m: 0.3,
            gravity_mps2: 9.81,
            friction_noise_std: 0.05,
            friction_measurement_variance: 0.05,
            fallback_friction: None,
            seed: 42,
        }
    }
}

impl RunConfig {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let cfg: RunConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse TOML config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.gamma > 0.0, "gamma must be > 0");
        anyhow::ensure!(self.q_scale >= 0.0, "q_scale must be >= 0");
        anyhow::ensure!(self.r_scale >= 0.0, "r_scale must be >= 0");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.torque_decay),
            "torque_decay must be in [0, 1)"
        );
        anyhow::ensure!(self.mass_kg > 0.0, "mass_kg must be > 0");
        anyhow::ensure!(self.wheel_radius_m > 0.0, "wheel_radius_m must be > 0");
        anyhow::ensure!(self.friction_noise_std >= 0.0, "friction_noise_std must be >= 0");
        anyhow::ensure!(
            self.friction_measurement_variance > 0.0,
            "friction_measurement_variance must be > 0"
        );
        self.cascade_config().validate()?;
        Ok(())
    }

    pub fn vehicle(&self) -> VehicleParams {
        VehicleParams::new(self.mass_kg, self.wheel_radius_m, self.gravity_mps2)
    }

    pub fn cascade_config(&self) -> CascadeConfig {
        CascadeConfig {
            vehicle: self.vehicle(),
            gamma: self.gamma,
            torque_decay: self.torque_decay,
            q_scale: self.q_scale,
            r_scale: self.r_scale,
            friction_noise_std: self.friction_noise_std,
            friction_measurement_variance: self.friction_measurement_variance,
            fallback_friction: self.fallback_friction,
        }
    }
}
