//! Regenerative-braking estimation cascade
//!
//! Estimates vehicle velocity, regenerative-braking torque and the road
//! friction coefficient from a driving-cycle time series. A scalar
//! parameter filter tracks friction and hands its estimate, step by step,
//! to a two-state robust (H-infinity style) filter over velocity and torque.

pub mod cascade;
pub mod error;
pub mod metrics;
pub mod parameter;
pub mod params;
pub mod robust;
pub mod sim;
pub mod state;

// Re-export main types
pub use cascade::{run_cascade, CascadeOutput, EstimationCascade, StepEstimate};
pub use error::{EstimationError, FilterError};
pub use parameter::ParameterFilter;
pub use params::{CascadeConfig, RobustFilterParams, VehicleParams};
pub use robust::RobustStateFilter;
pub use state::{StateEstimate, TimeSeriesRecord};
