//! Estimation cascade
//!
//! Drives the friction filter and the robust state filter in lock-step over
//! a buffered time series. Each step:
//!
//! 1. draw an observed friction around the initial friction,
//! 2. predict/update the friction filter,
//! 3. predict the state filter with the new friction, then update it with
//!    the measured `[velocity, torque]`.
//!
//! The noise source is an injected `rand::Rng`, so seeded runs are
//! reproducible.

use log::{debug, info, trace, warn};
use nalgebra::Vector2;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{EstimationError, FilterError};
use crate::metrics::population_variance;
use crate::parameter::ParameterFilter;
use crate::params::{CascadeConfig, VehicleParams};
use crate::robust::RobustStateFilter;
use crate::state::{StateEstimate, TimeSeriesRecord};

/// Growth factor of Q/R traces between two debug notes
const NOISE_GROWTH_NOTE_FACTOR: f64 = 10.0;

/// Result of one cascade step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEstimate {
    pub time_s: f64,
    pub observed_friction: f64,
    pub estimated_friction: f64,
    pub state: StateEstimate,
    /// trace(Q) of the state filter after the update
    pub process_noise_trace: f64,
    /// trace(R) of the state filter after the update
    pub measurement_noise_trace: f64,
}

/// Aligned per-step outputs of a full run
#[derive(Debug, Clone)]
pub struct CascadeOutput {
    pub initial_friction: f64,
    pub time_step: f64,
    pub steps: Vec<StepEstimate>,
}

impl CascadeOutput {
    pub fn estimated_friction(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.estimated_friction).collect()
    }

    pub fn estimated_states(&self) -> Vec<StateEstimate> {
        self.steps.iter().map(|s| s.state).collect()
    }

    pub fn velocity_estimates(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.state.velocity_mps).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Mean friction `(torque / r) / (m g)` over deceleration samples.
///
/// `None` when the series has no deceleration sample.
pub fn initial_friction(records: &[TimeSeriesRecord], vehicle: &VehicleParams) -> Option<f64> {
    let (sum, count) = records
        .iter()
        .filter(|r| r.is_deceleration())
        .map(|r| vehicle.friction_from_torque(r.torque_nm))
        .fold((0.0, 0usize), |(sum, count), mu| (sum + mu, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Mean of consecutive time differences.
pub fn mean_time_step(records: &[TimeSeriesRecord]) -> Result<f64, EstimationError> {
    if records.len() < 2 {
        return Err(EstimationError::SeriesTooShort {
            required: 2,
            got: records.len(),
        });
    }

    let mut total = 0.0;
    for (idx, pair) in records.windows(2).enumerate() {
        let dt = pair[1].time_s - pair[0].time_s;
        if !(dt > 0.0) {
            return Err(EstimationError::NonMonotonicTime { index: idx + 1 });
        }
        total += dt;
    }

    Ok(total / (records.len() - 1) as f64)
}

/// Parameter filter feeding the robust state filter, one sample at a time
#[derive(Debug, Clone)]
pub struct EstimationCascade {
    parameter: ParameterFilter,
    state: RobustStateFilter,
    initial_friction: f64,
    time_step: f64,
    friction_noise: Normal<f64>,
    last_noted_traces: (f64, f64),
}

impl EstimationCascade {
    /// Build both filters from the configuration and the series statistics.
    pub fn new(config: &CascadeConfig, records: &[TimeSeriesRecord]) -> Result<Self, EstimationError> {
        config.validate()?;
        if records.is_empty() {
            return Err(EstimationError::EmptySeries);
        }

        let time_step = mean_time_step(records)?;

        let initial_friction = match initial_friction(records, &config.vehicle) {
            Some(mu) => mu,
            None => match config.fallback_friction {
                Some(mu) => {
                    warn!("no deceleration samples in series; using fallback friction {mu:.3}");
                    mu
                }
                None => return Err(EstimationError::UndefinedInitialFriction),
            },
        };

        let accelerations: Vec<f64> = records.iter().map(|r| r.acceleration_mps2).collect();
        let parameter = ParameterFilter::new(
            initial_friction,
            population_variance(&accelerations),
            config.friction_measurement_variance,
        );

        let robust_params = config.robust_params(time_step, initial_friction);
        robust_params.validate()?;
        let state = RobustStateFilter::new(robust_params);

        let friction_noise = Normal::new(0.0, config.friction_noise_std)
            .map_err(|e| EstimationError::InvalidConfig(format!("friction noise: {e}")))?;

        info!("initial road friction estimate (mu): {initial_friction:.3}");
        info!("mean time step: {time_step:.4} s");

        let (q, r) = state.noise_covariances();
        Ok(Self {
            parameter,
            state,
            initial_friction,
            time_step,
            friction_noise,
            last_noted_traces: (q.trace(), r.trace()),
        })
    }

    /// Friction both filters were seeded with
    pub fn initial_friction(&self) -> f64 {
        self.initial_friction
    }

    /// Mean sample spacing used as the filter time step
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Friction filter
    pub fn parameter_filter(&self) -> &ParameterFilter {
        &self.parameter
    }

    /// Velocity/torque filter
    pub fn state_filter(&self) -> &RobustStateFilter {
        &self.state
    }

    /// Advance both filters by one sample.
    ///
    /// Both filters are committed together; if either fails, neither moves
    /// and the cascade can be stepped again.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        record: &TimeSeriesRecord,
        rng: &mut R,
    ) -> Result<StepEstimate, FilterError> {
        let observed_friction = self.initial_friction + self.friction_noise.sample(rng);

        let mut parameter = self.parameter.clone();
        parameter.predict();
        let estimated_friction = parameter.update(observed_friction)?;

        let mut state_filter = self.state.clone();
        state_filter.predict(Some(estimated_friction));
        let state = state_filter.update(&Vector2::new(record.velocity_mps, record.torque_nm))?;

        self.parameter = parameter;
        self.state = state_filter;

        let (q, r) = self.state.noise_covariances();
        let estimate = StepEstimate {
            time_s: record.time_s,
            observed_friction,
            estimated_friction,
            state,
            process_noise_trace: q.trace(),
            measurement_noise_trace: r.trace(),
        };
        self.note_noise_growth(&estimate);

        Ok(estimate)
    }

    fn note_noise_growth(&mut self, estimate: &StepEstimate) {
        let (q_noted, r_noted) = self.last_noted_traces;
        if estimate.process_noise_trace > q_noted * NOISE_GROWTH_NOTE_FACTOR
            || estimate.measurement_noise_trace > r_noted * NOISE_GROWTH_NOTE_FACTOR
        {
            debug!(
                "t={:.2}: noise covariances grew to trace(Q)={:.3e}, trace(R)={:.3e}",
                estimate.time_s, estimate.process_noise_trace, estimate.measurement_noise_trace
            );
            self.last_noted_traces = (estimate.process_noise_trace, estimate.measurement_noise_trace);
        }
    }

    /// Run the cascade over every record.
    pub fn run<R: Rng + ?Sized>(
        mut self,
        records: &[TimeSeriesRecord],
        rng: &mut R,
    ) -> Result<CascadeOutput, EstimationError> {
        let mut steps = Vec::with_capacity(records.len());

        for (step, record) in records.iter().enumerate() {
            let estimate = self
                .step(record, rng)
                .map_err(|source| EstimationError::Filter { step, source })?;

            trace!(
                "step {step}: observed mu {:.3}, estimated mu {:.3}, state [{:.3}, {:.3}]",
                estimate.observed_friction,
                estimate.estimated_friction,
                estimate.state.velocity_mps,
                estimate.state.torque_nm
            );
            steps.push(estimate);
        }

        Ok(CascadeOutput {
            initial_friction: self.initial_friction,
            time_step: self.time_step,
            steps,
        })
    }
}

/// Build a cascade for `records` and run it to completion.
pub fn run_cascade<R: Rng + ?Sized>(
    records: &[TimeSeriesRecord],
    config: &CascadeConfig,
    rng: &mut R,
) -> Result<CascadeOutput, EstimationError> {
    EstimationCascade::new(config, records)?.run(records, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::DecelerationScenario;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cruise(n: usize) -> Vec<TimeSeriesRecord> {
        let vehicle = VehicleParams::default();
        (0..n)
            .map(|i| TimeSeriesRecord::from_kinematics(i as f64, 15.0, 0.0, &vehicle))
            .collect()
    }

    #[test]
    fn test_initial_friction_uses_deceleration_only() {
        let vehicle = VehicleParams::default();
        let records = vec![
            TimeSeriesRecord::from_kinematics(0.0, 10.0, 1.0, &vehicle),
            TimeSeriesRecord::from_kinematics(1.0, 11.0, -0.981, &vehicle),
            TimeSeriesRecord::from_kinematics(2.0, 10.0, -2.943, &vehicle),
        ];
        let mu = initial_friction(&records, &vehicle).unwrap();
        assert_relative_eq!(mu, 0.2, epsilon = 1e-12);
        assert!(initial_friction(&cruise(5), &vehicle).is_none());
    }

    #[test]
    fn test_mean_time_step() {
        let vehicle = VehicleParams::default();
        let records: Vec<_> = [0.0, 0.1, 0.3, 0.4]
            .iter()
            .map(|&t| TimeSeriesRecord::from_kinematics(t, 1.0, -0.1, &vehicle))
            .collect();
        assert_relative_eq!(mean_time_step(&records).unwrap(), 0.4 / 3.0, epsilon = 1e-12);

        let err = mean_time_step(&records[..1]).unwrap_err();
        assert!(matches!(err, EstimationError::SeriesTooShort { required: 2, got: 1 }));
    }

    #[test]
    fn test_rejects_non_increasing_time() {
        let vehicle = VehicleParams::default();
        let records = vec![
            TimeSeriesRecord::from_kinematics(0.0, 5.0, -0.5, &vehicle),
            TimeSeriesRecord::from_kinematics(1.0, 4.5, -0.5, &vehicle),
            TimeSeriesRecord::from_kinematics(1.0, 4.0, -0.5, &vehicle),
        ];
        let err = mean_time_step(&records).unwrap_err();
        assert!(matches!(err, EstimationError::NonMonotonicTime { index: 2 }));
    }

    #[test]
    fn test_no_deceleration_without_fallback_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = run_cascade(&cruise(10), &CascadeConfig::default(), &mut rng).unwrap_err();
        assert!(matches!(err, EstimationError::UndefinedInitialFriction));
    }

    #[test]
    fn test_no_deceleration_with_fallback_runs() {
        let config = CascadeConfig {
            fallback_friction: Some(0.7),
            friction_noise_std: 0.0,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let output = run_cascade(&cruise(10), &config, &mut rng).unwrap();
        assert_eq!(output.initial_friction, 0.7);
        assert!(output.estimated_friction().iter().all(|&mu| mu == 0.7));
    }

    #[test]
    fn test_empty_series_is_rejected() {
        let err = EstimationCascade::new(&CascadeConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, EstimationError::EmptySeries));
    }

    #[test]
    fn test_outputs_are_aligned() {
        let records = DecelerationScenario::default().records();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let output = run_cascade(&records, &CascadeConfig::default(), &mut rng).unwrap();

        assert_eq!(output.len(), records.len());
        assert_eq!(output.estimated_friction().len(), records.len());
        assert_eq!(output.estimated_states().len(), records.len());
        for (step, record) in output.steps.iter().zip(records.iter()) {
            assert_eq!(step.time_s, record.time_s);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let records = DecelerationScenario::default().records();
        let config = CascadeConfig::default();

        let a = run_cascade(&records, &config, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        let b = run_cascade(&records, &config, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        assert_eq!(a.steps, b.steps);

        let c = run_cascade(&records, &config, &mut ChaCha8Rng::seed_from_u64(100)).unwrap();
        assert_ne!(a.estimated_friction(), c.estimated_friction());
    }

    #[test]
    fn test_filter_failure_carries_step_index() {
        let records = DecelerationScenario::default().records();
        let config = CascadeConfig {
            r_scale: f64::MAX,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = run_cascade(&records, &config, &mut rng).unwrap_err();
        match err {
            EstimationError::Filter { step, source } => {
                assert_eq!(step, 0);
                assert!(matches!(source, FilterError::NonFiniteInnovation { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_step_leaves_filters_untouched() {
        let records = DecelerationScenario::default().records();
        let config = CascadeConfig {
            r_scale: f64::MAX,
            ..Default::default()
        };
        let mut cascade = EstimationCascade::new(&config, &records).unwrap();
        let parameter = cascade.parameter_filter().clone();
        let state = cascade.state_filter().state_vector();
        let covariance = cascade.state_filter().covariance();

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(cascade.step(&records[0], &mut rng).is_err());
        assert_eq!(cascade.parameter_filter(), &parameter);
        assert_eq!(cascade.state_filter().state_vector(), state);
        assert_eq!(cascade.state_filter().covariance(), covariance);
    }
}
