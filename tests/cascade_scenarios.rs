use approx::assert_relative_eq;
use nalgebra::{Matrix2, Vector2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use regen_kf::metrics::ErrorMetrics;
use regen_kf::robust::transition_matrix;
use regen_kf::sim::DecelerationScenario;
use regen_kf::{run_cascade, CascadeConfig, ParameterFilter, RobustFilterParams, RobustStateFilter};

#[test]
fn parameter_filter_reference_step() {
    let mut filter = ParameterFilter::new(0.8, 0.02, 0.05);
    filter.predict();
    let estimate = filter.update(0.8).unwrap();

    let p_pred = 0.01 + 0.0002;
    let k = p_pred / (p_pred + 0.05);
    assert_eq!(estimate, 0.8);
    assert_relative_eq!(filter.covariance(), (1.0 - k) * p_pred, epsilon = 1e-12);
    assert!(filter.covariance() < 0.01);
}

#[test]
fn robust_filter_reference_step() {
    let params = RobustFilterParams::new(1.0, 1500.0, 0.3, 0.1, 0.8, 0.95, 0.0, 0.0);
    let mut filter = RobustStateFilter::new(params);

    filter.predict(None);
    assert_eq!(filter.state_vector(), Vector2::zeros());

    let a = transition_matrix(0.8, &params);
    let p_pred = a * a.transpose() + Matrix2::from_diagonal(&Vector2::new(1e-4, 1e-4));
    let s = p_pred + Matrix2::from_diagonal(&Vector2::new(0.1, 0.1));
    let k = p_pred * s.try_inverse().unwrap();

    let z = Vector2::new(10.0, 5.0);
    let state = filter.update(&z).unwrap();
    let expected = k * z;
    assert_relative_eq!(state.velocity_mps, expected[0], epsilon = 1e-12);
    assert_relative_eq!(state.torque_nm, expected[1], epsilon = 1e-12);

    // adaptation disabled
    let (q, r) = filter.noise_covariances();
    assert_eq!(q, Matrix2::from_diagonal(&Vector2::new(1e-4, 1e-4)));
    assert_eq!(r, Matrix2::from_diagonal(&Vector2::new(0.1, 0.1)));
}

fn velocity_error(r_scale: f64) -> ErrorMetrics {
    let scenario = DecelerationScenario::default();
    let records = scenario.records();
    let config = CascadeConfig {
        gamma: 1.0,
        q_scale: 0.01,
        r_scale,
        friction_noise_std: 0.0,
        ..Default::default()
    };

    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let output = run_cascade(&records, &config, &mut rng).unwrap();
    assert_relative_eq!(output.initial_friction, scenario.implied_friction(), epsilon = 1e-12);

    let truth: Vec<f64> = records.iter().map(|r| r.velocity_mps).collect();
    ErrorMetrics::compute(&truth, &output.velocity_estimates())
}

#[test]
fn straight_line_deceleration_tracking_improves_with_smaller_noise_scale() {
    let coarse = velocity_error(0.01);
    let medium = velocity_error(0.001);
    let fine = velocity_error(0.0);

    assert!(coarse.rmse > medium.rmse);
    assert!(medium.rmse > fine.rmse);
    assert!(coarse.mae > medium.mae);
    assert!(medium.mae > fine.mae);
    assert!(fine.rmse < 0.5);
}

#[test]
fn noiseless_friction_stays_at_initial_value() {
    let records = DecelerationScenario::default().records();
    let config = CascadeConfig {
        friction_noise_std: 0.0,
        ..Default::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let output = run_cascade(&records, &config, &mut rng).unwrap();

    for mu in output.estimated_friction() {
        assert_relative_eq!(mu, output.initial_friction, epsilon = 1e-12);
    }
}

#[test]
fn noisy_friction_estimate_settles_near_initial_value() {
    let records = DecelerationScenario {
        steps: 2000,
        initial_speed_mps: 120.0,
        ..Default::default()
    }
    .records();
    let config = CascadeConfig {
        q_scale: 0.0,
        r_scale: 0.0,
        ..Default::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let output = run_cascade(&records, &config, &mut rng).unwrap();

    let tail = &output.estimated_friction()[1500..];
    let mean = tail.iter().sum::<f64>() / tail.len() as f64;
    assert!((mean - output.initial_friction).abs() < 0.02);
}
