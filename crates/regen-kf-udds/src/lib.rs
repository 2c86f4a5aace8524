//! Driving-cycle front end for the `regen-kf` estimation cascade.
//!
//! Prepares UDDS-style datasets, runs the friction/velocity/torque cascade
//! over them and writes estimates, a JSON summary and optional plots.

pub mod config;
pub mod dataset;
pub mod logging;
pub mod output;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use regen_kf::metrics::ErrorMetrics;
use regen_kf::{run_cascade, CascadeOutput, TimeSeriesRecord};

use crate::config::RunConfig;
use crate::output::{make_plots, write_csv, write_summary, EstimateRecord, OutputFiles, Summary, VelocityMetrics};

/// Run the cascade over `records` and write all artefacts into a fresh run
/// directory under `output_base_dir`.
pub fn run_simulation(
    cfg: &RunConfig,
    records: &[TimeSeriesRecord],
    source: &str,
    output_base_dir: &Path,
    save_plots: bool,
) -> anyhow::Result<Summary> {
    cfg.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let cascade = run_cascade(records, &cfg.cascade_config(), &mut rng)
        .with_context(|| format!("estimation cascade failed on {source}"))?;

    let estimates = estimate_records(records, &cascade);
    let truth: Vec<f64> = records.iter().map(|r| r.velocity_mps).collect();
    let metrics = ErrorMetrics::compute(&truth, &cascade.velocity_estimates());
    info!("velocity MAE: {:.3} m/s", metrics.mae);
    info!("velocity RMSE: {:.3} m/s", metrics.rmse);

    let output_dir = create_timestamped_run_dir(output_base_dir)?;
    let files = OutputFiles::in_dir(&output_dir, save_plots);

    let last = cascade.steps.last();
    let summary = Summary {
        config: cfg.clone(),
        source: source.to_string(),
        samples: cascade.len(),
        initial_friction: cascade.initial_friction,
        time_step_s: cascade.time_step,
        final_friction: last.map(|s| s.estimated_friction).unwrap_or(cascade.initial_friction),
        velocity: VelocityMetrics {
            mae_mps: metrics.mae,
            rmse_mps: metrics.rmse,
        },
        final_process_noise_trace: last.map(|s| s.process_noise_trace).unwrap_or(0.0),
        final_measurement_noise_trace: last.map(|s| s.measurement_noise_trace).unwrap_or(0.0),
        outputs: files.clone(),
    };

    write_csv(&files.csv_path, &estimates)?;
    write_summary(&files.summary_path, &summary)?;
    make_plots(&estimates, cascade.initial_friction, &files)?;

    info!("estimates written to {}", files.csv_path.display());
    Ok(summary)
}

fn estimate_records(records: &[TimeSeriesRecord], cascade: &CascadeOutput) -> Vec<EstimateRecord> {
    records
        .iter()
        .zip(cascade.steps.iter())
        .map(|(record, step)| EstimateRecord {
            time_s: record.time_s,
            true_velocity_mps: record.velocity_mps,
            est_velocity_mps: step.state.velocity_mps,
            true_torque_nm: record.torque_nm,
            est_torque_nm: step.state.torque_nm,
            observed_friction: step.observed_friction,
            est_friction: step.estimated_friction,
            process_noise_trace: step.process_noise_trace,
            measurement_noise_trace: step.measurement_noise_trace,
        })
        .collect()
}

pub fn create_timestamped_run_dir(base_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(base_dir)
        .with_context(|| format!("failed to create output base directory {}", base_dir.display()))?;

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let run_dir = base_dir.join(&timestamp);
    if !run_dir.exists() {
        fs::create_dir_all(&run_dir)?;
        return Ok(run_dir);
    }

    let mut counter: usize = 1;
    loop {
        let candidate = base_dir.join(format!("{timestamp}-{counter:02}"));
        if !candidate.exists() {
            fs::create_dir_all(&candidate)?;
            return Ok(candidate);
        }
        counter += 1;
    }
}
