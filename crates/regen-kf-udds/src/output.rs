use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use plotters::prelude::*;
use serde::Serialize;

use crate::config::RunConfig;

#[derive(Debug, Clone, Serialize)]
pub struct EstimateRecord {
    pub time_s: f64,
    pub true_velocity_mps: f64,
    pub est_velocity_mps: f64,
    pub true_torque_nm: f64,
    pub est_torque_nm: f64,
    pub observed_friction: f64,
    pub est_friction: f64,
    pub process_noise_trace: f64,
    pub measurement_noise_trace: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VelocityMetrics {
    pub mae_mps: f64,
    pub rmse_mps: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub config: RunConfig,
    pub source: String,
    pub samples: usize,
    pub initial_friction: f64,
    pub time_step_s: f64,
    pub final_friction: f64,
    pub velocity: VelocityMetrics,
    pub final_process_noise_trace: f64,
    pub final_measurement_noise_trace: f64,
    pub outputs: OutputFiles,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFiles {
    pub output_dir: PathBuf,
    pub csv_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_velocity_path: Option<PathBuf>,
    pub plot_friction_path: Option<PathBuf>,
}

impl OutputFiles {
    pub fn in_dir(output_dir: &Path, save_plots: bool) -> Self {
        let plot = |name: &str| save_plots.then(|| output_dir.join(name));
        Self {
            output_dir: output_dir.to_path_buf(),
            csv_path: output_dir.join("estimates.csv"),
            summary_path: output_dir.join("summary.json"),
            plot_velocity_path: plot("velocity_estimation.png"),
            plot_friction_path: plot("road_friction_estimation.png"),
        }
    }
}

pub fn write_csv(path: &Path, records: &[EstimateRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open CSV path {}", path.display()))?;

    for record in records {
        writer.serialize(record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &Summary) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(summary)?;
    fs::write(path, data).with_context(|| format!("failed to write summary {}", path.display()))?;
    Ok(())
}

pub fn make_plots(records: &[EstimateRecord], initial_friction: f64, files: &OutputFiles) -> anyhow::Result<()> {
    if let Some(path) = &files.plot_velocity_path {
        plot_velocity(records, path)?;
    }
    if let Some(path) = &files.plot_friction_path {
        plot_friction(records, initial_friction, path)?;
    }
    Ok(())
}

fn finite_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-3);
    (lo - pad, hi + pad)
}

fn time_range(records: &[EstimateRecord]) -> (f64, f64) {
    let start = records.first().map(|r| r.time_s).unwrap_or(0.0);
    let end = records.last().map(|r| r.time_s).unwrap_or(1.0);
    if end > start {
        (start, end)
    } else {
        (start, start + 1.0)
    }
}

fn plot_velocity(records: &[EstimateRecord], path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let (t0, t1) = time_range(records);
    let (v_lo, v_hi) = finite_range(
        records
            .iter()
            .flat_map(|r| [r.true_velocity_mps, r.est_velocity_mps]),
    );

    let mut chart = ChartBuilder::on(&root)
        .caption("True vs Estimated Velocity Over Time", ("sans-serif", 30).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(t0..t1, v_lo..v_hi)?;

    chart
        .configure_mesh()
        .x_desc("Time [s]")
        .y_desc("Velocity [m/s]")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            records.iter().map(|r| (r.time_s, r.true_velocity_mps)),
            &BLUE,
        ))?
        .label("True Velocity")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], BLUE.stroke_width(3)));

    let orange = RGBColor(255, 140, 0);
    chart
        .draw_series(LineSeries::new(
            records.iter().map(|r| (r.time_s, r.est_velocity_mps)),
            &orange,
        ))?
        .label("Estimated Velocity")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], orange.stroke_width(3)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.7))
        .draw()?;

    root.present()?;
    Ok(())
}

fn plot_friction(records: &[EstimateRecord], initial_friction: f64, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let (t0, t1) = time_range(records);
    let (mu_lo, mu_hi) = finite_range(
        records
            .iter()
            .map(|r| r.est_friction)
            .chain(std::iter::once(initial_friction)),
    );

    let mut chart = ChartBuilder::on(&root)
        .caption("Road Friction Estimation Over Time", ("sans-serif", 30).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(t0..t1, mu_lo..mu_hi)?;

    chart
        .configure_mesh()
        .x_desc("Time [s]")
        .y_desc("Road Friction (mu)")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            records.iter().map(|r| (r.time_s, r.est_friction)),
            &BLUE,
        ))?
        .label("Estimated Road Friction (mu)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], BLUE.stroke_width(3)));

    chart
        .draw_series(LineSeries::new(
            [(t0, initial_friction), (t1, initial_friction)],
            RED.stroke_width(2),
        ))?
        .label("True Initial Friction")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], RED.stroke_width(3)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.7))
        .draw()?;

    root.present()?;
    Ok(())
}
