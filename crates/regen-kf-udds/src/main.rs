use std::path::PathBuf;

use clap::Parser;
use log::info;
use regen_kf::sim::DecelerationScenario;
use regen_kf_udds::config::RunConfig;
use regen_kf_udds::dataset::{load_prepared, preprocess_raw};
use regen_kf_udds::{logging, run_simulation};

#[derive(Debug, Parser)]
#[command(author, version, about = "Friction / velocity / torque estimation over a driving-cycle dataset")]
struct Cli {
    /// Preprocess the raw driving-cycle export
    #[arg(long)]
    preprocess: bool,

    /// Run the estimation cascade
    #[arg(long)]
    simulate: bool,

    /// Run on the built-in straight-line deceleration scenario instead of a dataset
    #[arg(long, conflicts_with = "simulate")]
    synthetic: bool,

    /// Prepared dataset (CSV)
    #[arg(long, default_value = "data/udds_data.csv")]
    dataset: PathBuf,

    /// Raw dataset export
    #[arg(long, default_value = "data/raw_udds_data.rtf")]
    raw_dataset: PathBuf,

    /// Where to write the prepared dataset
    #[arg(long, default_value = "data/udds_data.csv")]
    output_csv: PathBuf,

    /// Output base directory for run artefacts and simulation.log
    #[arg(long, default_value = "results")]
    output: PathBuf,

    /// TOML run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Robustness parameter for H-infinity filtering
    #[arg(long)]
    gamma: Option<f64>,

    /// Process noise scaling factor
    #[arg(long)]
    q_scale: Option<f64>,

    /// Measurement noise scaling factor
    #[arg(long)]
    r_scale: Option<f64>,

    /// Friction used when the dataset has no deceleration phase
    #[arg(long)]
    fallback_friction: Option<f64>,

    /// Random seed for the observed-friction noise
    #[arg(long)]
    seed: Option<u64>,

    /// Save plots to the run directory
    #[arg(long)]
    save_plots: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_dir = (cli.simulate || cli.synthetic).then_some(cli.output.as_path());
    if let Some(path) = logging::init(cli.verbose, log_dir)? {
        info!("logging to {}", path.display());
    }

    let mut cfg = match &cli.config {
        Some(path) => RunConfig::from_toml_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(v) = cli.gamma {
        cfg.gamma = v;
    }
    if let Some(v) = cli.q_scale {
        cfg.q_scale = v;
    }
    if let Some(v) = cli.r_scale {
        cfg.r_scale = v;
    }
    if let Some(v) = cli.fallback_friction {
        cfg.fallback_friction = Some(v);
    }
    if let Some(v) = cli.seed {
        cfg.seed = v;
    }
    cfg.validate()?;

    if !(cli.preprocess || cli.simulate || cli.synthetic) {
        anyhow::bail!("nothing to do: pass --preprocess, --simulate and/or --synthetic");
    }

    if cli.preprocess {
        let summary = preprocess_raw(&cli.raw_dataset, &cli.output_csv)?;
        println!(
            "Processed dataset saved to {} ({} rows)",
            summary.output.display(),
            summary.rows
        );
    }

    if cli.simulate || cli.synthetic {
        let (records, source) = if cli.synthetic {
            let scenario = DecelerationScenario {
                vehicle: cfg.vehicle(),
                ..Default::default()
            };
            (scenario.records(), "synthetic deceleration".to_string())
        } else {
            info!("loading dataset from {}", cli.dataset.display());
            let records = load_prepared(&cli.dataset, &cfg.vehicle())?;
            (records, cli.dataset.display().to_string())
        };

        let summary = run_simulation(&cfg, &records, &source, &cli.output, cli.save_plots)?;

        println!(
            "Simulation complete. Samples: {} | Initial mu: {:.3} | dt: {:.3} s",
            summary.samples, summary.initial_friction, summary.time_step_s
        );
        println!(
            "Velocity MAE: {:.3} m/s | RMSE: {:.3} m/s",
            summary.velocity.mae_mps, summary.velocity.rmse_mps
        );
        println!("Run directory: {}", summary.outputs.output_dir.display());
        println!("CSV: {}", summary.outputs.csv_path.display());
        println!("Summary: {}", summary.outputs.summary_path.display());
        if let Some(path) = &summary.outputs.plot_velocity_path {
            println!("Velocity plot: {}", path.display());
        }
        if let Some(path) = &summary.outputs.plot_friction_path {
            println!("Friction plot: {}", path.display());
        }
    }

    Ok(())
}
