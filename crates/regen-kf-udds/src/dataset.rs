//! Driving-cycle dataset preparation
//!
//! Raw export → prepared CSV (`Speed_mps`, `Acceleration_mps2` appended) →
//! `TimeSeriesRecord`s with derived regenerative torque.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use regen_kf::{TimeSeriesRecord, VehicleParams};
use serde::Deserialize;
use thiserror::Error;

pub const TIME_COLUMN: &str = "Test Time";
pub const TARGET_SPEED_COLUMN: &str = "Target Speed";
pub const SPEED_COLUMN: &str = "Speed_mps";
pub const ACCELERATION_COLUMN: &str = "Acceleration_mps2";

/// mph → m/s
pub const MPH_TO_MPS: f64 = 0.44704;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{path}: no comma-delimited header row found")]
    MissingHeader { path: PathBuf },
    #[error("{path}: required column {column:?} is missing")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("row {row}: column {column:?} has non-numeric value {value:?}")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("row {row}: \"Test Time\" must be strictly increasing")]
    NonIncreasingTime { row: usize },
    #[error("{path}: dataset has no data rows")]
    Empty { path: PathBuf },
}

/// Outcome of a preprocessing pass
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessSummary {
    pub rows: usize,
    pub output: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PreparedRow {
    #[serde(rename = "Test Time")]
    time_s: f64,
    #[serde(rename = "Speed_mps")]
    speed_mps: f64,
    #[serde(rename = "Acceleration_mps2")]
    acceleration_mps2: f64,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DatasetError + '_ {
    move |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Keep comma-delimited lines only, dropping RTF line continuations.
fn data_lines(raw: &str) -> Vec<&str> {
    raw.lines()
        .filter(|line| line.contains(','))
        .map(|line| line.trim().trim_end_matches('\\').trim_end())
        .collect()
}

fn column_index(
    headers: &csv::StringRecord,
    column: &'static str,
    path: &Path,
) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| DatasetError::MissingColumn {
            path: path.to_path_buf(),
            column,
        })
}

fn parse_number(value: &str, row: usize, column: &'static str) -> Result<f64, DatasetError> {
    value
        .parse::<f64>()
        .map_err(|_| DatasetError::InvalidNumber {
            row,
            column,
            value: value.to_string(),
        })
}

/// Forward differences of `values` over `times`, first entry 0.
pub fn finite_difference(times: &[f64], values: &[f64]) -> Result<Vec<f64>, DatasetError> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return Ok(out);
    }
    out.push(0.0);
    for idx in 1..values.len() {
        let dt = times[idx] - times[idx - 1];
        if !(dt > 0.0) {
            return Err(DatasetError::NonIncreasingTime { row: idx + 1 });
        }
        out.push((values[idx] - values[idx - 1]) / dt);
    }
    Ok(out)
}

/// Convert a raw driving-cycle export into the prepared CSV layout.
pub fn preprocess_raw(input: &Path, output: &Path) -> Result<PreprocessSummary, DatasetError> {
    let raw = fs::read_to_string(input).map_err(io_error(input))?;
    let lines = data_lines(&raw);
    if lines.is_empty() {
        return Err(DatasetError::MissingHeader {
            path: input.to_path_buf(),
        });
    }

    let joined = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(joined.as_bytes());

    let headers = reader.headers()?.clone();
    let time_idx = column_index(&headers, TIME_COLUMN, input)?;
    let speed_idx = column_index(&headers, TARGET_SPEED_COLUMN, input)?;

    let mut rows = Vec::new();
    let mut times = Vec::new();
    let mut speeds = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        let field = |i: usize| record.get(i).unwrap_or_default();
        times.push(parse_number(field(time_idx), row, TIME_COLUMN)?);
        speeds.push(parse_number(field(speed_idx), row, TARGET_SPEED_COLUMN)? * MPH_TO_MPS);
        rows.push(record);
    }

    if rows.is_empty() {
        return Err(DatasetError::Empty {
            path: input.to_path_buf(),
        });
    }

    let accelerations = finite_difference(&times, &speeds)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut writer = csv::Writer::from_path(output)?;

    let mut header: Vec<&str> = headers.iter().collect();
    header.push(SPEED_COLUMN);
    header.push(ACCELERATION_COLUMN);
    writer.write_record(&header)?;

    for ((record, speed), accel) in rows.iter().zip(&speeds).zip(&accelerations) {
        let mut out: Vec<String> = record.iter().map(str::to_string).collect();
        out.push(speed.to_string());
        out.push(accel.to_string());
        writer.write_record(&out)?;
    }
    writer.flush().map_err(io_error(output))?;

    info!("processed {} rows from {} into {}", rows.len(), input.display(), output.display());

    Ok(PreprocessSummary {
        rows: rows.len(),
        output: output.to_path_buf(),
    })
}

/// Load a prepared dataset and derive torque from acceleration.
pub fn load_prepared(path: &Path, vehicle: &VehicleParams) -> Result<Vec<TimeSeriesRecord>, DatasetError> {
    let file = fs::File::open(path).map_err(io_error(path))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    for column in [TIME_COLUMN, SPEED_COLUMN, ACCELERATION_COLUMN] {
        column_index(&headers, column, path)?;
    }

    let mut records = Vec::new();
    for row in reader.deserialize::<PreparedRow>() {
        let row = row?;
        records.push(TimeSeriesRecord::from_kinematics(
            row.time_s,
            row.speed_mps,
            row.acceleration_mps2,
            vehicle,
        ));
    }

    if records.is_empty() {
        return Err(DatasetError::Empty {
            path: path.to_path_buf(),
        });
    }

    info!("loaded {} samples from {}", records.len(), path.display());
    Ok(records)
}
