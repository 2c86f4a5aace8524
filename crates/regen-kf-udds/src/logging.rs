use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::LevelFilter;

/// Name of the append-only log kept in the output base directory
pub const LOG_FILE_NAME: &str = "simulation.log";

/// Writes everything to both sinks.
pub struct TeeWriter<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// Install the global logger: stderr, plus `<output_dir>/simulation.log`
/// when `output_dir` is given. `RUST_LOG` overrides the default level.
pub fn init(verbose: bool, output_dir: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    let default_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level).parse_default_env();

    let log_path = match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let path = dir.join(LOG_FILE_NAME);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(TeeWriter::new(io::stderr(), file))));
            Some(path)
        }
        None => None,
    };

    builder.try_init().context("logger already initialised")?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tee_writes_to_both_sinks() {
        let mut tee = TeeWriter::new(Vec::new(), Vec::new());
        writeln!(tee, "[INFO] velocity RMSE: 0.131 m/s").unwrap();
        tee.flush().unwrap();

        let (a, b) = tee.into_inner();
        assert_eq!(a, b"[INFO] velocity RMSE: 0.131 m/s\n");
        assert_eq!(a, b);
    }
}
