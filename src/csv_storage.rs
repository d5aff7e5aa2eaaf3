//! CmdStan-style CSV output of posterior draws.
//!
//! Every chain is written to its own file `chain_{id}.csv` with the sampler
//! statistics first and the model parameters after them, so that tools
//! reading Stan output can load the draws.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::fit::{Posterior, PosteriorChain, PosteriorSample};
use crate::model::Parameter;

const STAT_COLUMNS: [&str; 4] = ["lp__", "stepsize__", "n_leapfrog__", "divergent__"];

/// Configuration for CSV output.
///
/// Files are named `chain_{id}.csv` where `{id}` is the chain number starting from 0.
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Directory where CSV files will be written
    output_dir: PathBuf,
    /// Number of decimal places for floating point values
    precision: usize,
    /// Whether to store warmup samples (default: false)
    store_warmup: bool,
}

impl CsvConfig {
    /// Create a new CSV configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mwc_induction::CsvConfig;
    /// let config = CsvConfig::new("mcmc_output").with_precision(8);
    /// ```
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            precision: 6,
            store_warmup: false,
        }
    }

    /// Set the precision (number of decimal places) for floating point values.
    ///
    /// Default is 6 decimal places.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Write warmup draws before the posterior draws.
    pub fn store_warmup(mut self, store: bool) -> Self {
        self.store_warmup = store;
        self
    }

    pub fn chain_path(&self, chain_id: u64) -> PathBuf {
        self.output_dir.join(format!("chain_{}.csv", chain_id))
    }
}

fn format_float(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Inf" } else { "-Inf" }.to_string()
    } else {
        format!("{:.prec$}", value, prec = precision)
    }
}

fn header() -> String {
    STAT_COLUMNS
        .iter()
        .copied()
        .chain(Parameter::ALL.iter().map(|param| param.name()))
        .collect::<Vec<_>>()
        .join(",")
}

fn sample_row(sample: &PosteriorSample, precision: usize) -> String {
    let mut row = vec![
        format_float(sample.lp, precision),
        format_float(sample.step_size, precision),
        sample.n_steps.to_string(),
        if sample.diverging { "1" } else { "0" }.to_string(),
    ];
    row.extend(
        Parameter::ALL
            .iter()
            .map(|&param| format_float(sample.params.get(param), precision)),
    );
    row.join(",")
}

fn write_chain(config: &CsvConfig, chain: &PosteriorChain) -> Result<PathBuf> {
    let file_path = config.chain_path(chain.chain_id);
    let file = File::create(&file_path)
        .with_context(|| format!("Failed to create CSV file: {:?}", file_path))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", header())?;
    let warmup: &[PosteriorSample] = if config.store_warmup {
        &chain.warmup[..]
    } else {
        &[]
    };
    for sample in warmup.iter().chain(chain.samples.iter()) {
        writeln!(writer, "{}", sample_row(sample, config.precision))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write CSV file: {:?}", file_path))?;
    Ok(file_path)
}

/// Write one CSV file per chain and return their paths.
pub fn write_posterior(config: &CsvConfig, posterior: &Posterior) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory: {:?}", config.output_dir)
    })?;

    let paths = posterior
        .chains()
        .iter()
        .map(|chain| write_chain(config, chain))
        .collect::<Result<Vec<_>>>()?;
    log::info!(
        "wrote {} chains to {}",
        paths.len(),
        config.output_dir.display()
    );
    Ok(paths)
}
