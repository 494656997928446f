use std::{fmt, io};
use std::fmt::Formatter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use clap::Parser;

mod benchmark;
mod dataset;
mod engine;
mod model;
mod report;
mod timing;

use crate::benchmark::benchmark::{run, BenchError};
use crate::engine::engine::RabinEngine;
use crate::model::model::{BenchSettings, DEFAULT_BUFFER_SIZE, DEFAULT_POLYNOMIAL, DEFAULT_RUNS};
use crate::report::report::{Reporter, TextReporter};

/// Times content-defined chunking of sample files with and without the
/// accelerated boundary hash.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    /// Path to the dataset folder. Only `*.bin` files directly inside it are used.
    #[clap(long, value_name = "DIR", default_value = "dataset")]
    dataset: PathBuf,

    /// Timed repetitions per file and configuration.
    #[clap(short = 'n', long, default_value_t = DEFAULT_RUNS, value_parser = clap::value_parser!(u32).range(1..))]
    runs: u32,

    /// Untimed drains per file before the timed repetitions.
    #[clap(long, default_value_t = 0)]
    warmup: u32,

    /// Size in bytes of the buffer each chunk is pulled into. Must hold the
    /// largest chunk (8 MiB).
    #[clap(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Splitting polynomial, in hex.
    #[clap(long, value_name = "HEX", default_value_t = Hex(DEFAULT_POLYNOMIAL))]
    polynomial: Hex,
}

/// `u64` read and shown in hex, with or without a `0x` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hex(u64);

impl FromStr for Hex {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
        u64::from_str_radix(digits, 16)
            .map(Hex)
            .map_err(|e| format!("invalid polynomial '{}': {}", value, e))
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let settings = BenchSettings {
        dataset: cli.dataset,
        runs: cli.runs,
        warmup: cli.warmup,
        buffer_size: cli.buffer_size,
        polynomial: cli.polynomial.0,
    };

    let mut reporter = TextReporter::new(io::stdout().lock());
    match run(&RabinEngine, &settings, &mut reporter) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            reporter.failed(&err);
            if let BenchError::Runtime { completed, .. } = &err {
                reporter.partial_results(completed);
            }
            ExitCode::from(err.exit_code())
        }
    }
}

#[cfg(test)]
mod cli_tests {
    use clap::Parser;
    use crate::{Cli, Hex};
    use crate::model::model::DEFAULT_POLYNOMIAL;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["cdc-bench"]);
        assert_eq!(cli.dataset.to_str(), Some("dataset"));
        assert_eq!(cli.runs, 10);
        assert_eq!(cli.warmup, 0);
        assert_eq!(cli.buffer_size, 8 * 1024 * 1024);
        assert_eq!(cli.polynomial, Hex(DEFAULT_POLYNOMIAL));
        assert_eq!(cli.polynomial, Hex(0x3DA3358B4DC173));
    }

    #[test]
    fn zero_runs_rejected() {
        assert!(Cli::try_parse_from(["cdc-bench", "--runs", "0"]).is_err());
    }

    #[test]
    fn polynomial_parsing() {
        assert_eq!("0x3DA3358B4DC173".parse::<Hex>(), Ok(Hex(0x3DA3358B4DC173)));
        assert_eq!("3da3358b4dc173".parse::<Hex>(), Ok(Hex(0x3DA3358B4DC173)));
        assert!("xyz".parse::<Hex>().is_err());
        assert_eq!(Hex(DEFAULT_POLYNOMIAL).to_string(), "0x3da3358b4dc173");
    }

    #[test]
    fn polynomial_flag_is_hex() {
        let cli = Cli::parse_from(["cdc-bench", "--polynomial", "0x11d"]);
        assert_eq!(cli.polynomial, Hex(0x11d));
    }
}
