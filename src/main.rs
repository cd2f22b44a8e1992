// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Command-line front end for the counting engine.
//!
//! Thin by design: flags map straight onto [`Counter`] calls and the exit
//! code mirrors the error kind (0 success, 1 invalid input, 2 internal,
//! 130 cancelled).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use latin_rectangles::count::{CountOptions, Counter, Mode};
use latin_rectangles::format::{format_table, group_digits};
use latin_rectangles::progress::TracingProgress;
use latin_rectangles::CountError;

#[derive(Parser, Debug)]
#[command(author, version, about = "Count normalized Latin rectangles by sign", long_about = None)]
struct Args {
    /// Number of rows r (2 <= r <= n). Omit to compute every r from 2 to n.
    #[arg(short, long)]
    rows: Option<usize>,

    /// Number of columns n.
    #[arg(short = 'n', long)]
    cols: usize,

    /// Number of worker threads (default: automatic).
    #[arg(short, long)]
    workers: Option<usize>,

    /// Backend selection.
    #[arg(short, long, value_enum, default_value = "auto")]
    mode: ModeArg,

    /// Disable the fused (n-1, n)/(n, n) sweep.
    #[arg(long)]
    no_fuse: bool,

    /// Directory for persisted derangement caches.
    #[arg(long)]
    cache_dir: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Auto,
    Single,
    Parallel,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Mode {
        match mode {
            ModeArg::Auto => Mode::Auto,
            ModeArg::Single => Mode::Single,
            ModeArg::Parallel => Mode::Parallel,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let counter = match &args.cache_dir {
        Some(dir) => Counter::with_cache_dir(dir),
        None => Counter::new(),
    }
    .with_progress(Arc::new(TracingProgress));

    let options = CountOptions {
        mode: args.mode.into(),
        workers: args.workers,
        fuse: !args.no_fuse,
    };

    let outcome = match args.rows {
        Some(r) => counter
            .count_with_options(r, args.cols, &options, None)
            .map(|result| vec![result]),
        None => counter.count_for_n(args.cols, &options),
    };

    match outcome {
        Ok(results) => {
            if results.len() == 1 {
                let result = &results[0];
                println!(
                    "{}  total {}  [{:.3}s]",
                    result,
                    group_digits(result.total()),
                    result.computation_time.as_secs_f64()
                );
            } else {
                print!("{}", format_table(&results));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            let label = match err {
                CountError::InvalidInput(_) => "invalid input",
                CountError::Cancelled { .. } => "cancelled",
                _ => "error",
            };
            eprintln!("{} {}", label.red().bold(), err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
