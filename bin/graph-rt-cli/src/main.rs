// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-rt
//!
//! Command-line driver for execution graph capture and replay on the
//! simulated device.
//!
//! ## Usage
//! ```bash
//! # Warm up, capture, and replay a 64-op pipeline ten times
//! graph-rt run --ops 64 --runs 10
//!
//! # Same pipeline under annotation id 2, two warm-up runs
//! graph-rt run --ops 64 --runs 10 --annotation 2 --warmup 2
//!
//! # Compare eager dispatch with graph replay
//! graph-rt benchmark --ops 8,32,128 --runs 200
//!
//! # Print the effective configuration
//! graph-rt -c graph-rt.toml config
//! ```

mod commands;

use clap::{Parser, Subcommand};
use graph_capture::AnnotationId;

#[derive(Parser)]
#[command(
    name = "graph-rt",
    about = "Execution graph capture and replay on a simulated accelerator",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic elementwise pipeline through the executor.
    Run {
        /// Number of device operations in the pipeline.
        #[arg(
            long,
            default_value_t = 32,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        ops: usize,

        /// Number of inference calls.
        #[arg(short, long, default_value_t = 8)]
        runs: usize,

        /// Annotation id keying the captured graph (-1 skips capture).
        #[arg(short, long, allow_hyphen_values = true)]
        annotation: Option<AnnotationId>,

        /// Warm-up runs before capture (overrides the config file).
        #[arg(short, long)]
        warmup: Option<u32>,

        /// Disable graph capture.
        #[arg(long)]
        eager: bool,
    },

    /// Compare eager dispatch against graph replay.
    Benchmark {
        /// Comma-separated pipeline lengths (e.g., "8,32,128").
        #[arg(long, default_value = "8,32,128")]
        ops: String,

        /// Timed runs per configuration.
        #[arg(short, long, default_value_t = 100)]
        runs: usize,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            ops,
            runs,
            annotation,
            warmup,
            eager,
        } => {
            let opts = commands::run::RunOptions {
                ops,
                runs,
                annotation,
                warmup,
                eager,
                json: cli.json,
            };
            commands::run::execute(config, opts).await
        }
        Commands::Benchmark { ops, runs } => {
            commands::benchmark::execute(config, ops, runs, cli.json).await
        }
        Commands::Config => commands::config::execute(config),
    }
}
