// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `graph-rt benchmark` command: eager dispatch vs graph replay.
//!
//! For each pipeline length, runs the same program through an executor with
//! capture disabled and one with capture enabled (after capture), and
//! prints a comparison table of mean wall time per run.

use super::pipeline::SyntheticPipeline;
use runtime::{GraphExecutor, RunMode, RuntimeConfig};
use sim_device::SimDevice;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, serde::Serialize)]
struct BenchResult {
    ops: usize,
    runs: usize,
    eager_ms: f64,
    replay_ms: f64,
    capture_ms: f64,
    speedup: f64,
}

pub async fn execute(
    config: RuntimeConfig,
    ops_str: String,
    runs: usize,
    json: bool,
) -> anyhow::Result<()> {
    let op_counts = parse_op_counts(&ops_str)?;
    if runs == 0 {
        anyhow::bail!("--runs must be at least 1");
    }

    if !json {
        super::banner("graph-rt · Benchmark Suite");
        println!("  Op counts: {op_counts:?}");
        println!("  Runs:      {runs}");
        println!();
    }

    let results = tokio::task::spawn_blocking(move || {
        op_counts
            .into_iter()
            .map(|ops| bench_one(&config, ops, runs))
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    // ── Results Table ──────────────────────────────────────────
    println!(
        "  {:>6} {:>12} {:>12} {:>12} {:>9}",
        "Ops", "Eager", "Replay", "Capture", "Speedup",
    );
    println!("  {}", "-".repeat(56));
    for r in &results {
        println!(
            "  {:>6} {:>10.3}ms {:>10.3}ms {:>10.3}ms {:>8.2}x",
            r.ops, r.eager_ms, r.replay_ms, r.capture_ms, r.speedup,
        );
    }
    println!();

    if let Some(best) = results
        .iter()
        .max_by(|a, b| a.speedup.total_cmp(&b.speedup))
    {
        println!("  Summary:");
        println!(
            "   Best speedup: {:.2}x at {} ops per run",
            best.speedup, best.ops
        );
        println!();
    }

    Ok(())
}

/// Times `runs` eager runs against `runs` replays of an `ops`-op pipeline.
fn bench_one(config: &RuntimeConfig, ops: usize, runs: usize) -> anyhow::Result<BenchResult> {
    let device = Arc::new(SimDevice::new());
    let pipeline = SyntheticPipeline::new(ops);

    let eager_config = RuntimeConfig {
        enable_graph_capture: false,
        ..config.clone()
    };
    let mut eager = GraphExecutor::new(Arc::clone(&device), eager_config)
        .bind(device.create_stream("eager")?);
    let eager_total = time_runs(runs, || {
        eager.run(&pipeline, None)?;
        Ok(())
    })?;

    let graph_config = RuntimeConfig {
        enable_graph_capture: true,
        warmup_runs: 0,
        ..config.clone()
    };
    let mut graphed = GraphExecutor::new(Arc::clone(&device), graph_config)
        .bind(device.create_stream("graph")?);
    let capture = graphed.run(&pipeline, None)?;
    anyhow::ensure!(
        capture.mode == RunMode::Capture,
        "expected a capture run, got {}",
        capture.mode
    );
    let replay_total = time_runs(runs, || {
        graphed.run(&pipeline, None)?;
        Ok(())
    })?;

    let eager_ms = mean_ms(eager_total, runs);
    let replay_ms = mean_ms(replay_total, runs);
    tracing::info!(ops, eager_ms, replay_ms, "benchmark point done");

    Ok(BenchResult {
        ops,
        runs,
        eager_ms,
        replay_ms,
        capture_ms: capture.elapsed.as_secs_f64() * 1000.0,
        speedup: if replay_ms > 0.0 { eager_ms / replay_ms } else { 0.0 },
    })
}

fn time_runs(runs: usize, mut f: impl FnMut() -> anyhow::Result<()>) -> anyhow::Result<Duration> {
    let start = Instant::now();
    for _ in 0..runs {
        f()?;
    }
    Ok(start.elapsed())
}

fn mean_ms(total: Duration, runs: usize) -> f64 {
    total.as_secs_f64() * 1000.0 / runs as f64
}

/// Parses a comma-separated list of pipeline lengths; each must be at least 1.
fn parse_op_counts(ops: &str) -> anyhow::Result<Vec<usize>> {
    ops.split(',')
        .map(|s| {
            let s = s.trim();
            match s.parse::<usize>() {
                Ok(0) => anyhow::bail!("op count must be at least 1"),
                Ok(n) => Ok(n),
                Err(e) => anyhow::bail!("invalid op count '{s}': {e}"),
            }
        })
        .collect()
}
