// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `graph-rt run` command: drive the synthetic pipeline through the executor.
//!
//! Demonstrates the full dispatch policy:
//! ```text
//! warm-up (eager) → capture + replay → replay → replay …
//! ```

use super::pipeline::SyntheticPipeline;
use graph_capture::{AnnotationId, CaptureStats};
use runtime::{ExecutorMetrics, GraphExecutor, RunOutput, RuntimeConfig};
use sim_device::{ResourceStats, SimDevice};
use std::sync::Arc;

/// Options for a single `run` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub ops: usize,
    pub runs: usize,
    pub annotation: Option<AnnotationId>,
    pub warmup: Option<u32>,
    pub eager: bool,
    pub json: bool,
}

#[derive(Debug, serde::Serialize)]
struct RunReport {
    ops: usize,
    annotation: Option<AnnotationId>,
    runs: Vec<RunOutput>,
    checksum: f64,
    metrics: ExecutorMetrics,
    capture: CaptureStats,
    device: ResourceStats,
}

pub async fn execute(mut config: RuntimeConfig, opts: RunOptions) -> anyhow::Result<()> {
    if let Some(warmup) = opts.warmup {
        config.warmup_runs = warmup;
    }
    if opts.eager {
        config.enable_graph_capture = false;
    }

    if !opts.json {
        super::banner("graph-rt · Pipeline Runner");
        println!("  Config:");
        println!("   Ops:        {}", opts.ops);
        println!("   Runs:       {}", opts.runs);
        println!(
            "   Annotation: {}",
            opts.annotation
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".into())
        );
        println!("   Capture:    {}", config.enable_graph_capture);
        println!("   Warm-up:    {}", config.warmup_runs);
        println!("   Mode:       {}", config.capture.capture_mode);
        println!();
    }

    let json = opts.json;
    // Device work blocks on stream drains; keep it off the async workers.
    let report = tokio::task::spawn_blocking(move || simulate(config, &opts)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("  Runs:");
    for (i, run) in report.runs.iter().enumerate() {
        println!(
            "   #{:<4} {:<9} {:>9.3}ms",
            i,
            run.mode.as_str(),
            run.elapsed.as_secs_f64() * 1000.0
        );
    }
    println!();
    println!("  Results:");
    println!("   Checksum: {:.3}", report.checksum);
    println!();
    println!("  Metrics:");
    println!("   {}", report.metrics.summary());
    println!("   {}", report.capture.summary());
    println!("   {}", report.device.summary());
    println!();

    Ok(())
}

/// Runs the pipeline `opts.runs` times on a fresh simulated device.
fn simulate(config: RuntimeConfig, opts: &RunOptions) -> anyhow::Result<RunReport> {
    let device = Arc::new(SimDevice::new());
    let stream = device.create_stream(config.stream_label.clone())?;
    let pipeline = SyntheticPipeline::new(opts.ops);

    let mut executor = GraphExecutor::new(Arc::clone(&device), config).bind(stream);

    let mut runs = Vec::with_capacity(opts.runs);
    for _ in 0..opts.runs {
        runs.push(executor.run(&pipeline, opts.annotation)?);
    }

    let report = RunReport {
        ops: pipeline.num_ops(),
        annotation: opts.annotation,
        runs,
        checksum: pipeline.checksum(),
        metrics: executor.metrics().clone(),
        capture: executor.graphs().stats().clone(),
        device: device.stats(),
    };
    drop(executor);
    tracing::debug!("after teardown: {}", device.stats().summary());

    Ok(report)
}
