// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Executor metrics.
//!
//! [`ExecutorMetrics`] counts runs per [`RunMode`] and accumulates their
//! wall-clock time, which is what the eager-vs-replay comparison needs.

use std::fmt;
use std::time::Duration;

/// How a single run was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Capture disabled or skip sentinel: operations submitted one by one.
    Eager,
    /// Eager run counted towards the warm-up threshold.
    Warmup,
    /// The program was recorded into a graph, then the graph replayed once.
    Capture,
    /// A previously captured graph was replayed.
    Replay,
    /// Replay missed (no graph for the id); dispatched eagerly instead.
    Fallback,
}

impl RunMode {
    pub const ALL: [RunMode; 5] = [
        RunMode::Eager,
        RunMode::Warmup,
        RunMode::Capture,
        RunMode::Replay,
        RunMode::Fallback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Eager => "eager",
            RunMode::Warmup => "warmup",
            RunMode::Capture => "capture",
            RunMode::Replay => "replay",
            RunMode::Fallback => "fallback",
        }
    }

    /// Returns `true` if the program's operations were submitted
    /// individually.
    pub fn is_eager(self) -> bool {
        matches!(self, RunMode::Eager | RunMode::Warmup | RunMode::Fallback)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a single run.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RunOutput {
    /// How the run was dispatched.
    pub mode: RunMode,
    /// Wall-clock time including the final stream drain.
    pub elapsed: Duration,
}

/// Count and accumulated time for one run mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ModeMetrics {
    pub runs: u64,
    pub total_duration: Duration,
}

impl ModeMetrics {
    /// Mean wall-clock time per run, zero if no runs were recorded.
    pub fn mean_duration(&self) -> Duration {
        if self.runs == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.runs as u32
    }
}

/// Aggregate metrics across all runs of an executor.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorMetrics {
    pub eager: ModeMetrics,
    pub warmup: ModeMetrics,
    pub capture: ModeMetrics,
    pub replay: ModeMetrics,
    pub fallback: ModeMetrics,
}

impl ExecutorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed run.
    pub fn record(&mut self, output: &RunOutput) {
        let m = match output.mode {
            RunMode::Eager => &mut self.eager,
            RunMode::Warmup => &mut self.warmup,
            RunMode::Capture => &mut self.capture,
            RunMode::Replay => &mut self.replay,
            RunMode::Fallback => &mut self.fallback,
        };
        m.runs += 1;
        m.total_duration += output.elapsed;
    }

    /// Metrics for a single mode.
    pub fn mode(&self, mode: RunMode) -> ModeMetrics {
        match mode {
            RunMode::Eager => self.eager,
            RunMode::Warmup => self.warmup,
            RunMode::Capture => self.capture,
            RunMode::Replay => self.replay,
            RunMode::Fallback => self.fallback,
        }
    }

    /// Number of runs in `mode`.
    pub fn runs(&self, mode: RunMode) -> u64 {
        self.mode(mode).runs
    }

    pub fn total_runs(&self) -> u64 {
        RunMode::ALL.iter().map(|&mode| self.runs(mode)).sum()
    }

    pub fn total_duration(&self) -> Duration {
        RunMode::ALL
            .iter()
            .map(|&mode| self.mode(mode).total_duration)
            .sum()
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let per_mode: Vec<String> = RunMode::ALL
            .iter()
            .filter(|&&mode| self.runs(mode) > 0)
            .map(|&mode| {
                let m = self.mode(mode);
                format!(
                    "{} {mode} ({:.3}ms avg)",
                    m.runs,
                    m.mean_duration().as_secs_f64() * 1000.0
                )
            })
            .collect();

        format!(
            "Executor: {} runs in {:.2}ms [{}]",
            self.total_runs(),
            self.total_duration().as_secs_f64() * 1000.0,
            if per_mode.is_empty() {
                "none".to_string()
            } else {
                per_mode.join(", ")
            }
        )
    }
}
