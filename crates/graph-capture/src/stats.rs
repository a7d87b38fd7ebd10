// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Capture and replay counters.

use std::time::Duration;

/// Cumulative statistics for one capture manager.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CaptureStats {
    /// Default (unkeyed) graphs captured.
    pub default_captures: u64,
    /// Keyed graphs installed.
    pub keyed_captures: u64,
    /// Re-captures of an existing id whose new graph was discarded.
    pub duplicates_discarded: u64,
    /// Re-captures that replaced the existing graph.
    pub duplicates_replaced: u64,
    /// Sessions ended without installing a graph (closure failure or reset).
    pub aborted_sessions: u64,
    /// Replays of the default graph.
    pub default_replays: u64,
    /// Replays of keyed graphs.
    pub keyed_replays: u64,
    /// Keyed replays whose id was not found.
    pub replay_misses: u64,
    /// Executable graphs released by `reset`/`reset_keyed`.
    pub graphs_released: u64,
    /// Wall-clock time spent in replay (launch + drain).
    pub total_replay_duration: Duration,
}

impl CaptureStats {
    /// Total successful replays.
    pub fn total_replays(&self) -> u64 {
        self.default_replays + self.keyed_replays
    }

    /// Average wall-clock time per replay.
    pub fn mean_replay_duration(&self) -> Duration {
        match self.total_replays() {
            0 => Duration::ZERO,
            n => self.total_replay_duration / n as u32,
        }
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Graphs: {} default + {} keyed captured ({} discarded, {} replaced, \
             {} aborted), {} replays ({:.3}ms avg), {} misses, {} released",
            self.default_captures,
            self.keyed_captures,
            self.duplicates_discarded,
            self.duplicates_replaced,
            self.aborted_sessions,
            self.total_replays(),
            self.mean_replay_duration().as_secs_f64() * 1000.0,
            self.replay_misses,
            self.graphs_released,
        )
    }
}
