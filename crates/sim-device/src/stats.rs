// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Resource accounting for the simulated device.
//!
//! [`ResourceStats`] counts every native resource the device hands out and
//! takes back. A capture manager that leaks shows up here as
//! `graphs_created != graphs_destroyed` or `execs_created != execs_destroyed`.

/// Cumulative counters for device primitives.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResourceStats {
    /// Streams created.
    pub streams_created: u64,
    /// Capture sessions started.
    pub captures_begun: u64,
    /// Capture sessions ended (with or without a graph).
    pub captures_ended: u64,
    /// Capture sessions that ended without producing a graph.
    pub empty_captures: u64,
    /// Compiled graphs created by `end_capture`.
    pub graphs_created: u64,
    /// Compiled graphs released.
    pub graphs_destroyed: u64,
    /// Executable graphs created by `instantiate`.
    pub execs_created: u64,
    /// Executable graphs released.
    pub execs_destroyed: u64,
    /// Graph launches.
    pub launches: u64,
    /// Operations submitted directly to a stream.
    pub ops_submitted: u64,
    /// Operations intercepted into a capture.
    pub ops_recorded: u64,
    /// Operations actually executed by stream workers.
    pub ops_executed: u64,
    /// Completed `synchronize` calls.
    pub synchronizations: u64,
}

impl ResourceStats {
    /// Compiled graphs still alive.
    pub fn live_graphs(&self) -> u64 {
        self.graphs_created.saturating_sub(self.graphs_destroyed)
    }

    /// Executable graphs still alive.
    pub fn live_execs(&self) -> u64 {
        self.execs_created.saturating_sub(self.execs_destroyed)
    }

    /// Returns `true` if every created graph and executable was released.
    pub fn is_balanced(&self) -> bool {
        self.live_graphs() == 0 && self.live_execs() == 0
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Device: {} captures ({} empty), graphs {}/{} destroyed, \
             execs {}/{} destroyed, {} launches, {} ops executed \
             ({} submitted, {} recorded), {} syncs",
            self.captures_ended,
            self.empty_captures,
            self.graphs_destroyed,
            self.graphs_created,
            self.execs_destroyed,
            self.execs_created,
            self.launches,
            self.ops_executed,
            self.ops_submitted,
            self.ops_recorded,
            self.synchronizations,
        )
    }
}
