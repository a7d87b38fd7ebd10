// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The inference executor that decides, per run, whether to dispatch a
//! program's operations one by one or through a captured execution graph.
//!
//! The runtime takes:
//! - A [`DeviceRuntime`](device_api::DeviceRuntime) and a stream on it.
//! - A [`Program`] that enqueues one inference call's operations.
//! - A [`RuntimeConfig`] (capture switch, warm-up length, capture settings).
//!
//! And drives a [`graph_capture::GraphCaptureManager`] through warm-up,
//! capture, and replay, recording per-mode timing in [`ExecutorMetrics`].
//!
//! # Type-State Pipeline
//! ```text
//! GraphExecutor<D, Idle> → GraphExecutor<D, Ready>
//! ```
//! Running a program requires a bound stream; this is compile-time checked.

mod config;
mod error;
mod executor;
mod metrics;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use executor::{ExecutorState, GraphExecutor, Idle, Program, Ready};
pub use metrics::{ExecutorMetrics, ModeMetrics, RunMode, RunOutput};
