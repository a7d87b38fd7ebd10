// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-capture
//!
//! Records a sequence of operations submitted to a device command stream
//! into a replayable execution graph, and replays it on demand.
//!
//! Replaying a captured graph launches the whole sequence with one host
//! call instead of one submission per operation, which removes per-op
//! dispatch overhead for repetitive workloads.
//!
//! # Key Components
//!
//! - [`GraphCaptureManager`]: owns one default graph plus any number of
//!   graphs keyed by [`AnnotationId`], and drives the capture/replay
//!   lifecycle on a bound stream.
//! - [`CaptureConfig`]: skip sentinel, capture mode, and
//!   [`RecapturePolicy`].
//! - [`CaptureError`]: usage errors, the recoverable
//!   [`CaptureError::AnnotationNotFound`], and wrapped device failures.
//! - [`CaptureStats`]: capture/replay counters.
//!
//! # Lifecycle
//!
//! ```text
//! capture_begin(id) ── submit ops ── capture_end() ── replay(id) × N ── reset*()
//!        │                                 │
//!   drain stream                 instantiate, destroy compiled graph
//! ```
//!
//! The manager is generic over [`device_api::DeviceRuntime`], so it runs
//! unchanged on any backend implementing the primitives.

mod annotation;
mod config;
mod error;
mod manager;
mod stats;

pub use annotation::AnnotationId;
pub use config::{CaptureConfig, RecapturePolicy};
pub use error::CaptureError;
pub use manager::{CaptureOutcome, GraphCaptureManager};
pub use stats::CaptureStats;
