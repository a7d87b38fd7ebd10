// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`DeviceRuntime`] trait.

use crate::{CaptureMode, DeviceError};
use std::fmt;

/// The native primitives a graph capture manager needs from a device.
///
/// Implementations wrap a vendor runtime (or a simulation of one). Handles
/// are plain associated types here; ownership of graphs and executables is
/// taken over by [`GraphGuard`](crate::GraphGuard) and
/// [`ExecGuard`](crate::ExecGuard), which call the destroy primitives on drop.
///
/// All methods take `&self`: devices synchronise internally and are shared
/// via `Arc`.
pub trait DeviceRuntime: Send + Sync + 'static {
    /// Non-owning, cloneable command-stream handle.
    type Stream: Clone + fmt::Debug + Send;
    /// A compiled (not yet instantiated) execution graph.
    type Graph: fmt::Debug + Send;
    /// An instantiated, launchable execution graph.
    type GraphExec: fmt::Debug + Send;

    /// Human-readable device name, used in diagnostics.
    fn name(&self) -> &str;

    /// Blocks until every operation queued on `stream` has completed.
    fn synchronize(&self, stream: &Self::Stream) -> Result<(), DeviceError>;

    /// Puts `stream` into capture mode: subsequent submissions are recorded
    /// instead of executed.
    fn begin_capture(&self, stream: &Self::Stream, mode: CaptureMode) -> Result<(), DeviceError>;

    /// Stops recording on `stream` and returns the compiled graph.
    ///
    /// `Ok(None)` means the device produced no graph (nothing was recorded
    /// or the capture was invalidated).
    fn end_capture(&self, stream: &Self::Stream) -> Result<Option<Self::Graph>, DeviceError>;

    /// Instantiates a compiled graph into a launchable executable.
    fn instantiate(&self, graph: &Self::Graph) -> Result<Self::GraphExec, DeviceError>;

    /// Enqueues one launch of `exec` on `stream`. Does not wait.
    fn launch(&self, exec: &Self::GraphExec, stream: &Self::Stream) -> Result<(), DeviceError>;

    /// Releases a compiled graph.
    fn destroy_graph(&self, graph: Self::Graph) -> Result<(), DeviceError>;

    /// Releases an executable graph.
    fn destroy_exec(&self, exec: Self::GraphExec) -> Result<(), DeviceError>;
}
