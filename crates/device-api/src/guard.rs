// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII owners for native graph resources.
//!
//! [`GraphGuard`] owns a compiled graph and [`ExecGuard`] owns an executable
//! graph. Both are move-only and hold an `Arc` back to the device so they
//! can release their handle on drop without a reference to whoever created
//! them. There is no way to copy the raw handle out, so a handle cannot be
//! launched after it has been destroyed.
//!
//! A failing destroy primitive is treated as fatal: the guard panics with
//! the device's message rather than leaking the resource.

use crate::{DeviceError, DeviceRuntime};
use std::fmt;
use std::sync::Arc;

/// Owns a compiled execution graph produced by ending a capture.
pub struct GraphGuard<D: DeviceRuntime> {
    /// Wrapped in `Option` so `drop()` can move it into the destroy call.
    raw: Option<D::Graph>,
    device: Arc<D>,
}

impl<D: DeviceRuntime> GraphGuard<D> {
    /// Takes ownership of a raw compiled graph.
    pub fn new(raw: D::Graph, device: Arc<D>) -> Self {
        Self {
            raw: Some(raw),
            device,
        }
    }

    /// Ends the capture on `stream` and wraps the resulting graph, if any.
    pub fn from_capture(device: &Arc<D>, stream: &D::Stream) -> Result<Option<Self>, DeviceError> {
        Ok(device
            .end_capture(stream)?
            .map(|raw| Self::new(raw, Arc::clone(device))))
    }

    /// Instantiates this graph into a launchable executable.
    ///
    /// The compiled graph stays owned by `self`; drop it once the
    /// executable exists.
    pub fn instantiate(&self) -> Result<ExecGuard<D>, DeviceError> {
        let exec = self.device.instantiate(self.raw())?;
        Ok(ExecGuard::new(exec, Arc::clone(&self.device)))
    }

    /// Borrow of the raw handle.
    pub fn raw(&self) -> &D::Graph {
        self.raw.as_ref().expect("graph already destroyed")
    }
}

impl<D: DeviceRuntime> Drop for GraphGuard<D> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            tracing::trace!(device = self.device.name(), "destroying compiled graph {raw:?}");
            if let Err(e) = self.device.destroy_graph(raw) {
                panic!(
                    "device '{}' failed to destroy a compiled graph: {e}",
                    self.device.name()
                );
            }
        }
    }
}

impl<D: DeviceRuntime> fmt::Debug for GraphGuard<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphGuard")
            .field("device", &self.device.name())
            .field("raw", &self.raw)
            .finish()
    }
}

/// Owns an instantiated, launchable execution graph.
pub struct ExecGuard<D: DeviceRuntime> {
    raw: Option<D::GraphExec>,
    device: Arc<D>,
}

impl<D: DeviceRuntime> ExecGuard<D> {
    /// Takes ownership of a raw executable graph.
    pub fn new(raw: D::GraphExec, device: Arc<D>) -> Self {
        Self {
            raw: Some(raw),
            device,
        }
    }

    /// Enqueues one launch on `stream`. Does not wait for completion.
    pub fn launch(&self, stream: &D::Stream) -> Result<(), DeviceError> {
        self.device.launch(self.raw(), stream)
    }

    /// Borrow of the raw handle.
    pub fn raw(&self) -> &D::GraphExec {
        self.raw.as_ref().expect("executable graph already destroyed")
    }
}

impl<D: DeviceRuntime> Drop for ExecGuard<D> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            tracing::trace!(device = self.device.name(), "destroying executable graph {raw:?}");
            if let Err(e) = self.device.destroy_exec(raw) {
                panic!(
                    "device '{}' failed to destroy an executable graph: {e}",
                    self.device.name()
                );
            }
        }
    }
}

impl<D: DeviceRuntime> fmt::Debug for ExecGuard<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecGuard")
            .field("device", &self.device.name())
            .field("raw", &self.raw)
            .finish()
    }
}
