// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device operations: labelled host closures standing in for kernel launches
//! and memory copies.

use std::fmt;
use std::sync::Arc;

/// A single asynchronous device operation.
///
/// Cloning is cheap: the label and closure are reference-counted, so the same
/// operation can be recorded into a graph and launched many times.
#[derive(Clone)]
pub struct DeviceOp {
    label: Arc<str>,
    func: Arc<dyn Fn() + Send + Sync>,
}

impl DeviceOp {
    /// Creates an operation that runs `func` when the stream reaches it.
    pub fn new(label: impl Into<String>, func: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            label: Arc::from(label.into()),
            func: Arc::new(func),
        }
    }

    /// An operation that does nothing (useful for ordering tests).
    pub fn noop(label: impl Into<String>) -> Self {
        Self::new(label, || {})
    }

    /// The operation's label, as it appears in the execution trace.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn run(&self) {
        (self.func)()
    }
}

impl fmt::Debug for DeviceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceOp").field(&self.label).finish()
    }
}
