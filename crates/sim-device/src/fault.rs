// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! One-shot fault injection for exercising error paths.

use std::fmt;

/// A native primitive that can be made to fail once.
///
/// Armed with [`SimDevice::inject_fault`](crate::SimDevice::inject_fault);
/// each armed fault is consumed by the next call to the matching primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `synchronize` returns an error.
    Synchronize,
    /// `begin_capture` returns an error.
    BeginCapture,
    /// `end_capture` succeeds but reports no graph.
    EndCaptureNoGraph,
    /// `instantiate` returns an error.
    Instantiate,
    /// `launch` returns an error.
    Launch,
    /// The next `destroy_graph` or `destroy_exec` returns an error.
    Destroy,
}

impl Fault {
    pub(crate) fn op_name(self) -> &'static str {
        match self {
            Fault::Synchronize => "synchronize",
            Fault::BeginCapture => "begin_capture",
            Fault::EndCaptureNoGraph => "end_capture",
            Fault::Instantiate => "instantiate",
            Fault::Launch => "launch",
            Fault::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "injected {} fault", self.op_name())
    }
}
