// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the graph executor.

use device_api::DeviceError;
use graph_capture::CaptureError;

/// Errors that can occur while executing a program.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The capture manager rejected an operation.
    #[error("graph capture error: {0}")]
    Capture(#[from] CaptureError),

    /// A device primitive failed outside of the capture manager.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// A program failed to enqueue its operations.
    #[error("program '{name}' failed: {detail}")]
    Program { name: String, detail: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl RuntimeError {
    /// Wraps a program-level failure.
    pub fn program(name: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        RuntimeError::Program {
            name: name.into(),
            detail: detail.to_string(),
        }
    }
}
