// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types reported by device runtimes.

use crate::CaptureMode;

/// Errors that a [`DeviceRuntime`](crate::DeviceRuntime) primitive can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The stream is already recording a capture session.
    #[error("stream '{stream}' is already capturing")]
    CaptureInProgress { stream: String },

    /// Another active capture forbids starting a new one under the
    /// requested capture mode.
    #[error(
        "cannot begin capture on stream '{stream}': stream '{active_stream}' \
         is capturing in {mode} mode"
    )]
    CaptureConflict {
        stream: String,
        active_stream: String,
        mode: CaptureMode,
    },

    /// `end_capture` was called on a stream that is not capturing.
    #[error("stream '{stream}' is not capturing")]
    NotCapturing { stream: String },

    /// The stream's execution context failed (e.g. an operation panicked).
    #[error("stream '{stream}' faulted: {detail}")]
    StreamFault { stream: String, detail: String },

    /// A graph or executable handle was not recognised by the device.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// A native primitive reported a failure.
    #[error("{op} failed: {detail}")]
    Native { op: &'static str, detail: String },

    /// A capture mode string could not be parsed.
    #[error("unknown capture mode '{0}'; expected 'global', 'thread-local', or 'relaxed'")]
    UnknownCaptureMode(String),
}
