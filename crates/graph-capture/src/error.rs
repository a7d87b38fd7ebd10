// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph capture and replay.

use crate::annotation::describe;
use crate::AnnotationId;
use device_api::DeviceError;

/// Errors returned by the [`GraphCaptureManager`](crate::GraphCaptureManager).
///
/// Three classes:
/// - usage errors (a caller-contract violation, never retried),
/// - [`AnnotationNotFound`](Self::AnnotationNotFound), the one recoverable
///   error: the caller should fall back to normal dispatch,
/// - device failures, carrying the native primitive's diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// An unkeyed capture was requested while a default graph exists.
    #[error(
        "a default graph has already been captured; reset the manager or \
         create a new one to capture another"
    )]
    DefaultGraphExists,

    /// A capture session is already active (capturing is not reentrant).
    #[error("a capture session is already active (annotation: {})", describe(.active))]
    AlreadyCapturing { active: Option<AnnotationId> },

    /// `capture_end` was called without an active session.
    #[error("no capture session is active")]
    NotCapturing,

    /// The device produced no graph at capture end.
    #[error("capture produced no graph (annotation: {})", describe(.annotation))]
    EmptyGraph { annotation: Option<AnnotationId> },

    /// The skip sentinel was passed where a capture key is needed.
    #[error("annotation {0} is the skip-capture sentinel and cannot key a graph")]
    SkipAnnotation(AnnotationId),

    /// A graph is already captured under this id and the policy rejects
    /// re-capture.
    #[error("a graph is already captured for annotation {0}")]
    DuplicateAnnotation(AnnotationId),

    /// Unkeyed replay without a default graph.
    #[error("no default graph has been captured")]
    NoDefaultGraph,

    /// Keyed replay of an id that was never captured.
    #[error("no graph captured for annotation {0}")]
    AnnotationNotFound(AnnotationId),

    /// An annotation id string could not be parsed.
    #[error("invalid annotation id {0}")]
    InvalidAnnotation(String),

    /// A native device primitive failed.
    #[error("device {op} failed: {source}")]
    Device {
        op: &'static str,
        #[source]
        source: DeviceError,
    },
}

impl CaptureError {
    pub(crate) fn device(op: &'static str) -> impl FnOnce(DeviceError) -> Self {
        move |source| CaptureError::Device { op, source }
    }

    /// Returns `true` for caller-contract violations.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            CaptureError::DefaultGraphExists
                | CaptureError::AlreadyCapturing { .. }
                | CaptureError::NotCapturing
                | CaptureError::SkipAnnotation(_)
                | CaptureError::DuplicateAnnotation(_)
                | CaptureError::NoDefaultGraph
        )
    }

    /// Returns `true` if the caller should fall back to normal dispatch.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CaptureError::AnnotationNotFound(_))
    }
}
