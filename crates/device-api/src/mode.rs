// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stream capture modes.
//!
//! The mode decides which *other* captures may be active while a stream is
//! recording. Devices that cannot distinguish modes treat every capture as
//! [`CaptureMode::Global`].

use crate::DeviceError;
use std::fmt;
use std::str::FromStr;

/// Exclusivity of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// Only one capture may be active on any stream, process-wide.
    #[default]
    Global,
    /// At most one capture per host thread; different threads may capture
    /// different streams at the same time.
    ThreadLocal,
    /// No cross-stream restriction.
    Relaxed,
}

impl CaptureMode {
    /// Returns `true` if a capture in `self` mode and a capture in `other`
    /// mode cannot both be active on different streams.
    ///
    /// `same_thread` says whether both captures were started by the same
    /// host thread.
    pub fn conflicts_with(self, other: CaptureMode, same_thread: bool) -> bool {
        match (self, other) {
            (CaptureMode::Global, _) | (_, CaptureMode::Global) => true,
            (CaptureMode::ThreadLocal, _) | (_, CaptureMode::ThreadLocal) => same_thread,
            (CaptureMode::Relaxed, CaptureMode::Relaxed) => false,
        }
    }

    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Global => "global",
            CaptureMode::ThreadLocal => "thread-local",
            CaptureMode::Relaxed => "relaxed",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(CaptureMode::Global),
            "thread-local" | "thread_local" | "threadlocal" => Ok(CaptureMode::ThreadLocal),
            "relaxed" => Ok(CaptureMode::Relaxed),
            other => Err(DeviceError::UnknownCaptureMode(other.to_string())),
        }
    }
}
