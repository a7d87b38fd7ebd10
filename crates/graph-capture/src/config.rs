// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Capture manager configuration.
//!
//! Usually embedded as the `[capture]` table of the runtime's TOML file:
//! ```toml
//! [capture]
//! skip_annotation = -1
//! capture_mode = "global"
//! recapture = "keep-first"
//! ```

use crate::AnnotationId;
use device_api::CaptureMode;

/// What `capture_end` does when the annotation id already has a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecapturePolicy {
    /// Keep the existing graph and discard the new one (reported as
    /// [`CaptureOutcome::DuplicateDiscarded`](crate::CaptureOutcome)).
    #[default]
    KeepFirst,
    /// Destroy the existing graph and install the new one.
    Overwrite,
    /// Fail with [`CaptureError::DuplicateAnnotation`](crate::CaptureError).
    Reject,
}

/// Configuration for a [`GraphCaptureManager`](crate::GraphCaptureManager).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Annotation id meaning "do not capture this run".
    pub skip_annotation: AnnotationId,
    /// Exclusivity of capture sessions. `global` allows one capture
    /// process-wide; `thread-local` allows one per host thread.
    pub capture_mode: CaptureMode,
    /// Handling of a second capture under an existing annotation id.
    pub recapture: RecapturePolicy,
}

impl CaptureConfig {
    /// Returns `true` if `id` is the skip sentinel.
    pub fn is_skip(&self, id: AnnotationId) -> bool {
        id == self.skip_annotation
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            skip_annotation: AnnotationId::DEFAULT_SKIP,
            capture_mode: CaptureMode::Global,
            recapture: RecapturePolicy::KeepFirst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = CaptureConfig::default();
        assert!(c.is_skip(AnnotationId::new(-1)));
        assert!(!c.is_skip(AnnotationId::new(0)));
        assert_eq!(c.capture_mode, CaptureMode::Global);
        assert_eq!(c.recapture, RecapturePolicy::KeepFirst);
    }

    #[test]
    fn test_from_toml_partial() {
        let c: CaptureConfig = toml::from_str("recapture = \"overwrite\"").unwrap();
        assert_eq!(c.recapture, RecapturePolicy::Overwrite);
        assert_eq!(c.skip_annotation, AnnotationId::DEFAULT_SKIP);
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
skip_annotation = -7
capture_mode = "thread-local"
recapture = "reject"
"#;
        let c: CaptureConfig = toml::from_str(toml).unwrap();
        assert!(c.is_skip(AnnotationId::new(-7)));
        assert_eq!(c.capture_mode, CaptureMode::ThreadLocal);
        assert_eq!(c.recapture, RecapturePolicy::Reject);
    }
}
