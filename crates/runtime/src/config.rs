// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! enable_graph_capture = true
//! warmup_runs = 1
//! stream_label = "compute"
//!
//! [capture]
//! skip_annotation = -1
//! capture_mode = "global"
//! recapture = "keep-first"
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use graph_capture::CaptureConfig;
use std::path::Path;

/// Configuration for the graph executor.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Master switch. When `false` every run is dispatched eagerly.
    pub enable_graph_capture: bool,
    /// Regular (eager) runs per annotation id before it is captured.
    /// Lets lazily-initialised state settle outside of the graph.
    pub warmup_runs: u32,
    /// Label of the stream the executor creates.
    pub stream_label: String,
    /// Capture manager settings.
    pub capture: CaptureConfig,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, super::RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            super::RuntimeError::ConfigError(format!(
                "cannot read config '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, super::RuntimeError> {
        toml::from_str(toml_str).map_err(|e| {
            super::RuntimeError::ConfigError(format!("TOML parse error: {e}"))
        })
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, super::RuntimeError> {
        toml::to_string_pretty(self).map_err(|e| {
            super::RuntimeError::ConfigError(format!("TOML serialise error: {e}"))
        })
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enable_graph_capture: true,
            warmup_runs: 1,
            stream_label: "compute".to_string(),
            capture: CaptureConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_api::CaptureMode;
    use graph_capture::{AnnotationId, RecapturePolicy};

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert!(c.enable_graph_capture);
        assert_eq!(c.warmup_runs, 1);
        assert_eq!(c.capture.skip_annotation, AnnotationId::DEFAULT_SKIP);
        assert_eq!(c.capture.capture_mode, CaptureMode::Global);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
enable_graph_capture = false
warmup_runs = 3

[capture]
skip_annotation = 0
capture_mode = "thread-local"
recapture = "overwrite"
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert!(!c.enable_graph_capture);
        assert_eq!(c.warmup_runs, 3);
        assert_eq!(c.stream_label, "compute");
        assert_eq!(c.capture.skip_annotation, AnnotationId::new(0));
        assert_eq!(c.capture.capture_mode, CaptureMode::ThreadLocal);
        assert_eq!(c.capture.recapture, RecapturePolicy::Overwrite);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let c = RuntimeConfig::from_toml("").unwrap();
        assert_eq!(c, RuntimeConfig::default());
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let err = RuntimeConfig::from_toml("[capture]\ncapture_mode = \"exclusive\"\n").unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig {
            warmup_runs: 5,
            ..Default::default()
        };
        let toml = c.to_toml().unwrap();
        assert!(toml.contains("[capture]"));
        let back = RuntimeConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::from_file(Path::new("/nonexistent/graph-rt.toml")).unwrap_err();
        assert!(matches!(err, crate::RuntimeError::ConfigError(_)));
    }
}
