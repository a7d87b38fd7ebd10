// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Annotation ids: caller-chosen keys for capture variants.

use crate::CaptureError;
use std::fmt;
use std::str::FromStr;

/// Identifies a capture variant, e.g. one input-shape class.
///
/// One value is reserved as the "skip capture" sentinel (see
/// [`CaptureConfig::skip_annotation`](crate::CaptureConfig)); it is a policy
/// signal only and never keys a captured graph.
///
/// # Examples
/// ```
/// use graph_capture::AnnotationId;
///
/// let id: AnnotationId = "3".parse().unwrap();
/// assert_eq!(id, AnnotationId::new(3));
/// assert_eq!(id.to_string(), "3");
/// assert_eq!(AnnotationId::DEFAULT_SKIP.get(), -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(i32);

impl AnnotationId {
    /// The default "do not capture this run" sentinel.
    pub const DEFAULT_SKIP: AnnotationId = AnnotationId(-1);

    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for AnnotationId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AnnotationId {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .map(Self)
            .map_err(|e| CaptureError::InvalidAnnotation(format!("'{s}': {e}")))
    }
}

/// Formats an optional annotation for logs and error messages.
pub(crate) fn describe(annotation: &Option<AnnotationId>) -> String {
    match annotation {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    }
}
