// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # device-api
//!
//! The seam between the graph capture manager and a device accelerator's
//! native runtime.
//!
//! # Key Components
//!
//! - [`DeviceRuntime`]: the primitives a capture manager consumes: stream
//!   synchronisation, begin/end capture, instantiate, launch, destroy.
//! - [`CaptureMode`]: how exclusive a capture session is (process-wide,
//!   per-thread, or relaxed).
//! - [`GraphGuard`] / [`ExecGuard`]: move-only RAII owners for compiled and
//!   executable graphs. Dropping a guard calls the device's destroy
//!   primitive.
//! - [`DeviceError`]: failures reported by the primitives.
//!
//! # Ownership Model
//!
//! ```text
//! DeviceRuntime::end_capture(stream)
//!       │
//!       ▼
//!   GraphGuard ──instantiate()──► ExecGuard  ◄─── holds Arc<D>
//!       │                            │
//!       │ drop()                     │ drop()
//!       ▼                            ▼
//!   destroy_graph()              destroy_exec()
//! ```

mod error;
mod guard;
mod mode;
mod runtime;

pub use error::DeviceError;
pub use guard::{ExecGuard, GraphGuard};
pub use mode::CaptureMode;
pub use runtime::DeviceRuntime;
