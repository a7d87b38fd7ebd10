// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # sim-device
//!
//! A simulated device accelerator implementing
//! [`DeviceRuntime`](device_api::DeviceRuntime). It models the parts of a
//! vendor runtime that graph capture depends on, with host threads in place
//! of hardware queues.
//!
//! # Key Components
//!
//! - [`SimDevice`]: the device: streams, capture sessions, graph
//!   instantiation and launch, resource tracking.
//! - [`SimStream`]: an ordered command stream backed by a worker thread.
//! - [`DeviceOp`]: a labelled operation (kernel launch or copy).
//! - [`SimBuffer`]: shared memory plus elementwise "kernels" producing ops.
//! - [`ResourceStats`]: counters for every created and destroyed resource.
//! - [`Fault`]: one-shot failure injection for error-path testing.
//!
//! # Example
//! ```
//! use device_api::DeviceRuntime;
//! use sim_device::{SimBuffer, SimDevice};
//!
//! let device = SimDevice::new();
//! let stream = device.create_stream("main").unwrap();
//! let buf = SimBuffer::zeros("x", 8);
//!
//! device.submit(&stream, buf.fill(2.0)).unwrap();
//! device.submit(&stream, buf.scale(3.0)).unwrap();
//! device.synchronize(&stream).unwrap();
//! assert_eq!(buf.to_vec(), vec![6.0; 8]);
//! ```

mod device;
mod fault;
mod kernels;
mod op;
mod stats;
mod stream;

pub use device::{SimDevice, SimGraph, SimGraphExec};
pub use fault::Fault;
pub use kernels::SimBuffer;
pub use op::DeviceOp;
pub use stats::ResourceStats;
pub use stream::SimStream;
