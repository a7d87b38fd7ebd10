// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host-side stand-ins for device kernels.
//!
//! A [`SimBuffer`] plays the role of device memory; each method returns a
//! [`DeviceOp`] that mutates the buffer when a stream executes it. The
//! buffer is captured by reference, so a graph recorded once observes the
//! buffer's current contents on every replay, exactly like a kernel
//! reading fixed device addresses.

use crate::device::lock;
use crate::DeviceOp;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A shared `f32` buffer standing in for device memory.
#[derive(Clone)]
pub struct SimBuffer {
    name: Arc<str>,
    data: Arc<Mutex<Vec<f32>>>,
}

impl SimBuffer {
    /// Allocates a zero-filled buffer of `len` elements.
    pub fn zeros(name: &str, len: usize) -> Self {
        Self::from_vec(name, vec![0.0; len])
    }

    /// Wraps existing host data.
    pub fn from_vec(name: &str, data: Vec<f32>) -> Self {
        Self {
            name: Arc::from(name),
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Buffer name, used in operation labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        lock(&self.data).len()
    }

    /// Returns `true` if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the contents back to the host.
    ///
    /// Only meaningful after the stream that writes the buffer was
    /// synchronised.
    pub fn to_vec(&self) -> Vec<f32> {
        lock(&self.data).clone()
    }

    /// Overwrites the contents from the host (outside any stream).
    pub fn write(&self, values: &[f32]) {
        let mut data = lock(&self.data);
        data.clear();
        data.extend_from_slice(values);
    }

    /// Sum of all elements.
    pub fn checksum(&self) -> f64 {
        lock(&self.data).iter().map(|&v| v as f64).sum()
    }

    /// `buf[i] = value`
    pub fn fill(&self, value: f32) -> DeviceOp {
        let data = Arc::clone(&self.data);
        DeviceOp::new(format!("fill({}, {value})", self.name), move || {
            lock(&data).fill(value);
        })
    }

    /// `buf[i] *= factor`
    pub fn scale(&self, factor: f32) -> DeviceOp {
        let data = Arc::clone(&self.data);
        DeviceOp::new(format!("scale({}, {factor})", self.name), move || {
            lock(&data).iter_mut().for_each(|v| *v *= factor);
        })
    }

    /// `buf[i] += value`
    pub fn add_scalar(&self, value: f32) -> DeviceOp {
        let data = Arc::clone(&self.data);
        DeviceOp::new(format!("add({}, {value})", self.name), move || {
            lock(&data).iter_mut().for_each(|v| *v += value);
        })
    }

    /// `buf[i] += alpha * x[i]`
    ///
    /// Lengths are truncated to the shorter buffer.
    pub fn axpy(&self, alpha: f32, x: &SimBuffer) -> DeviceOp {
        let y = Arc::clone(&self.data);
        let x = Arc::clone(&x.data);
        let label = format!("axpy({}, {alpha})", self.name);
        DeviceOp::new(label, move || {
            if Arc::ptr_eq(&x, &y) {
                lock(&y).iter_mut().for_each(|v| *v += alpha * *v);
                return;
            }
            let src = lock(&x).clone();
            let mut dst = lock(&y);
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += alpha * s;
            }
        })
    }

    /// Copies `src` into this buffer (a device-to-device memcpy).
    pub fn copy_from(&self, src: &SimBuffer) -> DeviceOp {
        let dst = Arc::clone(&self.data);
        let src_data = Arc::clone(&src.data);
        DeviceOp::new(format!("memcpy({} <- {})", self.name, src.name), move || {
            if Arc::ptr_eq(&src_data, &dst) {
                return;
            }
            let values = lock(&src_data).clone();
            *lock(&dst) = values;
        })
    }
}

impl fmt::Debug for SimBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimBuffer")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}
