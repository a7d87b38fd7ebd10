// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A synthetic elementwise pipeline used by `run` and `benchmark`.

use graph_capture::AnnotationId;
use runtime::{Program, RuntimeError};
use sim_device::{DeviceOp, SimBuffer, SimDevice, SimStream};

/// Width of every buffer in the pipeline.
const WIDTH: usize = 1024;

/// `input → act`, then a repeating scale / bias / residual / copy-out chain.
pub struct SyntheticPipeline {
    act: SimBuffer,
    out: SimBuffer,
    ops: Vec<DeviceOp>,
}

impl SyntheticPipeline {
    /// Builds a pipeline of exactly `num_ops` device operations.
    pub fn new(num_ops: usize) -> Self {
        let input = SimBuffer::from_vec("input", (0..WIDTH).map(|i| (i % 7) as f32).collect());
        let act = SimBuffer::zeros("act", WIDTH);
        let out = SimBuffer::zeros("out", WIDTH);

        let ops = (0..num_ops)
            .map(|i| match i {
                0 => act.copy_from(&input),
                _ => match i % 4 {
                    1 => act.scale(0.5),
                    2 => act.add_scalar(1.0),
                    3 => act.axpy(0.25, &input),
                    _ => out.copy_from(&act),
                },
            })
            .collect();

        Self {
            act,
            out,
            ops,
        }
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Sum over the activation and output buffers.
    pub fn checksum(&self) -> f64 {
        self.act.checksum() + self.out.checksum()
    }

    /// Resets activations so every run starts from the same state.
    pub fn reset(&self) {
        self.act.write(&vec![0.0; WIDTH]);
        self.out.write(&vec![0.0; WIDTH]);
    }
}

impl Program<SimDevice> for SyntheticPipeline {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn enqueue(
        &self,
        device: &SimDevice,
        stream: &SimStream,
        _annotation: Option<AnnotationId>,
    ) -> Result<(), RuntimeError> {
        for op in &self.ops {
            device.submit(stream, op.clone())?;
        }
        Ok(())
    }
}
