// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Simulated command streams.
//!
//! Each stream owns a worker thread that executes jobs strictly in
//! submission order, which gives the same guarantees as a hardware queue:
//! work on one stream is ordered, work on different streams is not.
//! `synchronize` is a fence job that the host waits on.

use crate::device::{lock, DeviceShared};
use crate::DeviceOp;
use device_api::DeviceError;
use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Work item for a stream worker.
pub(crate) enum Job {
    /// Execute operations in order.
    Run(Arc<[DeviceOp]>),
    /// Signal the host once everything queued before it has run.
    Fence(mpsc::Sender<()>),
}

/// Cloneable handle to a simulated command stream.
///
/// The stream stays alive as long as any handle exists. When the last
/// handle is dropped, the worker finishes the queued work and exits.
#[derive(Clone)]
pub struct SimStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    id: u64,
    label: String,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Operations intercepted while the stream is capturing.
    recording: Mutex<Option<Vec<DeviceOp>>>,
}

impl SimStream {
    pub(crate) fn spawn(id: u64, label: String, shared: Arc<DeviceShared>) -> Result<Self, DeviceError> {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = std::thread::Builder::new()
            .name(format!("sim-stream-{id}"))
            .spawn(move || worker_loop(rx, &shared))
            .map_err(|e| DeviceError::Native {
                op: "create_stream",
                detail: e.to_string(),
            })?;

        Ok(Self {
            inner: Arc::new(StreamInner {
                id,
                label,
                sender: Mutex::new(Some(tx)),
                worker: Mutex::new(Some(worker)),
                recording: Mutex::new(None),
            }),
        })
    }

    /// Device-unique stream id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The label given at creation.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Returns `true` if both handles refer to the same stream.
    pub fn same_stream(&self, other: &SimStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` while a capture session is recording on this stream.
    pub fn is_capturing(&self) -> bool {
        lock(&self.inner.recording).is_some()
    }

    /// Queues `ops` for execution, or appends them to the active recording.
    ///
    /// Returns `true` if the operations were recorded rather than queued.
    pub(crate) fn enqueue(&self, ops: &[DeviceOp]) -> Result<bool, DeviceError> {
        {
            let mut recording = lock(&self.inner.recording);
            if let Some(recorded) = recording.as_mut() {
                recorded.extend_from_slice(ops);
                return Ok(true);
            }
        }
        self.send(Job::Run(Arc::from(ops)))?;
        Ok(false)
    }

    pub(crate) fn start_recording(&self) {
        *lock(&self.inner.recording) = Some(Vec::new());
    }

    pub(crate) fn stop_recording(&self) -> Option<Vec<DeviceOp>> {
        lock(&self.inner.recording).take()
    }

    /// Blocks until every job queued before this call has run.
    pub(crate) fn drain(&self) -> Result<(), DeviceError> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(Job::Fence(ack_tx))?;
        ack_rx
            .recv()
            .map_err(|_| self.fault("worker stopped before reaching the fence"))
    }

    fn send(&self, job: Job) -> Result<(), DeviceError> {
        let sender = lock(&self.inner.sender);
        match sender.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| self.fault("worker has stopped")),
            None => Err(self.fault("stream is shut down")),
        }
    }

    fn fault(&self, detail: &str) -> DeviceError {
        DeviceError::StreamFault {
            stream: self.inner.label.clone(),
            detail: detail.to_string(),
        }
    }
}

fn worker_loop(rx: mpsc::Receiver<Job>, shared: &DeviceShared) {
    for job in rx {
        match job {
            Job::Run(ops) => {
                for op in ops.iter() {
                    op.run();
                    shared.record_executed(op.label());
                }
            }
            Job::Fence(ack) => {
                // The host may have given up waiting; nothing to do then.
                let _ = ack.send(());
            }
        }
    }
}

impl Drop for StreamInner {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        drop(lock(&self.sender).take());
        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                tracing::warn!(stream = %self.label, "stream worker panicked");
            }
        }
    }
}

impl fmt::Debug for SimStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimStream")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish()
    }
}
