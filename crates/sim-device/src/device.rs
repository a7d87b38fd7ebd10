// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The simulated accelerator.
//!
//! [`SimDevice`] implements [`DeviceRuntime`] on top of host threads:
//!
//! 1. Streams are ordered job queues (see [`SimStream`]).
//! 2. While a stream is capturing, submitted operations are recorded into
//!    a [`SimGraph`] instead of executing.
//! 3. Instantiating a graph freezes its operation list into a
//!    [`SimGraphExec`]; launching it queues the whole list as one job.
//! 4. Every graph and executable is tracked, so leaks and double frees are
//!    visible through [`ResourceStats`].
//!
//! # Thread Safety
//! `SimDevice` is `Send + Sync`; share it via `Arc<SimDevice>`.

use crate::{DeviceOp, Fault, ResourceStats, SimStream};
use device_api::{CaptureMode, DeviceError, DeviceRuntime};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

/// Locks a mutex, recovering the data if a panicking operation poisoned it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A compiled graph: the operations recorded during one capture session.
#[derive(Clone)]
pub struct SimGraph {
    id: u64,
    ops: Arc<[DeviceOp]>,
}

impl SimGraph {
    /// Device-unique graph id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of recorded operations.
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Labels of the recorded operations, in order.
    pub fn op_labels(&self) -> Vec<String> {
        self.ops.iter().map(|op| op.label().to_string()).collect()
    }
}

impl fmt::Debug for SimGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimGraph")
            .field("id", &self.id)
            .field("num_ops", &self.ops.len())
            .finish()
    }
}

/// An instantiated graph, launchable any number of times.
pub struct SimGraphExec {
    id: u64,
    graph_id: u64,
    ops: Arc<[DeviceOp]>,
}

impl SimGraphExec {
    /// Device-unique executable id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the compiled graph this executable was instantiated from.
    pub fn graph_id(&self) -> u64 {
        self.graph_id
    }

    /// Number of operations one launch executes.
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }
}

impl fmt::Debug for SimGraphExec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimGraphExec")
            .field("id", &self.id)
            .field("graph_id", &self.graph_id)
            .field("num_ops", &self.ops.len())
            .finish()
    }
}

/// A capture session registered with the device.
struct ActiveCapture {
    stream: String,
    mode: CaptureMode,
    thread: ThreadId,
}

/// State shared between the device and its stream workers.
pub(crate) struct DeviceShared {
    stats: Mutex<ResourceStats>,
    trace_enabled: AtomicBool,
    trace: Mutex<Vec<String>>,
}

impl DeviceShared {
    /// Called by stream workers after each executed operation.
    pub(crate) fn record_executed(&self, label: &str) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.ops_executed += 1;
        }
        if self.trace_enabled.load(Ordering::Acquire) {
            lock(&self.trace).push(label.to_string());
        }
    }

    fn record(&self, update: impl FnOnce(&mut ResourceStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }
}

/// A simulated device accelerator.
///
/// # Example
/// ```
/// use device_api::{CaptureMode, DeviceRuntime};
/// use sim_device::{DeviceOp, SimDevice};
///
/// let device = SimDevice::new();
/// let stream = device.create_stream("main").unwrap();
///
/// device.begin_capture(&stream, CaptureMode::Global).unwrap();
/// device.submit(&stream, DeviceOp::noop("k0")).unwrap();
/// let graph = device.end_capture(&stream).unwrap().unwrap();
/// assert_eq!(graph.num_ops(), 1);
///
/// let exec = device.instantiate(&graph).unwrap();
/// device.destroy_graph(graph).unwrap();
/// device.launch(&exec, &stream).unwrap();
/// device.synchronize(&stream).unwrap();
/// device.destroy_exec(exec).unwrap();
/// assert!(device.stats().is_balanced());
/// ```
pub struct SimDevice {
    name: String,
    shared: Arc<DeviceShared>,
    next_id: AtomicU64,
    active_captures: Mutex<HashMap<u64, ActiveCapture>>,
    graphs: Mutex<HashSet<u64>>,
    execs: Mutex<HashSet<u64>>,
    faults: Mutex<Vec<Fault>>,
}

impl SimDevice {
    /// Creates a device named `"sim:0"`.
    pub fn new() -> Self {
        Self::with_name("sim:0")
    }

    /// Creates a device with the given diagnostic name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(DeviceShared {
                stats: Mutex::new(ResourceStats::default()),
                trace_enabled: AtomicBool::new(false),
                trace: Mutex::new(Vec::new()),
            }),
            next_id: AtomicU64::new(1),
            active_captures: Mutex::new(HashMap::new()),
            graphs: Mutex::new(HashSet::new()),
            execs: Mutex::new(HashSet::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Creates a new command stream with its own worker thread.
    pub fn create_stream(&self, label: impl Into<String>) -> Result<SimStream, DeviceError> {
        let id = self.next_id();
        let stream = SimStream::spawn(id, label.into(), Arc::clone(&self.shared))?;
        self.shared.record(|s| s.streams_created += 1);
        tracing::debug!(device = %self.name, stream = stream.label(), "stream created");
        Ok(stream)
    }

    /// Submits one operation to `stream`.
    ///
    /// Executes asynchronously, or is recorded if the stream is capturing.
    pub fn submit(&self, stream: &SimStream, op: DeviceOp) -> Result<(), DeviceError> {
        self.submit_all(stream, std::slice::from_ref(&op))
    }

    /// Submits operations to `stream` in order.
    pub fn submit_all(&self, stream: &SimStream, ops: &[DeviceOp]) -> Result<(), DeviceError> {
        if ops.is_empty() {
            return Ok(());
        }
        let recorded = stream.enqueue(ops)?;
        let n = ops.len() as u64;
        self.shared.record(|s| {
            if recorded {
                s.ops_recorded += n;
            } else {
                s.ops_submitted += n;
            }
        });
        Ok(())
    }

    /// Arms a one-shot fault for the next call of the matching primitive.
    pub fn inject_fault(&self, fault: Fault) {
        lock(&self.faults).push(fault);
    }

    /// Enables or disables recording of executed operation labels.
    pub fn set_trace(&self, enabled: bool) {
        self.shared.trace_enabled.store(enabled, Ordering::Release);
    }

    /// Labels of executed operations, in execution order.
    pub fn trace(&self) -> Vec<String> {
        lock(&self.shared.trace).clone()
    }

    /// Clears the execution trace.
    pub fn clear_trace(&self) {
        lock(&self.shared.trace).clear();
    }

    /// Returns a snapshot of the resource counters.
    pub fn stats(&self) -> ResourceStats {
        self.shared
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Compiled graphs currently alive.
    pub fn live_graphs(&self) -> usize {
        lock(&self.graphs).len()
    }

    /// Executable graphs currently alive.
    pub fn live_execs(&self) -> usize {
        lock(&self.execs).len()
    }

    /// Number of streams currently capturing.
    pub fn active_captures(&self) -> usize {
        lock(&self.active_captures).len()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Consumes an armed fault, returning the error it produces.
    fn check_fault(&self, fault: Fault) -> Result<(), DeviceError> {
        if self.take_fault(fault) {
            return Err(DeviceError::Native {
                op: fault.op_name(),
                detail: fault.to_string(),
            });
        }
        Ok(())
    }

    fn take_fault(&self, fault: Fault) -> bool {
        let mut faults = lock(&self.faults);
        match faults.iter().position(|f| *f == fault) {
            Some(pos) => {
                faults.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRuntime for SimDevice {
    type Stream = SimStream;
    type Graph = SimGraph;
    type GraphExec = SimGraphExec;

    fn name(&self) -> &str {
        &self.name
    }

    fn synchronize(&self, stream: &SimStream) -> Result<(), DeviceError> {
        self.check_fault(Fault::Synchronize)?;
        if stream.is_capturing() {
            return Err(DeviceError::Native {
                op: "synchronize",
                detail: format!("stream '{}' is capturing", stream.label()),
            });
        }
        stream.drain()?;
        self.shared.record(|s| s.synchronizations += 1);
        Ok(())
    }

    fn begin_capture(&self, stream: &SimStream, mode: CaptureMode) -> Result<(), DeviceError> {
        self.check_fault(Fault::BeginCapture)?;
        let mut active = lock(&self.active_captures);

        if active.contains_key(&stream.id()) {
            return Err(DeviceError::CaptureInProgress {
                stream: stream.label().to_string(),
            });
        }

        let me = std::thread::current().id();
        if let Some(other) = active
            .values()
            .find(|a| a.mode.conflicts_with(mode, a.thread == me))
        {
            return Err(DeviceError::CaptureConflict {
                stream: stream.label().to_string(),
                active_stream: other.stream.clone(),
                mode: other.mode,
            });
        }

        active.insert(
            stream.id(),
            ActiveCapture {
                stream: stream.label().to_string(),
                mode,
                thread: me,
            },
        );
        stream.start_recording();
        self.shared.record(|s| s.captures_begun += 1);
        Ok(())
    }

    fn end_capture(&self, stream: &SimStream) -> Result<Option<SimGraph>, DeviceError> {
        let mut active = lock(&self.active_captures);
        if active.remove(&stream.id()).is_none() {
            return Err(DeviceError::NotCapturing {
                stream: stream.label().to_string(),
            });
        }
        let ops = stream.stop_recording().unwrap_or_default();
        drop(active);

        if self.take_fault(Fault::EndCaptureNoGraph) || ops.is_empty() {
            self.shared.record(|s| {
                s.captures_ended += 1;
                s.empty_captures += 1;
            });
            return Ok(None);
        }

        let id = self.next_id();
        lock(&self.graphs).insert(id);
        self.shared.record(|s| {
            s.captures_ended += 1;
            s.graphs_created += 1;
        });
        Ok(Some(SimGraph {
            id,
            ops: Arc::from(ops),
        }))
    }

    fn instantiate(&self, graph: &SimGraph) -> Result<SimGraphExec, DeviceError> {
        self.check_fault(Fault::Instantiate)?;
        if !lock(&self.graphs).contains(&graph.id) {
            return Err(DeviceError::InvalidHandle(format!("graph {}", graph.id)));
        }
        let id = self.next_id();
        lock(&self.execs).insert(id);
        self.shared.record(|s| s.execs_created += 1);
        Ok(SimGraphExec {
            id,
            graph_id: graph.id,
            ops: Arc::clone(&graph.ops),
        })
    }

    fn launch(&self, exec: &SimGraphExec, stream: &SimStream) -> Result<(), DeviceError> {
        self.check_fault(Fault::Launch)?;
        if !lock(&self.execs).contains(&exec.id) {
            return Err(DeviceError::InvalidHandle(format!("executable {}", exec.id)));
        }
        // Launching onto a capturing stream records the graph's operations.
        let recorded = stream.enqueue(&exec.ops)?;
        let n = exec.ops.len() as u64;
        self.shared.record(|s| {
            s.launches += 1;
            if recorded {
                s.ops_recorded += n;
            }
        });
        Ok(())
    }

    fn destroy_graph(&self, graph: SimGraph) -> Result<(), DeviceError> {
        self.check_fault(Fault::Destroy)?;
        if !lock(&self.graphs).remove(&graph.id) {
            return Err(DeviceError::InvalidHandle(format!("graph {}", graph.id)));
        }
        self.shared.record(|s| s.graphs_destroyed += 1);
        Ok(())
    }

    fn destroy_exec(&self, exec: SimGraphExec) -> Result<(), DeviceError> {
        self.check_fault(Fault::Destroy)?;
        if !lock(&self.execs).remove(&exec.id) {
            return Err(DeviceError::InvalidHandle(format!("executable {}", exec.id)));
        }
        self.shared.record(|s| s.execs_destroyed += 1);
        Ok(())
    }
}

impl fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimDevice")
            .field("name", &self.name)
            .field("live_graphs", &self.live_graphs())
            .field("live_execs", &self.live_execs())
            .field("active_captures", &self.active_captures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_op(label: &str, counter: &Arc<AtomicUsize>) -> DeviceOp {
        let c = Arc::clone(counter);
        DeviceOp::new(label, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_submit_executes_in_order() {
        let device = SimDevice::new();
        device.set_trace(true);
        let stream = device.create_stream("s").unwrap();

        for i in 0..5 {
            device.submit(&stream, DeviceOp::noop(format!("op{i}"))).unwrap();
        }
        device.synchronize(&stream).unwrap();

        assert_eq!(device.trace(), vec!["op0", "op1", "op2", "op3", "op4"]);
        assert_eq!(device.stats().ops_executed, 5);
        assert_eq!(device.stats().ops_submitted, 5);
    }

    #[test]
    fn test_capture_intercepts_operations() {
        let device = SimDevice::new();
        let stream = device.create_stream("s").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        device.begin_capture(&stream, CaptureMode::Global).unwrap();
        assert!(stream.is_capturing());
        device.submit(&stream, counter_op("a", &hits)).unwrap();
        device.submit(&stream, counter_op("b", &hits)).unwrap();
        let graph = device.end_capture(&stream).unwrap().unwrap();
        device.synchronize(&stream).unwrap();

        // Nothing ran during capture.
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(graph.op_labels(), vec!["a", "b"]);
        assert_eq!(device.stats().ops_recorded, 2);

        let exec = device.instantiate(&graph).unwrap();
        device.destroy_graph(graph).unwrap();
        for _ in 0..3 {
            device.launch(&exec, &stream).unwrap();
        }
        device.synchronize(&stream).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 6);

        device.destroy_exec(exec).unwrap();
        assert!(device.stats().is_balanced());
    }

    #[test]
    fn test_empty_capture_yields_no_graph() {
        let device = SimDevice::new();
        let stream = device.create_stream("s").unwrap();

        device.begin_capture(&stream, CaptureMode::Global).unwrap();
        assert!(device.end_capture(&stream).unwrap().is_none());
        assert_eq!(device.stats().empty_captures, 1);
        assert_eq!(device.live_graphs(), 0);
    }

    #[test]
    fn test_end_without_begin() {
        let device = SimDevice::new();
        let stream = device.create_stream("s").unwrap();
        assert!(matches!(
            device.end_capture(&stream),
            Err(DeviceError::NotCapturing { .. })
        ));
    }

    #[test]
    fn test_double_begin_rejected() {
        let device = SimDevice::new();
        let stream = device.create_stream("s").unwrap();

        device.begin_capture(&stream, CaptureMode::Relaxed).unwrap();
        assert!(matches!(
            device.begin_capture(&stream, CaptureMode::Relaxed),
            Err(DeviceError::CaptureInProgress { .. })
        ));
    }

    #[test]
    fn test_global_mode_is_process_wide() {
        let device = SimDevice::new();
        let a = device.create_stream("a").unwrap();
        let b = device.create_stream("b").unwrap();

        device.begin_capture(&a, CaptureMode::Global).unwrap();
        let err = device.begin_capture(&b, CaptureMode::Relaxed).unwrap_err();
        assert!(matches!(err, DeviceError::CaptureConflict { ref active_stream, .. } if active_stream == "a"));

        device.end_capture(&a).unwrap();
        device.begin_capture(&b, CaptureMode::Global).unwrap();
        assert_eq!(device.active_captures(), 1);
    }

    #[test]
    fn test_thread_local_mode_allows_other_threads() {
        let device = Arc::new(SimDevice::new());
        let a = device.create_stream("a").unwrap();
        let b = device.create_stream("b").unwrap();

        device.begin_capture(&a, CaptureMode::ThreadLocal).unwrap();

        // Same thread: rejected.
        assert!(device.begin_capture(&b, CaptureMode::ThreadLocal).is_err());

        // Another thread: allowed.
        let d = Arc::clone(&device);
        let b2 = b.clone();
        std::thread::spawn(move || d.begin_capture(&b2, CaptureMode::ThreadLocal))
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(device.active_captures(), 2);
    }

    #[test]
    fn test_synchronize_while_capturing_fails() {
        let device = SimDevice::new();
        let stream = device.create_stream("s").unwrap();
        device.begin_capture(&stream, CaptureMode::Global).unwrap();
        assert!(device.synchronize(&stream).is_err());
    }

    #[test]
    fn test_injected_faults_are_one_shot() {
        let device = SimDevice::new();
        let stream = device.create_stream("s").unwrap();

        device.inject_fault(Fault::Synchronize);
        let err = device.synchronize(&stream).unwrap_err();
        assert!(matches!(err, DeviceError::Native { op: "synchronize", .. }));
        device.synchronize(&stream).unwrap();
    }

    #[test]
    fn test_destroy_unknown_handle() {
        let device = SimDevice::new();
        let stream = device.create_stream("s").unwrap();
        device.begin_capture(&stream, CaptureMode::Global).unwrap();
        device.submit(&stream, DeviceOp::noop("x")).unwrap();
        let graph = device.end_capture(&stream).unwrap().unwrap();

        let twin = graph.clone();
        device.destroy_graph(graph).unwrap();
        assert!(matches!(
            device.destroy_graph(twin),
            Err(DeviceError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_panicking_op_faults_stream() {
        let device = SimDevice::new();
        let stream = device.create_stream("s").unwrap();
        device
            .submit(&stream, DeviceOp::new("boom", || panic!("kernel fault")))
            .unwrap();
        assert!(matches!(
            device.synchronize(&stream),
            Err(DeviceError::StreamFault { .. })
        ));
    }

    #[test]
    fn test_debug_format() {
        let device = SimDevice::with_name("sim:7");
        let debug = format!("{device:?}");
        assert!(debug.contains("SimDevice"));
        assert!(debug.contains("sim:7"));
    }
}
