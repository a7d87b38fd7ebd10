// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The graph executor with type-state–enforced stream binding.
//!
//! ```text
//! GraphExecutor<D, Idle>
//!     │  .bind(stream)
//!     ▼
//! GraphExecutor<D, Ready>
//!     │  .run(&program, annotation)   (repeatable)
//!     ▼
//!   RunOutput
//! ```
//!
//! # Dispatch Policy
//! For each run, keyed by annotation id (all unkeyed runs share one key):
//! 1. Capture disabled, or the id is the skip sentinel → eager.
//! 2. The key was captured → replay. A replay miss (the graph was released
//!    behind the executor's back) falls back to eager and restarts warm-up.
//! 3. Fewer than `warmup_runs` eager runs so far → warm-up (eager).
//! 4. Otherwise → capture the program, then replay the new graph once so the
//!    captured work runs for this call.

use crate::{ExecutorMetrics, RunMode, RunOutput, RuntimeConfig, RuntimeError};
use device_api::DeviceRuntime;
use graph_capture::{AnnotationId, CaptureError, GraphCaptureManager};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

// ── Program ────────────────────────────────────────────────────

/// An operation sequence issued once per inference call.
///
/// `enqueue` only submits work; it must not synchronise the stream, since
/// the same call is used for eager dispatch and for recording a graph.
pub trait Program<D: DeviceRuntime> {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Submits the program's operations to `stream`.
    fn enqueue(
        &self,
        device: &D,
        stream: &D::Stream,
        annotation: Option<AnnotationId>,
    ) -> Result<(), RuntimeError>;
}

// ── Type-state markers ─────────────────────────────────────────

/// Executor is configured but has no stream.
#[derive(Debug)]
pub struct Idle;

/// Executor owns a capture manager bound to a stream.
#[derive(Debug)]
pub struct Ready;

/// Sealed trait for executor states.
pub trait ExecutorState: std::fmt::Debug {}
impl ExecutorState for Idle {}
impl ExecutorState for Ready {}

/// Per-key progress through the dispatch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Warming(u32),
    Captured,
}

// ── Executor ───────────────────────────────────────────────────

/// Runs programs eagerly or through captured graphs.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use runtime::{GraphExecutor, Program, RunMode, RuntimeConfig, RuntimeError};
/// use sim_device::{SimBuffer, SimDevice, SimStream};
///
/// struct Double(SimBuffer);
///
/// impl Program<SimDevice> for Double {
///     fn name(&self) -> &str {
///         "double"
///     }
///
///     fn enqueue(
///         &self,
///         device: &SimDevice,
///         stream: &SimStream,
///         _annotation: Option<graph_capture::AnnotationId>,
///     ) -> Result<(), RuntimeError> {
///         Ok(device.submit(stream, self.0.scale(2.0))?)
///     }
/// }
///
/// let device = Arc::new(SimDevice::new());
/// let stream = device.create_stream("compute").unwrap();
/// let program = Double(SimBuffer::from_vec("x", vec![1.0]));
///
/// let mut executor = GraphExecutor::new(device, RuntimeConfig::default()).bind(stream);
/// let modes: Vec<RunMode> = (0..3)
///     .map(|_| executor.run(&program, None).unwrap().mode)
///     .collect();
/// assert_eq!(modes, [RunMode::Warmup, RunMode::Capture, RunMode::Replay]);
/// assert_eq!(program.0.to_vec(), vec![8.0]);
/// ```
pub struct GraphExecutor<D: DeviceRuntime, S: ExecutorState = Idle> {
    config: RuntimeConfig,
    device: Arc<D>,
    _state: PhantomData<S>,
    // Populated by `bind`:
    graphs: Option<GraphCaptureManager<D>>,
    keys: HashMap<Option<AnnotationId>, KeyState>,
    metrics: ExecutorMetrics,
}

// ── Idle → Ready ───────────────────────────────────────────────

impl<D: DeviceRuntime> GraphExecutor<D, Idle> {
    /// Creates an executor for `device`.
    pub fn new(device: Arc<D>, config: RuntimeConfig) -> Self {
        tracing::info!(
            device = device.name(),
            capture = config.enable_graph_capture,
            warmup_runs = config.warmup_runs,
            "executor created"
        );
        Self {
            config,
            device,
            _state: PhantomData,
            graphs: None,
            keys: HashMap::new(),
            metrics: ExecutorMetrics::new(),
        }
    }

    /// Binds the executor to `stream`.
    /// Transitions to the `Ready` state.
    pub fn bind(self, stream: D::Stream) -> GraphExecutor<D, Ready> {
        let graphs = GraphCaptureManager::with_config(
            Arc::clone(&self.device),
            stream,
            self.config.capture.clone(),
        );
        GraphExecutor {
            config: self.config,
            device: self.device,
            _state: PhantomData,
            graphs: Some(graphs),
            keys: HashMap::new(),
            metrics: self.metrics,
        }
    }
}

// ── Ready: run programs ────────────────────────────────────────

impl<D: DeviceRuntime> GraphExecutor<D, Ready> {
    /// Runs `program` once, choosing the dispatch mode per the policy.
    ///
    /// Returns after all of the run's work completed on the device.
    pub fn run<P>(
        &mut self,
        program: &P,
        annotation: Option<AnnotationId>,
    ) -> Result<RunOutput, RuntimeError>
    where
        P: Program<D> + ?Sized,
    {
        let start = Instant::now();
        let mode = self.dispatch(program, annotation)?;
        let output = RunOutput {
            mode,
            elapsed: start.elapsed(),
        };
        self.metrics.record(&output);
        tracing::debug!(
            program = program.name(),
            annotation = ?annotation,
            "{mode} run in {:?}",
            output.elapsed
        );
        Ok(output)
    }

    /// Rebinds to another stream. Existing graphs replay on the new stream.
    pub fn rebind(&mut self, stream: D::Stream) {
        self.graphs_mut().bind_stream(stream);
    }

    /// Releases every captured graph and restarts warm-up for all keys.
    pub fn reset_graphs(&mut self) {
        let graphs = self.graphs_mut();
        graphs.reset();
        graphs.reset_keyed();
        self.keys.clear();
        tracing::info!("all captured graphs released");
    }

    /// Returns the capture manager.
    pub fn graphs(&self) -> &GraphCaptureManager<D> {
        self.graphs.as_ref().expect("manager exists in Ready state")
    }

    /// Returns the capture manager for direct control.
    ///
    /// Graphs released through it are noticed on the next replay of their
    /// key, which then falls back to eager dispatch.
    pub fn graphs_mut(&mut self) -> &mut GraphCaptureManager<D> {
        self.graphs.as_mut().expect("manager exists in Ready state")
    }

    pub fn stream(&self) -> &D::Stream {
        self.graphs().stream()
    }

    pub fn metrics(&self) -> &ExecutorMetrics {
        &self.metrics
    }

    /// Returns `true` if the executor has captured `annotation`'s key.
    pub fn is_captured(&self, annotation: Option<AnnotationId>) -> bool {
        self.keys.get(&annotation) == Some(&KeyState::Captured)
    }

    // ── Private helpers ────────────────────────────────────────

    fn dispatch<P>(
        &mut self,
        program: &P,
        annotation: Option<AnnotationId>,
    ) -> Result<RunMode, RuntimeError>
    where
        P: Program<D> + ?Sized,
    {
        if !self.config.enable_graph_capture || !self.graphs().is_capture_allowed(annotation) {
            self.run_eager(program, annotation)?;
            return Ok(RunMode::Eager);
        }

        let state = *self
            .keys
            .entry(annotation)
            .or_insert(KeyState::Warming(0));

        match state {
            KeyState::Captured => match self.graphs_mut().replay(annotation) {
                Ok(()) => Ok(RunMode::Replay),
                Err(e) if e.is_recoverable() || matches!(e, CaptureError::NoDefaultGraph) => {
                    tracing::warn!(
                        program = program.name(),
                        "replay missed ({e}); falling back to eager dispatch"
                    );
                    self.keys.insert(annotation, KeyState::Warming(0));
                    self.run_eager(program, annotation)?;
                    Ok(RunMode::Fallback)
                }
                Err(e) => Err(e.into()),
            },
            KeyState::Warming(n) if n < self.config.warmup_runs => {
                self.run_eager(program, annotation)?;
                self.keys.insert(annotation, KeyState::Warming(n + 1));
                Ok(RunMode::Warmup)
            }
            KeyState::Warming(_) => {
                self.capture(program, annotation)?;
                Ok(RunMode::Capture)
            }
        }
    }

    fn capture<P>(&mut self, program: &P, annotation: Option<AnnotationId>) -> Result<(), RuntimeError>
    where
        P: Program<D> + ?Sized,
    {
        tracing::info!(
            program = program.name(),
            annotation = ?annotation,
            "capturing program"
        );
        let (outcome, ()) = self
            .graphs_mut()
            .capture_with(annotation, |device, stream| program.enqueue(device, stream, annotation))?;
        tracing::debug!("capture outcome: {outcome:?}");
        // The graph is installed; a failed launch below must not trigger a recapture.
        self.keys.insert(annotation, KeyState::Captured);
        // Recording did not execute anything.
        self.graphs_mut().replay(annotation)?;
        Ok(())
    }

    fn run_eager<P>(&self, program: &P, annotation: Option<AnnotationId>) -> Result<(), RuntimeError>
    where
        P: Program<D> + ?Sized,
    {
        let stream = self.stream();
        program.enqueue(&self.device, stream, annotation)?;
        self.device.synchronize(stream)?;
        Ok(())
    }
}

impl<D: DeviceRuntime, S: ExecutorState> std::fmt::Debug for GraphExecutor<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("state", &std::any::type_name::<S>())
            .field("device", &self.device.name())
            .field("capture", &self.config.enable_graph_capture)
            .field("keys", &self.keys.len())
            .finish()
    }
}
