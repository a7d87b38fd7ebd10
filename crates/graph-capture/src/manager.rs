// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The graph capture manager.
//!
//! ```text
//!            capture_begin(None)               capture_end()
//!   Empty ─────────────────────► Capturing ─────────────────► Ready-Default
//!     ▲                              │                             │
//!     │                              │ capture_end()  (id = Some)  │ replay(None)
//!     │         reset()              ▼                             │
//!     └───────────────────────  Ready-Keyed[id] ◄── replay(Some(id))
//! ```
//!
//! The default slot and the keyed map are independent: a manager may hold a
//! default graph and any number of keyed graphs at once, but only one
//! capture session is active at a time.
//!
//! # Ordering
//! `capture_begin` drains the bound stream before recording starts, so work
//! queued earlier can never end up inside the graph. `replay` drains the
//! stream after launching, so the caller observes all effects of the graph
//! when it returns.
//!
//! # Concurrency
//! No internal locking. One thread owns a manager. With
//! [`CaptureMode::Global`](device_api::CaptureMode) only one capture may be
//! active on any stream in the process, so callers sharing a device across
//! threads must serialise their capture windows (or configure
//! `thread-local` mode where the device supports it).

use crate::annotation::describe;
use crate::{AnnotationId, CaptureConfig, CaptureError, CaptureStats, RecapturePolicy};
use device_api::{DeviceRuntime, ExecGuard, GraphGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// What `capture_end` did with the graph it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Installed as the default graph.
    Default,
    /// Installed under a new annotation id.
    Keyed(AnnotationId),
    /// The id already had a graph; the new one was destroyed.
    DuplicateDiscarded(AnnotationId),
    /// The id already had a graph; it was destroyed and replaced.
    Replaced(AnnotationId),
}

impl CaptureOutcome {
    /// The annotation id the capture ran under, if any.
    pub fn annotation(&self) -> Option<AnnotationId> {
        match self {
            CaptureOutcome::Default => None,
            CaptureOutcome::Keyed(id)
            | CaptureOutcome::DuplicateDiscarded(id)
            | CaptureOutcome::Replaced(id) => Some(*id),
        }
    }

    /// Returns `true` if the newly captured graph is now replayable.
    pub fn is_installed(&self) -> bool {
        !matches!(self, CaptureOutcome::DuplicateDiscarded(_))
    }
}

/// An active recording.
struct CaptureSession<D: DeviceRuntime> {
    annotation: Option<AnnotationId>,
    /// The stream recording started on; ending always targets it, even if
    /// the manager was rebound in between.
    stream: D::Stream,
}

/// Records operation sequences on a command stream into executable graphs
/// and replays them.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use graph_capture::{AnnotationId, GraphCaptureManager};
/// use sim_device::{SimBuffer, SimDevice};
///
/// let device = Arc::new(SimDevice::new());
/// let stream = device.create_stream("main").unwrap();
/// let buf = SimBuffer::from_vec("x", vec![1.0; 4]);
///
/// let mut graphs = GraphCaptureManager::new(Arc::clone(&device), stream.clone());
/// graphs.capture_begin(None).unwrap();
/// device.submit(&stream, buf.scale(2.0)).unwrap();
/// graphs.capture_end().unwrap();
///
/// // Captured work did not run; each replay runs it once.
/// assert_eq!(buf.to_vec(), vec![1.0; 4]);
/// graphs.replay(None).unwrap();
/// graphs.replay(None).unwrap();
/// assert_eq!(buf.to_vec(), vec![4.0; 4]);
///
/// assert!(!graphs.is_capture_allowed(Some(AnnotationId::DEFAULT_SKIP)));
/// ```
pub struct GraphCaptureManager<D: DeviceRuntime> {
    device: Arc<D>,
    stream: D::Stream,
    config: CaptureConfig,
    session: Option<CaptureSession<D>>,
    default_graph: Option<ExecGuard<D>>,
    keyed_graphs: HashMap<AnnotationId, ExecGuard<D>>,
    stats: CaptureStats,
}

impl<D: DeviceRuntime> GraphCaptureManager<D> {
    /// Creates a manager bound to `stream` with the default configuration.
    pub fn new(device: Arc<D>, stream: D::Stream) -> Self {
        Self::with_config(device, stream, CaptureConfig::default())
    }

    /// Creates a manager bound to `stream`.
    pub fn with_config(device: Arc<D>, stream: D::Stream, config: CaptureConfig) -> Self {
        tracing::debug!(
            device = device.name(),
            mode = %config.capture_mode,
            "graph capture manager created on stream {stream:?}"
        );
        Self {
            device,
            stream,
            config,
            session: None,
            default_graph: None,
            keyed_graphs: HashMap::new(),
            stats: CaptureStats::default(),
        }
    }

    /// Rebinds the stream used by subsequent captures and replays.
    ///
    /// An active session still ends on the stream it began on.
    pub fn bind_stream(&mut self, stream: D::Stream) {
        tracing::debug!("binding stream {stream:?}");
        self.stream = stream;
    }

    /// Begins recording on the bound stream.
    ///
    /// Blocks until every operation already queued on the stream has
    /// completed, then switches the stream into capture mode.
    ///
    /// # Errors
    /// - [`CaptureError::AlreadyCapturing`] if a session is active.
    /// - [`CaptureError::DefaultGraphExists`] for an unkeyed capture when a
    ///   default graph exists.
    /// - [`CaptureError::SkipAnnotation`] if `annotation` is the sentinel.
    /// - [`CaptureError::DuplicateAnnotation`] if the id is taken and the
    ///   policy is [`RecapturePolicy::Reject`].
    /// - [`CaptureError::Device`] if draining or begin-capture fails.
    pub fn capture_begin(&mut self, annotation: Option<AnnotationId>) -> Result<(), CaptureError> {
        if let Some(session) = &self.session {
            return Err(CaptureError::AlreadyCapturing {
                active: session.annotation,
            });
        }
        match annotation {
            None if self.default_graph.is_some() => return Err(CaptureError::DefaultGraphExists),
            Some(id) if self.config.is_skip(id) => return Err(CaptureError::SkipAnnotation(id)),
            Some(id)
                if self.config.recapture == RecapturePolicy::Reject
                    && self.keyed_graphs.contains_key(&id) =>
            {
                return Err(CaptureError::DuplicateAnnotation(id));
            }
            _ => {}
        }

        tracing::info!(
            annotation = %describe(&annotation),
            "capture begin on stream {:?}",
            self.stream
        );

        // Capture only intercepts future submissions.
        self.device
            .synchronize(&self.stream)
            .map_err(CaptureError::device("synchronize"))?;
        self.device
            .begin_capture(&self.stream, self.config.capture_mode)
            .map_err(CaptureError::device("begin_capture"))?;

        self.session = Some(CaptureSession {
            annotation,
            stream: self.stream.clone(),
        });
        Ok(())
    }

    /// Ends the active session and installs the resulting graph.
    ///
    /// The compiled graph is destroyed as soon as it has been instantiated
    /// (or immediately, when the outcome is a discarded duplicate).
    ///
    /// # Errors
    /// - [`CaptureError::NotCapturing`] without an active session.
    /// - [`CaptureError::EmptyGraph`] if the device produced no graph.
    /// - [`CaptureError::DuplicateAnnotation`] under the reject policy.
    /// - [`CaptureError::Device`] if ending or instantiating fails.
    ///
    /// The session is over in every case, including errors.
    pub fn capture_end(&mut self) -> Result<CaptureOutcome, CaptureError> {
        let session = self.session.take().ok_or(CaptureError::NotCapturing)?;
        let annotation = session.annotation;

        let graph = GraphGuard::from_capture(&self.device, &session.stream)
            .map_err(CaptureError::device("end_capture"))?
            .ok_or(CaptureError::EmptyGraph { annotation })?;

        let outcome = self.install(annotation, graph)?;
        tracing::info!(
            annotation = %describe(&annotation),
            "capture end: {outcome:?}"
        );
        Ok(outcome)
    }

    /// Captures whatever `record` submits to the stream.
    ///
    /// Begins a session, calls `record` with the device and the bound
    /// stream, and ends the session. If `record` fails, the session is
    /// still ended, its graph is discarded, and `record`'s error is
    /// returned.
    pub fn capture_with<T, E>(
        &mut self,
        annotation: Option<AnnotationId>,
        record: impl FnOnce(&D, &D::Stream) -> Result<T, E>,
    ) -> Result<(CaptureOutcome, T), E>
    where
        E: From<CaptureError>,
    {
        self.capture_begin(annotation)?;
        let stream = self.stream.clone();
        match record(&self.device, &stream) {
            Ok(value) => Ok((self.capture_end()?, value)),
            Err(e) => {
                self.abort_session();
                Err(e)
            }
        }
    }

    /// Launches a captured graph on the bound stream and waits for it.
    ///
    /// `None` replays the default graph, `Some(id)` the keyed graph.
    ///
    /// # Errors
    /// - [`CaptureError::AnnotationNotFound`] (recoverable) if `id` has no
    ///   graph.
    /// - [`CaptureError::NoDefaultGraph`] for an unkeyed replay without a
    ///   default graph.
    /// - [`CaptureError::AlreadyCapturing`] while a session is active.
    /// - [`CaptureError::Device`] if the launch or the drain fails.
    pub fn replay(&mut self, annotation: Option<AnnotationId>) -> Result<(), CaptureError> {
        if let Some(session) = &self.session {
            return Err(CaptureError::AlreadyCapturing {
                active: session.annotation,
            });
        }

        let start = Instant::now();
        let exec = match annotation {
            Some(id) => match self.keyed_graphs.get(&id) {
                Some(exec) => exec,
                None => {
                    self.stats.replay_misses += 1;
                    return Err(CaptureError::AnnotationNotFound(id));
                }
            },
            None => self
                .default_graph
                .as_ref()
                .ok_or(CaptureError::NoDefaultGraph)?,
        };

        tracing::info!(
            annotation = %describe(&annotation),
            "replaying graph on stream {:?}",
            self.stream
        );
        exec.launch(&self.stream)
            .map_err(CaptureError::device("launch"))?;
        self.device
            .synchronize(&self.stream)
            .map_err(CaptureError::device("synchronize"))?;

        match annotation {
            Some(_) => self.stats.keyed_replays += 1,
            None => self.stats.default_replays += 1,
        }
        self.stats.total_replay_duration += start.elapsed();
        Ok(())
    }

    /// Returns `false` only for the skip sentinel.
    pub fn is_capture_allowed(&self, annotation: Option<AnnotationId>) -> bool {
        annotation.map_or(true, |id| !self.config.is_skip(id))
    }

    /// Returns `true` if any keyed graph exists.
    pub fn has_keyed_captures(&self) -> bool {
        !self.keyed_graphs.is_empty()
    }

    /// Returns `true` if `id` has a keyed graph.
    pub fn has_keyed_capture(&self, id: AnnotationId) -> bool {
        self.keyed_graphs.contains_key(&id)
    }

    /// Returns `true` if a default graph exists.
    pub fn has_default_graph(&self) -> bool {
        self.default_graph.is_some()
    }

    /// Returns `true` if a graph exists for `annotation` (default or keyed).
    pub fn has_graph(&self, annotation: Option<AnnotationId>) -> bool {
        match annotation {
            Some(id) => self.has_keyed_capture(id),
            None => self.has_default_graph(),
        }
    }

    /// Number of keyed graphs.
    pub fn keyed_count(&self) -> usize {
        self.keyed_graphs.len()
    }

    /// Keyed annotation ids, ascending.
    pub fn keyed_annotations(&self) -> Vec<AnnotationId> {
        let mut ids: Vec<_> = self.keyed_graphs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns `true` while a capture session is active.
    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    /// The annotation of the active session (`None` if idle or unkeyed).
    pub fn active_annotation(&self) -> Option<AnnotationId> {
        self.session.as_ref().and_then(|s| s.annotation)
    }

    pub fn stream(&self) -> &D::Stream {
        &self.stream
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Destroys the default graph. Aborts an active unkeyed session.
    ///
    /// Idempotent.
    pub fn reset(&mut self) {
        if matches!(&self.session, Some(s) if s.annotation.is_none()) {
            self.abort_session();
        }
        if let Some(exec) = self.default_graph.take() {
            tracing::debug!("releasing default graph");
            drop(exec);
            self.stats.graphs_released += 1;
        }
    }

    /// Destroys every keyed graph and clears the map. Aborts an active
    /// keyed session, discarding its partially recorded graph.
    ///
    /// Idempotent.
    pub fn reset_keyed(&mut self) {
        if matches!(&self.session, Some(s) if s.annotation.is_some()) {
            self.abort_session();
        }
        let released = self.keyed_graphs.len();
        if released > 0 {
            tracing::debug!("releasing {released} keyed graphs");
            self.keyed_graphs.clear();
            self.stats.graphs_released += released as u64;
        }
    }

    // ── Private helpers ────────────────────────────────────────

    /// Instantiates `graph` into the slot for `annotation`, per the
    /// recapture policy. `graph` is dropped (destroyed) on return.
    fn install(
        &mut self,
        annotation: Option<AnnotationId>,
        graph: GraphGuard<D>,
    ) -> Result<CaptureOutcome, CaptureError> {
        let Some(id) = annotation else {
            let exec = graph.instantiate().map_err(CaptureError::device("instantiate"))?;
            self.default_graph = Some(exec);
            self.stats.default_captures += 1;
            return Ok(CaptureOutcome::Default);
        };

        if self.keyed_graphs.contains_key(&id) {
            match self.config.recapture {
                RecapturePolicy::KeepFirst => {
                    tracing::warn!(
                        annotation = %id,
                        "a graph is already captured for this annotation; discarding the new capture"
                    );
                    self.stats.duplicates_discarded += 1;
                    return Ok(CaptureOutcome::DuplicateDiscarded(id));
                }
                RecapturePolicy::Reject => return Err(CaptureError::DuplicateAnnotation(id)),
                RecapturePolicy::Overwrite => {
                    let exec = graph.instantiate().map_err(CaptureError::device("instantiate"))?;
                    // The previous executable is destroyed here.
                    self.keyed_graphs.insert(id, exec);
                    self.stats.duplicates_replaced += 1;
                    return Ok(CaptureOutcome::Replaced(id));
                }
            }
        }

        let exec = graph.instantiate().map_err(CaptureError::device("instantiate"))?;
        self.keyed_graphs.insert(id, exec);
        self.stats.keyed_captures += 1;
        Ok(CaptureOutcome::Keyed(id))
    }

    /// Ends the active session without installing its graph.
    fn abort_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        tracing::warn!(
            annotation = %describe(&session.annotation),
            "aborting capture session"
        );
        match GraphGuard::from_capture(&self.device, &session.stream) {
            // Dropping the guard destroys the partial graph.
            Ok(graph) => drop(graph),
            Err(e) => tracing::error!("failed to end aborted capture session: {e}"),
        }
        self.stats.aborted_sessions += 1;
    }
}

impl<D: DeviceRuntime> Drop for GraphCaptureManager<D> {
    fn drop(&mut self) {
        self.reset();
        self.reset_keyed();
    }
}

impl<D: DeviceRuntime> fmt::Debug for GraphCaptureManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCaptureManager")
            .field("device", &self.device.name())
            .field("stream", &self.stream)
            .field("capturing", &self.is_capturing())
            .field("has_default_graph", &self.has_default_graph())
            .field("keyed", &self.keyed_annotations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_api::{CaptureMode, DeviceError, DeviceRuntime};
    use sim_device::{DeviceOp, Fault, SimBuffer, SimDevice, SimStream};

    fn setup() -> (Arc<SimDevice>, SimStream, GraphCaptureManager<SimDevice>) {
        let device = Arc::new(SimDevice::new());
        let stream = device.create_stream("test").unwrap();
        let manager = GraphCaptureManager::new(Arc::clone(&device), stream.clone());
        (device, stream, manager)
    }

    fn capture_noop(
        manager: &mut GraphCaptureManager<SimDevice>,
        device: &SimDevice,
        stream: &SimStream,
        annotation: Option<AnnotationId>,
        label: &str,
    ) -> CaptureOutcome {
        manager.capture_begin(annotation).unwrap();
        device.submit(stream, DeviceOp::noop(label)).unwrap();
        manager.capture_end().unwrap()
    }

    #[test]
    fn test_default_capture_and_replay() {
        let (device, stream, mut manager) = setup();
        let buf = SimBuffer::from_vec("x", vec![1.0, 2.0]);

        manager.capture_begin(None).unwrap();
        assert!(manager.is_capturing());
        device.submit(&stream, buf.add_scalar(1.0)).unwrap();
        let outcome = manager.capture_end().unwrap();

        assert_eq!(outcome, CaptureOutcome::Default);
        assert!(manager.has_default_graph());
        assert_eq!(buf.to_vec(), vec![1.0, 2.0]);

        manager.replay(None).unwrap();
        assert_eq!(buf.to_vec(), vec![2.0, 3.0]);
        assert_eq!(manager.stats().default_replays, 1);

        // The compiled graph is gone, only the executable remains.
        assert_eq!(device.live_graphs(), 0);
        assert_eq!(device.live_execs(), 1);
    }

    #[test]
    fn test_capture_begin_drains_queued_work() {
        let (device, stream, mut manager) = setup();
        let buf = SimBuffer::zeros("x", 3);

        // Queued before the capture: must run, not be recorded.
        device.submit(&stream, buf.fill(5.0)).unwrap();
        manager.capture_begin(None).unwrap();
        assert_eq!(buf.to_vec(), vec![5.0; 3]);

        device.submit(&stream, buf.scale(2.0)).unwrap();
        manager.capture_end().unwrap();
        assert_eq!(buf.to_vec(), vec![5.0; 3]);
        assert_eq!(device.stats().ops_recorded, 1);
    }

    #[test]
    fn test_second_default_capture_rejected() {
        let (device, stream, mut manager) = setup();
        capture_noop(&mut manager, &device, &stream, None, "a");

        let err = manager.capture_begin(None).unwrap_err();
        assert!(matches!(err, CaptureError::DefaultGraphExists));
        assert!(err.is_usage_error());
        assert!(!manager.is_capturing());

        // Keyed captures are still allowed next to a default graph.
        capture_noop(&mut manager, &device, &stream, Some(AnnotationId::new(1)), "b");
        assert!(manager.has_keyed_captures());
    }

    #[test]
    fn test_begin_is_not_reentrant() {
        let (_device, _stream, mut manager) = setup();
        manager.capture_begin(Some(AnnotationId::new(1))).unwrap();
        let err = manager.capture_begin(Some(AnnotationId::new(2))).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::AlreadyCapturing { active: Some(id) } if id == AnnotationId::new(1)
        ));
    }

    #[test]
    fn test_end_without_begin() {
        let (_device, _stream, mut manager) = setup();
        assert!(matches!(manager.capture_end(), Err(CaptureError::NotCapturing)));
    }

    #[test]
    fn test_empty_capture_is_an_error() {
        let (_device, _stream, mut manager) = setup();
        manager.capture_begin(None).unwrap();
        let err = manager.capture_end().unwrap_err();
        assert!(matches!(err, CaptureError::EmptyGraph { annotation: None }));
        assert!(!manager.is_capturing());
        assert!(!manager.has_default_graph());
    }

    #[test]
    fn test_device_reports_no_graph() {
        let (device, stream, mut manager) = setup();
        device.inject_fault(Fault::EndCaptureNoGraph);
        manager.capture_begin(Some(AnnotationId::new(3))).unwrap();
        device.submit(&stream, DeviceOp::noop("k")).unwrap();
        assert!(matches!(
            manager.capture_end(),
            Err(CaptureError::EmptyGraph { annotation: Some(_) })
        ));
        assert!(!manager.has_keyed_captures());
    }

    #[test]
    fn test_skip_sentinel() {
        let (_device, _stream, mut manager) = setup();
        assert!(!manager.is_capture_allowed(Some(AnnotationId::DEFAULT_SKIP)));
        assert!(manager.is_capture_allowed(Some(AnnotationId::new(0))));
        assert!(manager.is_capture_allowed(None));

        assert!(matches!(
            manager.capture_begin(Some(AnnotationId::DEFAULT_SKIP)),
            Err(CaptureError::SkipAnnotation(_))
        ));
    }

    #[test]
    fn test_custom_skip_sentinel() {
        let device = Arc::new(SimDevice::new());
        let stream = device.create_stream("s").unwrap();
        let config = CaptureConfig {
            skip_annotation: AnnotationId::new(99),
            ..Default::default()
        };
        let manager = GraphCaptureManager::with_config(device, stream, config);
        assert!(!manager.is_capture_allowed(Some(AnnotationId::new(99))));
        assert!(manager.is_capture_allowed(Some(AnnotationId::new(-1))));
    }

    #[test]
    fn test_keyed_miss_is_recoverable() {
        let (device, stream, mut manager) = setup();
        capture_noop(&mut manager, &device, &stream, Some(AnnotationId::new(1)), "a");

        let err = manager.replay(Some(AnnotationId::new(2))).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(manager.stats().replay_misses, 1);

        manager.replay(Some(AnnotationId::new(1))).unwrap();
    }

    #[test]
    fn test_replay_default_without_graph() {
        let (_device, _stream, mut manager) = setup();
        assert!(matches!(manager.replay(None), Err(CaptureError::NoDefaultGraph)));
    }

    #[test]
    fn test_replay_while_capturing_rejected() {
        let (device, stream, mut manager) = setup();
        capture_noop(&mut manager, &device, &stream, None, "a");
        manager.capture_begin(Some(AnnotationId::new(1))).unwrap();
        assert!(matches!(
            manager.replay(None),
            Err(CaptureError::AlreadyCapturing { .. })
        ));
    }

    #[test]
    fn test_keep_first_discards_duplicate() {
        let (device, stream, mut manager) = setup();
        let id = AnnotationId::new(4);

        assert_eq!(
            capture_noop(&mut manager, &device, &stream, Some(id), "first"),
            CaptureOutcome::Keyed(id)
        );
        let outcome = capture_noop(&mut manager, &device, &stream, Some(id), "second");
        assert_eq!(outcome, CaptureOutcome::DuplicateDiscarded(id));
        assert!(!outcome.is_installed());

        assert_eq!(device.live_graphs(), 0);
        assert_eq!(device.live_execs(), 1);

        device.set_trace(true);
        manager.replay(Some(id)).unwrap();
        assert_eq!(device.trace(), vec!["first"]);
    }

    #[test]
    fn test_overwrite_policy_replaces() {
        let device = Arc::new(SimDevice::new());
        let stream = device.create_stream("s").unwrap();
        let config = CaptureConfig {
            recapture: RecapturePolicy::Overwrite,
            ..Default::default()
        };
        let mut manager = GraphCaptureManager::with_config(Arc::clone(&device), stream.clone(), config);
        let id = AnnotationId::new(4);

        capture_noop(&mut manager, &device, &stream, Some(id), "first");
        let outcome = capture_noop(&mut manager, &device, &stream, Some(id), "second");
        assert_eq!(outcome, CaptureOutcome::Replaced(id));
        assert_eq!(device.live_execs(), 1);

        device.set_trace(true);
        manager.replay(Some(id)).unwrap();
        assert_eq!(device.trace(), vec!["second"]);
    }

    #[test]
    fn test_reject_policy_fails_early() {
        let device = Arc::new(SimDevice::new());
        let stream = device.create_stream("s").unwrap();
        let config = CaptureConfig {
            recapture: RecapturePolicy::Reject,
            ..Default::default()
        };
        let mut manager = GraphCaptureManager::with_config(Arc::clone(&device), stream.clone(), config);
        let id = AnnotationId::new(4);

        capture_noop(&mut manager, &device, &stream, Some(id), "first");
        assert!(matches!(
            manager.capture_begin(Some(id)),
            Err(CaptureError::DuplicateAnnotation(_))
        ));
        assert!(!manager.is_capturing());
        assert_eq!(device.stats().captures_begun, 1);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (device, stream, mut manager) = setup();
        capture_noop(&mut manager, &device, &stream, None, "a");

        manager.reset();
        manager.reset();
        assert!(!manager.has_default_graph());
        assert_eq!(device.live_execs(), 0);
        assert!(matches!(manager.replay(None), Err(CaptureError::NoDefaultGraph)));

        // A fresh default capture is allowed again.
        capture_noop(&mut manager, &device, &stream, None, "b");
        manager.replay(None).unwrap();
    }

    #[test]
    fn test_reset_keeps_keyed_and_reset_keyed_keeps_default() {
        let (device, stream, mut manager) = setup();
        capture_noop(&mut manager, &device, &stream, None, "d");
        capture_noop(&mut manager, &device, &stream, Some(AnnotationId::new(1)), "k1");
        capture_noop(&mut manager, &device, &stream, Some(AnnotationId::new(2)), "k2");

        manager.reset();
        assert_eq!(manager.keyed_count(), 2);
        assert_eq!(device.live_execs(), 2);

        manager.reset_keyed();
        manager.reset_keyed();
        assert!(!manager.has_keyed_captures());
        assert_eq!(device.live_execs(), 0);
        assert!(manager.replay(Some(AnnotationId::new(1))).unwrap_err().is_recoverable());
        assert_eq!(manager.stats().graphs_released, 3);
    }

    #[test]
    fn test_reset_keyed_aborts_open_keyed_session() {
        let (device, stream, mut manager) = setup();
        manager.capture_begin(Some(AnnotationId::new(9))).unwrap();
        device.submit(&stream, DeviceOp::noop("partial")).unwrap();

        // An unkeyed reset leaves a keyed session alone.
        manager.reset();
        assert!(manager.is_capturing());

        manager.reset_keyed();
        assert!(!manager.is_capturing());
        assert!(!stream.is_capturing());
        assert_eq!(device.active_captures(), 0);
        assert_eq!(device.live_graphs(), 0);
        assert_eq!(manager.stats().aborted_sessions, 1);
    }

    #[test]
    fn test_capture_with_ends_session_on_error() {
        let (device, stream, mut manager) = setup();

        let result: Result<(CaptureOutcome, ()), CaptureError> =
            manager.capture_with(None, |dev, s| {
                dev.submit(s, DeviceOp::noop("x"))
                    .map_err(CaptureError::device("submit"))?;
                Err(CaptureError::InvalidAnnotation("record failed".into()))
            });
        assert!(matches!(result, Err(CaptureError::InvalidAnnotation(_))));
        assert!(!manager.is_capturing());
        assert!(!stream.is_capturing());
        assert!(!manager.has_default_graph());
        assert_eq!(device.live_graphs(), 0);

        let (outcome, n) = manager
            .capture_with(None, |dev, s| {
                dev.submit(s, DeviceOp::noop("y"))
                    .map_err(CaptureError::device("submit"))?;
                Ok::<_, CaptureError>(1)
            })
            .unwrap();
        assert_eq!(outcome, CaptureOutcome::Default);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_begin_failure_leaves_manager_idle() {
        let (device, _stream, mut manager) = setup();
        device.inject_fault(Fault::BeginCapture);
        let err = manager.capture_begin(None).unwrap_err();
        assert!(matches!(err, CaptureError::Device { op: "begin_capture", .. }));
        assert!(!manager.is_capturing());
        manager.capture_begin(None).unwrap();
    }

    #[test]
    fn test_instantiate_failure_releases_compiled_graph() {
        let (device, stream, mut manager) = setup();
        device.inject_fault(Fault::Instantiate);
        manager.capture_begin(None).unwrap();
        device.submit(&stream, DeviceOp::noop("k")).unwrap();

        let err = manager.capture_end().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Device {
                op: "instantiate",
                source: DeviceError::Native { .. }
            }
        ));
        assert_eq!(device.live_graphs(), 0);
        assert!(!manager.has_default_graph());
        assert!(!manager.is_capturing());
    }

    #[test]
    fn test_launch_failure_propagates() {
        let (device, stream, mut manager) = setup();
        capture_noop(&mut manager, &device, &stream, None, "a");
        device.inject_fault(Fault::Launch);
        assert!(matches!(
            manager.replay(None),
            Err(CaptureError::Device { op: "launch", .. })
        ));
        manager.replay(None).unwrap();
    }

    #[test]
    fn test_global_mode_conflict_across_managers() {
        let device = Arc::new(SimDevice::new());
        let a = device.create_stream("a").unwrap();
        let b = device.create_stream("b").unwrap();
        let mut first = GraphCaptureManager::new(Arc::clone(&device), a);
        let mut second = GraphCaptureManager::new(Arc::clone(&device), b);

        first.capture_begin(None).unwrap();
        let err = second.capture_begin(None).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Device {
                source: DeviceError::CaptureConflict { mode: CaptureMode::Global, .. },
                ..
            }
        ));
        assert!(!second.is_capturing());
    }

    #[test]
    fn test_rebind_mid_capture_ends_on_original_stream() {
        let (device, stream, mut manager) = setup();
        let other = device.create_stream("other").unwrap();

        manager.capture_begin(None).unwrap();
        device.submit(&stream, DeviceOp::noop("k")).unwrap();
        manager.bind_stream(other.clone());
        manager.capture_end().unwrap();

        assert!(!stream.is_capturing());
        device.set_trace(true);
        manager.replay(None).unwrap();
        assert_eq!(device.trace(), vec!["k"]);
    }

    #[test]
    fn test_keyed_annotations_sorted() {
        let (device, stream, mut manager) = setup();
        for id in [5, 1, 3] {
            capture_noop(&mut manager, &device, &stream, Some(AnnotationId::new(id)), "k");
        }
        assert_eq!(
            manager.keyed_annotations(),
            vec![AnnotationId::new(1), AnnotationId::new(3), AnnotationId::new(5)]
        );
        assert!(manager.has_graph(Some(AnnotationId::new(3))));
        assert!(!manager.has_graph(None));
    }

    #[test]
    fn test_debug_format() {
        let (_device, _stream, manager) = setup();
        let debug = format!("{manager:?}");
        assert!(debug.contains("GraphCaptureManager"));
        assert!(debug.contains("sim:0"));
    }
}
