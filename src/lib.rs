//! # Memory trace exploration core
//!
//! Control logic for browsing a recorded (or live) memory allocation trace:
//! which frames are visible, which frames a drag-selection covers, what is
//! alive in that interval, and who references it.
//!
//! ## Components
//!
//! 1. **Timeline**: trace boundaries and the per-frame series for the
//!    visible range
//! 2. **Viewport**: zoom/scroll state and live-edge tailing
//! 3. **Selection**: pixel rectangle to frame interval, optional marker snap
//! 4. **Aggregation**: single-flight, cancellable live-object grouping on a
//!    worker thread
//! 5. **References**: asynchronous reference-graph queries keyed by request id
//! 6. **Session**: `Closed → Connecting → Live → Stopped` capture lifecycle
//!
//! [`Explorer`] owns all of them on the control thread and publishes
//! [`ExplorerEvent`]s to views.
//!
//! ## Usage Example
//!
//! ```ignore
//! use memscope::{Explorer, ExplorerConfig, InMemoryTrace};
//!
//! let trace = Arc::new(InMemoryTrace::from_events(parse_trace(&text)?));
//! let mut explorer = Explorer::new(trace, transport, resolver, ExplorerConfig::default())?;
//! explorer.open_trace()?;
//! explorer.aggregate(FrameRange::new(0, 99))?;
//! let result = explorer.wait_for_aggregation(Duration::from_secs(5));
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod aggregation; // Single-flight live-object aggregation
pub mod events; // Notifications to views
pub mod references; // Reference query correlation
pub mod selection; // Pixel selection to frame interval
pub mod session; // Capture session lifecycle
pub mod source; // Trace store, transport and resolver interfaces
pub mod timeline; // Boundaries and timeline series
pub mod util; // Helper functions
pub mod viewport; // Zoom and scroll

pub use aggregation::{
    AggregationError, AggregationResult, AggregationWorker, Generation, WorkerEvent, WorkerState,
};
pub use events::{EventBus, ExplorerEvent};
pub use references::{ReferenceCorrelator, ReferenceDelivery, ReferenceResult, ReferenceTree};
pub use selection::{AxisTransform, LinearAxis, PixelRect, SelectionMapper, SelectionRequest};
pub use session::{ConnectionFault, Endpoint, LaunchSpec, PollAction, PollOutcome, SessionState};
pub use source::{CaptureTransport, InMemoryTrace, ReferenceResolver, TraceError, TraceSource};
pub use timeline::{Boundaries, FrameRange, TimelineRegion};
pub use viewport::{Viewport, ZoomLimits, ZoomState};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use thiserror::Error;
use tracing::{debug, info, warn};

use references::{QueryOrigin, ReferenceQuery};
use session::SessionController;
use source::{CallstackId, TypeId};

/// Configuration of an [`Explorer`].
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Allowed zoom factors (pixels per frame).
    pub zoom_limits: ZoomLimits,
    /// Zoom applied when a trace is opened or a session starts.
    pub initial_zoom: f64,
    /// Wheel pixels per unit of zoom.
    pub wheel_sensitivity: f64,
    /// Approximate number of progress reports per aggregation.
    pub progress_steps: usize,
    /// Records scanned between cancellation checks.
    pub cancel_check_interval: usize,
    /// Maximum number of addresses sent per reference query.
    pub reference_address_limit: Option<usize>,
    /// Cadence of live-session poll ticks.
    pub poll_interval: Duration,
    /// Snap selections to marker frames by default.
    pub snap_to_markers: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            zoom_limits: ZoomLimits::default(),
            initial_zoom: 1.0,
            wheel_sensitivity: 1000.0,
            progress_steps: 10,
            cancel_check_interval: 256,
            reference_address_limit: None,
            poll_interval: Duration::from_millis(100),
            snap_to_markers: false,
        }
    }
}

impl ExplorerConfig {
    /// Override the zoom limits.
    pub fn with_zoom_limits(mut self, min: f64, max: f64) -> Self {
        self.zoom_limits = ZoomLimits { min, max };
        self
    }

    /// Override the initial zoom.
    pub fn with_initial_zoom(mut self, zoom: f64) -> Self {
        self.initial_zoom = zoom;
        self
    }

    /// Override the wheel sensitivity.
    pub fn with_wheel_sensitivity(mut self, sensitivity: f64) -> Self {
        self.wheel_sensitivity = sensitivity;
        self
    }

    /// Override the number of progress reports.
    pub fn with_progress_steps(mut self, steps: usize) -> Self {
        self.progress_steps = steps;
        self
    }

    /// Override the cancellation check interval.
    pub fn with_cancel_check_interval(mut self, interval: usize) -> Self {
        self.cancel_check_interval = interval;
        self
    }

    /// Limit the addresses per reference query.
    pub fn with_reference_address_limit(mut self, limit: Option<usize>) -> Self {
        self.reference_address_limit = limit;
        self
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable marker snapping by default.
    pub fn with_snap_to_markers(mut self, enabled: bool) -> Self {
        self.snap_to_markers = enabled;
        self
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.zoom_limits.is_valid() {
            return Err(ConfigError::InvalidZoomLimits {
                min: self.zoom_limits.min,
                max: self.zoom_limits.max,
            });
        }
        if !self.initial_zoom.is_finite() || self.initial_zoom <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "initial_zoom",
                value: self.initial_zoom,
            });
        }
        if !self.wheel_sensitivity.is_finite() || self.wheel_sensitivity <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "wheel_sensitivity",
                value: self.wheel_sensitivity,
            });
        }
        if self.progress_steps == 0 {
            return Err(ConfigError::Zero("progress_steps"));
        }
        if self.cancel_check_interval == 0 {
            return Err(ConfigError::Zero("cancel_check_interval"));
        }
        if self.reference_address_limit == Some(0) {
            return Err(ConfigError::Zero("reference_address_limit"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero("poll_interval"));
        }
        Ok(())
    }
}

/// Invalid explorer configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Zoom limits are not a positive, ordered interval.
    #[error("invalid zoom limits [{min}, {max}]")]
    InvalidZoomLimits {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// A float setting must be positive and finite.
    #[error("{field} must be positive, got {value}")]
    NotPositive {
        /// Setting name.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A count or duration setting must be non-zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Errors surfaced by [`Explorer`] operations.
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Trace store fault.
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// Session could not be started or is in the wrong state.
    #[error(transparent)]
    Connection(#[from] ConnectionFault),

    /// Aggregation could not be started.
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// Control-thread orchestrator.
///
/// Owns boundaries, viewport, timeline series, the aggregation slot, the
/// reference correlator and the session. All mutation happens through
/// `&mut self`; worker and resolver threads only talk back through channels
/// drained by [`Explorer::pump`].
pub struct Explorer {
    config: ExplorerConfig,
    source: Arc<dyn TraceSource>,
    boundaries: Boundaries,
    viewport: Viewport,
    region: TimelineRegion,
    worker: AggregationWorker,
    current: Option<Arc<AggregationResult>>,
    progress: Option<(usize, usize)>,
    last_warning: Option<AggregationError>,
    references: ReferenceCorrelator,
    reference_tree: Option<ReferenceTree>,
    session: SessionController,
    events: EventBus,
}

impl std::fmt::Debug for Explorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Explorer")
            .field("boundaries", &self.boundaries)
            .field("viewport", &self.viewport)
            .field("worker", &self.worker)
            .field("progress", &self.progress)
            .field("references", &self.references)
            .field("session", &self.session)
            .finish()
    }
}

impl Explorer {
    /// Create an explorer over `source`. The session starts `Closed`.
    pub fn new(
        source: Arc<dyn TraceSource>,
        transport: Box<dyn CaptureTransport>,
        resolver: Arc<dyn ReferenceResolver>,
        config: ExplorerConfig,
    ) -> Result<Self, ExplorerError> {
        config.validate()?;
        let worker = AggregationWorker::new(
            Arc::clone(&source),
            config.cancel_check_interval,
            config.progress_steps,
        );
        Ok(Self {
            viewport: Viewport::new(
                config.zoom_limits,
                config.initial_zoom,
                config.wheel_sensitivity,
            ),
            references: ReferenceCorrelator::new(resolver, config.reference_address_limit),
            source,
            boundaries: Boundaries::default(),
            region: TimelineRegion::new(),
            worker,
            current: None,
            progress: None,
            last_warning: None,
            reference_tree: None,
            session: SessionController::new(transport),
            events: EventBus::new(),
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Current trace boundaries.
    pub fn boundaries(&self) -> Boundaries {
        self.boundaries
    }

    /// Viewport model.
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Visible frame range.
    pub fn visible_range(&self) -> FrameRange {
        self.viewport.visible_range()
    }

    /// Timeline series of the visible range.
    pub fn region(&self) -> &TimelineRegion {
        &self.region
    }

    /// Most recently published aggregation.
    pub fn current_result(&self) -> Option<&Arc<AggregationResult>> {
        self.current.as_ref()
    }

    /// `(current, total)` of the running aggregation.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.progress
    }

    /// State of the aggregation slot.
    pub fn aggregation_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Fault of the last failed aggregation, until the next one completes.
    pub fn last_warning(&self) -> Option<&AggregationError> {
        self.last_warning.as_ref()
    }

    /// Tree built from the latest reference result.
    pub fn reference_tree(&self) -> Option<&ReferenceTree> {
        self.reference_tree.as_ref()
    }

    /// Session state.
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Fault that ended the last session.
    pub fn session_fault(&self) -> Option<&ConnectionFault> {
        self.session.last_fault()
    }

    /// Register a view for notifications.
    pub fn subscribe(&mut self) -> Receiver<ExplorerEvent> {
        self.events.subscribe()
    }

    // ----- session -------------------------------------------------------

    /// Show an already recorded trace without a live connection.
    pub fn open_trace(&mut self) -> Result<FrameRange, ExplorerError> {
        self.session.open_offline()?;
        info!("trace opened offline");
        self.events
            .publish(ExplorerEvent::SessionChanged(self.session.state()));
        Ok(self.reset_view())
    }

    /// Connect to a running profiler.
    pub fn start_capture(&mut self, endpoint: &Endpoint) -> Result<FrameRange, ExplorerError> {
        let outcome = self.session.start(endpoint);
        self.finish_connect(outcome)
    }

    /// Launch a target program with the profiler attached.
    pub fn launch(&mut self, spec: &LaunchSpec) -> Result<FrameRange, ExplorerError> {
        let outcome = self.session.launch(spec);
        self.finish_connect(outcome)
    }

    /// Stop the live session. Data stays viewable.
    pub fn stop(&mut self) -> Result<(), ExplorerError> {
        self.session.stop()?;
        self.events
            .publish(ExplorerEvent::SessionChanged(self.session.state()));
        Ok(())
    }

    /// Pause or resume record emission.
    pub fn set_paused(&mut self, paused: bool) -> Result<(), ExplorerError> {
        if paused {
            self.session.pause()?;
        } else {
            self.session.resume()?;
        }
        self.events
            .publish(ExplorerEvent::SessionChanged(self.session.state()));
        Ok(())
    }

    /// Close the session and forget everything derived from the trace.
    pub fn close(&mut self) {
        self.session.close();
        self.clear_view();
        self.events
            .publish(ExplorerEvent::SessionChanged(self.session.state()));
    }

    fn finish_connect(
        &mut self,
        outcome: Result<(), ConnectionFault>,
    ) -> Result<FrameRange, ExplorerError> {
        match outcome {
            Ok(()) => {
                self.events
                    .publish(ExplorerEvent::SessionChanged(self.session.state()));
                Ok(self.reset_view())
            }
            Err(fault) => {
                self.clear_view();
                self.events.publish(ExplorerEvent::SessionFault(fault.clone()));
                self.events
                    .publish(ExplorerEvent::SessionChanged(self.session.state()));
                Err(fault.into())
            }
        }
    }

    fn reset_view(&mut self) -> FrameRange {
        self.boundaries.init(self.source.boundaries());
        let visible = self
            .viewport
            .reset(&self.boundaries, self.config.initial_zoom);
        self.viewport_changed(visible)
    }

    fn clear_view(&mut self) {
        self.worker.cancel_and_wait();
        self.boundaries.clear();
        self.region.clear();
        self.current = None;
        self.progress = None;
        self.last_warning = None;
        self.reference_tree = None;
    }

    // ----- viewport ------------------------------------------------------

    /// Scroll the left edge to `position`, clamped to the boundaries.
    pub fn scroll(&mut self, position: i64) -> FrameRange {
        let visible = self.viewport.set_scroll(position, &self.boundaries);
        self.viewport_changed(visible)
    }

    /// Set the zoom factor; returns the effective factor.
    pub fn zoom(&mut self, factor: f64) -> f64 {
        let effective = self.viewport.set_zoom(factor);
        self.viewport_changed(self.viewport.visible_range());
        effective
    }

    /// Apply a wheel gesture; returns the effective zoom factor.
    pub fn wheel(&mut self, pixel_delta: f64) -> f64 {
        let effective = self.viewport.wheel(pixel_delta);
        self.viewport_changed(self.viewport.visible_range());
        effective
    }

    /// The canvas was resized.
    pub fn resize(&mut self, canvas_width: f64) -> FrameRange {
        let visible = self.viewport.resize(canvas_width);
        self.viewport_changed(visible)
    }

    fn viewport_changed(&mut self, visible: FrameRange) -> FrameRange {
        self.refresh_region(visible);
        self.events.publish(ExplorerEvent::ViewportChanged(visible));
        visible
    }

    fn refresh_region(&mut self, visible: FrameRange) {
        self.region.update_region(self.source.as_ref(), visible);
        self.events.publish(ExplorerEvent::RegionRefreshed(visible));
    }

    // ----- selection and aggregation -------------------------------------

    /// Map a drag selection and aggregate the frames it covers.
    ///
    /// Returns the selection in edge coordinates and the request generation.
    pub fn select(
        &mut self,
        request: SelectionRequest,
        transform: &dyn AxisTransform,
    ) -> Result<(FrameRange, Generation), ExplorerError> {
        let selection = SelectionMapper::new(self.source.as_ref()).map(request, transform);
        debug!(%selection, snap = request.snap_to_marker, "selection mapped");
        let generation = self.aggregate(selection.covered_frames())?;
        Ok((selection, generation))
    }

    /// Select between two canvas x coordinates using the current viewport
    /// and the configured snap policy.
    pub fn select_pixels(
        &mut self,
        press_x: f64,
        release_x: f64,
    ) -> Result<(FrameRange, Generation), ExplorerError> {
        let request = SelectionRequest {
            pixel_rect: PixelRect::from_corners((press_x, 0.0), (release_x, 0.0)),
            snap_to_marker: self.config.snap_to_markers,
        };
        let axis = LinearAxis::from_zoom(self.viewport.state());
        self.select(request, &axis)
    }

    /// Aggregate live objects in `range` (inclusive frames), superseding any
    /// running aggregation.
    pub fn aggregate(&mut self, range: FrameRange) -> Result<Generation, ExplorerError> {
        self.progress = None;
        Ok(self.worker.submit(range)?)
    }

    /// Cancel the running aggregation. The published result is kept.
    pub fn cancel_aggregation(&mut self) -> Option<Generation> {
        let cancelled = self.worker.cancel_and_wait();
        if cancelled.is_some() {
            self.progress = None;
        }
        cancelled
    }

    /// Apply every pending worker and resolver notification.
    ///
    /// Returns the number of notifications handled.
    pub fn pump(&mut self) -> usize {
        let worker_events = self.worker.poll_events();
        let deliveries = self.references.poll();
        let handled = worker_events.len() + deliveries.len();
        for event in worker_events {
            self.apply_worker_event(event);
        }
        for delivery in deliveries {
            self.apply_reference_delivery(delivery);
        }
        handled
    }

    /// Block until the running aggregation ends or `timeout` passes.
    ///
    /// Returns the published result if this call saw it complete.
    pub fn wait_for_aggregation(&mut self, timeout: Duration) -> Option<Arc<AggregationResult>> {
        let deadline = Instant::now() + timeout;
        while self.worker.state() != WorkerState::Idle {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let Some(event) = self.worker.next_event(remaining) else {
                continue;
            };
            if let WorkerEvent::Completed(result) = &event {
                let result = Arc::clone(result);
                let current = self.worker.is_current(result.generation);
                self.apply_worker_event(event);
                if current {
                    return Some(result);
                }
            } else {
                self.apply_worker_event(event);
            }
        }
        None
    }

    fn apply_worker_event(&mut self, event: WorkerEvent) {
        let generation = event.generation();
        if !self.worker.is_current(generation) {
            debug!(generation, latest = self.worker.latest_generation(), "suppressing stale aggregation event");
            return;
        }
        match event {
            WorkerEvent::Started { range, total, .. } => {
                self.progress = Some((0, total));
                self.events.publish(ExplorerEvent::AggregationStarted {
                    generation,
                    range,
                    total,
                });
            }
            WorkerEvent::Progress { current, total, .. } => {
                self.progress = Some((current, total));
                self.events.publish(ExplorerEvent::AggregationProgress {
                    generation,
                    current,
                    total,
                });
            }
            WorkerEvent::Completed(result) => {
                info!(generation, objects = result.total_count(), "aggregation published");
                self.progress = None;
                self.last_warning = None;
                self.current = Some(Arc::clone(&result));
                self.events.publish(ExplorerEvent::AggregationPublished(result));
            }
            WorkerEvent::Cancelled { .. } => {
                self.progress = None;
            }
            WorkerEvent::Failed { error, .. } => {
                warn!(generation, %error, "aggregation failed, keeping previous result");
                self.progress = None;
                self.events.publish(ExplorerEvent::AggregationWarning {
                    generation,
                    message: error.to_string(),
                });
                self.last_warning = Some(error);
            }
        }
    }

    // ----- references ----------------------------------------------------

    /// Query the referrers of the objects of `type_id` allocated from
    /// `callstack_id` in the current result.
    ///
    /// Returns `None` when there is no such group.
    pub fn find_references(
        &mut self,
        type_id: TypeId,
        callstack_id: CallstackId,
    ) -> Option<ReferenceQuery> {
        let addresses = self
            .current
            .as_ref()?
            .addresses_for(type_id, callstack_id)?
            .to_vec();
        Some(self.references.query(
            &addresses,
            QueryOrigin::Callstack {
                type_id,
                callstack_id,
            },
        ))
    }

    /// Query the referrers of explicit addresses.
    pub fn query_references(&mut self, addresses: &[u64]) -> ReferenceQuery {
        self.references.query(addresses, QueryOrigin::Addresses)
    }

    /// Regroup the objects found under `address` in the reference tree by
    /// type and callstack.
    ///
    /// Only objects of the current result are found. Returns `None` without
    /// a reference tree or a result.
    pub fn search_references(&self, address: u64, max_depth: usize) -> Option<AggregationResult> {
        let tree = self.reference_tree.as_ref()?;
        let current = self.current.as_ref()?;
        let addresses = tree.addresses_below(address, max_depth);
        debug!(address, reachable = addresses.len(), "searching reference subtree");
        Some(current.search_addresses(&addresses))
    }

    /// Block until the latest reference query is answered or `timeout`
    /// passes.
    pub fn wait_for_references(&mut self, timeout: Duration) -> Option<&ReferenceTree> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let delivery = self.references.next_delivery(remaining)?;
            let current = matches!(delivery, ReferenceDelivery::Current { .. });
            self.apply_reference_delivery(delivery);
            if current {
                return self.reference_tree.as_ref();
            }
        }
    }

    fn apply_reference_delivery(&mut self, delivery: ReferenceDelivery) {
        let ReferenceDelivery::Current {
            result, queried, ..
        } = &delivery
        else {
            return;
        };
        if let Some(error) = &result.error {
            warn!(request_id = result.request_id, %error, "reference resolution failed");
        }
        let tree = ReferenceTree::new(queried, result);
        self.reference_tree = Some(tree);
        self.events.publish(ExplorerEvent::ReferencesResolved(delivery));
    }

    // ----- polling -------------------------------------------------------

    /// One poll tick of a live session.
    ///
    /// Refreshes the boundaries, follows the live edge when the view was
    /// tailing it, and otherwise refreshes the visible series only when new
    /// frames entered it.
    pub fn tick(&mut self) -> PollOutcome {
        if !self.session.state().is_live() {
            return PollOutcome::skipped();
        }

        let backlog = match self.session.check_connection() {
            Ok(backlog) => backlog,
            Err(fault) => {
                self.events.publish(ExplorerEvent::SessionFault(fault));
                self.events
                    .publish(ExplorerEvent::SessionChanged(self.session.state()));
                return PollOutcome {
                    action: PollAction::Disconnected,
                    update: None,
                    backlog: 0,
                };
            }
        };

        let visible_before = self.viewport.visible_range();
        let was_tailing = self.viewport.sees_live_edge(&self.boundaries);
        let update = self.boundaries.refresh(self.source.boundaries());

        let action = if update.advanced() && self.viewport.follow_live_edge(&update, was_tailing) {
            let visible = self.viewport.visible_range();
            debug!(%visible, advanced_by = update.advanced_by(), "following live edge");
            self.viewport_changed(visible);
            PollAction::Followed(visible)
        } else if visible_before.end >= update.previous.max_frame
            || visible_before.end == 0
            || self.region.range().is_none()
        {
            self.refresh_region(visible_before);
            PollAction::Refreshed(visible_before)
        } else {
            PollAction::Unchanged
        };

        PollOutcome {
            action,
            update: Some(update),
            backlog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoTransport;

    impl CaptureTransport for NoTransport {
        fn is_connected(&self) -> bool {
            false
        }
        fn is_connecting(&self) -> bool {
            false
        }
        fn start(&mut self, endpoint: &Endpoint) -> Result<(), ConnectionFault> {
            Err(ConnectionFault::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: "refused".into(),
            })
        }
        fn launch(&mut self, _spec: &LaunchSpec) -> Result<(), ConnectionFault> {
            Err(ConnectionFault::PipeTimeout)
        }
        fn stop(&mut self) {}
        fn pause(&mut self) {}
        fn resume(&mut self) {}
    }

    struct NoResolver;

    impl ReferenceResolver for NoResolver {
        fn resolve(&self, _addresses: Vec<u64>, on_result: source::ResolveCallback) {
            on_result(Err("unsupported".into()));
        }
    }

    fn explorer(config: ExplorerConfig) -> Result<Explorer, ExplorerError> {
        Explorer::new(
            Arc::new(InMemoryTrace::new()),
            Box::new(NoTransport),
            Arc::new(NoResolver),
            config,
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ExplorerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ExplorerConfig::default().with_zoom_limits(5.0, 1.0);
        assert!(matches!(
            explorer(config),
            Err(ExplorerError::Config(ConfigError::InvalidZoomLimits { .. }))
        ));
        let config = ExplorerConfig::default().with_cancel_check_interval(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero("cancel_check_interval"))
        );
    }

    #[test]
    fn test_failed_connect_leaves_session_closed() {
        let mut explorer = explorer(ExplorerConfig::default()).unwrap();
        let err = explorer.start_capture(&Endpoint::localhost(9000)).unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::Connection(ConnectionFault::ConnectFailed { .. })
        ));
        assert_eq!(explorer.session_state(), SessionState::Closed);
        assert_eq!(explorer.tick().action, PollAction::Skipped);
    }
}
