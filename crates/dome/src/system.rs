//! The render pipeline orchestrator.
//!
//! `DomeProjectionSystem` owns the collaborators, the navigation state and
//! the last committed frame. The render loop is its only caller; other
//! threads reach it through a [`DomeHandle`], whose requests take effect at
//! the next frame boundary.
//!
//! Frame steps, in order:
//! 1. honour a pending shutdown request
//! 2. apply staged settings
//! 3. drain the event inboxes into the router
//! 4. pump the web host
//! 5. pull a frame from the producer
//! 6. compose channel regions
//! 7. commit

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use foundation::error::{DomeError, DomeResult, ErrorKind};
use foundation::math::{DomeCoordinate, angular_distance};
use navigation::machine::NavigationMachine;
use navigation::state::{NavigationState, ViewMode};
use parking_lot::Mutex;
use projection::compositor::{ChannelRegion, Compositor};
use projection::frame::EquirectangularMetadata;
use projection::settings::ProjectionSettings;
use projection::validate::validate;
use runtime::frame::FrameTick;
use runtime::inbox::Inbox;
use runtime::journal::Journal;
use runtime::metrics::Metrics;

use crate::collaborators::{CollaboratorFactory, Collaborators};
use crate::config::OrchestratorConfig;
use crate::events::{EngineEvent, HostEvent, InteractionEvent};
use crate::router::{EventRouter, RouteReport};

pub const FRAMES_COMMITTED: &str = "frames_committed";
pub const FRAMES_DROPPED: &str = "frames_dropped";
pub const EVENTS_DISPATCHED: &str = "events_dispatched";
pub const EVENTS_REJECTED: &str = "events_rejected";
pub const INPUT_REJECTED: &str = "input_rejected";
pub const INBOX_OVERFLOW: &str = "inbox_overflow";
pub const CONSECUTIVE_FAILURES: &str = "consecutive_failures";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    /// A frame is in flight.
    Rendering,
    /// Too many consecutive failures; only `shutdown` is accepted.
    ShuttingDown,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Initialized => "initialized",
            PipelineState::Rendering => "rendering",
            PipelineState::ShuttingDown => "shutting_down",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the last successfully composed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedFrame {
    pub index: u64,
    pub metadata: EquirectangularMetadata,
    pub pixel_source: String,
    pub regions: Vec<ChannelRegion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Committed { channels: usize },
    /// A shutdown request was honoured instead of rendering.
    Stopped,
}

/// Result of a frame that was not dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub index: u64,
    pub outcome: FrameOutcome,
    /// Non-fatal failures raised since the previous report.
    pub errors: Vec<DomeError>,
    /// Failures from the dropped frame before this one. That frame was
    /// already counted as failed.
    pub carried_over: Vec<DomeError>,
    pub events_dispatched: u64,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.carried_over.is_empty()
    }

    /// True when an entry of `errors` counts the frame as failed. Rejected
    /// input does not.
    pub fn has_failures(&self) -> bool {
        self.errors.iter().any(escalates)
    }
}

/// Collaborator and rendering failures count toward the consecutive-failure
/// limit; validation errors stay local to the rejected input.
fn escalates(err: &DomeError) -> bool {
    let kind = err.kind();
    kind.is_collaborator() || kind == ErrorKind::Rendering
}

#[derive(Debug)]
struct Shared {
    state: Mutex<PipelineState>,
    shutdown_requested: AtomicBool,
    staged_settings: Mutex<Option<ProjectionSettings>>,
}

/// Thread-safe handle to a running pipeline.
#[derive(Debug, Clone)]
pub struct DomeHandle {
    shared: Arc<Shared>,
}

impl DomeHandle {
    /// The render loop stops at the next frame boundary.
    pub fn request_shutdown(&self) {
        self.shared.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shared.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Validates now, applies at the start of the next frame. A later call
    /// replaces settings that were staged but not yet applied.
    pub fn stage_settings(&self, settings: ProjectionSettings) -> DomeResult<()> {
        validate(&settings)?;
        *self.shared.staged_settings.lock() = Some(settings);
        Ok(())
    }

    pub fn state(&self) -> PipelineState {
        *self.shared.state.lock()
    }
}

pub struct DomeProjectionSystem {
    config: OrchestratorConfig,
    factory: Box<dyn CollaboratorFactory>,
    shared: Arc<Shared>,
    collaborators: Option<Collaborators>,
    settings: Option<ProjectionSettings>,
    interactions: Inbox<InteractionEvent>,
    host_events: Inbox<HostEvent>,
    engine_events: Inbox<EngineEvent>,
    router: EventRouter,
    navigation: NavigationMachine,
    compositor: Compositor,
    next_tick: FrameTick,
    consecutive_failures: u32,
    committed: Option<CommittedFrame>,
    /// Failures raised between frames, reported by the next frame.
    deferred_errors: Vec<DomeError>,
    /// Failures of a dropped frame, reported by the next frame.
    carried_errors: Vec<DomeError>,
    view_center: Option<DomeCoordinate>,
    journal: Journal,
    metrics: Metrics,
}

impl std::fmt::Debug for DomeProjectionSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomeProjectionSystem")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("next_tick", &self.next_tick)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

/// Collaborators of a pipeline that accepts calls, or a rejection.
fn live<'a>(
    collaborators: &'a mut Option<Collaborators>,
    state: PipelineState,
    operation: &'static str,
) -> DomeResult<&'a mut Collaborators> {
    let rejected = DomeError::Rejected {
        operation,
        state: state.as_str(),
    };
    if state != PipelineState::Initialized {
        return Err(rejected);
    }
    collaborators.as_mut().ok_or(rejected)
}

impl DomeProjectionSystem {
    pub fn new(config: OrchestratorConfig, factory: impl CollaboratorFactory + 'static) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            shared: Arc::new(Shared {
                state: Mutex::new(PipelineState::Uninitialized),
                shutdown_requested: AtomicBool::new(false),
                staged_settings: Mutex::new(None),
            }),
            collaborators: None,
            settings: None,
            interactions: Inbox::with_capacity(config.inbox_capacity),
            host_events: Inbox::with_capacity(config.inbox_capacity),
            engine_events: Inbox::with_capacity(config.inbox_capacity),
            router: EventRouter::new(),
            navigation: NavigationMachine::new(),
            compositor: Compositor::new(config.compositor()),
            next_tick: FrameTick::first(),
            consecutive_failures: 0,
            committed: None,
            deferred_errors: Vec::new(),
            carried_errors: Vec::new(),
            view_center: None,
            journal: Journal::new(),
            metrics: Metrics::new(),
        }
    }

    pub fn handle(&self) -> DomeHandle {
        DomeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        *self.shared.state.lock()
    }

    fn set_state(&self, state: PipelineState) {
        *self.shared.state.lock() = state;
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == PipelineState::Initialized
    }

    pub fn navigation_state(&self) -> &NavigationState {
        self.navigation.state()
    }

    pub fn projection_settings(&self) -> Option<&ProjectionSettings> {
        self.settings.as_ref()
    }

    pub fn committed_frame(&self) -> Option<&CommittedFrame> {
        self.committed.as_ref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Validates `settings` and builds the collaborators: render engine, web
    /// host, then input. All or nothing: on failure whatever was built is
    /// released again and the pipeline stays uninitialized.
    pub fn initialize(&mut self, settings: ProjectionSettings) -> DomeResult<()> {
        let state = self.state();
        if state != PipelineState::Uninitialized {
            return Err(DomeError::Rejected {
                operation: "initialize",
                state: state.as_str(),
            });
        }
        validate(&settings).map_err(|e| {
            DomeError::InitializationFailed(format!("invalid projection settings: {e}"))
        })?;

        let mut producer = self
            .factory
            .create_producer(&settings)
            .map_err(|e| init_failed("render engine", e))?;
        producer.register_engine_events(self.engine_events.sender());

        let mut host = match self.factory.create_host() {
            Ok(host) => host,
            Err(e) => {
                producer.release();
                return Err(init_failed("web host", e));
            }
        };
        host.register_host_events(self.host_events.sender());

        let mut input = match self.factory.create_input() {
            Ok(input) => input,
            Err(e) => {
                host.release();
                producer.release();
                return Err(init_failed("input subsystem", e));
            }
        };
        input.register_interaction_events(self.interactions.sender());

        // Leftovers from a previous run belong to released collaborators.
        self.interactions.drain();
        self.host_events.drain();
        self.engine_events.drain();
        self.router.reset_ordering();

        tracing::info!(channels = settings.projector_count(), "dome projection initialized");
        self.collaborators = Some(Collaborators {
            producer,
            host,
            input,
        });
        self.settings = Some(settings);
        self.consecutive_failures = 0;
        self.metrics.set_gauge(CONSECUTIVE_FAILURES, 0);
        self.next_tick = FrameTick::first();
        self.shared.shutdown_requested.store(false, Ordering::SeqCst);
        self.set_state(PipelineState::Initialized);
        Ok(())
    }

    /// Idempotent. Releases collaborators in reverse construction order.
    pub fn shutdown(&mut self) {
        if let Some(collaborators) = self.collaborators.take() {
            tracing::info!(state = %self.state(), "shutting down dome projection");
            collaborators.release();
        }
        self.shared.shutdown_requested.store(false, Ordering::SeqCst);
        self.shared.staged_settings.lock().take();
        // Failures of released collaborators do not carry into the next run.
        self.deferred_errors.clear();
        self.carried_errors.clear();
        self.view_center = None;
        self.set_state(PipelineState::Uninitialized);
    }

    /// Validates and swaps the active settings. Failure leaves the old
    /// settings in place; success discards settings staged through a
    /// [`DomeHandle`] before this call.
    pub fn set_projection_settings(&mut self, settings: ProjectionSettings) -> DomeResult<()> {
        let state = self.state();
        if state == PipelineState::ShuttingDown {
            return Err(DomeError::Rejected {
                operation: "set_projection_settings",
                state: state.as_str(),
            });
        }
        validate(&settings)?;
        if self.shared.staged_settings.lock().take().is_some() {
            tracing::debug!("older staged settings discarded");
        }
        tracing::info!(channels = settings.projector_count(), "projection settings replaced");
        self.settings = Some(settings);
        Ok(())
    }

    /// Renders one frame.
    ///
    /// Dropped frames return the error that dropped them; the previously
    /// committed frame stays current. More than `max_consecutive_failures`
    /// failed frames in a row move the pipeline to `ShuttingDown`.
    pub fn render_frame(&mut self) -> DomeResult<FrameReport> {
        let state = self.state();
        if state != PipelineState::Initialized {
            return Err(DomeError::Rejected {
                operation: "render_frame",
                state: state.as_str(),
            });
        }

        let tick = self.next_tick;
        if self.shared.shutdown_requested.load(Ordering::SeqCst) {
            self.journal.record(tick, "shutdown", "shutdown requested");
            let errors = std::mem::take(&mut self.deferred_errors);
            let carried_over = std::mem::take(&mut self.carried_errors);
            self.shutdown();
            return Ok(FrameReport {
                index: tick.index,
                outcome: FrameOutcome::Stopped,
                errors,
                carried_over,
                events_dispatched: 0,
            });
        }

        self.next_tick = tick.next();
        self.set_state(PipelineState::Rendering);
        let result = self.run_frame(tick);

        let failed = match &result {
            Ok(report) => report.has_failures(),
            Err(e) => escalates(e),
        };
        if failed {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
        self.metrics
            .set_gauge(CONSECUTIVE_FAILURES, self.consecutive_failures as i64);

        if self.consecutive_failures > self.config.max_consecutive_failures {
            tracing::error!(
                failures = self.consecutive_failures,
                limit = self.config.max_consecutive_failures,
                "too many consecutive failed frames"
            );
            self.journal.record(
                tick,
                "state",
                format!("{} consecutive failures", self.consecutive_failures),
            );
            self.set_state(PipelineState::ShuttingDown);
        } else {
            self.set_state(PipelineState::Initialized);
        }
        result
    }

    fn run_frame(&mut self, tick: FrameTick) -> DomeResult<FrameReport> {
        if let Some(staged) = self.shared.staged_settings.lock().take() {
            tracing::info!(channels = staged.projector_count(), "applying staged settings");
            self.journal.record(tick, "settings", "staged settings applied");
            self.settings = Some(staged);
        }

        let mut errors = std::mem::take(&mut self.deferred_errors);

        let overflow = self.interactions.take_overflow()
            + self.host_events.take_overflow()
            + self.engine_events.take_overflow();
        if overflow > 0 {
            tracing::warn!(overflow, "collaborator events dropped by full inboxes");
            self.metrics.inc_counter(INBOX_OVERFLOW, overflow);
        }

        let Some(collab) = self.collaborators.as_mut() else {
            return Err(DomeError::Rejected {
                operation: "render_frame",
                state: PipelineState::Uninitialized.as_str(),
            });
        };

        let mut routed = self.router.route_interactions(
            tick,
            self.interactions.drain(),
            &mut self.navigation,
            self.settings.as_ref(),
            &mut self.journal,
        );
        routed.merge(
            self.router
                .route_host_events(tick, self.host_events.drain(), &mut self.journal),
        );
        routed.merge(self.router.forward_engine_events(
            tick,
            self.engine_events.drain(),
            collab.host.as_mut(),
            &mut self.journal,
        ));
        if routed.navigation_changed {
            if let Err(e) =
                EventRouter::announce_navigation(collab.host.as_mut(), self.navigation.state())
            {
                routed.errors.push(e);
            }
        }
        let RouteReport {
            dispatched,
            rejected,
            errors: route_errors,
            ..
        } = routed;
        self.metrics.inc_counter(EVENTS_DISPATCHED, dispatched);
        self.metrics.inc_counter(EVENTS_REJECTED, rejected);
        let invalid_input = route_errors
            .iter()
            .filter(|e| e.kind().is_validation())
            .count() as u64;
        self.metrics.inc_counter(INPUT_REJECTED, invalid_input);
        errors.extend(route_errors);

        if let Err(e) = collab.host.tick() {
            tracing::warn!(error = %e, "web host tick failed");
            errors.push(e);
        }

        let frame = match collab.producer.produce_frame() {
            Ok(frame) => frame,
            Err(e) => {
                let e = match e {
                    DomeError::RenderEngine(_) => e,
                    other => DomeError::RenderEngine(other.to_string()),
                };
                return Err(self.drop_frame(tick, e, errors));
            }
        };

        let Some(settings) = self.settings.as_ref() else {
            let e = DomeError::Rendering("no projection settings".to_string());
            return Err(self.drop_frame(tick, e, errors));
        };
        let regions = match self.compositor.compose(settings, &frame.metadata) {
            Ok(regions) => regions,
            Err(e) => return Err(self.drop_frame(tick, e, errors)),
        };

        let channels = regions.len();
        self.committed = Some(CommittedFrame {
            index: tick.index,
            metadata: frame.metadata,
            pixel_source: frame.pixel_source,
            regions,
        });
        self.metrics.inc_counter(FRAMES_COMMITTED, 1);

        Ok(FrameReport {
            index: tick.index,
            outcome: FrameOutcome::Committed { channels },
            errors,
            carried_over: std::mem::take(&mut self.carried_errors),
            events_dispatched: dispatched,
        })
    }

    /// Records a dropped frame. Errors gathered earlier in the frame are
    /// logged with it and listed by the next report as `carried_over`, so the
    /// frame is counted as failed once.
    fn drop_frame(
        &mut self,
        tick: FrameTick,
        err: DomeError,
        pending: Vec<DomeError>,
    ) -> DomeError {
        tracing::warn!(frame = tick.index, error = %err, "frame dropped");
        self.journal.record(tick, "dropped", err.to_string());
        for e in &pending {
            tracing::warn!(frame = tick.index, error = %e, "failure in dropped frame");
            self.journal.record(tick, "dropped", e.to_string());
        }
        self.metrics.inc_counter(FRAMES_DROPPED, 1);
        self.carried_errors.extend(pending);
        err
    }

    fn reject_while_shutting_down(&self, operation: &'static str) -> DomeResult<()> {
        let state = self.state();
        if state == PipelineState::ShuttingDown {
            return Err(DomeError::Rejected {
                operation,
                state: state.as_str(),
            });
        }
        Ok(())
    }

    /// Tells the web application about a navigation change. Delivery
    /// failures surface in the next frame report.
    fn announce_navigation(&mut self) {
        let Some(collab) = self.collaborators.as_mut() else {
            return;
        };
        let announced =
            EventRouter::announce_navigation(collab.host.as_mut(), self.navigation.state());
        if let Err(e) = announced {
            self.deferred_errors.push(e);
        }
    }

    fn transition(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut NavigationMachine) -> DomeResult<NavigationState>,
    ) -> DomeResult<NavigationState> {
        self.reject_while_shutting_down(operation)?;
        let state = apply(&mut self.navigation)?;
        self.announce_navigation();
        Ok(state)
    }

    pub fn navigate_to_project(&mut self, project_id: &str) -> DomeResult<NavigationState> {
        self.transition("navigate_to_project", |nav| nav.navigate_to_project(project_id))
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> DomeResult<NavigationState> {
        self.transition("set_view_mode", |nav| nav.set_view_mode(mode))
    }

    pub fn enter_immersive_mode(&mut self, project_id: &str) -> DomeResult<NavigationState> {
        self.transition("enter_immersive_mode", |nav| {
            nav.enter_immersive_mode(project_id)
        })
    }

    pub fn exit_immersive_mode(&mut self) -> DomeResult<NavigationState> {
        self.transition("exit_immersive_mode", |nav| nav.exit_immersive_mode())
    }

    pub fn select_region(&mut self, region: Option<String>) -> DomeResult<NavigationState> {
        self.transition("select_region", |nav| nav.select_region(region))
    }

    pub fn set_zoom_level(&mut self, zoom: f64) -> DomeResult<NavigationState> {
        self.transition("set_zoom_level", |nav| nav.set_zoom_level(zoom))
    }

    pub fn register_interaction_callback(
        &mut self,
        callback: impl FnMut(&InteractionEvent) + Send + 'static,
    ) {
        self.router.register_interaction_callback(callback);
    }

    pub fn register_react_callback(&mut self, callback: impl FnMut(&str, &str) + Send + 'static) {
        self.router.register_react_callback(callback);
    }

    pub fn send_command_to_react(&mut self, command: &str, data: &str) -> DomeResult<()> {
        let state = self.state();
        let collab = live(&mut self.collaborators, state, "send_command_to_react")?;
        EventRouter::send_command_to_react(collab.host.as_mut(), command, data)
    }

    /// Sizes the web view and points it at its shell document.
    pub fn setup_web_view(&mut self, html_path: &str, width: u32, height: u32) -> DomeResult<()> {
        if html_path.is_empty() {
            return Err(DomeError::WebView("web view needs a shell document".to_string()));
        }
        if width == 0 || height == 0 {
            return Err(DomeError::WebView(format!(
                "web view size must be positive, got {width}x{height}"
            )));
        }
        let state = self.state();
        let collab = live(&mut self.collaborators, state, "setup_web_view")?;
        collab
            .host
            .setup(html_path, width, height)
            .map_err(as_web_view)?;
        tracing::info!(html_path, width, height, "web view ready");
        Ok(())
    }

    pub fn load_react_app(&mut self, app_url: &str) -> DomeResult<()> {
        let state = self.state();
        let collab = live(&mut self.collaborators, state, "load_react_app")?;
        collab.host.load(app_url).map_err(as_web_view)?;
        tracing::info!(url = app_url, "web application loaded");
        Ok(())
    }

    /// Pumps the web host outside the frame loop.
    pub fn update_web_view(&mut self) -> DomeResult<()> {
        let state = self.state();
        let collab = live(&mut self.collaborators, state, "update_web_view")?;
        collab.host.tick().map_err(as_web_view)
    }

    pub fn enable_interaction(&mut self, enabled: bool) -> DomeResult<()> {
        let state = self.state();
        let collab = live(&mut self.collaborators, state, "enable_interaction")?;
        collab.input.set_enabled(enabled).map_err(as_interaction)?;
        tracing::info!(enabled, "interaction input toggled");
        Ok(())
    }

    pub fn calibrate_input(&mut self) -> DomeResult<()> {
        let state = self.state();
        let collab = live(&mut self.collaborators, state, "calibrate_input")?;
        if collab.input.calibrate() {
            Ok(())
        } else {
            Err(DomeError::Interaction(
                "input calibration failed".to_string(),
            ))
        }
    }

    /// Points the render engine at `center`.
    pub fn update_view(&mut self, center: DomeCoordinate) -> DomeResult<()> {
        center.validate()?;
        let state = self.state();
        let collab = live(&mut self.collaborators, state, "update_view")?;
        collab.producer.set_view(&center)?;
        if let Some(previous) = self.view_center.replace(center) {
            tracing::debug!(
                moved_degrees = angular_distance(&previous, &center),
                "view recentered"
            );
        }
        Ok(())
    }

    /// Asks the render engine to show a still equirectangular image.
    pub fn render_equirectangular(
        &mut self,
        image_url: &str,
        metadata: &EquirectangularMetadata,
    ) -> DomeResult<()> {
        metadata.validate()?;
        if image_url.is_empty() {
            return Err(DomeError::InvalidMetadata(
                "image url must not be empty".to_string(),
            ));
        }
        let state = self.state();
        let collab = live(&mut self.collaborators, state, "render_equirectangular")?;
        collab.producer.present_image(image_url, metadata)
    }
}

impl Drop for DomeProjectionSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn init_failed(stage: &str, err: DomeError) -> DomeError {
    tracing::error!(stage, error = %err, "collaborator failed to start");
    match err {
        DomeError::InitializationFailed(msg) => {
            DomeError::InitializationFailed(format!("{stage}: {msg}"))
        }
        other => DomeError::InitializationFailed(format!("{stage}: {other}")),
    }
}

fn as_web_view(err: DomeError) -> DomeError {
    match err {
        DomeError::WebView(_) => err,
        other => DomeError::WebView(other.to_string()),
    }
}

fn as_interaction(err: DomeError) -> DomeError {
    match err {
        DomeError::Interaction(_) => err,
        other => DomeError::Interaction(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::{
        CONSECUTIVE_FAILURES, DomeProjectionSystem, EVENTS_REJECTED, FRAMES_COMMITTED,
        FRAMES_DROPPED, FrameOutcome, INBOX_OVERFLOW, INPUT_REJECTED, PipelineState,
    };
    use crate::config::OrchestratorConfig;
    use crate::events::{EngineEvent, HostEvent, InteractionEvent, InteractionKind};
    use crate::router::NAVIGATION_CHANGED;
    use crate::sim::{FailurePlan, SimFactory, SimProbe, SimStage};
    use foundation::error::{DomeError, ErrorKind};
    use foundation::math::DomeCoordinate;
    use navigation::state::ViewMode;
    use pretty_assertions::assert_eq;
    use projection::frame::EquirectangularMetadata;
    use projection::settings::{ProjectionSettings, Resolution};

    fn quad() -> ProjectionSettings {
        ProjectionSettings::ring(4, Resolution::new(1920, 1080), 0.05)
    }

    fn started(factory: SimFactory) -> DomeProjectionSystem {
        let mut system = DomeProjectionSystem::new(OrchestratorConfig::default(), factory);
        system.initialize(quad()).unwrap();
        system
    }

    fn gaze(az: f64, ts: u64) -> InteractionEvent {
        InteractionEvent::new(
            InteractionKind::Gaze,
            DomeCoordinate::on_surface(az, 0.0),
            "",
            ts,
        )
    }

    fn releases(probe: &SimProbe) -> Vec<String> {
        probe
            .lifecycle()
            .into_iter()
            .filter(|e| e.starts_with("release"))
            .collect()
    }

    #[test]
    fn renders_and_commits_all_channels() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));
        assert!(system.is_initialized());

        let report = system.render_frame().unwrap();
        assert_eq!(report.index, 0);
        assert_eq!(report.outcome, FrameOutcome::Committed { channels: 4 });
        assert!(report.is_clean());

        let committed = system.committed_frame().unwrap();
        assert_eq!(committed.pixel_source, "sim://frame/1");
        assert_eq!(committed.regions.len(), 4);
        assert_eq!(system.metrics().counter(FRAMES_COMMITTED), 1);
        assert_eq!(system.state(), PipelineState::Initialized);
    }

    #[test]
    fn single_failure_in_five_frames_keeps_running() {
        let probe = SimProbe::new();
        let mut system =
            started(SimFactory::new(probe).with_producer_plan(FailurePlan::calls([3])));

        for frame in 1..=5 {
            let result = system.render_frame();
            if frame == 3 {
                assert_eq!(result.unwrap_err().kind(), ErrorKind::RenderEngine);
                // Stale output from the previous frame stays current.
                assert_eq!(system.committed_frame().unwrap().index, 1);
            } else {
                assert!(result.is_ok(), "frame {frame}");
            }
        }
        assert_eq!(system.state(), PipelineState::Initialized);
        assert_eq!(system.consecutive_failures(), 0);
        assert_eq!(system.metrics().counter(FRAMES_DROPPED), 1);
        assert_eq!(system.metrics().counter(FRAMES_COMMITTED), 4);
    }

    #[test]
    fn persistent_failures_shut_the_pipeline_down() {
        let probe = SimProbe::new();
        let mut system =
            started(SimFactory::new(probe.clone()).with_producer_plan(FailurePlan::Always));

        let results: Vec<_> = (0..10).map(|_| system.render_frame()).collect();
        for r in &results[..6] {
            assert_eq!(r.as_ref().unwrap_err().kind(), ErrorKind::RenderEngine);
        }
        for r in &results[6..] {
            assert!(matches!(r, Err(DomeError::Rejected { .. })), "{r:?}");
        }
        assert_eq!(system.state(), PipelineState::ShuttingDown);
        assert_eq!(system.handle().state(), PipelineState::ShuttingDown);
        assert_eq!(system.metrics().gauge(CONSECUTIVE_FAILURES), Some(6));

        let err = system.set_view_mode(ViewMode::Tour).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCoordinates);
        assert!(matches!(err, DomeError::Rejected { .. }));
        assert!(system.navigate_to_project("expo-42").is_err());
        assert_eq!(system.navigation_state().current_project, None);

        system.shutdown();
        assert_eq!(system.state(), PipelineState::Uninitialized);
        assert_eq!(
            releases(&probe),
            vec!["release input", "release host", "release producer"]
        );
    }

    #[test]
    fn shutdown_twice_equals_once() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));
        system.shutdown();
        system.shutdown();
        assert_eq!(system.state(), PipelineState::Uninitialized);
        assert_eq!(releases(&probe).len(), 3);

        let mut never_started =
            DomeProjectionSystem::new(OrchestratorConfig::default(), SimFactory::new(SimProbe::new()));
        never_started.shutdown();
        assert_eq!(never_started.state(), PipelineState::Uninitialized);
    }

    #[test]
    fn failed_initialization_releases_what_was_built() {
        let probe = SimProbe::new();
        let mut system = DomeProjectionSystem::new(
            OrchestratorConfig::default(),
            SimFactory::new(probe.clone()).failing_at(SimStage::Input),
        );
        let err = system.initialize(quad()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InitializationFailed);
        assert!(err.to_string().contains("input subsystem"), "{err}");
        assert_eq!(system.state(), PipelineState::Uninitialized);
        assert_eq!(
            probe.lifecycle(),
            vec![
                "create producer",
                "create host",
                "fail input",
                "release host",
                "release producer",
            ]
        );
    }

    #[test]
    fn invalid_settings_never_reach_the_factory() {
        let probe = SimProbe::new();
        let mut system =
            DomeProjectionSystem::new(OrchestratorConfig::default(), SimFactory::new(probe.clone()));
        let mut three = quad();
        three.channels.pop();

        let err = system.initialize(three).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InitializationFailed);
        assert!(probe.lifecycle().is_empty());
        assert!(system.projection_settings().is_none());
    }

    #[test]
    fn lifecycle_misuse_is_rejected() {
        let mut system =
            DomeProjectionSystem::new(OrchestratorConfig::default(), SimFactory::new(SimProbe::new()));
        assert!(matches!(
            system.render_frame(),
            Err(DomeError::Rejected {
                operation: "render_frame",
                ..
            })
        ));
        assert!(system.load_react_app("http://localhost:5173").is_err());

        system.initialize(quad()).unwrap();
        assert!(matches!(
            system.initialize(quad()),
            Err(DomeError::Rejected {
                operation: "initialize",
                ..
            })
        ));
    }

    #[test]
    fn gaze_from_another_thread_selects_region() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));
        let seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&seen);
        system.register_interaction_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let sender = probe.clone();
        std::thread::spawn(move || assert!(sender.send_interaction(gaze(100.0, 1))))
            .join()
            .unwrap();

        let report = system.render_frame().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.events_dispatched, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(system.navigation_state().selected_region.as_deref(), Some("ch1"));

        let commands = probe.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, NAVIGATION_CHANGED);
        assert!(commands[0].1.contains("\"selectedRegion\":\"ch1\""));
    }

    #[test]
    fn out_of_order_events_fail_the_frame() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));
        system.register_interaction_callback(|_| {});

        probe.send_interaction(gaze(10.0, 50));
        assert!(system.render_frame().unwrap().is_clean());

        probe.send_interaction(gaze(10.0, 20));
        let report = system.render_frame().unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind(), ErrorKind::Interaction);
        assert_eq!(system.consecutive_failures(), 1);
        assert_eq!(system.metrics().counter(EVENTS_REJECTED), 1);

        assert!(system.render_frame().unwrap().is_clean());
        assert_eq!(system.consecutive_failures(), 0);
    }

    #[test]
    fn host_tick_failure_is_reported_not_fatal() {
        let probe = SimProbe::new();
        let mut system =
            started(SimFactory::new(probe).with_host_tick_plan(FailurePlan::calls([1])));
        let report = system.render_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::Committed { channels: 4 });
        assert_eq!(report.errors[0].kind(), ErrorKind::WebView);
        assert!(system.render_frame().unwrap().is_clean());
    }

    #[test]
    fn compositor_failure_keeps_the_stale_frame() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));
        system.render_frame().unwrap();

        let narrow = EquirectangularMetadata {
            field_of_view: 90.0,
            ..EquirectangularMetadata::panorama(1024, 256)
        };
        system
            .render_equirectangular("file:///stills/lobby.jpg", &narrow)
            .unwrap();
        assert_eq!(probe.presented_image().as_deref(), Some("file:///stills/lobby.jpg"));

        let err = system.render_frame().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rendering);
        let committed = system.committed_frame().unwrap();
        assert_eq!(committed.index, 0);
        assert_eq!(committed.metadata.field_of_view, 360.0);
        assert_eq!(system.state(), PipelineState::Initialized);
    }

    #[test]
    fn staged_settings_apply_at_frame_boundary() {
        let mut system = started(SimFactory::new(SimProbe::new()));
        let handle = system.handle();

        let six = ProjectionSettings::ring(6, Resolution::new(1280, 800), 0.1);
        handle.stage_settings(six).unwrap();
        assert_eq!(system.projection_settings().unwrap().projector_count(), 4);

        let report = system.render_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::Committed { channels: 6 });
        assert_eq!(system.projection_settings().unwrap().projector_count(), 6);

        let mut broken = quad();
        broken.blend_overlap = 2.0;
        let err = handle.stage_settings(broken.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMetadata);
        assert!(system.set_projection_settings(broken).is_err());
        assert_eq!(system.projection_settings().unwrap().projector_count(), 6);
    }

    #[test]
    fn shutdown_request_from_another_thread() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));
        let handle = system.handle();
        std::thread::spawn(move || handle.request_shutdown())
            .join()
            .unwrap();

        let report = system.render_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::Stopped);
        assert_eq!(system.state(), PipelineState::Uninitialized);
        assert_eq!(releases(&probe).len(), 3);
        assert_eq!(probe.frames_produced(), 0);
    }

    #[test]
    fn expo_navigation_is_announced() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));

        system.navigate_to_project("expo-42").unwrap();
        let state = system.enter_immersive_mode("expo-42").unwrap();
        assert_eq!(state.view_mode, ViewMode::Presentation);
        assert!(state.is_immersive);

        let err = system.set_view_mode(ViewMode::Map).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interaction);
        assert_eq!(system.navigation_state().view_mode, ViewMode::Presentation);

        let announced = probe
            .commands()
            .iter()
            .filter(|(c, _)| c == NAVIGATION_CHANGED)
            .count();
        assert_eq!(announced, 2);
    }

    #[test]
    fn undelivered_announcements_surface_in_next_frame() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe).with_host_rejecting_commands());

        system.navigate_to_project("expo-42").unwrap();
        let report = system.render_frame().unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind(), ErrorKind::WebView);
        assert_eq!(system.consecutive_failures(), 1);
    }

    #[test]
    fn collaborator_pass_throughs() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()).with_uncalibrated_input());

        system.setup_web_view("web/index.html", 3840, 2160).unwrap();
        assert_eq!(probe.surface(), Some(("web/index.html".to_string(), 3840, 2160)));
        assert_eq!(
            system.setup_web_view("web/index.html", 0, 2160).unwrap_err().kind(),
            ErrorKind::WebView
        );
        assert_eq!(system.setup_web_view("", 800, 600).unwrap_err().kind(), ErrorKind::WebView);

        system.load_react_app("http://localhost:5173").unwrap();
        assert_eq!(probe.loaded_url().as_deref(), Some("http://localhost:5173"));
        assert_eq!(system.load_react_app("").unwrap_err().kind(), ErrorKind::WebView);

        system.enable_interaction(true).unwrap();
        assert!(probe.input_enabled());
        assert_eq!(system.calibrate_input().unwrap_err().kind(), ErrorKind::Interaction);

        system.update_view(DomeCoordinate::on_surface(45.0, 10.0)).unwrap();
        assert_eq!(probe.view(), Some(DomeCoordinate::on_surface(45.0, 10.0)));

        let bad = EquirectangularMetadata::panorama(0, 0);
        assert_eq!(
            system.render_equirectangular("x.jpg", &bad).unwrap_err().kind(),
            ErrorKind::InvalidMetadata
        );

        system.update_web_view().unwrap();
        system.send_command_to_react("flyTo", "{\"project\":\"expo-42\"}").unwrap();
        assert_eq!(probe.commands().last().unwrap().0, "flyTo");
    }

    #[test]
    fn engine_and_host_events_flow_through_a_frame() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));
        let seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&seen);
        system.register_react_callback(move |event_type, _| {
            assert_eq!(event_type, "projectSelected");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(probe.send_engine_event(EngineEvent::new("tilesLoaded", "12")));
        assert!(probe.send_host_event(HostEvent::new("projectSelected", "expo-42")));
        let report = system.render_frame().unwrap();

        assert_eq!(report.events_dispatched, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(
            probe.commands(),
            vec![("tilesLoaded".to_string(), "12".to_string())]
        );
    }

    #[test]
    fn full_inboxes_are_counted() {
        let probe = SimProbe::new();
        let config = OrchestratorConfig {
            inbox_capacity: 2,
            ..OrchestratorConfig::default()
        };
        let mut system = DomeProjectionSystem::new(config, SimFactory::new(probe.clone()));
        system.initialize(quad()).unwrap();

        let sent: Vec<bool> = (0..3)
            .map(|i| probe.send_host_event(HostEvent::new(format!("e{i}"), "")))
            .collect();
        assert_eq!(sent, vec![true, true, false]);

        system.render_frame().unwrap();
        assert_eq!(system.metrics().counter(INBOX_OVERFLOW), 1);
    }

    #[test]
    fn malformed_positions_never_shut_the_pipeline_down() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe.clone()));
        system.register_interaction_callback(|_| {});

        for ts in 1..=10 {
            let mut event = gaze(0.0, ts);
            event.position.azimuth = f64::NAN;
            assert!(probe.send_interaction(event));

            let report = system.render_frame().unwrap();
            assert_eq!(report.errors.len(), 1);
            assert_eq!(report.errors[0].kind(), ErrorKind::InvalidCoordinates);
            assert!(!report.has_failures());
        }
        assert_eq!(system.state(), PipelineState::Initialized);
        assert_eq!(system.consecutive_failures(), 0);
        assert_eq!(system.metrics().counter(INPUT_REJECTED), 10);
        assert_eq!(system.metrics().counter(FRAMES_COMMITTED), 10);
    }

    #[test]
    fn restart_starts_with_a_clean_slate() {
        let probe = SimProbe::new();
        let mut system = started(SimFactory::new(probe).with_host_rejecting_commands());

        system.navigate_to_project("expo-42").unwrap();
        system.shutdown();
        system.initialize(quad()).unwrap();

        let report = system.render_frame().unwrap();
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(system.consecutive_failures(), 0);
    }

    #[test]
    fn dropped_frame_is_counted_once() {
        let probe = SimProbe::new();
        let mut system = started(
            SimFactory::new(probe)
                .with_producer_plan(FailurePlan::calls([1]))
                .with_host_tick_plan(FailurePlan::calls([1])),
        );

        let err = system.render_frame().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderEngine);
        assert_eq!(system.consecutive_failures(), 1);

        let report = system.render_frame().unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.carried_over.len(), 1);
        assert_eq!(report.carried_over[0].kind(), ErrorKind::WebView);
        assert!(!report.is_clean());
        assert_eq!(system.consecutive_failures(), 0);

        assert!(system.render_frame().unwrap().is_clean());
    }

    #[test]
    fn direct_settings_supersede_staged_ones() {
        let mut system = started(SimFactory::new(SimProbe::new()));
        let handle = system.handle();

        let six = ProjectionSettings::ring(6, Resolution::new(1280, 800), 0.1);
        handle.stage_settings(six).unwrap();
        let three = ProjectionSettings::ring(3, Resolution::new(1920, 1080), 0.05);
        system.set_projection_settings(three).unwrap();

        let report = system.render_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::Committed { channels: 3 });
        assert_eq!(system.projection_settings().unwrap().projector_count(), 3);
    }
}
