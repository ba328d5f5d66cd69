//! In-process stand-ins for the render engine, web host and input hardware.
//!
//! They drive the `dome_sim` binary and double as test collaborators. A
//! shared [`SimProbe`] records what the pipeline did to them and exposes the
//! registered event sinks so callers can inject events from any thread.

use std::collections::BTreeSet;
use std::sync::Arc;

use foundation::error::{DomeError, DomeResult};
use foundation::math::DomeCoordinate;
use parking_lot::Mutex;
use projection::frame::EquirectangularMetadata;
use projection::settings::ProjectionSettings;

use crate::collaborators::{
    CollaboratorFactory, ContentHost, EngineEventSink, FrameProducer, HostEventSink, InputSource,
    InteractionSink, ProducedFrame,
};
use crate::events::{EngineEvent, HostEvent, InteractionEvent};

#[derive(Debug, Default)]
struct ProbeState {
    lifecycle: Vec<String>,
    commands: Vec<(String, String)>,
    loaded_url: Option<String>,
    surface: Option<(String, u32, u32)>,
    input_enabled: bool,
    view: Option<DomeCoordinate>,
    presented: Option<String>,
    frames_produced: u64,
    interaction_sink: Option<InteractionSink>,
    host_sink: Option<HostEventSink>,
    engine_sink: Option<EngineEventSink>,
}

#[derive(Debug, Clone, Default)]
pub struct SimProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl SimProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn note(&self, entry: impl Into<String>) {
        self.state.lock().lifecycle.push(entry.into());
    }

    /// Creation and release calls, in order.
    pub fn lifecycle(&self) -> Vec<String> {
        self.state.lock().lifecycle.clone()
    }

    /// Commands delivered to the web host.
    pub fn commands(&self) -> Vec<(String, String)> {
        self.state.lock().commands.clone()
    }

    pub fn loaded_url(&self) -> Option<String> {
        self.state.lock().loaded_url.clone()
    }

    /// Shell document and size of the web view.
    pub fn surface(&self) -> Option<(String, u32, u32)> {
        self.state.lock().surface.clone()
    }

    pub fn input_enabled(&self) -> bool {
        self.state.lock().input_enabled
    }

    pub fn view(&self) -> Option<DomeCoordinate> {
        self.state.lock().view
    }

    pub fn presented_image(&self) -> Option<String> {
        self.state.lock().presented.clone()
    }

    pub fn frames_produced(&self) -> u64 {
        self.state.lock().frames_produced
    }

    /// False when no sink is registered yet or the inbox is full.
    pub fn send_interaction(&self, event: InteractionEvent) -> bool {
        let sink = self.state.lock().interaction_sink.clone();
        sink.is_some_and(|s| s.try_send(event).is_ok())
    }

    pub fn send_host_event(&self, event: HostEvent) -> bool {
        let sink = self.state.lock().host_sink.clone();
        sink.is_some_and(|s| s.try_send(event).is_ok())
    }

    pub fn send_engine_event(&self, event: EngineEvent) -> bool {
        let sink = self.state.lock().engine_sink.clone();
        sink.is_some_and(|s| s.try_send(event).is_ok())
    }
}

/// Which calls of a simulated operation fail. Calls are counted from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailurePlan {
    #[default]
    Never,
    Always,
    /// Every `n`th call; 0 never fails.
    EveryNth(u64),
    Calls(BTreeSet<u64>),
}

impl FailurePlan {
    pub fn calls(calls: impl IntoIterator<Item = u64>) -> Self {
        FailurePlan::Calls(calls.into_iter().collect())
    }

    pub fn fails(&self, call: u64) -> bool {
        match self {
            FailurePlan::Never => false,
            FailurePlan::Always => true,
            FailurePlan::EveryNth(0) => false,
            FailurePlan::EveryNth(n) => call % n == 0,
            FailurePlan::Calls(set) => set.contains(&call),
        }
    }
}

#[derive(Debug)]
pub struct SimProducer {
    probe: SimProbe,
    metadata: EquirectangularMetadata,
    plan: FailurePlan,
    calls: u64,
}

impl SimProducer {
    pub fn new(probe: SimProbe, metadata: EquirectangularMetadata, plan: FailurePlan) -> Self {
        Self {
            probe,
            metadata,
            plan,
            calls: 0,
        }
    }
}

impl FrameProducer for SimProducer {
    fn produce_frame(&mut self) -> DomeResult<ProducedFrame> {
        self.calls += 1;
        if self.plan.fails(self.calls) {
            return Err(DomeError::RenderEngine(format!(
                "simulated engine stall on call {}",
                self.calls
            )));
        }
        self.probe.state.lock().frames_produced += 1;
        Ok(ProducedFrame {
            metadata: self.metadata.clone(),
            pixel_source: format!("sim://frame/{}", self.calls),
        })
    }

    fn register_engine_events(&mut self, sink: EngineEventSink) {
        self.probe.state.lock().engine_sink = Some(sink);
    }

    fn set_view(&mut self, center: &DomeCoordinate) -> DomeResult<()> {
        self.probe.state.lock().view = Some(*center);
        Ok(())
    }

    fn present_image(
        &mut self,
        url: &str,
        metadata: &EquirectangularMetadata,
    ) -> DomeResult<()> {
        self.metadata = metadata.clone();
        self.probe.state.lock().presented = Some(url.to_string());
        Ok(())
    }

    fn release(&mut self) {
        self.probe.state.lock().engine_sink = None;
        self.probe.note("release producer");
    }
}

#[derive(Debug)]
pub struct SimHost {
    probe: SimProbe,
    rejects_commands: bool,
    tick_plan: FailurePlan,
    ticks: u64,
}

impl SimHost {
    pub fn new(probe: SimProbe) -> Self {
        Self {
            probe,
            rejects_commands: false,
            tick_plan: FailurePlan::Never,
            ticks: 0,
        }
    }

    pub fn rejecting_commands(mut self) -> Self {
        self.rejects_commands = true;
        self
    }

    pub fn with_tick_plan(mut self, plan: FailurePlan) -> Self {
        self.tick_plan = plan;
        self
    }
}

impl ContentHost for SimHost {
    fn setup(&mut self, html_path: &str, width: u32, height: u32) -> DomeResult<()> {
        self.probe.state.lock().surface = Some((html_path.to_string(), width, height));
        Ok(())
    }

    fn load(&mut self, app_url: &str) -> DomeResult<()> {
        if app_url.is_empty() {
            return Err(DomeError::WebView("empty application url".to_string()));
        }
        self.probe.state.lock().loaded_url = Some(app_url.to_string());
        Ok(())
    }

    fn post_command(&mut self, command: &str, data: &str) -> DomeResult<()> {
        if self.rejects_commands {
            return Err(DomeError::WebView(format!(
                "page not ready for '{command}'"
            )));
        }
        self.probe
            .state
            .lock()
            .commands
            .push((command.to_string(), data.to_string()));
        Ok(())
    }

    fn register_host_events(&mut self, sink: HostEventSink) {
        self.probe.state.lock().host_sink = Some(sink);
    }

    fn tick(&mut self) -> DomeResult<()> {
        self.ticks += 1;
        if self.tick_plan.fails(self.ticks) {
            return Err(DomeError::WebView(format!(
                "simulated page crash on tick {}",
                self.ticks
            )));
        }
        Ok(())
    }

    fn release(&mut self) {
        self.probe.state.lock().host_sink = None;
        self.probe.note("release host");
    }
}

#[derive(Debug)]
pub struct SimInput {
    probe: SimProbe,
    calibrates: bool,
}

impl SimInput {
    pub fn new(probe: SimProbe, calibrates: bool) -> Self {
        Self { probe, calibrates }
    }
}

impl InputSource for SimInput {
    fn calibrate(&mut self) -> bool {
        self.calibrates
    }

    fn set_enabled(&mut self, enabled: bool) -> DomeResult<()> {
        self.probe.state.lock().input_enabled = enabled;
        Ok(())
    }

    fn register_interaction_events(&mut self, sink: InteractionSink) {
        self.probe.state.lock().interaction_sink = Some(sink);
    }

    fn release(&mut self) {
        let mut state = self.probe.state.lock();
        state.interaction_sink = None;
        state.input_enabled = false;
        state.lifecycle.push("release input".to_string());
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SimStage {
    Producer,
    Host,
    Input,
}

/// Builds simulated collaborators that all report into one probe.
#[derive(Debug, Clone)]
pub struct SimFactory {
    probe: SimProbe,
    metadata: EquirectangularMetadata,
    producer_plan: FailurePlan,
    host_tick_plan: FailurePlan,
    host_rejects_commands: bool,
    input_calibrates: bool,
    fail_at: Option<SimStage>,
}

impl SimFactory {
    pub fn new(probe: SimProbe) -> Self {
        Self {
            probe,
            metadata: EquirectangularMetadata::panorama(4096, 2048),
            producer_plan: FailurePlan::Never,
            host_tick_plan: FailurePlan::Never,
            host_rejects_commands: false,
            input_calibrates: true,
            fail_at: None,
        }
    }

    pub fn with_metadata(mut self, metadata: EquirectangularMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_producer_plan(mut self, plan: FailurePlan) -> Self {
        self.producer_plan = plan;
        self
    }

    pub fn with_host_tick_plan(mut self, plan: FailurePlan) -> Self {
        self.host_tick_plan = plan;
        self
    }

    pub fn with_host_rejecting_commands(mut self) -> Self {
        self.host_rejects_commands = true;
        self
    }

    pub fn with_uncalibrated_input(mut self) -> Self {
        self.input_calibrates = false;
        self
    }

    /// Makes construction of `stage` fail.
    pub fn failing_at(mut self, stage: SimStage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    fn check(&self, stage: SimStage, name: &str) -> DomeResult<()> {
        if self.fail_at == Some(stage) {
            self.probe.note(format!("fail {name}"));
            return Err(DomeError::InitializationFailed(format!(
                "simulated {name} failed to start"
            )));
        }
        self.probe.note(format!("create {name}"));
        Ok(())
    }
}

impl CollaboratorFactory for SimFactory {
    fn create_producer(
        &mut self,
        settings: &ProjectionSettings,
    ) -> DomeResult<Box<dyn FrameProducer>> {
        self.check(SimStage::Producer, "producer")?;
        tracing::debug!(
            channels = settings.projector_count(),
            "simulated render engine started"
        );
        Ok(Box::new(SimProducer::new(
            self.probe.clone(),
            self.metadata.clone(),
            self.producer_plan.clone(),
        )))
    }

    fn create_host(&mut self) -> DomeResult<Box<dyn ContentHost>> {
        self.check(SimStage::Host, "host")?;
        let mut host = SimHost::new(self.probe.clone()).with_tick_plan(self.host_tick_plan.clone());
        if self.host_rejects_commands {
            host = host.rejecting_commands();
        }
        Ok(Box::new(host))
    }

    fn create_input(&mut self) -> DomeResult<Box<dyn InputSource>> {
        self.check(SimStage::Input, "input")?;
        Ok(Box::new(SimInput::new(
            self.probe.clone(),
            self.input_calibrates,
        )))
    }
}
