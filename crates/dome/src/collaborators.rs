//! Seams to the three external systems the dome pipeline drives.
//!
//! Each collaborator pushes its events into a bounded inbox through the sink
//! it is handed at registration; the render loop drains those inboxes at the
//! start of every frame. Collaborator calls are expected to carry their own
//! timeouts.

use foundation::error::{DomeError, DomeResult};
use foundation::math::DomeCoordinate;
use projection::frame::EquirectangularMetadata;
use projection::settings::ProjectionSettings;
use runtime::inbox::InboxSender;

use crate::events::{EngineEvent, HostEvent, InteractionEvent};

pub type InteractionSink = InboxSender<InteractionEvent>;
pub type HostEventSink = InboxSender<HostEvent>;
pub type EngineEventSink = InboxSender<EngineEvent>;

/// One rendered equirectangular frame. The pixels stay with the producer;
/// `pixel_source` names them for the display side.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedFrame {
    pub metadata: EquirectangularMetadata,
    pub pixel_source: String,
}

/// Mapping/rendering back end.
pub trait FrameProducer: Send {
    fn produce_frame(&mut self) -> DomeResult<ProducedFrame>;

    fn register_engine_events(&mut self, sink: EngineEventSink);

    /// Points the engine's camera at `center`.
    fn set_view(&mut self, _center: &DomeCoordinate) -> DomeResult<()> {
        Err(DomeError::RenderEngine(
            "render engine does not support view control".to_string(),
        ))
    }

    /// Shows a still equirectangular image instead of live frames.
    fn present_image(
        &mut self,
        _url: &str,
        _metadata: &EquirectangularMetadata,
    ) -> DomeResult<()> {
        Err(DomeError::RenderEngine(
            "render engine cannot present still images".to_string(),
        ))
    }

    fn release(&mut self) {}
}

/// Embedded web content host running the map application.
pub trait ContentHost: Send {
    /// Creates the page surface from a local shell document.
    fn setup(&mut self, html_path: &str, width: u32, height: u32) -> DomeResult<()>;

    fn load(&mut self, app_url: &str) -> DomeResult<()>;

    /// Fire-and-forget delivery of `(command, data)` to the application.
    fn post_command(&mut self, command: &str, data: &str) -> DomeResult<()>;

    fn register_host_events(&mut self, sink: HostEventSink);

    /// Lets the host process its own queue once per frame.
    fn tick(&mut self) -> DomeResult<()>;

    fn release(&mut self) {}
}

/// Gaze, gesture, voice and controller input.
pub trait InputSource: Send {
    /// Returns false when the hardware could not be calibrated.
    fn calibrate(&mut self) -> bool;

    fn set_enabled(&mut self, enabled: bool) -> DomeResult<()>;

    fn register_interaction_events(&mut self, sink: InteractionSink);

    fn release(&mut self) {}
}

/// Builds the collaborators during `initialize`, in dependency order.
pub trait CollaboratorFactory {
    fn create_producer(
        &mut self,
        settings: &ProjectionSettings,
    ) -> DomeResult<Box<dyn FrameProducer>>;

    fn create_host(&mut self) -> DomeResult<Box<dyn ContentHost>>;

    fn create_input(&mut self) -> DomeResult<Box<dyn InputSource>>;
}

/// The live collaborator set of an initialized pipeline.
pub struct Collaborators {
    pub producer: Box<dyn FrameProducer>,
    pub host: Box<dyn ContentHost>,
    pub input: Box<dyn InputSource>,
}

impl Collaborators {
    /// Releases in reverse construction order: input, host, producer.
    pub fn release(mut self) {
        self.input.release();
        self.host.release();
        self.producer.release();
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
