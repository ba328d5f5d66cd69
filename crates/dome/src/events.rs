use foundation::math::DomeCoordinate;
use serde::{Deserialize, Serialize};

/// Physical input channel an interaction event came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Gaze,
    Gesture,
    Voice,
    Controller,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Gaze => "gaze",
            InteractionKind::Gesture => "gesture",
            InteractionKind::Voice => "voice",
            InteractionKind::Controller => "controller",
        }
    }

    /// Kinds that point at a spot on the dome and can select a region.
    pub fn is_pointing(self) -> bool {
        matches!(self, InteractionKind::Gaze | InteractionKind::Controller)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub kind: InteractionKind,
    pub position: DomeCoordinate,
    pub payload: String,
    /// Non-decreasing per `kind`.
    pub timestamp: u64,
}

impl InteractionEvent {
    pub fn new(
        kind: InteractionKind,
        position: DomeCoordinate,
        payload: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            kind,
            position,
            payload: payload.into(),
            timestamp,
        }
    }
}

/// `(eventType, data)` pair raised by the web application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    pub event_type: String,
    pub data: String,
}

impl HostEvent {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}

/// `(eventType, data)` pair raised by the render engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub event_type: String,
    pub data: String,
}

impl EngineEvent {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}
