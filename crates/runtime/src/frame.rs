use foundation::time::Time;

/// Metadata for one tick of the render loop.
///
/// Ticks advance only when the orchestrator starts a frame, so a recorded
/// sequence of ticks replays identically regardless of wall-clock jitter.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameTick {
    /// 0-based frame index.
    pub index: u64,
    /// Nominal frame interval (seconds).
    pub dt_s: f64,
    /// Loop time at the start of the frame (seconds).
    pub time: Time,
}

impl FrameTick {
    /// Nominal 60 Hz projector refresh.
    pub const DEFAULT_DT_S: f64 = 1.0 / 60.0;

    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time::after_frames(index, dt_s),
        }
    }

    pub fn first() -> Self {
        Self::new(0, Self::DEFAULT_DT_S)
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt_s)
    }
}

impl Default for FrameTick {
    fn default() -> Self {
        Self::first()
    }
}
