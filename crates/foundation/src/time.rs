/// Engine time in seconds.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Time reached after `frames` fixed steps of `dt_s` seconds.
    pub fn after_frames(frames: u64, dt_s: f64) -> Self {
        Time(frames as f64 * dt_s)
    }
}
