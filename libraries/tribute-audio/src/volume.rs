//! Linear volume level
//!
//! The sound primitive works with a linear gain in [0.0, 1.0].
//! Unlike a mixer fader there is no dB mapping: the fade-out is a straight
//! linear ramp, so the stored value is the gain itself.

use serde::{Deserialize, Serialize};

/// Volume level clamped to [0.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct Volume(f32);

impl Volume {
    /// Background music default
    pub const DEFAULT: Volume = Volume(0.5);

    pub const SILENT: Volume = Volume(0.0);

    /// Create a volume, clamping out-of-range values (NaN becomes silence)
    pub fn new(level: f32) -> Self {
        if level.is_nan() {
            return Self::SILENT;
        }
        Self(level.clamp(0.0, 1.0))
    }

    /// Linear gain
    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<f32> for Volume {
    fn from(level: f32) -> Self {
        Self::new(level)
    }
}

impl From<Volume> for f32 {
    fn from(volume: Volume) -> Self {
        volume.0
    }
}
