use serde::{Deserialize, Serialize};

/// Constraints used whenever local camera/microphone tracks are acquired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub audio: bool,
    pub video: bool,
    /// Ideal capture width in pixels (valid range: 160-3840).
    pub width: u32,
    /// Ideal capture height in pixels (valid range: 120-2160).
    pub height: u32,
    /// Ideal frame rate (valid range: 1-60).
    pub frame_rate: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            width: 1280,
            height: 720,
            frame_rate: 30,
        }
    }
}
