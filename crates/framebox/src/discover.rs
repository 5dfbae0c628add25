//! Probed media facts, consumed by the player as an immutable value object.
//!
//! Discovery itself is the backend's business ([`probe`]); the player only
//! reads the answer, mainly to size the pipeline when the host did not ask
//! for explicit dimensions.
//!
//! [`probe`]: crate::adapter::PipelineBackend::probe

use serde::{Deserialize, Serialize};

/// What the discoverer learned about one media URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub uri: String,
    /// Native width of the primary video stream, 0 when there is none.
    pub width: u32,
    /// Native height of the primary video stream, 0 when there is none.
    pub height: u32,
    /// Frames per second, 0.0 when unknown.
    pub framerate: f32,
    pub has_video: bool,
    pub has_audio: bool,
    pub seekable: bool,
    /// Total duration in seconds, 0.0 for live or unknown streams.
    pub duration: f64,
    /// Audio sample rate in Hz, 0 without an audio stream.
    pub sample_rate: u32,
    /// Nominal bit rate in bits per second, 0 when unknown.
    pub bit_rate: u32,
}

impl MediaInfo {
    /// A plain seekable video clip. Convenience for synthetic media.
    pub fn video(uri: &str, width: u32, height: u32, framerate: f32, duration: f64) -> Self {
        Self {
            uri: uri.to_string(),
            width,
            height,
            framerate,
            has_video: true,
            has_audio: false,
            seekable: true,
            duration,
            sample_rate: 0,
            bit_rate: 0,
        }
    }
}
