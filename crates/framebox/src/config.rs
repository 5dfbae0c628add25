//! Tuning knobs for the player and per-open choices.

use std::time::Duration;

use crate::adapter::VideoFormat;

/// Timeouts for the synchronous edges of the API.
#[derive(Clone, Copy, Debug)]
pub struct PlayerConfig {
    /// Bounded wait for each preroll stage (ready, then paused) during
    /// open.
    pub preroll_timeout: Duration,
    /// Bounded wait for one discoverer probe.
    pub probe_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preroll_timeout: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Per-open choices.
///
/// Explicit dimensions skip the discoverer probe; either way the player
/// adopts the dimensions the engine actually negotiates once the first
/// frame arrives.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenOptions {
    /// Requested output width in pixels; probed when `None`.
    pub width: Option<u32>,
    /// Requested output height in pixels; probed when `None`.
    pub height: Option<u32>,
    /// Pixel layout frames are delivered in.
    pub format: VideoFormat,
}

impl OpenOptions {
    /// Request explicit output dimensions, skipping the probe.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            format: VideoFormat::default(),
        }
    }
}
