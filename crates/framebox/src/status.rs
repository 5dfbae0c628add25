//! Point-in-time view of the player for host UIs and diagnostics.

use serde::{Deserialize, Serialize};

use crate::adapter::PipelineState;

/// Snapshot of everything a host UI typically renders about playback.
///
/// Counters are session totals; they reset when the player closes and a
/// new media is opened.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaybackSnapshot {
    /// State last reported by the pipeline.
    pub state: PipelineState,
    /// Negotiated frame width in pixels.
    pub width: u32,
    /// Negotiated frame height in pixels.
    pub height: u32,
    /// Last known position in seconds.
    pub position: f64,
    /// Media duration in seconds, 0.0 until the pipeline reports one.
    pub duration: f64,
    /// Playback rate; negative plays backwards.
    pub rate: f64,
    /// Effective output volume in `[0.0, 1.0]`.
    pub volume: f64,
    pub muted: bool,
    pub looping: bool,
    /// Frames accepted into the mailbox by the delivery thread.
    pub frames_produced: u64,
    /// Frames handed to the frame callback.
    pub frames_delivered: u64,
    /// Frames dropped because the host had not consumed the previous one.
    pub frames_dropped: u64,
}
