//! Contract between the player and the multimedia engine doing the real work.
//!
//! The engine sits behind two traits:
//! - [`PipelineBackend`] probes media and builds pipelines,
//! - [`PipelineAdapter`] drives one running pipeline (states, seeks, volume)
//!   and exposes its message bus.
//!
//! Engine threads never call into the player directly: decoded frames travel
//! through the [`FrameProducer`] handed to [`PipelineBackend::launch`], and
//! everything else is queued as [`BusMessage`]s the player drains during
//! `update`.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::discover::MediaInfo;
use crate::mailbox::FrameProducer;

/// Pipeline states as the engine reports them.
///
/// The player mirrors these one to one and never invents intermediate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No resources allocated. The closed/initial state.
    #[default]
    Null,
    /// Resources allocated, nothing prerolled yet.
    Ready,
    /// Prerolled and holding a frame.
    Paused,
    /// The clock is running.
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Null => "null",
            PipelineState::Ready => "ready",
            PipelineState::Paused => "paused",
            PipelineState::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Pixel layout of delivered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoFormat {
    /// 32-bit packed, blue first. The default.
    #[default]
    Bgra,
    /// 32-bit packed, red first.
    Rgba,
    /// 8-bit grayscale.
    Gray8,
}

impl VideoFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            VideoFormat::Bgra | VideoFormat::Rgba => 4,
            VideoFormat::Gray8 => 1,
        }
    }

    /// Caps-style name used in pipeline descriptions.
    pub fn caps_name(self) -> &'static str {
        match self {
            VideoFormat::Bgra => "BGRA",
            VideoFormat::Rgba => "RGBA",
            VideoFormat::Gray8 => "GRAY8",
        }
    }
}

/// One seek order for the engine.
///
/// The rate rides along with the position so speed changes and position
/// changes share the same in-flight slot in the seek coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    /// Target position in seconds, clamped to the known duration.
    pub position: f64,
    /// Playback rate to apply from there. Negative plays backwards, never 0.
    pub rate: f64,
}

/// Declarative description of the pipeline to build.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    pub uri: String,
    /// Requested output width in pixels.
    pub width: u32,
    /// Requested output height in pixels.
    pub height: u32,
    pub format: VideoFormat,
}

/// Messages drained from the pipeline bus, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// Fatal engine error. The session is over.
    Error(String),
    /// Some element changed state. Only messages with `from_pipeline` set
    /// describe the top-level pipeline; the rest are sub-element chatter
    /// the player ignores.
    StateChanged {
        old: PipelineState,
        new: PipelineState,
        from_pipeline: bool,
    },
    /// A previously requested asynchronous state change or seek has fully
    /// settled.
    AsyncDone,
    /// The media duration became known or changed mid-stream.
    DurationChanged,
    /// Playback ran off the end of the media.
    EndOfStream,
    /// Anything else the engine posts; ignored.
    Other,
}

/// Drives one running pipeline.
///
/// Implementations may run delivery threads internally, but every method
/// here is called from the single host thread that owns the player.
pub trait PipelineAdapter {
    /// Request a transition to `target`. Completion may be asynchronous;
    /// returns false only if the engine refused outright.
    fn set_state(&mut self, target: PipelineState) -> bool;

    /// Last state the engine committed to.
    fn state(&mut self) -> PipelineState;

    /// Block until the pending transition settles or `timeout` elapses.
    /// `None` means the transition failed; otherwise the state actually
    /// reached, which still differs from the target when the wait timed out.
    fn wait_state(&mut self, timeout: Duration) -> Option<PipelineState>;

    /// Current position in seconds, when the engine can answer.
    fn query_position(&mut self) -> Option<f64>;

    /// Media duration in seconds, when known.
    fn query_duration(&mut self) -> Option<f64>;

    /// Submit an asynchronous seek. Returns whether the engine accepted the
    /// submission; completion arrives later as [`BusMessage::AsyncDone`].
    fn seek(&mut self, request: SeekRequest) -> bool;

    /// Current output volume in `[0.0, 1.0]`.
    fn volume(&mut self) -> f64;

    fn set_volume(&mut self, volume: f64);

    /// Pop the oldest pending bus message without blocking.
    fn poll_message(&mut self) -> Option<BusMessage>;
}

/// Probes media and builds pipelines.
pub trait PipelineBackend {
    /// Check that the engine runtime is usable. Re-checked on every open.
    fn init(&self) -> Result<()>;

    /// Probe `uri` for stream facts. Synchronous, bounded by `timeout`.
    fn probe(&self, uri: &str, timeout: Duration) -> Result<MediaInfo>;

    /// Build a pipeline for `desc`. Decoded frames are pushed through
    /// `frames` from the engine's delivery thread.
    fn launch(
        &self,
        desc: &PipelineDesc,
        frames: FrameProducer,
    ) -> Result<Box<dyn PipelineAdapter>>;
}
