//! The playback facade: one player, one media session, polled by the host.
//!
//! All public operations run on the host's update thread. Pipeline events
//! arrive on engine threads and are buffered out of sight (bus messages
//! inside the adapter, frames in the mailbox) until the next
//! [`Player::update`], which drains every pending message in order and then
//! delivers at most one frame. Nothing here blocks except the bounded
//! preroll waits inside [`Player::open`].
//!
//! Callbacks are plain registered closures:
//! - frame: borrowed [`VideoFrame`] once per consumed frame,
//! - error: every failure the player reports, see [`PlayerError`],
//! - state change: `(old, new)` for top-level pipeline transitions,
//! - stream end: end of media, before the loop/pause policy is applied.

use std::sync::Arc;

use crate::adapter::{
    BusMessage, PipelineAdapter, PipelineBackend, PipelineDesc, PipelineState, SeekRequest,
};
use crate::config::{OpenOptions, PlayerConfig};
use crate::discover::MediaInfo;
use crate::error::PlayerError;
use crate::mailbox::{FrameMailbox, FrameProducer, VideoFrame};
use crate::seek::SeekCoordinator;
use crate::status::PlaybackSnapshot;
use crate::uri;
use crate::volume::VolumeCtl;

type FrameCallback = Box<dyn FnMut(&VideoFrame)>;
type ErrorCallback = Box<dyn FnMut(&PlayerError)>;
type StateCallback = Box<dyn FnMut(PipelineState, PipelineState)>;
type StreamEndCallback = Box<dyn FnMut()>;

#[derive(Default)]
struct Callbacks {
    frame: Option<FrameCallback>,
    error: Option<ErrorCallback>,
    state: Option<StateCallback>,
    stream_end: Option<StreamEndCallback>,
}

/// Media player around a [`PipelineBackend`].
///
/// Owns at most one open session. Not thread-safe: every method belongs to
/// the single host thread that also calls [`Player::update`].
pub struct Player {
    backend: Box<dyn PipelineBackend>,
    config: PlayerConfig,
    adapter: Option<Box<dyn PipelineAdapter>>,
    mailbox: Arc<FrameMailbox>,
    callbacks: Callbacks,
    state: PipelineState,
    width: u32,
    height: u32,
    duration: f64,
    position: f64,
    rate: f64,
    looping: bool,
    volumes: VolumeCtl,
    seeks: SeekCoordinator,
    frames_delivered: u64,
}

impl Player {
    pub fn new(backend: Box<dyn PipelineBackend>) -> Self {
        Self::with_config(backend, PlayerConfig::default())
    }

    pub fn with_config(backend: Box<dyn PipelineBackend>, config: PlayerConfig) -> Self {
        if let Err(e) = backend.init() {
            // No callbacks can be registered this early; open re-checks and
            // reports through the error callback.
            tracing::warn!("engine runtime not ready: {e:#}");
        }
        Self {
            backend,
            config,
            adapter: None,
            mailbox: Arc::new(FrameMailbox::new()),
            callbacks: Callbacks::default(),
            state: PipelineState::Null,
            width: 0,
            height: 0,
            duration: 0.0,
            position: 0.0,
            rate: 1.0,
            looping: false,
            volumes: VolumeCtl::new(),
            seeks: SeekCoordinator::new(),
            frames_delivered: 0,
        }
    }

    /// Register the sink for decoded frames. The frame is borrowed for the
    /// duration of the call.
    pub fn on_frame(&mut self, callback: impl FnMut(&VideoFrame) + 'static) {
        self.callbacks.frame = Some(Box::new(callback));
    }

    pub fn on_error(&mut self, callback: impl FnMut(&PlayerError) + 'static) {
        self.callbacks.error = Some(Box::new(callback));
    }

    /// Fires with `(old, new)` for every top-level pipeline transition.
    pub fn on_state_change(&mut self, callback: impl FnMut(PipelineState, PipelineState) + 'static) {
        self.callbacks.state = Some(Box::new(callback));
    }

    pub fn on_stream_end(&mut self, callback: impl FnMut() + 'static) {
        self.callbacks.stream_end = Some(Box::new(callback));
    }

    /// Open `path`, probing the media for its native dimensions.
    ///
    /// Returns false after reporting through the error callback when
    /// anything goes wrong; the player is left closed in that case.
    pub fn open(&mut self, path: &str) -> bool {
        self.open_with(path, OpenOptions::default())
    }

    /// Open with explicit choices; see [`OpenOptions`].
    pub fn open_with(&mut self, path: &str, options: OpenOptions) -> bool {
        match self.try_open(path, options) {
            Ok(()) => true,
            Err(e) => {
                self.close();
                self.report(e);
                false
            }
        }
    }

    fn try_open(&mut self, path: &str, options: OpenOptions) -> Result<(), PlayerError> {
        if let Err(e) = self.backend.init() {
            return Err(PlayerError::RuntimeInit(format!("{e:#}")));
        }

        self.close();

        if path.is_empty() {
            return Err(PlayerError::EmptyPath);
        }
        let uri = uri::to_uri(path).map_err(|e| PlayerError::BadPath {
            path: path.to_string(),
            reason: format!("{e:#}"),
        })?;

        let (width, height) = match (options.width, options.height) {
            (Some(w), Some(h)) => (w, h),
            _ => {
                let info = self
                    .backend
                    .probe(&uri, self.config.probe_timeout)
                    .map_err(|e| PlayerError::Probe {
                        uri: uri.clone(),
                        reason: format!("{e:#}"),
                    })?;
                // A partly explicit request falls back to the probe per axis.
                (
                    options.width.unwrap_or(info.width),
                    options.height.unwrap_or(info.height),
                )
            }
        };

        let desc = PipelineDesc {
            uri: uri.clone(),
            width,
            height,
            format: options.format,
        };
        let mailbox = Arc::new(FrameMailbox::new());
        let adapter = self
            .backend
            .launch(&desc, FrameProducer::new(mailbox.clone()))
            .map_err(|e| PlayerError::Build(format!("{e:#}")))?;

        self.mailbox = mailbox;
        self.adapter = Some(adapter);
        self.width = width;
        self.height = height;

        let timeout = self.config.preroll_timeout;
        if let Some(adapter) = self.adapter.as_deref_mut() {
            preroll(adapter, PipelineState::Ready, timeout)?;
            preroll(adapter, PipelineState::Paused, timeout)?;
        }

        // The preroll frame carries the dimensions the engine actually
        // negotiated, which may differ from what was requested.
        if let Some((w, h)) = self.mailbox.peek_size() {
            self.width = w;
            self.height = h;
        }

        tracing::info!(
            uri = %uri,
            width = self.width,
            height = self.height,
            "media opened"
        );
        Ok(())
    }

    /// Tear down the current session, if any. Idempotent, safe on a
    /// never-opened player, never reports.
    pub fn close(&mut self) {
        let had_session = self.adapter.is_some();
        if let Some(mut adapter) = self.adapter.take() {
            adapter.set_state(PipelineState::Null);
            // Dropping the adapter is what stops its delivery threads.
        }
        // Fresh mailbox: the dead session's frame counters go with it.
        self.mailbox = Arc::new(FrameMailbox::new());
        self.frames_delivered = 0;
        self.state = PipelineState::Null;
        self.width = 0;
        self.height = 0;
        self.duration = 0.0;
        self.position = 0.0;
        self.rate = 1.0;
        self.volumes.reset_level();
        if self.seeks.in_flight() {
            tracing::debug!("abandoning in-flight seek");
        }
        self.seeks.reset();
        if had_session {
            tracing::debug!("session closed");
        }
    }

    /// Drain every pending pipeline message, then deliver at most one
    /// frame. Call once per host tick; never blocks.
    pub fn update(&mut self) {
        loop {
            let message = match self.adapter.as_mut() {
                Some(adapter) => adapter.poll_message(),
                None => None,
            };
            let Some(message) = message else { break };
            self.handle_message(message);
        }

        if let Some(frame) = self.mailbox.take() {
            self.width = frame.width();
            self.height = frame.height();
            self.frames_delivered += 1;
            if let Some(cb) = self.callbacks.frame.as_mut() {
                cb(&frame);
            }
        }
    }

    fn handle_message(&mut self, message: BusMessage) {
        match message {
            BusMessage::Error(text) => {
                self.report(PlayerError::Pipeline(text));
                self.close();
            }
            BusMessage::StateChanged {
                old,
                new,
                from_pipeline,
            } => {
                if !from_pipeline || old == new {
                    return;
                }
                self.state = new;
                tracing::debug!(old = %old, new = %new, "pipeline state changed");
                if let Some(cb) = self.callbacks.state.as_mut() {
                    cb(old, new);
                }
            }
            BusMessage::AsyncDone => {
                self.refresh_duration();
                if let Some(parked) = self.seeks.settle() {
                    // Re-clamp: the duration was just refreshed and may
                    // have changed since the request was parked.
                    let position = parked.position.clamp(0.0, self.duration.max(0.0));
                    self.submit_seek(SeekRequest {
                        position,
                        rate: parked.rate,
                    });
                }
            }
            BusMessage::DurationChanged => self.refresh_duration(),
            BusMessage::EndOfStream => {
                if let Some(cb) = self.callbacks.stream_end.as_mut() {
                    cb();
                }
                if self.looping {
                    self.replay();
                } else {
                    self.pause();
                }
            }
            BusMessage::Other => {}
        }
    }

    /// Ask the pipeline for a specific state. Prefer [`Player::play`],
    /// [`Player::pause`] and [`Player::stop`].
    pub fn set_state(&mut self, target: PipelineState) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.set_state(target);
        }
    }

    /// State last reported by the pipeline. Transitions show up here only
    /// after the `update` that drains them.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Start or resume playback.
    pub fn play(&mut self) {
        if self.adapter.is_none() {
            return;
        }
        self.set_state(PipelineState::Playing);
        // A freshly built pipeline comes up at full volume; a muted player
        // has to win that argument again.
        if self.volumes.muted() && self.volume() != 0.0 {
            self.set_mute(true);
        }
    }

    pub fn pause(&mut self) {
        self.set_state(PipelineState::Paused);
    }

    /// Halt and rewind by dropping the pipeline to null. The session stays
    /// open; `play` starts over from the beginning.
    pub fn stop(&mut self) {
        self.set_state(PipelineState::Null);
    }

    /// Restart playback from the beginning.
    pub fn replay(&mut self) {
        self.stop();
        self.play();
    }

    /// Request a seek, clamped to `[0, duration]`. While a previous seek is
    /// still settling the newest request is parked and flushed on
    /// async-done; intermediate targets are dropped.
    pub fn set_time(&mut self, seconds: f64) {
        if self.adapter.is_none() || !seconds.is_finite() {
            return;
        }
        let request = SeekRequest {
            position: seconds.clamp(0.0, self.duration.max(0.0)),
            rate: self.rate,
        };
        self.submit_seek(request);
    }

    /// Last known position in seconds, refreshed from the engine when it
    /// can answer.
    pub fn time(&mut self) -> f64 {
        if let Some(p) = self.adapter.as_mut().and_then(|a| a.query_position()) {
            self.position = p;
        }
        self.position
    }

    /// Media duration in seconds; 0.0 until the pipeline first reports it.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Change the playback rate through a rate-carrying seek at the current
    /// position. Negative plays backwards; 0 is ignored.
    pub fn set_rate(&mut self, rate: f64) {
        if self.adapter.is_none() || !rate.is_finite() || rate == 0.0 {
            return;
        }
        self.rate = rate;
        let position = self.time().clamp(0.0, self.duration.max(0.0));
        self.submit_seek(SeekRequest { position, rate });
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Set the output volume. Clamps to `[0.0, 1.0]` and always un-mutes.
    pub fn set_volume(&mut self, volume: f64) {
        let level = self.volumes.set_level(volume);
        self.push_volume(level);
    }

    /// Current output volume, live from the engine while a session is open.
    pub fn volume(&mut self) -> f64 {
        self.refresh_volume();
        self.volumes.level()
    }

    /// Mute or unmute without losing the dialed-in volume.
    pub fn set_mute(&mut self, mute: bool) {
        let level = if mute {
            self.refresh_volume();
            self.volumes.mute()
        } else {
            self.volumes.unmute()
        };
        self.push_volume(level);
    }

    pub fn muted(&self) -> bool {
        self.volumes.muted()
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Width of delivered frames; refined once the engine negotiates.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of delivered frames; refined once the engine negotiates.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Ask the discoverer about `path` without opening it.
    pub fn probe(&self, path: &str) -> Result<MediaInfo, PlayerError> {
        let uri = uri::to_uri(path).map_err(|e| PlayerError::BadPath {
            path: path.to_string(),
            reason: format!("{e:#}"),
        })?;
        self.backend
            .probe(&uri, self.config.probe_timeout)
            .map_err(|e| PlayerError::Probe {
                uri,
                reason: format!("{e:#}"),
            })
    }

    /// Cheap point-in-time view for UIs and diagnostics.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            width: self.width,
            height: self.height,
            position: self.position,
            duration: self.duration,
            rate: self.rate,
            volume: self.volumes.level(),
            muted: self.volumes.muted(),
            looping: self.looping,
            frames_produced: self.mailbox.produced(),
            frames_delivered: self.frames_delivered,
            frames_dropped: self.mailbox.dropped(),
        }
    }

    fn submit_seek(&mut self, request: SeekRequest) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        if let Some(r) = self.seeks.request(request) {
            if adapter.seek(r) {
                self.seeks.submitted();
            } else {
                tracing::warn!(position = r.position, "seek submission refused");
            }
        }
    }

    fn refresh_duration(&mut self) {
        if let Some(d) = self.adapter.as_mut().and_then(|a| a.query_duration()) {
            self.duration = d;
        }
    }

    fn refresh_volume(&mut self) {
        if let Some(live) = self.adapter.as_mut().map(|a| a.volume()) {
            self.volumes.observe(live);
        }
    }

    fn push_volume(&mut self, level: f64) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.set_volume(level);
        }
    }

    fn report(&mut self, error: PlayerError) {
        tracing::error!("player error: {error}");
        if let Some(cb) = self.callbacks.error.as_mut() {
            cb(&error);
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

fn preroll(
    adapter: &mut dyn PipelineAdapter,
    target: PipelineState,
    timeout: std::time::Duration,
) -> Result<(), PlayerError> {
    adapter.set_state(target);
    match adapter.wait_state(timeout) {
        Some(state) if state == target => Ok(()),
        _ => Err(PlayerError::Preroll { target }),
    }
}
