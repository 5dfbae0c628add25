//! In-memory pipeline backend for tests and the demo binary.
//!
//! [`SimBackend`] stands in for a real multimedia engine. It keeps a
//! registry of synthetic clips and builds [`SimPipeline`]s that mimic the
//! message choreography real engines produce: one state-changed message per
//! transition hop, async-done once preroll settles, a preroll frame on
//! reaching paused, end-of-stream at the clip end, and a bus flush when the
//! pipeline drops to null.
//!
//! Pacing comes in two modes:
//! - manual ([`SimBackend::new`]): nothing happens unless driven through
//!   the adapter or scripted through a [`SimHandle`],
//! - live ([`SimBackend::live`]): reaching playing spawns a delivery thread
//!   that paces frames at the clip framerate and advances position by
//!   `dt × rate`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};

use crate::adapter::{
    BusMessage, PipelineAdapter, PipelineBackend, PipelineDesc, PipelineState, SeekRequest,
};
use crate::discover::MediaInfo;
use crate::mailbox::{FrameProducer, VideoFrame};

/// In-memory engine. Register clips, then hand it to a player.
///
/// Keep a [`SimHandle`] (from [`SimBackend::handle`]) around before moving
/// the backend into the player; the handle is how tests script failures and
/// bus traffic afterwards.
pub struct SimBackend {
    inner: Arc<SimInner>,
}

struct SimInner {
    media: Mutex<HashMap<String, MediaInfo>>,
    live: bool,
    broken: AtomicBool,
    refuse_launch: AtomicBool,
    stall_preroll: AtomicBool,
    current: Mutex<Weak<Mutex<SimShared>>>,
}

impl SimBackend {
    /// Manual pacing: state walks and seeks apply synchronously, frames and
    /// extra bus traffic only appear when scripted.
    pub fn new() -> Self {
        Self::with_pacing(false)
    }

    /// Live pacing: a delivery thread feeds frames in real time while the
    /// pipeline is playing, and seeks complete on their own.
    pub fn live() -> Self {
        Self::with_pacing(true)
    }

    fn with_pacing(live: bool) -> Self {
        Self {
            inner: Arc::new(SimInner {
                media: Mutex::new(HashMap::new()),
                live,
                broken: AtomicBool::new(false),
                refuse_launch: AtomicBool::new(false),
                stall_preroll: AtomicBool::new(false),
                current: Mutex::new(Weak::new()),
            }),
        }
    }

    /// Make `info.uri` probeable and playable.
    pub fn register(&self, info: MediaInfo) {
        self.inner
            .media
            .lock()
            .unwrap()
            .insert(info.uri.clone(), info);
    }

    /// Control handle bound to this backend and whatever pipeline it
    /// launched most recently.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            inner: self.inner.clone(),
        }
    }
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBackend for SimBackend {
    fn init(&self) -> Result<()> {
        if self.inner.broken.load(Ordering::Relaxed) {
            bail!("engine runtime unavailable");
        }
        Ok(())
    }

    fn probe(&self, uri: &str, _timeout: Duration) -> Result<MediaInfo> {
        self.inner
            .media
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| anyhow!("no media registered for {uri}"))
    }

    fn launch(
        &self,
        desc: &PipelineDesc,
        frames: FrameProducer,
    ) -> Result<Box<dyn PipelineAdapter>> {
        if self.inner.refuse_launch.load(Ordering::Relaxed) {
            bail!("pipeline construction refused");
        }
        let info = self
            .inner
            .media
            .lock()
            .unwrap()
            .get(&desc.uri)
            .cloned()
            .ok_or_else(|| anyhow!("no media registered for {}", desc.uri))?;

        tracing::info!(
            uri = %desc.uri,
            width = desc.width,
            height = desc.height,
            format = desc.format.caps_name(),
            live = self.inner.live,
            "sim pipeline launched"
        );

        let shared = Arc::new(Mutex::new(SimShared {
            state: PipelineState::Null,
            bus: VecDeque::new(),
            position: 0.0,
            duration: info.duration,
            rate: 1.0,
            volume: 1.0,
            seeks: Vec::new(),
            fail_seeks: false,
            auto_complete_seeks: self.inner.live,
            stall_preroll: self.inner.stall_preroll.load(Ordering::Relaxed),
            eos_sent: false,
            frame_index: 0,
            desc: desc.clone(),
            framerate: info.framerate,
            producer: frames,
        }));
        *self.inner.current.lock().unwrap() = Arc::downgrade(&shared);

        Ok(Box::new(SimPipeline {
            shared,
            live: self.inner.live,
            feeder: None,
        }))
    }
}

/// Everything the pipeline, its feeder thread, and the control handle share.
struct SimShared {
    state: PipelineState,
    bus: VecDeque<BusMessage>,
    position: f64,
    duration: f64,
    rate: f64,
    volume: f64,
    seeks: Vec<SeekRequest>,
    fail_seeks: bool,
    auto_complete_seeks: bool,
    stall_preroll: bool,
    eos_sent: bool,
    frame_index: u64,
    desc: PipelineDesc,
    framerate: f32,
    producer: FrameProducer,
}

/// One simulated pipeline. Walks states a hop at a time like a real engine
/// and owns the live-mode feeder thread.
pub struct SimPipeline {
    shared: Arc<Mutex<SimShared>>,
    live: bool,
    feeder: Option<Feeder>,
}

struct Feeder {
    cancel: Arc<AtomicBool>,
    join: thread::JoinHandle<()>,
}

impl SimPipeline {
    fn stop_feeder(&mut self) {
        if let Some(f) = self.feeder.take() {
            f.cancel.store(true, Ordering::Relaxed);
            let _ = f.join.join();
            tracing::debug!("sim feeder stopped");
        }
    }

    fn start_feeder(&mut self) {
        if self.feeder.is_some() {
            return;
        }
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_for_thread = cancel.clone();
        let shared = self.shared.clone();
        let join = thread::spawn(move || feeder_main(shared, cancel_for_thread));
        self.feeder = Some(Feeder { cancel, join });
        tracing::debug!("sim feeder started");
    }

    fn produce_preroll(&self) {
        let (frame, producer) = {
            let mut g = self.shared.lock().unwrap();
            g.frame_index += 1;
            (synth_frame(&g.desc, g.frame_index), g.producer.clone())
        };
        producer.produce(frame);
    }
}

impl PipelineAdapter for SimPipeline {
    fn set_state(&mut self, target: PipelineState) -> bool {
        loop {
            let (old, next) = {
                let mut g = self.shared.lock().unwrap();
                let Some(next) = hop_towards(g.state, target) else {
                    break;
                };
                if g.stall_preroll
                    && g.state == PipelineState::Ready
                    && next == PipelineState::Paused
                {
                    // Preroll never settles; the bounded wait in open will
                    // see the pipeline stuck in ready.
                    break;
                }
                let old = g.state;
                g.state = next;
                g.bus.push_back(BusMessage::StateChanged {
                    old,
                    new: next,
                    from_pipeline: true,
                });
                if old == PipelineState::Ready && next == PipelineState::Paused {
                    g.bus.push_back(BusMessage::AsyncDone);
                }
                if next == PipelineState::Null {
                    // Engines flush the bus and forget the segment when a
                    // pipeline drops to null.
                    g.bus.clear();
                    g.position = 0.0;
                    g.rate = 1.0;
                    g.eos_sent = false;
                }
                (old, next)
            };
            if old == PipelineState::Playing {
                self.stop_feeder();
            }
            if old == PipelineState::Ready && next == PipelineState::Paused {
                self.produce_preroll();
            }
            if next == PipelineState::Playing && self.live {
                self.start_feeder();
            }
        }
        true
    }

    fn state(&mut self) -> PipelineState {
        self.shared.lock().unwrap().state
    }

    fn wait_state(&mut self, _timeout: Duration) -> Option<PipelineState> {
        // Transitions apply synchronously here, so there is never anything
        // to actually wait on; a stalled preroll shows up as the pipeline
        // still sitting in the state it got stuck in.
        Some(self.shared.lock().unwrap().state)
    }

    fn query_position(&mut self) -> Option<f64> {
        Some(self.shared.lock().unwrap().position)
    }

    fn query_duration(&mut self) -> Option<f64> {
        Some(self.shared.lock().unwrap().duration)
    }

    fn seek(&mut self, request: SeekRequest) -> bool {
        let mut g = self.shared.lock().unwrap();
        if g.fail_seeks {
            return false;
        }
        g.seeks.push(request);
        g.position = if g.duration > 0.0 {
            request.position.clamp(0.0, g.duration)
        } else {
            request.position.max(0.0)
        };
        g.rate = request.rate;
        // Seeking away from the end re-arms end-of-stream.
        g.eos_sent = false;
        if g.auto_complete_seeks {
            g.bus.push_back(BusMessage::AsyncDone);
        }
        true
    }

    fn volume(&mut self) -> f64 {
        self.shared.lock().unwrap().volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.shared.lock().unwrap().volume = volume.clamp(0.0, 1.0);
    }

    fn poll_message(&mut self) -> Option<BusMessage> {
        self.shared.lock().unwrap().bus.pop_front()
    }
}

impl Drop for SimPipeline {
    fn drop(&mut self) {
        self.stop_feeder();
    }
}

fn rank(state: PipelineState) -> usize {
    match state {
        PipelineState::Null => 0,
        PipelineState::Ready => 1,
        PipelineState::Paused => 2,
        PipelineState::Playing => 3,
    }
}

fn hop_towards(state: PipelineState, target: PipelineState) -> Option<PipelineState> {
    const ORDER: [PipelineState; 4] = [
        PipelineState::Null,
        PipelineState::Ready,
        PipelineState::Paused,
        PipelineState::Playing,
    ];
    let (here, there) = (rank(state), rank(target));
    match here.cmp(&there) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Less => Some(ORDER[here + 1]),
        std::cmp::Ordering::Greater => Some(ORDER[here - 1]),
    }
}

fn synth_frame(desc: &PipelineDesc, index: u64) -> VideoFrame {
    let len = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel();
    let seed = (index % 251) as u8;
    VideoFrame::new(desc.width, desc.height, desc.format, vec![seed; len])
}

fn feeder_main(shared: Arc<Mutex<SimShared>>, cancel: Arc<AtomicBool>) {
    let (interval, producer) = {
        let g = shared.lock().unwrap();
        let fps = if g.framerate > 0.0 {
            g.framerate as f64
        } else {
            30.0
        };
        (Duration::from_secs_f64(1.0 / fps), g.producer.clone())
    };
    let dt = interval.as_secs_f64();

    loop {
        thread::sleep(interval);
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let frame = {
            let mut g = shared.lock().unwrap();
            if g.state != PipelineState::Playing {
                None
            } else {
                let advanced = g.position + dt * g.rate;
                g.position = if g.duration > 0.0 {
                    advanced.clamp(0.0, g.duration)
                } else {
                    advanced.max(0.0)
                };
                let at_end = g.rate > 0.0 && g.duration > 0.0 && g.position >= g.duration;
                if at_end {
                    if !g.eos_sent {
                        g.eos_sent = true;
                        g.bus.push_back(BusMessage::EndOfStream);
                    }
                    None
                } else {
                    g.frame_index += 1;
                    Some(synth_frame(&g.desc, g.frame_index))
                }
            }
        };
        if let Some(f) = frame {
            producer.produce(f);
        }
    }
}

/// Scripting and inspection handle for tests and diagnostics.
///
/// Backend-level knobs work any time; pipeline-level calls quietly do
/// nothing until the backend has launched a pipeline.
#[derive(Clone)]
pub struct SimHandle {
    inner: Arc<SimInner>,
}

impl SimHandle {
    fn with_shared<R>(&self, f: impl FnOnce(&mut SimShared) -> R) -> Option<R> {
        let shared = self.inner.current.lock().unwrap().upgrade()?;
        let mut g = shared.lock().unwrap();
        Some(f(&mut g))
    }

    /// Make [`PipelineBackend::init`] fail until cleared.
    pub fn set_broken(&self, broken: bool) {
        self.inner.broken.store(broken, Ordering::Relaxed);
    }

    /// Make [`PipelineBackend::launch`] fail until cleared.
    pub fn refuse_launch(&self, refuse: bool) {
        self.inner.refuse_launch.store(refuse, Ordering::Relaxed);
    }

    /// Pipelines launched while set never settle their preroll to paused.
    pub fn stall_preroll(&self, stall: bool) {
        self.inner.stall_preroll.store(stall, Ordering::Relaxed);
    }

    pub fn has_pipeline(&self) -> bool {
        self.inner.current.lock().unwrap().upgrade().is_some()
    }

    /// Queue a raw bus message for the next drain.
    pub fn push_message(&self, message: BusMessage) {
        self.with_shared(|g| g.bus.push_back(message));
    }

    /// Push a frame through the pipeline's delivery path. Returns whether
    /// the mailbox accepted it.
    pub fn produce_frame(&self, frame: VideoFrame) -> bool {
        let producer = self.with_shared(|g| g.producer.clone());
        match producer {
            Some(p) => p.produce(frame),
            None => false,
        }
    }

    /// Let a submitted seek settle by posting async-done.
    pub fn complete_seek(&self) {
        self.push_message(BusMessage::AsyncDone);
    }

    /// Every seek submission the pipeline accepted, oldest first.
    pub fn seek_log(&self) -> Vec<SeekRequest> {
        self.with_shared(|g| g.seeks.clone()).unwrap_or_default()
    }

    /// Volume the pipeline last applied; fresh pipelines come up at 1.0.
    pub fn volume(&self) -> f64 {
        self.with_shared(|g| g.volume).unwrap_or(1.0)
    }

    /// Make seek submissions fail until cleared.
    pub fn fail_seeks(&self, fail: bool) {
        self.with_shared(|g| g.fail_seeks = fail);
    }

    /// Accepted seeks post async-done immediately. Live pipelines default
    /// to this.
    pub fn auto_complete_seeks(&self, auto: bool) {
        self.with_shared(|g| g.auto_complete_seeks = auto);
    }

    pub fn set_position(&self, position: f64) {
        self.with_shared(|g| g.position = position);
    }

    pub fn set_duration(&self, duration: f64) {
        self.with_shared(|g| g.duration = duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::VideoFormat;
    use crate::mailbox::FrameMailbox;

    fn clip(uri: &str) -> MediaInfo {
        MediaInfo::video(uri, 320, 240, 25.0, 12.0)
    }

    fn desc(uri: &str) -> PipelineDesc {
        PipelineDesc {
            uri: uri.to_string(),
            width: 320,
            height: 240,
            format: VideoFormat::Bgra,
        }
    }

    fn launch(backend: &SimBackend, uri: &str) -> (Box<dyn PipelineAdapter>, Arc<FrameMailbox>) {
        let mailbox = Arc::new(FrameMailbox::new());
        let adapter = backend
            .launch(&desc(uri), FrameProducer::new(mailbox.clone()))
            .unwrap();
        (adapter, mailbox)
    }

    #[test]
    fn probe_answers_only_for_registered_media() {
        let backend = SimBackend::new();
        backend.register(clip("file:///a.mp4"));

        let info = backend
            .probe("file:///a.mp4", Duration::from_secs(5))
            .unwrap();
        assert_eq!((info.width, info.height), (320, 240));
        assert!(backend.probe("file:///b.mp4", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn walk_to_paused_posts_hops_async_done_and_a_preroll_frame() {
        let backend = SimBackend::new();
        backend.register(clip("file:///a.mp4"));
        let (mut adapter, mailbox) = launch(&backend, "file:///a.mp4");

        assert!(adapter.set_state(PipelineState::Paused));
        assert_eq!(
            adapter.wait_state(Duration::from_secs(1)),
            Some(PipelineState::Paused)
        );

        assert_eq!(
            adapter.poll_message(),
            Some(BusMessage::StateChanged {
                old: PipelineState::Null,
                new: PipelineState::Ready,
                from_pipeline: true,
            })
        );
        assert_eq!(
            adapter.poll_message(),
            Some(BusMessage::StateChanged {
                old: PipelineState::Ready,
                new: PipelineState::Paused,
                from_pipeline: true,
            })
        );
        assert_eq!(adapter.poll_message(), Some(BusMessage::AsyncDone));
        assert_eq!(adapter.poll_message(), None);

        assert_eq!(mailbox.peek_size(), Some((320, 240)));
    }

    #[test]
    fn dropping_to_null_flushes_the_bus_and_rewinds() {
        let backend = SimBackend::new();
        backend.register(clip("file:///a.mp4"));
        let (mut adapter, _mailbox) = launch(&backend, "file:///a.mp4");

        adapter.set_state(PipelineState::Playing);
        adapter.seek(SeekRequest {
            position: 5.0,
            rate: 1.0,
        });
        adapter.set_state(PipelineState::Null);

        assert_eq!(adapter.poll_message(), None);
        assert_eq!(adapter.query_position(), Some(0.0));
        assert_eq!(adapter.state(), PipelineState::Null);
    }

    #[test]
    fn stalled_preroll_sticks_in_ready() {
        let backend = SimBackend::new();
        backend.register(clip("file:///a.mp4"));
        backend.handle().stall_preroll(true);
        let (mut adapter, _mailbox) = launch(&backend, "file:///a.mp4");

        adapter.set_state(PipelineState::Paused);
        assert_eq!(
            adapter.wait_state(Duration::from_millis(10)),
            Some(PipelineState::Ready)
        );
    }

    #[test]
    fn seeks_are_logged_clamped_and_completed_on_demand() {
        let backend = SimBackend::new();
        backend.register(clip("file:///a.mp4"));
        let rig = backend.handle();
        let (mut adapter, _mailbox) = launch(&backend, "file:///a.mp4");
        adapter.set_state(PipelineState::Paused);

        assert!(adapter.seek(SeekRequest {
            position: 50.0,
            rate: 1.0,
        }));
        // Clip is 12 seconds long.
        assert_eq!(adapter.query_position(), Some(12.0));
        assert_eq!(rig.seek_log().len(), 1);

        while adapter.poll_message().is_some() {}
        rig.complete_seek();
        assert_eq!(adapter.poll_message(), Some(BusMessage::AsyncDone));

        rig.fail_seeks(true);
        assert!(!adapter.seek(SeekRequest {
            position: 1.0,
            rate: 1.0,
        }));
        assert_eq!(rig.seek_log().len(), 1);
    }

    #[test]
    fn auto_completed_seeks_post_async_done_immediately() {
        let backend = SimBackend::new();
        backend.register(clip("file:///a.mp4"));
        let rig = backend.handle();
        let (mut adapter, _mailbox) = launch(&backend, "file:///a.mp4");
        adapter.set_state(PipelineState::Paused);
        while adapter.poll_message().is_some() {}

        rig.auto_complete_seeks(true);
        assert!(adapter.seek(SeekRequest {
            position: 3.0,
            rate: 1.0,
        }));
        assert_eq!(adapter.poll_message(), Some(BusMessage::AsyncDone));
        assert_eq!(adapter.poll_message(), None);
    }

    #[test]
    fn live_pipeline_feeds_frames_and_posts_eos_at_the_end() {
        let backend = SimBackend::live();
        backend.register(MediaInfo::video("file:///short.mp4", 64, 48, 100.0, 0.05));
        let (mut adapter, mailbox) = launch(&backend, "file:///short.mp4");

        adapter.set_state(PipelineState::Playing);

        let mut saw_frame = false;
        let mut saw_eos = false;
        for _ in 0..200 {
            if mailbox.take().is_some() {
                saw_frame = true;
            }
            while let Some(msg) = adapter.poll_message() {
                if msg == BusMessage::EndOfStream {
                    saw_eos = true;
                }
            }
            if saw_eos {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        adapter.set_state(PipelineState::Null);

        assert!(saw_frame, "feeder never delivered a frame");
        assert!(saw_eos, "feeder never posted end-of-stream");
    }

    #[test]
    fn handle_targets_the_most_recent_pipeline() {
        let backend = SimBackend::new();
        backend.register(clip("file:///a.mp4"));
        backend.register(clip("file:///b.mp4"));
        let rig = backend.handle();
        assert!(!rig.has_pipeline());

        let (mut first, _mb1) = launch(&backend, "file:///a.mp4");
        first.seek(SeekRequest {
            position: 1.0,
            rate: 1.0,
        });
        assert_eq!(rig.seek_log().len(), 1);

        let (_second, _mb2) = launch(&backend, "file:///b.mp4");
        assert_eq!(rig.seek_log().len(), 0);
    }
}
