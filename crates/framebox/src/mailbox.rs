//! Single-slot frame handoff between the engine's delivery thread and the
//! host's poll thread.
//!
//! Playback wants the freshest frame or none, so this is not a queue: the
//! slot holds at most one [`VideoFrame`], and the producer drops new frames
//! while the slot is occupied. Dropping is deliberate back-pressure; the
//! delivery thread must never block on a slow host.
//!
//! The slot-full flag is the only state shared across the thread boundary.
//! The producer publishes with a release store after the frame is in place,
//! the consumer takes with an acquire load before touching the slot and
//! clears with a release store once the frame has been moved out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::adapter::VideoFormat;

/// One decoded video frame. Owns its pixels; handing it over moves it.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    format: VideoFormat,
    data: Vec<u8>,
}

impl VideoFrame {
    /// Wrap existing pixel data. `data` is expected to be tightly packed
    /// rows of `width` pixels in `format`.
    pub fn new(width: u32, height: u32, format: VideoFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Allocate a zeroed frame of the right size for `format`.
    pub fn blank(width: u32, height: u32, format: VideoFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self::new(width, height, format, vec![0; len])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Single-slot mailbox connecting one producer thread to one consumer.
///
/// The producer side never blocks and never overwrites: a frame arriving
/// while the slot is full is discarded on the spot and counted.
#[derive(Debug, Default)]
pub struct FrameMailbox {
    slot: Mutex<Option<VideoFrame>>,
    full: AtomicBool,
    produced: AtomicU64,
    dropped: AtomicU64,
    drop_log_ms: AtomicU64,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` for the consumer.
    ///
    /// Returns `false` when the slot was still full and the frame was
    /// dropped instead. Called on the engine's delivery thread.
    pub fn produce(&self, frame: VideoFrame) -> bool {
        if self.full.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            self.log_drops();
            return false;
        }
        *self.slot.lock().unwrap() = Some(frame);
        self.full.store(true, Ordering::Release);
        self.produced.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Move the resident frame out, if any. Clearing the flag is what lets
    /// the producer publish the next frame.
    pub fn take(&self) -> Option<VideoFrame> {
        if !self.full.load(Ordering::Acquire) {
            return None;
        }
        let frame = self.slot.lock().unwrap().take();
        self.full.store(false, Ordering::Release);
        frame
    }

    /// Dimensions of the resident frame without consuming it.
    pub fn peek_size(&self) -> Option<(u32, u32)> {
        if !self.full.load(Ordering::Acquire) {
            return None;
        }
        self.slot
            .lock()
            .unwrap()
            .as_ref()
            .map(|f| (f.width, f.height))
    }

    /// Frames accepted into the slot so far.
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Frames discarded because the slot was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn log_drops(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_millis(0))
            .as_millis() as u64;
        let last = self.drop_log_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) > 1000 {
            self.drop_log_ms.store(now, Ordering::Relaxed);
            tracing::debug!(
                dropped_frames = self.dropped.load(Ordering::Relaxed),
                "frame mailbox full, dropping"
            );
        }
    }
}

/// Producer half handed to the pipeline backend at launch.
///
/// Clonable so the backend can hand it to whatever delivery thread it runs;
/// all clones feed the same slot.
#[derive(Debug, Clone)]
pub struct FrameProducer {
    mailbox: Arc<FrameMailbox>,
}

impl FrameProducer {
    pub fn new(mailbox: Arc<FrameMailbox>) -> Self {
        Self { mailbox }
    }

    /// See [`FrameMailbox::produce`].
    pub fn produce(&self, frame: VideoFrame) -> bool {
        self.mailbox.produce(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(tag: u8) -> VideoFrame {
        VideoFrame::new(2, 2, VideoFormat::Gray8, vec![tag; 4])
    }

    #[test]
    fn take_on_empty_returns_none() {
        let mb = FrameMailbox::new();
        assert!(mb.take().is_none());
        assert_eq!(mb.produced(), 0);
    }

    #[test]
    fn produce_then_take_round_trips_ownership() {
        let mb = FrameMailbox::new();
        assert!(mb.produce(frame(7)));
        let out = mb.take().unwrap();
        assert_eq!(out.data(), &[7, 7, 7, 7]);
        assert!(mb.take().is_none());
    }

    #[test]
    fn second_produce_without_take_is_dropped() {
        let mb = FrameMailbox::new();
        assert!(mb.produce(frame(1)));
        assert!(!mb.produce(frame(2)));
        assert_eq!(mb.dropped(), 1);

        // The resident frame is still the first one.
        assert_eq!(mb.take().unwrap().data(), &[1, 1, 1, 1]);
    }

    #[test]
    fn take_unblocks_the_producer() {
        let mb = FrameMailbox::new();
        assert!(mb.produce(frame(1)));
        mb.take();
        assert!(mb.produce(frame(2)));
        assert_eq!(mb.produced(), 2);
        assert_eq!(mb.dropped(), 0);
    }

    #[test]
    fn peek_size_reports_without_consuming() {
        let mb = FrameMailbox::new();
        assert!(mb.peek_size().is_none());
        mb.produce(VideoFrame::blank(320, 240, VideoFormat::Bgra));
        assert_eq!(mb.peek_size(), Some((320, 240)));
        assert!(mb.take().is_some());
    }

    #[test]
    fn deliveries_never_exceed_takes_under_pressure() {
        let mb = Arc::new(FrameMailbox::new());
        let mb_push = mb.clone();
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let start = barrier.clone();

        let producer = thread::spawn(move || {
            start.wait();
            for i in 0..1000u32 {
                mb_push.produce(frame((i % 251) as u8));
            }
        });

        barrier.wait();
        let mut delivered = 0u64;
        for _ in 0..200 {
            if mb.take().is_some() {
                delivered += 1;
            }
            thread::yield_now();
        }
        producer.join().unwrap();

        // At most one frame can still be resident after the producer stops.
        while mb.take().is_some() {
            delivered += 1;
        }

        assert_eq!(mb.produced() + mb.dropped(), 1000);
        assert_eq!(delivered, mb.produced());
        assert!(delivered >= 1);
    }

    #[test]
    fn producer_handle_feeds_the_shared_slot() {
        let mb = Arc::new(FrameMailbox::new());
        let producer = FrameProducer::new(mb.clone());
        let (tx, rx) = std::sync::mpsc::channel();

        let handle = thread::spawn(move || {
            let _ = rx.recv();
            producer.produce(frame(9));
        });

        let _ = tx.send(());
        handle.join().unwrap();
        assert_eq!(mb.take().unwrap().data(), &[9, 9, 9, 9]);
    }
}
