//! Debounces seek requests against one in-flight asynchronous seek.
//!
//! Engines settle seeks asynchronously, and a host scrubbing a timeline
//! issues requests far faster than the engine settles them. The coordinator
//! keeps at most one request in flight and parks the newest request made in
//! the meantime; intermediate targets are forgotten (last write wins), so
//! the engine always converges on the last requested position with O(1)
//! in-flight work.
//!
//! The coordinator only decides; the caller talks to the engine:
//! - [`SeekCoordinator::request`] returns the request to submit now, or
//!   `None` when it was parked behind the in-flight seek,
//! - [`SeekCoordinator::submitted`] records a successful submission,
//! - [`SeekCoordinator::settle`] runs on async-done and hands back any
//!   parked request for re-submission.

use crate::adapter::SeekRequest;

/// Seek debouncing state: one lock, one parked request.
///
/// A parked request only exists while a seek is in flight; settling takes
/// it out again.
#[derive(Debug, Default)]
pub(crate) struct SeekCoordinator {
    in_flight: bool,
    pending: Option<SeekRequest>,
}

impl SeekCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Route one request. `Some` means submit it to the engine now; `None`
    /// means it was parked, replacing any previously parked value.
    pub(crate) fn request(&mut self, request: SeekRequest) -> Option<SeekRequest> {
        if self.in_flight {
            self.pending = Some(request);
            None
        } else {
            Some(request)
        }
    }

    /// The engine accepted a submission; lock until async-done.
    pub(crate) fn submitted(&mut self) {
        self.in_flight = true;
        self.pending = None;
    }

    /// Async-done arrived: clear the lock and hand back the parked request,
    /// if any, so the caller can re-issue it.
    pub(crate) fn settle(&mut self) -> Option<SeekRequest> {
        self.in_flight = false;
        self.pending.take()
    }

    pub(crate) fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Forget everything. Used when the session is torn down.
    pub(crate) fn reset(&mut self) {
        self.in_flight = false;
        self.pending = None;
    }
}
