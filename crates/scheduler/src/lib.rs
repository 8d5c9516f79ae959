//! Per-frame scheduling primitives shared by every render host.
//!
//! A render loop asks its [`FrameScheduler`] for the next frame and gets a
//! [`FrameRequest`] token back. The host later hands the token to the loop when
//! the frame is due (display refresh, redraw event, or a manual tick in tests).
//! Cancelling a request guarantees the host never delivers it.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Token identifying one outstanding frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequest(u64);

impl FrameRequest {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// The host's per-frame callback primitive.
pub trait FrameScheduler {
    /// Queues one frame callback and returns its token.
    fn request_frame(&mut self) -> FrameRequest;

    /// Drops a queued callback. Unknown or already delivered tokens are ignored.
    fn cancel_frame(&mut self, request: FrameRequest);

    /// Host side: removes and returns the oldest callback that is due now.
    fn take_due(&mut self) -> Option<FrameRequest>;

    /// Number of callbacks queued but not yet delivered.
    fn pending(&self) -> usize;
}

impl<S: FrameScheduler + ?Sized> FrameScheduler for Box<S> {
    fn request_frame(&mut self) -> FrameRequest {
        (**self).request_frame()
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        (**self).cancel_frame(request)
    }

    fn take_due(&mut self) -> Option<FrameRequest> {
        (**self).take_due()
    }

    fn pending(&self) -> usize {
        (**self).pending()
    }
}

#[derive(Debug, Default)]
struct RequestQueue {
    next_id: u64,
    queued: VecDeque<FrameRequest>,
}

impl RequestQueue {
    fn push(&mut self) -> FrameRequest {
        self.next_id = self.next_id.wrapping_add(1);
        let request = FrameRequest(self.next_id);
        self.queued.push_back(request);
        request
    }

    fn remove(&mut self, request: FrameRequest) -> bool {
        let before = self.queued.len();
        self.queued.retain(|queued| *queued != request);
        before != self.queued.len()
    }

    fn pop(&mut self) -> Option<FrameRequest> {
        self.queued.pop_front()
    }

    fn len(&self) -> usize {
        self.queued.len()
    }
}

/// Scheduler driven by explicit ticks instead of a display clock.
///
/// Each [`ManualTicker::tick`] delivers at most one queued request, so the time
/// between ticks has no influence on what the render loop observes.
#[derive(Debug, Default)]
pub struct ManualTicker {
    queue: RequestQueue,
    issued: u64,
    cancelled: u64,
    delivered: u64,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers the oldest queued request, if any.
    pub fn tick(&mut self) -> Option<FrameRequest> {
        self.take_due()
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl FrameScheduler for ManualTicker {
    fn request_frame(&mut self) -> FrameRequest {
        self.issued += 1;
        self.queue.push()
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.queue.remove(request) {
            self.cancelled += 1;
        }
    }

    fn take_due(&mut self) -> Option<FrameRequest> {
        let request = self.queue.pop()?;
        self.delivered += 1;
        Some(request)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Scheduler that pokes the host (for example `Window::request_redraw`) every
/// time a frame is requested, with an optional frame-rate cap.
///
/// With a cap, a request becomes due only once the frame interval has elapsed
/// since the previous delivery; hosts use [`WakeScheduler::next_deadline`] to
/// sleep until then and [`WakeScheduler::wake_if_ready`] to poke themselves.
pub struct WakeScheduler<W: FnMut()> {
    queue: RequestQueue,
    wake: W,
    interval: Option<Duration>,
    last_delivery: Option<Instant>,
}

impl<W: FnMut()> WakeScheduler<W> {
    pub fn new(wake: W) -> Self {
        Self {
            queue: RequestQueue::default(),
            wake,
            interval: None,
            last_delivery: None,
        }
    }

    /// Caps delivery to `fps` frames per second. Non-positive values uncap,
    /// as do rates whose frame interval does not fit in a [`Duration`].
    pub fn with_frame_cap(mut self, fps: Option<f32>) -> Self {
        self.interval = fps.filter(|fps| *fps > 0.0).and_then(|fps| {
            match Duration::try_from_secs_f32(1.0 / fps) {
                Ok(interval) => Some(interval),
                Err(err) => {
                    tracing::warn!(fps, %err, "frame cap out of range; running uncapped");
                    None
                }
            }
        });
        if let Some(interval) = self.interval {
            tracing::debug!(interval_ms = interval.as_millis() as u64, "frame cap enabled");
        }
        self
    }

    /// Whether a queued request may be delivered at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        if self.queue.len() == 0 {
            return false;
        }
        match (self.interval, self.last_delivery) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    /// Earliest instant at which the next queued request becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.queue.len() == 0 {
            return None;
        }
        match (self.interval, self.last_delivery) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    /// Pokes the host when a queued request is due; returns whether it did.
    pub fn wake_if_ready(&mut self, now: Instant) -> bool {
        if self.ready(now) {
            (self.wake)();
            true
        } else {
            false
        }
    }

    fn take_due_at(&mut self, now: Instant) -> Option<FrameRequest> {
        if !self.ready(now) {
            return None;
        }
        let request = self.queue.pop()?;
        self.last_delivery = Some(now);
        Some(request)
    }
}

impl<W: FnMut()> FrameScheduler for WakeScheduler<W> {
    fn request_frame(&mut self) -> FrameRequest {
        let request = self.queue.push();
        if self.ready(Instant::now()) {
            (self.wake)();
        }
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        self.queue.remove(request);
    }

    fn take_due(&mut self) -> Option<FrameRequest> {
        self.take_due_at(Instant::now())
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}
