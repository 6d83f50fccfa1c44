//! Frame scheduling primitives shared by the render loop and its drivers.
//!
//! The render loop never talks to a windowing toolkit directly. It asks a
//! [`FrameScheduler`] for "one more frame" at the end of each tick, and the
//! driver decides when that frame actually runs: the winit driver maps it onto
//! `request_redraw`, while [`ManualScheduler`] lets tests pump frames by hand.
//! [`FramePacer`] applies an optional FPS cap on top of either.

use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("frame rate must be a positive, finite number (got {0})")]
    InvalidFps(f32),
}

/// Timing information handed to every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTime {
    /// Time since the clock was started or reset.
    pub elapsed: Duration,
    /// Time since the previous sample; zero for the first frame.
    pub delta: Duration,
    /// Monotonic frame counter starting at zero.
    pub index: u64,
}

impl FrameTime {
    pub const ZERO: FrameTime = FrameTime {
        elapsed: Duration::ZERO,
        delta: Duration::ZERO,
        index: 0,
    };

    pub fn new(elapsed: Duration, delta: Duration, index: u64) -> Self {
        Self {
            elapsed,
            delta,
            index,
        }
    }

    pub fn seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

/// Source of [`FrameTime`] samples.
pub trait FrameClock {
    /// Restarts the clock at frame zero.
    fn reset(&mut self);
    /// Produces the time for the next frame and advances the frame counter.
    fn sample(&mut self) -> FrameTime;
}

/// Clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
    last: Option<Instant>,
    frame: u64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            last: None,
            frame: 0,
        }
    }
}

impl FrameClock for SystemClock {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn sample(&mut self) -> FrameTime {
        let now = Instant::now();
        let delta = self
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last = Some(now);
        let sample = FrameTime::new(now.saturating_duration_since(self.origin), delta, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Deterministic clock that advances by a fixed step per sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedStepClock {
    step: Duration,
    frame: u64,
}

impl FixedStepClock {
    pub fn new(step: Duration) -> Self {
        Self { step, frame: 0 }
    }

    /// A 60 Hz step.
    pub fn sixty_hz() -> Self {
        Self::new(Duration::from_micros(16_667))
    }
}

impl FrameClock for FixedStepClock {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> FrameTime {
        let index = self.frame;
        let elapsed = self.step.saturating_mul(index.min(u64::from(u32::MAX)) as u32);
        let delta = if index == 0 { Duration::ZERO } else { self.step };
        self.frame = self.frame.saturating_add(1);
        FrameTime::new(elapsed, delta, index)
    }
}

/// "Run once per display refresh", decoupled from any toolkit.
///
/// A tick that wants to keep running calls [`FrameScheduler::request_frame`]
/// before it returns. Stopping the loop is simply not asking again, or
/// cancelling, after which further requests are ignored.
pub trait FrameScheduler {
    /// Schedules one more tick for the next display refresh.
    fn request_frame(&mut self);
    /// Stops scheduling; pending and future requests are dropped.
    fn cancel(&mut self);
    /// Whether [`FrameScheduler::cancel`] has been called.
    fn is_cancelled(&self) -> bool;
}

/// Optional frame-rate cap.
///
/// `ready_for_frame` answers whether enough time has passed since the last
/// rendered frame; `next_deadline` tells an event loop how long it may sleep.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    last_rendered: Option<Instant>,
}

impl FramePacer {
    /// Builds a pacer; `None` or `Some(0.0)` means uncapped.
    pub fn new(target_fps: Option<f32>) -> Result<Self, SchedulerError> {
        let interval = match target_fps {
            None => None,
            Some(fps) if fps == 0.0 => None,
            Some(fps) if fps.is_finite() && fps > 0.0 => Some(
                Duration::try_from_secs_f32(1.0 / fps)
                    .map_err(|_| SchedulerError::InvalidFps(fps))?,
            ),
            Some(fps) => return Err(SchedulerError::InvalidFps(fps)),
        };
        Ok(Self {
            interval,
            last_rendered: None,
        })
    }

    pub fn uncapped() -> Self {
        Self {
            interval: None,
            last_rendered: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.last_rendered) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.interval, self.last_rendered) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_rendered = Some(now);
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::uncapped()
    }
}

/// Scheduler driven explicitly by the caller, one frame per [`ManualScheduler::pump`].
///
/// Starts with one frame pending so the first pump always runs.
#[derive(Debug)]
pub struct ManualScheduler<C: FrameClock = FixedStepClock> {
    clock: C,
    pending: bool,
    cancelled: bool,
    frames_run: u64,
}

impl ManualScheduler<FixedStepClock> {
    pub fn sixty_hz() -> Self {
        Self::new(FixedStepClock::sixty_hz())
    }
}

impl<C: FrameClock> ManualScheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            pending: true,
            cancelled: false,
            frames_run: 0,
        }
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending && !self.cancelled
    }

    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Runs the pending frame, if any. Returns whether a frame ran.
    ///
    /// The callback receives the scheduler itself so it can request the
    /// following frame exactly like a real display callback would.
    pub fn pump<F>(&mut self, frame: F) -> bool
    where
        F: FnOnce(&mut Self, FrameTime),
    {
        if !self.has_pending_frame() {
            return false;
        }
        self.pending = false;
        let time = self.clock.sample();
        self.frames_run += 1;
        frame(self, time);
        true
    }

    /// Pumps up to `count` frames, stopping early once nothing is pending.
    pub fn pump_frames<F>(&mut self, count: usize, mut frame: F) -> usize
    where
        F: FnMut(&mut Self, FrameTime),
    {
        let mut ran = 0;
        while ran < count && self.pump(&mut frame) {
            ran += 1;
        }
        ran
    }
}

impl<C: FrameClock> FrameScheduler for ManualScheduler<C> {
    fn request_frame(&mut self) {
        if self.cancelled {
            tracing::trace!("frame requested after cancellation; ignoring");
            return;
        }
        self.pending = true;
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.pending = false;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_step_clock_advances_by_step() {
        let mut clock = FixedStepClock::new(Duration::from_millis(10));
        let first = clock.sample();
        let second = clock.sample();
        assert_eq!(first, FrameTime::ZERO);
        assert_eq!(second.index, 1);
        assert_eq!(second.elapsed, Duration::from_millis(10));
        assert_eq!(second.delta, Duration::from_millis(10));
        clock.reset();
        assert_eq!(clock.sample().index, 0);
    }

    #[test]
    fn pacer_waits_for_interval() {
        let mut pacer = FramePacer::new(Some(10.0)).unwrap();
        let start = Instant::now();
        assert!(pacer.ready_for_frame(start));
        pacer.mark_rendered(start);
        assert!(!pacer.ready_for_frame(start + Duration::from_millis(50)));
        assert!(pacer.ready_for_frame(start + Duration::from_millis(100)));
        assert_eq!(pacer.next_deadline(), Some(start + Duration::from_millis(100)));
    }

    #[test]
    fn zero_fps_is_uncapped() {
        let pacer = FramePacer::new(Some(0.0)).unwrap();
        assert_eq!(pacer.interval(), None);
        assert!(matches!(
            FramePacer::new(Some(-5.0)),
            Err(SchedulerError::InvalidFps(_))
        ));
    }

    #[test]
    fn fps_too_small_for_an_interval_is_rejected() {
        assert!(matches!(
            FramePacer::new(Some(f32::MIN_POSITIVE / 4.0)),
            Err(SchedulerError::InvalidFps(_))
        ));
    }

    #[test]
    fn manual_scheduler_runs_only_requested_frames() {
        let mut scheduler = ManualScheduler::sixty_hz();
        let mut seen = Vec::new();
        let ran = scheduler.pump_frames(5, |scheduler, time| {
            seen.push(time.index);
            if time.index < 2 {
                scheduler.request_frame();
            }
        });
        assert_eq!(ran, 3);
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(!scheduler.has_pending_frame());
    }

    #[test]
    fn cancelled_scheduler_ignores_requests() {
        let mut scheduler = ManualScheduler::sixty_hz();
        scheduler.cancel();
        scheduler.request_frame();
        assert!(!scheduler.pump(|_, _| panic!("cancelled scheduler ran a frame")));
        assert!(scheduler.is_cancelled());
    }
}
