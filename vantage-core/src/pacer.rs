//! Fixed-rate frame pacing.
//!
//! Each cycle ends with a two-phase wait: a coarse OS sleep that stops
//! `margin` short of the deadline, then a spin on the monotonic clock
//! until the full interval has elapsed since the cycle started.
//! Every `fps` frames the pacer reports the rate actually achieved.

use std::time::{Duration, Instant};

/// Lowest and highest accepted target rates.
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 120;

// ── Clock ────────────────────────────────────────────────────────

/// Monotonic time source.
pub trait Clock: Send {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ── FpsReport ────────────────────────────────────────────────────

/// Throughput over one reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsReport {
    pub frames: u32,
    pub elapsed: Duration,
}

impl FpsReport {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 { 0.0 } else { self.frames as f64 / secs }
    }
}

// ── Pacer ────────────────────────────────────────────────────────

pub struct Pacer<C: Clock = SystemClock> {
    clock: C,
    fps: u32,
    interval: Duration,
    margin: Duration,
    cycle_start: Instant,
    window_start: Instant,
    window_frames: u32,
}

impl Pacer<SystemClock> {
    pub fn new(fps: u32, margin: Duration) -> Self {
        Self::with_clock(SystemClock, fps, margin)
    }
}

impl<C: Clock> Pacer<C> {
    /// `fps` is clamped to [`MIN_FPS`]`..=`[`MAX_FPS`].
    pub fn with_clock(clock: C, fps: u32, margin: Duration) -> Self {
        let fps = fps.clamp(MIN_FPS, MAX_FPS);
        let now = clock.now();
        Self {
            clock,
            fps,
            interval: Duration::from_secs(1) / fps,
            margin,
            cycle_start: now,
            window_start: now,
            window_frames: 0,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the start of a cycle.
    pub fn begin_cycle(&mut self) {
        self.cycle_start = self.clock.now();
    }

    /// Wait out the rest of the interval, then count the frame.
    ///
    /// Returns a report once every `fps` frames.
    pub fn end_cycle(&mut self) -> Option<FpsReport> {
        self.wait();

        self.window_frames += 1;
        if self.window_frames < self.fps {
            return None;
        }
        let now = self.clock.now();
        let report = FpsReport {
            frames: self.window_frames,
            elapsed: now.duration_since(self.window_start),
        };
        self.window_start = now;
        self.window_frames = 0;
        Some(report)
    }

    fn wait(&self) {
        let elapsed = self.clock.now().duration_since(self.cycle_start);
        if elapsed >= self.interval {
            return;
        }
        let coarse = (self.interval - elapsed).saturating_sub(self.margin);
        if !coarse.is_zero() {
            self.clock.sleep(coarse);
        }
        while self.clock.now().duration_since(self.cycle_start) < self.interval {
            std::hint::spin_loop();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// Manual clock. Every `now()` advances by `tick` so spins terminate.
    #[derive(Clone)]
    struct FakeClock {
        inner: Arc<Mutex<FakeState>>,
    }

    struct FakeState {
        now: Instant,
        tick: Duration,
        sleeps: Vec<Duration>,
        reads: u32,
    }

    impl FakeClock {
        fn new(tick: Duration) -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    now: Instant::now(),
                    tick,
                    sleeps: Vec::new(),
                    reads: 0,
                })),
            }
        }

        fn advance(&self, d: Duration) {
            self.inner.lock().unwrap().now += d;
        }

        fn sleeps(&self) -> Vec<Duration> {
            self.inner.lock().unwrap().sleeps.clone()
        }

        fn reads(&self) -> u32 {
            self.inner.lock().unwrap().reads
        }

        fn current(&self) -> Instant {
            self.inner.lock().unwrap().now
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            let mut s = self.inner.lock().unwrap();
            s.reads += 1;
            let tick = s.tick;
            s.now += tick;
            s.now
        }

        fn sleep(&self, d: Duration) {
            let mut s = self.inner.lock().unwrap();
            s.sleeps.push(d);
            s.now += d;
        }
    }

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn sleeps_then_spins_to_deadline() {
        let clock = FakeClock::new(Duration::from_micros(10));
        let mut pacer = Pacer::with_clock(clock.clone(), 25, 10 * MS);
        assert_eq!(pacer.interval(), 40 * MS);

        pacer.begin_cycle();
        let start = clock.current();
        clock.advance(12 * MS);
        pacer.end_cycle();

        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 1);
        // 40 - 12 - 10, less one clock tick read during the check.
        assert!(sleeps[0] <= 18 * MS && sleeps[0] > 17 * MS, "{:?}", sleeps[0]);
        assert!(clock.current().duration_since(start) >= 40 * MS);
        assert!(clock.reads() > 3, "spin phase should poll the clock");
    }

    #[test]
    fn overrun_cycle_does_not_wait() {
        let clock = FakeClock::new(Duration::from_micros(10));
        let mut pacer = Pacer::with_clock(clock.clone(), 25, 10 * MS);

        pacer.begin_cycle();
        clock.advance(55 * MS);
        pacer.end_cycle();
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn short_remainder_only_spins() {
        let clock = FakeClock::new(Duration::from_micros(10));
        let mut pacer = Pacer::with_clock(clock.clone(), 25, 10 * MS);

        pacer.begin_cycle();
        let start = clock.current();
        clock.advance(35 * MS);
        pacer.end_cycle();
        assert!(clock.sleeps().is_empty());
        assert!(clock.current().duration_since(start) >= 40 * MS);
    }

    #[test]
    fn reports_once_per_fps_frames() {
        let clock = FakeClock::new(Duration::from_micros(50));
        let mut pacer = Pacer::with_clock(clock.clone(), 10, 5 * MS);

        let mut reports = Vec::new();
        for _ in 0..25 {
            pacer.begin_cycle();
            clock.advance(20 * MS);
            if let Some(r) = pacer.end_cycle() {
                reports.push(r);
            }
        }

        assert_eq!(reports.len(), 2);
        for r in &reports {
            assert_eq!(r.frames, 10);
            assert!((r.fps() - 10.0).abs() < 0.5, "fps = {}", r.fps());
        }
    }

    #[test]
    fn fps_is_clamped() {
        assert_eq!(Pacer::new(0, MS).fps(), MIN_FPS);
        assert_eq!(Pacer::new(1000, MS).fps(), MAX_FPS);
    }
}
