//! Stopwatch engine and sampling schedule.
//!
//! The engine never reads a clock. Callers feed it instants (from a
//! `tokio::time::interval` in a live session, synthetic ones in tests) and
//! it derives elapsed time from the difference to the session baseline, so
//! tick jitter never accumulates into drift.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Seconds after which the whole-second counter rolls into a new minute.
pub const SECONDS_PER_MINUTE: u64 = 60;

/// Minutes after which the minute counter rolls into a new hour.
pub const MINUTES_PER_HOUR: u64 = 60;

/// The set of whole-second offsets at which a position sample is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingSchedule {
    offsets: BTreeSet<u64>,
}

impl SamplingSchedule {
    /// Create a schedule from explicit offsets.
    pub fn new(offsets: impl IntoIterator<Item = u64>) -> Self {
        Self {
            offsets: offsets.into_iter().collect(),
        }
    }

    /// Create a schedule firing every `step` seconds within a minute.
    ///
    /// A step of 0 produces an empty schedule.
    #[must_use]
    pub fn every(step: u64) -> Self {
        if step == 0 {
            return Self::new([]);
        }
        Self::new((0..SECONDS_PER_MINUTE).step_by(usize::try_from(step).unwrap_or(usize::MAX)))
    }

    /// Check whether a sample is due at this whole second.
    #[must_use]
    pub fn contains(&self, whole_seconds: u64) -> bool {
        self.offsets.contains(&whole_seconds)
    }

    /// Iterate over the offsets in ascending order.
    pub fn offsets(&self) -> impl Iterator<Item = u64> + '_ {
        self.offsets.iter().copied()
    }

    /// Number of offsets in the schedule.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Check if the schedule never fires.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl Default for SamplingSchedule {
    fn default() -> Self {
        Self::every(5)
    }
}

/// How the minute counter behaves once it reaches 60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolloverMode {
    /// Minutes wrap to zero and the hour counter advances.
    #[default]
    Wrapping,
    /// Minutes never reset, and every tick taken while minutes are 60 or
    /// more advances the hour counter. Matches logs recorded by GhostTimer 1.x.
    Legacy,
}

/// Elapsed time as shown on the timer face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Elapsed {
    /// Hours.
    pub hours: u64,
    /// Minutes.
    pub minutes: u64,
    /// Whole seconds within the current minute.
    pub seconds: u64,
    /// Hundredths of a second, 0..=99.
    pub hundredths: u64,
}

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:02}",
            self.hours, self.minutes, self.seconds, self.hundredths
        )
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Elapsed time after this tick.
    pub elapsed: Elapsed,
    /// A position sample is due.
    pub capture: bool,
    /// The whole-second counter reached a minute and the baseline was reset.
    pub rolled_over: bool,
}

/// The stopwatch state machine.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    schedule: SamplingSchedule,
    rollover: RolloverMode,
    baseline: Option<Instant>,
    running: bool,
    last_whole_second: u64,
    elapsed: Elapsed,
}

impl Stopwatch {
    /// Create a stopped stopwatch.
    #[must_use]
    pub fn new(schedule: SamplingSchedule, rollover: RolloverMode) -> Self {
        Self {
            schedule,
            rollover,
            baseline: None,
            running: false,
            last_whole_second: 0,
            elapsed: Elapsed::default(),
        }
    }

    /// Reset elapsed time and start counting from `now`.
    pub fn start(&mut self, now: Instant) {
        self.elapsed = Elapsed::default();
        self.last_whole_second = 0;
        self.baseline = Some(now);
        self.running = true;
    }

    /// Stop counting. Elapsed time keeps its last computed value.
    pub fn stop(&mut self) -> Elapsed {
        self.running = false;
        self.elapsed
    }

    /// Check if the stopwatch is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Elapsed time as of the last tick.
    #[must_use]
    pub fn elapsed(&self) -> Elapsed {
        self.elapsed
    }

    /// The sampling schedule.
    #[must_use]
    pub fn schedule(&self) -> &SamplingSchedule {
        &self.schedule
    }

    /// Recompute elapsed time at `now`.
    ///
    /// Returns `None` while stopped.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn tick(&mut self, now: Instant) -> Option<TickOutcome> {
        if !self.running {
            return None;
        }
        let baseline = self.baseline?;

        let delta_ms = now.saturating_duration_since(baseline).as_millis() as f64;
        let total_seconds = delta_ms / 1000.0;
        let whole = total_seconds.floor();
        let whole_seconds = whole as u64;
        let hundredths = (((total_seconds - whole) * 100.0).round() as u64).min(99);

        let capture =
            whole_seconds != self.last_whole_second && self.schedule.contains(whole_seconds);
        self.last_whole_second = whole_seconds;

        let rolled_over = whole_seconds >= SECONDS_PER_MINUTE;
        if rolled_over {
            self.baseline = Some(now);
            self.elapsed.seconds = 0;
            self.elapsed.hundredths = 0;
            self.elapsed.minutes += 1;
        } else {
            self.elapsed.seconds = whole_seconds;
            self.elapsed.hundredths = hundredths;
        }
        self.advance_hours(rolled_over);

        Some(TickOutcome {
            elapsed: self.elapsed,
            capture,
            rolled_over,
        })
    }

    fn advance_hours(&mut self, rolled_over: bool) {
        if self.elapsed.minutes < MINUTES_PER_HOUR {
            return;
        }
        match self.rollover {
            RolloverMode::Wrapping if rolled_over => {
                self.elapsed.hours += 1;
                self.elapsed.minutes = 0;
            }
            RolloverMode::Wrapping => {}
            RolloverMode::Legacy => self.elapsed.hours += 1,
        }
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new(SamplingSchedule::default(), RolloverMode::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Tick every 100ms from `from_ms` up to and including `to_ms`,
    /// returning the whole seconds at which a capture fired.
    fn run(sw: &mut Stopwatch, t0: Instant, from_ms: u64, to_ms: u64) -> Vec<u64> {
        let mut fired = Vec::new();
        let mut t = from_ms;
        while t <= to_ms {
            let out = sw.tick(t0 + ms(t)).unwrap();
            if out.capture {
                fired.push(t);
            }
            t += 100;
        }
        fired
    }

    #[test]
    fn test_default_schedule_every_five_seconds() {
        let schedule = SamplingSchedule::default();
        let offsets: Vec<u64> = schedule.offsets().collect();
        assert_eq!(offsets, vec![0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55]);
        assert_eq!(schedule.len(), 12);
    }

    #[test]
    fn test_zero_step_schedule_is_empty() {
        assert!(SamplingSchedule::every(0).is_empty());
    }

    #[test]
    fn test_tick_before_start_returns_none() {
        let mut sw = Stopwatch::default();
        assert!(sw.tick(Instant::now()).is_none());
    }

    #[test]
    fn test_decomposition_at_each_tick() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::default();
        sw.start(t0);

        for k in 0..=59_u64 {
            let out = sw.tick(t0 + ms(k * 100)).unwrap();
            assert_eq!(out.elapsed.seconds, k / 10, "tick {k}");
            assert_eq!(out.elapsed.hundredths, (k % 10) * 10, "tick {k}");
            assert_eq!(out.elapsed.minutes, 0);
        }
    }

    #[test]
    fn test_hundredths_rounding() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::default();
        sw.start(t0);

        let out = sw.tick(t0 + ms(1_234)).unwrap();
        assert_eq!(out.elapsed.seconds, 1);
        assert_eq!(out.elapsed.hundredths, 23);

        // .996 rounds to 100 hundredths; clamp keeps the face valid
        let out = sw.tick(t0 + ms(2_996)).unwrap();
        assert_eq!(out.elapsed.seconds, 2);
        assert_eq!(out.elapsed.hundredths, 99);
    }

    #[test]
    fn test_capture_fires_once_per_scheduled_second() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::new(SamplingSchedule::new([0, 5, 10]), RolloverMode::Wrapping);
        sw.start(t0);

        let fired = run(&mut sw, t0, 0, 11_900);
        // Second 0 is covered by the capture taken at start
        assert_eq!(fired, vec![5_000, 10_000]);
    }

    #[test]
    fn test_no_capture_while_second_unchanged() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::new(SamplingSchedule::new([5]), RolloverMode::Wrapping);
        sw.start(t0);

        let _ = run(&mut sw, t0, 0, 4_900);
        assert!(sw.tick(t0 + ms(5_000)).unwrap().capture);
        assert!(!sw.tick(t0 + ms(5_100)).unwrap().capture);
        assert!(!sw.tick(t0 + ms(5_900)).unwrap().capture);
    }

    #[test]
    fn test_minute_rollover_resets_baseline() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::default();
        sw.start(t0);

        let _ = run(&mut sw, t0, 0, 59_900);
        let out = sw.tick(t0 + ms(60_000)).unwrap();
        assert!(out.rolled_over);
        assert_eq!(out.elapsed.minutes, 1);
        assert_eq!(out.elapsed.seconds, 0);

        let out = sw.tick(t0 + ms(62_300)).unwrap();
        assert_eq!(out.elapsed.minutes, 1);
        assert_eq!(out.elapsed.seconds, 2);
        assert_eq!(out.elapsed.hundredths, 30);
    }

    #[test]
    fn test_captures_continue_after_rollover() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::default();
        sw.start(t0);

        let fired = run(&mut sw, t0, 0, 65_000);
        assert_eq!(fired.len(), 13);
        // Second 0 of the new minute fires on the first tick after the reset
        assert!(fired.contains(&60_100));
        assert_eq!(fired.last(), Some(&65_000));
    }

    #[test]
    fn test_wrapping_rollover_into_hours() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::new(SamplingSchedule::default(), RolloverMode::Wrapping);
        sw.start(t0);

        let mut t = t0;
        for _ in 0..61 {
            t += ms(60_000);
            let _ = sw.tick(t);
        }
        let elapsed = sw.elapsed();
        assert_eq!(elapsed.hours, 1);
        assert_eq!(elapsed.minutes, 1);
    }

    #[test]
    fn test_legacy_rollover_keeps_counting_minutes() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::new(SamplingSchedule::default(), RolloverMode::Legacy);
        sw.start(t0);

        let mut t = t0;
        for _ in 0..62 {
            t += ms(60_000);
            let _ = sw.tick(t);
        }
        let elapsed = sw.elapsed();
        assert_eq!(elapsed.minutes, 62);
        // Rollovers at minute 60, 61 and 62 each bumped the hour
        assert_eq!(elapsed.hours, 3);
    }

    #[test]
    fn test_legacy_rollover_bumps_hours_every_tick() {
        let t0 = Instant::now();
        let mut legacy = Stopwatch::new(SamplingSchedule::default(), RolloverMode::Legacy);
        let mut wrapping = Stopwatch::new(SamplingSchedule::default(), RolloverMode::Wrapping);
        legacy.start(t0);
        wrapping.start(t0);

        let mut t = t0;
        for _ in 0..60 {
            t += ms(60_000);
            let _ = legacy.tick(t);
            let _ = wrapping.tick(t);
        }
        assert_eq!((legacy.elapsed().hours, legacy.elapsed().minutes), (1, 60));
        assert_eq!((wrapping.elapsed().hours, wrapping.elapsed().minutes), (1, 0));

        // Three ordinary ticks inside minute 60
        for step in 1..=3 {
            let _ = legacy.tick(t + ms(step * 100));
            let _ = wrapping.tick(t + ms(step * 100));
        }
        let elapsed = legacy.elapsed();
        assert_eq!(elapsed.minutes, 60);
        assert_eq!(elapsed.hours, 4);
        assert_eq!(elapsed.hundredths, 30);
        assert_eq!(wrapping.elapsed().hours, 1);
        assert_eq!(wrapping.elapsed().minutes, 0);
    }

    #[test]
    fn test_stop_retains_elapsed() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::default();
        sw.start(t0);
        let _ = sw.tick(t0 + ms(3_450));

        let elapsed = sw.stop();
        assert!(!sw.is_running());
        assert_eq!(elapsed.seconds, 3);
        assert_eq!(elapsed.hundredths, 45);
        assert!(sw.tick(t0 + ms(9_000)).is_none());
        assert_eq!(sw.elapsed(), elapsed);
    }

    #[test]
    fn test_restart_resets_elapsed() {
        let t0 = Instant::now();
        let mut sw = Stopwatch::default();
        sw.start(t0);
        let _ = sw.tick(t0 + ms(7_000));
        sw.stop();

        let t1 = t0 + ms(20_000);
        sw.start(t1);
        assert_eq!(sw.elapsed(), Elapsed::default());
        let out = sw.tick(t1 + ms(5_000)).unwrap();
        assert!(out.capture);
        assert_eq!(out.elapsed.seconds, 5);
    }

    #[test]
    fn test_elapsed_display() {
        let elapsed = Elapsed {
            hours: 1,
            minutes: 2,
            seconds: 3,
            hundredths: 4,
        };
        assert_eq!(elapsed.to_string(), "01:02:03.04");
    }
}
