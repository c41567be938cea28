//! Clock abstraction for real and simulated time.
//!
//! The controller reads two distinct clocks: a free-running millisecond
//! counter for ramps, timeouts and dwell periods, and a UTC wall clock for
//! schedule resolution. Both come from the same [`Clock`] so a simulated
//! clock advances them together.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Mutex;
use std::time::{Duration as StdDuration, Instant};

/// Trait for abstracting time operations.
pub trait Clock: Send + Sync {
    /// Free-running millisecond counter. Wraps at `u32::MAX`.
    fn millis(&self) -> u32;

    /// Current wall-clock time.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Sleep for the specified duration (or simulate it).
    fn sleep(&self, duration: StdDuration);

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Milliseconds elapsed from `since` to `now` on a wrapping counter.
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Real-time implementation backed by `Instant` and the system clock.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u32 {
        // Truncation is the wraparound.
        self.origin.elapsed().as_millis() as u32
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }
}

struct SimulatedState {
    millis: u32,
    utc: DateTime<Utc>,
}

/// Simulated clock for tests and time-accelerated runs.
///
/// `sleep` advances both clocks by exactly the requested duration. With a
/// multiplier of 0 it returns immediately (fast-forward); otherwise it also
/// sleeps for `duration / multiplier` of real time so a simulated run can be
/// watched.
pub struct SimulatedClock {
    state: Mutex<SimulatedState>,
    time_multiplier: u32,
}

impl SimulatedClock {
    /// Fast-forward clock starting at `start` with the counter at zero.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_counter(start, 0)
    }

    /// Fast-forward clock with an explicit counter start, for exercising
    /// counter wraparound.
    pub fn with_counter(start: DateTime<Utc>, millis: u32) -> Self {
        Self {
            state: Mutex::new(SimulatedState { millis, utc: start }),
            time_multiplier: 0,
        }
    }

    /// Accelerated clock: simulated time runs `multiplier` times faster than
    /// real time.
    pub fn accelerated(start: DateTime<Utc>, multiplier: u32) -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                millis: 0,
                utc: start,
            }),
            time_multiplier: multiplier,
        }
    }

    /// Advance both clocks without sleeping.
    pub fn advance(&self, duration: StdDuration) {
        let mut state = self.state.lock().unwrap();
        state.millis = state.millis.wrapping_add(duration.as_millis() as u32);
        state.utc += ChronoDuration::milliseconds(duration.as_millis() as i64);
    }

    /// Jump the wall clock without touching the millisecond counter.
    pub fn set_utc(&self, utc: DateTime<Utc>) {
        self.state.lock().unwrap().utc = utc;
    }
}

impl Clock for SimulatedClock {
    fn millis(&self) -> u32 {
        self.state.lock().unwrap().millis
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().utc
    }

    fn sleep(&self, duration: StdDuration) {
        if self.time_multiplier > 0 {
            std::thread::sleep(duration / self.time_multiplier);
        }
        self.advance(duration);
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
