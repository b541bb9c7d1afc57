// ─────────────────────────────────────────────────────────────────────
// MatVerse — Time Source Interface
// ─────────────────────────────────────────────────────────────────────
//! Time source trait and the clocks the generator can be built with.
//!
//! The generator never reads the global clock directly: it asks its
//! injected `TimeSource` once per accepted claim. Production uses
//! `SystemClock`; tests and replayable pipelines use `FixedClock` or
//! `SteppingClock`, and the FFI layer wraps a Python callable in an
//! `ExternalClock`.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Trait for timestamp providers.
///
/// Returns seconds as `f64`. The value is rendered with 9 decimals into
/// the evidence pre-image.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall-clock seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> f64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs_f64(),
            Err(e) => {
                log::warn!("system clock before Unix epoch by {:?}", e.duration());
                -e.duration().as_secs_f64()
            }
        }
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub f64);

impl TimeSource for FixedClock {
    fn now(&self) -> f64 {
        self.0
    }
}

/// Returns `start`, `start + step`, `start + 2*step`, ...
pub struct SteppingClock {
    next: Mutex<f64>,
    step: f64,
}

impl SteppingClock {
    pub fn new(start: f64, step: f64) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl TimeSource for SteppingClock {
    fn now(&self) -> f64 {
        let mut next = self.next.lock();
        let current = *next;
        *next += self.step;
        current
    }
}

/// External time source that calls a function pointer.
///
/// Used by the PyO3 FFI layer to read time from a Python callable.
type NowFn = Box<dyn Fn() -> f64 + Send + Sync>;

pub struct ExternalClock {
    now_fn: NowFn,
}

impl ExternalClock {
    pub fn new(now_fn: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            now_fn: Box::new(now_fn),
        }
    }
}

impl TimeSource for ExternalClock {
    fn now(&self) -> f64 {
        (self.now_fn)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800.0);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(123.0);
        assert_eq!(clock.now(), 123.0);
        assert_eq!(clock.now(), 123.0);
    }

    #[test]
    fn test_stepping_clock() {
        let clock = SteppingClock::new(10.0, 0.5);
        assert_eq!(clock.now(), 10.0);
        assert_eq!(clock.now(), 10.5);
        assert_eq!(clock.now(), 11.0);
    }

    #[test]
    fn test_external_clock() {
        let clock = ExternalClock::new(|| 42.0);
        assert_eq!(clock.now(), 42.0);
    }
}
