//! Time sources for checksum computation.

/// Supplies the current time in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Wall-clock time from [`std::time::SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

/// A clock frozen at a given instant. Useful for replaying a linker value
/// against a known creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

/// Whole minutes elapsed since the epoch, minus `offset` minutes.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn minute_bucket(clock: &impl Clock, offset: i64) -> i64 {
    (clock.now_millis() / crate::constants::MILLIS_PER_MINUTE) as i64 - offset
}
