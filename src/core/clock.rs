use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond wall-clock source.
///
/// The feed and presence stores take a boxed clock instead of calling
/// `SystemTime::now()` directly so tests can step time past the presence TTL
/// without sleeping.
pub trait Clock: Send {
    fn now_ms(&self) -> i64;
}

/// The real thing.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub use test_clock::ManualClock;
