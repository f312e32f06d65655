use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Blocking admission control shared by a stage's worker pool.
///
/// Implementations synchronize internally; stages hold the limiter behind an
/// `Arc` and call it from every worker concurrently.
pub trait RateLimiter: Send + Sync {
    /// Block until one operation is admitted.
    ///
    /// Returns once the aggregate rate of admissions across all callers stays
    /// within the limiter's ceiling.
    fn acquire(&self);
}

/// Interval pacer: admits one operation every `1/rate` seconds.
///
/// The pacer keeps the next admission instant behind a mutex; each caller
/// claims a slot, releases the lock, and sleeps out its own deficit, so a
/// pool of workers is throttled in aggregate rather than per worker.
///
/// A rate of 0 disables pacing entirely: `acquire` returns immediately.
pub struct Pacer {
    interval: Option<Duration>,
    next_at: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Create a pacer admitting `rate` operations per second (0 = unthrottled)
    pub fn new(rate: u32) -> Self {
        let interval = (rate > 0).then(|| Duration::from_secs(1) / rate);
        Self {
            interval,
            next_at: Mutex::new(None),
        }
    }
}

impl RateLimiter for Pacer {
    fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let wait = {
            let mut next_at = self.next_at.lock();
            let now = Instant::now();
            match *next_at {
                Some(at) if at > now => {
                    *next_at = Some(at + interval);
                    at - now
                }
                // First admission, or the pacer has fallen idle: grant now
                // without accumulating burst credit.
                _ => {
                    *next_at = Some(now + interval);
                    Duration::ZERO
                }
            }
        };

        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}
