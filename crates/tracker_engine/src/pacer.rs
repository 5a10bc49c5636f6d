use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Process-wide politeness delay between consecutive outbound requests.
///
/// Every fetch awaits [`Pacer::wait`] before sending and calls
/// [`Pacer::finished`] once its exchange is over, failed or not. The next slot
/// opens a random delay in `[min, max]` after the later of the previous start
/// and the previous completion, no matter which task asked.
#[derive(Debug)]
pub struct Pacer {
    min: Duration,
    max: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            next_slot: Mutex::new(None),
        }
    }

    /// A pacer that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    pub async fn wait(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(at) = *next_slot {
            tokio::time::sleep_until(at).await;
        }
        *next_slot = Some(Instant::now() + self.jitter());
    }

    /// Pushes the next slot out to a fresh delay after now, so slow responses
    /// do not eat into the gap.
    pub async fn finished(&self) {
        let mut next_slot = self.next_slot.lock().await;
        let after_completion = Instant::now() + self.jitter();
        *next_slot = Some(next_slot.map_or(after_completion, |at| at.max(after_completion)));
    }

    fn jitter(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Duration::from_millis(600), Duration::from_millis(1200))
    }
}
