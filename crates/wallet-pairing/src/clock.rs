use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Wall-clock milliseconds derived from a monotonic anchor, so countdowns
/// follow tokio's (possibly paused) clock.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch_ms_at_anchor: u64,
    anchor: Instant,
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::starting_at(now_ms())
    }

    #[must_use]
    pub fn starting_at(epoch_ms: u64) -> Self {
        Self {
            epoch_ms_at_anchor: epoch_ms,
            anchor: Instant::now(),
        }
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.epoch_ms_at_anchor.saturating_add(elapsed)
    }
}

#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis().try_into().unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_paused_tokio_time() {
        let clock = Clock::starting_at(1_000);
        tokio::time::advance(Duration::from_millis(2_500)).await;

        assert_eq!(clock.now_ms(), 3_500);
    }
}
