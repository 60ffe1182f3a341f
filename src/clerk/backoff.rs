use std::time::Duration;

pub const BACKOFF_FLOOR: Duration = Duration::from_millis(20);
pub const BACKOFF_CEILING: Duration = Duration::from_millis(1600);

/// Delay inserted between retries of a failing RPC.
///
/// Always within `[BACKOFF_FLOOR, BACKOFF_CEILING]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            current: BACKOFF_FLOOR,
        }
    }
}

impl Backoff {
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = BACKOFF_FLOOR;
    }

    /// Sleep for the current delay, then double it.
    ///
    /// Only call this on an actual failure.
    pub async fn fail(&mut self) {
        tokio::time::sleep(self.current).await;
        self.current = (self.current * 2).min(BACKOFF_CEILING);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn doubles_up_to_ceiling() {
        let mut backoff = Backoff::default();
        assert_eq!(backoff.current(), BACKOFF_FLOOR);
        for n in 1..=10u32 {
            backoff.fail().await;
            let expect = (BACKOFF_FLOOR * 2u32.pow(n)).min(BACKOFF_CEILING);
            assert_eq!(backoff.current(), expect);
            assert!(backoff.current() >= BACKOFF_FLOOR && backoff.current() <= BACKOFF_CEILING);
        }
        backoff.reset();
        assert_eq!(backoff.current(), BACKOFF_FLOOR);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_sleeps_for_current_delay() {
        let mut backoff = Backoff::default();
        let start = Instant::now();
        backoff.fail().await;
        backoff.fail().await;
        backoff.fail().await;
        // 20 + 40 + 80
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(140), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(150), "{:?}", elapsed);
    }
}
