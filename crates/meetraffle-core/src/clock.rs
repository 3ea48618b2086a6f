// Time source for the draw loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Clock and suspension point used by the draw loop. Swapping it out lets
/// tests control how much time each interval wait consumes.
#[async_trait]
pub trait DrawClock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// `tokio::time` backed clock. Honors paused time in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl DrawClock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
