//! Pauses between upstream requests.
//!
//! Every wait the orchestrator performs goes through a [`Sleeper`], tagged
//! with its [`PauseKind`], so tests can count and skip them.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Why the orchestrator is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseKind {
    /// Exponential backoff after a blocked attempt.
    Backoff,
    /// Fixed pause before repeating a transient failure.
    TransientRetry,
    /// Between candidates of one record.
    InterCandidate,
    /// Between records of a batch.
    InterRecord,
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn pause(&self, kind: PauseKind, duration: Duration);
}

/// Real sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn pause(&self, kind: PauseKind, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        debug!(?kind, delay_ms = duration.as_millis(), "pausing");
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_tokio_sleeper_waits() {
        let start = Instant::now();
        TokioSleeper
            .pause(PauseKind::InterRecord, Duration::from_millis(20))
            .await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_zero_pause_returns_immediately() {
        let start = Instant::now();
        TokioSleeper.pause(PauseKind::Backoff, Duration::ZERO).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
