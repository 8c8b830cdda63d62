use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// A source of cancellation for an agent run.
#[async_trait]
pub trait Shutdown: Send + Sync {
    /// Resolves when the run should stop.
    async fn wait_for_signal(&mut self);
}

/// Cancels the run on Ctrl-C.
#[derive(Default)]
pub struct CtrlCShutdown;

impl CtrlCShutdown {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Shutdown for CtrlCShutdown {
    async fn wait_for_signal(&mut self) {
        // A failure to install the handler counts as a signal.
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received, cancelling the run");
    }
}

/// Cancels the run once `duration` has elapsed.
pub struct TimeBasedShutdown {
    duration: Duration,
}

impl TimeBasedShutdown {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Shutdown for TimeBasedShutdown {
    async fn wait_for_signal(&mut self) {
        tokio::time::sleep(self.duration).await;
        info!(
            timeout_ms = self.duration.as_millis() as u64,
            "Run deadline reached, cancelling"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn time_based_shutdown_fires_after_its_duration() {
        let start = Instant::now();
        let mut shutdown = TimeBasedShutdown::new(Duration::from_millis(20));

        shutdown.wait_for_signal().await;

        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
