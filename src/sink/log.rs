//! Dry-run sink that logs fired actions instead of sending them

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::ActionSink;
use crate::events::ActionId;

/// Sink for `--dry-run`: every fire becomes a log line and nothing leaves
/// the process. Carries a running counter and a wall-clock timestamp so a
/// rehearsal log can be read back against the set list.
#[derive(Debug, Default)]
pub struct LogSink {
    fired: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actions fired so far
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ActionSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn fire(&self, action: ActionId, value: u8) -> Result<()> {
        let n = self.fired.fetch_add(1, Ordering::Relaxed) + 1;
        let at = chrono::Local::now().format("%H:%M:%S%.3f");
        info!("🎯 [dry-run] #{} {} fire action {} -> {}", n, at, action, value);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        info!("[dry-run] {} action(s) fired in total", self.fired());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fire_always_succeeds_and_counts() {
        let sink = LogSink::new();
        assert!(sink.fire(42, 255).await.is_ok());
        assert!(sink.fire(7, 255).await.is_ok());
        assert_eq!(sink.fired(), 2);
        assert!(sink.is_connected().await);
        assert!(sink.shutdown().await.is_ok());
    }
}
