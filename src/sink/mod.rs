//! Outputs that cue dispatch can target
//!
//! The dispatcher only knows the [`ActionSink`] trait; the QLC+ websocket
//! sink is the production implementation and the log sink backs dry runs.

pub mod log;
pub mod qlc;

pub use log::LogSink;
pub use qlc::QlcSink;

use anyhow::Result;
use async_trait::async_trait;

use crate::events::ActionId;

/// Button-press value sent when a cue fires
pub const FULL_VALUE: u8 = 255;

/// Receiver of fired actions
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Sink name for logs
    fn name(&self) -> &str;

    /// Fire one action at the given value.
    ///
    /// Implementations deal with their own transport problems; an `Err`
    /// here means a bug-level failure, not "the peer was away", so callers
    /// may log it and move on.
    async fn fire(&self, action: ActionId, value: u8) -> Result<()>;

    /// Whether the sink currently holds a live connection
    async fn is_connected(&self) -> bool {
        true
    }

    /// Release any held resources; further fires become no-ops
    async fn shutdown(&self) -> Result<()>;
}
