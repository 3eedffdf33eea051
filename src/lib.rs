//! cuebridge - fire QLC+ lighting cues from DJ player events
//!
//! Bridges a DJ host's playback notifications (track metadata, beat
//! boundaries, periodic status, stops) to the QLC+ virtual console over its
//! websocket API. Cue labels carrying a `QLC:<ids>` marker name the widgets
//! to press when playback reaches them; a per-device sentinel keeps each
//! marker to one dispatch per continuous play segment even though two event
//! channels can observe the same position.

pub mod config;
pub mod cues;
pub mod dispatch;
pub mod events;
pub mod feed;
pub mod sink;

pub use config::AppConfig;
pub use dispatch::Dispatcher;
pub use events::{ActionId, CuePoint, DeviceId, PlayerEvent, TrackMetadata};
pub use sink::{ActionSink, LogSink, QlcSink};
