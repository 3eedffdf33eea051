//! Player event model
//!
//! Defines the notifications the DJ host pushes into the feed and the track
//! metadata snapshot they carry. The wire format is JSON with camelCase keys
//! so host-side scripts can emit events without a translation layer.

use serde::{Deserialize, Serialize};

/// Deck/player number as reported by the host (CDJs use 1-4)
pub type DeviceId = u8;

/// QLC+ virtual console widget id extracted from a cue label
pub type ActionId = u32;

/// A named, timestamped marker within a track (hot cue, memory point, or
/// loop boundary)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuePoint {
    /// Offset from track start, in milliseconds
    pub time_ms: u64,
    /// Free-text label; only labels carrying the configured marker
    /// (e.g. `QLC:5,42`) contribute actions
    #[serde(default)]
    pub label: String,
}

/// One snapshot of the host's metadata for a loaded track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    #[serde(default)]
    pub cues: Vec<CuePoint>,
    /// Start time of each beat in milliseconds, beat numbers 1-based
    /// (`beat_grid[0]` is the start of beat 1)
    #[serde(default)]
    pub beat_grid: Vec<u64>,
}

/// Notification from the DJ host about one device
///
/// Tagged JSON on the wire, e.g.
/// `{"type":"beat","device":2,"beat":16,"elapsedMs":7980}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// A new track's metadata became available (or the deck unloaded,
    /// when `metadata` is absent)
    #[serde(rename_all = "camelCase")]
    TrackChanged {
        device: DeviceId,
        #[serde(default)]
        metadata: Option<TrackMetadata>,
    },
    /// Playback crossed a beat boundary during normal forward play.
    /// `elapsed_ms` is the precise elapsed-time reading for that boundary;
    /// hosts without one omit it and the event is ignored.
    #[serde(rename_all = "camelCase")]
    Beat {
        device: DeviceId,
        beat: u32,
        #[serde(default)]
        elapsed_ms: Option<u64>,
    },
    /// Periodic coarse status report (hosts post these a few times per
    /// second); catches starts and jumps that skipped the beat notification
    #[serde(rename_all = "camelCase")]
    Status {
        device: DeviceId,
        playing: bool,
        #[serde(default)]
        beat: Option<u32>,
        /// Whether the host currently has a precise elapsed-time reading
        /// for this device
        #[serde(default)]
        precise: bool,
    },
    /// Playback stopped or the trigger deactivated for this device
    Stopped { device: DeviceId },
}

impl PlayerEvent {
    /// Device the event refers to
    pub fn device(&self) -> DeviceId {
        match self {
            PlayerEvent::TrackChanged { device, .. }
            | PlayerEvent::Beat { device, .. }
            | PlayerEvent::Status { device, .. }
            | PlayerEvent::Stopped { device } => *device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_event_wire_format() {
        let event: PlayerEvent =
            serde_json::from_str(r#"{"type":"beat","device":2,"beat":16,"elapsedMs":7980}"#)
                .unwrap();
        assert_eq!(
            event,
            PlayerEvent::Beat {
                device: 2,
                beat: 16,
                elapsed_ms: Some(7980),
            }
        );
    }

    #[test]
    fn test_beat_event_without_precise_time() {
        let event: PlayerEvent =
            serde_json::from_str(r#"{"type":"beat","device":1,"beat":4}"#).unwrap();
        assert_eq!(
            event,
            PlayerEvent::Beat {
                device: 1,
                beat: 4,
                elapsed_ms: None,
            }
        );
    }

    #[test]
    fn test_track_changed_with_metadata() {
        let json = r#"{
            "type": "trackChanged",
            "device": 3,
            "metadata": {
                "cues": [{"timeMs": 1000, "label": "Drop QLC:5,42"}],
                "beatGrid": [0, 500, 1000]
            }
        }"#;
        let event: PlayerEvent = serde_json::from_str(json).unwrap();
        match event {
            PlayerEvent::TrackChanged {
                device,
                metadata: Some(meta),
            } => {
                assert_eq!(device, 3);
                assert_eq!(meta.cues.len(), 1);
                assert_eq!(meta.cues[0].time_ms, 1000);
                assert_eq!(meta.cues[0].label, "Drop QLC:5,42");
                assert_eq!(meta.beat_grid, vec![0, 500, 1000]);
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_track_changed_unload() {
        let event: PlayerEvent =
            serde_json::from_str(r#"{"type":"trackChanged","device":3}"#).unwrap();
        assert_eq!(
            event,
            PlayerEvent::TrackChanged {
                device: 3,
                metadata: None,
            }
        );
    }

    #[test]
    fn test_status_defaults() {
        let event: PlayerEvent =
            serde_json::from_str(r#"{"type":"status","device":2,"playing":true}"#).unwrap();
        assert_eq!(
            event,
            PlayerEvent::Status {
                device: 2,
                playing: true,
                beat: None,
                precise: false,
            }
        );
    }

    #[test]
    fn test_device_accessor() {
        let event = PlayerEvent::Stopped { device: 4 };
        assert_eq!(event.device(), 4);
    }
}
