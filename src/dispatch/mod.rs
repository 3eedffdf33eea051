//! Cue dispatcher
//!
//! Consumes player events and fires the matching QLC+ actions. Two channels
//! can observe the same playback position: exact beat notifications and the
//! periodic status poll. A per-device sentinel records the last marker
//! already handled, so whichever channel gets there first wins and the other
//! skips. The sentinel is cleared on stop, which means a marker fires at
//! most once per continuous play segment.


use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::cues::TrackIndex;
use crate::events::{DeviceId, PlayerEvent, TrackMetadata};
use crate::sink::{ActionSink, FULL_VALUE};

/// Per-device track state: the metadata snapshot it came from, and the
/// index built from it. The snapshot is kept so a prefix change can
/// reindex without waiting for the next track load.
struct Deck {
    meta: TrackMetadata,
    index: Arc<TrackIndex>,
}

/// Routes player events to the action sink.
///
/// Per-device state lives in sharded maps, so devices never contend with
/// each other and no lock is held across a sink call.
pub struct Dispatcher {
    prefix: RwLock<String>,
    decks: DashMap<DeviceId, Deck>,
    /// Last marker already dispatched (or deliberately skipped) per device
    handled: DashMap<DeviceId, u32>,
    sink: Arc<dyn ActionSink>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn ActionSink>, prefix: impl Into<String>) -> Self {
        Self {
            prefix: RwLock::new(prefix.into()),
            decks: DashMap::new(),
            handled: DashMap::new(),
            sink,
        }
    }

    /// Single entry point for the event loop
    pub async fn on_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::TrackChanged { device, metadata } => {
                self.on_track_changed(device, metadata);
            },
            PlayerEvent::Beat {
                device,
                beat,
                elapsed_ms,
            } => self.on_beat(device, beat, elapsed_ms).await,
            PlayerEvent::Status {
                device,
                playing,
                beat,
                precise,
            } => self.on_status(device, playing, beat, precise).await,
            PlayerEvent::Stopped { device } => self.on_stopped(device),
        }
    }

    /// Replace (or drop) a device's track snapshot. The index is rebuilt
    /// wholesale from the new metadata, never patched, and the device's
    /// sentinel is reset: a new track starts a new segment even when its
    /// beat numbers overlap the old one's.
    pub fn on_track_changed(&self, device: DeviceId, metadata: Option<TrackMetadata>) {
        match metadata {
            Some(meta) => {
                let prefix = self.prefix.read().clone();
                let index = Arc::new(TrackIndex::from_metadata(&meta, &prefix));
                debug!(
                    "📀 device {}: track loaded, {} cue time(s) indexed",
                    device,
                    index.len()
                );
                self.decks.insert(device, Deck { meta, index });
            },
            None => {
                debug!("📀 device {}: track unloaded", device);
                self.decks.remove(&device);
            },
        }
        self.handled.remove(&device);
    }

    /// Exact boundary channel. Ignored entirely without a precise elapsed
    /// time; otherwise claim the marker and fire everything within
    /// tolerance of the boundary.
    pub async fn on_beat(&self, device: DeviceId, beat: u32, elapsed_ms: Option<u64>) {
        let Some(t) = elapsed_ms else {
            trace!("device {}: beat {} without elapsed time, ignored", device, beat);
            return;
        };
        let Some(index) = self.index_for(device) else {
            return;
        };
        if !self.claim_marker(device, beat) {
            trace!("device {}: beat {} already handled", device, beat);
            return;
        }
        self.fire_window(device, &index, t).await;
    }

    /// Periodic poll channel. Acts only during precise play with a marker
    /// present; the dispatch time is the start of the current beat bucket,
    /// read off the grid. A marker the grid cannot place still claims the
    /// sentinel, it just has nothing to fire.
    pub async fn on_status(
        &self,
        device: DeviceId,
        playing: bool,
        beat: Option<u32>,
        precise: bool,
    ) {
        if !playing || !precise {
            return;
        }
        let Some(beat) = beat else {
            return;
        };
        let Some(index) = self.index_for(device) else {
            return;
        };
        if !self.claim_marker(device, beat) {
            trace!("device {}: status at beat {} already handled", device, beat);
            return;
        }
        let Some(t) = index.beat_start(beat) else {
            trace!("device {}: beat {} not on the grid", device, beat);
            return;
        };
        self.fire_window(device, &index, t).await;
    }

    /// Stop/deactivation: re-arm the device's markers. The track stays
    /// loaded, so a restart at the same marker fires again.
    pub fn on_stopped(&self, device: DeviceId) {
        if self.handled.remove(&device).is_some() {
            debug!("⏹️ device {}: segment ended, markers re-armed", device);
        }
    }

    /// Swap the cue label prefix (config reload) and reindex every loaded
    /// track against it.
    pub fn set_prefix(&self, prefix: &str) {
        let changed = {
            let mut current = self.prefix.write();
            if *current == prefix {
                false
            } else {
                *current = prefix.to_string();
                true
            }
        };
        if !changed {
            return;
        }
        debug!("🔄 cue prefix now {:?}, reindexing loaded tracks", prefix);
        for mut deck in self.decks.iter_mut() {
            let index = Arc::new(TrackIndex::from_metadata(&deck.meta, prefix));
            deck.index = index;
        }
    }

    /// Number of devices with a loaded track
    pub fn tracked_devices(&self) -> usize {
        self.decks.len()
    }

    fn index_for(&self, device: DeviceId) -> Option<Arc<TrackIndex>> {
        self.decks.get(&device).map(|deck| Arc::clone(&deck.index))
    }

    /// Atomic check-and-set on the device's sentinel. Returns true when
    /// this call claimed the marker; a concurrent delivery of the same
    /// marker on the other channel gets false. The shard guard is released
    /// before the caller awaits anything.
    fn claim_marker(&self, device: DeviceId, beat: u32) -> bool {
        match self.handled.entry(device) {
            Entry::Occupied(mut slot) => {
                if *slot.get() == beat {
                    false
                } else {
                    *slot.get_mut() = beat;
                    true
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(beat);
                true
            },
        }
    }

    /// Fire every action within tolerance of `t`, each id once, in stable
    /// order. Sink trouble is logged and contained; it never unwinds into
    /// the event loop or across devices.
    async fn fire_window(&self, device: DeviceId, index: &TrackIndex, t: u64) {
        let actions = index.actions_within(t);
        if actions.is_empty() {
            return;
        }
        debug!(
            "🎛️ device {}: {} action(s) at {}ms",
            device,
            actions.len(),
            t
        );
        for action in actions {
            if let Err(e) = self.sink.fire(action, FULL_VALUE).await {
                warn!("⚠️ device {}: action {} failed: {:#}", device, action, e);
            }
        }
    }
}
