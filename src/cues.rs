//! Cue label parsing and per-track action index
//!
//! Hosts tag cue points with labels like `"Drop QLC:5,42"`. Everything up to
//! the marker is ignored, the digit list after it names the QLC+ widgets to
//! fire when playback reaches that cue.

use std::collections::{BTreeMap, BTreeSet};

use crate::events::{ActionId, TrackMetadata};

/// Dispatch window around a cue timestamp, in milliseconds. A trigger time
/// matches a cue when the two differ by strictly less than this.
pub const TOLERANCE_MS: u64 = 50;

/// Extract action ids from a cue label.
///
/// The label is scanned for `"<prefix>:"` followed by a comma-separated run
/// of integers; a marker with no ids after it does not count, so
/// `"QLC: intro QLC:5"` still yields `{5}`. Returns `None` when no marker
/// carries ids.
///
/// `"Drop QLC:5,42"` yields `{5, 42}`, `"QLC:5, 42"` yields `{5}` (the space
/// ends the list), `"QLC:"` yields nothing.
pub fn parse_label(label: &str, prefix: &str) -> Option<BTreeSet<ActionId>> {
    let marker = format!("{prefix}:");
    label
        .match_indices(&marker)
        .map(|(at, _)| read_id_list(&label[at + marker.len()..]))
        .find(|ids| !ids.is_empty())
}

/// Read the integer list at the start of `rest`, stopping at the first
/// character that does not continue it.
fn read_id_list(rest: &str) -> BTreeSet<ActionId> {
    let mut ids = BTreeSet::new();
    let mut chars = rest.char_indices().peekable();
    loop {
        // Read one integer; a list element must start with a digit.
        let mut digits = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            break;
        }
        // Ids that overflow u32 cannot name a widget; drop them, keep the rest.
        if let Ok(id) = digits.parse::<ActionId>() {
            ids.insert(id);
        }
        // Continue only on "," followed by another digit, so a trailing comma
        // or "5, 42" ends the list after the first id.
        match chars.peek() {
            Some(&(i, ',')) => {
                let after = rest[i + 1..].chars().next();
                if after.is_some_and(|c| c.is_ascii_digit()) {
                    chars.next();
                } else {
                    break;
                }
            },
            _ => break,
        }
    }
    ids
}

/// Immutable dispatch index for one loaded track.
///
/// Built once per track-change from the host metadata and swapped in
/// wholesale, so concurrent readers never observe a half-updated track.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackIndex {
    /// Cue timestamp (ms) -> action ids to fire there. Cues sharing a
    /// timestamp have their id sets merged.
    cues: BTreeMap<u64, BTreeSet<ActionId>>,
    /// Beat start times in ms, indexed by beat number - 1
    grid: Vec<u64>,
}

impl TrackIndex {
    /// Index the metadata snapshot, keeping only cues whose label carries
    /// the marker.
    pub fn from_metadata(meta: &TrackMetadata, prefix: &str) -> Self {
        let mut cues: BTreeMap<u64, BTreeSet<ActionId>> = BTreeMap::new();
        for cue in &meta.cues {
            if let Some(ids) = parse_label(&cue.label, prefix) {
                cues.entry(cue.time_ms).or_default().extend(ids);
            }
        }
        Self {
            cues,
            grid: meta.beat_grid.clone(),
        }
    }

    /// Number of timestamps carrying at least one action
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Start time of a 1-based beat number, if the grid covers it
    pub fn beat_start(&self, beat: u32) -> Option<u64> {
        let idx = (beat as usize).checked_sub(1)?;
        self.grid.get(idx).copied()
    }

    /// Union of the action ids of every cue within [`TOLERANCE_MS`] of `t`
    /// (strict: a cue exactly 50ms away does not match). Each id appears
    /// once even when several cues in the window share it.
    pub fn actions_within(&self, t: u64) -> BTreeSet<ActionId> {
        let lo = t.saturating_sub(TOLERANCE_MS - 1);
        let hi = t.saturating_add(TOLERANCE_MS - 1);
        let mut out = BTreeSet::new();
        for ids in self.cues.range(lo..=hi).map(|(_, ids)| ids) {
            out.extend(ids.iter().copied());
        }
        out
    }
}
