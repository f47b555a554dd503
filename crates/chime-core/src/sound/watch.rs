//! Position watches: callbacks keyed by a threshold in milliseconds.

use crate::models::SoundInfo;

/// Identifies one registered watch, for targeted removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

pub type WatchCallback = Box<dyn FnMut(&SoundInfo)>;

struct Watch {
    id: WatchId,
    threshold_ms: u64,
    recurring: bool,
    fired: bool,
    callback: WatchCallback,
}

/// Watches of one sound, kept in ascending threshold order.
#[derive(Default)]
pub struct PositionWatchRegistry {
    watches: Vec<Watch>,
    next_id: u64,
}

impl PositionWatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watch. Equal thresholds keep registration order.
    pub fn add(&mut self, threshold_ms: u64, callback: WatchCallback, recurring: bool) -> WatchId {
        self.next_id += 1;
        let id = WatchId(self.next_id);
        let at = self
            .watches
            .partition_point(|w| w.threshold_ms <= threshold_ms);
        self.watches.insert(
            at,
            Watch {
                id,
                threshold_ms,
                recurring,
                fired: false,
                callback,
            },
        );
        id
    }

    /// Remove watches at `threshold_ms`: only `id` when given, else all of
    /// them. Returns how many were removed.
    pub fn remove(&mut self, threshold_ms: u64, id: Option<WatchId>) -> usize {
        let before = self.watches.len();
        self.watches
            .retain(|w| !(w.threshold_ms == threshold_ms && id.map_or(true, |id| w.id == id)));
        before - self.watches.len()
    }

    /// Fire every armed watch with `floor < threshold <= current`, in
    /// threshold order. A `None` floor includes threshold 0. Returns the
    /// number fired.
    pub fn evaluate(&mut self, floor: Option<u64>, current: u64, info: &SoundInfo) -> usize {
        let mut fired = 0;
        for w in self.watches.iter_mut() {
            if w.threshold_ms > current {
                break;
            }
            let above_floor = floor.map_or(true, |f| w.threshold_ms > f);
            if above_floor && !w.fired {
                w.fired = true;
                fired += 1;
                (w.callback)(info);
            }
        }
        if fired > 0 {
            self.watches.retain(|w| w.recurring || !w.fired);
        }
        fired
    }

    /// Re-arm watches at or past `position_ms` (after a seek there).
    pub fn rearm_from(&mut self, position_ms: u64) {
        for w in self.watches.iter_mut().filter(|w| w.threshold_ms >= position_ms) {
            w.fired = false;
        }
    }

    pub fn rearm_all(&mut self) {
        self.rearm_from(0);
    }

    pub fn clear(&mut self) {
        self.watches.clear();
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
