//! # Playback Sequencer
//!
//! Decides what plays next and what played before.
//!
//! ## Overview
//!
//! The sequencer owns four pieces of state:
//!
//! - **Context sequence**: the ordered track ids of the list playback started
//!   from (an album, a folder, search results), plus a label
//! - **Manual queue**: ids the user queued explicitly; always drained first
//! - **Removal set**: context ids the user hid from "up next"; the context
//!   itself is never edited
//! - **History**: previously played ids, used by "previous" while shuffled
//!
//! While a manual entry plays, the context position is held by the last
//! context track that played, so the context resumes where it left off.
//!
//! Shuffle orders are derived from the context with [`shuffle_order`] and
//! cached until the shuffle nonce changes.
//!
//! The sequencer never looks at player state directly. Callers pass a
//! [`Cursor`] describing the current track and the shuffle and repeat flags.

use crate::shuffle::shuffle_order;
use crate::state::RepeatMode;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Where a next item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSource {
    Manual,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextItem {
    pub track_id: String,
    pub source: ItemSource,
}

/// The player-side inputs to every sequencing question.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    pub current: Option<&'a str>,
    pub shuffled: bool,
    pub repeat: RepeatMode,
}

impl<'a> Cursor<'a> {
    pub fn new(current: Option<&'a str>, shuffled: bool, repeat: RepeatMode) -> Self {
        Self {
            current,
            shuffled,
            repeat,
        }
    }
}

#[derive(Debug, Clone)]
struct ShuffleCache {
    nonce: u64,
    /// Current id the order was derived for
    derived_for: Option<String>,
    /// Whether the order is headed by the track that was playing
    anchored: bool,
    order: Vec<String>,
}

impl ShuffleCache {
    /// An order not headed by the playing track is only good until the
    /// playing track changes.
    fn is_valid(&self, nonce: u64, current: Option<&str>) -> bool {
        self.nonce == nonce && (self.anchored || self.derived_for.as_deref() == current)
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackSequencer {
    context: Vec<String>,
    context_label: String,
    manual: Vec<String>,
    removed: HashSet<String>,
    shuffle_nonce: u64,
    shuffle_cache: Option<ShuffleCache>,
    history: VecDeque<String>,
    history_capacity: usize,
    /// Last context id that played
    anchor: Option<String>,
    /// Whether the playing track came from the manual queue
    playing_manual: bool,
}

impl PlaybackSequencer {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            context: Vec::new(),
            context_label: String::new(),
            manual: Vec::new(),
            removed: HashSet::new(),
            shuffle_nonce: 0,
            shuffle_cache: None,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity: history_capacity.max(1),
            anchor: None,
            playing_manual: false,
        }
    }

    // ========================================================================
    // Context
    // ========================================================================

    /// Replace the context when its ordered ids differ from the current
    /// ones. Duplicate ids keep their first occurrence.
    ///
    /// Returns whether anything changed.
    pub fn set_context<I>(&mut self, ids: I, label: impl Into<String>) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if ids == self.context {
            return false;
        }

        if self
            .anchor
            .as_ref()
            .is_some_and(|anchor| !ids.contains(anchor))
        {
            self.anchor = None;
        }
        self.context = ids;
        self.context_label = label.into();
        self.removed.clear();
        self.bump_shuffle_nonce();
        debug!(
            label = %self.context_label,
            len = self.context.len(),
            "Playback context replaced"
        );
        true
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn context_label(&self) -> &str {
        &self.context_label
    }

    /// Hide `id` from the upcoming context view. Idempotent.
    pub fn remove_from_context(&mut self, id: &str) {
        self.removed.insert(id.to_string());
    }

    pub fn is_removed(&self, id: &str) -> bool {
        self.removed.contains(id)
    }

    // ========================================================================
    // Manual queue
    // ========================================================================

    pub fn enqueue(&mut self, id: impl Into<String>) {
        self.manual.push(id.into());
    }

    /// Remove the manual entry at `index`; out of range is a no-op.
    pub fn remove_manual_at(&mut self, index: usize) -> Option<String> {
        (index < self.manual.len()).then(|| self.manual.remove(index))
    }

    /// Drop manual entries up to and including the first `id`.
    ///
    /// Returns the number of entries dropped; zero when `id` is not queued.
    pub fn consume_manual_through(&mut self, id: &str) -> usize {
        match self.manual.iter().position(|queued| queued == id) {
            Some(position) => {
                self.manual.drain(..=position);
                position + 1
            }
            None => 0,
        }
    }

    pub fn manual_queue(&self) -> &[String] {
        &self.manual
    }

    // ========================================================================
    // Shuffle
    // ========================================================================

    /// Invalidate the cached shuffle order.
    pub fn bump_shuffle_nonce(&mut self) {
        self.shuffle_nonce = self.shuffle_nonce.wrapping_add(1);
    }

    pub fn shuffle_nonce(&self) -> u64 {
        self.shuffle_nonce
    }

    /// The shuffle order for the current nonce, rebuilt when the nonce moved
    /// since it was last derived.
    ///
    /// An order derived while no context track was playing is provisional and
    /// is derived again once the playing track changes.
    pub fn shuffle_order(&mut self, current: Option<&str>) -> &[String] {
        let valid = self
            .shuffle_cache
            .as_ref()
            .is_some_and(|cache| cache.is_valid(self.shuffle_nonce, current));

        if !valid {
            let order = shuffle_order(&self.context, current, self.shuffle_nonce);
            let anchored = current.is_some() && order.first().map(String::as_str) == current;
            self.shuffle_cache = Some(ShuffleCache {
                nonce: self.shuffle_nonce,
                derived_for: current.map(str::to_string),
                anchored,
                order,
            });
        }

        self.shuffle_cache
            .as_ref()
            .map(|cache| cache.order.as_slice())
            .unwrap_or_default()
    }

    fn active_sequence(&mut self, cursor: &Cursor<'_>) -> Vec<String> {
        if cursor.shuffled {
            self.shuffle_order(cursor.current).to_vec()
        } else {
            self.context.clone()
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Position of the current track in `seq`. A manual entry outside the
    /// context stands at the position of the last context track.
    fn position_in(&self, seq: &[String], current: Option<&str>) -> Option<usize> {
        let find = |id: &str| seq.iter().position(|s| s == id);
        match current.and_then(|id| find(id)) {
            Some(index) => Some(index),
            None if self.playing_manual => self.anchor.as_deref().and_then(|id| find(id)),
            None => None,
        }
    }

    /// Context ids that follow the current track, minus removed ids.
    pub fn upcoming_context_ids(&mut self, cursor: Cursor<'_>) -> Vec<String> {
        let seq = self.active_sequence(&cursor);
        let len = seq.len();
        if len == 0 {
            return Vec::new();
        }

        let position = self.position_in(&seq, cursor.current);

        let (start, steps) = match position {
            Some(index) if cursor.repeat.wraps() => (index + 1, len - 1),
            Some(index) => (index + 1, len - index - 1),
            None => (0, len),
        };

        (0..steps)
            .map(|offset| &seq[(start + offset) % len])
            .filter(|id| !self.removed.contains(*id))
            .cloned()
            .collect()
    }

    /// The item that should play next, or `None` when the sequence is exhausted.
    pub fn next_item(&mut self, cursor: Cursor<'_>) -> Option<NextItem> {
        if let Some(head) = self.manual.first() {
            return Some(NextItem {
                track_id: head.clone(),
                source: ItemSource::Manual,
            });
        }

        self.upcoming_context_ids(cursor)
            .into_iter()
            .next()
            .map(|track_id| NextItem {
                track_id,
                source: ItemSource::Context,
            })
    }

    /// The item "previous" should play, or `None` at the start of a
    /// non-repeating sequence.
    ///
    /// While shuffled, history is popped first.
    pub fn previous_item(&mut self, cursor: Cursor<'_>) -> Option<String> {
        if cursor.shuffled {
            if let Some(id) = self.history.pop_back() {
                return Some(id);
            }
        }

        let seq = self.active_sequence(&cursor);
        if seq.is_empty() {
            return None;
        }

        let position = cursor
            .current
            .and_then(|current| seq.iter().position(|id| id == current))
            .unwrap_or(0);

        if position > 0 {
            Some(seq[position - 1].clone())
        } else if cursor.repeat.wraps() {
            seq.last().cloned()
        } else {
            None
        }
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Record a track switch. The previous id is pushed when it differs from
    /// the new one; the oldest entry is dropped past capacity.
    pub fn record_switch(&mut self, previous: Option<&str>, next: &str) {
        let Some(previous) = previous else {
            return;
        };
        if previous == next {
            return;
        }
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(previous.to_string());
    }

    /// Note where the track that just started came from.
    pub fn mark_playing(&mut self, id: &str, source: ItemSource) {
        self.playing_manual = source == ItemSource::Manual;
        if self.context.iter().any(|c| c == id) {
            self.anchor = Some(id.to_string());
        } else if !self.playing_manual {
            self.anchor = None;
        }
    }

    /// History, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.iter().cloned().collect()
    }
}

impl Default for PlaybackSequencer {
    fn default() -> Self {
        Self::new(100)
    }
}
