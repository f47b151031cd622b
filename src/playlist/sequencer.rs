use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

/// Stable identity of a playlist entry, independent of its position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistEntry {
    pub id: TrackId,
    pub path: PathBuf,
}

/// Ordered song collection with a cursor and shuffle/repeat policies.
///
/// Without shuffle the cursor is `index`. With shuffle it is `order[shuffle_pos]`,
/// where `order` is a permutation of `0..len` and `slot_of` its inverse.
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
    next_id: u64,
    index: usize,
    shuffle: bool,
    order: Vec<usize>,
    slot_of: Vec<usize>,
    shuffle_pos: usize,
    repeat: RepeatMode,
    rng: StdRng,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reproducible shuffle orders, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            index: 0,
            shuffle: false,
            order: Vec::new(),
            slot_of: Vec::new(),
            shuffle_pos: 0,
            repeat: RepeatMode::None,
            rng,
        }
    }

    // ─── Queries ───

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistEntry> {
        self.entries.get(index)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Visiting order under shuffle; empty otherwise.
    pub fn shuffle_order(&self) -> &[usize] {
        &self.order
    }

    pub fn current_index(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else if self.shuffle {
            Some(self.order[self.shuffle_pos])
        } else {
            Some(self.index)
        }
    }

    pub fn current(&self) -> Option<&PlaylistEntry> {
        self.current_index().map(|i| &self.entries[i])
    }

    pub fn position_of(&self, id: TrackId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    // ─── Navigation ───

    pub fn next(&mut self) -> Option<&PlaylistEntry> {
        if self.entries.is_empty() {
            return None;
        }
        if self.repeat != RepeatMode::One {
            let last = self.entries.len() - 1;
            if self.shuffle {
                if self.shuffle_pos < last {
                    self.shuffle_pos += 1;
                } else if self.repeat == RepeatMode::All {
                    self.reshuffle();
                }
            } else if self.index < last {
                self.index += 1;
            } else if self.repeat == RepeatMode::All {
                self.index = 0;
            }
        }
        self.current()
    }

    pub fn previous(&mut self) -> Option<&PlaylistEntry> {
        if self.entries.is_empty() {
            return None;
        }
        if self.repeat != RepeatMode::One {
            let last = self.entries.len() - 1;
            if self.shuffle {
                if self.shuffle_pos > 0 {
                    self.shuffle_pos -= 1;
                } else if self.repeat == RepeatMode::All {
                    self.shuffle_pos = last;
                }
            } else if self.index > 0 {
                self.index -= 1;
            } else if self.repeat == RepeatMode::All {
                self.index = last;
            }
        }
        self.current()
    }

    /// Advance after a track finished on its own. Unlike `next`, returns
    /// `None` at the end of the collection under `RepeatMode::None`
    /// instead of landing on the last song again.
    pub fn advance(&mut self) -> Option<&PlaylistEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let at_end = if self.shuffle {
            self.shuffle_pos + 1 >= self.entries.len()
        } else {
            self.index + 1 >= self.entries.len()
        };
        if at_end && self.repeat == RepeatMode::None {
            return None;
        }
        self.next()
    }

    /// Jumps to `index`. Under shuffle the cursor moves to wherever `index`
    /// sits in the current order; the order itself is kept.
    pub fn go_to(&mut self, index: usize) {
        if index >= self.entries.len() {
            return;
        }
        if self.shuffle {
            self.shuffle_pos = self.slot_of[index];
        } else {
            self.index = index;
        }
    }

    /// Turning shuffle on draws a fresh order starting at its first slot.
    /// Turning it off leaves the cursor on the song that was playing.
    pub fn set_shuffle(&mut self, enabled: bool) {
        let current = self.current_index();
        self.shuffle = enabled;
        if enabled {
            self.reshuffle();
        } else {
            self.order.clear();
            self.slot_of.clear();
            self.shuffle_pos = 0;
            self.index = current.unwrap_or(0);
        }
    }

    fn reshuffle(&mut self) {
        self.order = (0..self.entries.len()).collect();
        self.order.shuffle(&mut self.rng);
        self.rebuild_inverse();
        self.shuffle_pos = 0;
    }

    fn rebuild_inverse(&mut self) {
        self.slot_of = vec![0; self.order.len()];
        for (slot, &index) in self.order.iter().enumerate() {
            self.slot_of[index] = slot;
        }
    }

    // ─── Mutation ───

    fn make_entry(&mut self, path: PathBuf) -> PlaylistEntry {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        PlaylistEntry { id, path }
    }

    /// Replaces the whole collection; the cursor goes back to the start.
    pub fn set_entries<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let entries: Vec<_> = paths.into_iter().map(|p| self.make_entry(p)).collect();
        self.entries = entries;
        self.index = 0;
        if self.shuffle {
            self.reshuffle();
        }
    }

    pub fn push(&mut self, path: PathBuf) -> TrackId {
        let entry = self.make_entry(path);
        let id = entry.id;
        self.mutate(|entries| entries.push(entry));
        id
    }

    pub fn extend<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let new: Vec<_> = paths.into_iter().map(|p| self.make_entry(p)).collect();
        self.mutate(|entries| entries.extend(new));
    }

    pub fn insert(&mut self, index: usize, path: PathBuf) -> TrackId {
        let entry = self.make_entry(path);
        let id = entry.id;
        let index = index.min(self.entries.len());
        self.mutate(|entries| entries.insert(index, entry));
        id
    }

    pub fn remove(&mut self, index: usize) -> Option<PlaylistEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let mut removed = None;
        self.mutate(|entries| removed = Some(entries.remove(index)));
        removed
    }

    /// Moves the entry at `from` so it ends up at `to`.
    pub fn move_entry(&mut self, from: usize, to: usize) {
        let len = self.entries.len();
        if from >= len || to >= len || from == to {
            return;
        }
        self.mutate(|entries| {
            let entry = entries.remove(from);
            entries.insert(to, entry);
        });
    }

    pub fn clear(&mut self) {
        self.mutate(|entries| entries.clear());
    }

    /// Applies a structural change, then restores the invariants: the
    /// shuffle order covers the new index range, and the cursor follows the
    /// current song by id. If that song is gone the cursor keeps its slot,
    /// clamped to the new range.
    fn mutate(&mut self, change: impl FnOnce(&mut Vec<PlaylistEntry>)) {
        let current_id = self.current().map(|e| e.id);
        let old_slot = if self.shuffle { self.shuffle_pos } else { self.index };

        change(&mut self.entries);

        let len = self.entries.len();
        if self.shuffle {
            self.reshuffle();
        }
        if len == 0 {
            self.index = 0;
            self.shuffle_pos = 0;
            return;
        }

        let followed = current_id.and_then(|id| self.position_of(id));
        match followed {
            Some(index) => self.go_to(index),
            None => {
                let slot = old_slot.min(len - 1);
                if self.shuffle {
                    self.shuffle_pos = slot;
                } else {
                    self.index = slot;
                }
            }
        }
    }
}
