//! In-memory host player.
//!
//! A minimal playlist store implementing [`Host`] for the CLI and tests:
//! reference-counted items with string metadata, any number of playlists,
//! and a playlist lock with the host's explicit lock/unlock contract.

use super::{Host, META_DECODER, META_URI};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::thread::{self, ThreadId};

/// Handle to an item owned by a [`MemoryHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemHandle(usize);

/// Handle to a playlist owned by a [`MemoryHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaylistHandle(usize);

#[derive(Debug, Default)]
struct ItemRecord {
    meta: BTreeMap<String, Option<String>>,
    duration: Option<f32>,
    refs: usize,
}

#[derive(Debug, Default)]
struct HostState {
    items: Vec<ItemRecord>,
    playlists: Vec<Vec<ItemHandle>>,
}

/// In-memory playlist store
pub struct MemoryHost {
    // Thread holding the playlist lock
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
    state: Mutex<HostState>,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            released: Condvar::new(),
            state: Mutex::new(HostState::default()),
        }
    }

    /// Create an empty playlist
    pub fn new_playlist(&self) -> PlaylistHandle {
        let mut state = self.state.lock();
        state.playlists.push(Vec::new());
        PlaylistHandle(state.playlists.len() - 1)
    }

    /// Items of `playlist` in order
    pub fn playlist_items(&self, playlist: &PlaylistHandle) -> Vec<ItemHandle> {
        self.state
            .lock()
            .playlists
            .get(playlist.0)
            .cloned()
            .unwrap_or_default()
    }

    /// Metadata value stored under `key` (`None` if absent or valueless)
    pub fn meta(&self, item: &ItemHandle, key: &str) -> Option<String> {
        self.state
            .lock()
            .items
            .get(item.0)
            .and_then(|record| record.meta.get(key).cloned().flatten())
    }

    /// Whether `key` is present on the item, with or without a value
    pub fn has_meta(&self, item: &ItemHandle, key: &str) -> bool {
        self.state
            .lock()
            .items
            .get(item.0)
            .is_some_and(|record| record.meta.contains_key(key))
    }

    /// Remove a metadata key from the item
    pub fn remove_meta(&self, item: &ItemHandle, key: &str) {
        if let Some(record) = self.state.lock().items.get_mut(item.0) {
            record.meta.remove(key);
        }
    }

    /// Duration recorded for the item
    pub fn duration(&self, item: &ItemHandle) -> Option<f32> {
        self.state
            .lock()
            .items
            .get(item.0)
            .and_then(|record| record.duration)
    }

    /// Live references to the item
    pub fn refs(&self, item: &ItemHandle) -> usize {
        self.state
            .lock()
            .items
            .get(item.0)
            .map_or(0, |record| record.refs)
    }

    /// Number of items ever allocated
    pub fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the playlist lock is currently held
    pub fn is_locked(&self) -> bool {
        self.owner.lock().is_some()
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MemoryHost {
    type Item = ItemHandle;
    type Playlist = PlaylistHandle;

    fn pl_lock(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        while owner.is_some() {
            self.released.wait(&mut owner);
        }
        *owner = Some(me);
    }

    /// Only the thread holding the lock can release it; other calls are ignored.
    fn pl_unlock(&self) {
        let mut owner = self.owner.lock();
        if *owner != Some(thread::current().id()) {
            return;
        }
        *owner = None;
        drop(owner);
        self.released.notify_one();
    }

    fn pl_find_meta(&self, item: &ItemHandle, key: &str) -> Option<String> {
        self.meta(item, key)
    }

    fn pl_add_meta(&self, item: &ItemHandle, key: &str, value: Option<&str>) {
        if let Some(record) = self.state.lock().items.get_mut(item.0) {
            record
                .meta
                .insert(key.to_string(), value.map(str::to_string));
        }
    }

    fn pl_item_alloc_init(&self, fname: &str, decoder_id: &str) -> ItemHandle {
        let mut record = ItemRecord {
            refs: 1,
            ..Default::default()
        };
        record
            .meta
            .insert(META_URI.to_string(), Some(fname.to_string()));
        record
            .meta
            .insert(META_DECODER.to_string(), Some(decoder_id.to_string()));

        let mut state = self.state.lock();
        state.items.push(record);
        ItemHandle(state.items.len() - 1)
    }

    fn pl_item_unref(&self, item: ItemHandle) {
        if let Some(record) = self.state.lock().items.get_mut(item.0) {
            record.refs = record.refs.saturating_sub(1);
        }
    }

    fn plt_set_item_duration(&self, _playlist: &PlaylistHandle, item: &ItemHandle, seconds: f32) {
        if let Some(record) = self.state.lock().items.get_mut(item.0) {
            record.duration = Some(seconds);
        }
    }

    fn plt_insert_item(
        &self,
        playlist: &PlaylistHandle,
        after: Option<&ItemHandle>,
        item: &ItemHandle,
    ) -> Option<ItemHandle> {
        let mut state = self.state.lock();
        if item.0 >= state.items.len() {
            return None;
        }

        let entries = state.playlists.get_mut(playlist.0)?;
        let index = match after {
            None => 0,
            Some(after) => entries.iter().position(|e| e == after)? + 1,
        };
        entries.insert(index, *item);

        state.items[item.0].refs += 1;
        Some(*item)
    }
}
