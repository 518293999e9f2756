//! Host player interface
//!
//! The decoder reaches the host player only through [`Host`], whose methods
//! mirror the host's plugin API: a playlist lock, per-item metadata, item
//! allocation and playlist insertion.
//!
//! [`PlaylistLock`] wraps the raw lock/unlock pair so the lock is released
//! on every exit path.

mod memory;

pub use memory::{ItemHandle, MemoryHost, PlaylistHandle};

/// Metadata key holding the item's location
pub const META_URI: &str = ":URI";

/// Metadata key holding the decoder id that claimed the item
pub const META_DECODER: &str = ":DECODER";

/// Metadata key holding the file type tag
pub const META_FILETYPE: &str = ":FILETYPE";

/// Metadata key holding the display title
pub const META_TITLE: &str = "title";

/// Host player services consumed by the decoder.
pub trait Host {
    /// Playlist item handle
    type Item: Clone;
    /// Playlist handle
    type Playlist;

    /// Acquire the playlist lock.
    fn pl_lock(&self);

    /// Release the playlist lock.
    fn pl_unlock(&self);

    /// Copy of the metadata value stored under `key`, if any.
    ///
    /// Callers hold the playlist lock.
    fn pl_find_meta(&self, item: &Self::Item, key: &str) -> Option<String>;

    /// Store `value` under `key`; `None` records the key without a value.
    fn pl_add_meta(&self, item: &Self::Item, key: &str, value: Option<&str>);

    /// Allocate an item for `fname`, claimed by `decoder_id`.
    ///
    /// The caller owns one reference to the returned item.
    fn pl_item_alloc_init(&self, fname: &str, decoder_id: &str) -> Self::Item;

    /// Drop one reference to `item`.
    fn pl_item_unref(&self, item: Self::Item);

    /// Record the item's duration in seconds.
    fn plt_set_item_duration(&self, playlist: &Self::Playlist, item: &Self::Item, seconds: f32);

    /// Insert `item` after `after` (at the front when `None`).
    ///
    /// Returns the inserted item, or `None` if the host refused it.
    fn plt_insert_item(
        &self,
        playlist: &Self::Playlist,
        after: Option<&Self::Item>,
        item: &Self::Item,
    ) -> Option<Self::Item>;
}

/// Scoped playlist lock.
///
/// Acquired on construction, released on drop.
pub struct PlaylistLock<'a, H: Host + ?Sized> {
    host: &'a H,
}

impl<'a, H: Host + ?Sized> PlaylistLock<'a, H> {
    /// Acquire the host's playlist lock
    pub fn acquire(host: &'a H) -> Self {
        host.pl_lock();
        Self { host }
    }

    /// Copy of a metadata value, read under the lock
    pub fn find_meta(&self, item: &H::Item, key: &str) -> Option<String> {
        self.host.pl_find_meta(item, key)
    }
}

impl<H: Host + ?Sized> Drop for PlaylistLock<'_, H> {
    fn drop(&mut self) {
        self.host.pl_unlock();
    }
}
