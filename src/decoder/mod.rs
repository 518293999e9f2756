//! Decoder plugin adapter
//!
//! [`Decoder`] is the object the host talks to. It carries the plugin
//! descriptor, the configuration and an engine factory, and implements the
//! host's decoder lifecycle on top of [`PlaybackSession`]:
//!
//! | host callback | method |
//! |---------------|--------|
//! | `open`        | [`Decoder::open`] |
//! | `init`        | [`Decoder::init`] |
//! | `read`        | [`Decoder::read`] |
//! | `seek`        | [`Decoder::seek`] |
//! | `seek_sample` | [`Decoder::seek_sample`] |
//! | `free`        | [`Decoder::free`] |
//! | `insert`      | [`Decoder::insert`] |
//! | `start`/`stop`| [`Decoder::start`] / [`Decoder::stop`] |

mod session;

pub use session::{
    ChannelMask, DecoderHints, InitOutcome, PlaybackSession, SessionState, StreamFormat,
};

use crate::config::DecoderConfig;
use crate::engine::{EngineFactory, SynthEngine};
use crate::host::{Host, PlaylistLock, META_FILETYPE, META_TITLE, META_URI};
use crate::probe::probe_file;
use crate::{FmidiError, Result, PLUGIN_ID};
use bitflags::bitflags;
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// Host plugin API version the descriptor targets (major, minor)
pub const HOST_API_VERSION: (u16, u16) = (1, 8);

/// File extensions claimed by the decoder
pub const EXTENSIONS: &[&str] = &["mid", "midi"];

/// Plugin category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    /// Audio decoder
    Decoder,
}

bitflags! {
    /// Plugin capability flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PluginFlags: u32 {
        /// Plugin emits log output through the host
        const LOGGING = 0x1;
    }
}

/// Static plugin descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginInfo {
    /// Host API version (major, minor)
    pub api_version: (u16, u16),
    /// Plugin version (major, minor)
    pub version: (u16, u16),
    /// Plugin category
    pub kind: PluginKind,
    /// Display name
    pub name: &'static str,
    /// Identifier stored in `:DECODER` metadata
    pub id: &'static str,
    /// Description
    pub description: &'static str,
    /// Copyright notice
    pub copyright: &'static str,
    /// Capability flags
    pub flags: PluginFlags,
    /// Claimed file extensions
    pub extensions: &'static [&'static str],
}

impl PluginInfo {
    /// Whether `ext` (without the dot) is claimed, ignoring case
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.extensions
            .iter()
            .any(|claimed| claimed.eq_ignore_ascii_case(ext))
    }
}

/// Descriptor registered by the plugin entry point
pub static PLUGIN_INFO: PluginInfo = PluginInfo {
    api_version: HOST_API_VERSION,
    version: (0, 1),
    kind: PluginKind::Decoder,
    name: "fmidi player",
    id: PLUGIN_ID,
    description: "MIDI player based on a SoundFont synthesizer",
    copyright: "MIT License",
    flags: PluginFlags::LOGGING,
    extensions: EXTENSIONS,
};

/// MIDI decoder plugin
pub struct Decoder<F> {
    factory: F,
    config: DecoderConfig,
}

impl<F: EngineFactory> Decoder<F> {
    /// Create a decoder around an engine factory
    pub fn new(factory: F, config: DecoderConfig) -> Self {
        Self { factory, config }
    }

    /// Plugin descriptor
    pub fn info(&self) -> &'static PluginInfo {
        &PLUGIN_INFO
    }

    /// Engine factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Active configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Plugin start hook
    pub fn start(&self) -> Result<()> {
        debug!(target: "fmidi", "plugin started");
        Ok(())
    }

    /// Plugin stop hook
    pub fn stop(&self) -> Result<()> {
        debug!(target: "fmidi", "plugin stopped");
        Ok(())
    }

    /// Allocate a zeroed session in state [`SessionState::Closed`].
    pub fn open(&self, hints: DecoderHints) -> PlaybackSession<F::Engine> {
        trace!(target: "fmidi", "open with hints {:?}", hints);
        PlaybackSession::new(hints)
    }

    /// Build the session's engine and start playback of `item`.
    ///
    /// A missing instrument bank is not fatal: the session plays silence and
    /// [`InitOutcome::Degraded`] is returned.
    ///
    /// # Errors
    /// - [`FmidiError::Lifecycle`] if the session is not `Closed`
    /// - [`FmidiError::Engine`] if the engine cannot be built or the file queued
    /// - [`FmidiError::MissingUri`] if the item has no `:URI`
    pub fn init<H: Host>(
        &self,
        session: &mut PlaybackSession<F::Engine>,
        host: &H,
        item: &H::Item,
    ) -> Result<InitOutcome> {
        if session.state() != SessionState::Closed {
            return Err(FmidiError::Lifecycle {
                operation: "init",
                state: session.state(),
            });
        }

        let mut engine = self.factory.create()?;

        let degraded = match engine.load_soundfont(&self.config.soundfont) {
            Ok(id) => {
                debug!(
                    target: "fmidi",
                    "loaded soundfont {} as {:?}",
                    self.config.soundfont.display(),
                    id
                );
                false
            }
            Err(e) => {
                warn!(
                    target: "fmidi",
                    "failed to load soundfont '{}': {}; playing without instruments",
                    self.config.soundfont.display(),
                    e
                );
                true
            }
        };

        let uri = {
            let lock = PlaylistLock::acquire(host);
            lock.find_meta(item, META_URI)
        }
        .ok_or(FmidiError::MissingUri)?;

        engine.add_file(Path::new(&uri))?;
        session.attach(engine, degraded);
        session.start();

        session.configure(StreamFormat::stereo_s16(self.config.sample_rate));
        session.seek_sample(0)?;

        info!(target: "fmidi", "playing '{}'", uri);
        Ok(if degraded {
            InitOutcome::Degraded
        } else {
            InitOutcome::Nominal
        })
    }

    /// See [`PlaybackSession::read`].
    pub fn read(&self, session: &mut PlaybackSession<F::Engine>, buf: &mut [u8]) -> Result<usize> {
        session.read(buf)
    }

    /// See [`PlaybackSession::seek`].
    pub fn seek(&self, session: &mut PlaybackSession<F::Engine>, seconds: f32) -> Result<()> {
        session.seek(seconds)
    }

    /// See [`PlaybackSession::seek_sample`].
    pub fn seek_sample(&self, session: &mut PlaybackSession<F::Engine>, sample: i64) -> Result<()> {
        session.seek_sample(sample)
    }

    /// See [`PlaybackSession::free`].
    pub fn free(&self, session: &mut PlaybackSession<F::Engine>) -> Result<()> {
        session.free()
    }

    /// Add `fname` to `playlist` after `after` (at the front when `None`).
    ///
    /// Returns `None` without touching the playlist when the file is not a
    /// usable MIDI file. Files whose duration cannot be estimated are still
    /// inserted, without a duration.
    pub fn insert<H: Host>(
        &self,
        host: &H,
        playlist: &H::Playlist,
        after: Option<&H::Item>,
        fname: &str,
    ) -> Option<H::Item> {
        let path = Path::new(fname);
        if !self.factory.is_midi_file(path) {
            trace!(target: "fmidi", "'{}' is not a MIDI file", fname);
            return None;
        }

        let probe = match probe_file(&self.factory, path) {
            Ok(probe) => probe,
            Err(e) => {
                warn!(target: "fmidi", "rejecting '{}': {}", fname, e);
                return None;
            }
        };

        let item = host.pl_item_alloc_init(fname, PLUGIN_ID);
        host.pl_add_meta(&item, META_TITLE, probe.title.as_deref());
        host.pl_add_meta(&item, META_FILETYPE, Some(probe.filetype));
        if let Some(seconds) = probe.duration_secs {
            host.plt_set_item_duration(playlist, &item, seconds);
        }

        let inserted = host.plt_insert_item(playlist, after, &item);
        host.pl_item_unref(item);
        inserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor() {
        assert_eq!(PLUGIN_INFO.id, "fmidi");
        assert_eq!(PLUGIN_INFO.kind, PluginKind::Decoder);
        assert_eq!(PLUGIN_INFO.version, (0, 1));
        assert!(PLUGIN_INFO.flags.contains(PluginFlags::LOGGING));
    }

    #[test]
    fn test_extensions() {
        assert!(PLUGIN_INFO.supports_extension("mid"));
        assert!(PLUGIN_INFO.supports_extension("MIDI"));
        assert!(!PLUGIN_INFO.supports_extension("ym"));
    }
}
