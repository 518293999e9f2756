//! SoundFont MIDI decoder plugin adapter
//!
//! Plugs a MIDI synthesis engine into a media player's decoder plugin
//! lifecycle. The adapter forwards file paths to the engine, copies the
//! rendered 16-bit stereo PCM into host buffers, and estimates track
//! duration with a short probe pass when a file is added to a playlist.
//!
//! # Features
//! - Host lifecycle: open, init, read, seek, seek_sample, free, insert
//! - Explicit session state machine that reports lifecycle misuse
//! - Degraded playback (silence) when the instrument bank is missing
//! - Duration estimation from total ticks, tempo and header division
//! - In-memory host for tests and the bundled CLI
//!
//! # Crate feature flags
//! - `rustysynth` (default): SoundFont engine backend (`engine::rusty`)
//!   built on `rustysynth` and `midly`
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "rustysynth")]
//! # {
//! use fmidi::host::MemoryHost;
//! use fmidi::DecoderHints;
//!
//! let decoder = fmidi::load();
//! let host = MemoryHost::new();
//! let playlist = host.new_playlist();
//!
//! let item = decoder
//!     .insert(&host, &playlist, None, "song.mid")
//!     .expect("not a MIDI file");
//!
//! let mut session = decoder.open(DecoderHints::SIXTEEN_BIT);
//! decoder.init(&mut session, &host, &item).unwrap();
//!
//! let mut buffer = vec![0u8; 4096];
//! while decoder.read(&mut session, &mut buffer).unwrap() > 0 {
//!     // hand the PCM to the output device
//! }
//! decoder.free(&mut session).unwrap();
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod decoder;
pub mod engine;
pub mod host;
pub mod midi_header;
pub mod probe;

use std::path::PathBuf;

/// Plugin identifier registered with the host and used as the log target.
pub const PLUGIN_ID: &str = "fmidi";

/// Instrument bank loaded by every playback session unless configured otherwise.
pub const DEFAULT_SOUNDFONT: &str = "/usr/share/sounds/sf2/OPL-3_FM_128M.sf2";

/// Output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Output channel count (interleaved stereo).
pub const OUTPUT_CHANNELS: u16 = 2;

/// Output sample width in bits.
pub const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

/// Bytes per interleaved output frame (2 channels × 16 bits).
pub const BYTES_PER_FRAME: usize =
    (OUTPUT_CHANNELS as usize) * (OUTPUT_BITS_PER_SAMPLE as usize / 8);

/// File type tag written to playlist metadata.
pub const FILETYPE_TAG: &str = "MID";

/// Error types for decoder operations
#[derive(thiserror::Error, Debug)]
pub enum FmidiError {
    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File failed the MIDI sniff check
    #[error("Not a MIDI file: {}", .0.display())]
    NotMidi(PathBuf),

    /// MIDI header missing, truncated or unusable
    #[error("MIDI header error: {0}")]
    Header(String),

    /// Error reported by the synthesis engine
    #[error("Engine error: {0}")]
    Engine(#[from] engine::EngineError),

    /// Lifecycle call made in a state that does not allow it
    #[error("Cannot {operation} a session in state {state:?}")]
    Lifecycle {
        /// Lifecycle operation that was attempted
        operation: &'static str,
        /// State the session was in
        state: decoder::SessionState,
    },

    /// `free` called on a session that was already freed
    #[error("Session already freed")]
    AlreadyFreed,

    /// `free` called on a session that was never initialized
    #[error("Session freed before init")]
    NotInitialized,

    /// Playlist item carries no `:URI` metadata
    #[error("Playlist item has no URI")]
    MissingUri,

    /// Tick/tempo/division values that cannot produce a duration
    #[error("Invalid timing: {ticks} ticks at {bpm} BPM with {divisions} divisions")]
    InvalidTiming {
        /// Total ticks reported by the engine
        ticks: u32,
        /// Tempo reported by the engine
        bpm: f64,
        /// Division read from the file header
        divisions: u16,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for FmidiError {
    fn from(msg: String) -> Self {
        FmidiError::Other(msg)
    }
}

impl From<&str> for FmidiError {
    fn from(msg: &str) -> Self {
        FmidiError::Other(msg.to_string())
    }
}

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, FmidiError>;

// Public API exports
pub use config::DecoderConfig;
pub use decoder::{
    ChannelMask, Decoder, DecoderHints, InitOutcome, PlaybackSession, PluginFlags, PluginInfo,
    PluginKind, SessionState, StreamFormat, PLUGIN_INFO,
};
pub use engine::{EngineError, EngineFactory, SoundFontId, SynthEngine, TransportStatus};
pub use host::{Host, MemoryHost, PlaylistLock};
pub use midi_header::{is_midi_file, parse_header, read_divisions, MidiHeader};
pub use probe::{estimate_duration, probe_file, ticks_to_seconds, ProbeResult};

#[cfg(feature = "rustysynth")]
pub use engine::rusty::{RustyEngine, RustyFactory};

/// Plugin entry point: a decoder backed by the SoundFont engine with the
/// default configuration.
#[cfg(feature = "rustysynth")]
pub fn load() -> Decoder<RustyFactory> {
    let config = DecoderConfig::default();
    Decoder::new(RustyFactory::new(config.sample_rate), config)
}
