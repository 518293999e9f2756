//! Synthesis engine interface
//!
//! An engine instance bundles three sub-objects that are created together
//! and destroyed together: settings, synthesizer and player. Dropping an
//! engine releases them in reverse construction order (player, then
//! synthesizer, then settings); implementations declare their fields in
//! that order so the compiler-generated drop does the right thing.
//!
//! # Trait Hierarchy
//!
//! - [`EngineFactory`] - builds engines and sniffs candidate files
//! - [`SynthEngine`] - one engine instance, driven by a single owner

#[cfg(feature = "rustysynth")]
pub mod rusty;
#[cfg(feature = "rustysynth")]
pub mod timeline;

use std::path::Path;

/// Error type for engine operations
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Instrument bank could not be read or parsed
    #[error("SoundFont error: {0}")]
    SoundFont(String),

    /// Queued MIDI file could not be read or parsed
    #[error("MIDI load error: {0}")]
    Load(String),

    /// Synthesizer construction or rendering failed
    #[error("Synthesis error: {0}")]
    Synth(String),

    /// Output buffer does not hold whole stereo frames
    #[error("Output buffer of {0} samples is not a whole number of stereo frames")]
    OddBuffer(usize),

    /// Operation requires a queued file
    #[error("No file queued")]
    NoFile,
}

/// Handle to a loaded instrument bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundFontId(pub u32);

/// Player transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    /// Files may be queued, playback not started
    #[default]
    Ready,
    /// Actively producing audio
    Playing,
    /// Every queued file has been played (or failed to load)
    Done,
}

/// One synthesis engine instance.
///
/// Timing values (`total_ticks`, `bpm`) are only final after at least one
/// call to [`SynthEngine::write_s16`]; engines are free to defer file
/// loading to the first synthesis step.
pub trait SynthEngine {
    /// Load an instrument bank into the synthesizer.
    fn load_soundfont(&mut self, path: &Path) -> Result<SoundFontId, EngineError>;

    /// Queue a MIDI file on the player.
    fn add_file(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Start playback of the queued files.
    fn play(&mut self) -> Result<(), EngineError>;

    /// Current transport state.
    fn status(&self) -> TransportStatus;

    /// Check if currently playing.
    fn is_playing(&self) -> bool {
        self.status() == TransportStatus::Playing
    }

    /// Render interleaved 16-bit stereo frames.
    ///
    /// `out.len()` must be even; `out.len() / 2` frames are produced.
    fn write_s16(&mut self, out: &mut [i16]) -> Result<(), EngineError>;

    /// Length of the current file in ticks (longest track).
    fn total_ticks(&self) -> u32;

    /// Tempo in effect at the current position, in beats per minute.
    fn bpm(&self) -> f64;
}

/// Builds engine instances.
pub trait EngineFactory {
    /// Engine type produced by this factory
    type Engine: SynthEngine;

    /// Create settings, synthesizer and player as one unit.
    fn create(&self) -> Result<Self::Engine, EngineError>;

    /// Engine-side file type sniff.
    fn is_midi_file(&self, path: &Path) -> bool {
        crate::midi_header::is_midi_file(path)
    }
}

/// Convert a normalized float sample to 16-bit PCM.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
