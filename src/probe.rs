//! Duration estimation for playlist entries
//!
//! Runs a throwaway engine just long enough for it to report the file's
//! total ticks and tempo, then converts ticks to seconds using the division
//! read straight from the file header:
//!
//! ```text
//! seconds = ticks × 60 / (bpm × divisions)
//! ```
//!
//! The engine only finalizes its timing values after one synthesis step,
//! so the probe renders exactly one frame before reading them.

use crate::engine::{EngineFactory, SynthEngine};
use crate::midi_header::read_divisions;
use crate::{FmidiError, Result, FILETYPE_TAG};
use std::path::Path;
use tracing::{trace, warn};

/// Playlist entry data computed once per file
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// Title placeholder (the decoder does not read track names)
    pub title: Option<String>,
    /// File type tag
    pub filetype: &'static str,
    /// Estimated duration, if the engine could time the file
    pub duration_secs: Option<f32>,
}

/// Convert a tick count to seconds at a constant tempo
pub fn ticks_to_seconds(ticks: u32, bpm: f64, divisions: u16) -> f64 {
    ticks as f64 * (60.0 / (bpm * divisions as f64))
}

/// Read and validate the header division.
fn metrical_divisions(path: &Path) -> Result<u16> {
    let divisions = read_divisions(path)?;
    if divisions == 0 {
        return Err(FmidiError::Header(format!(
            "'{}' declares zero ticks per beat",
            path.display()
        )));
    }
    if divisions & 0x8000 != 0 {
        return Err(FmidiError::Header(format!(
            "'{}' uses SMPTE time division (0x{divisions:04X})",
            path.display()
        )));
    }
    Ok(divisions)
}

/// Estimate the duration of `path` in seconds.
///
/// # Errors
/// - [`FmidiError::Header`] when the division field is missing or unusable
/// - [`FmidiError::Engine`] when the throwaway engine cannot load or prime the file
/// - [`FmidiError::InvalidTiming`] when the engine reports a non-positive tempo
pub fn estimate_duration<F: EngineFactory>(factory: &F, path: &Path) -> Result<f64> {
    let divisions = metrical_divisions(path)?;

    let (ticks, bpm) = {
        let mut engine = factory.create()?;
        engine.add_file(path)?;
        engine.play()?;

        let mut frame = [0i16; 2];
        engine.write_s16(&mut frame)?;

        (engine.total_ticks(), engine.bpm())
        // engine dropped here: player, synthesizer, settings
    };

    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(FmidiError::InvalidTiming {
            ticks,
            bpm,
            divisions,
        });
    }

    let seconds = ticks_to_seconds(ticks, bpm, divisions);
    trace!(
        target: "fmidi",
        "'{}': {} ticks, {} BPM, {} divisions -> {:.3}s",
        path.display(),
        ticks,
        bpm,
        divisions,
        seconds
    );
    Ok(seconds)
}

/// Probe a file for its playlist entry.
///
/// Header problems are returned as errors (the file is not playable);
/// engine problems only leave the duration unset.
pub fn probe_file<F: EngineFactory>(factory: &F, path: &Path) -> Result<ProbeResult> {
    let duration_secs = match estimate_duration(factory, path) {
        Ok(seconds) => Some(seconds as f32),
        Err(e @ FmidiError::Header(_)) => return Err(e),
        Err(e) => {
            warn!(target: "fmidi", "cannot estimate duration of '{}': {}", path.display(), e);
            None
        }
    };

    Ok(ProbeResult {
        title: None,
        filetype: FILETYPE_TAG,
        duration_secs,
    })
}
