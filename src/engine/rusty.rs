//! SoundFont engine backend built on RustySynth.
//!
//! [`RustyEngine`] mirrors the settings / synthesizer / player split of
//! classic MIDI synthesis libraries:
//! - [`EngineSettings`] holds the output format
//! - [`Synth`] owns the instrument bank and the RustySynth voice engine
//! - [`Player`] queues files, parses them lazily on the first synthesis
//!   step and dispatches their channel messages to the synthesizer
//!
//! Without an instrument bank the engine still sequences files and
//! advances the transport, but renders silence.

use super::timeline::{TimedEvent, Timeline, DEFAULT_MICROS_PER_BEAT};
use super::{f32_to_i16, EngineError, EngineFactory, SoundFontId, SynthEngine, TransportStatus};
use crate::DEFAULT_SAMPLE_RATE;
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Frames rendered between two event dispatch points
pub const BLOCK_FRAMES: usize = 64;

/// Builds [`RustyEngine`] instances
#[derive(Debug, Clone, Copy)]
pub struct RustyFactory {
    sample_rate: u32,
}

impl RustyFactory {
    /// Create a factory for engines rendering at `sample_rate` Hz
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Output sample rate of created engines
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Default for RustyFactory {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl EngineFactory for RustyFactory {
    type Engine = RustyEngine;

    fn create(&self) -> Result<RustyEngine, EngineError> {
        Ok(RustyEngine::new(self.sample_rate))
    }
}

/// Output settings shared by synthesizer and player
pub struct EngineSettings {
    sample_rate: u32,
    synth: SynthesizerSettings,
}

impl EngineSettings {
    /// Settings for `sample_rate` Hz output
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            synth: SynthesizerSettings::new(sample_rate as i32),
        }
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Instrument banks and the voice engine
pub struct Synth {
    soundfonts: Vec<Arc<SoundFont>>,
    synthesizer: Option<Synthesizer>,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Synth {
    fn new() -> Self {
        Self {
            soundfonts: Vec::new(),
            synthesizer: None,
            left: vec![0.0; BLOCK_FRAMES],
            right: vec![0.0; BLOCK_FRAMES],
        }
    }

    /// Load a bank; the most recently loaded bank drives the synthesizer.
    fn load(&mut self, path: &Path, settings: &EngineSettings) -> Result<SoundFontId, EngineError> {
        let file = File::open(path)
            .map_err(|e| EngineError::SoundFont(format!("'{}': {}", path.display(), e)))?;
        let mut reader = BufReader::new(file);
        let soundfont = Arc::new(SoundFont::new(&mut reader).map_err(|e| {
            EngineError::SoundFont(format!("failed to parse '{}': {}", path.display(), e))
        })?);

        let synthesizer = Synthesizer::new(&soundfont, &settings.synth)
            .map_err(|e| EngineError::Synth(e.to_string()))?;

        self.soundfonts.push(soundfont);
        self.synthesizer = Some(synthesizer);

        Ok(SoundFontId(self.soundfonts.len() as u32))
    }

    /// Whether an instrument bank is loaded
    pub fn has_soundfont(&self) -> bool {
        self.synthesizer.is_some()
    }

    fn process(&mut self, event: &TimedEvent) {
        if let Some(synthesizer) = self.synthesizer.as_mut() {
            synthesizer.process_midi_message(
                event.channel as i32,
                event.command as i32,
                event.data1 as i32,
                event.data2 as i32,
            );
        }
    }

    /// Render `out.len() / 2` interleaved frames (at most one block).
    fn render(&mut self, out: &mut [i16]) {
        let frames = out.len() / 2;
        let Some(synthesizer) = self.synthesizer.as_mut() else {
            out.fill(0);
            return;
        };

        let left = &mut self.left[..frames];
        let right = &mut self.right[..frames];
        synthesizer.render(left, right);

        for (frame, (&l, &r)) in out.chunks_exact_mut(2).zip(left.iter().zip(right.iter())) {
            frame[0] = f32_to_i16(l);
            frame[1] = f32_to_i16(r);
        }
    }
}

/// File queue and sequencing position
pub struct Player {
    queue: VecDeque<PathBuf>,
    current: Option<Timeline>,
    next_event: usize,
    position_frames: u64,
    status: TransportStatus,
    sample_rate: u32,
}

impl Player {
    fn new(sample_rate: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            next_event: 0,
            position_frames: 0,
            status: TransportStatus::Ready,
            sample_rate,
        }
    }

    fn position_secs(&self) -> f64 {
        self.position_frames as f64 / self.sample_rate as f64
    }

    /// Parse the next queued file if nothing is loaded.
    fn ensure_loaded(&mut self) -> Result<(), EngineError> {
        if self.current.is_some() {
            return Ok(());
        }
        let Some(path) = self.queue.pop_front() else {
            self.status = TransportStatus::Done;
            return Ok(());
        };

        match Timeline::load(&path) {
            Ok(timeline) => {
                debug!(target: "fmidi", "player loaded '{}'", path.display());
                self.current = Some(timeline);
                self.next_event = 0;
                self.position_frames = 0;
                Ok(())
            }
            Err(e) => {
                warn!(target: "fmidi", "player failed to load '{}': {}", path.display(), e);
                if self.queue.is_empty() {
                    self.status = TransportStatus::Done;
                }
                Err(e)
            }
        }
    }

    /// Events due at or before the current position; marks them dispatched.
    fn take_due(&mut self) -> &[TimedEvent] {
        let now = self.position_secs();
        let Some(timeline) = self.current.as_ref() else {
            return &[];
        };
        let start = self.next_event;
        let pending = &timeline.events()[start..];
        let due = pending.iter().take_while(|e| e.time_secs <= now).count();
        self.next_event = start + due;
        &timeline.events()[start..start + due]
    }

    fn advance(&mut self, frames: usize) {
        self.position_frames += frames as u64;

        let finished = self.current.as_ref().is_some_and(|timeline| {
            self.next_event >= timeline.events().len()
                && self.position_secs() >= timeline.duration_secs()
        });
        if finished {
            trace!(target: "fmidi", "player reached end of file");
            self.current = None;
            if self.queue.is_empty() {
                self.status = TransportStatus::Done;
            }
        }
    }
}

/// One engine instance: settings, synthesizer and player.
pub struct RustyEngine {
    // Field order is teardown order.
    player: Player,
    synth: Synth,
    settings: EngineSettings,
}

impl RustyEngine {
    /// Create an engine rendering at `sample_rate` Hz
    pub fn new(sample_rate: u32) -> Self {
        let settings = EngineSettings::new(sample_rate);
        let synth = Synth::new();
        let player = Player::new(settings.sample_rate());
        Self {
            player,
            synth,
            settings,
        }
    }

    /// Output settings
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether an instrument bank is loaded
    pub fn has_soundfont(&self) -> bool {
        self.synth.has_soundfont()
    }

    /// Seconds played of the current file
    pub fn position_secs(&self) -> f64 {
        self.player.position_secs()
    }
}

impl SynthEngine for RustyEngine {
    fn load_soundfont(&mut self, path: &Path) -> Result<SoundFontId, EngineError> {
        let id = self.synth.load(path, &self.settings)?;
        debug!(target: "fmidi", "loaded soundfont {:?} from '{}'", id, path.display());
        Ok(id)
    }

    fn add_file(&mut self, path: &Path) -> Result<(), EngineError> {
        self.player.queue.push_back(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        if self.player.queue.is_empty() && self.player.current.is_none() {
            return Err(EngineError::NoFile);
        }
        self.player.status = TransportStatus::Playing;
        Ok(())
    }

    fn status(&self) -> TransportStatus {
        self.player.status
    }

    fn write_s16(&mut self, out: &mut [i16]) -> Result<(), EngineError> {
        if out.len() % 2 != 0 {
            return Err(EngineError::OddBuffer(out.len()));
        }

        for block in out.chunks_mut(BLOCK_FRAMES * 2) {
            if self.player.status != TransportStatus::Playing {
                block.fill(0);
                continue;
            }

            self.player.ensure_loaded()?;
            if self.player.current.is_none() {
                block.fill(0);
                continue;
            }

            for event in self.player.take_due() {
                self.synth.process(event);
            }
            self.synth.render(block);
            self.player.advance(block.len() / 2);
        }

        Ok(())
    }

    fn total_ticks(&self) -> u32 {
        self.player
            .current
            .as_ref()
            .map_or(0, |timeline| timeline.total_ticks())
    }

    fn bpm(&self) -> f64 {
        match self.player.current.as_ref() {
            Some(timeline) => timeline.tempo().bpm_at(self.player.position_secs()),
            None => 60_000_000.0 / DEFAULT_MICROS_PER_BEAT as f64,
        }
    }
}
