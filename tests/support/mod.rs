//! Shared test doubles: a recording engine factory and SMF fixture writers.

#![allow(dead_code)]

use fmidi::engine::{EngineError, EngineFactory, SoundFontId, SynthEngine, TransportStatus};
use fmidi::host::{Host, ItemHandle, MemoryHost};
use fmidi::{Decoder, DecoderConfig, PLUGIN_ID};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Ordered record of everything the engines did
#[derive(Clone, Default)]
pub struct Ledger(Arc<Mutex<Vec<String>>>);

impl Ledger {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Behaviour of the mock engines
#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Ticks reported once primed
    pub ticks: u32,
    /// Tempo reported once primed
    pub bpm: f64,
    pub create_fails: bool,
    pub soundfont_fails: bool,
    pub play_fails: bool,
    pub write_fails: bool,
    /// Transport switches to `Done` after this many rendered frames
    pub frames_until_done: Option<usize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            ticks: 9600,
            bpm: 120.0,
            create_fails: false,
            soundfont_fails: false,
            play_fails: false,
            write_fails: false,
            frames_until_done: None,
        }
    }
}

pub struct MockFactory {
    pub config: MockConfig,
    pub ledger: Ledger,
}

impl MockFactory {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            ledger: Ledger::default(),
        }
    }

    pub fn created(&self) -> usize {
        self.ledger.count("create")
    }
}

impl EngineFactory for MockFactory {
    type Engine = MockEngine;

    fn create(&self) -> Result<MockEngine, EngineError> {
        if self.config.create_fails {
            return Err(EngineError::Synth("mock engine refused".into()));
        }
        self.ledger.record("create");
        Ok(MockEngine::new(self.config.clone(), self.ledger.clone()))
    }
}

/// Sub-object that records its own release
struct Part {
    name: &'static str,
    ledger: Ledger,
}

impl Drop for Part {
    fn drop(&mut self) {
        self.ledger.record(format!("drop {}", self.name));
    }
}

pub struct MockEngine {
    player: Part,
    synth: Part,
    settings: Part,
    config: MockConfig,
    ledger: Ledger,
    files: Vec<PathBuf>,
    status: TransportStatus,
    primed: bool,
    frames_rendered: usize,
}

impl MockEngine {
    fn new(config: MockConfig, ledger: Ledger) -> Self {
        let part = |name: &'static str| Part {
            name,
            ledger: ledger.clone(),
        };
        Self {
            player: part("player"),
            synth: part("synth"),
            settings: part("settings"),
            config,
            ledger,
            files: Vec::new(),
            status: TransportStatus::Ready,
            primed: false,
            frames_rendered: 0,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Left sample of the `n`th rendered frame; the right sample is its negation
    pub fn sample_at(n: usize) -> i16 {
        (n % 1000) as i16 + 1
    }
}

impl SynthEngine for MockEngine {
    fn load_soundfont(&mut self, path: &Path) -> Result<SoundFontId, EngineError> {
        self.ledger.record("load_soundfont");
        if self.config.soundfont_fails {
            return Err(EngineError::SoundFont(format!(
                "cannot open '{}'",
                path.display()
            )));
        }
        Ok(SoundFontId(1))
    }

    fn add_file(&mut self, path: &Path) -> Result<(), EngineError> {
        self.ledger.record("add_file");
        self.files.push(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.ledger.record("play");
        if self.files.is_empty() {
            return Err(EngineError::NoFile);
        }
        if self.config.play_fails {
            return Err(EngineError::Synth("mock transport jammed".into()));
        }
        self.status = TransportStatus::Playing;
        Ok(())
    }

    fn status(&self) -> TransportStatus {
        self.status
    }

    fn write_s16(&mut self, out: &mut [i16]) -> Result<(), EngineError> {
        self.ledger.record("write");
        if self.config.write_fails {
            return Err(EngineError::Synth("mock render failed".into()));
        }
        if out.len() % 2 != 0 {
            return Err(EngineError::OddBuffer(out.len()));
        }

        self.primed = true;
        if self.status != TransportStatus::Playing {
            out.fill(0);
            return Ok(());
        }

        for frame in out.chunks_exact_mut(2) {
            let left = Self::sample_at(self.frames_rendered);
            frame[0] = left;
            frame[1] = -left;
            self.frames_rendered += 1;
        }

        if let Some(limit) = self.config.frames_until_done {
            if self.frames_rendered >= limit {
                self.status = TransportStatus::Done;
            }
        }
        Ok(())
    }

    fn total_ticks(&self) -> u32 {
        if self.primed {
            self.config.ticks
        } else {
            0
        }
    }

    fn bpm(&self) -> f64 {
        if self.primed {
            self.config.bpm
        } else {
            0.0
        }
    }
}

pub fn mock_decoder(config: MockConfig) -> Decoder<MockFactory> {
    Decoder::new(MockFactory::new(config), DecoderConfig::default())
}

/// Playlist item pointing at `fname`, as the host would create it
pub fn host_item(host: &MemoryHost, fname: &str) -> ItemHandle {
    host.pl_item_alloc_init(fname, PLUGIN_ID)
}

/// MIDI variable-length quantity
pub fn vlq(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

/// Format 0 file: one tempo event and one note lasting `ticks`
pub fn tiny_midi(division: u16, ticks: u32, micros_per_beat: u32) -> Vec<u8> {
    let tempo = micros_per_beat.to_be_bytes();
    let mut track = vec![0x00, 0xFF, 0x51, 0x03, tempo[1], tempo[2], tempo[3]];
    track.extend_from_slice(&[0x00, 0x90, 0x3C, 0x64]);
    track.extend(vlq(ticks));
    track.extend_from_slice(&[0x80, 0x3C, 0x40]);
    track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    let mut data = Vec::new();
    data.extend_from_slice(b"MThd");
    data.extend_from_slice(&6u32.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&division.to_be_bytes());
    data.extend_from_slice(b"MTrk");
    data.extend_from_slice(&(track.len() as u32).to_be_bytes());
    data.extend(track);
    data
}

/// Write `bytes` into `dir` and return the path as a string
pub fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> String {
    let path = dir.path().join(name);
    fs::write(&path, bytes).expect("write fixture");
    path.to_string_lossy().into_owned()
}

