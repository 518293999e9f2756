//! MIDI file timeline
//!
//! Flattens the tracks of a Standard MIDI File into one time-ordered list
//! of channel messages and builds the tempo map used to place them in
//! seconds. Parsing is delegated to `midly`.

use super::EngineError;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;
use tracing::debug;

/// Tempo assumed until the first Set Tempo event (120 BPM)
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

const MICROS_PER_MINUTE: f64 = 60_000_000.0;

/// A channel message with its absolute position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    /// Absolute position in ticks
    pub tick: u32,
    /// Absolute position in seconds
    pub time_secs: f64,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Status nibble (0x80..=0xE0)
    pub command: u8,
    /// First data byte
    pub data1: u8,
    /// Second data byte (0 for two-byte messages)
    pub data2: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    tick: u32,
    micros_per_beat: u32,
    start_secs: f64,
}

/// Piecewise-constant tempo map
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    ticks_per_beat: u16,
    // Never empty; the first segment starts at tick 0.
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    /// Build a map from `(tick, microseconds per beat)` changes.
    ///
    /// When several changes share a tick the last one wins.
    pub fn new(ticks_per_beat: u16, mut changes: Vec<(u32, u32)>) -> Self {
        changes.sort_by_key(|&(tick, _)| tick);

        let mut segments = vec![TempoSegment {
            tick: 0,
            micros_per_beat: DEFAULT_MICROS_PER_BEAT,
            start_secs: 0.0,
        }];

        for (tick, micros_per_beat) in changes {
            let last = segments[segments.len() - 1];
            if tick == last.tick {
                let idx = segments.len() - 1;
                segments[idx].micros_per_beat = micros_per_beat;
                continue;
            }
            let start_secs = last.start_secs
                + (tick - last.tick) as f64 * seconds_per_tick(last.micros_per_beat, ticks_per_beat);
            segments.push(TempoSegment {
                tick,
                micros_per_beat,
                start_secs,
            });
        }

        Self {
            ticks_per_beat,
            segments,
        }
    }

    /// Seconds elapsed at `tick`
    pub fn seconds_at(&self, tick: u32) -> f64 {
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.tick <= tick)
            .unwrap_or(&self.segments[0]);
        segment.start_secs
            + (tick - segment.tick) as f64
                * seconds_per_tick(segment.micros_per_beat, self.ticks_per_beat)
    }

    /// Tempo in effect at `secs`, in beats per minute
    pub fn bpm_at(&self, secs: f64) -> f64 {
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.start_secs <= secs)
            .unwrap_or(&self.segments[0]);
        MICROS_PER_MINUTE / segment.micros_per_beat as f64
    }
}

fn seconds_per_tick(micros_per_beat: u32, ticks_per_beat: u16) -> f64 {
    micros_per_beat as f64 / 1_000_000.0 / ticks_per_beat.max(1) as f64
}

/// One parsed MIDI file, ready for sequencing
#[derive(Debug, Clone)]
pub struct Timeline {
    ticks_per_beat: u16,
    total_ticks: u32,
    duration_secs: f64,
    events: Vec<TimedEvent>,
    tempo: TempoMap,
}

impl Timeline {
    /// Load and parse a MIDI file from disk
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let data = std::fs::read(path)
            .map_err(|e| EngineError::Load(format!("'{}': {}", path.display(), e)))?;
        Self::parse(&data)
    }

    /// Parse MIDI file bytes.
    ///
    /// Tracks are merged as if played in parallel, whatever the declared format.
    pub fn parse(data: &[u8]) -> Result<Self, EngineError> {
        let smf = Smf::parse(data).map_err(|e| EngineError::Load(e.to_string()))?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int(),
            Timing::Metrical(_) => {
                return Err(EngineError::Load("division of zero ticks per beat".into()))
            }
            Timing::Timecode(_, _) => {
                return Err(EngineError::Load("SMPTE time division is not supported".into()))
            }
        };

        let mut tempo_changes = Vec::new();
        let mut events = Vec::new();
        let mut total_ticks = 0u32;

        for track in &smf.tracks {
            let mut tick = 0u32;
            for event in track {
                tick = tick.saturating_add(event.delta.as_int());
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                        tempo_changes.push((tick, tempo.as_int().max(1)));
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let (command, data1, data2) = raw_message(message);
                        events.push(TimedEvent {
                            tick,
                            time_secs: 0.0,
                            channel: channel.as_int(),
                            command,
                            data1,
                            data2,
                        });
                    }
                    _ => {}
                }
            }
            total_ticks = total_ticks.max(tick);
        }

        // Stable: simultaneous events keep track order.
        events.sort_by_key(|e| e.tick);

        let tempo = TempoMap::new(ticks_per_beat, tempo_changes);
        for event in &mut events {
            event.time_secs = tempo.seconds_at(event.tick);
        }
        let duration_secs = tempo.seconds_at(total_ticks);

        debug!(
            target: "fmidi",
            "parsed MIDI: {} tracks, {} events, {} ticks at {} tpb ({:.2}s)",
            smf.tracks.len(),
            events.len(),
            total_ticks,
            ticks_per_beat,
            duration_secs
        );

        Ok(Self {
            ticks_per_beat,
            total_ticks,
            duration_secs,
            events,
            tempo,
        })
    }

    /// Ticks per beat declared by the header
    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    /// Length of the longest track in ticks
    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }

    /// Length of the longest track in seconds, following the tempo map
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Channel messages in playback order
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    /// Tempo map of the file
    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }
}

fn raw_message(message: MidiMessage) -> (u8, u8, u8) {
    match message {
        MidiMessage::NoteOff { key, vel } => (0x80, key.as_int(), vel.as_int()),
        MidiMessage::NoteOn { key, vel } => (0x90, key.as_int(), vel.as_int()),
        MidiMessage::Aftertouch { key, vel } => (0xA0, key.as_int(), vel.as_int()),
        MidiMessage::Controller { controller, value } => {
            (0xB0, controller.as_int(), value.as_int())
        }
        MidiMessage::ProgramChange { program } => (0xC0, program.as_int(), 0),
        MidiMessage::ChannelAftertouch { vel } => (0xD0, vel.as_int(), 0),
        MidiMessage::PitchBend { bend } => {
            let value = bend.0.as_int();
            (0xE0, (value & 0x7F) as u8, (value >> 7) as u8)
        }
    }
}
