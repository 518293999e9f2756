//! Playback session
//!
//! One session per host playback stream. The session exclusively owns its
//! engine and walks a fixed lifecycle:
//!
//! ```text
//! Closed --init--> Initialized --play--> Playing --free--> Freed
//! ```
//!
//! Calls that do not fit the current state are reported as errors.

use crate::engine::SynthEngine;
use crate::{
    FmidiError, Result, BYTES_PER_FRAME, DEFAULT_SAMPLE_RATE, OUTPUT_BITS_PER_SAMPLE,
    OUTPUT_CHANNELS,
};
use bitflags::bitflags;
use tracing::{trace, warn};

bitflags! {
    /// Hints passed by the host when opening a stream
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DecoderHints: u32 {
        /// Host prefers 16-bit output
        const SIXTEEN_BIT = 0x1;
        /// Host wants bitrate updates
        const NEED_BITRATE = 0x2;
        /// Host may ask the decoder to loop
        const CAN_LOOP = 0x4;
        /// Host wants the signal without post-processing
        const RAW_SIGNAL = 0x8;
    }
}

bitflags! {
    /// Speaker positions carried by the stream
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelMask: u32 {
        /// Front left
        const FRONT_LEFT = 0x1;
        /// Front right
        const FRONT_RIGHT = 0x2;
        /// Front center
        const FRONT_CENTER = 0x4;
        /// Low frequency
        const LOW_FREQUENCY = 0x8;
    }
}

impl ChannelMask {
    /// Union of the per-channel bits for the first `channels` channels
    pub fn for_channels(channels: u16) -> Self {
        (0..channels.min(32)).fold(Self::empty(), |mask, i| {
            mask | Self::from_bits_retain(1 << i)
        })
    }
}

/// Host-visible stream format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamFormat {
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Interleaved channel count
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Speaker positions
    pub channel_mask: ChannelMask,
}

impl StreamFormat {
    /// Interleaved 16-bit stereo at `sample_rate` Hz
    pub fn stereo_s16(sample_rate: u32) -> Self {
        Self {
            bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
            channels: OUTPUT_CHANNELS,
            sample_rate,
            channel_mask: ChannelMask::for_channels(OUTPUT_CHANNELS),
        }
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Opened, no engine yet
    #[default]
    Closed,
    /// Engine built and file queued, playback not started
    Initialized,
    /// Playback started
    Playing,
    /// Engine released; the session accepts no further calls
    Freed,
}

/// Outcome of a successful `init`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Instrument bank loaded
    Nominal,
    /// Instrument bank missing; playback proceeds without instruments
    Degraded,
}

/// A playback stream bound to one engine
pub struct PlaybackSession<E> {
    engine: Option<E>,
    state: SessionState,
    hints: DecoderHints,
    format: StreamFormat,
    read_pos: f32,
    degraded: bool,
    scratch: Vec<i16>,
}

impl<E: SynthEngine> PlaybackSession<E> {
    pub(crate) fn new(hints: DecoderHints) -> Self {
        Self {
            engine: None,
            state: SessionState::Closed,
            hints,
            format: StreamFormat::default(),
            read_pos: 0.0,
            degraded: false,
            scratch: Vec::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Hints given at open
    pub fn hints(&self) -> DecoderHints {
        self.hints
    }

    /// Stream format (zeroed until init)
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Seconds of audio handed to the host since init
    pub fn read_position(&self) -> f32 {
        self.read_pos
    }

    /// Whether playback runs without an instrument bank
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// The session's engine, if one is attached
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// Attach a freshly built engine with its file already queued.
    pub(crate) fn attach(&mut self, engine: E, degraded: bool) {
        self.engine = Some(engine);
        self.degraded = degraded;
        self.state = SessionState::Initialized;
    }

    /// Start the engine's transport; on failure the session stays `Initialized`.
    pub(crate) fn start(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match engine.play() {
            Ok(()) => self.state = SessionState::Playing,
            Err(e) => warn!(target: "fmidi", "failed to start playback: {}", e),
        }
    }

    /// Set the stream format and rewind the read cursor.
    pub(crate) fn configure(&mut self, format: StreamFormat) {
        self.format = format;
        self.read_pos = 0.0;
    }

    /// Fill `buf` with interleaved native-endian 16-bit stereo PCM.
    ///
    /// Returns the number of bytes written: `buf.len()` rounded down to
    /// whole frames while the engine plays, 0 once it stops or fails.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.state {
            SessionState::Closed | SessionState::Freed => {
                return Err(FmidiError::Lifecycle {
                    operation: "read",
                    state: self.state,
                })
            }
            SessionState::Initialized => return Ok(0),
            SessionState::Playing => {}
        }

        let Some(engine) = self.engine.as_mut() else {
            return Ok(0);
        };
        if !engine.is_playing() {
            return Ok(0);
        }

        let frames = buf.len() / BYTES_PER_FRAME;
        if frames == 0 {
            return Ok(0);
        }

        self.scratch.resize(frames * 2, 0);
        if let Err(e) = engine.write_s16(&mut self.scratch) {
            warn!(target: "fmidi", "engine failed to render {} frames: {}", frames, e);
            return Ok(0);
        }

        for (dst, sample) in buf.chunks_exact_mut(2).zip(self.scratch.iter()) {
            dst.copy_from_slice(&sample.to_ne_bytes());
        }

        let rate = if self.format.sample_rate > 0 {
            self.format.sample_rate
        } else {
            DEFAULT_SAMPLE_RATE
        };
        self.read_pos += frames as f32 / rate as f32;

        Ok(frames * BYTES_PER_FRAME)
    }

    /// Seeking is not supported; always succeeds without effect.
    pub fn seek(&mut self, seconds: f32) -> Result<()> {
        trace!(target: "fmidi", "seek to {}s ignored", seconds);
        Ok(())
    }

    /// Seeking is not supported; always succeeds without effect.
    pub fn seek_sample(&mut self, sample: i64) -> Result<()> {
        trace!(target: "fmidi", "seek to sample {} ignored", sample);
        Ok(())
    }

    /// Release the engine (player, synthesizer, settings).
    pub fn free(&mut self) -> Result<()> {
        match self.state {
            SessionState::Freed => Err(FmidiError::AlreadyFreed),
            SessionState::Closed => {
                self.state = SessionState::Freed;
                Err(FmidiError::NotInitialized)
            }
            SessionState::Initialized | SessionState::Playing => {
                drop(self.engine.take());
                self.state = SessionState::Freed;
                Ok(())
            }
        }
    }
}
