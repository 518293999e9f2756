//! Standard MIDI File header access
//!
//! Raw reads against the `MThd` chunk that do not go through the
//! synthesis engine: the file-type sniff, the time-division field and a
//! full header parse for diagnostics.
//!
//! Header layout (big-endian):
//! - `0..4`   magic `MThd`
//! - `4..8`   chunk length (6)
//! - `8..10`  format (0, 1 or 2)
//! - `10..12` track count
//! - `12..14` division (ticks per beat, or SMPTE when bit 15 is set)

use crate::{FmidiError, Result};
use nom::bytes::complete::tag;
use nom::number::complete::{be_u16, be_u32};
use nom::IResult;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Magic bytes opening every Standard MIDI File
pub const MIDI_MAGIC: &[u8; 4] = b"MThd";

/// Byte offset of the division field
pub const DIVISION_OFFSET: u64 = 12;

/// Smallest file that still carries a complete division field
pub const MIN_HEADER_LEN: usize = 14;

/// Parsed `MThd` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiHeader {
    /// Declared chunk length (6 for every known revision)
    pub length: u32,
    /// File format (0 = single track, 1 = parallel, 2 = sequential)
    pub format: u16,
    /// Number of track chunks
    pub tracks: u16,
    /// Raw division field
    pub division: u16,
}

impl MidiHeader {
    /// Whether the division field uses SMPTE time code instead of ticks per beat
    pub fn is_smpte(&self) -> bool {
        self.division & 0x8000 != 0
    }

    /// Ticks per beat, if the division is metrical
    pub fn ticks_per_beat(&self) -> Option<u16> {
        if self.is_smpte() || self.division == 0 {
            None
        } else {
            Some(self.division)
        }
    }
}

fn header_chunk(input: &[u8]) -> IResult<&[u8], MidiHeader> {
    let (input, _) = tag(&MIDI_MAGIC[..])(input)?;
    let (input, length) = be_u32(input)?;
    let (input, format) = be_u16(input)?;
    let (input, tracks) = be_u16(input)?;
    let (input, division) = be_u16(input)?;
    Ok((
        input,
        MidiHeader {
            length,
            format,
            tracks,
            division,
        },
    ))
}

/// Parse the `MThd` chunk at the start of `data`
pub fn parse_header(data: &[u8]) -> Result<MidiHeader> {
    if data.len() < MIN_HEADER_LEN {
        return Err(FmidiError::Header(format!(
            "data too short for MThd chunk: {} bytes, need {}",
            data.len(),
            MIN_HEADER_LEN
        )));
    }

    header_chunk(data)
        .map(|(_, header)| header)
        .map_err(|e| FmidiError::Header(format!("malformed MThd chunk: {e}")))
}

/// Check the file's magic bytes.
///
/// Unreadable or short files are simply not MIDI.
pub fn is_midi_file(path: impl AsRef<Path>) -> bool {
    let mut magic = [0u8; 4];
    let read = File::open(path.as_ref()).and_then(|mut file| file.read_exact(&mut magic));
    read.is_ok() && &magic == MIDI_MAGIC
}

/// Read the raw division field (bytes 12..14, big-endian).
///
/// The value is returned as stored; callers decide whether it is usable.
pub fn read_divisions(path: impl AsRef<Path>) -> Result<u16> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| {
        FmidiError::Header(format!("cannot open '{}': {}", path.display(), e))
    })?;

    file.seek(SeekFrom::Start(DIVISION_OFFSET))?;

    let mut bytes = [0u8; 2];
    file.read_exact(&mut bytes).map_err(|_| {
        FmidiError::Header(format!(
            "'{}' is too short for the division field",
            path.display()
        ))
    })?;

    Ok(u16::from_be_bytes(bytes))
}
