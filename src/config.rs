//! Decoder configuration
//!
//! The plugin entry point runs with [`DecoderConfig::default`]. Embedders
//! and the CLI may load overrides from a JSON document; missing fields
//! fall back to the defaults.

use crate::{FmidiError, Result, DEFAULT_SAMPLE_RATE, DEFAULT_SOUNDFONT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Decoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Instrument bank loaded by every playback session
    pub soundfont: PathBuf,
    /// Engine output sample rate in Hz
    pub sample_rate: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            soundfont: PathBuf::from(DEFAULT_SOUNDFONT),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl DecoderConfig {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FmidiError::ConfigError(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FmidiError::ConfigError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Replace the instrument bank path
    pub fn with_soundfont(mut self, soundfont: impl Into<PathBuf>) -> Self {
        self.soundfont = soundfont.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(FmidiError::ConfigError(format!(
                "sample rate {} Hz outside 8000..=192000",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DecoderConfig::default();
        assert_eq!(config.soundfont, PathBuf::from(DEFAULT_SOUNDFONT));
        assert_eq!(config.sample_rate, 44_100);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DecoderConfig::from_json(r#"{ "soundfont": "/tmp/gm.sf2" }"#).unwrap();
        assert_eq!(config.soundfont, PathBuf::from("/tmp/gm.sf2"));
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        let result = DecoderConfig::from_json(r#"{ "sample_rate": 12 }"#);
        assert!(matches!(result, Err(FmidiError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(DecoderConfig::from_json("{ soundfont").is_err());
    }
}
