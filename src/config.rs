//! Emulator configuration
//!
//! All fields have defaults matching the ESP32 simulator setup (48 kHz mono output,
//! 16 channels, 256 pins), so a config file only needs the values it changes.

use crate::channel::{DEFAULT_RESOLUTION_BITS, MAX_CHANNELS, MAX_RESOLUTION_BITS};
use crate::router::DEFAULT_PIN_COUNT;
use crate::streaming::{DEFAULT_BUFFER_FRAMES, DEFAULT_SAMPLE_RATE};
use crate::{LedcError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default square-wave amplitude per channel
pub const DEFAULT_AMPLITUDE: f32 = 0.1;

/// Default silence between melody steps
pub const DEFAULT_NOTE_GAP_MS: u64 = 50;

/// Largest addressable pin table, one slot for every `u16` pin
pub const MAX_PIN_COUNT: usize = 1 << 16;

/// Emulator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedcConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Frames rendered per backend pull
    pub buffer_frames: usize,
    /// Number of channels in the pool
    pub channel_count: usize,
    /// Number of addressable pins
    pub pin_count: usize,
    /// Square-wave amplitude of a single channel
    pub amplitude: f32,
    /// Duty resolution used by the tone facade
    pub tone_resolution: u8,
    /// Silence inserted between melody steps
    pub note_gap_ms: u64,
}

impl Default for LedcConfig {
    fn default() -> Self {
        LedcConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            channel_count: MAX_CHANNELS,
            pin_count: DEFAULT_PIN_COUNT,
            amplitude: DEFAULT_AMPLITUDE,
            tone_resolution: DEFAULT_RESOLUTION_BITS,
            note_gap_ms: DEFAULT_NOTE_GAP_MS,
        }
    }
}

impl LedcConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text and validate it
    pub fn from_json(text: &str) -> Result<Self> {
        let config: LedcConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(LedcError::ConfigError("sample_rate must be > 0".into()));
        }
        if self.buffer_frames == 0 {
            return Err(LedcError::ConfigError("buffer_frames must be > 0".into()));
        }
        if !(1..=MAX_CHANNELS).contains(&self.channel_count) {
            return Err(LedcError::ConfigError(format!(
                "channel_count must be between 1 and {}, got {}",
                MAX_CHANNELS, self.channel_count
            )));
        }
        if !(1..=MAX_PIN_COUNT).contains(&self.pin_count) {
            return Err(LedcError::ConfigError(format!(
                "pin_count must be between 1 and {}, got {}",
                MAX_PIN_COUNT, self.pin_count
            )));
        }
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(LedcError::ConfigError(format!(
                "amplitude must be in (0, 1], got {}",
                self.amplitude
            )));
        }
        if !(1..=MAX_RESOLUTION_BITS).contains(&self.tone_resolution) {
            return Err(LedcError::ConfigError(format!(
                "tone_resolution must be between 1 and {} bits, got {}",
                MAX_RESOLUTION_BITS, self.tone_resolution
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = LedcConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.channel_count, 16);
        assert_eq!(config.pin_count, 256);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = LedcConfig::from_json(r#"{ "channel_count": 4, "amplitude": 0.2 }"#).unwrap();
        assert_eq!(config.channel_count, 4);
        assert_eq!(config.amplitude, 0.2);
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.note_gap_ms, 50);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{ "channel_count": 0 }"#,
            r#"{ "channel_count": 17 }"#,
            r#"{ "sample_rate": 0 }"#,
            r#"{ "amplitude": 1.5 }"#,
            r#"{ "tone_resolution": 20 }"#,
            r#"{ "pin_count": 0 }"#,
            r#"{ "pin_count": 65537 }"#,
        ] {
            assert!(
                matches!(LedcConfig::from_json(json), Err(LedcError::ConfigError(_))),
                "expected config error for {}",
                json
            );
        }
    }

    #[test]
    fn test_pin_count_covers_every_u16_pin() {
        let config = LedcConfig::from_json(r#"{ "pin_count": 65536 }"#).unwrap();
        assert_eq!(config.pin_count, MAX_PIN_COUNT);

        let router = crate::PinRouter::new(config.pin_count);
        assert_eq!(router.lookup(u16::MAX).unwrap(), None);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            LedcConfig::from_json("{ channel_count"),
            Err(LedcError::Json(_))
        ));
    }

    #[test]
    fn test_from_file_round_trip() {
        let config = LedcConfig {
            channel_count: 8,
            note_gap_ms: 0,
            ..LedcConfig::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json().unwrap().as_bytes()).unwrap();

        let loaded = LedcConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            LedcConfig::from_file("/nonexistent/ledc.json"),
            Err(LedcError::Io(_))
        ));
    }
}
