//! ESP32 LEDC peripheral emulator
//!
//! Emulates the LED Control (LEDC) PWM/tone peripheral of an ESP32 on a desktop OS.
//! Every hardware channel is modelled as a square-wave oscillator; the audio thread
//! mixes all audible channels into one mono stream in real time while control threads
//! attach pins, write duty cycles and change frequencies concurrently.
//!
//! # Features
//! - Fixed pool of up to 16 PWM channels with attach/detach lifecycle
//! - Pin-to-channel routing over a fixed addressable pin range
//! - Lock-free channel state (one atomic per field) shared with the audio thread
//! - Square-wave mixing engine with phase continuity across frequency changes
//! - Lazy, latched audio device lifecycle behind the [`AudioBackend`] trait
//! - Blocking `tone()`/`noTone()` facade and melody playback helpers
//!
//! # Crate feature flags
//! - `streaming` (opt-in): Real-time audio output via rodio ([`RodioBackend`])
//!
//! # Quick start
//! ```
//! use ledc_sim::{Ledc, LedcConfig, NullBackend, Note};
//!
//! let ledc = Ledc::new(LedcConfig::default(), Box::new(NullBackend::new())).unwrap();
//! ledc.attach(25, 1000, 10).unwrap();
//! ledc.write_tone(25, 1000).unwrap();
//! assert_eq!(ledc.read(25), 511);
//! ledc.write_note(25, Note::A, 4).unwrap(); // 440 Hz
//! ledc.detach(25);
//! ```
//!
//! ## Rendering without a device
//! ```
//! use ledc_sim::{Ledc, LedcConfig, NullBackend};
//!
//! let ledc = Ledc::new(LedcConfig::default(), Box::new(NullBackend::new())).unwrap();
//! ledc.attach(4, 440, 8).unwrap();
//! ledc.write(4, 128).unwrap();
//!
//! let mut buffer = vec![0.0f32; 256];
//! ledc.engine().render(&mut buffer);
//! assert!(buffer.iter().any(|s| *s != 0.0));
//! ```

#![warn(missing_docs)]

pub mod atomic;
pub mod channel;
pub mod config;
pub mod engine;
pub mod ledc;
pub mod melody;
pub mod notes;
pub mod router;
pub mod streaming;
pub mod tone;

/// Error types for LEDC emulator operations
#[derive(thiserror::Error, Debug)]
pub enum LedcError {
    /// No free channel left in the pool
    #[error("No free channels available (pool of {0})")]
    ResourceExhausted(usize),

    /// Channel index out of range or channel not attached
    #[error("Invalid or unattached channel {0}")]
    InvalidChannel(usize),

    /// Pin identifier outside the addressable range
    #[error("Invalid pin {0}")]
    InvalidPin(u16),

    /// Pin is not attached to any channel
    #[error("Pin {0} not attached to any channel")]
    PinNotAttached(u16),

    /// Note index or octave outside the note table
    #[error("Invalid note {note} in octave {octave}")]
    InvalidNote {
        /// Requested note index
        note: u8,
        /// Requested octave
        octave: u8,
    },

    /// Duty resolution outside 1..=16 bits
    #[error("Invalid resolution: {0} bits")]
    InvalidResolution(u8),

    /// Audio device failed to initialize earlier; the controller is inert
    #[error("Audio device unavailable")]
    DeviceUnavailable,

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration or melody file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, LedcError>;

/// External pin identifier (GPIO number)
pub type Pin = u16;

// Public API exports
pub use channel::{ChannelSnapshot, ChannelTable, MAX_CHANNELS};
pub use config::LedcConfig;
pub use engine::MixingEngine;
pub use ledc::Ledc;
pub use melody::{Melody, MelodyPlayer, MelodyStep};
pub use notes::Note;
pub use router::PinRouter;
pub use streaming::{AudioBackend, DeviceState, NullBackend, StreamConfig};
#[cfg(feature = "streaming")]
pub use streaming::RodioBackend;
pub use tone::Tone;
