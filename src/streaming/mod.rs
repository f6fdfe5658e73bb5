//! Audio output and streaming
//!
//! The emulator never talks to a sound card directly. An [`AudioBackend`] owns the
//! platform output stream and pulls fixed-size buffers from the
//! [`MixingEngine`](crate::MixingEngine) on its own real-time thread. The
//! [`AudioOutput`] lifecycle wraps a backend with lazy, latched initialization.

mod device;

#[cfg(feature = "streaming")]
mod audio_device;

pub use device::{AudioOutput, DeviceState};

#[cfg(feature = "streaming")]
pub use audio_device::RodioBackend;

use crate::config::LedcConfig;
use crate::engine::MixingEngine;
use crate::Result;

/// Default output sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Default frames rendered per backend pull (~10.7 ms at 48 kHz)
pub const DEFAULT_BUFFER_FRAMES: usize = 512;

/// Output stream parameters
///
/// The emulator always produces mono `f32` samples at one fixed rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels (always 1)
    pub channels: u16,
    /// Frames rendered per pull
    pub buffer_frames: usize,
}

impl StreamConfig {
    /// Mono stream at `sample_rate` with `buffer_frames` per pull
    pub fn new(sample_rate: u32, buffer_frames: usize) -> Self {
        StreamConfig {
            sample_rate,
            channels: 1,
            buffer_frames,
        }
    }

    /// Latency of one buffer in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_frames as f32 / self.sample_rate as f32) * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_BUFFER_FRAMES)
    }
}

impl From<&LedcConfig> for StreamConfig {
    fn from(config: &LedcConfig) -> Self {
        Self::new(config.sample_rate, config.buffer_frames)
    }
}

/// Platform audio output
///
/// Implementations own whatever the platform needs to keep a stream alive and call
/// [`MixingEngine::render`] from their audio thread. All methods are called from
/// control threads, never from the audio thread.
pub trait AudioBackend: Send {
    /// Short name for log messages
    fn name(&self) -> &str;

    /// Open the output device, paused, pulling audio from `engine`
    fn open(&mut self, config: &StreamConfig, engine: MixingEngine) -> Result<()>;

    /// Start (or resume) the output stream
    fn start(&mut self) -> Result<()>;

    /// Stop the stream and release the device
    fn close(&mut self);
}

/// Backend without any audio output
///
/// Used for headless runs and tests; the caller renders through
/// [`Ledc::engine`](crate::Ledc::engine) when it wants samples.
#[derive(Debug, Default)]
pub struct NullBackend {
    open: bool,
    started: bool,
}

impl NullBackend {
    /// Create a closed null backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `open` has been called (and not closed since)
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether `start` has been called (and not closed since)
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn open(&mut self, _config: &StreamConfig, _engine: MixingEngine) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.started = false;
    }
}
