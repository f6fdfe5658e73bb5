//! LEDC controller
//!
//! [`Ledc`] is the emulated peripheral: the channel pool, the pin router and the audio
//! output, bundled into one context object. It mirrors the ESP32 Arduino `ledc*` API
//! with typed errors in place of boolean/zero return codes:
//!
//! | Arduino call          | Method                        |
//! |-----------------------|-------------------------------|
//! | `ledcAttach`          | [`Ledc::attach`]              |
//! | `ledcAttachChannel`   | [`Ledc::attach_channel`]      |
//! | `ledcWrite`           | [`Ledc::write`]               |
//! | `ledcWriteChannel`    | [`Ledc::write_channel`]       |
//! | `ledcWriteTone`       | [`Ledc::write_tone`]          |
//! | `ledcWriteNote`       | [`Ledc::write_note`]          |
//! | `ledcRead`            | [`Ledc::read`]                |
//! | `ledcReadFreq`        | [`Ledc::read_freq`]           |
//! | `ledcDetach`          | [`Ledc::detach`]              |
//! | `ledcChangeFrequency` | [`Ledc::change_frequency`]    |
//!
//! All methods take `&self` and may be called from several control threads. Channel
//! fields are written with independent atomic stores; no method waits on the audio
//! thread.
//!
//! # Explicit channel takeover
//!
//! [`Ledc::attach_channel`] on a channel that another pin is using reassigns it
//! without detaching the previous pin. That pin keeps a stale route which still
//! reaches the channel through `write`/`read` until it is detached. Stale routes are
//! listed by [`Ledc::orphaned_pins`]. Detaching any routed pin frees its channel, so
//! detaching the stale pin also silences the new owner, whose route then turns stale
//! in turn.

use crate::channel::{resolution_max, Channel, ChannelSnapshot, ChannelTable};
use crate::config::LedcConfig;
use crate::engine::MixingEngine;
use crate::notes::{note_frequency, Note};
use crate::router::PinRouter;
use crate::streaming::{AudioBackend, AudioOutput, DeviceState, NullBackend, StreamConfig};
use crate::{LedcError, Pin, Result};
use std::sync::Arc;

/// Emulated LEDC peripheral
pub struct Ledc {
    config: LedcConfig,
    channels: Arc<ChannelTable>,
    router: PinRouter,
    engine: MixingEngine,
    output: AudioOutput,
}

impl Ledc {
    /// Create a controller that will output through `backend`
    ///
    /// The backend is not opened until the first attach.
    pub fn new(config: LedcConfig, backend: Box<dyn AudioBackend>) -> Result<Self> {
        config.validate()?;
        let channels = Arc::new(ChannelTable::new(config.channel_count)?);
        let engine = MixingEngine::new(Arc::clone(&channels), config.sample_rate, config.amplitude);
        let output = AudioOutput::new(backend, StreamConfig::from(&config), engine.clone());
        Ok(Ledc {
            router: PinRouter::new(config.pin_count),
            config,
            channels,
            engine,
            output,
        })
    }

    /// Controller without audio output
    pub fn headless(config: LedcConfig) -> Result<Self> {
        Self::new(config, Box::new(NullBackend::new()))
    }

    /// Controller playing through the system default audio device
    #[cfg(feature = "streaming")]
    pub fn with_default_output(config: LedcConfig) -> Result<Self> {
        Self::new(config, Box::new(crate::streaming::RodioBackend::new()))
    }

    /// Active configuration
    pub fn config(&self) -> &LedcConfig {
        &self.config
    }

    /// Number of channels in the pool
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Shared channel table
    pub fn channels(&self) -> &Arc<ChannelTable> {
        &self.channels
    }

    /// Mixing engine over this controller's channels
    ///
    /// Rendering from it advances channel phases exactly like the audio thread does.
    pub fn engine(&self) -> MixingEngine {
        self.engine.clone()
    }

    /// Lifecycle state of the audio device
    pub fn device_state(&self) -> DeviceState {
        self.output.state()
    }

    /// Close the audio device (test teardown); channels keep their state
    pub fn shutdown(&self) {
        self.output.shutdown();
    }

    fn ensure_available(&self) -> Result<()> {
        if self.output.is_unavailable() {
            return Err(LedcError::DeviceUnavailable);
        }
        Ok(())
    }

    fn check_pin(&self, pin: Pin) -> Result<Option<usize>> {
        self.router.lookup(pin).map_err(|e| {
            log::error!("Pin {} is outside the {} addressable pins", pin, self.router.pin_count());
            e
        })
    }

    /// Attach `pin` to the lowest free channel
    ///
    /// Opens the audio device on first use. A pin that already owns a channel keeps
    /// it and is only reconfigured.
    ///
    /// # Errors
    /// - [`LedcError::InvalidResolution`] unless `1 <= resolution <= 16`
    /// - [`LedcError::InvalidPin`] for pins outside the router
    /// - [`LedcError::ResourceExhausted`] when every channel is attached
    /// - [`LedcError::DeviceUnavailable`] when the audio device failed
    pub fn attach(&self, pin: Pin, frequency: u32, resolution: u8) -> Result<usize> {
        self.ensure_available()?;
        let max_duty = resolution_max(resolution)?;
        let current = self.check_pin(pin)?;
        self.output.ensure_open()?;

        if let Some(channel) = current {
            if let Some(ch) = self.owned_channel(pin, channel) {
                ch.configure(pin, frequency as f64, max_duty);
                log::debug!(
                    "Reattached pin {} on channel {} with freq {} Hz, {}-bit resolution",
                    pin,
                    channel,
                    frequency,
                    resolution
                );
                return Ok(channel);
            }
        }

        let channel = self.channels.claim_free().ok_or_else(|| {
            log::error!("attach: No free channels available for pin {}", pin);
            LedcError::ResourceExhausted(self.channels.len())
        })?;
        self.bind(pin, channel, frequency, resolution, max_duty)?;
        Ok(channel)
    }

    /// Attach `pin` to an explicit channel
    ///
    /// A channel used by another pin is taken over; see the module docs.
    ///
    /// # Errors
    /// As [`attach`](Self::attach), plus [`LedcError::InvalidChannel`] for an index
    /// outside the pool.
    pub fn attach_channel(
        &self,
        pin: Pin,
        frequency: u32,
        resolution: u8,
        channel: usize,
    ) -> Result<usize> {
        self.ensure_available()?;
        let max_duty = resolution_max(resolution)?;
        let current = self.check_pin(pin)?;
        self.output.ensure_open()?;

        let ch = self.channels.get(channel).ok_or_else(|| {
            log::error!("attach_channel: Invalid channel {}", channel);
            LedcError::InvalidChannel(channel)
        })?;

        if ch.is_attached() {
            if let Some(previous) = ch.owner().filter(|owner| *owner != pin) {
                log::warn!(
                    "Channel {} taken over by pin {}; pin {} keeps a stale route until detached",
                    channel,
                    pin,
                    previous
                );
            }
        }

        // Moving to another channel frees the one this pin held
        if let Some(old) = current.filter(|old| *old != channel) {
            if let Some(old_ch) = self.owned_channel(pin, old) {
                old_ch.release();
                log::debug!("Pin {} released channel {}", pin, old);
            }
        }

        self.bind(pin, channel, frequency, resolution, max_duty)?;
        Ok(channel)
    }

    fn bind(
        &self,
        pin: Pin,
        channel: usize,
        frequency: u32,
        resolution: u8,
        max_duty: u32,
    ) -> Result<()> {
        let ch = self
            .channels
            .get(channel)
            .ok_or(LedcError::InvalidChannel(channel))?;
        ch.configure(pin, frequency as f64, max_duty);
        self.router.assign(pin, channel)?;
        log::debug!(
            "Attached pin {} to channel {} with freq {} Hz, {}-bit resolution",
            pin,
            channel,
            frequency,
            resolution
        );
        Ok(())
    }

    /// Channel `channel` if it is attached and owned by `pin`
    fn owned_channel(&self, pin: Pin, channel: usize) -> Option<&Channel> {
        self.channels
            .get(channel)
            .filter(|ch| ch.is_attached() && ch.owner() == Some(pin))
    }

    fn attached_channel(&self, channel: usize) -> Result<&Channel> {
        self.channels
            .get(channel)
            .filter(|ch| ch.is_attached())
            .ok_or_else(|| {
                log::error!("Invalid or unattached channel {}", channel);
                LedcError::InvalidChannel(channel)
            })
    }

    /// Channel routed from `pin`, failing when the pin is not attached
    fn route(&self, pin: Pin) -> Result<usize> {
        self.ensure_available()?;
        let channel = self.check_pin(pin)?.ok_or_else(|| {
            log::error!("Pin {} not attached to any channel", pin);
            LedcError::PinNotAttached(pin)
        })?;
        if let Some(ch) = self.channels.get(channel) {
            if ch.owner() != Some(pin) {
                log::warn!(
                    "Pin {} uses a stale route to channel {} (owner: {:?})",
                    pin,
                    channel,
                    ch.owner()
                );
            }
        }
        Ok(channel)
    }

    /// Set the duty of the channel attached to `pin`
    pub fn write(&self, pin: Pin, duty: u32) -> Result<()> {
        let channel = self.route(pin)?;
        self.write_channel(channel, duty)
    }

    /// Set the duty of an attached channel
    ///
    /// The duty is stored as given, even above the channel's `resolution_max`. A
    /// nonzero duty starts the audio stream if it is not running yet.
    ///
    /// # Errors
    /// [`LedcError::InvalidChannel`] if `channel` is out of range or not attached.
    pub fn write_channel(&self, channel: usize, duty: u32) -> Result<()> {
        self.ensure_available()?;
        let ch = self.attached_channel(channel)?;
        ch.set_duty(duty);
        if duty > 0 {
            self.output.ensure_running()?;
        }
        Ok(())
    }

    /// Play a 50% duty square wave at `frequency` on `pin` (0 silences it)
    ///
    /// Returns the frequency applied.
    pub fn write_tone(&self, pin: Pin, frequency: u32) -> Result<u32> {
        let channel = self.route(pin)?;
        let ch = self.attached_channel(channel)?;
        ch.set_frequency(frequency as f64);
        let duty = if frequency > 0 {
            ch.resolution_max() / 2
        } else {
            0
        };
        self.write_channel(channel, duty)?;
        Ok(frequency)
    }

    /// Play `note` in `octave` (0..=8) on `pin`
    ///
    /// Returns the frequency applied; A4 is 440 Hz.
    ///
    /// # Errors
    /// [`LedcError::InvalidNote`] for octaves above 8, then as
    /// [`write_tone`](Self::write_tone).
    pub fn write_note(&self, pin: Pin, note: Note, octave: u8) -> Result<u32> {
        self.ensure_available()?;
        let frequency = note_frequency(note, octave)?;
        self.write_tone(pin, frequency)
    }

    /// [`write_note`](Self::write_note) with a raw note index (0 = C … 11 = B)
    pub fn write_note_index(&self, pin: Pin, note: u8, octave: u8) -> Result<u32> {
        let note = Note::from_index(note).map_err(|_| LedcError::InvalidNote { note, octave })?;
        self.write_note(pin, note, octave)
    }

    /// Current duty on `pin`, 0 when the pin is not attached
    pub fn read(&self, pin: Pin) -> u32 {
        self.mapped_channel(pin).map(Channel::duty).unwrap_or(0)
    }

    /// Current frequency on `pin` in whole Hz, 0 when the pin is not attached
    pub fn read_freq(&self, pin: Pin) -> u32 {
        self.mapped_channel(pin)
            .map(|ch| ch.frequency() as u32)
            .unwrap_or(0)
    }

    fn mapped_channel(&self, pin: Pin) -> Option<&Channel> {
        if self.output.is_unavailable() {
            return None;
        }
        let channel = self.router.lookup(pin).ok().flatten()?;
        self.channels.get(channel)
    }

    /// Detach `pin`, silencing and freeing its channel
    ///
    /// Always succeeds. Returns the channel the pin was routed to, or `None` when it
    /// was not attached.
    pub fn detach(&self, pin: Pin) -> Option<usize> {
        let channel = match self.router.clear(pin) {
            Ok(Some(channel)) => channel,
            Ok(None) => return None,
            Err(_) => {
                log::debug!("detach: pin {} is outside the pin table", pin);
                return None;
            }
        };

        if let Some(ch) = self.channels.get(channel) {
            if let Some(owner) = ch.owner().filter(|owner| *owner != pin) {
                log::warn!(
                    "Detaching stale pin {} frees channel {} still used by pin {}",
                    pin,
                    channel,
                    owner
                );
            }
            ch.release();
            log::debug!("Detached pin {} from channel {}", pin, channel);
        }
        Some(channel)
    }

    /// Change frequency and duty resolution of `pin` without touching duty or phase
    ///
    /// Returns the frequency applied.
    pub fn change_frequency(&self, pin: Pin, frequency: u32, resolution: u8) -> Result<u32> {
        self.ensure_available()?;
        let max_duty = resolution_max(resolution)?;
        let channel = self.route(pin)?;
        let ch = self.attached_channel(channel)?;
        ch.set_frequency(frequency as f64);
        ch.set_resolution_max(max_duty);
        log::debug!(
            "Changed pin {} (channel {}) to freq {} Hz, {}-bit resolution",
            pin,
            channel,
            frequency,
            resolution
        );
        if frequency > 0 {
            self.output.ensure_running()?;
        }
        Ok(frequency)
    }

    /// Channel routed from `pin`, if any
    pub fn channel_of(&self, pin: Pin) -> Option<usize> {
        self.router.lookup(pin).ok().flatten()
    }

    /// Copy of every channel's state
    pub fn snapshot(&self) -> Vec<ChannelSnapshot> {
        self.channels.snapshot()
    }

    /// Pins whose route points at a channel they no longer own
    ///
    /// Returns `(pin, channel)` pairs.
    pub fn orphaned_pins(&self) -> Vec<(Pin, usize)> {
        self.router
            .routes()
            .filter(|(pin, channel)| {
                self.channels
                    .get(*channel)
                    .map_or(true, |ch| ch.owner() != Some(*pin))
            })
            .collect()
    }
}
