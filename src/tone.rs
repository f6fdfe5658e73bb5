//! Arduino-style `tone()` / `noTone()`
//!
//! Built purely on the [`Ledc`] channel API. Timed tones sleep the calling thread
//! only; the audio thread keeps rendering while the caller waits. Once a timed tone
//! has started sleeping it cannot be cancelled.

use crate::{Ledc, Pin, Result};
use std::thread;
use std::time::Duration;

/// Block the calling thread for `ms` milliseconds
pub fn delay_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

/// Tone generator over a [`Ledc`] controller
#[derive(Clone, Copy)]
pub struct Tone<'a> {
    ledc: &'a Ledc,
    resolution: u8,
    channel: Option<usize>,
}

impl<'a> Tone<'a> {
    /// Tone generator using the controller's configured tone resolution
    pub fn new(ledc: &'a Ledc) -> Self {
        Tone {
            ledc,
            resolution: ledc.config().tone_resolution,
            channel: None,
        }
    }

    /// Route tones to a fixed channel, or `None` for automatic allocation
    pub fn set_tone_channel(&mut self, channel: Option<usize>) {
        self.channel = channel;
    }

    /// Fixed tone channel, if any
    pub fn tone_channel(&self) -> Option<usize> {
        self.channel
    }

    /// Start a square wave at `frequency` on `pin`
    ///
    /// With a nonzero `duration` the call blocks for that long and then stops the
    /// tone with [`no_tone`](Self::no_tone). Without one the tone keeps playing until
    /// `no_tone` is called.
    pub fn tone(&self, pin: Pin, frequency: u32, duration: Option<Duration>) -> Result<u32> {
        match self.channel {
            Some(channel) => self
                .ledc
                .attach_channel(pin, frequency, self.resolution, channel)?,
            None => self.ledc.attach(pin, frequency, self.resolution)?,
        };
        let applied = self.ledc.write_tone(pin, frequency)?;

        if let Some(duration) = duration.filter(|d| !d.is_zero()) {
            thread::sleep(duration);
            self.no_tone(pin);
        }
        Ok(applied)
    }

    /// Silence `pin` and release its channel
    pub fn no_tone(&self, pin: Pin) {
        if self.ledc.channel_of(pin).is_some() {
            // Detach below frees the channel even if silencing fails
            let _ = self.ledc.write_tone(pin, 0);
        }
        self.ledc.detach(pin);
    }

    /// Play `frequency` for `duration_ms`, or rest (silence) when `frequency` is 0
    pub fn play_tone(&self, pin: Pin, frequency: u32, duration_ms: u64) -> Result<()> {
        if frequency == 0 {
            log::debug!("Pausing for {}ms", duration_ms);
            self.no_tone(pin);
            delay_ms(duration_ms);
            return Ok(());
        }

        log::debug!("Playing {}Hz for {}ms", frequency, duration_ms);
        self.tone(pin, frequency, Some(Duration::from_millis(duration_ms)))?;
        Ok(())
    }
}
