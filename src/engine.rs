//! Mixing engine
//!
//! Runs on the audio thread. Each call renders one buffer: every attached channel with
//! a nonzero duty and a positive frequency contributes a bipolar square wave of fixed
//! amplitude. Channels are summed without normalization, so several loud channels can
//! clip.
//!
//! The engine only performs atomic loads and stores on the channel table and never
//! allocates, locks or logs.

use crate::channel::ChannelTable;
use std::sync::Arc;

/// Square-wave mixer over a shared channel table
#[derive(Debug, Clone)]
pub struct MixingEngine {
    channels: Arc<ChannelTable>,
    sample_rate: f64,
    amplitude: f32,
}

impl MixingEngine {
    /// Create an engine rendering `channels` at `sample_rate`
    pub fn new(channels: Arc<ChannelTable>, sample_rate: u32, amplitude: f32) -> Self {
        MixingEngine {
            channels,
            sample_rate: sample_rate as f64,
            amplitude,
        }
    }

    /// Channel table read by this engine
    pub fn channels(&self) -> &Arc<ChannelTable> {
        &self.channels
    }

    /// Fill `output` with the mix of all audible channels (mono)
    pub fn render(&self, output: &mut [f32]) {
        output.fill(0.0);

        for channel in self.channels.iter() {
            if !channel.is_attached() || channel.duty() == 0 {
                continue;
            }
            let frequency = channel.frequency();
            if frequency <= 0.0 {
                continue;
            }

            let increment = frequency / self.sample_rate;
            let mut phase = channel.phase();
            for sample in output.iter_mut() {
                if phase < 0.5 {
                    *sample += self.amplitude;
                } else {
                    *sample -= self.amplitude;
                }
                phase += increment;
                if phase >= 1.0 {
                    // floor() keeps the phase in [0, 1) even above the sample rate
                    phase -= phase.floor();
                }
            }
            channel.set_phase(phase);
        }
    }
}
