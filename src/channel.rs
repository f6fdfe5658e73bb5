//! Channel table
//!
//! A fixed pool of LEDC channels. Each channel keeps every field in its own atomic
//! cell so the audio thread can read (and advance the phase of) a channel while a
//! control thread rewrites its duty or frequency. Fields are independent: a reader may
//! observe a new frequency slightly before or after the matching duty update, which
//! mirrors the weak consistency of the real peripheral registers.
//!
//! Duty values are stored unclamped. Writing a duty above `resolution_max` is
//! accepted and only changes what [`Channel::duty`] reports; the mixer treats any
//! nonzero duty as "audible".

use crate::atomic::AtomicF64;
use crate::{LedcError, Pin, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Maximum number of channels in a pool (ESP32 LEDC has 16)
pub const MAX_CHANNELS: usize = 16;

/// Duty resolution used when nothing else is requested
pub const DEFAULT_RESOLUTION_BITS: u8 = 10;

/// Widest duty resolution accepted
pub const MAX_RESOLUTION_BITS: u8 = 16;

const NO_OWNER: u32 = u32::MAX;

/// Compute the 100% duty value for a resolution in bits (`2^bits - 1`)
///
/// # Errors
/// Returns [`LedcError::InvalidResolution`] outside `1..=16`.
pub fn resolution_max(bits: u8) -> Result<u32> {
    if !(1..=MAX_RESOLUTION_BITS).contains(&bits) {
        return Err(LedcError::InvalidResolution(bits));
    }
    Ok((1u32 << bits) - 1)
}

/// State of a single LEDC channel
#[derive(Debug)]
pub struct Channel {
    frequency: AtomicF64,
    /// Written by the mixing engine only
    phase: AtomicF64,
    duty: AtomicU32,
    resolution_max: AtomicU32,
    attached: AtomicBool,
    owner: AtomicU32,
}

impl Channel {
    fn new() -> Self {
        Channel {
            frequency: AtomicF64::new(0.0),
            phase: AtomicF64::new(0.0),
            duty: AtomicU32::new(0),
            resolution_max: AtomicU32::new((1 << DEFAULT_RESOLUTION_BITS) - 1),
            attached: AtomicBool::new(false),
            owner: AtomicU32::new(NO_OWNER),
        }
    }

    /// Whether the channel is currently attached to a pin
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Current square-wave frequency in Hz
    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency.load(Ordering::Relaxed)
    }

    /// Current oscillator phase in `[0, 1)`
    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase.load(Ordering::Relaxed)
    }

    /// Current duty value
    #[inline]
    pub fn duty(&self) -> u32 {
        self.duty.load(Ordering::Relaxed)
    }

    /// Duty value corresponding to 100%
    #[inline]
    pub fn resolution_max(&self) -> u32 {
        self.resolution_max.load(Ordering::Relaxed)
    }

    /// Pin that last attached this channel
    pub fn owner(&self) -> Option<Pin> {
        match self.owner.load(Ordering::Relaxed) {
            NO_OWNER => None,
            pin => Some(pin as Pin),
        }
    }

    /// Try to take a free channel. Succeeds for exactly one caller.
    pub(crate) fn claim(&self) -> bool {
        self.attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Bind the channel to `owner` with a frequency and resolution.
    ///
    /// Duty and phase are left untouched.
    pub(crate) fn configure(&self, owner: Pin, frequency: f64, resolution_max: u32) {
        self.owner.store(owner as u32, Ordering::Relaxed);
        self.resolution_max.store(resolution_max, Ordering::Relaxed);
        self.frequency.store(frequency, Ordering::Relaxed);
        self.attached.store(true, Ordering::Release);
    }

    pub(crate) fn set_duty(&self, duty: u32) {
        self.duty.store(duty, Ordering::Relaxed);
    }

    pub(crate) fn set_frequency(&self, frequency: f64) {
        self.frequency.store(frequency, Ordering::Relaxed);
    }

    pub(crate) fn set_resolution_max(&self, resolution_max: u32) {
        self.resolution_max.store(resolution_max, Ordering::Relaxed);
    }

    pub(crate) fn set_phase(&self, phase: f64) {
        self.phase.store(phase, Ordering::Relaxed);
    }

    /// Silence the channel and return it to the free pool.
    pub(crate) fn release(&self) {
        self.duty.store(0, Ordering::Relaxed);
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.attached.store(false, Ordering::Release);
    }

    fn snapshot(&self, index: usize) -> ChannelSnapshot {
        ChannelSnapshot {
            index,
            attached: self.is_attached(),
            owner: self.owner(),
            frequency: self.frequency(),
            phase: self.phase(),
            duty: self.duty(),
            resolution_max: self.resolution_max(),
        }
    }
}

/// Point-in-time copy of a channel for diagnostics
///
/// Fields are loaded one by one, so a snapshot taken while another thread is writing
/// may mix old and new values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    /// Channel index in the pool
    pub index: usize,
    /// Whether the channel is attached
    pub attached: bool,
    /// Pin that attached the channel
    pub owner: Option<Pin>,
    /// Frequency in Hz
    pub frequency: f64,
    /// Oscillator phase in `[0, 1)`
    pub phase: f64,
    /// Duty value
    pub duty: u32,
    /// Duty value corresponding to 100%
    pub resolution_max: u32,
}

impl ChannelSnapshot {
    /// Whether the mixer would currently produce sound for this channel
    pub fn is_audible(&self) -> bool {
        self.attached && self.duty > 0 && self.frequency > 0.0
    }
}

/// Preallocated pool of channels
#[derive(Debug)]
pub struct ChannelTable {
    channels: Box<[Channel]>,
}

impl ChannelTable {
    /// Create a pool of `count` free channels.
    ///
    /// # Errors
    /// Returns [`LedcError::ConfigError`] unless `1 <= count <= MAX_CHANNELS`.
    pub fn new(count: usize) -> Result<Self> {
        if !(1..=MAX_CHANNELS).contains(&count) {
            return Err(LedcError::ConfigError(format!(
                "channel count must be between 1 and {}, got {}",
                MAX_CHANNELS, count
            )));
        }
        Ok(ChannelTable {
            channels: (0..count).map(|_| Channel::new()).collect(),
        })
    }

    /// Number of channels in the pool
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always false; a pool has at least one channel
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Get a channel by index
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Iterate over all channels in index order
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Claim the lowest-index free channel.
    ///
    /// Concurrent callers never receive the same channel.
    pub fn claim_free(&self) -> Option<usize> {
        self.channels.iter().position(|ch| ch.claim())
    }

    /// Number of attached channels
    pub fn attached_count(&self) -> usize {
        self.channels.iter().filter(|ch| ch.is_attached()).count()
    }

    /// Copy out the state of every channel
    pub fn snapshot(&self) -> Vec<ChannelSnapshot> {
        self.channels
            .iter()
            .enumerate()
            .map(|(index, ch)| ch.snapshot(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_max() {
        assert_eq!(resolution_max(1).unwrap(), 1);
        assert_eq!(resolution_max(10).unwrap(), 1023);
        assert_eq!(resolution_max(16).unwrap(), 65535);
        assert!(matches!(
            resolution_max(0),
            Err(LedcError::InvalidResolution(0))
        ));
        assert!(matches!(
            resolution_max(17),
            Err(LedcError::InvalidResolution(17))
        ));
    }

    #[test]
    fn test_table_size_bounds() {
        assert!(ChannelTable::new(0).is_err());
        assert!(ChannelTable::new(MAX_CHANNELS + 1).is_err());
        assert_eq!(ChannelTable::new(MAX_CHANNELS).unwrap().len(), 16);
    }

    #[test]
    fn test_claim_lowest_free() {
        let table = ChannelTable::new(4).unwrap();
        assert_eq!(table.claim_free(), Some(0));
        assert_eq!(table.claim_free(), Some(1));

        table.get(0).unwrap().release();
        assert_eq!(table.claim_free(), Some(0));
        assert_eq!(table.claim_free(), Some(2));
        assert_eq!(table.claim_free(), Some(3));
        assert_eq!(table.claim_free(), None);
        assert_eq!(table.attached_count(), 4);
    }

    #[test]
    fn test_release_resets_duty_and_owner() {
        let table = ChannelTable::new(1).unwrap();
        let ch = table.get(0).unwrap();
        ch.configure(25, 1000.0, 1023);
        ch.set_duty(511);
        assert_eq!(ch.owner(), Some(25));

        ch.release();
        assert!(!ch.is_attached());
        assert_eq!(ch.duty(), 0);
        assert_eq!(ch.owner(), None);
        // Frequency survives detach; it is overwritten on the next attach
        assert_eq!(ch.frequency(), 1000.0);
    }

    #[test]
    fn test_configure_keeps_phase() {
        let table = ChannelTable::new(1).unwrap();
        let ch = table.get(0).unwrap();
        ch.set_phase(0.75);
        ch.configure(3, 220.0, 255);
        assert_eq!(ch.phase(), 0.75);
        assert_eq!(ch.resolution_max(), 255);
    }

    #[test]
    fn test_snapshot_audible() {
        let table = ChannelTable::new(2).unwrap();
        table.get(1).unwrap().configure(7, 440.0, 1023);
        table.get(1).unwrap().set_duty(1);

        let snap = table.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(!snap[0].is_audible());
        assert!(snap[1].is_audible());
        assert_eq!(snap[1].owner, Some(7));
    }
}
