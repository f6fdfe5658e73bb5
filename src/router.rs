//! Pin router
//!
//! Maps an external pin (GPIO number) to the channel driving it. The table has a fixed
//! number of slots; pins beyond it are rejected. Only control threads touch the
//! router, but entries are atomics so a shared [`crate::Ledc`] stays `Sync` without
//! a lock.

use crate::{LedcError, Pin, Result};
use std::sync::atomic::{AtomicU16, Ordering};

/// Default number of addressable pins
pub const DEFAULT_PIN_COUNT: usize = 256;

const UNASSIGNED: u16 = u16::MAX;

/// Fixed-size pin-to-channel map
#[derive(Debug)]
pub struct PinRouter {
    slots: Box<[AtomicU16]>,
}

impl PinRouter {
    /// Create a router addressing pins `0..pin_count`
    pub fn new(pin_count: usize) -> Self {
        PinRouter {
            slots: (0..pin_count).map(|_| AtomicU16::new(UNASSIGNED)).collect(),
        }
    }

    /// Number of addressable pins
    #[inline]
    pub fn pin_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, pin: Pin) -> Result<&AtomicU16> {
        self.slots
            .get(pin as usize)
            .ok_or(LedcError::InvalidPin(pin))
    }

    /// Channel mapped to `pin`, if any
    ///
    /// # Errors
    /// Returns [`LedcError::InvalidPin`] for pins outside the table.
    pub fn lookup(&self, pin: Pin) -> Result<Option<usize>> {
        Ok(match self.slot(pin)?.load(Ordering::Acquire) {
            UNASSIGNED => None,
            channel => Some(channel as usize),
        })
    }

    /// Route `pin` to `channel`, replacing any previous route
    pub fn assign(&self, pin: Pin, channel: usize) -> Result<()> {
        self.slot(pin)?.store(channel as u16, Ordering::Release);
        Ok(())
    }

    /// Remove the route of `pin`, returning the channel it pointed to
    pub fn clear(&self, pin: Pin) -> Result<Option<usize>> {
        Ok(match self.slot(pin)?.swap(UNASSIGNED, Ordering::AcqRel) {
            UNASSIGNED => None,
            channel => Some(channel as usize),
        })
    }

    /// Iterate over every assigned `(pin, channel)` pair
    pub fn routes(&self) -> impl Iterator<Item = (Pin, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(pin, slot)| match slot.load(Ordering::Acquire) {
                UNASSIGNED => None,
                channel => Some((pin as Pin, channel as usize)),
            })
    }
}

impl Default for PinRouter {
    fn default() -> Self {
        Self::new(DEFAULT_PIN_COUNT)
    }
}
