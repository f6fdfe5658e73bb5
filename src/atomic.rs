//! Atomic floating point cell
//!
//! The standard library has no atomic float, so `f64` values are stored as their
//! IEEE-754 bit pattern inside an [`AtomicU64`]. Loads and stores are plain atomic
//! moves and never block.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free `f64` cell
#[derive(Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    /// Create a new cell holding `value`
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    /// Load the current value
    #[inline]
    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.bits.load(order))
    }

    /// Store a new value
    #[inline]
    pub fn store(&self, value: f64, order: Ordering) {
        self.bits.store(value.to_bits(), order);
    }
}

impl fmt::Debug for AtomicF64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(Ordering::Relaxed), f)
    }
}
