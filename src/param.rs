//! Scalar-or-audio-rate parameter cells.
//!
//! Grounded on `fundsp::shared::Shared`: a lock-free atomic float cell that
//! a control thread can write and the audio thread can read every sample
//! with no locking. The reference implementation represents this duality
//! (a Python float vs. a `Stream` object) by branching at the *node* level
//! into `_ii`/`_ai`/`_ia`/`_aa` function-pointer variants selected by a
//! `modebuffer` bitmask (one bit per parameter); here it is a single tagged
//! union read inline, per the design note in SPEC_FULL.md §9.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A float cell shared between a control surface and the audio thread.
///
/// Mirrors `fundsp::shared::Shared`: stores an `f32` bit-packed into an
/// `AtomicU32` behind an `Arc`, so cloning a `Shared` yields another handle
/// onto the same cell rather than a copy of the value.
#[derive(Clone)]
pub struct Shared {
    bits: Arc<AtomicU32>,
}

impl Shared {
    /// Create a new cell initialized to `value`.
    pub fn new(value: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    /// Set the cell's value. Safe to call from any thread.
    #[inline]
    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Read the cell's current value. Safe to call from any thread.
    #[inline]
    pub fn value(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A node parameter that is either a fixed scalar or an audio-rate stream.
///
/// Audio-rate values are supplied as a per-sample [`Shared`] cell rather
/// than a borrowed slice: the parameter's producer (e.g. an envelope or
/// another node) is expected to write into the cell once per sample, and
/// consumers read it back inline. This keeps every `Param` value `'static`
/// and cheaply `Clone`, matching how `fundsp` nodes hold `Shared` handles
/// rather than buffer references.
#[derive(Clone)]
pub enum Param {
    /// A fixed value, unchanging until replaced.
    Const(f32),
    /// An audio-rate value, resampled every time it is read.
    Stream(Shared),
}

impl Param {
    /// Read the parameter's current value.
    #[inline]
    pub fn value(&self) -> f32 {
        match self {
            Param::Const(v) => *v,
            Param::Stream(shared) => shared.value(),
        }
    }
}

impl From<f32> for Param {
    fn from(value: f32) -> Self {
        Param::Const(value)
    }
}

impl From<Shared> for Param {
    fn from(shared: Shared) -> Self {
        Param::Stream(shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_param_reads_back_value() {
        let p = Param::Const(0.75);
        assert_eq!(p.value(), 0.75);
    }

    #[test]
    fn stream_param_tracks_shared_cell() {
        let shared = Shared::new(1.0);
        let p = Param::from(shared.clone());
        assert_eq!(p.value(), 1.0);
        shared.set(2.5);
        assert_eq!(p.value(), 2.5);
    }

    #[test]
    fn shared_clone_aliases_same_cell() {
        let a = Shared::new(0.0);
        let b = a.clone();
        a.set(42.0);
        assert_eq!(b.value(), 42.0);
    }
}
