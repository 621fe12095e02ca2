//! Window-function table generation.
//!
//! The spec treats the window-function generator as an external
//! collaborator (the original pulls shapes from a separate `wind.c`
//! indexed by an integer `wintype`). This module is a concrete, minimal
//! stand-in covering the window kinds actually exercised by the default
//! (`wintype = 2`) and by the end-to-end test scenarios, so the crate
//! builds and tests standalone; an embedder with its own window-table
//! generator can bypass it entirely by constructing [`Analyzer`] /
//! [`Synthesizer`] from a raw `&[f32]` window.
//!
//! [`Analyzer`]: crate::analyzer::Analyzer
//! [`Synthesizer`]: crate::synthesizer::Synthesizer

use crate::math::TAU;

/// Named window shapes, indexed the way the external contract in §6 does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Rectangular,
    Hamming,
    /// The default (`wintype = 2`).
    Hann,
    Bartlett,
    Blackman,
}

impl WindowKind {
    /// Resolve an external integer window-type index. Unknown indices fall
    /// back to [`WindowKind::Hann`] (the documented default) with an
    /// advisory log, matching the configuration-snap error category rather
    /// than panicking.
    pub fn from_index(index: i32) -> Self {
        match index {
            0 => WindowKind::Rectangular,
            1 => WindowKind::Hamming,
            2 => WindowKind::Hann,
            3 => WindowKind::Bartlett,
            4 => WindowKind::Blackman,
            other => {
                log::warn!(
                    "unknown window type {other}, falling back to Hann (wintype = 2)"
                );
                WindowKind::Hann
            }
        }
    }
}

impl Default for WindowKind {
    fn default() -> Self {
        WindowKind::Hann
    }
}

/// Generate a window table of length `size`.
///
/// `size` must be a power of two (callers are expected to have already
/// snapped it via [`crate::math::next_power_of_two`]); this function does
/// not itself validate that, since it is always called from node
/// reconfiguration after the snap has already happened.
pub fn generate(kind: WindowKind, size: usize) -> Vec<f32> {
    match kind {
        WindowKind::Rectangular => vec![1.0; size],
        WindowKind::Hamming => (0..size)
            .map(|i| 0.54 - 0.46 * cos_frac(i, size))
            .collect(),
        WindowKind::Hann => (0..size)
            .map(|i| 0.5 - 0.5 * cos_frac(i, size))
            .collect(),
        WindowKind::Bartlett => (0..size)
            .map(|i| {
                let n = size as f32 - 1.0;
                1.0 - (2.0 * (i as f32 - n / 2.0) / n).abs()
            })
            .collect(),
        WindowKind::Blackman => (0..size)
            .map(|i| {
                let a0 = 0.42;
                let a1 = 0.5;
                let a2 = 0.08;
                a0 - a1 * cos_frac(i, size) + a2 * cos_frac_2(i, size)
            })
            .collect(),
    }
}

/// `cos(2*pi*i/(size-1))`, the common term in raised-cosine windows.
#[inline]
fn cos_frac(i: usize, size: usize) -> f32 {
    (TAU * i as f32 / (size as f32 - 1.0)).cos()
}

/// `cos(4*pi*i/(size-1))`, the second harmonic term used by Blackman.
#[inline]
fn cos_frac_2(i: usize, size: usize) -> f32 {
    (2.0 * TAU * i as f32 / (size as f32 - 1.0)).cos()
}
