//! Split real-FFT primitive.
//!
//! The spec names the "forward split real-FFT" / "inverse split real-FFT"
//! pair over a precomputed twiddle table as an external collaborator (the
//! original links against a bespoke `fft.c`; the teacher library's own
//! `fft.rs` wraps `microfft`, which only supports compile-time-fixed array
//! lengths and can't be reconfigured at runtime). Since `size` here is a
//! runtime value that changes on `reconfigure`, this module instead wraps
//! `realfft`/`rustfft` — both already declared in the teacher's
//! `Cargo.toml` — behind the exact unpacked format the spec describes:
//! `real[k]`/`imag[k]` for `k in [0, hsize)`, Nyquist dropped on analysis
//! and zeroed on resynthesis (§9, Open Question — Nyquist bin).
//!
//! `realfft`/`rustfft` use the unnormalized DFT convention (forward and
//! inverse are scaled so that `inverse(forward(x)) == size * x`); the spec
//! assumes the forward/inverse pair are exact inverses of each other (no
//! scale factor besides the explicit `ampScale = 1/sqrt(olaps)` applied
//! during overlap-add), so [`SplitRealFft::inverse`] divides by `size` to
//! restore that contract.

use num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// A reusable forward/inverse real-FFT pair for a fixed, power-of-two
/// transform length. Scratch buffers are allocated once at construction
/// (or reconfiguration) so that [`SplitRealFft::forward`] and
/// [`SplitRealFft::inverse`] never allocate.
pub struct SplitRealFft {
    size: usize,
    hsize: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    forward_scratch: Vec<Complex32>,
    inverse_scratch: Vec<Complex32>,
    /// Scratch holding the `hsize + 1` complex bins (including Nyquist)
    /// that `realfft` operates on; bin `hsize` is always kept at zero on
    /// the way in and simply discarded on the way out.
    bins: Vec<Complex32>,
}

impl SplitRealFft {
    /// Build a split real-FFT for transform length `size`. `size` must be
    /// a power of two (callers snap it beforehand via
    /// [`crate::math::next_power_of_two`]).
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two() && size >= 4);
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(size);
        let c2r = planner.plan_fft_inverse(size);
        let forward_scratch = r2c.make_scratch_vec();
        let inverse_scratch = c2r.make_scratch_vec();
        let hsize = size >> 1;
        Self {
            size,
            hsize,
            bins: vec![Complex32::default(); hsize + 1],
            r2c,
            c2r,
            forward_scratch,
            inverse_scratch,
        }
    }

    /// FFT length.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of non-redundant bins excluding Nyquist (`size / 2`).
    #[inline]
    pub fn hsize(&self) -> usize {
        self.hsize
    }

    /// Forward transform. `time` must have length `size` (it is consumed
    /// as scratch by `realfft` and its contents are undefined afterward).
    /// Writes `real[k]`/`imag[k]` for `k in [0, hsize)`.
    pub fn forward(&mut self, time: &mut [f32], real: &mut [f32], imag: &mut [f32]) {
        debug_assert_eq!(time.len(), self.size);
        debug_assert_eq!(real.len(), self.hsize);
        debug_assert_eq!(imag.len(), self.hsize);
        self.r2c
            .process_with_scratch(time, &mut self.bins, &mut self.forward_scratch)
            .expect("realfft forward transform size mismatch");
        for k in 0..self.hsize {
            real[k] = self.bins[k].re;
            imag[k] = self.bins[k].im;
        }
    }

    /// Inverse transform. `real`/`imag` must have length `hsize`; `time`
    /// must have length `size` and receives the reconstructed samples.
    /// Bin `hsize` (Nyquist) is synthesized as zero, matching the
    /// reference's `inframe[hsize] = 0.0` repack step.
    pub fn inverse(&mut self, real: &[f32], imag: &[f32], time: &mut [f32]) {
        debug_assert_eq!(real.len(), self.hsize);
        debug_assert_eq!(imag.len(), self.hsize);
        debug_assert_eq!(time.len(), self.size);
        for k in 0..self.hsize {
            self.bins[k] = Complex32::new(real[k], imag[k]);
        }
        self.bins[self.hsize] = Complex32::default();
        self.c2r
            .process_with_scratch(&mut self.bins, time, &mut self.inverse_scratch)
            .expect("realfft inverse transform size mismatch");
        let scale = 1.0 / self.size as f32;
        for sample in time.iter_mut() {
            *sample *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_reconstructs_input() {
        let size = 1024;
        let mut fft = SplitRealFft::new(size);
        let mut time: Vec<f32> = (0..size)
            .map(|i| (i as f32 * 0.01).sin() + 0.3 * (i as f32 * 0.2).cos())
            .collect();
        let original = time.clone();

        let mut real = vec![0.0f32; size / 2];
        let mut imag = vec![0.0f32; size / 2];
        fft.forward(&mut time, &mut real, &mut imag);

        let mut reconstructed = vec![0.0f32; size];
        fft.inverse(&real, &imag, &mut reconstructed);

        for (a, b) in original.iter().zip(reconstructed.iter()) {
            assert!((a - b).abs() < 1e-3, "expected {a}, got {b}");
        }
    }

    #[test]
    fn dc_input_lands_entirely_in_bin_zero() {
        let size = 256;
        let mut fft = SplitRealFft::new(size);
        let mut time = vec![1.0f32; size];
        let mut real = vec![0.0f32; size / 2];
        let mut imag = vec![0.0f32; size / 2];
        fft.forward(&mut time, &mut real, &mut imag);

        assert!((real[0] - size as f32).abs() < 1e-2);
        for k in 1..real.len() {
            assert!(real[k].abs() < 1e-2);
            assert!(imag[k].abs() < 1e-2);
        }
    }
}
