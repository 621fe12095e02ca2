//! The STFT analyzer (§4.2): windows incoming audio, runs a forward split
//! real-FFT per hop, and turns the raw spectrum into per-bin magnitude and
//! true instantaneous frequency, published on a [`SpectralFrameBus`].
//!
//! Grounded on `fundsp`'s own block-based nodes (e.g. `granular.rs`,
//! `resynth.rs`) for the shape of a node that owns fixed-size scratch
//! buffers allocated once at construction/reconfigure and mutated in place
//! during `process`; the phase-unwrapping/true-frequency math itself has no
//! analogue in the teacher crate and is transcribed from SPEC_FULL.md §4.2.

use crate::bus::SpectralFrameBus;
use crate::error::{validate_size_olaps, BindError};
use crate::math::{next_power_of_two, wrap_phase, TAU};
use crate::node::Node;
use crate::splitfft::SplitRealFft;
use crate::window::{self, WindowKind};

/// Windowed STFT analyzer. Consumes one audio block at a time via
/// [`Analyzer::process_block`] and publishes instantaneous-frequency
/// frames on its [`SpectralFrameBus`] as they complete.
pub struct Analyzer {
    sample_rate: f64,
    size: usize,
    olaps: usize,
    hopsize: usize,
    hsize: usize,
    input_latency: usize,
    wintype: WindowKind,
    window: Vec<f32>,
    fft: SplitRealFft,

    input_buffer: Vec<f32>,
    inframe: Vec<f32>,
    real: Vec<f32>,
    imag: Vec<f32>,
    last_phase: Vec<f32>,
    incount: usize,
    overcount: usize,

    bus: SpectralFrameBus,
}

impl Analyzer {
    /// Construct a new analyzer. `size` and `olaps` are snapped up to the
    /// next power of two (with an advisory log) before the
    /// `size >= 2 * olaps` invariant is checked; a request that still
    /// violates the invariant after snapping is the one residual bind-time
    /// failure (§7.2).
    pub fn new(
        sample_rate: f64,
        block_size: usize,
        size: usize,
        olaps: usize,
        wintype: WindowKind,
    ) -> Result<Self, BindError> {
        let size = snap(size, "size");
        let olaps = snap(olaps, "olaps");
        validate_size_olaps(size, olaps)?;

        let hopsize = size / olaps;
        let hsize = size / 2;
        let input_latency = size - hopsize;

        Ok(Self {
            sample_rate,
            size,
            olaps,
            hopsize,
            hsize,
            input_latency,
            wintype,
            window: window::generate(wintype, size),
            fft: SplitRealFft::new(size),
            input_buffer: vec![0.0; size],
            inframe: vec![0.0; size],
            real: vec![0.0; hsize],
            imag: vec![0.0; hsize],
            last_phase: vec![0.0; hsize],
            incount: input_latency,
            overcount: 0,
            bus: SpectralFrameBus::new(size, olaps, block_size),
        })
    }

    /// The bus this analyzer publishes frames on. Clone it to bind a
    /// downstream transformer or synthesizer.
    pub fn bus(&self) -> SpectralFrameBus {
        self.bus.clone()
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn olaps(&self) -> usize {
        self.olaps
    }

    #[inline]
    pub fn input_latency(&self) -> usize {
        self.input_latency
    }

    /// Reconfigure to a new `(size, olaps, wintype)`. Reallocates every
    /// scratch buffer and the published bus; never called from inside
    /// `process_block` (§5: reconfiguration is strictly between blocks).
    pub fn reconfigure(
        &mut self,
        block_size: usize,
        size: usize,
        olaps: usize,
        wintype: WindowKind,
    ) -> Result<(), BindError> {
        let size = snap(size, "size");
        let olaps = snap(olaps, "olaps");
        validate_size_olaps(size, olaps)?;

        log::debug!(
            "analyzer reconfigure: size {} -> {size}, olaps {} -> {olaps}",
            self.size, self.olaps
        );

        self.size = size;
        self.olaps = olaps;
        self.hopsize = size / olaps;
        self.hsize = size / 2;
        self.input_latency = size - self.hopsize;
        self.wintype = wintype;
        self.window = window::generate(wintype, size);
        self.fft = SplitRealFft::new(size);
        self.input_buffer = vec![0.0; size];
        self.inframe = vec![0.0; size];
        self.real = vec![0.0; self.hsize];
        self.imag = vec![0.0; self.hsize];
        self.last_phase = vec![0.0; self.hsize];
        self.incount = self.input_latency;
        self.overcount = 0;
        self.bus.reconfigure(size, olaps, block_size);
        Ok(())
    }

    /// Consume one audio block, writing completed frames into the bus as
    /// hop boundaries are crossed (§4.2). Allocates nothing.
    pub fn process_block(&mut self, block: &[f32]) {
        self.bus.borrow_mut().resize_block(block.len());
        let mut table = self.bus.borrow_mut();
        let scale = TAU * self.hopsize as f32 / self.size as f32;
        let factor = self.sample_rate as f32 / (self.hopsize as f32 * TAU);

        for (i, &sample) in block.iter().enumerate() {
            self.input_buffer[self.incount] = sample;
            table.count_mut()[i] = self.incount;
            self.incount += 1;

            if self.incount == self.size {
                self.incount = self.input_latency;

                for k in 0..self.size {
                    let dst = (k + self.hopsize * self.overcount) % self.size;
                    self.inframe[dst] = self.input_buffer[k] * self.window[k];
                }
                self.fft.forward(&mut self.inframe, &mut self.real, &mut self.imag);

                for k in 0..self.hsize {
                    let re = self.real[k];
                    let im = self.imag[k];
                    let mag = (re * re + im * im).sqrt();
                    let phase = im.atan2(re);
                    let mut delta = phase - self.last_phase[k];
                    self.last_phase[k] = phase;
                    delta = wrap_phase(delta);

                    table.magn_mut(self.overcount)[k] = mag;
                    table.freq_mut(self.overcount)[k] = (delta + k as f32 * scale) * factor;
                }

                self.input_buffer.copy_within(self.hopsize..self.size, 0);
                self.overcount = (self.overcount + 1) % self.olaps;
                table.advance_overcount();
            }
        }
    }
}

impl Node for Analyzer {
    fn reset(&mut self) {
        self.input_buffer.iter_mut().for_each(|x| *x = 0.0);
        self.last_phase.iter_mut().for_each(|x| *x = 0.0);
        self.incount = self.input_latency;
        self.overcount = 0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }
}

/// Snap a non-power-of-two configuration value, logging an advisory
/// diagnostic when a correction was needed (§7.1: configuration snap).
fn snap(value: usize, name: &str) -> usize {
    let snapped = next_power_of_two(value);
    if snapped != value {
        log::warn!("{name} {value} is not a power of two, snapping to {snapped}");
    }
    snapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, freq: f32, sample_rate: f32, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (TAU * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn construction_snaps_non_power_of_two_size() {
        let a = Analyzer::new(44100.0, 64, 1000, 4, WindowKind::Hann).unwrap();
        assert_eq!(a.fft_size(), 1024);
    }

    #[test]
    fn rejects_size_too_small_for_overlaps() {
        assert!(Analyzer::new(44100.0, 64, 4, 4, WindowKind::Hann).is_err());
    }

    #[test]
    fn zero_input_yields_zero_magnitudes() {
        let mut a = Analyzer::new(44100.0, 64, 1024, 4, WindowKind::Hann).unwrap();
        let block = vec![0.0f32; 64];
        for _ in 0..32 {
            a.process_block(&block);
        }
        let bus = a.bus();
        let table = bus.borrow();
        for overlap in 0..table.olaps() {
            assert!(table.magn(overlap).iter().all(|&m| m.abs() < 1e-6));
        }
    }

    #[test]
    fn pure_sine_converges_to_true_frequency() {
        let sample_rate = 44100.0f32;
        let size = 1024usize;
        let olaps = 4usize;
        let freq_hz = 441.0f32;
        let mut a = Analyzer::new(sample_rate as f64, 64, size, olaps, WindowKind::Hann).unwrap();
        let bin_width = sample_rate / size as f32;
        let bin = (freq_hz / bin_width).round() as usize;

        let total = size * 8;
        let signal = sine(total, freq_hz, sample_rate, 0.5);
        for chunk in signal.chunks(64) {
            a.process_block(chunk);
        }

        let bus = a.bus();
        let table = bus.borrow();
        let mut last = 0.0f32;
        for overlap in 0..olaps {
            last = table.freq(overlap)[bin];
        }
        assert!(
            (last - freq_hz).abs() < 0.5 * bin_width,
            "expected {freq_hz} +/- {}, got {last}",
            0.5 * bin_width
        );
    }

    #[test]
    fn reconfigure_changes_hopsize_and_resets_cursor() {
        let mut a = Analyzer::new(44100.0, 64, 1024, 4, WindowKind::Hann).unwrap();
        a.reconfigure(64, 2048, 8, WindowKind::Hann).unwrap();
        assert_eq!(a.fft_size(), 2048);
        assert_eq!(a.olaps(), 8);
        assert_eq!(a.input_latency(), 2048 - 2048 / 8);
    }
}
