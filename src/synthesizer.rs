//! The phase-vocoder synthesizer (§4.3): accumulates per-bin phase from
//! instantaneous-frequency frames, runs an inverse split real-FFT per hop,
//! and overlap-adds the windowed result into an audio-rate output stream.

use crate::bus::SpectralFrameBus;
use crate::error::{validate_size_olaps, BindError};
use crate::math::TAU;
use crate::node::Node;
use crate::param::Param;
use crate::splitfft::SplitRealFft;
use crate::window::{self, WindowKind};

/// Inverse STFT synthesizer. Reads instantaneous-frequency frames from an
/// upstream [`SpectralFrameBus`] and emits audio one block at a time via
/// [`Synthesizer::process_block`].
pub struct Synthesizer {
    upstream: SpectralFrameBus,

    sample_rate: f64,
    size: usize,
    olaps: usize,
    hopsize: usize,
    hsize: usize,
    input_latency: usize,
    wintype: WindowKind,
    window: Vec<f32>,
    fft: SplitRealFft,

    sum_phase: Vec<f32>,
    real: Vec<f32>,
    imag: Vec<f32>,
    outframe: Vec<f32>,
    output_accum: Vec<f32>,
    output_buffer: Vec<f32>,
    overcount: usize,

    mul: Param,
    add: Param,
}

impl Synthesizer {
    /// Bind to an upstream bus, adopting its currently published
    /// `(size, olaps)`. Fails per §7.2 if that configuration violates
    /// `size >= 2 * olaps` (only reachable if the upstream node itself was
    /// constructed with a pathological configuration that should already
    /// have failed there; checked again here for defense in depth).
    pub fn new(upstream: SpectralFrameBus, wintype: WindowKind) -> Result<Self, BindError> {
        let (size, olaps) = upstream.config();
        validate_size_olaps(size, olaps)?;
        let hopsize = size / olaps;
        let hsize = size / 2;
        let input_latency = size - hopsize;

        Ok(Self {
            upstream,
            sample_rate: 44_100.0,
            size,
            olaps,
            hopsize,
            hsize,
            input_latency,
            wintype,
            window: window::generate(wintype, size),
            fft: SplitRealFft::new(size),
            sum_phase: vec![0.0; hsize],
            real: vec![0.0; hsize],
            imag: vec![0.0; hsize],
            outframe: vec![0.0; size],
            output_accum: vec![0.0; size + hopsize],
            output_buffer: vec![0.0; size],
            overcount: 0,
            mul: Param::Const(1.0),
            add: Param::Const(0.0),
        })
    }

    pub fn set_sample_rate_hz(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    pub fn set_mul(&mut self, mul: impl Into<Param>) {
        self.mul = mul.into();
    }

    pub fn set_add(&mut self, add: impl Into<Param>) {
        self.add = add.into();
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn olaps(&self) -> usize {
        self.olaps
    }

    /// Reallocate every scratch buffer for a new `(size, olaps, wintype)`.
    /// Called both from an explicit caller request and automatically when
    /// upstream reconfiguration is detected at the top of
    /// `process_block`.
    pub fn reconfigure(&mut self, size: usize, olaps: usize, wintype: WindowKind) -> Result<(), BindError> {
        validate_size_olaps(size, olaps)?;
        log::debug!(
            "synthesizer reconfigure: size {} -> {size}, olaps {} -> {olaps}",
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
        self.sum_phase = vec![0.0; self.hsize];
        self.real = vec![0.0; self.hsize];
        self.imag = vec![0.0; self.hsize];
        self.outframe = vec![0.0; size];
        self.output_accum = vec![0.0; size + self.hopsize];
        self.output_buffer = vec![0.0; size];
        self.overcount = 0;
        Ok(())
    }

    /// Produce one audio block into `out` (`out.len()` samples). Detects
    /// upstream reconfiguration before processing (§4.3 Adaptation).
    pub fn process_block(&mut self, out: &mut [f32]) {
        let (up_size, up_olaps) = self.upstream.config();
        if up_size != self.size || up_olaps != self.olaps {
            self.reconfigure(up_size, up_olaps, self.wintype)
                .expect("upstream published an invalid (size, olaps)");
        }

        let scale_s = self.sample_rate as f32 / self.size as f32;
        let factor_s = self.hopsize as f32 * TAU / self.sample_rate as f32;
        let amp_scale = 1.0 / (self.olaps as f32).sqrt();

        let upstream = self.upstream.borrow();
        for (i, out_sample) in out.iter_mut().enumerate() {
            let count = upstream.count()[i];
            *out_sample = self.output_buffer[count - self.input_latency];

            if count == self.size - 1 {
                for k in 0..self.hsize {
                    let freq = upstream.freq(self.overcount)[k];
                    let mag = upstream.magn(self.overcount)[k];
                    let domega = (freq - k as f32 * scale_s) * factor_s;
                    self.sum_phase[k] += domega;
                    let phase = self.sum_phase[k];
                    self.real[k] = mag * phase.cos();
                    self.imag[k] = mag * phase.sin();
                }

                self.fft.inverse(&self.real, &self.imag, &mut self.outframe);

                for k in 0..self.size {
                    let src = (k + self.hopsize * self.overcount) % self.size;
                    self.output_accum[k] += self.outframe[src] * self.window[k] * amp_scale;
                }

                self.output_buffer[0..self.hopsize].copy_from_slice(&self.output_accum[0..self.hopsize]);
                self.output_accum.copy_within(self.hopsize.., 0);
                let len = self.output_accum.len();
                for slot in &mut self.output_accum[len - self.hopsize..] {
                    *slot = 0.0;
                }

                self.overcount = (self.overcount + 1) % self.olaps;
            }
        }
        drop(upstream);

        for out_sample in out.iter_mut() {
            *out_sample = *out_sample * self.mul.value() + self.add.value();
        }
    }
}

impl Node for Synthesizer {
    fn reset(&mut self) {
        self.sum_phase.iter_mut().for_each(|x| *x = 0.0);
        self.output_accum.iter_mut().for_each(|x| *x = 0.0);
        self.output_buffer.iter_mut().for_each(|x| *x = 0.0);
        self.overcount = 0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;

    #[test]
    fn binds_to_upstream_config() {
        let a = Analyzer::new(44100.0, 64, 1024, 4, WindowKind::Hann).unwrap();
        let mut s = Synthesizer::new(a.bus(), WindowKind::Hann).unwrap();
        s.set_sample_rate_hz(44100.0);
        assert_eq!(s.fft_size(), 1024);
        assert_eq!(s.olaps(), 4);
    }

    #[test]
    fn identity_chain_reconstructs_sine_after_warmup() {
        let sample_rate = 44100.0f32;
        let size = 1024usize;
        let olaps = 4usize;
        let block_size = 64usize;
        let freq_hz = 441.0f32;

        let mut analyzer =
            Analyzer::new(sample_rate as f64, block_size, size, olaps, WindowKind::Hann).unwrap();
        let mut synth = Synthesizer::new(analyzer.bus(), WindowKind::Hann).unwrap();
        synth.set_sample_rate_hz(sample_rate as f64);

        let total = size * 8;
        let input: Vec<f32> = (0..total)
            .map(|i| 0.5 * (TAU * freq_hz * i as f32 / sample_rate).sin())
            .collect();

        let input_latency = analyzer.input_latency();
        let mut output = vec![0.0f32; total];
        for (chunk_idx, chunk) in input.chunks(block_size).enumerate() {
            analyzer.process_block(chunk);
            let start = chunk_idx * block_size;
            synth.process_block(&mut output[start..start + chunk.len()]);
        }

        let warmup = 2 * size;
        let mut sq_err = 0.0f64;
        let mut n = 0usize;
        for i in warmup..(total - input_latency) {
            let expected = input[i];
            let actual = output[i + input_latency];
            let err = (expected - actual) as f64;
            sq_err += err * err;
            n += 1;
        }
        let rms = (sq_err / n as f64).sqrt();
        assert!(rms < 1e-3, "rms error too high: {rms}");
    }
}
