//! Spectral-domain transformers (§4.4-4.6): uniform plug-in shape between
//! an `Analyzer` (or another transformer) and a `Synthesizer`. Each reads
//! one upstream [`SpectralFrameBus`] and publishes its own transformed
//! bus, so transformers compose by chaining `.bus()` into the next
//! constructor the same way `Synthesizer::new` does.

use crate::bus::SpectralFrameBus;
use crate::error::{validate_size_olaps, BindError};
use crate::math::clamp01;
use crate::node::Node;
use crate::param::Param;

/// Shared bookkeeping used by every transformer: the upstream bus, the
/// transformer's own output bus, the cached `(size, olaps)` used to detect
/// upstream reconfiguration, and the transformer's private overlap-slot
/// counter (kept separately from the bus's own `overcount` field, same
/// reasoning as [`crate::synthesizer::Synthesizer`]: a consumer's own
/// counter, advanced once per frame in lockstep with the producer, always
/// indexes the slot the producer *just* wrote, regardless of whether the
/// producer has already advanced its own published `overcount`).
struct Link {
    upstream: SpectralFrameBus,
    bus: SpectralFrameBus,
    size: usize,
    olaps: usize,
    overcount: usize,
}

impl Link {
    fn new(upstream: SpectralFrameBus, block_size: usize) -> Result<Self, BindError> {
        let (size, olaps) = upstream.config();
        validate_size_olaps(size, olaps)?;
        Ok(Self {
            bus: SpectralFrameBus::new(size, olaps, block_size),
            upstream,
            size,
            olaps,
            overcount: 0,
        })
    }

    fn reconfigure(&mut self, size: usize, olaps: usize, block_size: usize) {
        self.size = size;
        self.olaps = olaps;
        self.overcount = 0;
        self.bus.reconfigure(size, olaps, block_size);
    }

    /// Check for upstream reconfiguration, mirror `count[]` onto the
    /// output bus, and return the number of samples in this block (the
    /// caller iterates `0..block_size` to find frame edges).
    fn sync(&mut self, block_size: usize) -> usize {
        let (up_size, up_olaps) = self.upstream.config();
        if up_size != self.size || up_olaps != self.olaps {
            self.reconfigure(up_size, up_olaps, block_size);
        }
        let upstream = self.upstream.borrow();
        let mut out = self.bus.borrow_mut();
        out.resize_block(block_size);
        out.count_mut()[..block_size].copy_from_slice(&upstream.count()[..block_size]);
        block_size
    }

    fn reset(&mut self) {
        self.overcount = 0;
    }
}

/// Pitch transposition (§4.4): relocates each bin `k` to `floor(k *
/// transpo)`, summing colliding magnitudes and overwriting frequency
/// (last write wins) — the simple, lossy policy the spec calls out and
/// explicitly says not to replace (§9, Open Question).
pub struct PitchTranspose {
    link: Link,
    transpo: Param,
}

impl PitchTranspose {
    pub fn new(upstream: SpectralFrameBus, block_size: usize) -> Result<Self, BindError> {
        Ok(Self {
            link: Link::new(upstream, block_size)?,
            transpo: Param::Const(1.0),
        })
    }

    pub fn bus(&self) -> SpectralFrameBus {
        self.link.bus.clone()
    }

    pub fn set_transpo(&mut self, transpo: impl Into<Param>) {
        self.transpo = transpo.into();
    }

    pub fn process_block(&mut self, block_size: usize) {
        let block_size = self.link.sync(block_size);
        let hsize = self.link.size / 2;
        let transpo = self.transpo.value();

        let upstream = self.link.upstream.borrow();
        let mut out = self.link.bus.borrow_mut();
        for i in 0..block_size {
            if upstream.count()[i] == self.link.size - 1 {
                let slot = self.link.overcount;
                out.magn_mut(slot).iter_mut().for_each(|v| *v = 0.0);
                out.freq_mut(slot).iter_mut().for_each(|v| *v = 0.0);

                for k in 0..hsize {
                    let target = (k as f32) * transpo;
                    if target >= 0.0 {
                        let idx = target.floor() as usize;
                        if idx < hsize {
                            out.magn_mut(slot)[idx] += upstream.magn(slot)[k];
                            out.freq_mut(slot)[idx] = upstream.freq(slot)[k] * transpo;
                        }
                    }
                }
                self.link.overcount = (self.link.overcount + 1) % self.link.olaps;
            }
        }
    }
}

impl Node for PitchTranspose {
    fn reset(&mut self) {
        self.link.reset();
    }
    fn set_sample_rate(&mut self, _sample_rate: f64) {}
}

/// Spectral reverberation (§4.5): a per-bin peak-hold/decay follower with
/// a decay rate that shortens with bin index (so high partials die out
/// faster than low ones, the usual "damping" behavior of real reverb).
pub struct SpectralReverb {
    link: Link,
    revtime: Param,
    damp: Param,
    follower: Vec<f32>,
}

impl SpectralReverb {
    pub fn new(upstream: SpectralFrameBus, block_size: usize) -> Result<Self, BindError> {
        let link = Link::new(upstream, block_size)?;
        let hsize = link.size / 2;
        Ok(Self {
            link,
            revtime: Param::Const(0.75),
            damp: Param::Const(0.75),
            follower: vec![0.0; hsize],
        })
    }

    pub fn bus(&self) -> SpectralFrameBus {
        self.link.bus.clone()
    }

    pub fn set_revtime(&mut self, revtime: impl Into<Param>) {
        self.revtime = revtime.into();
    }

    pub fn set_damp(&mut self, damp: impl Into<Param>) {
        self.damp = damp.into();
    }

    pub fn process_block(&mut self, block_size: usize) {
        let block_size = self.link.sync(block_size);
        let hsize = self.link.size / 2;
        if self.follower.len() != hsize {
            self.follower = vec![0.0; hsize];
        }

        let r = 0.75 + clamp01(self.revtime.value()) * 0.25;
        let d = 0.997 + clamp01(self.damp.value()) * 0.003;

        let upstream = self.link.upstream.borrow();
        let mut out = self.link.bus.borrow_mut();
        for i in 0..block_size {
            if upstream.count()[i] == self.link.size - 1 {
                let slot = self.link.overcount;
                let mut amp = 1.0f32;
                for k in 0..hsize {
                    let mag_in = upstream.magn(slot)[k];
                    let level = self.follower[k];
                    let mag_out = if mag_in > level {
                        self.follower[k] = mag_in;
                        mag_in
                    } else {
                        let v = mag_in + (level - mag_in) * r * amp;
                        self.follower[k] = v;
                        v
                    };
                    out.magn_mut(slot)[k] = mag_out;
                    out.freq_mut(slot)[k] = upstream.freq(slot)[k];
                    amp *= d;
                }
                self.link.overcount = (self.link.overcount + 1) % self.link.olaps;
            }
        }
    }
}

impl Node for SpectralReverb {
    fn reset(&mut self) {
        self.link.reset();
        self.follower.iter_mut().for_each(|x| *x = 0.0);
    }
    fn set_sample_rate(&mut self, _sample_rate: f64) {}
}

/// Spectral noise gate (§4.6): bins below a dB threshold are attenuated by
/// a linear `damp` gain; bins at or above threshold pass through
/// unmodified.
pub struct SpectralGate {
    link: Link,
    thresh: Param,
    damp: Param,
}

impl SpectralGate {
    pub fn new(upstream: SpectralFrameBus, block_size: usize) -> Result<Self, BindError> {
        Ok(Self {
            link: Link::new(upstream, block_size)?,
            thresh: Param::Const(-20.0),
            damp: Param::Const(0.0),
        })
    }

    pub fn bus(&self) -> SpectralFrameBus {
        self.link.bus.clone()
    }

    pub fn set_thresh(&mut self, thresh: impl Into<Param>) {
        self.thresh = thresh.into();
    }

    pub fn set_damp(&mut self, damp: impl Into<Param>) {
        self.damp = damp.into();
    }

    pub fn process_block(&mut self, block_size: usize) {
        let block_size = self.link.sync(block_size);
        let hsize = self.link.size / 2;
        let linear_thresh = 10f32.powf(self.thresh.value() / 20.0);
        let damp = self.damp.value();

        let upstream = self.link.upstream.borrow();
        let mut out = self.link.bus.borrow_mut();
        for i in 0..block_size {
            if upstream.count()[i] == self.link.size - 1 {
                let slot = self.link.overcount;
                for k in 0..hsize {
                    let mag_in = upstream.magn(slot)[k];
                    out.magn_mut(slot)[k] = if mag_in < linear_thresh {
                        mag_in * damp
                    } else {
                        mag_in
                    };
                    out.freq_mut(slot)[k] = upstream.freq(slot)[k];
                }
                self.link.overcount = (self.link.overcount + 1) % self.link.olaps;
            }
        }
    }
}

impl Node for SpectralGate {
    fn reset(&mut self) {
        self.link.reset();
    }
    fn set_sample_rate(&mut self, _sample_rate: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::synthesizer::Synthesizer;
    use crate::window::WindowKind;

    fn sine(len: usize, freq: f32, sample_rate: f32, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (crate::math::TAU * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn transpose_moves_dominant_bin() {
        let sample_rate = 44100.0f32;
        let size = 1024usize;
        let olaps = 4usize;
        let block_size = 64usize;

        let mut analyzer =
            Analyzer::new(sample_rate as f64, block_size, size, olaps, WindowKind::Hann).unwrap();
        let mut transpose = PitchTranspose::new(analyzer.bus(), block_size).unwrap();
        transpose.set_transpo(2.0);

        let input = sine(size * 8, 441.0, sample_rate, 0.5);
        for chunk in input.chunks(block_size) {
            analyzer.process_block(chunk);
            transpose.process_block(chunk.len());
        }

        let bin_width = sample_rate / size as f32;
        let src_bin = (441.0 / bin_width).round() as usize;
        let dst_bin = (src_bin as f32 * 2.0).floor() as usize;
        let bus = transpose.bus();
        let table = bus.borrow();
        let mut found = false;
        for overlap in 0..olaps {
            if table.magn(overlap)[dst_bin] > 0.0 {
                found = true;
            }
        }
        assert!(found, "expected energy relocated to bin {dst_bin}");
    }

    #[test]
    fn gate_zeroes_bins_below_threshold() {
        let sample_rate = 44100.0f32;
        let size = 256usize;
        let olaps = 4usize;
        let block_size = 64usize;

        let mut analyzer =
            Analyzer::new(sample_rate as f64, block_size, size, olaps, WindowKind::Hann).unwrap();
        let mut gate = SpectralGate::new(analyzer.bus(), block_size).unwrap();
        gate.set_thresh(0.0);
        gate.set_damp(0.0);

        let input = sine(size * 8, 441.0, sample_rate, 0.01);
        for chunk in input.chunks(block_size) {
            analyzer.process_block(chunk);
            gate.process_block(chunk.len());
        }

        let bus = gate.bus();
        let table = bus.borrow();
        for overlap in 0..olaps {
            assert!(table.magn(overlap).iter().all(|&m| m == 0.0));
        }
    }

    #[test]
    fn reverb_sustains_above_instantaneous_decay() {
        let sample_rate = 44100.0f32;
        let size = 256usize;
        let olaps = 4usize;
        let block_size = 64usize;

        let mut analyzer =
            Analyzer::new(sample_rate as f64, block_size, size, olaps, WindowKind::Hann).unwrap();
        let mut verb = SpectralReverb::new(analyzer.bus(), block_size).unwrap();
        verb.set_revtime(1.0);
        verb.set_damp(0.0);

        let mut impulse = vec![0.0f32; size * 16];
        impulse[0] = 1.0;
        for chunk in impulse.chunks(block_size) {
            analyzer.process_block(chunk);
            verb.process_block(chunk.len());
        }

        let bus = verb.bus();
        let table = bus.borrow();
        assert!(table.magn(olaps - 1).iter().any(|&m| m > 0.0));
    }

    #[test]
    fn chain_binds_through_synthesizer() {
        let mut analyzer = Analyzer::new(44100.0, 64, 512, 4, WindowKind::Hann).unwrap();
        let gate = SpectralGate::new(analyzer.bus(), 64).unwrap();
        let synth = Synthesizer::new(gate.bus(), WindowKind::Hann).unwrap();
        assert_eq!(synth.fft_size(), 512);
        let block = vec![0.0f32; 64];
        analyzer.process_block(&block);
    }
}
