//! A realtime phase-vocoder pipeline: overlap-add STFT analysis,
//! instantaneous-frequency frame transport, and phase-coherent
//! resynthesis, composed into a chain of block-driven nodes.
//!
//! ```text
//! AudioSource -> Analyzer -> [Transformer...]* -> Synthesizer -> AudioSink
//!                   |            |                     ^
//!                   `--> SpectralFrameBus <-------------'
//! ```
//!
//! The caller owns the audio callback: construct an [`analyzer::Analyzer`],
//! bind any of [`transform::PitchTranspose`], [`transform::SpectralReverb`],
//! or [`transform::SpectralGate`] to its bus (or to each other, chained),
//! bind a [`synthesizer::Synthesizer`] to the last bus in the chain, and
//! call `process_block` on each node once per audio block in topological
//! order. No node allocates once construction/reconfiguration has
//! finished.

pub mod analyzer;
pub mod bus;
pub mod error;
pub mod math;
pub mod node;
pub mod param;
pub mod splitfft;
pub mod synthesizer;
pub mod transform;
pub mod window;

pub use analyzer::Analyzer;
pub use bus::SpectralFrameBus;
pub use error::BindError;
pub use node::Node;
pub use param::{Param, Shared};
pub use synthesizer::Synthesizer;
pub use transform::{PitchTranspose, SpectralGate, SpectralReverb};
pub use window::WindowKind;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_identity_chain_runs_without_panicking() {
        let sample_rate = 44100.0;
        let block_size = 64;
        let mut analyzer = Analyzer::new(sample_rate, block_size, 1024, 4, WindowKind::Hann)
            .expect("valid configuration");
        let mut synth =
            Synthesizer::new(analyzer.bus(), WindowKind::Hann).expect("valid configuration");
        synth.set_sample_rate_hz(sample_rate);

        let block = vec![0.1f32; block_size];
        let mut out = vec![0.0f32; block_size];
        for _ in 0..64 {
            analyzer.process_block(&block);
            synth.process_block(&mut out);
        }
    }
}
