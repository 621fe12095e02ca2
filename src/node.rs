//! The common node lifecycle contract (§4.7).
//!
//! Every node in the phase-vocoder chain (`Analyzer`, `Synthesizer`, and the
//! spectral transformers) implements this trait in addition to its own
//! `process_block`/`reconfigure` methods, which are node-specific (different
//! input/output shapes: audio-in, bus-out for the analyzer; bus-in,
//! audio-out for the synthesizer; bus-in, bus-out for a transformer) and so
//! are not part of a shared trait method. Teardown is `Drop`, synthesized
//! automatically since every node's state is owned `Vec` storage.

/// Lifecycle operations common to every node, mirroring the subset of
/// `fundsp::audionode::AudioNode` that makes sense for a fixed-shape,
/// non-generic node: `reset` and `set_sample_rate`.
pub trait Node {
    /// Reset all per-stream state (phase accumulators, ring cursors,
    /// accumulation buffers) to the same state as a freshly constructed
    /// node, without reallocating any buffer. Matches
    /// `AudioNode::reset`'s contract: "if `allocate` has been called
    /// previously, and the sample rate is unchanged, then no memory
    /// allocation or deallocation takes place here."
    fn reset(&mut self);

    /// Update the sample rate used to convert between phase and Hz.
    /// Does not affect FFT size, overlap, or window shape, so (unlike
    /// `reconfigure`) this never reallocates.
    fn set_sample_rate(&mut self, sample_rate: f64);
}
