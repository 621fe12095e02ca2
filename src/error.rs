//! Construction-time failures.
//!
//! Per the error taxonomy: non-power-of-two sizes are a *configuration
//! snap* (auto-corrected, logged, never an `Err`); the only thing that
//! actually fails construction is binding a downstream node to an upstream
//! bus whose published configuration cannot support it.

use thiserror::Error;

/// Fatal, bind-time configuration errors.
///
/// The dynamically-typed original also had a "wrong kind of input object"
/// bind failure (passing an audio-rate object where a `PVStream` was
/// required); here that distinction is made by the type system (an
/// [`crate::analyzer::Analyzer`] and a [`crate::bus::SpectralFrameBus`] are
/// different Rust types, so such a mismatch cannot compile), leaving only
/// the residual runtime invariant below.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// `size < 2 * olaps`, so `hopsize = size / olaps` would leave fewer
    /// than two samples of latency headroom and the overlap-add math
    /// becomes ill-defined.
    #[error("fft size {size} is too small for {olaps} overlaps (need size >= 2 * olaps)")]
    SizeTooSmallForOverlaps { size: usize, olaps: usize },
}

/// Check the `size >= 2 * olaps` invariant (§3) against already-snapped
/// (power-of-two) `size`/`olaps` values. Called by every node constructor
/// and every `reconfigure` before committing new buffer sizes.
pub fn validate_size_olaps(size: usize, olaps: usize) -> Result<(), BindError> {
    if size < 2 * olaps {
        Err(BindError::SizeTooSmallForOverlaps { size, olaps })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_size_smaller_than_twice_olaps() {
        assert_eq!(
            validate_size_olaps(4, 4),
            Err(BindError::SizeTooSmallForOverlaps { size: 4, olaps: 4 })
        );
        assert!(validate_size_olaps(8, 4).is_ok());
    }
}
