//! The spectral-frame bus: the value-carrier published by every analysis or
//! transform node and borrowed by whatever reads it downstream.
//!
//! Grounded on `fundsp::shared`'s ownership shape — a producer holds the
//! canonical state, consumers hold cheap cloneable handles onto it — but
//! using `Rc<RefCell<_>>` rather than atomics: per §5, a bus is produced by
//! exactly one node and read by others strictly within the same
//! single-threaded block-processing window, so no cross-thread
//! synchronization is needed (only [`crate::param::Shared`]'s audio-rate
//! parameters cross threads).

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// Per-producer spectral-frame storage: magnitude/frequency tables for every
/// overlap slot, plus the per-sample write-cursor trace that lets
/// downstream nodes find frame boundaries without resampling a clock.
pub struct SpectralFrameTable {
    fft_size: usize,
    olaps: usize,
    hopsize: usize,
    /// `magn[o][k]`, `o` in `[0, olaps)`, `k` in `[0, hsize)`.
    magn: Vec<Vec<f32>>,
    /// `freq[o][k]`, instantaneous frequency in Hz.
    freq: Vec<Vec<f32>>,
    /// `count[i]` for each sample `i` of the current block: the producer's
    /// input-buffer write index at that sample.
    count: Vec<usize>,
    /// The overlap slot the next completed frame will land in.
    overcount: usize,
}

impl SpectralFrameTable {
    /// Allocate a fresh table for the given configuration and block size.
    /// Called at construction and on every `reconfigure`.
    pub fn new(fft_size: usize, olaps: usize, block_size: usize) -> Self {
        let hsize = fft_size / 2;
        Self {
            fft_size,
            olaps,
            hopsize: fft_size / olaps,
            magn: vec![vec![0.0; hsize]; olaps],
            freq: vec![vec![0.0; hsize]; olaps],
            count: vec![0; block_size],
            overcount: 0,
        }
    }

    /// Resize the `count` trace to match a new block size, preserving the
    /// spectral tables. The host keeps block size fixed in practice, but
    /// this keeps the table consistent if it ever changes.
    pub fn resize_block(&mut self, block_size: usize) {
        self.count.resize(block_size, 0);
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    #[inline]
    pub fn olaps(&self) -> usize {
        self.olaps
    }

    #[inline]
    pub fn hopsize(&self) -> usize {
        self.hopsize
    }

    #[inline]
    pub fn hsize(&self) -> usize {
        self.fft_size / 2
    }

    #[inline]
    pub fn overcount(&self) -> usize {
        self.overcount
    }

    #[inline]
    pub fn magn(&self, overlap: usize) -> &[f32] {
        &self.magn[overlap]
    }

    #[inline]
    pub fn magn_mut(&mut self, overlap: usize) -> &mut [f32] {
        &mut self.magn[overlap]
    }

    #[inline]
    pub fn freq(&self, overlap: usize) -> &[f32] {
        &self.freq[overlap]
    }

    #[inline]
    pub fn freq_mut(&mut self, overlap: usize) -> &mut [f32] {
        &mut self.freq[overlap]
    }

    #[inline]
    pub fn count(&self) -> &[usize] {
        &self.count
    }

    #[inline]
    pub fn count_mut(&mut self) -> &mut [usize] {
        &mut self.count
    }

    /// Advance to the next overlap slot, wrapping modulo `olaps`.
    #[inline]
    pub fn advance_overcount(&mut self) {
        self.overcount = (self.overcount + 1) % self.olaps;
    }
}

/// A producer-owned, consumer-borrowed handle onto a [`SpectralFrameTable`].
///
/// Cloning a `SpectralFrameBus` yields another handle onto the same
/// underlying table (like cloning an `Rc`), not a copy of its contents.
/// Consumers call [`SpectralFrameBus::borrow`] fresh every block rather than
/// caching a `Ref`, so that a producer's `reconfigure` between blocks is
/// always observed (§4.1: "consumers must re-latch their pointers on every
/// block").
#[derive(Clone)]
pub struct SpectralFrameBus {
    table: Rc<RefCell<SpectralFrameTable>>,
}

impl SpectralFrameBus {
    pub fn new(fft_size: usize, olaps: usize, block_size: usize) -> Self {
        Self {
            table: Rc::new(RefCell::new(SpectralFrameTable::new(
                fft_size, olaps, block_size,
            ))),
        }
    }

    /// Current `(fft_size, olaps)`, cheap enough to check at the top of
    /// every `process_block` to detect upstream reconfiguration.
    #[inline]
    pub fn config(&self) -> (usize, usize) {
        let table = self.table.borrow();
        (table.fft_size(), table.olaps())
    }

    #[inline]
    pub fn borrow(&self) -> Ref<'_, SpectralFrameTable> {
        self.table.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, SpectralFrameTable> {
        self.table.borrow_mut()
    }

    /// Replace the backing table in place (used by the producer's own
    /// `reconfigure`). Existing clones observe the new table on their next
    /// `borrow`, since they share the same `Rc<RefCell<_>>` cell.
    pub fn reconfigure(&self, fft_size: usize, olaps: usize, block_size: usize) {
        *self.table.borrow_mut() = SpectralFrameTable::new(fft_size, olaps, block_size);
    }
}
