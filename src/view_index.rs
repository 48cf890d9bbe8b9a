//! Flat-offset iteration over a strided, possibly broadcast view.
//!
//! [`ViewIndex`] walks the logical row-major order of a target
//! [`Dimensions`] and maintains the corresponding memory offset under a
//! [`Strides`] value. Each step adds the innermost stride; when the
//! innermost coordinate saturates a ripple carry applies precomputed
//! per-level deltas, so an increment is O(1) and a fully contiguous view
//! advances by exactly 1 per step.

use crate::dimensions::Dimensions;
use crate::strides::Strides;
use crate::{Index, NDIM_MAX};

/// Iteration state: logical position plus memory offset.
///
/// Internally dimensions are stored innermost-first so the hot path touches
/// index 0 only.
#[derive(Clone, Debug)]
pub struct ViewIndex {
    offset: Index,
    flat: Index,
    coord: [Index; NDIM_MAX],
    extent: [Index; NDIM_MAX],
    delta: [Index; NDIM_MAX],
    stride: [Index; NDIM_MAX],
    ndim: usize,
}

impl ViewIndex {
    /// Iteration over `target_dims` reading memory through `strides`.
    ///
    /// `strides` must parallel `target_dims` (one entry per label). Scalar
    /// targets behave like a single-element dimension.
    pub fn new(target_dims: &Dimensions, strides: &Strides) -> ViewIndex {
        let mut extent = [0; NDIM_MAX];
        let mut stride = [0; NDIM_MAX];
        let shape = target_dims.shape();
        let ndim = shape.len().max(1);
        if shape.is_empty() {
            extent[0] = 1;
        } else {
            // Reverse to innermost-first.
            for (inner, outer) in (0..shape.len()).rev().enumerate() {
                extent[inner] = shape[outer];
                stride[inner] = strides.get(outer);
            }
        }
        let mut delta = [0; NDIM_MAX];
        delta[0] = stride[0];
        for d in 1..ndim {
            delta[d] = stride[d] - extent[d - 1] * stride[d - 1];
        }
        ViewIndex {
            offset: 0,
            flat: 0,
            coord: [0; NDIM_MAX],
            extent,
            delta,
            stride,
            ndim,
        }
    }

    /// Current memory offset, relative to the view base.
    #[inline]
    pub fn offset(&self) -> Index {
        self.offset
    }

    /// Current logical (row-major) position.
    #[inline]
    pub fn index(&self) -> Index {
        self.flat
    }

    /// Advances to the next logical position.
    #[inline]
    pub fn increment(&mut self) {
        self.offset += self.delta[0];
        self.coord[0] += 1;
        if self.coord[0] == self.extent[0] {
            self.increment_outer();
        }
        self.flat += 1;
    }

    #[inline]
    fn increment_outer(&mut self) {
        let mut d = 0;
        while self.coord[d] == self.extent[d] && d + 1 < self.ndim {
            self.offset += self.delta[d + 1];
            self.coord[d + 1] += 1;
            self.coord[d] = 0;
            d += 1;
        }
    }

    /// Seeks to an arbitrary logical position.
    pub fn set_index(&mut self, index: Index) {
        self.flat = index;
        let mut remaining = index;
        let mut offset = 0;
        for d in 0..self.ndim {
            let n = self.extent[d];
            let c = if n > 0 { remaining % n } else { 0 };
            remaining = if n > 0 { remaining / n } else { 0 };
            self.coord[d] = c;
            offset += c * self.stride[d];
        }
        self.offset = offset;
    }
}

impl PartialEq for ViewIndex {
    fn eq(&self, other: &ViewIndex) -> bool {
        self.flat == other.flat
    }
}

impl Eq for ViewIndex {}
