//! Per-dimension memory strides.
//!
//! A [`Strides`] value parallels a [`Dimensions`] value: one signed element
//! offset per label, outermost first. A flat coordinate tuple
//! `(i0, .., in-1)` maps to the memory offset `sum(i_j * s_j)`. A stride of
//! 0 encodes broadcast along that dimension; strides matching the canonical
//! row-major layout describe a contiguous view.

use crate::dimensions::Dimensions;
use crate::error::{Error, Result};
use crate::Index;

/// Signed per-dimension element offsets, outermost first.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Strides {
    strides: Vec<Index>,
}

impl Strides {
    /// Canonical row-major strides for `dims` (innermost stride 1).
    pub fn row_major(dims: &Dimensions) -> Strides {
        let shape = dims.shape();
        let mut strides = vec![0; shape.len()];
        let mut running = 1;
        for (i, &n) in shape.iter().enumerate().rev() {
            strides[i] = running;
            running *= n.max(1);
        }
        Strides { strides }
    }

    /// Strides viewing data laid out as `source` through the axes of
    /// `target`: labels absent from `source` get stride 0 (broadcast),
    /// labels present keep their row-major stride within `source`.
    pub fn broadcast(source: &Dimensions, target: &Dimensions) -> Result<Strides> {
        let natural = Strides::row_major(source);
        let mut strides = Vec::with_capacity(target.ndim());
        for (dim, length) in target.iter() {
            match source.index_of(dim) {
                Some(i) => {
                    if source.length(dim)? != length {
                        return Err(Error::DimensionLength {
                            dims: source.clone(),
                            dim,
                            length,
                        });
                    }
                    strides.push(natural.strides[i]);
                }
                None => strides.push(0),
            }
        }
        Ok(Strides { strides })
    }

    pub(crate) fn from_vec(strides: Vec<Index>) -> Strides {
        Strides { strides }
    }

    pub fn ndim(&self) -> usize {
        self.strides.len()
    }

    pub fn get(&self, i: usize) -> Index {
        self.strides[i]
    }

    pub fn as_slice(&self) -> &[Index] {
        &self.strides
    }

    pub(crate) fn remove(&mut self, i: usize) {
        self.strides.remove(i);
    }

    /// True if these strides describe the canonical row-major layout of
    /// `dims` (no broadcast, no permutation, no gaps).
    pub fn is_contiguous(&self, dims: &Dimensions) -> bool {
        *self == Strides::row_major(dims)
    }

    /// True if some dimension of length > 1 has stride 0.
    pub fn has_broadcast(&self, dims: &Dimensions) -> bool {
        self.strides
            .iter()
            .zip(dims.shape())
            .any(|(&s, n)| s == 0 && n > 1)
    }
}
