//! Ordered, labeled array shapes.
//!
//! [`Dimensions`] is an ordered sequence of `(Dim, length)` pairs, outermost
//! dimension first. All labels are distinct and the volume (product of
//! lengths) fits in a signed 64-bit integer. The order is significant: it
//! fixes the row-major memory layout of a dense buffer and the iteration
//! order of every view.

use crate::dim::Dim;
use crate::error::{Error, Result};
use crate::{Index, NDIM_MAX};

/// An ordered sequence of `(Dim, length)` pairs, outermost first.
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Dimensions {
    dims: Vec<(Dim, Index)>,
}

impl Dimensions {
    /// Empty (scalar) dimensions with volume 1.
    pub fn new() -> Dimensions {
        Dimensions { dims: Vec::new() }
    }

    /// Builds dimensions from `(label, length)` pairs, outermost first.
    ///
    /// Fails if a label repeats, a length is negative, the rank exceeds
    /// [`NDIM_MAX`] or the volume overflows `i64`.
    pub fn from_pairs(pairs: &[(Dim, Index)]) -> Result<Dimensions> {
        let mut out = Dimensions::new();
        for &(dim, length) in pairs {
            out.push_inner(dim, length)?;
        }
        Ok(out)
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Product of all lengths; 1 for scalar dimensions.
    pub fn volume(&self) -> Index {
        self.dims.iter().map(|&(_, n)| n).product()
    }

    /// True if `dim` is one of the labels.
    pub fn contains(&self, dim: Dim) -> bool {
        self.dims.iter().any(|&(d, _)| d == dim)
    }

    /// True if every `(label, length)` of `inner` appears in `self`.
    pub fn includes(&self, inner: &Dimensions) -> bool {
        inner
            .iter()
            .all(|(d, n)| self.index_of(d).map(|i| self.dims[i].1) == Some(n))
    }

    /// Position of `dim`, outermost first.
    pub fn index_of(&self, dim: Dim) -> Option<usize> {
        self.dims.iter().position(|&(d, _)| d == dim)
    }

    /// Length along `dim`.
    pub fn length(&self, dim: Dim) -> Result<Index> {
        self.index_of(dim)
            .map(|i| self.dims[i].1)
            .ok_or_else(|| Error::DimensionNotFound {
                dims: self.clone(),
                dim,
            })
    }

    /// Labels, outermost first.
    pub fn labels(&self) -> impl DoubleEndedIterator<Item = Dim> + '_ {
        self.dims.iter().map(|&(d, _)| d)
    }

    /// Lengths, outermost first.
    pub fn shape(&self) -> Vec<Index> {
        self.dims.iter().map(|&(_, n)| n).collect()
    }

    /// `(label, length)` pairs, outermost first.
    pub fn iter(&self) -> impl Iterator<Item = (Dim, Index)> + '_ {
        self.dims.iter().copied()
    }

    /// The outermost label, if any.
    pub fn outer(&self) -> Option<Dim> {
        self.dims.first().map(|&(d, _)| d)
    }

    /// Appends `dim` at the inner (rightmost) end.
    pub fn push_inner(&mut self, dim: Dim, length: Index) -> Result<()> {
        self.insert(self.ndim(), dim, length)
    }

    /// Inserts `dim` at the outer (leftmost) end.
    pub fn push_outer(&mut self, dim: Dim, length: Index) -> Result<()> {
        self.insert(0, dim, length)
    }

    /// Inserts `dim` with `length` at position `pos` (0 = outermost).
    pub fn insert(&mut self, pos: usize, dim: Dim, length: Index) -> Result<()> {
        if self.contains(dim) {
            return Err(Error::Dimension(format!(
                "Duplicate dimension {dim} in {self}."
            )));
        }
        if length < 0 {
            return Err(Error::Dimension(format!(
                "Negative length {length} for dimension {dim}."
            )));
        }
        if self.ndim() + 1 > NDIM_MAX {
            return Err(Error::Dimension(format!(
                "At most {NDIM_MAX} dimensions are supported, got {} in {self}.",
                self.ndim() + 1
            )));
        }
        let volume = self
            .volume()
            .checked_mul(length.max(1))
            .filter(|&v| v >= 0);
        if volume.is_none() {
            return Err(Error::Dimension(format!(
                "Volume of {self} with {{{dim}, {length}}} overflows the index type."
            )));
        }
        self.dims.insert(pos, (dim, length));
        Ok(())
    }

    /// Removes `dim`.
    pub fn erase(&mut self, dim: Dim) -> Result<()> {
        match self.index_of(dim) {
            Some(i) => {
                self.dims.remove(i);
                Ok(())
            }
            None => Err(Error::DimensionNotFound {
                dims: self.clone(),
                dim,
            }),
        }
    }

    /// Changes the length of an existing `dim`.
    pub fn resize(&mut self, dim: Dim, length: Index) -> Result<()> {
        let i = self.index_of(dim).ok_or_else(|| Error::DimensionNotFound {
            dims: self.clone(),
            dim,
        })?;
        if length < 0 {
            return Err(Error::Dimension(format!(
                "Negative length {length} for dimension {dim}."
            )));
        }
        self.dims[i].1 = length;
        Ok(())
    }

    /// Renames `from` to `to`, keeping its position and length.
    pub fn rename(&mut self, from: Dim, to: Dim) -> Result<()> {
        if from != to && self.contains(to) {
            return Err(Error::Dimension(format!(
                "Duplicate dimension {to} in {self}."
            )));
        }
        let i = self.index_of(from).ok_or_else(|| Error::DimensionNotFound {
            dims: self.clone(),
            dim: from,
        })?;
        self.dims[i].0 = to;
        Ok(())
    }
}

/// The minimal `Dimensions` containing `a` and `b` as subsets.
///
/// Shared labels must agree in length and keep their position in the
/// operand that determines the final shape: when one operand's labels are
/// a superset of the other's, the merge equals the superset. Otherwise
/// labels only in `b` are placed at the outer end, preserving their
/// relative order in `b`.
pub fn merge(a: &Dimensions, b: &Dimensions) -> Result<Dimensions> {
    for (dim, length) in b.iter() {
        if a.contains(dim) && a.length(dim)? != length {
            return Err(Error::DimensionLength {
                dims: a.clone(),
                dim,
                length,
            });
        }
    }
    // Shared labels take their position from the shape-determining operand:
    // a strict subset defers to the superset, otherwise `a` leads.
    let a_in_b = a.labels().all(|dim| b.contains(dim));
    let b_in_a = b.labels().all(|dim| a.contains(dim));
    let (base, other) = if a_in_b && !b_in_a { (b, a) } else { (a, b) };
    let mut out = Dimensions::new();
    for (dim, length) in other.iter() {
        if !base.contains(dim) {
            out.push_inner(dim, length)?;
        }
    }
    for (dim, length) in base.iter() {
        out.push_inner(dim, length)?;
    }
    Ok(out)
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (dim, length)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{{{dim}, {length}}}")?;
        }
        write!(f, "}}")
    }
}

impl std::fmt::Debug for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dimensions{self}")
    }
}
