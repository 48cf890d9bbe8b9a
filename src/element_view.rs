//! Typed views over strided element buffers.
//!
//! [`ElementArrayView`] couples a borrowed element buffer with the
//! (dimensions, strides, offset) triple describing how to walk it. It is
//! the read surface handed out by [`Variable::values`](crate::Variable) and
//! the access path used by the transform engine. The mutable counterpart
//! rejects broadcast layouts, since writing through a stride-0 axis would
//! alias elements.

use crate::dimensions::Dimensions;
use crate::error::{Error, Result};
use crate::strides::Strides;
use crate::view_index::ViewIndex;
use crate::Index;

/// Immutable strided view over a typed element buffer.
#[derive(Clone)]
pub struct ElementArrayView<'a, T> {
    data: &'a [T],
    offset: Index,
    dims: Dimensions,
    strides: Strides,
}

impl<'a, T> ElementArrayView<'a, T> {
    /// Creates a view; fails if any reachable offset leaves `data`.
    pub fn new(
        data: &'a [T],
        offset: Index,
        dims: Dimensions,
        strides: Strides,
    ) -> Result<ElementArrayView<'a, T>> {
        validate_bounds(data.len(), offset, &dims, &strides)?;
        Ok(ElementArrayView {
            data,
            offset,
            dims,
            strides,
        })
    }

    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    pub fn strides(&self) -> &Strides {
        &self.strides
    }

    /// Number of logical elements.
    pub fn len(&self) -> Index {
        self.dims.volume()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at logical (row-major) position `index`.
    pub fn get(&self, index: Index) -> &'a T {
        let mut view_index = ViewIndex::new(&self.dims, &self.strides);
        view_index.set_index(index);
        &self.data[(self.offset + view_index.offset()) as usize]
    }

    /// Iterates elements in logical row-major order.
    pub fn iter(&self) -> Iter<'a, T> {
        Iter {
            data: self.data,
            base: self.offset,
            index: ViewIndex::new(&self.dims, &self.strides),
            remaining: self.len(),
        }
    }

    /// The contiguous slice behind this view, if the layout is row-major
    /// with no broadcast.
    pub fn as_slice(&self) -> Option<&'a [T]> {
        if self.strides.is_contiguous(&self.dims) {
            let begin = self.offset as usize;
            Some(&self.data[begin..begin + self.len() as usize])
        } else {
            None
        }
    }
}

impl<'a, T: Clone> ElementArrayView<'a, T> {
    /// Collects the elements in logical order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

/// Row-major element iterator of an [`ElementArrayView`].
pub struct Iter<'a, T> {
    data: &'a [T],
    base: Index,
    index: ViewIndex,
    remaining: Index,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let element = &self.data[(self.base + self.index.offset()) as usize];
        self.index.increment();
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}

/// Mutable strided view; broadcast layouts are rejected.
pub struct ElementArrayViewMut<'a, T> {
    data: &'a mut [T],
    offset: Index,
    dims: Dimensions,
    strides: Strides,
}

impl<'a, T> ElementArrayViewMut<'a, T> {
    /// Creates a mutable view; fails on out-of-bounds layouts and on
    /// stride-0 axes of length > 1.
    pub fn new(
        data: &'a mut [T],
        offset: Index,
        dims: Dimensions,
        strides: Strides,
    ) -> Result<ElementArrayViewMut<'a, T>> {
        if strides.has_broadcast(&dims) {
            return Err(Error::Dimension(format!(
                "Cannot write through a broadcast view of {dims}."
            )));
        }
        validate_bounds(data.len(), offset, &dims, &strides)?;
        Ok(ElementArrayViewMut {
            data,
            offset,
            dims,
            strides,
        })
    }

    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    pub fn len(&self) -> Index {
        self.dims.volume()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies `f` to every element in logical row-major order.
    pub fn for_each(&mut self, mut f: impl FnMut(&mut T)) {
        let mut index = ViewIndex::new(&self.dims, &self.strides);
        for _ in 0..self.len() {
            f(&mut self.data[(self.offset + index.offset()) as usize]);
            index.increment();
        }
    }

    /// Overwrites the view from `values` in logical order.
    ///
    /// Fails unless `values` has exactly as many elements as the view.
    pub fn assign_from<I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        let mut index = ViewIndex::new(&self.dims, &self.strides);
        let mut written = 0;
        for value in values {
            if written == self.len() {
                return Err(Error::Dimension(format!(
                    "Too many elements for a view of {}.",
                    self.dims
                )));
            }
            self.data[(self.offset + index.offset()) as usize] = value;
            index.increment();
            written += 1;
        }
        if written != self.len() {
            return Err(Error::Dimension(format!(
                "Expected {} elements for a view of {}, got {written}.",
                self.len(),
                self.dims
            )));
        }
        Ok(())
    }

    /// The contiguous slice behind this view, if the layout is row-major.
    pub fn as_slice_mut(&mut self) -> Option<&mut [T]> {
        if self.strides.is_contiguous(&self.dims) {
            let begin = self.offset as usize;
            let end = begin + self.len() as usize;
            Some(&mut self.data[begin..end])
        } else {
            None
        }
    }
}

fn validate_bounds(
    data_len: usize,
    offset: Index,
    dims: &Dimensions,
    strides: &Strides,
) -> Result<()> {
    if dims.ndim() != strides.ndim() {
        return Err(Error::Dimension(format!(
            "Strides of rank {} do not match {dims}.",
            strides.ndim()
        )));
    }
    if dims.volume() == 0 {
        return Ok(());
    }
    let mut min = offset;
    let mut max = offset;
    for (i, (_, length)) in dims.iter().enumerate() {
        let span = strides.get(i) * (length - 1).max(0);
        if span >= 0 {
            max += span;
        } else {
            min += span;
        }
    }
    if min < 0 || max as usize >= data_len {
        return Err(Error::Dimension(format!(
            "View of {dims} reaches offsets [{min}, {max}] outside a buffer of length {data_len}."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dim::Dim;

    fn dims(pairs: &[(Dim, Index)]) -> Dimensions {
        Dimensions::from_pairs(pairs).unwrap()
    }

    #[test]
    fn contiguous_view_exposes_slice() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let d = dims(&[(Dim::Y, 2), (Dim::X, 3)]);
        let view = ElementArrayView::new(&data, 0, d.clone(), Strides::row_major(&d)).unwrap();
        assert_eq!(view.as_slice(), Some(&data[..]));
        assert_eq!(view.to_vec(), data);
    }

    #[test]
    fn strided_view_iterates_logical_order() {
        // Inner slice x=1 of a {y, 2}, {x, 3} buffer.
        let data = [1, 2, 3, 4, 5, 6];
        let d = dims(&[(Dim::Y, 2)]);
        let view =
            ElementArrayView::new(&data, 1, d, Strides::from_vec(vec![3])).unwrap();
        assert_eq!(view.as_slice(), None);
        assert_eq!(view.to_vec(), vec![2, 5]);
        assert_eq!(*view.get(1), 5);
    }

    #[test]
    fn broadcast_view_repeats_elements() {
        let data = [10, 20];
        let d = dims(&[(Dim::Y, 2), (Dim::X, 3)]);
        let view =
            ElementArrayView::new(&data, 0, d, Strides::from_vec(vec![1, 0])).unwrap();
        assert_eq!(view.to_vec(), vec![10, 10, 10, 20, 20, 20]);
    }

    #[test]
    fn out_of_bounds_layout_is_rejected() {
        let data = [1, 2, 3];
        let d = dims(&[(Dim::X, 4)]);
        assert!(ElementArrayView::new(&data, 0, d, Strides::from_vec(vec![1])).is_err());
    }

    #[test]
    fn mutable_view_rejects_broadcast() {
        let mut data = [1, 2];
        let d = dims(&[(Dim::Y, 2), (Dim::X, 3)]);
        assert!(
            ElementArrayViewMut::new(&mut data, 0, d, Strides::from_vec(vec![1, 0])).is_err()
        );
    }

    #[test]
    fn assign_from_checks_element_count() {
        let mut data = [0, 0, 0, 0];
        let d = dims(&[(Dim::X, 4)]);
        let mut view =
            ElementArrayViewMut::new(&mut data, 0, d, Strides::from_vec(vec![1])).unwrap();
        assert!(view.assign_from([1, 2, 3]).is_err());
        assert!(view.assign_from([1, 2, 3, 4]).is_ok());
        assert_eq!(data, [1, 2, 3, 4]);
    }
}
