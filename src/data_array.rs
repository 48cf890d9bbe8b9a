//! A variable with attached coordinates, masks and attributes.
//!
//! `DataArray` is the metadata-carrying collaborator of the core: the data
//! variable plus dictionaries of coordinate, mask and attribute variables.
//! A coordinate along dim `d` is *aligned* when its length equals the data
//! length, or the data length plus one (a bin-edge coordinate). Whether a
//! variable is an edge coordinate is decided here, where a sibling length
//! is available; a standalone variable is never guessed to be one.

use std::collections::BTreeMap;

use crate::dim::Dim;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::shape::{concat_edges, concatenate};
use crate::variable::Variable;
use crate::Index;

/// A data variable with coords, masks and attrs.
#[derive(Debug, Clone)]
pub struct DataArray {
    name: String,
    data: Variable,
    coords: BTreeMap<Dim, Variable>,
    masks: BTreeMap<String, Variable>,
    attrs: BTreeMap<String, Variable>,
}

impl DataArray {
    pub fn new(name: impl Into<String>, data: Variable) -> DataArray {
        DataArray {
            name: name.into(),
            data,
            coords: BTreeMap::new(),
            masks: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn data(&self) -> &Variable {
        &self.data
    }

    pub fn coords(&self) -> &BTreeMap<Dim, Variable> {
        &self.coords
    }

    pub fn masks(&self) -> &BTreeMap<String, Variable> {
        &self.masks
    }

    pub fn attrs(&self) -> &BTreeMap<String, Variable> {
        &self.attrs
    }

    /// Adds a coordinate for `dim`.
    ///
    /// Along every label shared with the data, the coordinate's length must
    /// equal the data length or the data length plus one (bin edges).
    pub fn set_coord(&mut self, dim: Dim, coord: Variable) -> Result<()> {
        for (label, length) in coord.dims().iter() {
            if !self.data.dims().contains(label) {
                continue;
            }
            let data_length = self.data.dims().length(label)?;
            if length != data_length && length != data_length + 1 {
                return Err(Error::DimensionLength {
                    dims: self.data.dims().clone(),
                    dim: label,
                    length,
                });
            }
        }
        self.coords.insert(dim, coord);
        Ok(())
    }

    /// Adds a boolean mask; masked elements are excluded by consumers.
    pub fn set_mask(&mut self, name: impl Into<String>, mask: Variable) -> Result<()> {
        if mask.dtype() != DType::Bool {
            return Err(Error::TypeMismatch {
                expected: DType::Bool,
                actual: mask.dtype(),
            });
        }
        if !self.data.dims().includes(mask.dims()) {
            return Err(Error::DimensionMismatch {
                expected: self.data.dims().clone(),
                actual: mask.dims().clone(),
            });
        }
        self.masks.insert(name.into(), mask);
        Ok(())
    }

    /// Adds an attribute (unaligned metadata).
    pub fn set_attr(&mut self, name: impl Into<String>, attr: Variable) {
        self.attrs.insert(name.into(), attr);
    }

    /// True if the coordinate for `dim` is a bin-edge coordinate.
    pub fn is_edges(&self, dim: Dim) -> bool {
        let Some(coord) = self.coords.get(&dim) else {
            return false;
        };
        match (coord.dims().length(dim), self.data.dims().length(dim)) {
            (Ok(coord_length), Ok(data_length)) => coord_length == data_length + 1,
            _ => false,
        }
    }

    /// OR of all masks that are exactly 1-D along `dim`.
    pub(crate) fn combined_mask(&self, dim: Dim) -> Result<Option<Vec<bool>>> {
        let length = self.data.dims().length(dim)? as usize;
        let mut combined: Option<Vec<bool>> = None;
        for mask in self.masks.values() {
            if mask.ndim() != 1 || !mask.dims().contains(dim) {
                continue;
            }
            let values = mask.values::<bool>()?.to_vec();
            if values.len() != length {
                continue;
            }
            match &mut combined {
                Some(combined) => {
                    for (slot, value) in combined.iter_mut().zip(values) {
                        *slot |= value;
                    }
                }
                None => combined = Some(values),
            }
        }
        Ok(combined)
    }

    /// Selects a single index along `dim`.
    ///
    /// Non-edge coordinates lose the dim; edge coordinates keep the two
    /// surrounding edges and become unaligned.
    pub fn slice(&self, dim: Dim, index: Index) -> Result<DataArray> {
        let is_edges = self.is_edges(dim);
        let mut out = DataArray::new(self.name.clone(), self.data.slice(dim, index)?);
        for (&coord_dim, coord) in &self.coords {
            let sliced = if coord.dims().contains(dim) {
                if is_edges && coord_dim == dim {
                    coord.slice_range(dim, index, index + 2)?
                } else {
                    coord.slice(dim, index)?
                }
            } else {
                coord.clone()
            };
            out.coords.insert(coord_dim, sliced);
        }
        for (name, mask) in &self.masks {
            let sliced = if mask.dims().contains(dim) {
                mask.slice(dim, index)?
            } else {
                mask.clone()
            };
            out.masks.insert(name.clone(), sliced);
        }
        out.attrs = self.attrs.clone();
        Ok(out)
    }

    /// Restricts `dim` to `[begin, end)`; edge coordinates keep `end + 1`
    /// edges.
    pub fn slice_range(&self, dim: Dim, begin: Index, end: Index) -> Result<DataArray> {
        let is_edges = self.is_edges(dim);
        let mut out = DataArray::new(self.name.clone(), self.data.slice_range(dim, begin, end)?);
        for (&coord_dim, coord) in &self.coords {
            let sliced = if coord.dims().contains(dim) {
                if is_edges && coord_dim == dim {
                    coord.slice_range(dim, begin, end + 1)?
                } else {
                    coord.slice_range(dim, begin, end)?
                }
            } else {
                coord.clone()
            };
            out.coords.insert(coord_dim, sliced);
        }
        for (name, mask) in &self.masks {
            let sliced = if mask.dims().contains(dim) {
                mask.slice_range(dim, begin, end)?
            } else {
                mask.clone()
            };
            out.masks.insert(name.clone(), sliced);
        }
        out.attrs = self.attrs.clone();
        Ok(out)
    }
}

/// Concatenates two data arrays along `dim`.
///
/// Edge coordinates along `dim` are joined with the seam check; other
/// coordinates containing `dim` are joined plainly; coordinates without
/// `dim` must match between the operands. The left operand's attrs are
/// kept unchanged.
pub fn concatenate_data_arrays(a: &DataArray, b: &DataArray, dim: Dim) -> Result<DataArray> {
    let mut out = DataArray::new(a.name().to_owned(), concatenate(a.data(), b.data(), dim)?);
    for (&coord_dim, coord_a) in a.coords() {
        let Some(coord_b) = b.coords().get(&coord_dim) else {
            return Err(Error::Dimension(format!(
                "Missing coordinate {coord_dim} in the right operand of 'concatenate'."
            )));
        };
        let joined = if coord_a.dims().contains(dim) {
            if a.is_edges(dim) && coord_dim == dim {
                concat_edges(coord_a, coord_b, dim)?
            } else {
                concatenate(coord_a, coord_b, dim)?
            }
        } else {
            if coord_a != coord_b {
                return Err(Error::Dimension(format!(
                    "Mismatching coordinate {coord_dim} in 'concatenate'."
                )));
            }
            coord_a.clone()
        };
        out.coords.insert(coord_dim, joined);
    }
    for (name, mask_a) in a.masks() {
        let Some(mask_b) = b.masks().get(name) else {
            continue;
        };
        let joined = if mask_a.dims().contains(dim) {
            concatenate(mask_a, mask_b, dim)?
        } else {
            mask_a.clone()
        };
        out.masks.insert(name.clone(), joined);
    }
    out.attrs = a.attrs().clone();
    Ok(out)
}
