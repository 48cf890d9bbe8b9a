//! Shape operations: concatenation and range copies.
//!
//! Dense concatenation joins two variables along an existing or a new
//! dimension. Bin-edge coordinates have their own join, [`concat_edges`],
//! which checks the seam instead of guessing whether a variable is an edge
//! coordinate: the last edge of the left operand must equal the first edge
//! of the right operand, and the duplicated seam edge is dropped.

use crate::dim::Dim;
use crate::dtype::{DType, Element};
use crate::element_view::{ElementArrayView, ElementArrayViewMut};
use crate::error::{Error, Result};
use crate::transform::broadcast_strides;
use crate::variable::{dispatch_element, Variable};
use crate::Index;

/// Copies `src` into the `[dst_begin, dst_begin + len)` slice of `dst`
/// along `dim`, where `len` is `src`'s length along `dim` (1 if absent).
///
/// `src` may omit `dim`; all other labels must match `dst`'s lengths.
pub(crate) fn copy_into_range(
    src: &Variable,
    dst: &mut Variable,
    dim: Dim,
    dst_begin: Index,
) -> Result<()> {
    fn typed<T: Element>(
        src: &Variable,
        dst: &mut Variable,
        dim: Dim,
        dst_begin: Index,
    ) -> Result<()> {
        let pos = dst
            .dims()
            .index_of(dim)
            .ok_or_else(|| Error::DimensionNotFound {
                dims: dst.dims().clone(),
                dim,
            })?;
        let src_len = src.dims().length(dim).unwrap_or(1);
        let mut slice_dims = dst.dims().clone();
        slice_dims.resize(dim, src_len)?;
        for (label, length) in slice_dims.iter() {
            if label != dim && src.dims().length(label)? != length {
                return Err(Error::DimensionLength {
                    dims: src.dims().clone(),
                    dim: label,
                    length,
                });
            }
        }
        if src.has_variances() != dst.has_variances() {
            return Err(Error::Variances(
                "Either both or none of the operands must have a variance.".into(),
            ));
        }

        let src_strides = broadcast_strides(src, &slice_dims)?;
        let (src_values, src_variances) = src.full_data::<T>()?;
        let values: Vec<T> = ElementArrayView::new(
            src_values,
            src.offset(),
            slice_dims.clone(),
            src_strides.clone(),
        )?
        .to_vec();
        let variances: Option<Vec<T>> = match src_variances {
            Some(buffer) => Some(
                ElementArrayView::new(buffer, src.offset(), slice_dims.clone(), src_strides)?
                    .to_vec(),
            ),
            None => None,
        };

        let slice_offset = dst.offset() + dst_begin * dst.strides().get(pos);
        let dst_strides = dst.strides().clone();
        let (dst_values, dst_variances) = dst.full_data_mut::<T>()?;
        ElementArrayViewMut::new(dst_values, slice_offset, slice_dims.clone(), dst_strides.clone())?
            .assign_from(values)?;
        if let Some(variances) = variances {
            let buffer = dst_variances
                .ok_or_else(|| Error::Variances("Variable has no variances.".into()))?;
            ElementArrayViewMut::new(buffer, slice_offset, slice_dims, dst_strides)?
                .assign_from(variances)?;
        }
        Ok(())
    }
    if src.dtype() != dst.dtype() {
        return Err(Error::TypeMismatch {
            expected: dst.dtype(),
            actual: src.dtype(),
        });
    }
    dispatch_element!(
        dst.dtype(),
        typed(src, dst, dim, dst_begin),
        Err(Error::TypeUnsupported {
            op: "copy",
            dtype: DType::Binned,
        })
    )
}

/// Length along `dim` each operand contributes to a concatenation: its
/// length if it has the dim, otherwise 1 (stacking).
fn contributed_length(var: &Variable, dim: Dim) -> Index {
    var.dims().length(dim).unwrap_or(1)
}

/// Joins `a` and `b` along `dim`.
///
/// If neither operand has `dim`, it is created at the outer end (stacking
/// two slices of length 1). Binned operands forward to the bin-wise
/// concatenation when `dim` is not one of their dims.
pub fn concatenate(a: &Variable, b: &Variable, dim: Dim) -> Result<Variable> {
    if a.is_binned() && b.is_binned() && !a.dims().contains(dim) {
        return crate::binned::concatenate_bins(a, b);
    }
    if a.dtype() != b.dtype() {
        return Err(Error::TypeMismatch {
            expected: a.dtype(),
            actual: b.dtype(),
        });
    }
    if a.unit() != b.unit() {
        return Err(Error::UnitMismatch {
            expected: a.unit(),
            actual: b.unit(),
        });
    }
    if a.has_variances() != b.has_variances() {
        return Err(Error::Variances(
            "Either both or none of the operands must have a variance.".into(),
        ));
    }

    let a_len = contributed_length(a, dim);
    let b_len = contributed_length(b, dim);
    let mut out_dims = if a.dims().contains(dim) {
        a.dims().clone()
    } else {
        // The new label goes to the outer end, matching the merge rule.
        let mut dims = a.dims().clone();
        dims.push_outer(dim, 0)?;
        dims
    };
    out_dims.resize(dim, a_len + b_len)?;

    // Both operands must agree on every other label.
    for (label, length) in out_dims.iter() {
        if label == dim {
            continue;
        }
        for operand in [a, b] {
            if operand.dims().length(label)? != length {
                return Err(Error::DimensionLength {
                    dims: operand.dims().clone(),
                    dim: label,
                    length,
                });
            }
        }
    }

    let mut out =
        crate::factory::create_variable(a.dtype(), &out_dims, a.unit(), a.has_variances())?;
    copy_into_range(a, &mut out, dim, 0)?;
    copy_into_range(b, &mut out, dim, a_len)?;
    Ok(out)
}

/// Joins two bin-edge coordinates along `dim`, dropping the duplicated
/// seam edge.
///
/// The last edge of `a` must equal the first edge of `b`.
pub fn concat_edges(a: &Variable, b: &Variable, dim: Dim) -> Result<Variable> {
    let a_len = a.dims().length(dim)?;
    let b_len = b.dims().length(dim)?;
    if a_len < 2 || b_len < 2 {
        return Err(Error::BinEdge(format!(
            "Expected at least two edges along {dim}, got {a_len} and {b_len}."
        )));
    }
    let a_last = a.slice(dim, a_len - 1)?;
    let b_first = b.slice(dim, 0)?;
    if a_last != b_first {
        return Err(Error::BinEdge(format!(
            "Expected the last edge of the left operand to equal the first edge of the \
             right operand along {dim}."
        )));
    }
    concatenate(a, &b.slice_range(dim, 1, b_len)?, dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::Dimensions;
    use crate::unit::Unit;

    fn dims(pairs: &[(Dim, Index)]) -> Dimensions {
        Dimensions::from_pairs(pairs).unwrap()
    }

    #[test]
    fn concatenate_along_existing_dim() {
        let a = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![1.0, 2.0]).unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 3)]), Unit::M, vec![3.0, 4.0, 5.0])
            .unwrap();
        let joined = concatenate(&a, &b, Dim::X).unwrap();
        assert_eq!(joined.dims(), &dims(&[(Dim::X, 5)]));
        assert_eq!(
            joined.values::<f64>().unwrap().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0]
        );
    }

    #[test]
    fn concatenate_along_new_dim_stacks() {
        let a = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![1.0, 2.0]).unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![3.0, 4.0]).unwrap();
        let stacked = concatenate(&a, &b, Dim::Y).unwrap();
        assert_eq!(stacked.dims(), &dims(&[(Dim::Y, 2), (Dim::X, 2)]));
        assert_eq!(
            stacked.values::<f64>().unwrap().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn concatenate_2d_along_inner_dim() {
        let a = Variable::new::<i64>(
            dims(&[(Dim::Y, 2), (Dim::X, 2)]),
            Unit::DIMENSIONLESS,
            vec![1, 2, 5, 6],
        )
        .unwrap();
        let b = Variable::new::<i64>(
            dims(&[(Dim::Y, 2), (Dim::X, 1)]),
            Unit::DIMENSIONLESS,
            vec![3, 7],
        )
        .unwrap();
        let joined = concatenate(&a, &b, Dim::X).unwrap();
        assert_eq!(joined.dims(), &dims(&[(Dim::Y, 2), (Dim::X, 3)]));
        assert_eq!(
            joined.values::<i64>().unwrap().to_vec(),
            vec![1, 2, 3, 5, 6, 7]
        );
    }

    #[test]
    fn concatenate_checks_units_and_dtypes() {
        let a = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![1.0]).unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::S, vec![2.0]).unwrap();
        assert!(matches!(
            concatenate(&a, &b, Dim::X),
            Err(Error::UnitMismatch { .. })
        ));
        let c = Variable::new::<i64>(dims(&[(Dim::X, 1)]), Unit::M, vec![2]).unwrap();
        assert!(matches!(
            concatenate(&a, &c, Dim::X),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn concatenate_carries_variances() {
        let a = Variable::with_variances::<f64>(
            dims(&[(Dim::X, 1)]),
            Unit::M,
            vec![1.0],
            vec![0.1],
        )
        .unwrap();
        let b = Variable::with_variances::<f64>(
            dims(&[(Dim::X, 1)]),
            Unit::M,
            vec![2.0],
            vec![0.2],
        )
        .unwrap();
        let joined = concatenate(&a, &b, Dim::X).unwrap();
        assert_eq!(
            joined.variances::<f64>().unwrap().to_vec(),
            vec![0.1, 0.2]
        );
        let plain = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![3.0]).unwrap();
        assert!(matches!(
            concatenate(&a, &plain, Dim::X),
            Err(Error::Variances(_))
        ));
    }

    #[test]
    fn edge_concatenation_drops_the_seam() {
        let a = Variable::new::<f64>(dims(&[(Dim::X, 3)]), Unit::M, vec![0.0, 1.0, 2.0])
            .unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 3)]), Unit::M, vec![2.0, 3.0, 4.0])
            .unwrap();
        let edges = concat_edges(&a, &b, Dim::X).unwrap();
        assert_eq!(
            edges.values::<f64>().unwrap().to_vec(),
            vec![0.0, 1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn mismatched_seam_is_a_bin_edge_error() {
        let a = Variable::new::<f64>(dims(&[(Dim::X, 3)]), Unit::M, vec![0.0, 1.0, 2.0])
            .unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 3)]), Unit::M, vec![2.5, 3.0, 4.0])
            .unwrap();
        assert!(matches!(
            concat_edges(&a, &b, Dim::X),
            Err(Error::BinEdge(_))
        ));
    }
}
