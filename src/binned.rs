//! Binned (bucketed) variables.
//!
//! A binned variable stores an array of `[begin, end)` index pairs plus a
//! shared buffer variable; logical element `i` is the buffer slice
//! `buffer[indices[i]]` along the bin dimension. Operations forward to
//! transforms over the buffer, indexed through the per-bin ranges. Slicing
//! a binned variable slices the index array and shares the buffer.

use std::sync::Arc;

use crate::dim::Dim;
use crate::dimensions::{merge, Dimensions};
use crate::dtype::DType;
use crate::element_view::ElementArrayView;
use crate::error::{Error, Result};
use crate::spatial::IndexPair;
use crate::transform::{
    broadcast_strides, BinaryOp, FloatElement, Promote, VariancePolicy,
};
use crate::unit::Unit;
use crate::variable::{Variable, VariableData};
use crate::Index;

pub(crate) struct BinnedData {
    indices: Vec<IndexPair>,
    bin_dim: Dim,
    buffer: Variable,
}

impl VariableData for BinnedData {
    fn dtype(&self) -> DType {
        DType::Binned
    }

    fn len(&self) -> Index {
        self.indices.len() as Index
    }

    fn has_variances(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn VariableData> {
        // The buffer handle stays shared; its own copy-on-write applies on
        // mutation.
        Box::new(BinnedData {
            indices: self.indices.clone(),
            bin_dim: self.bin_dim,
            buffer: self.buffer.clone(),
        })
    }
}

fn binned_data(var: &Variable) -> Result<&BinnedData> {
    var.data()
        .as_any()
        .downcast_ref::<BinnedData>()
        .ok_or(Error::TypeMismatch {
            expected: DType::Binned,
            actual: var.dtype(),
        })
}

/// The index pairs of `var` in logical order, plus bin dim and buffer.
pub(crate) fn binned_parts(
    var: &Variable,
) -> Result<(ElementArrayView<'_, IndexPair>, Dim, &Variable)> {
    let data = binned_data(var)?;
    let view = ElementArrayView::new(
        &data.indices,
        var.offset(),
        var.dims().clone(),
        var.strides().clone(),
    )?;
    Ok((view, data.bin_dim, &data.buffer))
}

/// The backing buffer of a binned variable.
pub fn buffer(var: &Variable) -> Option<&Variable> {
    binned_data(var).ok().map(|data| &data.buffer)
}

/// The bin dimension of a binned variable.
pub fn bin_dim(var: &Variable) -> Result<Dim> {
    Ok(binned_data(var)?.bin_dim)
}

pub(crate) fn set_buffer_unit(var: &mut Variable, unit: Unit) {
    if let Ok(data) = var.data_mut() {
        if let Some(binned) = data.as_any_mut().downcast_mut::<BinnedData>() {
            binned.buffer.set_unit(unit);
        }
    }
}

/// Constructs a binned variable, validating the bin layout.
///
/// Every pair must satisfy `0 <= begin <= end <= buffer_len` and the
/// ranges must be ascending and non-overlapping.
pub fn make_bins(indices: Variable, dim: Dim, buffer: Variable) -> Result<Variable> {
    let length = buffer.dims().length(dim)?;
    let pairs = indices.values::<IndexPair>()?;
    let mut previous_end = 0;
    for pair in pairs.iter() {
        if pair.begin < 0 || pair.begin > pair.end || pair.end > length {
            return Err(Error::Slice {
                dim,
                begin: pair.begin,
                end: pair.end,
                length,
            });
        }
        if pair.begin < previous_end {
            return Err(Error::Dimension(format!(
                "Bin indices must be ascending and non-overlapping, got [{}, {}) after \
                 an earlier bin ending at {previous_end}.",
                pair.begin, pair.end
            )));
        }
        previous_end = pair.end;
    }
    make_bins_no_validate(indices, dim, buffer)
}

/// Constructs a binned variable without layout validation.
///
/// The caller guarantees index validity; overlapping bins are admitted.
pub fn make_bins_no_validate(
    indices: Variable,
    dim: Dim,
    buffer: Variable,
) -> Result<Variable> {
    buffer.dims().length(dim)?;
    let dims = indices.dims().clone();
    let pairs = indices.values::<IndexPair>()?.to_vec();
    Ok(Variable::from_data(
        dims,
        Unit::DIMENSIONLESS,
        Arc::new(BinnedData {
            indices: pairs,
            bin_dim: dim,
            buffer,
        }),
    ))
}

/// The index pairs as an `IndexPair` variable.
pub fn bin_indices(var: &Variable) -> Result<Variable> {
    let (pairs, _, _) = binned_parts(var)?;
    Variable::new::<IndexPair>(var.dims().clone(), Unit::DIMENSIONLESS, pairs.to_vec())
}

/// `end - begin` for every bin.
pub fn bin_sizes(var: &Variable) -> Result<Variable> {
    let (pairs, _, _) = binned_parts(var)?;
    let sizes = pairs.iter().map(IndexPair::len).collect();
    Variable::new::<i64>(var.dims().clone(), Unit::DIMENSIONLESS, sizes)
}

/// A deep copy: cloned indices, deep-copied buffer.
pub(crate) fn copy_binned(var: &Variable) -> Result<Variable> {
    let (pairs, dim, buffer) = binned_parts(var)?;
    let indices = Variable::new::<IndexPair>(
        var.dims().clone(),
        Unit::DIMENSIONLESS,
        pairs.to_vec(),
    )?;
    make_bins_no_validate(indices, dim, buffer.copy()?)
}

/// Reduces every bin's buffer slice to a single element.
pub fn bucket_sum(var: &Variable) -> Result<Variable> {
    fn sum_typed<T>(var: &Variable) -> Result<Variable>
    where
        T: FloatElement,
    {
        let (pairs, dim, buffer) = binned_parts(var)?;
        let with_variances = buffer.has_variances();
        let mut values = Vec::with_capacity(pairs.len() as usize);
        let mut variances = with_variances.then(Vec::new);
        for pair in pairs.iter() {
            let slice = buffer.slice_range(dim, pair.begin, pair.end)?;
            let total = slice.values::<T>()?.iter().fold(T::zero(), |acc, &v| acc + v);
            values.push(total);
            if let Some(variances) = &mut variances {
                let total = slice
                    .variances::<T>()?
                    .iter()
                    .fold(T::zero(), |acc, &v| acc + v);
                variances.push(total);
            }
        }
        let dims = var.dims().clone();
        match variances {
            Some(variances) => {
                Variable::with_variances::<T>(dims, buffer.unit(), values, variances)
            }
            None => Variable::new::<T>(dims, buffer.unit(), values),
        }
    }
    fn sum_int<T>(var: &Variable) -> Result<Variable>
    where
        T: crate::transform::NumericElement,
    {
        let (pairs, dim, buffer) = binned_parts(var)?;
        let mut values = Vec::with_capacity(pairs.len() as usize);
        for pair in pairs.iter() {
            let slice = buffer.slice_range(dim, pair.begin, pair.end)?;
            let total = slice.values::<T>()?.iter().fold(T::zero(), |acc, &v| acc + v);
            values.push(total);
        }
        Variable::new::<T>(var.dims().clone(), buffer.unit(), values)
    }
    let buffer_dtype = binned_data(var)?.buffer.dtype();
    match buffer_dtype {
        DType::Float64 => sum_typed::<f64>(var),
        DType::Float32 => sum_typed::<f32>(var),
        DType::Int64 => sum_int::<i64>(var),
        DType::Int32 => sum_int::<i32>(var),
        dtype => Err(Error::TypeUnsupported {
            op: "bucket_sum",
            dtype,
        }),
    }
}

fn expect_matching_buffers(a: &Variable, b: &Variable, a_dim: Dim, b_dim: Dim) -> Result<()> {
    if a_dim != b_dim {
        return Err(Error::Dimension(format!(
            "Bin dimensions differ: {a_dim} vs {b_dim}."
        )));
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
            "Either both or none of the bin buffers must have variances.".into(),
        ));
    }
    Ok(())
}

/// Bin-wise concatenation: each output bin is the concatenation of the
/// operands' bins. One operand may be a broadcast of the other.
pub fn concatenate_bins(a: &Variable, b: &Variable) -> Result<Variable> {
    let (_, a_dim, a_buffer) = binned_parts(a)?;
    let (_, b_dim, b_buffer) = binned_parts(b)?;
    expect_matching_buffers(a_buffer, b_buffer, a_dim, b_dim)?;

    let out_dims = merge(a.dims(), b.dims())?;
    if out_dims != *a.dims() && out_dims != *b.dims() {
        return Err(Error::Dimension(format!(
            "Expected one operand of 'concatenate' to contain {out_dims}, got {} and {}.",
            a.dims(),
            b.dims()
        )));
    }

    let a_pairs = broadcast_pairs(a, &out_dims)?;
    let b_pairs = broadcast_pairs(b, &out_dims)?;

    let total: Index = a_pairs
        .iter()
        .zip(&b_pairs)
        .map(|(pa, pb)| pa.len() + pb.len())
        .sum();
    let mut buffer_dims = a_buffer.dims().clone();
    buffer_dims.resize(a_dim, total)?;
    let mut out_buffer = crate::factory::create_variable(
        a_buffer.dtype(),
        &buffer_dims,
        a_buffer.unit(),
        a_buffer.has_variances(),
    )?;

    let mut indices = Vec::with_capacity(a_pairs.len());
    let mut cursor = 0;
    for (pa, pb) in a_pairs.iter().zip(&b_pairs) {
        let begin = cursor;
        copy_bin(a_buffer, *pa, &mut out_buffer, cursor, a_dim)?;
        cursor += pa.len();
        copy_bin(b_buffer, *pb, &mut out_buffer, cursor, a_dim)?;
        cursor += pb.len();
        indices.push(IndexPair::new(begin, cursor));
    }

    let index_var = Variable::new::<IndexPair>(out_dims, Unit::DIMENSIONLESS, indices)?;
    make_bins_no_validate(index_var, a_dim, out_buffer)
}

/// In-place bin-wise append; requires exactly matching dimensions.
pub fn append_bins(a: &mut Variable, b: &Variable) -> Result<()> {
    if a.dims() != b.dims() {
        return Err(Error::DimensionMismatch {
            expected: a.dims().clone(),
            actual: b.dims().clone(),
        });
    }
    let combined = concatenate_bins(a, b)?;
    *a = combined;
    Ok(())
}

fn broadcast_pairs(var: &Variable, out_dims: &Dimensions) -> Result<Vec<IndexPair>> {
    let data = binned_data(var)?;
    let strides = broadcast_strides(var, out_dims)?;
    let view = ElementArrayView::new(
        &data.indices,
        var.offset(),
        out_dims.clone(),
        strides,
    )?;
    Ok(view.to_vec())
}

fn copy_bin(
    src: &Variable,
    range: IndexPair,
    dst: &mut Variable,
    dst_begin: Index,
    dim: Dim,
) -> Result<()> {
    if range.is_empty() {
        return Ok(());
    }
    let src_slice = src.slice_range(dim, range.begin, range.end)?;
    crate::shape::copy_into_range(&src_slice, dst, dim, dst_begin)
}

// ============================================================================
// Arithmetic over bins
// ============================================================================

/// Out-of-place arithmetic involving binned operands.
///
/// Supported forms: `binned op dense` (`*`, `/`; the dense operand
/// broadcasts over the bins), `dense * binned`, and `binned op binned` with
/// identical bin layouts.
pub(crate) fn arithmetic<Op: BinaryOp>(
    a: &Variable,
    b: &Variable,
    op: Op,
) -> Result<Variable> {
    match (a.is_binned(), b.is_binned()) {
        (true, true) => binned_binned(a, b, op),
        (true, false) => {
            let mut out = copy_binned(a)?;
            scale_in_place(&mut out, b, op)?;
            Ok(out)
        }
        (false, true) => {
            // Only multiplication commutes around a binned operand.
            if Op::NAME != "times" {
                return Err(Error::TypeUnsupported {
                    op: Op::NAME,
                    dtype: DType::Binned,
                });
            }
            let mut out = copy_binned(b)?;
            scale_in_place(&mut out, a, op)?;
            Ok(out)
        }
        (false, false) => Err(Error::TypeUnsupported {
            op: Op::NAME,
            dtype: a.dtype(),
        }),
    }
}

/// In-place arithmetic on a binned destination with a dense operand.
pub(crate) fn arithmetic_in_place<Op: BinaryOp>(
    a: &mut Variable,
    b: &Variable,
    op: Op,
) -> Result<()> {
    if b.is_binned() {
        let result = binned_binned(a, b, op)?;
        *a = result;
        return Ok(());
    }
    scale_in_place(a, b, op)
}

/// Elementwise operation over two binned variables with identical layouts.
fn binned_binned<Op: BinaryOp>(a: &Variable, b: &Variable, op: Op) -> Result<Variable> {
    let (a_pairs, a_dim, a_buffer) = binned_parts(a)?;
    let (b_pairs, b_dim, b_buffer) = binned_parts(b)?;
    if a.dims() != b.dims() || a_dim != b_dim || !a_pairs.iter().eq(b_pairs.iter()) {
        return Err(Error::Dimension(format!(
            "Binned operands of '{}' must have identical bin layouts.",
            Op::NAME
        )));
    }
    let out_buffer = crate::transform::transform_binary(a_buffer, b_buffer, op)?;
    let indices = bin_indices(a)?;
    make_bins_no_validate(indices, a_dim, out_buffer)
}

/// Applies `op` between every buffer element of a bin and the dense value
/// at that bin's position; `dense` broadcasts over the binned dims.
fn scale_in_place<Op: BinaryOp>(
    binned: &mut Variable,
    dense: &Variable,
    op: Op,
) -> Result<()> {
    if Op::NAME == "plus" || Op::NAME == "minus" {
        return Err(Error::TypeUnsupported {
            op: Op::NAME,
            dtype: DType::Binned,
        });
    }
    let out_dims = binned.dims().clone();
    let merged = merge(&out_dims, dense.dims())?;
    if merged != out_dims {
        return Err(Error::Dimension(format!(
            "Expected the dense operand of '{}' to be contained in {out_dims}, got {}.",
            Op::NAME,
            dense.dims()
        )));
    }

    let (pairs, _, buffer_ref) = binned_parts(binned)?;
    if buffer_ref.ndim() != 1 {
        return Err(Error::Dimension(format!(
            "Binned arithmetic requires a one-dimensional buffer, got {}.",
            buffer_ref.dims()
        )));
    }
    let pairs: Vec<IndexPair> = pairs.to_vec();
    let buffer_dtype = buffer_ref.dtype();
    let buffer_unit = buffer_ref.unit();
    let buffer_has_variances = buffer_ref.has_variances();

    let unit = op.unit(buffer_unit, dense.unit())?;
    if Op::POLICY == VariancePolicy::Multiplicative
        && buffer_has_variances != dense.has_variances()
    {
        return Err(Error::Variances(
            "Either both or none of the operands must have a variance.".into(),
        ));
    }

    fn run<T, B, Op>(
        op: Op,
        binned: &mut Variable,
        dense: &Variable,
        pairs: &[IndexPair],
        out_dims: &Dimensions,
        unit: Unit,
    ) -> Result<()>
    where
        T: FloatElement,
        B: crate::dtype::Element + Promote<T>,
        Op: BinaryOp,
    {
        let strides = broadcast_strides(dense, out_dims)?;
        let (dense_values, dense_variances) = dense.full_data::<B>()?;
        let factor_values =
            ElementArrayView::new(dense_values, dense.offset(), out_dims.clone(), strides.clone())?
                .to_vec();
        let factor_variances = match dense_variances {
            Some(variances) => Some(
                ElementArrayView::new(
                    variances,
                    dense.offset(),
                    out_dims.clone(),
                    strides,
                )?
                .to_vec(),
            ),
            None => None,
        };

        let data = binned.data_mut()?;
        let binned_data = data
            .as_any_mut()
            .downcast_mut::<BinnedData>()
            .ok_or(Error::TypeMismatch {
                expected: DType::Binned,
                actual: DType::Binned,
            })?;
        let (values, variances) = binned_data.buffer.full_data_mut::<T>()?;
        match variances {
            Some(variances) => {
                for (k, pair) in pairs.iter().enumerate() {
                    let factor = crate::value_variance::ValueAndVariance::new(
                        factor_values[k].promote(),
                        factor_variances
                            .as_ref()
                            .map(|v| v[k].promote())
                            .unwrap_or_else(T::zero),
                    );
                    for i in pair.begin..pair.end {
                        let i = i as usize;
                        let element = crate::value_variance::ValueAndVariance::new(
                            values[i],
                            variances[i],
                        );
                        let result = op.value_with_variance(element, factor);
                        values[i] = result.value;
                        variances[i] = result.variance;
                    }
                }
            }
            None => {
                for (k, pair) in pairs.iter().enumerate() {
                    let factor = factor_values[k].promote();
                    for i in pair.begin..pair.end {
                        let i = i as usize;
                        values[i] = op.value(values[i], factor);
                    }
                }
            }
        }
        binned_data.buffer.set_unit(unit);
        Ok(())
    }

    match (buffer_dtype, dense.dtype()) {
        (DType::Float64, DType::Float64) => {
            run::<f64, f64, Op>(op, binned, dense, &pairs, &out_dims, unit)
        }
        (DType::Float64, DType::Float32) => {
            run::<f64, f32, Op>(op, binned, dense, &pairs, &out_dims, unit)
        }
        (DType::Float64, DType::Int64) => {
            run::<f64, i64, Op>(op, binned, dense, &pairs, &out_dims, unit)
        }
        (DType::Float64, DType::Int32) => {
            run::<f64, i32, Op>(op, binned, dense, &pairs, &out_dims, unit)
        }
        (DType::Float32, DType::Float32) => {
            run::<f32, f32, Op>(op, binned, dense, &pairs, &out_dims, unit)
        }
        (left, right) => Err(Error::TypePairUnsupported {
            op: Op::NAME,
            left,
            right,
        }),
    }
}
