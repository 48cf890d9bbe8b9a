//! Accumulation: transforms whose output is broadcast over the inputs.
//!
//! [`accumulate_in_place`] is the reversed-broadcast variant of the
//! in-place transform: the destination's dims may be a *subset* of the
//! merged input dims, so the operator visits the same output element once
//! per collapsed input position. The operator must be
//! commutative-associative on the output element for the result to be
//! deterministic; the engine does not enforce this. In contrast to the
//! transform engine, accumulation leaves the destination's unit untouched —
//! repeated application of, say, a multiplication into a sum slot has no
//! consistent unit.
//!
//! Parallelism splits the destination's outermost dimension into blocks;
//! each block accumulates the matching input slices, so writes stay
//! disjoint even though inputs may be shared between blocks.

use crate::dim::Dim;
use crate::dimensions::{merge, Dimensions};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::parallel::{parallel_for, SendPtr};
use crate::transform::{
    broadcast_strides, in_place_chunk, in_place_chunk_vv, Arg, BinaryOp, DstView,
    FloatElement, NumericElement, Promote,
};
use crate::variable::Variable;
use crate::dtype::Element;

/// Accumulates `other` into `var`: `var[i] = op(var[i], other[j])` for every
/// input position `j` that collapses onto `i`.
pub fn accumulate_in_place<Op: BinaryOp>(
    var: &mut Variable,
    other: &Variable,
    op: Op,
) -> Result<()> {
    match (var.dtype(), other.dtype()) {
        (DType::Float64, DType::Float64) => accumulate_float::<f64, f64, Op>(op, var, other),
        (DType::Float64, DType::Float32) => accumulate_float::<f64, f32, Op>(op, var, other),
        (DType::Float64, DType::Int64) => accumulate_float::<f64, i64, Op>(op, var, other),
        (DType::Float64, DType::Int32) => accumulate_float::<f64, i32, Op>(op, var, other),
        (DType::Float32, DType::Float32) => accumulate_float::<f32, f32, Op>(op, var, other),
        (DType::Int64, DType::Int64) => accumulate_int::<i64, i64, Op>(op, var, other),
        (DType::Int32, DType::Int32) => accumulate_int::<i32, i32, Op>(op, var, other),
        (left, right) => Err(Error::TypePairUnsupported {
            op: Op::NAME,
            left,
            right,
        }),
    }
}

/// Iteration dims: the merged dims, reordered so the destination's
/// outermost dim comes first. Blocks of that dim write disjoint output.
fn iteration_dims(var: &Variable, merged: &Dimensions) -> Result<Dimensions> {
    let Some(outer) = var.dims().outer() else {
        return Ok(merged.clone());
    };
    let mut iter_dims = Dimensions::new();
    iter_dims.push_inner(outer, merged.length(outer)?)?;
    for (dim, length) in merged.iter() {
        if dim != outer {
            iter_dims.push_inner(dim, length)?;
        }
    }
    Ok(iter_dims)
}

fn accumulate_preflight<Op: BinaryOp>(var: &Variable, other: &Variable) -> Result<Dimensions> {
    let merged = merge(var.dims(), other.dims())?;
    if var.strides().has_broadcast(var.dims()) {
        return Err(Error::Dimension(format!(
            "Cannot accumulate into a broadcast view of {}.",
            var.dims()
        )));
    }
    if other.has_variances() && !var.has_variances() {
        return Err(Error::Variances(
            "Accumulation output must have variances when the input has variances.".into(),
        ));
    }
    Ok(merged)
}

fn accumulate_float<A, B, Op>(op: Op, var: &mut Variable, other: &Variable) -> Result<()>
where
    A: FloatElement + Promote<A>,
    B: Element + Promote<A>,
    Op: BinaryOp,
{
    let merged = accumulate_preflight::<Op>(var, other)?;
    let iter_dims = iteration_dims(var, &merged)?;
    let with_variances = var.has_variances();

    let dst_arg = DstView {
        offset: var.offset(),
        strides: broadcast_strides(var, &iter_dims)?,
    };
    let arg_src = Arg::<B>::new(other, &iter_dims)?;
    let (outer, inner) = accumulate_split(var, &iter_dims);

    let (values, variances) = var.full_data_mut::<A>()?;
    let values_ptr = SendPtr(values.as_mut_ptr());
    if with_variances {
        let variances = variances
            .ok_or_else(|| Error::Variances("Variable has no variances.".into()))?;
        let variances_ptr = SendPtr(variances.as_mut_ptr());
        parallel_for(0..outer, inner, |rows| {
            in_place_chunk_vv(
                op,
                values_ptr,
                variances_ptr,
                &dst_arg,
                &arg_src,
                &iter_dims,
                rows.start * inner,
                (rows.end - rows.start) * inner,
            );
        });
    } else {
        parallel_for(0..outer, inner, |rows| {
            in_place_chunk(
                op,
                values_ptr,
                &dst_arg,
                &arg_src,
                &iter_dims,
                rows.start * inner,
                (rows.end - rows.start) * inner,
            );
        });
    }
    Ok(())
}

fn accumulate_int<A, B, Op>(op: Op, var: &mut Variable, other: &Variable) -> Result<()>
where
    A: NumericElement + Promote<A>,
    B: Element + Promote<A>,
    Op: BinaryOp,
{
    let merged = accumulate_preflight::<Op>(var, other)?;
    let iter_dims = iteration_dims(var, &merged)?;

    let dst_arg = DstView {
        offset: var.offset(),
        strides: broadcast_strides(var, &iter_dims)?,
    };
    let arg_src = Arg::<B>::new(other, &iter_dims)?;
    let (outer, inner) = accumulate_split(var, &iter_dims);

    let (values, _) = var.full_data_mut::<A>()?;
    let values_ptr = SendPtr(values.as_mut_ptr());
    parallel_for(0..outer, inner, |rows| {
        in_place_chunk(
            op,
            values_ptr,
            &dst_arg,
            &arg_src,
            &iter_dims,
            rows.start * inner,
            (rows.end - rows.start) * inner,
        );
    });
    Ok(())
}

/// Split for [`parallel_for`]: blocks along the destination's outer dim, or
/// a single serial block for scalar destinations.
fn accumulate_split(var: &Variable, iter_dims: &Dimensions) -> (crate::Index, crate::Index) {
    let volume = iter_dims.volume();
    if var.ndim() == 0 {
        // Scalar output: every position collapses onto one element, so no
        // block partition is safe. One block, serial.
        return (1, volume);
    }
    let outer = iter_dims.shape().first().copied().unwrap_or(1).max(1);
    (outer, volume / outer.max(1))
}

/// Sums `var` along `dim`, removing that dimension.
///
/// Variances accumulate with the values; the unit is unchanged.
pub fn sum(var: &Variable, dim: Dim) -> Result<Variable> {
    var.dims().length(dim)?;
    let mut out_dims = var.dims().clone();
    out_dims.erase(dim)?;
    let mut out = crate::factory::create_variable(
        var.dtype(),
        &out_dims,
        var.unit(),
        var.has_variances(),
    )?;
    accumulate_in_place(&mut out, var, crate::arithmetic::Plus)?;
    Ok(out)
}

/// Arithmetic mean of `var` along `dim`.
pub fn mean(var: &Variable, dim: Dim) -> Result<Variable> {
    let n = var.dims().length(dim)?;
    if n == 0 {
        return Err(Error::Dimension(format!(
            "Cannot take the mean along empty dimension {dim} of {}.",
            var.dims()
        )));
    }
    let total = sum(var, dim)?;
    let count = Variable::scalar(n as f64, crate::unit::Unit::DIMENSIONLESS);
    crate::arithmetic::div(&total, &count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithmetic::Plus;
    use crate::unit::Unit;
    use crate::Index;

    fn dims(pairs: &[(Dim, Index)]) -> Dimensions {
        Dimensions::from_pairs(pairs).unwrap()
    }

    #[test]
    fn broadcast_output_accumulates_every_input_row() {
        let mut out =
            Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![0.0, 0.0]).unwrap();
        let input = Variable::new::<f64>(
            dims(&[(Dim::Y, 3), (Dim::X, 2)]),
            Unit::M,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap();
        accumulate_in_place(&mut out, &input, Plus).unwrap();
        assert_eq!(out.values::<f64>().unwrap().to_vec(), vec![9.0, 12.0]);
        // The unit is untouched by accumulation.
        assert_eq!(out.unit(), Unit::M);
    }

    #[test]
    fn scalar_output_accumulates_serially() {
        let mut out = Variable::scalar(0.0f64, Unit::DIMENSIONLESS);
        let input = Variable::new::<f64>(
            dims(&[(Dim::X, 4)]),
            Unit::DIMENSIONLESS,
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        accumulate_in_place(&mut out, &input, Plus).unwrap();
        assert_eq!(out.value::<f64>().unwrap(), 10.0);
    }

    #[test]
    fn sum_removes_the_dimension_and_adds_variances() {
        let var = Variable::with_variances::<f64>(
            dims(&[(Dim::Y, 2), (Dim::X, 3)]),
            Unit::COUNTS,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0],
        )
        .unwrap();
        let total = sum(&var, Dim::Y).unwrap();
        assert_eq!(total.dims(), &dims(&[(Dim::X, 3)]));
        assert_eq!(total.values::<f64>().unwrap().to_vec(), vec![5.0, 7.0, 9.0]);
        assert_eq!(
            total.variances::<f64>().unwrap().to_vec(),
            vec![3.0, 3.0, 3.0]
        );
        assert_eq!(total.unit(), Unit::COUNTS);
    }

    #[test]
    fn sum_along_inner_dimension() {
        let var = Variable::new::<i64>(
            dims(&[(Dim::Y, 2), (Dim::X, 3)]),
            Unit::DIMENSIONLESS,
            vec![1, 2, 3, 4, 5, 6],
        )
        .unwrap();
        let total = sum(&var, Dim::X).unwrap();
        assert_eq!(total.values::<i64>().unwrap().to_vec(), vec![6, 15]);
    }

    #[test]
    fn mean_divides_by_the_length() {
        let var = Variable::new::<f64>(
            dims(&[(Dim::X, 4)]),
            Unit::M,
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let m = mean(&var, Dim::X).unwrap();
        assert_eq!(m.value::<f64>().unwrap(), 2.5);
        assert_eq!(m.unit(), Unit::M);
    }

    #[test]
    fn variance_carrying_input_needs_variance_output() {
        let mut out = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![0.0]).unwrap();
        let input = Variable::with_variances::<f64>(
            dims(&[(Dim::X, 1)]),
            Unit::M,
            vec![1.0],
            vec![1.0],
        )
        .unwrap();
        assert!(matches!(
            accumulate_in_place(&mut out, &input, Plus),
            Err(Error::Variances(_))
        ));
    }
}
