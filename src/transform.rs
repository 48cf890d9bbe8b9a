//! The transform engine: broadcasting, multi-type elementwise dispatch.
//!
//! A transform applies an operator bundle — a per-element value function, a
//! unit function and a variance propagator — over one or two variables,
//! broadcasting by dimension label. The flow is always:
//!
//! 1. resolve the supported element-type tuple for the operand dtypes
//!    (type error otherwise),
//! 2. merge the operand dims into the output dims; one operand must already
//!    contain the merged dims (dimension error otherwise),
//! 3. compute the output unit *before* anything is allocated, so a unit
//!    error has no side effect,
//! 4. check the variance policy (a multiplicative operator rejects mixing a
//!    variance-carrying operand with a variance-free one),
//! 5. allocate the output (or reuse the in-place destination, uniquified),
//! 6. walk broadcast views in parallel blocks of the outermost output
//!    dimension.
//!
//! In-place destinations are copy-on-write: uniquifying before the first
//! write means an input aliasing the destination's buffer keeps reading the
//! original allocation, which gives the read-before-write aliasing
//! guarantee without inspecting elements.

use crate::dimensions::{merge, Dimensions};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::parallel::{parallel_for, SendPtr};
use crate::strides::Strides;
use crate::unit::Unit;
use crate::value_variance::ValueAndVariance;
use crate::variable::{DenseData, Variable};
use crate::view_index::ViewIndex;
use crate::Index;

use std::sync::Arc;

/// Numeric element types usable in arithmetic kernels.
pub trait NumericElement:
    Element + Copy + PartialOrd + num_traits::NumOps + num_traits::Zero + num_traits::One
{
}

impl<T> NumericElement for T where
    T: Element + Copy + PartialOrd + num_traits::NumOps + num_traits::Zero + num_traits::One
{
}

/// Float element types: the variance-capable subset.
pub trait FloatElement: NumericElement + num_traits::Float {}

impl<T> FloatElement for T where T: NumericElement + num_traits::Float {}

/// Lossless-enough promotion between elements of a supported type tuple.
pub trait Promote<O>: Copy {
    fn promote(self) -> O;
}

macro_rules! impl_promote {
    ($($from:ty => $to:ty),* $(,)?) => {
        $(impl Promote<$to> for $from {
            #[inline]
            fn promote(self) -> $to {
                self as $to
            }
        })*
    };
}

impl_promote!(
    f64 => f64,
    f32 => f64,
    i64 => f64,
    i32 => f64,
    f32 => f32,
    i64 => i64,
    i32 => i32,
);

/// How an operator treats variance channels.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VariancePolicy {
    /// Missing variances contribute zero (addition, subtraction).
    Additive,
    /// Either both or none of the operands must have a variance.
    Multiplicative,
}

/// A binary operator bundle: value, variance and unit behavior.
pub trait BinaryOp: Copy + Send + Sync {
    const NAME: &'static str;
    const POLICY: VariancePolicy;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// The output unit; also the place where unit preconditions fail.
    fn unit(&self, a: Unit, b: Unit) -> Result<Unit>;

    /// Plain element values.
    fn value<T: NumericElement>(&self, a: T, b: T) -> T;

    /// (value, variance) pairs; the default propagation comes from the
    /// `ValueAndVariance` algebra.
    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
        b: ValueAndVariance<T>,
    ) -> ValueAndVariance<T>;
}

/// A unary operator bundle over float elements.
pub trait UnaryOp: Copy + Send + Sync {
    const NAME: &'static str;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn unit(&self, u: Unit) -> Result<Unit>;

    fn value<T: FloatElement>(&self, a: T) -> T;

    fn value_with_variance<T: FloatElement>(&self, a: ValueAndVariance<T>)
        -> ValueAndVariance<T>;
}

// ============================================================================
// Broadcast argument views
// ============================================================================

/// A typed read view of one operand, broadcast to the output dims.
pub(crate) struct Arg<'a, T> {
    pub values: &'a [T],
    pub variances: Option<&'a [T]>,
    pub offset: Index,
    pub strides: Strides,
    contiguous: bool,
}

impl<'a, T: Element> Arg<'a, T> {
    /// Builds the view; every label of `var` must appear in `out_dims`.
    pub fn new(var: &'a Variable, out_dims: &Dimensions) -> Result<Arg<'a, T>> {
        let strides = broadcast_strides(var, out_dims)?;
        let (values, variances) = var.full_data::<T>()?;
        let contiguous = var.offset() == 0 && strides.is_contiguous(out_dims);
        Ok(Arg {
            values,
            variances,
            offset: var.offset(),
            strides,
            contiguous,
        })
    }

    #[inline]
    fn index(&self, out_dims: &Dimensions) -> ViewIndex {
        ViewIndex::new(out_dims, &self.strides)
    }
}

/// Strides reading `var` through the axes of `out_dims` (0 for labels the
/// variable does not have).
pub(crate) fn broadcast_strides(var: &Variable, out_dims: &Dimensions) -> Result<Strides> {
    if !out_dims.includes(var.dims()) {
        return Err(Error::DimensionMismatch {
            expected: out_dims.clone(),
            actual: var.dims().clone(),
        });
    }
    let mut strides = Vec::with_capacity(out_dims.ndim());
    for (dim, _) in out_dims.iter() {
        match var.dims().index_of(dim) {
            Some(pos) => strides.push(var.strides().get(pos)),
            None => strides.push(0),
        }
    }
    Ok(Strides::from_vec(strides))
}

/// The merged output dims; one operand must contain the merge.
fn output_dims(name: &'static str, a: &Variable, b: &Variable) -> Result<Dimensions> {
    let merged = merge(a.dims(), b.dims())?;
    if merged != *a.dims() && merged != *b.dims() {
        return Err(Error::Dimension(format!(
            "Expected one operand of '{name}' to contain {merged}, got {} and {}.",
            a.dims(),
            b.dims()
        )));
    }
    Ok(merged)
}

fn check_variance_policy(
    policy: VariancePolicy,
    a_has: bool,
    b_has: bool,
) -> Result<()> {
    if policy == VariancePolicy::Multiplicative && a_has != b_has {
        return Err(Error::Variances(
            "Either both or none of the operands must have a variance.".into(),
        ));
    }
    Ok(())
}

fn outer_split(dims: &Dimensions) -> (Index, Index) {
    let outer = dims.shape().first().copied().unwrap_or(1).max(1);
    let inner = dims.volume() / outer.max(1);
    (outer, inner)
}

// ============================================================================
// Out-of-place binary transforms
// ============================================================================

/// Applies `op` elementwise over broadcast views of `a` and `b`.
///
/// The output element type follows the supported type tuples; variances
/// propagate per the operator's policy.
pub fn transform_binary<Op: BinaryOp>(a: &Variable, b: &Variable, op: Op) -> Result<Variable> {
    match (a.dtype(), b.dtype()) {
        (DType::Float64, DType::Float64) => binary_float::<f64, f64, f64, Op>(op, a, b),
        (DType::Float32, DType::Float32) => binary_float::<f32, f32, f32, Op>(op, a, b),
        (DType::Float64, DType::Float32) => binary_float::<f64, f32, f64, Op>(op, a, b),
        (DType::Float32, DType::Float64) => binary_float::<f32, f64, f64, Op>(op, a, b),
        (DType::Float64, DType::Int64) => binary_float::<f64, i64, f64, Op>(op, a, b),
        (DType::Int64, DType::Float64) => binary_float::<i64, f64, f64, Op>(op, a, b),
        (DType::Float64, DType::Int32) => binary_float::<f64, i32, f64, Op>(op, a, b),
        (DType::Int32, DType::Float64) => binary_float::<i32, f64, f64, Op>(op, a, b),
        (DType::Int64, DType::Int64) => binary_int::<i64, i64, i64, Op>(op, a, b),
        (DType::Int32, DType::Int32) => binary_int::<i32, i32, i32, Op>(op, a, b),
        (left, right) => Err(Error::TypePairUnsupported {
            op: Op::NAME,
            left,
            right,
        }),
    }
}

fn binary_float<A, B, O, Op>(op: Op, a: &Variable, b: &Variable) -> Result<Variable>
where
    A: Element + Promote<O>,
    B: Element + Promote<O>,
    O: FloatElement,
    Op: BinaryOp,
{
    let out_dims = output_dims(Op::NAME, a, b)?;
    let unit = op.unit(a.unit(), b.unit())?;
    check_variance_policy(Op::POLICY, a.has_variances(), b.has_variances())?;
    let with_variances = a.has_variances() || b.has_variances();

    let arg_a = Arg::<A>::new(a, &out_dims)?;
    let arg_b = Arg::<B>::new(b, &out_dims)?;
    let volume = out_dims.volume() as usize;
    let mut values = vec![O::default(); volume];
    let mut variances = with_variances.then(|| vec![O::default(); volume]);

    let (outer, inner) = outer_split(&out_dims);
    let out_values = SendPtr(values.as_mut_ptr());
    match &mut variances {
        Some(variances) => {
            let out_variances = SendPtr(variances.as_mut_ptr());
            parallel_for(0..outer, inner, |rows| {
                binary_chunk_vv(
                    op,
                    out_values,
                    out_variances,
                    &arg_a,
                    &arg_b,
                    &out_dims,
                    rows.start * inner,
                    (rows.end - rows.start) * inner,
                );
            });
        }
        None => {
            parallel_for(0..outer, inner, |rows| {
                binary_chunk(
                    op,
                    out_values,
                    &arg_a,
                    &arg_b,
                    &out_dims,
                    rows.start * inner,
                    (rows.end - rows.start) * inner,
                );
            });
        }
    }

    Ok(Variable::from_data(
        out_dims,
        unit,
        Arc::new(DenseData { values, variances }),
    ))
}

fn binary_int<A, B, O, Op>(op: Op, a: &Variable, b: &Variable) -> Result<Variable>
where
    A: Element + Promote<O>,
    B: Element + Promote<O>,
    O: NumericElement,
    Op: BinaryOp,
{
    let out_dims = output_dims(Op::NAME, a, b)?;
    let unit = op.unit(a.unit(), b.unit())?;

    let arg_a = Arg::<A>::new(a, &out_dims)?;
    let arg_b = Arg::<B>::new(b, &out_dims)?;
    let volume = out_dims.volume() as usize;
    let mut values = vec![O::default(); volume];

    let (outer, inner) = outer_split(&out_dims);
    let out_values = SendPtr(values.as_mut_ptr());
    parallel_for(0..outer, inner, |rows| {
        binary_chunk(
            op,
            out_values,
            &arg_a,
            &arg_b,
            &out_dims,
            rows.start * inner,
            (rows.end - rows.start) * inner,
        );
    });

    Ok(Variable::from_data(
        out_dims,
        unit,
        Arc::new(DenseData {
            values,
            variances: None,
        }),
    ))
}

/// Value-only block: `out[i] = op(a[i], b[i])` for `i` in `[start, start+len)`.
fn binary_chunk<A, B, O, Op>(
    op: Op,
    out: SendPtr<O>,
    a: &Arg<'_, A>,
    b: &Arg<'_, B>,
    out_dims: &Dimensions,
    start: Index,
    len: Index,
) where
    A: Element + Promote<O>,
    B: Element + Promote<O>,
    O: NumericElement,
    Op: BinaryOp,
{
    let out_ptr = out.get();
    if a.contiguous && b.contiguous {
        for i in start..start + len {
            // Contiguous views walk in lockstep with the output.
            let va = unsafe { *a.values.get_unchecked(i as usize) }.promote();
            let vb = unsafe { *b.values.get_unchecked(i as usize) }.promote();
            unsafe { *out_ptr.add(i as usize) = op.value(va, vb) };
        }
        return;
    }
    let mut ia = a.index(out_dims);
    let mut ib = b.index(out_dims);
    ia.set_index(start);
    ib.set_index(start);
    for i in start..start + len {
        let va = unsafe { *a.values.get_unchecked((a.offset + ia.offset()) as usize) }.promote();
        let vb = unsafe { *b.values.get_unchecked((b.offset + ib.offset()) as usize) }.promote();
        unsafe { *out_ptr.add(i as usize) = op.value(va, vb) };
        ia.increment();
        ib.increment();
    }
}

/// Variance block: missing input variances read as zero.
#[allow(clippy::too_many_arguments)]
fn binary_chunk_vv<A, B, O, Op>(
    op: Op,
    out_values: SendPtr<O>,
    out_variances: SendPtr<O>,
    a: &Arg<'_, A>,
    b: &Arg<'_, B>,
    out_dims: &Dimensions,
    start: Index,
    len: Index,
) where
    A: Element + Promote<O>,
    B: Element + Promote<O>,
    O: FloatElement,
    Op: BinaryOp,
{
    let values_ptr = out_values.get();
    let variances_ptr = out_variances.get();
    let mut ia = a.index(out_dims);
    let mut ib = b.index(out_dims);
    ia.set_index(start);
    ib.set_index(start);
    for i in start..start + len {
        let oa = (a.offset + ia.offset()) as usize;
        let ob = (b.offset + ib.offset()) as usize;
        let va = ValueAndVariance::new(
            unsafe { *a.values.get_unchecked(oa) }.promote(),
            a.variances
                .map(|v| unsafe { *v.get_unchecked(oa) }.promote())
                .unwrap_or_else(O::zero),
        );
        let vb = ValueAndVariance::new(
            unsafe { *b.values.get_unchecked(ob) }.promote(),
            b.variances
                .map(|v| unsafe { *v.get_unchecked(ob) }.promote())
                .unwrap_or_else(O::zero),
        );
        let result = op.value_with_variance(va, vb);
        unsafe {
            *values_ptr.add(i as usize) = result.value;
            *variances_ptr.add(i as usize) = result.variance;
        }
        ia.increment();
        ib.increment();
    }
}

// ============================================================================
// In-place binary transforms
// ============================================================================

/// Applies `op` in place: `dst = op(dst, src)`.
///
/// `dst` must contain `src`'s dims and must not be a broadcast view. All
/// preflight errors leave `dst` untouched.
pub fn transform_in_place<Op: BinaryOp>(
    dst: &mut Variable,
    src: &Variable,
    op: Op,
) -> Result<()> {
    match (dst.dtype(), src.dtype()) {
        (DType::Float64, DType::Float64) => in_place_float::<f64, f64, Op>(op, dst, src),
        (DType::Float64, DType::Float32) => in_place_float::<f64, f32, Op>(op, dst, src),
        (DType::Float64, DType::Int64) => in_place_float::<f64, i64, Op>(op, dst, src),
        (DType::Float64, DType::Int32) => in_place_float::<f64, i32, Op>(op, dst, src),
        (DType::Float32, DType::Float32) => in_place_float::<f32, f32, Op>(op, dst, src),
        (DType::Int64, DType::Int64) => in_place_int::<i64, i64, Op>(op, dst, src),
        (DType::Int32, DType::Int32) => in_place_int::<i32, i32, Op>(op, dst, src),
        (left, right) => Err(Error::TypePairUnsupported {
            op: Op::NAME,
            left,
            right,
        }),
    }
}

fn in_place_preflight<Op: BinaryOp>(dst: &Variable, src: &Variable) -> Result<()> {
    let merged = output_dims(Op::NAME, dst, src)?;
    if merged != *dst.dims() {
        return Err(Error::Dimension(format!(
            "Expected in-place output dimensions {} to contain {}.",
            dst.dims(),
            src.dims()
        )));
    }
    if dst.strides().has_broadcast(dst.dims()) {
        return Err(Error::Dimension(format!(
            "Cannot write through a broadcast view of {}.",
            dst.dims()
        )));
    }
    check_variance_policy(Op::POLICY, dst.has_variances(), src.has_variances())?;
    if src.has_variances() && !dst.has_variances() {
        return Err(Error::Variances(
            "In-place output must have variances when an input has variances.".into(),
        ));
    }
    Ok(())
}

fn in_place_float<A, B, Op>(op: Op, dst: &mut Variable, src: &Variable) -> Result<()>
where
    A: FloatElement + Promote<A>,
    B: Element + Promote<A>,
    Op: BinaryOp,
{
    in_place_preflight::<Op>(dst, src)?;
    let unit = op.unit(dst.unit(), src.unit())?;

    let out_dims = dst.dims().clone();
    let arg_src = Arg::<B>::new(src, &out_dims)?;
    let dst_offset = dst.offset();
    let dst_strides = dst.strides().clone();
    let with_variances = dst.has_variances();

    // Preflight is done: uniquify and write. An aliased `src` keeps reading
    // the original allocation.
    let (values, variances) = dst.full_data_mut::<A>()?;
    let dst_arg = DstView {
        offset: dst_offset,
        strides: dst_strides,
    };
    let (outer, inner) = outer_split(&out_dims);
    let values_ptr = SendPtr(values.as_mut_ptr());
    if with_variances {
        let variances = variances.ok_or_else(|| {
            Error::Variances("Variable has no variances.".into())
        })?;
        let variances_ptr = SendPtr(variances.as_mut_ptr());
        parallel_for(0..outer, inner, |rows| {
            in_place_chunk_vv(
                op,
                values_ptr,
                variances_ptr,
                &dst_arg,
                &arg_src,
                &out_dims,
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
                &out_dims,
                rows.start * inner,
                (rows.end - rows.start) * inner,
            );
        });
    }
    dst.set_unit(unit);
    Ok(())
}

fn in_place_int<A, B, Op>(op: Op, dst: &mut Variable, src: &Variable) -> Result<()>
where
    A: NumericElement + Promote<A>,
    B: Element + Promote<A>,
    Op: BinaryOp,
{
    in_place_preflight::<Op>(dst, src)?;
    let unit = op.unit(dst.unit(), src.unit())?;

    let out_dims = dst.dims().clone();
    let arg_src = Arg::<B>::new(src, &out_dims)?;
    let dst_offset = dst.offset();
    let dst_strides = dst.strides().clone();

    let (values, _) = dst.full_data_mut::<A>()?;
    let dst_arg = DstView {
        offset: dst_offset,
        strides: dst_strides,
    };
    let (outer, inner) = outer_split(&out_dims);
    let values_ptr = SendPtr(values.as_mut_ptr());
    parallel_for(0..outer, inner, |rows| {
        in_place_chunk(
            op,
            values_ptr,
            &dst_arg,
            &arg_src,
            &out_dims,
            rows.start * inner,
            (rows.end - rows.start) * inner,
        );
    });
    dst.set_unit(unit);
    Ok(())
}

/// Write side of an in-place transform: the destination's own layout.
pub(crate) struct DstView {
    pub(crate) offset: Index,
    pub(crate) strides: Strides,
}

pub(crate) fn in_place_chunk<A, B, Op>(
    op: Op,
    values: SendPtr<A>,
    dst: &DstView,
    src: &Arg<'_, B>,
    out_dims: &Dimensions,
    start: Index,
    len: Index,
) where
    A: NumericElement + Promote<A>,
    B: Element + Promote<A>,
    Op: BinaryOp,
{
    let values_ptr = values.get();
    let mut id = ViewIndex::new(out_dims, &dst.strides);
    let mut is = src.index(out_dims);
    id.set_index(start);
    is.set_index(start);
    for _ in 0..len {
        let od = (dst.offset + id.offset()) as usize;
        let os = (src.offset + is.offset()) as usize;
        let vb = unsafe { *src.values.get_unchecked(os) }.promote();
        unsafe {
            let slot = values_ptr.add(od);
            *slot = op.value(*slot, vb);
        }
        id.increment();
        is.increment();
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn in_place_chunk_vv<A, B, Op>(
    op: Op,
    values: SendPtr<A>,
    variances: SendPtr<A>,
    dst: &DstView,
    src: &Arg<'_, B>,
    out_dims: &Dimensions,
    start: Index,
    len: Index,
) where
    A: FloatElement + Promote<A>,
    B: Element + Promote<A>,
    Op: BinaryOp,
{
    let values_ptr = values.get();
    let variances_ptr = variances.get();
    let mut id = ViewIndex::new(out_dims, &dst.strides);
    let mut is = src.index(out_dims);
    id.set_index(start);
    is.set_index(start);
    for _ in 0..len {
        let od = (dst.offset + id.offset()) as usize;
        let os = (src.offset + is.offset()) as usize;
        let va = unsafe { ValueAndVariance::new(*values_ptr.add(od), *variances_ptr.add(od)) };
        let vb = ValueAndVariance::new(
            unsafe { *src.values.get_unchecked(os) }.promote(),
            src.variances
                .map(|v| unsafe { *v.get_unchecked(os) }.promote())
                .unwrap_or_else(A::zero),
        );
        let result = op.value_with_variance(va, vb);
        unsafe {
            *values_ptr.add(od) = result.value;
            *variances_ptr.add(od) = result.variance;
        }
        id.increment();
        is.increment();
    }
}

// ============================================================================
// Unary transforms
// ============================================================================

/// Applies a unary operator bundle, propagating variances when present.
pub fn transform_unary<Op: UnaryOp>(var: &Variable, op: Op) -> Result<Variable> {
    match var.dtype() {
        DType::Float64 => unary_typed::<f64, Op>(op, var),
        DType::Float32 => unary_typed::<f32, Op>(op, var),
        dtype => Err(Error::TypeUnsupported { op: Op::NAME, dtype }),
    }
}

fn unary_typed<T, Op>(op: Op, var: &Variable) -> Result<Variable>
where
    T: FloatElement + Promote<T>,
    Op: UnaryOp,
{
    let out_dims = var.dims().clone();
    let unit = op.unit(var.unit())?;
    let with_variances = var.has_variances();

    let arg = Arg::<T>::new(var, &out_dims)?;
    let volume = out_dims.volume() as usize;
    let mut values = vec![T::default(); volume];
    let mut variances = with_variances.then(|| vec![T::default(); volume]);

    let (outer, inner) = outer_split(&out_dims);
    let values_ptr = SendPtr(values.as_mut_ptr());
    match &mut variances {
        Some(variances) => {
            let variances_ptr = SendPtr(variances.as_mut_ptr());
            parallel_for(0..outer, inner, |rows| {
                let mut index = arg.index(&out_dims);
                index.set_index(rows.start * inner);
                let values_out = values_ptr.get();
                let variances_out = variances_ptr.get();
                for i in rows.start * inner..rows.end * inner {
                    let offset = (arg.offset + index.offset()) as usize;
                    let input = ValueAndVariance::new(
                        unsafe { *arg.values.get_unchecked(offset) },
                        arg.variances
                            .map(|v| unsafe { *v.get_unchecked(offset) })
                            .unwrap_or_else(T::zero),
                    );
                    let result = op.value_with_variance(input);
                    unsafe {
                        *values_out.add(i as usize) = result.value;
                        *variances_out.add(i as usize) = result.variance;
                    }
                    index.increment();
                }
            });
        }
        None => {
            parallel_for(0..outer, inner, |rows| {
                let mut index = arg.index(&out_dims);
                index.set_index(rows.start * inner);
                let values_out = values_ptr.get();
                for i in rows.start * inner..rows.end * inner {
                    let offset = (arg.offset + index.offset()) as usize;
                    let input = unsafe { *arg.values.get_unchecked(offset) };
                    unsafe { *values_out.add(i as usize) = op.value(input) };
                    index.increment();
                }
            });
        }
    }

    Ok(Variable::from_data(
        out_dims,
        unit,
        Arc::new(DenseData { values, variances }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithmetic::{Divide, Plus, Times};
    use crate::dim::Dim;
    use crate::math::Identity;

    fn dims(pairs: &[(Dim, Index)]) -> Dimensions {
        Dimensions::from_pairs(pairs).unwrap()
    }

    #[test]
    fn mixed_dtype_operands_promote() {
        let a = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![1.5, 2.5]).unwrap();
        let b = Variable::new::<i64>(dims(&[(Dim::X, 2)]), Unit::M, vec![1, 2]).unwrap();
        let sum = transform_binary(&a, &b, Plus).unwrap();
        assert_eq!(sum.dtype(), DType::Float64);
        assert_eq!(sum.values::<f64>().unwrap().to_vec(), vec![2.5, 4.5]);
    }

    #[test]
    fn unsupported_pairs_are_type_errors() {
        let a = Variable::new::<bool>(dims(&[(Dim::X, 1)]), Unit::DIMENSIONLESS, vec![true])
            .unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::DIMENSIONLESS, vec![1.0])
            .unwrap();
        assert!(matches!(
            transform_binary(&a, &b, Plus),
            Err(Error::TypePairUnsupported { .. })
        ));
    }

    #[test]
    fn disjoint_dims_are_dimension_errors() {
        let a = Variable::new::<f64>(dims(&[(Dim::Y, 2)]), Unit::M, vec![1.0, 2.0]).unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::Z, 2)]), Unit::M, vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            transform_binary(&a, &b, Plus),
            Err(Error::Dimension(_))
        ));
    }

    #[test]
    fn unit_errors_preempt_value_work() {
        let a = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![1.0]).unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::S, vec![1.0]).unwrap();
        assert!(matches!(
            transform_binary(&a, &b, Plus),
            Err(Error::UnitMismatch { .. })
        ));
    }

    #[test]
    fn multiplicative_variance_mismatch_is_rejected() {
        let a = Variable::with_variances::<f64>(
            dims(&[(Dim::X, 1)]),
            Unit::M,
            vec![3.0],
            vec![2.0],
        )
        .unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![4.0]).unwrap();
        assert!(matches!(
            transform_binary(&a, &b, Times),
            Err(Error::Variances(_))
        ));
        assert!(matches!(
            transform_binary(&a, &b, Divide),
            Err(Error::Variances(_))
        ));
        // Additive mixing is allowed; the missing side contributes zero.
        let sum = transform_binary(&a, &b, Plus).unwrap();
        assert_eq!(sum.variances::<f64>().unwrap().to_vec(), vec![2.0]);
    }

    #[test]
    fn in_place_failure_leaves_destination_untouched() {
        let mut dst = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![1.0, 2.0])
            .unwrap();
        let src = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::S, vec![1.0, 1.0]).unwrap();
        assert!(transform_in_place(&mut dst, &src, Plus).is_err());
        assert_eq!(dst.values::<f64>().unwrap().to_vec(), vec![1.0, 2.0]);
        assert_eq!(dst.unit(), Unit::M);
    }

    #[test]
    fn identity_transform_preserves_everything() {
        let a = Variable::with_variances::<f32>(
            dims(&[(Dim::X, 3)]),
            Unit::M,
            vec![1.0, 2.0, 3.0],
            vec![0.1, 0.2, 0.3],
        )
        .unwrap();
        let out = transform_unary(&a, Identity).unwrap();
        assert_eq!(out.dims(), a.dims());
        assert_eq!(out.dtype(), a.dtype());
        assert_eq!(out.unit(), a.unit());
        assert_eq!(
            out.values::<f32>().unwrap().to_vec(),
            a.values::<f32>().unwrap().to_vec()
        );
        assert_eq!(
            out.variances::<f32>().unwrap().to_vec(),
            a.variances::<f32>().unwrap().to_vec()
        );
    }

    #[test]
    fn aliased_in_place_matches_out_of_place() {
        let d = dims(&[(Dim::X, 4)]);
        let a = Variable::new::<f64>(d.clone(), Unit::M, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let expected = transform_binary(&a, &a, Plus).unwrap();
        let mut in_place = a.clone();
        // `in_place` and `a` share a buffer here; uniquify-before-write
        // keeps the read side intact.
        transform_in_place(&mut in_place, &a, Plus).unwrap();
        assert_eq!(
            in_place.values::<f64>().unwrap().to_vec(),
            expected.values::<f64>().unwrap().to_vec()
        );
    }
}
