//! Elementwise arithmetic operator bundles.
//!
//! Each operator couples its value function with its unit rule and variance
//! policy; the transform engine does the rest. The free functions are the
//! primary API; `&a + &b` sugar is provided with `Result` outputs so shape
//! and unit failures stay explicit.

use crate::error::{Error, Result};
use crate::transform::{
    transform_binary, transform_in_place, BinaryOp, FloatElement, NumericElement,
    VariancePolicy,
};
use crate::unit::Unit;
use crate::dtype::DType;
use crate::value_variance::ValueAndVariance;
use crate::variable::{DenseData, Variable};

use std::sync::Arc;

fn expect_same_unit(a: Unit, b: Unit) -> Result<Unit> {
    if a != b {
        return Err(Error::UnitMismatch {
            expected: a,
            actual: b,
        });
    }
    Ok(a)
}

/// Elementwise addition.
#[derive(Clone, Copy)]
pub struct Plus;

impl BinaryOp for Plus {
    const NAME: &'static str = "plus";
    const POLICY: VariancePolicy = VariancePolicy::Additive;

    fn unit(&self, a: Unit, b: Unit) -> Result<Unit> {
        expect_same_unit(a, b)
    }

    fn value<T: NumericElement>(&self, a: T, b: T) -> T {
        a + b
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
        b: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a + b
    }
}

/// Elementwise subtraction.
#[derive(Clone, Copy)]
pub struct Minus;

impl BinaryOp for Minus {
    const NAME: &'static str = "minus";
    const POLICY: VariancePolicy = VariancePolicy::Additive;

    fn unit(&self, a: Unit, b: Unit) -> Result<Unit> {
        expect_same_unit(a, b)
    }

    fn value<T: NumericElement>(&self, a: T, b: T) -> T {
        a - b
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
        b: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a - b
    }
}

/// Elementwise multiplication.
#[derive(Clone, Copy)]
pub struct Times;

impl BinaryOp for Times {
    const NAME: &'static str = "times";
    const POLICY: VariancePolicy = VariancePolicy::Multiplicative;

    fn unit(&self, a: Unit, b: Unit) -> Result<Unit> {
        if a.is_counts() && b.is_counts() {
            return Err(Error::Unit(
                "Cannot multiply counts with counts (histogram data times histogram data); \
                 scale by a dimensionless factor instead."
                    .into(),
            ));
        }
        Ok(a * b)
    }

    fn value<T: NumericElement>(&self, a: T, b: T) -> T {
        a * b
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
        b: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a * b
    }
}

/// Elementwise division.
#[derive(Clone, Copy)]
pub struct Divide;

impl BinaryOp for Divide {
    const NAME: &'static str = "divide";
    const POLICY: VariancePolicy = VariancePolicy::Multiplicative;

    fn unit(&self, a: Unit, b: Unit) -> Result<Unit> {
        Ok(a / b)
    }

    fn value<T: NumericElement>(&self, a: T, b: T) -> T {
        a / b
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
        b: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a / b
    }
}

/// `a + b` with broadcast by dimension label.
pub fn add(a: &Variable, b: &Variable) -> Result<Variable> {
    if a.is_binned() || b.is_binned() {
        return crate::binned::arithmetic(a, b, Plus);
    }
    transform_binary(a, b, Plus)
}

/// `a - b` with broadcast by dimension label.
pub fn sub(a: &Variable, b: &Variable) -> Result<Variable> {
    if a.is_binned() || b.is_binned() {
        return crate::binned::arithmetic(a, b, Minus);
    }
    transform_binary(a, b, Minus)
}

/// `a * b`; units compose, variances follow the product rule.
pub fn mul(a: &Variable, b: &Variable) -> Result<Variable> {
    if a.is_binned() || b.is_binned() {
        return crate::binned::arithmetic(a, b, Times);
    }
    transform_binary(a, b, Times)
}

/// `a / b`; units compose, variances follow the quotient rule.
pub fn div(a: &Variable, b: &Variable) -> Result<Variable> {
    if a.is_binned() || b.is_binned() {
        return crate::binned::arithmetic(a, b, Divide);
    }
    transform_binary(a, b, Divide)
}

/// `a += b`; `a` must contain `b`'s dims.
pub fn add_assign(a: &mut Variable, b: &Variable) -> Result<()> {
    transform_in_place(a, b, Plus)
}

/// `a -= b`.
pub fn sub_assign(a: &mut Variable, b: &Variable) -> Result<()> {
    transform_in_place(a, b, Minus)
}

/// `a *= b`.
pub fn mul_assign(a: &mut Variable, b: &Variable) -> Result<()> {
    if a.is_binned() {
        return crate::binned::arithmetic_in_place(a, b, Times);
    }
    transform_in_place(a, b, Times)
}

/// `a /= b`.
pub fn div_assign(a: &mut Variable, b: &Variable) -> Result<()> {
    if a.is_binned() {
        return crate::binned::arithmetic_in_place(a, b, Divide);
    }
    transform_in_place(a, b, Divide)
}

/// Unary minus: values negate, variances are unchanged.
pub fn neg(var: &Variable) -> Result<Variable> {
    fn neg_typed<T>(var: &Variable) -> Result<Variable>
    where
        T: NumericElement + std::ops::Neg<Output = T>,
    {
        let values = var.values::<T>()?.iter().map(|&v| -v).collect();
        let variances = if var.has_variances() {
            Some(var.variances::<T>()?.to_vec())
        } else {
            None
        };
        Ok(Variable::from_data(
            var.dims().clone(),
            var.unit(),
            Arc::new(DenseData { values, variances }),
        ))
    }
    match var.dtype() {
        DType::Float64 => neg_typed::<f64>(var),
        DType::Float32 => neg_typed::<f32>(var),
        DType::Int64 => neg_typed::<i64>(var),
        DType::Int32 => neg_typed::<i32>(var),
        dtype => Err(Error::TypeUnsupported { op: "neg", dtype }),
    }
}

// Operator sugar with explicit `Result` outputs.

impl std::ops::Add for &Variable {
    type Output = Result<Variable>;
    fn add(self, rhs: Self) -> Result<Variable> {
        add(self, rhs)
    }
}

impl std::ops::Sub for &Variable {
    type Output = Result<Variable>;
    fn sub(self, rhs: Self) -> Result<Variable> {
        sub(self, rhs)
    }
}

impl std::ops::Mul for &Variable {
    type Output = Result<Variable>;
    fn mul(self, rhs: Self) -> Result<Variable> {
        mul(self, rhs)
    }
}

impl std::ops::Div for &Variable {
    type Output = Result<Variable>;
    fn div(self, rhs: Self) -> Result<Variable> {
        div(self, rhs)
    }
}

impl std::ops::Neg for &Variable {
    type Output = Result<Variable>;
    fn neg(self) -> Result<Variable> {
        neg(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dim::Dim;
    use crate::dimensions::Dimensions;
    use crate::Index;
    use approx::assert_relative_eq;

    fn dims(pairs: &[(Dim, Index)]) -> Dimensions {
        Dimensions::from_pairs(pairs).unwrap()
    }

    #[test]
    fn broadcast_add_with_units() {
        let a = Variable::new::<f64>(
            dims(&[(Dim::Z, 3), (Dim::Y, 2), (Dim::X, 1)]),
            Unit::M,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::Z, 3)]), Unit::M, vec![0.1, 0.2, 0.3])
            .unwrap();
        let sum = add(&a, &b).unwrap();
        assert_eq!(sum.dims(), a.dims());
        assert_eq!(sum.unit(), Unit::M);
        let values = sum.values::<f64>().unwrap().to_vec();
        let expected = [1.1, 2.1, 3.2, 4.2, 5.3, 6.3];
        for (value, expected) in values.iter().zip(expected) {
            assert_relative_eq!(*value, expected);
        }
        // Broadcast works with the smaller operand first, too.
        assert_eq!(add(&b, &a).unwrap(), sum);
    }

    #[test]
    fn multiplication_propagates_variances() {
        let a = Variable::with_variances::<f64>(
            dims(&[(Dim::X, 1)]),
            Unit::M,
            vec![3.0],
            vec![2.0],
        )
        .unwrap();
        let b = Variable::with_variances::<f64>(
            dims(&[(Dim::X, 1)]),
            Unit::M,
            vec![4.0],
            vec![3.0],
        )
        .unwrap();
        let product = mul(&a, &b).unwrap();
        assert_eq!(product.unit(), Unit::M.powi(2));
        assert_eq!(product.values::<f64>().unwrap().to_vec(), vec![12.0]);
        assert_eq!(product.variances::<f64>().unwrap().to_vec(), vec![59.0]);
    }

    #[test]
    fn in_place_multiply_with_missing_variances_fails() {
        let mut a = Variable::with_variances::<f64>(
            dims(&[(Dim::X, 1)]),
            Unit::M,
            vec![3.0],
            vec![2.0],
        )
        .unwrap();
        let b = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![4.0]).unwrap();
        assert!(matches!(mul_assign(&mut a, &b), Err(Error::Variances(_))));
        // No side effect on the destination.
        assert_eq!(a.values::<f64>().unwrap().to_vec(), vec![3.0]);
    }

    #[test]
    fn counts_times_counts_is_rejected() {
        let a = Variable::scalar(1.0f64, Unit::COUNTS);
        let b = Variable::scalar(2.0f64, Unit::COUNTS);
        assert!(matches!(mul(&a, &b), Err(Error::Unit(_))));
        // counts * dimensionless is the histogram-scaling pattern.
        let scale = Variable::scalar(2.0f64, Unit::DIMENSIONLESS);
        assert_eq!(mul(&a, &scale).unwrap().unit(), Unit::COUNTS);
        // counts / counts is a plain ratio.
        assert_eq!(div(&a, &b).unwrap().unit(), Unit::DIMENSIONLESS);
    }

    #[test]
    fn unary_minus_keeps_variances() {
        let a = Variable::with_variances::<f64>(
            dims(&[(Dim::X, 2)]),
            Unit::M,
            vec![1.0, -2.0],
            vec![0.5, 0.7],
        )
        .unwrap();
        let negated = neg(&a).unwrap();
        assert_eq!(negated.values::<f64>().unwrap().to_vec(), vec![-1.0, 2.0]);
        assert_eq!(negated.variances::<f64>().unwrap().to_vec(), vec![0.5, 0.7]);
        assert_eq!(negated.unit(), Unit::M);
    }

    #[test]
    fn operator_sugar_returns_results() {
        let a = Variable::scalar(1.0f64, Unit::M);
        let b = Variable::scalar(2.0f64, Unit::M);
        assert_eq!((&a + &b).unwrap().value::<f64>().unwrap(), 3.0);
        assert_eq!((&a - &b).unwrap().value::<f64>().unwrap(), -1.0);
        assert!((-&a).unwrap().value::<f64>().unwrap() == -1.0);
        let c = Variable::scalar(2.0f64, Unit::S);
        assert!((&a + &c).is_err());
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        let a = Variable::new::<i64>(dims(&[(Dim::X, 2)]), Unit::DIMENSIONLESS, vec![7, 8])
            .unwrap();
        let b = Variable::new::<i64>(dims(&[(Dim::X, 2)]), Unit::DIMENSIONLESS, vec![2, 3])
            .unwrap();
        let quotient = div(&a, &b).unwrap();
        assert_eq!(quotient.dtype(), DType::Int64);
        assert_eq!(quotient.values::<i64>().unwrap().to_vec(), vec![3, 2]);
    }
}
