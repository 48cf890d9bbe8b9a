//! Elementwise math functions.
//!
//! Unary operator bundles for the transform engine. Unit preconditions are
//! enforced in the unit function, before any buffer is touched: `sqrt`
//! needs a perfect-square unit, the transcendental functions need
//! dimensionless input. Element-level anomalies (negative `sqrt` input,
//! `log` of zero) are not checked; they propagate as NaN/Inf through the
//! value buffer.

use crate::error::{Error, Result};
use crate::transform::{transform_unary, FloatElement, UnaryOp};
use crate::unit::Unit;
use crate::value_variance::ValueAndVariance;
use crate::variable::Variable;

fn expect_dimensionless(name: &str, u: Unit) -> Result<Unit> {
    if !u.is_dimensionless() {
        return Err(Error::Unit(format!(
            "Expected dimensionless argument for '{name}', got unit {u}."
        )));
    }
    Ok(Unit::DIMENSIONLESS)
}

/// The identity operator; returns its input unchanged.
#[derive(Clone, Copy)]
pub struct Identity;

impl UnaryOp for Identity {
    const NAME: &'static str = "identity";

    fn unit(&self, u: Unit) -> Result<Unit> {
        Ok(u)
    }

    fn value<T: FloatElement>(&self, a: T) -> T {
        a
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a
    }
}

/// Square root; the unit must be a perfect square.
#[derive(Clone, Copy)]
pub struct Sqrt;

impl UnaryOp for Sqrt {
    const NAME: &'static str = "sqrt";

    fn unit(&self, u: Unit) -> Result<Unit> {
        u.sqrt()
    }

    fn value<T: FloatElement>(&self, a: T) -> T {
        a.sqrt()
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a.sqrt()
    }
}

/// Absolute value; unit and variance are unchanged.
#[derive(Clone, Copy)]
pub struct Abs;

impl UnaryOp for Abs {
    const NAME: &'static str = "abs";

    fn unit(&self, u: Unit) -> Result<Unit> {
        Ok(u)
    }

    fn value<T: FloatElement>(&self, a: T) -> T {
        a.abs()
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a.abs()
    }
}

/// Exponential; requires a dimensionless argument.
#[derive(Clone, Copy)]
pub struct Exp;

impl UnaryOp for Exp {
    const NAME: &'static str = "exp";

    fn unit(&self, u: Unit) -> Result<Unit> {
        expect_dimensionless(Self::NAME, u)
    }

    fn value<T: FloatElement>(&self, a: T) -> T {
        a.exp()
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a.exp()
    }
}

/// Natural logarithm; requires a dimensionless argument.
#[derive(Clone, Copy)]
pub struct Ln;

impl UnaryOp for Ln {
    const NAME: &'static str = "log";

    fn unit(&self, u: Unit) -> Result<Unit> {
        expect_dimensionless(Self::NAME, u)
    }

    fn value<T: FloatElement>(&self, a: T) -> T {
        a.ln()
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a.ln()
    }
}

/// Base-10 logarithm; requires a dimensionless argument.
#[derive(Clone, Copy)]
pub struct Log10;

impl UnaryOp for Log10 {
    const NAME: &'static str = "log10";

    fn unit(&self, u: Unit) -> Result<Unit> {
        expect_dimensionless(Self::NAME, u)
    }

    fn value<T: FloatElement>(&self, a: T) -> T {
        a.log10()
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a.log10()
    }
}

/// `1 / x`; the unit inverts.
#[derive(Clone, Copy)]
pub struct Reciprocal;

impl UnaryOp for Reciprocal {
    const NAME: &'static str = "reciprocal";

    fn unit(&self, u: Unit) -> Result<Unit> {
        Ok(Unit::DIMENSIONLESS / u)
    }

    fn value<T: FloatElement>(&self, a: T) -> T {
        a.recip()
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a.reciprocal()
    }
}

/// Integer power by repeated squaring.
#[derive(Clone, Copy)]
pub struct Pow {
    pub exponent: i64,
}

impl UnaryOp for Pow {
    const NAME: &'static str = "pow";

    fn unit(&self, u: Unit) -> Result<Unit> {
        Ok(u.powi(self.exponent as i32))
    }

    fn value<T: FloatElement>(&self, a: T) -> T {
        // Same squaring tree as the variance path.
        ValueAndVariance::new(a, T::zero()).powi(self.exponent).value
    }

    fn value_with_variance<T: FloatElement>(
        &self,
        a: ValueAndVariance<T>,
    ) -> ValueAndVariance<T> {
        a.powi(self.exponent)
    }
}

/// Elementwise square root.
pub fn sqrt(var: &Variable) -> Result<Variable> {
    transform_unary(var, Sqrt)
}

/// Elementwise absolute value.
pub fn abs(var: &Variable) -> Result<Variable> {
    transform_unary(var, Abs)
}

/// Elementwise exponential.
pub fn exp(var: &Variable) -> Result<Variable> {
    transform_unary(var, Exp)
}

/// Elementwise natural logarithm.
pub fn ln(var: &Variable) -> Result<Variable> {
    transform_unary(var, Ln)
}

/// Elementwise base-10 logarithm.
pub fn log10(var: &Variable) -> Result<Variable> {
    transform_unary(var, Log10)
}

/// Elementwise reciprocal.
pub fn reciprocal(var: &Variable) -> Result<Variable> {
    transform_unary(var, Reciprocal)
}

/// Elementwise integer power.
pub fn pow(var: &Variable, exponent: i64) -> Result<Variable> {
    transform_unary(var, Pow { exponent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dim::Dim;
    use crate::dimensions::Dimensions;
    use approx::assert_relative_eq;

    #[test]
    fn sqrt_takes_the_unit_root() {
        let area = Variable::scalar(4.0f64, Unit::M.powi(2));
        let side = sqrt(&area).unwrap();
        assert_eq!(side.unit(), Unit::M);
        assert_eq!(side.value::<f64>().unwrap(), 2.0);
        assert!(sqrt(&Variable::scalar(4.0f64, Unit::M)).is_err());
    }

    #[test]
    fn sqrt_variance_rule() {
        let var = Variable::scalar_with_variance(4.0f64, 8.0, Unit::DIMENSIONLESS).unwrap();
        let root = sqrt(&var).unwrap();
        assert_relative_eq!(root.variance::<f64>().unwrap(), 0.5);
    }

    #[test]
    fn transcendentals_require_dimensionless() {
        let m = Variable::scalar(1.0f64, Unit::M);
        assert!(matches!(exp(&m), Err(Error::Unit(_))));
        assert!(matches!(ln(&m), Err(Error::Unit(_))));
        assert!(matches!(log10(&m), Err(Error::Unit(_))));

        let x = Variable::scalar_with_variance(2.0f64, 0.1, Unit::DIMENSIONLESS).unwrap();
        assert_relative_eq!(ln(&x).unwrap().variance::<f64>().unwrap(), 0.1 / 4.0);
        let e = exp(&x).unwrap();
        assert_relative_eq!(
            e.variance::<f64>().unwrap(),
            0.1 * (2.0f64).exp() * (2.0f64).exp()
        );
    }

    #[test]
    fn reciprocal_inverts_the_unit() {
        let v = Variable::scalar_with_variance(2.0f64, 1.0, Unit::S).unwrap();
        let inverse = reciprocal(&v).unwrap();
        assert_eq!(inverse.unit(), Unit::DIMENSIONLESS / Unit::S);
        assert_relative_eq!(inverse.value::<f64>().unwrap(), 0.5);
        assert_relative_eq!(inverse.variance::<f64>().unwrap(), 1.0 / 16.0);
    }

    #[test]
    fn pow_raises_value_and_unit() {
        let d = Dimensions::from_pairs(&[(Dim::X, 2)]).unwrap();
        let v = Variable::new::<f64>(d, Unit::M, vec![2.0, 3.0]).unwrap();
        let squared = pow(&v, 2).unwrap();
        assert_eq!(squared.unit(), Unit::M.powi(2));
        assert_eq!(squared.values::<f64>().unwrap().to_vec(), vec![4.0, 9.0]);
        let inverse = pow(&v, -1).unwrap();
        assert_eq!(inverse.unit(), Unit::DIMENSIONLESS / Unit::M);
        assert_relative_eq!(inverse.values::<f64>().unwrap().to_vec()[0], 0.5);
    }

    #[test]
    fn abs_keeps_unit_and_variance() {
        let v = Variable::scalar_with_variance(-3.0f64, 2.0, Unit::M).unwrap();
        let a = abs(&v).unwrap();
        assert_eq!(a.unit(), Unit::M);
        assert_eq!(a.value::<f64>().unwrap(), 3.0);
        assert_eq!(a.variance::<f64>().unwrap(), 2.0);
    }
}
