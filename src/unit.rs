//! Physical units.
//!
//! [`Unit`] is a trivially copyable value type over integer exponents of
//! the SI base units (m, kg, s, K) plus `counts`, the unit of histogrammed
//! event data. It forms a commutative monoid under `*` with inverse `/`,
//! has `powi` and `sqrt`, and prints symbolically for error messages.
//!
//! `counts` participates in policy decisions: multiplying two `counts`
//! operands is rejected by the arithmetic unit rules (histogram data times
//! histogram data), while `counts` times dimensionless is the ordinary
//! scaling pattern.

use crate::error::{Error, Result};

/// A physical unit: integer exponents over base units.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Unit {
    m: i16,
    kg: i16,
    s: i16,
    k: i16,
    counts: i16,
}

impl Unit {
    /// The multiplicative identity.
    pub const DIMENSIONLESS: Unit = Unit {
        m: 0,
        kg: 0,
        s: 0,
        k: 0,
        counts: 0,
    };
    /// Metre.
    pub const M: Unit = Unit {
        m: 1,
        kg: 0,
        s: 0,
        k: 0,
        counts: 0,
    };
    /// Kilogram.
    pub const KG: Unit = Unit {
        m: 0,
        kg: 1,
        s: 0,
        k: 0,
        counts: 0,
    };
    /// Second.
    pub const S: Unit = Unit {
        m: 0,
        kg: 0,
        s: 1,
        k: 0,
        counts: 0,
    };
    /// Kelvin.
    pub const K: Unit = Unit {
        m: 0,
        kg: 0,
        s: 0,
        k: 1,
        counts: 0,
    };
    /// Counts of histogrammed event data.
    pub const COUNTS: Unit = Unit {
        m: 0,
        kg: 0,
        s: 0,
        k: 0,
        counts: 1,
    };

    pub fn is_dimensionless(&self) -> bool {
        *self == Unit::DIMENSIONLESS
    }

    pub fn is_counts(&self) -> bool {
        *self == Unit::COUNTS
    }

    /// Raises the unit to an integer power.
    pub fn powi(self, n: i32) -> Unit {
        let n = n as i16;
        Unit {
            m: self.m * n,
            kg: self.kg * n,
            s: self.s * n,
            k: self.k * n,
            counts: self.counts * n,
        }
    }

    /// Square root; fails unless every exponent is even.
    pub fn sqrt(self) -> Result<Unit> {
        let exponents = [self.m, self.kg, self.s, self.k, self.counts];
        if exponents.iter().any(|e| e % 2 != 0) {
            return Err(Error::Unit(format!(
                "Unit {self} is not a perfect square."
            )));
        }
        Ok(Unit {
            m: self.m / 2,
            kg: self.kg / 2,
            s: self.s / 2,
            k: self.k / 2,
            counts: self.counts / 2,
        })
    }
}

impl std::ops::Mul for Unit {
    type Output = Unit;
    fn mul(self, rhs: Unit) -> Unit {
        Unit {
            m: self.m + rhs.m,
            kg: self.kg + rhs.kg,
            s: self.s + rhs.s,
            k: self.k + rhs.k,
            counts: self.counts + rhs.counts,
        }
    }
}

impl std::ops::Div for Unit {
    type Output = Unit;
    fn div(self, rhs: Unit) -> Unit {
        Unit {
            m: self.m - rhs.m,
            kg: self.kg - rhs.kg,
            s: self.s - rhs.s,
            k: self.k - rhs.k,
            counts: self.counts - rhs.counts,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_dimensionless() {
            return f.write_str("dimensionless");
        }
        let mut first = true;
        for (symbol, exponent) in [
            ("m", self.m),
            ("kg", self.kg),
            ("s", self.s),
            ("K", self.k),
            ("counts", self.counts),
        ] {
            if exponent == 0 {
                continue;
            }
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if exponent == 1 {
                f.write_str(symbol)?;
            } else {
                write!(f, "{symbol}^{exponent}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unit({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplication_composes_exponents() {
        assert_eq!(Unit::M * Unit::M, Unit::M.powi(2));
        assert_eq!(Unit::M / Unit::S, Unit::M * Unit::S.powi(-1));
        assert_eq!(Unit::COUNTS / Unit::COUNTS, Unit::DIMENSIONLESS);
    }

    #[test]
    fn sqrt_requires_perfect_square() {
        assert_eq!(Unit::M.powi(2).sqrt().unwrap(), Unit::M);
        assert_eq!(Unit::DIMENSIONLESS.sqrt().unwrap(), Unit::DIMENSIONLESS);
        assert!(Unit::M.sqrt().is_err());
        assert!((Unit::M.powi(2) / Unit::S).sqrt().is_err());
    }

    #[test]
    fn display_is_symbolic() {
        assert_eq!(Unit::DIMENSIONLESS.to_string(), "dimensionless");
        assert_eq!(Unit::M.to_string(), "m");
        assert_eq!(Unit::M.powi(2).to_string(), "m^2");
        assert_eq!((Unit::M / Unit::S).to_string(), "m s^-1");
        assert_eq!(Unit::COUNTS.to_string(), "counts");
    }
}
