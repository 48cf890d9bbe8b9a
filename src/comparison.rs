//! Deep equality of variables.
//!
//! Two variables are equal when dims (including order), unit, dtype,
//! variance presence, and every element (values and variances) agree.
//! Binned variables compare bin by bin: layouts may differ in absolute
//! buffer offsets as long as each bin's contents match.

use crate::dtype::Element;
use crate::variable::{dispatch_element, Variable};

fn eq_dense<T: Element>(a: &Variable, b: &Variable) -> bool {
    let (Ok(a_values), Ok(b_values)) = (a.values::<T>(), b.values::<T>()) else {
        return false;
    };
    if !a_values.iter().eq(b_values.iter()) {
        return false;
    }
    if a.has_variances() {
        let (Ok(a_variances), Ok(b_variances)) = (a.variances::<T>(), b.variances::<T>())
        else {
            return false;
        };
        if !a_variances.iter().eq(b_variances.iter()) {
            return false;
        }
    }
    true
}

fn eq_binned(a: &Variable, b: &Variable) -> bool {
    let (Ok((a_pairs, a_dim, a_buffer)), Ok((b_pairs, b_dim, b_buffer))) =
        (crate::binned::binned_parts(a), crate::binned::binned_parts(b))
    else {
        return false;
    };
    if a_dim != b_dim {
        return false;
    }
    for (pa, pb) in a_pairs.iter().zip(b_pairs.iter()) {
        if pa.len() != pb.len() {
            return false;
        }
        let (Ok(slice_a), Ok(slice_b)) = (
            a_buffer.slice_range(a_dim, pa.begin, pa.end),
            b_buffer.slice_range(b_dim, pb.begin, pb.end),
        ) else {
            return false;
        };
        if slice_a != slice_b {
            return false;
        }
    }
    true
}

impl PartialEq for Variable {
    fn eq(&self, other: &Variable) -> bool {
        if self.dims() != other.dims()
            || self.dtype() != other.dtype()
            || self.unit() != other.unit()
            || self.has_variances() != other.has_variances()
        {
            return false;
        }
        dispatch_element!(self.dtype(), eq_dense(self, other), eq_binned(self, other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dim::Dim;
    use crate::dimensions::Dimensions;
    use crate::spatial::IndexPair;
    use crate::unit::Unit;
    use crate::Index;

    fn dims(pairs: &[(Dim, Index)]) -> Dimensions {
        Dimensions::from_pairs(pairs).unwrap()
    }

    #[test]
    fn equality_requires_matching_metadata() {
        let a = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![1.0, 2.0]).unwrap();
        assert_eq!(a, a.clone());
        assert_eq!(a, a.copy().unwrap());

        let other_unit =
            Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::S, vec![1.0, 2.0]).unwrap();
        assert_ne!(a, other_unit);

        let other_dims =
            Variable::new::<f64>(dims(&[(Dim::Y, 2)]), Unit::M, vec![1.0, 2.0]).unwrap();
        assert_ne!(a, other_dims);

        let other_values =
            Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![1.0, 2.5]).unwrap();
        assert_ne!(a, other_values);

        let mut with_variances = a.clone();
        with_variances
            .set_variances(Some(
                &Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![0.1, 0.2]).unwrap(),
            ))
            .unwrap();
        assert_ne!(a, with_variances);
    }

    #[test]
    fn strided_views_compare_by_content() {
        let a = Variable::new::<f64>(
            dims(&[(Dim::Y, 2), (Dim::X, 2)]),
            Unit::M,
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let row = a.slice(Dim::Y, 1).unwrap();
        let fresh = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![3.0, 4.0])
            .unwrap();
        assert_eq!(row, fresh);
    }

    #[test]
    fn binned_variables_compare_bin_contents() {
        let make = |values: Vec<f64>| {
            let indices = Variable::new::<IndexPair>(
                dims(&[(Dim::Y, 2)]),
                Unit::DIMENSIONLESS,
                vec![IndexPair::new(0, 2), IndexPair::new(2, 4)],
            )
            .unwrap();
            let buffer =
                Variable::new::<f64>(dims(&[(Dim::X, 4)]), Unit::M, values).unwrap();
            crate::binned::make_bins(indices, Dim::X, buffer).unwrap()
        };
        let a = make(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a, make(vec![1.0, 2.0, 3.0, 4.0]));
        assert_ne!(a, make(vec![1.0, 2.0, 3.0, 5.0]));
    }
}
