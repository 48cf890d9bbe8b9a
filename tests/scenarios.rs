//! End-to-end scenarios exercising the public API.

use approx::assert_relative_eq;
use labarray::{
    accumulate_in_place, add, histogram, make_bins, mul, mul_assign, Dim, Dimensions, Error,
    Index, IndexPair, Plus, Unit, Variable,
};

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
    let b = Variable::new::<f64>(dims(&[(Dim::Z, 3)]), Unit::M, vec![0.1, 0.2, 0.3]).unwrap();

    let sum = add(&a, &b).unwrap();
    assert_eq!(sum.dims(), &dims(&[(Dim::Z, 3), (Dim::Y, 2), (Dim::X, 1)]));
    assert_eq!(sum.unit(), Unit::M);
    let expected = [1.1, 2.1, 3.2, 4.2, 5.3, 6.3];
    for (value, expected) in sum.values::<f64>().unwrap().to_vec().iter().zip(expected) {
        assert_relative_eq!(*value, expected);
    }
    // The argument order does not matter for the broadcast.
    assert_eq!(add(&b, &a).unwrap(), sum);
}

#[test]
fn multiplication_with_variance() {
    let a = Variable::with_variances::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![3.0], vec![2.0])
        .unwrap();
    let b = Variable::with_variances::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![4.0], vec![3.0])
        .unwrap();

    let product = mul(&a, &b).unwrap();
    assert_eq!(product.values::<f64>().unwrap().to_vec(), vec![12.0]);
    assert_eq!(
        product.variances::<f64>().unwrap().to_vec(),
        vec![2.0 * 16.0 + 3.0 * 9.0]
    );
    assert_eq!(product.unit(), Unit::M.powi(2));
}

#[test]
fn variance_mismatch_rejected() {
    let mut a =
        Variable::with_variances::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![3.0], vec![2.0])
            .unwrap();
    let b = Variable::new::<f64>(dims(&[(Dim::X, 1)]), Unit::M, vec![4.0]).unwrap();

    assert!(matches!(mul_assign(&mut a, &b), Err(Error::Variances(_))));
    // The destination is untouched by the failed operation.
    assert_eq!(a.values::<f64>().unwrap().to_vec(), vec![3.0]);
    assert_eq!(a.variances::<f64>().unwrap().to_vec(), vec![2.0]);
}

#[test]
fn histogram_on_nonlinear_edges() {
    // Spacings 1, 1, 2: not linear, so lookup goes through upper_bound.
    let events = Variable::new::<f64>(
        dims(&[(Dim::EVENT, 4)]),
        Unit::M,
        vec![1.0, 2.0, 3.0, 4.0],
    )
    .unwrap();
    let weights = Variable::with_variances::<f64>(
        dims(&[(Dim::EVENT, 4)]),
        Unit::COUNTS,
        vec![1.0, 2.0, 3.0, 4.0],
        vec![1.0, 2.0, 3.0, 4.0],
    )
    .unwrap();
    let edges =
        Variable::new::<f64>(dims(&[(Dim::X, 4)]), Unit::M, vec![0.0, 1.0, 2.0, 4.0]).unwrap();

    let hist = histogram(&events, &weights, &edges).unwrap();
    assert_eq!(hist.dims(), &dims(&[(Dim::X, 3)]));
    assert_eq!(hist.unit(), Unit::COUNTS);
    assert_eq!(hist.values::<f64>().unwrap().to_vec(), vec![0.0, 1.0, 5.0]);
    assert_eq!(
        hist.variances::<f64>().unwrap().to_vec(),
        vec![0.0, 1.0, 5.0]
    );
}

#[test]
fn binned_concatenate() {
    let indices = Variable::new::<IndexPair>(
        dims(&[(Dim::Y, 2)]),
        Unit::DIMENSIONLESS,
        vec![IndexPair::new(0, 2), IndexPair::new(2, 4)],
    )
    .unwrap();
    let buffer = Variable::new::<f64>(
        dims(&[(Dim::X, 4)]),
        Unit::DIMENSIONLESS,
        vec![1.0, 2.0, 3.0, 4.0],
    )
    .unwrap();
    let a = make_bins(indices, Dim::X, buffer).unwrap();
    let b = mul(&a, &Variable::scalar(3.0f64, Unit::DIMENSIONLESS)).unwrap();

    let joined = labarray::concatenate_bins(&a, &b).unwrap();
    assert_eq!(
        labarray::bin_indices(&joined)
            .unwrap()
            .values::<IndexPair>()
            .unwrap()
            .to_vec(),
        vec![IndexPair::new(0, 4), IndexPair::new(4, 8)]
    );
    let buffer = labarray::binned::buffer(&joined).unwrap();
    assert_eq!(
        buffer.values::<f64>().unwrap().to_vec(),
        vec![1.0, 2.0, 3.0, 6.0, 3.0, 4.0, 9.0, 12.0]
    );
}

#[test]
fn binned_histogram_and_map_round_trip() {
    // Two bins of events with coordinates along x and unit weights.
    let indices = Variable::new::<IndexPair>(
        dims(&[(Dim::Y, 2)]),
        Unit::DIMENSIONLESS,
        vec![IndexPair::new(0, 3), IndexPair::new(3, 5)],
    )
    .unwrap();
    let coords_buffer = Variable::new::<f64>(
        dims(&[(Dim::EVENT, 5)]),
        Unit::M,
        vec![0.5, 1.5, 1.6, 0.2, 2.5],
    )
    .unwrap();
    let weights_buffer = Variable::with_variances::<f64>(
        dims(&[(Dim::EVENT, 5)]),
        Unit::COUNTS,
        vec![1.0; 5],
        vec![1.0; 5],
    )
    .unwrap();
    let coords = make_bins(indices.clone(), Dim::EVENT, coords_buffer).unwrap();
    let weights = make_bins(indices, Dim::EVENT, weights_buffer).unwrap();
    let edges =
        Variable::new::<f64>(dims(&[(Dim::X, 4)]), Unit::M, vec![0.0, 1.0, 2.0, 3.0]).unwrap();

    let hist = labarray::histogram_binned(&coords, &weights, &edges).unwrap();
    assert_eq!(hist.dims(), &dims(&[(Dim::Y, 2), (Dim::X, 3)]));
    assert_eq!(
        hist.values::<f64>().unwrap().to_vec(),
        vec![1.0, 2.0, 0.0, 1.0, 0.0, 1.0]
    );

    // Look the events back up in a 1-D histogram with a masked bin.
    let data = Variable::with_variances::<f64>(
        dims(&[(Dim::X, 3)]),
        Unit::COUNTS,
        vec![10.0, 20.0, 30.0],
        vec![1.0, 2.0, 3.0],
    )
    .unwrap();
    let mut lookup = labarray::DataArray::new("lookup", data);
    lookup
        .set_coord(
            Dim::X,
            Variable::new::<f64>(dims(&[(Dim::X, 4)]), Unit::M, vec![0.0, 1.0, 2.0, 3.0])
                .unwrap(),
        )
        .unwrap();
    lookup
        .set_mask(
            "bad",
            Variable::new::<bool>(
                dims(&[(Dim::X, 3)]),
                Unit::DIMENSIONLESS,
                vec![false, false, true],
            )
            .unwrap(),
        )
        .unwrap();

    let mapped = labarray::histogram::map(&lookup, &coords, Dim::X).unwrap();
    let buffer = labarray::binned::buffer(&mapped).unwrap();
    // Events: bins 0, 1, 1, 0, 2(masked) -> values 10, 20, 20, 10, 0.
    assert_eq!(
        buffer.values::<f64>().unwrap().to_vec(),
        vec![10.0, 20.0, 20.0, 10.0, 0.0]
    );
    assert_eq!(
        buffer.variances::<f64>().unwrap().to_vec(),
        vec![1.0, 2.0, 2.0, 1.0, 0.0]
    );
    assert_eq!(buffer.unit(), Unit::COUNTS);
}

#[test]
fn in_place_accumulate_with_broadcast_input() {
    let mut out = Variable::new::<f64>(dims(&[(Dim::X, 2)]), Unit::M, vec![0.0, 0.0]).unwrap();
    let input = Variable::new::<f64>(
        dims(&[(Dim::Y, 3), (Dim::X, 2)]),
        Unit::M,
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    )
    .unwrap();

    accumulate_in_place(&mut out, &input, Plus).unwrap();
    assert_eq!(out.values::<f64>().unwrap().to_vec(), vec![9.0, 12.0]);
}
