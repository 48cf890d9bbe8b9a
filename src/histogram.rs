//! 1-D histogramming of event data.
//!
//! The bin lookup has two paths: when the edge array is detected as linear
//! (constant spacing) the bin is `floor((x - offset) * scale)`, which is
//! substantially faster than a binary search; otherwise the edges must be
//! sorted ascending and `upper_bound` finds the bin. Events at or beyond
//! the last edge are dropped. Weights must be `counts` or dimensionless
//! and must carry variances; each output bin accumulates the variances of
//! the events mapped to it.

use crate::data_array::DataArray;
use crate::dim::Dim;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::spatial::IndexPair;
use crate::unit::Unit;
use crate::variable::Variable;
use crate::Index;

/// Constant-spacing detection; tolerant of float rounding in the spacings.
fn is_linspace(edges: &[f64]) -> bool {
    if edges.len() < 2 {
        return false;
    }
    let step = (edges[edges.len() - 1] - edges[0]) / (edges.len() - 1) as f64;
    if step <= 0.0 {
        return false;
    }
    edges
        .windows(2)
        .all(|pair| ((pair[1] - pair[0]) - step).abs() <= step * 1e-11)
}

/// `(offset, nbin, scale)` such that `bin = (x - offset) * scale`.
fn linear_edge_params(edges: &[f64]) -> (f64, f64, f64) {
    let nbin = (edges.len() - 1) as f64;
    let offset = edges[0];
    let scale = nbin / (edges[edges.len() - 1] - edges[0]);
    (offset, nbin, scale)
}

fn expect_sorted(edges: &[f64]) -> Result<()> {
    if edges.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(Error::BinEdge(
            "Expected histogram bin edges to be sorted ascending.".into(),
        ));
    }
    Ok(())
}

enum BinLookup {
    Linear { offset: f64, nbin: f64, scale: f64 },
    Sorted,
}

impl BinLookup {
    fn new(edges: &[f64]) -> Result<BinLookup> {
        if edges.len() < 2 {
            return Err(Error::BinEdge(format!(
                "Expected at least two histogram bin edges, got {}.",
                edges.len()
            )));
        }
        if is_linspace(edges) {
            let (offset, nbin, scale) = linear_edge_params(edges);
            Ok(BinLookup::Linear {
                offset,
                nbin,
                scale,
            })
        } else {
            expect_sorted(edges)?;
            Ok(BinLookup::Sorted)
        }
    }

    /// The bin containing `x`, if any. Bins are left-closed; the last edge
    /// is exclusive.
    fn find(&self, x: f64, edges: &[f64]) -> Option<usize> {
        match *self {
            BinLookup::Linear {
                offset,
                nbin,
                scale,
            } => {
                let bin = (x - offset) * scale;
                if bin >= 0.0 && bin < nbin {
                    Some(bin as usize)
                } else {
                    None
                }
            }
            BinLookup::Sorted => {
                // upper_bound, then step back one edge.
                let upper = edges.partition_point(|&edge| edge <= x);
                if upper > 0 && upper < edges.len() {
                    Some(upper - 1)
                } else {
                    None
                }
            }
        }
    }
}

fn expect_histogram_units(
    events_unit: Unit,
    weights_unit: Unit,
    edge_unit: Unit,
) -> Result<Unit> {
    if events_unit != edge_unit {
        return Err(Error::Unit(
            "Bin edges must have the same unit as the event coordinate.".into(),
        ));
    }
    if !weights_unit.is_counts() && !weights_unit.is_dimensionless() {
        return Err(Error::Unit(format!(
            "Weights of event data must be counts or dimensionless, got {weights_unit}."
        )));
    }
    Ok(weights_unit)
}

fn float_values(var: &Variable, what: &'static str) -> Result<Vec<f64>> {
    match var.dtype() {
        DType::Float64 => Ok(var.values::<f64>()?.to_vec()),
        DType::Float32 => Ok(var.values::<f32>()?.iter().map(|&v| v as f64).collect()),
        dtype => Err(Error::TypeUnsupported { op: what, dtype }),
    }
}

fn float_variances(var: &Variable, what: &'static str) -> Result<Vec<f64>> {
    match var.dtype() {
        DType::Float64 => Ok(var.variances::<f64>()?.to_vec()),
        DType::Float32 => Ok(var.variances::<f32>()?.iter().map(|&v| v as f64).collect()),
        dtype => Err(Error::TypeUnsupported { op: what, dtype }),
    }
}

/// Histograms dense 1-D event data.
///
/// `events` holds the coordinate of each event, `weights` the weight (with
/// variances) to accumulate, `edges` the bin edges along the output
/// dimension. Returns the per-bin weight sums with summed variances.
pub fn histogram(events: &Variable, weights: &Variable, edges: &Variable) -> Result<Variable> {
    if events.dims() != weights.dims() {
        return Err(Error::DimensionMismatch {
            expected: events.dims().clone(),
            actual: weights.dims().clone(),
        });
    }
    if edges.ndim() != 1 {
        return Err(Error::Dimension(format!(
            "Expected one-dimensional bin edges, got {}.",
            edges.dims()
        )));
    }
    if events.has_variances() {
        return Err(Error::Variances(
            "The event coordinate must not have variances.".into(),
        ));
    }
    if !weights.has_variances() {
        return Err(Error::Variances(
            "Weights of event data must have variances.".into(),
        ));
    }
    let unit = expect_histogram_units(events.unit(), weights.unit(), edges.unit())?;

    let edge_dim = edges
        .dims()
        .outer()
        .ok_or_else(|| Error::Dimension("Bin edges must have a dimension.".into()))?;
    let edge_values = float_values(edges, "histogram")?;
    let lookup = BinLookup::new(&edge_values)?;

    let event_values = float_values(events, "histogram")?;
    let weight_values = float_values(weights, "histogram")?;
    let weight_variances = float_variances(weights, "histogram")?;

    let nbin = edge_values.len() - 1;
    let mut values = vec![0.0f64; nbin];
    let mut variances = vec![0.0f64; nbin];
    accumulate_events(
        &lookup,
        &edge_values,
        &event_values,
        &weight_values,
        &weight_variances,
        &mut values,
        &mut variances,
    );

    let mut out_dims = crate::dimensions::Dimensions::new();
    out_dims.push_inner(edge_dim, nbin as Index)?;
    Variable::with_variances::<f64>(out_dims, unit, values, variances)
}

fn accumulate_events(
    lookup: &BinLookup,
    edges: &[f64],
    events: &[f64],
    weights: &[f64],
    weight_variances: &[f64],
    values: &mut [f64],
    variances: &mut [f64],
) {
    for (i, &x) in events.iter().enumerate() {
        if let Some(bin) = lookup.find(x, edges) {
            values[bin] += weights[i];
            variances[bin] += weight_variances[i];
        }
    }
}

/// Histograms binned event data: the 1-D algorithm runs on each bin.
///
/// `coords` and `weights` are binned variables with identical bin layouts;
/// the output gains the edge dimension at the inner end.
pub fn histogram_binned(
    coords: &Variable,
    weights: &Variable,
    edges: &Variable,
) -> Result<Variable> {
    let (coord_pairs, coord_dim, coord_buffer) = crate::binned::binned_parts(coords)?;
    let (weight_pairs, weight_dim, weight_buffer) = crate::binned::binned_parts(weights)?;
    if coords.dims() != weights.dims()
        || coord_dim != weight_dim
        || !coord_pairs.iter().eq(weight_pairs.iter())
    {
        return Err(Error::Dimension(
            "Histogram coordinates and weights must have identical bin layouts.".into(),
        ));
    }
    if !weight_buffer.has_variances() {
        return Err(Error::Variances(
            "Weights of event data must have variances.".into(),
        ));
    }
    let unit =
        expect_histogram_units(coord_buffer.unit(), weight_buffer.unit(), edges.unit())?;

    let edge_dim = edges
        .dims()
        .outer()
        .ok_or_else(|| Error::Dimension("Bin edges must have a dimension.".into()))?;
    let edge_values = float_values(edges, "histogram")?;
    let lookup = BinLookup::new(&edge_values)?;
    let nbin = edge_values.len() - 1;

    let event_values = float_values(coord_buffer, "histogram")?;
    let weight_values = float_values(weight_buffer, "histogram")?;
    let weight_variances = float_variances(weight_buffer, "histogram")?;

    let pairs: Vec<IndexPair> = coord_pairs.to_vec();
    let mut values = vec![0.0f64; pairs.len() * nbin];
    let mut variances = vec![0.0f64; pairs.len() * nbin];
    for (k, pair) in pairs.iter().enumerate() {
        let begin = pair.begin.max(0) as usize;
        let end = pair.end.max(0) as usize;
        let out = k * nbin..(k + 1) * nbin;
        accumulate_events(
            &lookup,
            &edge_values,
            &event_values[begin..end],
            &weight_values[begin..end],
            &weight_variances[begin..end],
            &mut values[out.clone()],
            &mut variances[out],
        );
    }

    let mut out_dims = coords.dims().clone();
    out_dims.push_inner(edge_dim, nbin as Index)?;
    Variable::with_variances::<f64>(out_dims, unit, values, variances)
}

/// Looks up the histogram value at every event's coordinate.
///
/// For each event in each bin of `coords`, finds the bin of `hist` (a 1-D
/// histogram over `dim` with an edge coordinate) containing the event
/// coordinate and emits the looked-up value into a parallel bin structure.
/// Events outside all edges map to 0; masked histogram bins map to 0.
pub fn map(hist: &DataArray, coords: &Variable, dim: Dim) -> Result<Variable> {
    let (pairs, bin_dim, coord_buffer) = crate::binned::binned_parts(coords)?;
    let edges = hist.coords().get(&dim).ok_or_else(|| {
        Error::DimensionNotFound {
            dims: hist.data().dims().clone(),
            dim,
        }
    })?;
    if edges.unit() != coord_buffer.unit() {
        return Err(Error::Unit(
            "Bin edges must have the same unit as the event coordinate.".into(),
        ));
    }
    let nbin = hist.data().dims().length(dim)?;
    if edges.dims().length(dim)? != nbin + 1 {
        return Err(Error::BinEdge(format!(
            "Expected a bin-edge coordinate of length {} along {dim}.",
            nbin + 1
        )));
    }

    let edge_values = float_values(edges, "map")?;
    let lookup = BinLookup::new(&edge_values)?;
    let hist_values = float_values(hist.data(), "map")?;
    let hist_variances = if hist.data().has_variances() {
        Some(float_variances(hist.data(), "map")?)
    } else {
        None
    };
    let masked = hist.combined_mask(dim)?;

    let event_values = float_values(coord_buffer, "map")?;
    let mut values = vec![0.0f64; event_values.len()];
    let mut variances = hist_variances.as_ref().map(|_| vec![0.0f64; event_values.len()]);
    for (i, &x) in event_values.iter().enumerate() {
        let Some(bin) = lookup.find(x, &edge_values) else {
            continue;
        };
        if masked.as_ref().map(|m| m[bin]).unwrap_or(false) {
            continue;
        }
        values[i] = hist_values[bin];
        if let (Some(variances), Some(hist_variances)) = (&mut variances, &hist_variances) {
            variances[i] = hist_variances[bin];
        }
    }

    let mut buffer_dims = coord_buffer.dims().clone();
    buffer_dims.resize(bin_dim, event_values.len() as Index)?;
    let out_buffer = match variances {
        Some(variances) => Variable::with_variances::<f64>(
            buffer_dims,
            hist.data().unit(),
            values,
            variances,
        )?,
        None => Variable::new::<f64>(buffer_dims, hist.data().unit(), values)?,
    };
    let indices = Variable::new::<IndexPair>(
        coords.dims().clone(),
        Unit::DIMENSIONLESS,
        pairs.to_vec(),
    )?;
    crate::binned::make_bins_no_validate(indices, bin_dim, out_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_detection() {
        assert!(is_linspace(&[0.0, 1.0, 2.0, 3.0]));
        assert!(!is_linspace(&[0.0, 1.0, 2.0, 4.0]));
        assert!(!is_linspace(&[1.0]));
        assert!(!is_linspace(&[2.0, 1.0, 0.0]));
    }

    #[test]
    fn linear_lookup_matches_sorted_lookup() {
        let edges = [0.0, 1.0, 2.0, 3.0, 4.0];
        let linear = BinLookup::new(&edges).unwrap();
        assert!(matches!(linear, BinLookup::Linear { .. }));
        let sorted = BinLookup::Sorted;
        for x in [-0.5, 0.0, 0.5, 1.0, 2.7, 3.999, 4.0, 7.0] {
            assert_eq!(linear.find(x, &edges), sorted.find(x, &edges), "x = {x}");
        }
    }

    #[test]
    fn events_on_interior_edges_go_right_last_edge_drops() {
        let edges = [0.0, 1.0, 2.0, 4.0];
        let lookup = BinLookup::new(&edges).unwrap();
        assert!(matches!(lookup, BinLookup::Sorted));
        assert_eq!(lookup.find(1.0, &edges), Some(1));
        assert_eq!(lookup.find(4.0, &edges), None);
        assert_eq!(lookup.find(-0.1, &edges), None);
    }

    #[test]
    fn unsorted_edges_are_rejected() {
        assert!(BinLookup::new(&[0.0, 2.0, 1.0]).is_err());
        assert!(BinLookup::new(&[1.0]).is_err());
    }
}
