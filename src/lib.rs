//! Labeled, unit-aware multidimensional arrays with uncertainty propagation.
//!
//! The data model is the [`Variable`]: a typed N-dimensional buffer whose
//! axes are named by [`Dim`] labels, carrying a physical [`Unit`] and an
//! optional per-element variance channel. Elementwise operations broadcast
//! automatically by dimension label, compose units, and propagate variances
//! by the first-order uncorrelated formula.
//!
//! # Core Types
//!
//! - [`Dimensions`] / [`Strides`]: ordered labeled shapes and the per-label
//!   memory offsets of a (possibly broadcast) view
//! - [`Variable`]: owning labeled array with unit and variances; slices,
//!   transposes and broadcasts are cheap shared views (copy-on-write on
//!   mutation)
//! - [`DataArray`]: a variable with attached coordinate, mask and
//!   attribute variables
//! - Binned variables ([`make_bins`]): arrays whose elements are
//!   `[begin, end)` slices into a shared event buffer
//!
//! # Operations
//!
//! - Arithmetic ([`add`], [`sub`], [`mul`], [`div`], [`neg`] and in-place
//!   forms) through the transform engine ([`transform_binary`],
//!   [`transform_in_place`], [`transform_unary`])
//! - Math functions ([`sqrt`], [`abs`], [`exp`], [`ln`], [`log10`],
//!   [`reciprocal`], [`pow`])
//! - Reductions via [`accumulate_in_place`], [`sum`], [`mean`]
//! - Shape operations ([`concatenate`], [`concat_edges`]) and
//!   histogramming ([`histogram`], [`histogram_binned`])
//!
//! # Example
//!
//! ```rust
//! use labarray::{Dim, Dimensions, Unit, Variable};
//!
//! let dims = Dimensions::from_pairs(&[(Dim::X, 3)]).unwrap();
//! let a = Variable::new::<f64>(dims, Unit::M, vec![1.0, 2.0, 3.0]).unwrap();
//! let scale = Variable::scalar(2.0f64, Unit::DIMENSIONLESS);
//!
//! // Broadcasting multiply; the unit follows the operands.
//! let scaled = labarray::mul(&a, &scale).unwrap();
//! assert_eq!(scaled.unit(), Unit::M);
//! assert_eq!(scaled.values::<f64>().unwrap().to_vec(), vec![2.0, 4.0, 6.0]);
//! ```
//!
//! # Concurrency
//!
//! With the `parallel` feature (on by default) transforms split the
//! outermost output dimension into blocks on rayon's pool; results are
//! deterministic for elementwise operations. Buffers are shared by
//! reference counting with copy-on-write, so concurrent readers of a
//! buffer are safe and writers always own their allocation.

pub mod accumulate;
pub mod arithmetic;
pub mod binned;
mod comparison;
pub mod data_array;
pub mod dim;
pub mod dimensions;
pub mod dtype;
pub mod element_view;
pub mod error;
pub mod factory;
pub mod histogram;
pub mod math;
pub mod parallel;
pub mod shape;
pub mod spatial;
pub mod strides;
pub mod transform;
pub mod unit;
pub mod value_variance;
pub mod variable;
pub mod view_index;

/// The index type: signed, 64-bit.
pub type Index = i64;

/// Maximum supported number of dimensions.
pub const NDIM_MAX: usize = 8;

pub use accumulate::{accumulate_in_place, mean, sum};
pub use arithmetic::{
    add, add_assign, div, div_assign, mul, mul_assign, neg, sub, sub_assign, Divide, Minus,
    Plus, Times,
};
pub use binned::{
    append_bins, bin_dim, bin_indices, bin_sizes, bucket_sum, concatenate_bins, make_bins,
    make_bins_no_validate,
};
pub use data_array::{concatenate_data_arrays, DataArray};
pub use dim::Dim;
pub use dimensions::{merge, Dimensions};
pub use dtype::{DType, Element};
pub use element_view::{ElementArrayView, ElementArrayViewMut};
pub use error::{Error, Result};
pub use factory::{create_variable, register_maker, VariableMaker};
pub use histogram::{histogram, histogram_binned};
pub use math::{
    abs, exp, ln, log10, pow, reciprocal, sqrt, Abs, Exp, Identity, Ln, Log10, Pow,
    Reciprocal, Sqrt,
};
pub use parallel::{parallel_for, MaybeSend, MaybeSync, MIN_THREAD_LENGTH};
pub use shape::{concat_edges, concatenate};
pub use spatial::{
    Affine3, DateTime, IndexPair, Matrix3, Quaternion, Translation, Vector3,
};
pub use strides::Strides;
pub use transform::{
    transform_binary, transform_in_place, transform_unary, BinaryOp, FloatElement,
    NumericElement, Promote, UnaryOp, VariancePolicy,
};
pub use unit::Unit;
pub use value_variance::ValueAndVariance;
pub use variable::Variable;
pub use view_index::ViewIndex;
