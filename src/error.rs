//! Error taxonomy for labeled-array operations.
//!
//! Every fallible operation in the crate returns [`Result`]. Messages
//! value-format the offending [`Dimensions`], [`DType`] or [`Unit`] so that
//! a failure can be diagnosed without a debugger.

use crate::dim::Dim;
use crate::dimensions::Dimensions;
use crate::dtype::DType;
use crate::unit::Unit;
use crate::Index;

/// Errors raised by labeled-array operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Generic dimension error (bad label, broadcast-output write, rank cap).
    #[error("{0}")]
    Dimension(String),

    /// Two `Dimensions` values were expected to match but differ.
    #[error("Expected dimensions {expected}, got {actual}.")]
    DimensionMismatch {
        expected: Dimensions,
        actual: Dimensions,
    },

    /// A dimension label is missing from a `Dimensions` value.
    #[error("Expected dimension to be in {dims}, got {dim}.")]
    DimensionNotFound { dims: Dimensions, dim: Dim },

    /// A shared dimension label carries mismatching lengths.
    #[error("Expected dimension to be in {dims}, got {dim} with mismatching length {length}.")]
    DimensionLength {
        dims: Dimensions,
        dim: Dim,
        length: Index,
    },

    /// Element type does not match the requested type.
    #[error("Expected dtype {expected}, got {actual}.")]
    TypeMismatch { expected: DType, actual: DType },

    /// Element type is not supported by an operation.
    #[error("Unsupported dtype {dtype} for operation '{op}'.")]
    TypeUnsupported { op: &'static str, dtype: DType },

    /// Element-type pair is not supported by a binary operation.
    #[error("Unsupported dtype combination ({left}, {right}) for operation '{op}'.")]
    TypePairUnsupported {
        op: &'static str,
        left: DType,
        right: DType,
    },

    /// Unit precondition violated.
    #[error("{0}")]
    Unit(String),

    /// Two units were expected to match but differ.
    #[error("Expected unit {expected}, got {actual}.")]
    UnitMismatch { expected: Unit, actual: Unit },

    /// Variance-channel precondition violated.
    #[error("{0}")]
    Variances(String),

    /// Bin-edge precondition violated (histogram edges, edge concatenation).
    #[error("{0}")]
    BinEdge(String),

    /// Out-of-range index or range on a dimension.
    #[error("Expected slice [{begin}, {end}) to be within [0, {length}) of {dim}.")]
    Slice {
        dim: Dim,
        begin: Index,
        end: Index,
        length: Index,
    },
}

/// Result type for labeled-array operations.
pub type Result<T> = std::result::Result<T, Error>;
