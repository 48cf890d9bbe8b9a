//! Runtime element-type identification.
//!
//! [`DType`] is the value used for runtime dispatch in the transform engine
//! and the variable factory; the [`Element`] trait binds a Rust type to its
//! `DType` and declares whether it may carry a variance channel.

use crate::spatial::{Affine3, DateTime, IndexPair, Matrix3, Quaternion, Translation, Vector3};

/// Identifies the element type of a variable.
///
/// Two values compare equal iff they name the same element type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum DType {
    Float64,
    Float32,
    Int64,
    Int32,
    Bool,
    Str,
    Vector3,
    Matrix3,
    Affine3,
    Quaternion,
    Translation,
    DateTime,
    IndexPair,
    /// Binned variable: elements are `[begin, end)` slices of a shared buffer.
    Binned,
}

impl DType {
    /// True for element types that may carry a variance channel.
    pub fn has_variances(self) -> bool {
        matches!(self, DType::Float64 | DType::Float32)
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::Float64 => "float64",
            DType::Float32 => "float32",
            DType::Int64 => "int64",
            DType::Int32 => "int32",
            DType::Bool => "bool",
            DType::Str => "string",
            DType::Vector3 => "vector3",
            DType::Matrix3 => "matrix3",
            DType::Affine3 => "affine3",
            DType::Quaternion => "quaternion",
            DType::Translation => "translation",
            DType::DateTime => "datetime64",
            DType::IndexPair => "index_pair",
            DType::Binned => "binned",
        };
        f.write_str(name)
    }
}

/// A Rust type storable as variable elements.
pub trait Element:
    Clone + PartialEq + Default + Send + Sync + std::fmt::Debug + 'static
{
    const DTYPE: DType;
    /// Whether this element type may carry a variance channel.
    const VARIANCES: bool = false;
}

impl Element for f64 {
    const DTYPE: DType = DType::Float64;
    const VARIANCES: bool = true;
}

impl Element for f32 {
    const DTYPE: DType = DType::Float32;
    const VARIANCES: bool = true;
}

impl Element for i64 {
    const DTYPE: DType = DType::Int64;
}

impl Element for i32 {
    const DTYPE: DType = DType::Int32;
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;
}

impl Element for String {
    const DTYPE: DType = DType::Str;
}

impl Element for Vector3 {
    const DTYPE: DType = DType::Vector3;
}

impl Element for Matrix3 {
    const DTYPE: DType = DType::Matrix3;
}

impl Element for Affine3 {
    const DTYPE: DType = DType::Affine3;
}

impl Element for Quaternion {
    const DTYPE: DType = DType::Quaternion;
}

impl Element for Translation {
    const DTYPE: DType = DType::Translation;
}

impl Element for DateTime {
    const DTYPE: DType = DType::DateTime;
}

impl Element for IndexPair {
    const DTYPE: DType = DType::IndexPair;
}
