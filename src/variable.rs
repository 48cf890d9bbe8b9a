//! The `Variable`: a labeled, unit-aware N-dimensional array.
//!
//! A [`Variable`] owns a [`Dimensions`] value, a unit and a shared handle
//! to a type-erased data model holding the element buffer and the optional
//! variance buffer. Slicing, transposing and broadcasting adjust the
//! (dims, strides, offset) triple and share the model; any mutation first
//! uniquifies the shared model (copy-on-write), so no handle can observe
//! another handle's writes. That uniquify step is also what makes aliased
//! in-place transforms read-before-write safe: the destination detaches
//! from the shared buffer before the first element is written.

use std::any::Any;
use std::sync::Arc;

use crate::dim::Dim;
use crate::dimensions::Dimensions;
use crate::dtype::{DType, Element};
use crate::element_view::{ElementArrayView, ElementArrayViewMut};
use crate::error::{Error, Result};
use crate::strides::Strides;
use crate::unit::Unit;
use crate::Index;

/// Type-erased element storage shared between variable handles.
pub(crate) trait VariableData: Send + Sync {
    fn dtype(&self) -> DType;
    fn len(&self) -> Index;
    fn has_variances(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn VariableData>;
}

/// Dense storage: a value buffer plus an optional variance buffer of
/// identical length.
pub(crate) struct DenseData<T: Element> {
    pub values: Vec<T>,
    pub variances: Option<Vec<T>>,
}

impl<T: Element> VariableData for DenseData<T> {
    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn len(&self) -> Index {
        self.values.len() as Index
    }

    fn has_variances(&self) -> bool {
        self.variances.is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn VariableData> {
        Box::new(DenseData {
            values: self.values.clone(),
            variances: self.variances.clone(),
        })
    }
}

/// Dispatches a generic call on a runtime [`DType`], with an explicit arm
/// for the binned dtype.
macro_rules! dispatch_element {
    ($dtype:expr, $generic:ident ( $($arg:expr),* ), $binned:expr) => {
        match $dtype {
            $crate::DType::Float64 => $generic::<f64>($($arg),*),
            $crate::DType::Float32 => $generic::<f32>($($arg),*),
            $crate::DType::Int64 => $generic::<i64>($($arg),*),
            $crate::DType::Int32 => $generic::<i32>($($arg),*),
            $crate::DType::Bool => $generic::<bool>($($arg),*),
            $crate::DType::Str => $generic::<String>($($arg),*),
            $crate::DType::Vector3 => $generic::<$crate::spatial::Vector3>($($arg),*),
            $crate::DType::Matrix3 => $generic::<$crate::spatial::Matrix3>($($arg),*),
            $crate::DType::Affine3 => $generic::<$crate::spatial::Affine3>($($arg),*),
            $crate::DType::Quaternion => $generic::<$crate::spatial::Quaternion>($($arg),*),
            $crate::DType::Translation => $generic::<$crate::spatial::Translation>($($arg),*),
            $crate::DType::DateTime => $generic::<$crate::spatial::DateTime>($($arg),*),
            $crate::DType::IndexPair => $generic::<$crate::spatial::IndexPair>($($arg),*),
            $crate::DType::Binned => $binned,
        }
    };
}
pub(crate) use dispatch_element;

/// A labeled N-dimensional array with a unit and optional variances.
#[derive(Clone)]
pub struct Variable {
    dims: Dimensions,
    strides: Strides,
    offset: Index,
    unit: Unit,
    data: Arc<dyn VariableData>,
}

impl Variable {
    /// A dense variable owning `values`.
    ///
    /// Fails unless `values.len()` equals the volume of `dims`.
    pub fn new<T: Element>(dims: Dimensions, unit: Unit, values: Vec<T>) -> Result<Variable> {
        expect_buffer_len(&dims, values.len())?;
        Ok(Variable::from_data(
            dims,
            unit,
            Arc::new(DenseData {
                values,
                variances: None,
            }),
        ))
    }

    /// A dense variable with a variance channel.
    ///
    /// Fails for element types that cannot carry variances and on buffer
    /// length mismatches.
    pub fn with_variances<T: Element>(
        dims: Dimensions,
        unit: Unit,
        values: Vec<T>,
        variances: Vec<T>,
    ) -> Result<Variable> {
        expect_variance_capable::<T>()?;
        expect_buffer_len(&dims, values.len())?;
        expect_buffer_len(&dims, variances.len())?;
        Ok(Variable::from_data(
            dims,
            unit,
            Arc::new(DenseData {
                values,
                variances: Some(variances),
            }),
        ))
    }

    /// A scalar (zero-dimensional) variable.
    pub fn scalar<T: Element>(value: T, unit: Unit) -> Variable {
        Variable::from_data(
            Dimensions::new(),
            unit,
            Arc::new(DenseData {
                values: vec![value],
                variances: None,
            }),
        )
    }

    /// A scalar variable with a variance.
    pub fn scalar_with_variance<T: Element>(
        value: T,
        variance: T,
        unit: Unit,
    ) -> Result<Variable> {
        expect_variance_capable::<T>()?;
        Ok(Variable::from_data(
            Dimensions::new(),
            unit,
            Arc::new(DenseData {
                values: vec![value],
                variances: Some(vec![variance]),
            }),
        ))
    }

    /// A dense variable filled with `T::default()`.
    pub fn default_init<T: Element>(
        dims: Dimensions,
        unit: Unit,
        variances: bool,
    ) -> Result<Variable> {
        if variances {
            expect_variance_capable::<T>()?;
        }
        let volume = dims.volume() as usize;
        Ok(Variable::from_data(
            dims,
            unit,
            Arc::new(DenseData {
                values: vec![T::default(); volume],
                variances: variances.then(|| vec![T::default(); volume]),
            }),
        ))
    }

    pub(crate) fn from_data(
        dims: Dimensions,
        unit: Unit,
        data: Arc<dyn VariableData>,
    ) -> Variable {
        let strides = Strides::row_major(&dims);
        Variable {
            dims,
            strides,
            offset: 0,
            unit,
            data,
        }
    }

    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.ndim()
    }

    /// Number of logical elements (volume of `dims`).
    pub fn size(&self) -> Index {
        self.dims.volume()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    pub fn has_variances(&self) -> bool {
        self.data.has_variances()
    }

    pub fn is_binned(&self) -> bool {
        self.dtype() == DType::Binned
    }

    pub(crate) fn strides(&self) -> &Strides {
        &self.strides
    }

    pub(crate) fn offset(&self) -> Index {
        self.offset
    }

    /// True if both variables share the same underlying buffer.
    pub fn same_buffer(a: &Variable, b: &Variable) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }

    fn dense<T: Element>(&self) -> Result<&DenseData<T>> {
        self.data
            .as_any()
            .downcast_ref::<DenseData<T>>()
            .ok_or(Error::TypeMismatch {
                expected: T::DTYPE,
                actual: self.dtype(),
            })
    }

    /// Typed view of the element values.
    pub fn values<T: Element>(&self) -> Result<ElementArrayView<'_, T>> {
        let dense = self.dense::<T>()?;
        ElementArrayView::new(
            &dense.values,
            self.offset,
            self.dims.clone(),
            self.strides.clone(),
        )
    }

    /// Typed view of the variances.
    pub fn variances<T: Element>(&self) -> Result<ElementArrayView<'_, T>> {
        let dense = self.dense::<T>()?;
        let variances = dense
            .variances
            .as_deref()
            .ok_or_else(|| Error::Variances("Variable has no variances.".into()))?;
        ElementArrayView::new(
            variances,
            self.offset,
            self.dims.clone(),
            self.strides.clone(),
        )
    }

    /// The value of a scalar variable.
    pub fn value<T: Element>(&self) -> Result<T> {
        if self.ndim() != 0 {
            return Err(Error::Dimension(format!(
                "Expected scalar dimensions, got {}.",
                self.dims
            )));
        }
        Ok(self.values::<T>()?.get(0).clone())
    }

    /// The variance of a scalar variable.
    pub fn variance<T: Element>(&self) -> Result<T> {
        if self.ndim() != 0 {
            return Err(Error::Dimension(format!(
                "Expected scalar dimensions, got {}.",
                self.dims
            )));
        }
        Ok(self.variances::<T>()?.get(0).clone())
    }

    /// Replaces the shared model with a private deep copy unless this
    /// handle is already the sole owner.
    pub(crate) fn uniquify(&mut self) {
        if Arc::strong_count(&self.data) > 1 {
            self.data = Arc::from(self.data.clone_box());
        }
    }

    pub(crate) fn data_mut(&mut self) -> Result<&mut dyn VariableData> {
        self.uniquify();
        match Arc::get_mut(&mut self.data) {
            Some(data) => Ok(data),
            // Unreachable after uniquify; kept as an error rather than a panic.
            None => Err(Error::Dimension(
                "Variable buffer is still shared after uniquify.".into(),
            )),
        }
    }

    pub(crate) fn data(&self) -> &dyn VariableData {
        self.data.as_ref()
    }

    /// Mutable typed view of the values; uniquifies the buffer first.
    pub fn values_mut<T: Element>(&mut self) -> Result<ElementArrayViewMut<'_, T>> {
        // Resolve type errors before touching the shared buffer.
        self.dense::<T>()?;
        let offset = self.offset;
        let dims = self.dims.clone();
        let strides = self.strides.clone();
        let data = self.data_mut()?;
        let dense = data
            .as_any_mut()
            .downcast_mut::<DenseData<T>>()
            .ok_or(Error::TypeMismatch {
                expected: T::DTYPE,
                actual: DType::Binned,
            })?;
        ElementArrayViewMut::new(&mut dense.values, offset, dims, strides)
    }

    /// Mutable typed view of the variances; uniquifies the buffer first.
    pub fn variances_mut<T: Element>(&mut self) -> Result<ElementArrayViewMut<'_, T>> {
        self.variances::<T>()?;
        let offset = self.offset;
        let dims = self.dims.clone();
        let strides = self.strides.clone();
        let data = self.data_mut()?;
        let dense = data
            .as_any_mut()
            .downcast_mut::<DenseData<T>>()
            .ok_or(Error::TypeMismatch {
                expected: T::DTYPE,
                actual: DType::Binned,
            })?;
        let variances = dense
            .variances
            .as_mut()
            .ok_or_else(|| Error::Variances("Variable has no variances.".into()))?;
        ElementArrayViewMut::new(variances, offset, dims, strides)
    }

    /// Full underlying buffers (values, variances), ignoring the view.
    pub(crate) fn full_data<T: Element>(&self) -> Result<(&[T], Option<&[T]>)> {
        let dense = self.dense::<T>()?;
        Ok((&dense.values, dense.variances.as_deref()))
    }

    /// Mutable full underlying buffers; uniquifies first.
    pub(crate) fn full_data_mut<T: Element>(
        &mut self,
    ) -> Result<(&mut [T], Option<&mut [T]>)> {
        self.dense::<T>()?;
        let data = self.data_mut()?;
        let dense = data
            .as_any_mut()
            .downcast_mut::<DenseData<T>>()
            .ok_or(Error::TypeMismatch {
                expected: T::DTYPE,
                actual: DType::Binned,
            })?;
        let DenseData { values, variances } = dense;
        Ok((values.as_mut_slice(), variances.as_deref_mut()))
    }

    /// Adds, replaces or drops the variance channel.
    ///
    /// `variances` must match this variable's dims, dtype and unit and must
    /// not itself carry variances.
    pub fn set_variances(&mut self, variances: Option<&Variable>) -> Result<()> {
        let Some(source) = variances else {
            return self.drop_variances();
        };
        if !self.dtype().has_variances() {
            return Err(Error::Variances(format!(
                "Variances are not supported for dtype {}.",
                self.dtype()
            )));
        }
        if source.has_variances() {
            return Err(Error::Variances(
                "Cannot set variances from a variable that itself has variances.".into(),
            ));
        }
        if source.dims() != self.dims() {
            return Err(Error::DimensionMismatch {
                expected: self.dims.clone(),
                actual: source.dims().clone(),
            });
        }
        if source.dtype() != self.dtype() {
            return Err(Error::TypeMismatch {
                expected: self.dtype(),
                actual: source.dtype(),
            });
        }
        if source.unit() != self.unit() {
            return Err(Error::UnitMismatch {
                expected: self.unit(),
                actual: source.unit(),
            });
        }
        fn assign<T: Element>(dst: &mut Variable, src: &Variable) -> Result<()> {
            let values = src.values::<T>()?.to_vec();
            let data = dst.data_mut()?;
            let dense = data
                .as_any_mut()
                .downcast_mut::<DenseData<T>>()
                .ok_or(Error::TypeMismatch {
                    expected: T::DTYPE,
                    actual: DType::Binned,
                })?;
            dense.variances = Some(values);
            Ok(())
        }
        if !self.strides.is_contiguous(&self.dims) || self.offset != 0 {
            return Err(Error::Variances(
                "Cannot set variances through a strided view.".into(),
            ));
        }
        match self.dtype() {
            DType::Float64 => assign::<f64>(self, source),
            DType::Float32 => assign::<f32>(self, source),
            dtype => Err(Error::Variances(format!(
                "Variances are not supported for dtype {dtype}."
            ))),
        }
    }

    fn drop_variances(&mut self) -> Result<()> {
        if !self.has_variances() {
            return Ok(());
        }
        fn drop_channel<T: Element>(var: &mut Variable) -> Result<()> {
            let data = var.data_mut()?;
            if let Some(dense) = data.as_any_mut().downcast_mut::<DenseData<T>>() {
                dense.variances = None;
            }
            Ok(())
        }
        match self.dtype() {
            DType::Float64 => drop_channel::<f64>(self),
            DType::Float32 => drop_channel::<f32>(self),
            _ => Ok(()),
        }
    }

    /// Selects a single index along `dim`, removing the dimension.
    pub fn slice(&self, dim: Dim, index: Index) -> Result<Variable> {
        let length = self.dims.length(dim)?;
        if index < 0 || index >= length {
            return Err(Error::Slice {
                dim,
                begin: index,
                end: index + 1,
                length,
            });
        }
        let pos = self.position_of(dim)?;
        let mut out = self.clone();
        out.offset += index * self.strides.get(pos);
        out.dims.erase(dim)?;
        out.strides.remove(pos);
        Ok(out)
    }

    /// Restricts `dim` to `[begin, end)`, keeping the dimension.
    pub fn slice_range(&self, dim: Dim, begin: Index, end: Index) -> Result<Variable> {
        let length = self.dims.length(dim)?;
        if begin < 0 || begin > end || end > length {
            return Err(Error::Slice {
                dim,
                begin,
                end,
                length,
            });
        }
        let pos = self.position_of(dim)?;
        let mut out = self.clone();
        out.offset += begin * self.strides.get(pos);
        out.dims.resize(dim, end - begin)?;
        Ok(out)
    }

    fn position_of(&self, dim: Dim) -> Result<usize> {
        self.dims
            .index_of(dim)
            .ok_or_else(|| Error::DimensionNotFound {
                dims: self.dims.clone(),
                dim,
            })
    }

    /// Reorders dimensions; an empty `order` reverses them.
    ///
    /// Shares the buffer: only dims and strides are permuted.
    pub fn transpose(&self, order: &[Dim]) -> Result<Variable> {
        let order: Vec<Dim> = if order.is_empty() {
            self.dims.labels().rev().collect()
        } else {
            order.to_vec()
        };
        if order.len() != self.ndim() {
            return Err(Error::Dimension(format!(
                "Transpose order of length {} does not match {}.",
                order.len(),
                self.dims
            )));
        }
        let mut dims = Dimensions::new();
        let mut strides = Vec::with_capacity(order.len());
        for &dim in &order {
            let pos = self.position_of(dim)?;
            dims.push_inner(dim, self.dims.length(dim)?)?;
            strides.push(self.strides.get(pos));
        }
        let mut out = self.clone();
        out.dims = dims;
        out.strides = Strides::from_vec(strides);
        Ok(out)
    }

    /// Views this variable through `target` dims, repeating along labels it
    /// does not have (stride 0).
    ///
    /// Every label of this variable must appear in `target` with the same
    /// length.
    pub fn broadcast_to(&self, target: &Dimensions) -> Result<Variable> {
        if !target.includes(&self.dims) {
            return Err(Error::DimensionMismatch {
                expected: target.clone(),
                actual: self.dims.clone(),
            });
        }
        let mut strides = Vec::with_capacity(target.ndim());
        for (dim, _) in target.iter() {
            match self.dims.index_of(dim) {
                Some(pos) => strides.push(self.strides.get(pos)),
                None => strides.push(0),
            }
        }
        let mut out = self.clone();
        out.dims = target.clone();
        out.strides = Strides::from_vec(strides);
        Ok(out)
    }

    /// Renames a dimension label in place.
    pub fn rename_dim(&mut self, from: Dim, to: Dim) -> Result<()> {
        self.dims.rename(from, to)
    }

    /// A deep copy with a private, contiguous buffer.
    pub fn copy(&self) -> Result<Variable> {
        fn copy_dense<T: Element>(var: &Variable) -> Result<Variable> {
            let values = var.values::<T>()?.to_vec();
            let variances = if var.has_variances() {
                Some(var.variances::<T>()?.to_vec())
            } else {
                None
            };
            Ok(Variable::from_data(
                var.dims.clone(),
                var.unit,
                Arc::new(DenseData { values, variances }),
            ))
        }
        dispatch_element!(
            self.dtype(),
            copy_dense(self),
            crate::binned::copy_binned(self)
        )
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("dims", &self.dims)
            .field("dtype", &self.dtype())
            .field("unit", &self.unit)
            .field("variances", &self.has_variances())
            .finish()
    }
}

fn expect_buffer_len(dims: &Dimensions, len: usize) -> Result<()> {
    if len as Index != dims.volume() {
        return Err(Error::Dimension(format!(
            "Expected {} elements for {dims}, got {len}.",
            dims.volume()
        )));
    }
    Ok(())
}

fn expect_variance_capable<T: Element>() -> Result<()> {
    if !T::VARIANCES {
        return Err(Error::Variances(format!(
            "Variances are not supported for dtype {}.",
            T::DTYPE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(pairs: &[(Dim, Index)]) -> Dimensions {
        Dimensions::from_pairs(pairs).unwrap()
    }

    fn xy() -> Variable {
        Variable::new::<f64>(
            dims(&[(Dim::Y, 2), (Dim::X, 3)]),
            Unit::M,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap()
    }

    #[test]
    fn construction_checks_buffer_length() {
        let d = dims(&[(Dim::X, 3)]);
        assert!(Variable::new::<f64>(d.clone(), Unit::M, vec![1.0]).is_err());
        let var = Variable::new::<f64>(d, Unit::M, vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(var.size(), 3);
        assert_eq!(var.dtype(), DType::Float64);
        assert!(!var.has_variances());
    }

    #[test]
    fn variances_require_float_dtype() {
        let d = dims(&[(Dim::X, 2)]);
        assert!(Variable::with_variances::<i64>(d.clone(), Unit::M, vec![1, 2], vec![3, 4])
            .is_err());
        let var =
            Variable::with_variances::<f64>(d, Unit::M, vec![1.0, 2.0], vec![3.0, 4.0]).unwrap();
        assert!(var.has_variances());
        assert_eq!(var.variances::<f64>().unwrap().to_vec(), vec![3.0, 4.0]);
    }

    #[test]
    fn typed_access_checks_the_dtype() {
        let var = xy();
        assert!(var.values::<f64>().is_ok());
        assert!(matches!(
            var.values::<i64>(),
            Err(Error::TypeMismatch {
                expected: DType::Int64,
                actual: DType::Float64,
            })
        ));
        assert!(matches!(var.variances::<f64>(), Err(Error::Variances(_))));
    }

    #[test]
    fn single_index_slice_removes_the_dim() {
        let var = xy();
        let row = var.slice(Dim::Y, 1).unwrap();
        assert_eq!(row.dims(), &dims(&[(Dim::X, 3)]));
        assert_eq!(row.values::<f64>().unwrap().to_vec(), vec![4.0, 5.0, 6.0]);
        let element = row.slice(Dim::X, 2).unwrap();
        assert_eq!(element.value::<f64>().unwrap(), 6.0);
    }

    #[test]
    fn range_slice_keeps_the_dim_and_composes() {
        let var = xy();
        let inner = var.slice_range(Dim::X, 1, 3).unwrap();
        assert_eq!(inner.values::<f64>().unwrap().to_vec(), vec![2.0, 3.0, 5.0, 6.0]);
        // slice-then-slice equals the composed slice
        let composed = inner.slice_range(Dim::X, 1, 2).unwrap();
        let direct = var.slice_range(Dim::X, 2, 3).unwrap();
        assert_eq!(
            composed.values::<f64>().unwrap().to_vec(),
            direct.values::<f64>().unwrap().to_vec()
        );
    }

    #[test]
    fn out_of_range_slice_is_rejected() {
        let var = xy();
        assert!(matches!(
            var.slice(Dim::X, 3),
            Err(Error::Slice { dim: Dim::X, .. })
        ));
        assert!(var.slice_range(Dim::Y, 1, 3).is_err());
        assert!(var.slice(Dim::Z, 0).is_err());
    }

    #[test]
    fn slices_share_the_buffer_until_mutation() {
        let var = xy();
        let slice = var.slice(Dim::Y, 0).unwrap();
        assert!(Variable::same_buffer(&var, &slice));

        let mut copy = slice.clone();
        copy.values_mut::<f64>().unwrap().for_each(|v| *v += 1.0);
        assert!(!Variable::same_buffer(&var, &copy));
        // The original is untouched.
        assert_eq!(slice.values::<f64>().unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(copy.values::<f64>().unwrap().to_vec(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn transpose_shares_and_reorders() {
        let var = xy();
        let t = var.transpose(&[]).unwrap();
        assert_eq!(t.dims(), &dims(&[(Dim::X, 3), (Dim::Y, 2)]));
        assert_eq!(
            t.values::<f64>().unwrap().to_vec(),
            vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
        );
        assert!(Variable::same_buffer(&var, &t));
    }

    #[test]
    fn broadcast_repeats_along_new_dims() {
        let var = Variable::new::<f64>(dims(&[(Dim::Z, 2)]), Unit::M, vec![1.0, 2.0]).unwrap();
        let target = dims(&[(Dim::Z, 2), (Dim::X, 3)]);
        let mut b = var.broadcast_to(&target).unwrap();
        assert_eq!(
            b.values::<f64>().unwrap().to_vec(),
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
        );
        // Writing through a broadcast view is rejected.
        assert!(b.values_mut::<f64>().is_err());
    }

    #[test]
    fn copy_materializes_a_contiguous_buffer() {
        let var = xy();
        let slice = var.slice_range(Dim::X, 1, 3).unwrap();
        let copy = slice.copy().unwrap();
        assert!(!Variable::same_buffer(&slice, &copy));
        assert!(copy.values::<f64>().unwrap().as_slice().is_some());
        assert_eq!(
            copy.values::<f64>().unwrap().to_vec(),
            slice.values::<f64>().unwrap().to_vec()
        );
    }

    #[test]
    fn set_variances_validates_the_source() {
        let mut var = xy();
        let good = Variable::new::<f64>(
            dims(&[(Dim::Y, 2), (Dim::X, 3)]),
            Unit::M,
            vec![0.1; 6],
        )
        .unwrap();
        var.set_variances(Some(&good)).unwrap();
        assert!(var.has_variances());

        let mut with_vars = good.clone();
        with_vars.set_variances(Some(&good)).unwrap();
        assert!(matches!(
            var.set_variances(Some(&with_vars)),
            Err(Error::Variances(_))
        ));

        var.set_variances(None).unwrap();
        assert!(!var.has_variances());
    }
}
