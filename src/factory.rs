//! The runtime variable factory.
//!
//! Generic code sometimes has to create or inspect variables whose element
//! type it does not know statically, e.g. when the transform engine
//! allocates an output for a dtype that only the caller's crate knows
//! about. The factory is a process-wide registry mapping [`DType`] to a
//! maker. It is populated once with the element types the crate knows;
//! consumers adding element types register additional makers. Lookups for
//! unregistered dtypes surface as type errors.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::dimensions::Dimensions;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::spatial::{
    Affine3, DateTime, IndexPair, Matrix3, Quaternion, Translation, Vector3,
};
use crate::unit::Unit;
use crate::variable::Variable;

/// Creates and inspects variables of one registered dtype.
pub trait VariableMaker: Send + Sync {
    /// Allocates a default-initialized variable.
    fn create(&self, dims: &Dimensions, unit: Unit, variances: bool) -> Result<Variable>;

    /// True for makers of binned dtypes.
    fn is_binned(&self) -> bool {
        false
    }

    /// The element dtype (the buffer's dtype for binned variables).
    fn elem_dtype(&self, var: &Variable) -> DType;

    /// The element unit (the buffer's unit for binned variables).
    fn elem_unit(&self, var: &Variable) -> Unit;

    /// Sets the element unit.
    fn set_elem_unit(&self, var: &mut Variable, unit: Unit);

    /// Whether elements carry variances.
    fn has_variances(&self, var: &Variable) -> bool;

    /// The backing buffer of a binned variable.
    fn buffer(&self, _var: &Variable) -> Option<Variable> {
        None
    }
}

struct DenseMaker<T: Element>(PhantomData<T>);

impl<T: Element> VariableMaker for DenseMaker<T> {
    fn create(&self, dims: &Dimensions, unit: Unit, variances: bool) -> Result<Variable> {
        Variable::default_init::<T>(dims.clone(), unit, variances)
    }

    fn elem_dtype(&self, var: &Variable) -> DType {
        var.dtype()
    }

    fn elem_unit(&self, var: &Variable) -> Unit {
        var.unit()
    }

    fn set_elem_unit(&self, var: &mut Variable, unit: Unit) {
        var.set_unit(unit);
    }

    fn has_variances(&self, var: &Variable) -> bool {
        var.has_variances()
    }
}

struct BinnedMaker;

impl VariableMaker for BinnedMaker {
    fn create(&self, _dims: &Dimensions, _unit: Unit, _variances: bool) -> Result<Variable> {
        // A binned variable cannot be default-created without a buffer.
        Err(Error::TypeUnsupported {
            op: "create",
            dtype: DType::Binned,
        })
    }

    fn is_binned(&self) -> bool {
        true
    }

    fn elem_dtype(&self, var: &Variable) -> DType {
        crate::binned::buffer(var)
            .map(|buffer| buffer.dtype())
            .unwrap_or(DType::Binned)
    }

    fn elem_unit(&self, var: &Variable) -> Unit {
        crate::binned::buffer(var)
            .map(|buffer| buffer.unit())
            .unwrap_or(Unit::DIMENSIONLESS)
    }

    fn set_elem_unit(&self, var: &mut Variable, unit: Unit) {
        crate::binned::set_buffer_unit(var, unit);
    }

    fn has_variances(&self, var: &Variable) -> bool {
        crate::binned::buffer(var)
            .map(|buffer| buffer.has_variances())
            .unwrap_or(false)
    }

    fn buffer(&self, var: &Variable) -> Option<Variable> {
        crate::binned::buffer(var).cloned()
    }
}

type Registry = BTreeMap<DType, Box<dyn VariableMaker>>;

static FACTORY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(default_registry()));

fn default_registry() -> Registry {
    fn dense<T: Element>() -> (DType, Box<dyn VariableMaker>) {
        (T::DTYPE, Box::new(DenseMaker::<T>(PhantomData)))
    }
    let mut makers = Registry::new();
    for (dtype, maker) in [
        dense::<f64>(),
        dense::<f32>(),
        dense::<i64>(),
        dense::<i32>(),
        dense::<bool>(),
        dense::<String>(),
        dense::<Vector3>(),
        dense::<Matrix3>(),
        dense::<Affine3>(),
        dense::<Quaternion>(),
        dense::<Translation>(),
        dense::<DateTime>(),
        dense::<IndexPair>(),
    ] {
        makers.insert(dtype, maker);
    }
    makers.insert(DType::Binned, Box::new(BinnedMaker));
    makers
}

/// Registers (or replaces) the maker for `dtype`.
///
/// Not expected on hot paths; registration is serialized by the registry
/// lock.
pub fn register_maker(dtype: DType, maker: Box<dyn VariableMaker>) {
    let mut registry = FACTORY
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    registry.insert(dtype, maker);
}

/// Looks up the maker for `dtype` and applies `f`.
pub fn with_maker<R>(
    op: &'static str,
    dtype: DType,
    f: impl FnOnce(&dyn VariableMaker) -> R,
) -> Result<R> {
    let registry = FACTORY
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    match registry.get(&dtype) {
        Some(maker) => Ok(f(maker.as_ref())),
        None => Err(Error::TypeUnsupported { op, dtype }),
    }
}

/// Allocates a default-initialized variable of a runtime dtype.
pub fn create_variable(
    dtype: DType,
    dims: &Dimensions,
    unit: Unit,
    variances: bool,
) -> Result<Variable> {
    with_maker("create", dtype, |maker| maker.create(dims, unit, variances))?
}

/// The element dtype, looking through binned variables.
pub fn elem_dtype(var: &Variable) -> Result<DType> {
    with_maker("elem_dtype", var.dtype(), |maker| maker.elem_dtype(var))
}

/// The element unit, looking through binned variables.
pub fn elem_unit(var: &Variable) -> Result<Unit> {
    with_maker("elem_unit", var.dtype(), |maker| maker.elem_unit(var))
}

/// Sets the element unit, looking through binned variables.
pub fn set_elem_unit(var: &mut Variable, unit: Unit) -> Result<()> {
    with_maker("set_elem_unit", var.dtype(), |maker| {
        maker.set_elem_unit(var, unit)
    })
}

/// Whether elements carry variances, looking through binned variables.
pub fn elem_has_variances(var: &Variable) -> Result<bool> {
    with_maker("has_variances", var.dtype(), |maker| {
        maker.has_variances(var)
    })
}
