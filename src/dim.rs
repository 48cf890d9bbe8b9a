//! Dimension labels.
//!
//! A [`Dim`] names an axis of a [`Dimensions`](crate::Dimensions) value. It
//! is a cheap `Copy` handle to an interned string, so label comparison is a
//! pointer-sized integer comparison and labels can be used as map keys.

use std::collections::BTreeSet;
use std::sync::Mutex;

use once_cell::sync::Lazy;

static INTERNED: Lazy<Mutex<BTreeSet<&'static str>>> = Lazy::new(|| Mutex::new(BTreeSet::new()));

/// A dimension label (axis name).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Dim(&'static str);

impl Dim {
    pub const X: Dim = Dim("x");
    pub const Y: Dim = Dim("y");
    pub const Z: Dim = Dim("z");
    pub const TIME: Dim = Dim("time");
    pub const EVENT: Dim = Dim("event");
    pub const ROW: Dim = Dim("row");

    /// Returns the label for `name`, interning it on first use.
    pub fn new(name: &str) -> Dim {
        let mut set = INTERNED
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(&interned) = set.get(name) {
            return Dim(interned);
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        set.insert(leaked);
        Dim(leaked)
    }

    /// The label text.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_compare_by_label() {
        assert_eq!(Dim::X, Dim::new("x"));
        assert_ne!(Dim::X, Dim::Y);
    }

    #[test]
    fn interning_is_stable() {
        let a = Dim::new("wavelength");
        let b = Dim::new("wavelength");
        assert_eq!(a, b);
        assert_eq!(a.name(), "wavelength");
    }

    #[test]
    fn display_prints_the_label() {
        assert_eq!(Dim::TIME.to_string(), "time");
    }
}
