//! Value semantics for reactive state.
//!
//! Writes to a ref are suppressed when the new value is the *same value* as
//! the old one. "Same" follows `Object.is`: numbers compare numerically
//! except that NaN equals NaN and `+0.0` differs from `-0.0`; objects compare
//! by identity; everything else compares with `PartialEq`.

use std::collections::HashSet;
use std::rc::Rc;

use super::subscriber::SourceId;

/// A type that can live inside a [`Ref`](super::Ref) or be produced by a
/// [`Computed`](super::Computed).
pub trait RefValue: Clone + 'static {
    /// Whether `self` and `other` are the same value (no change).
    fn same_value(&self, other: &Self) -> bool;

    /// The form exposed to readers. Objects become reactive wrappers.
    fn to_reactive(&self) -> Self {
        self.clone()
    }

    /// The form stored and compared. Reactive wrappers become raw objects.
    fn to_raw(&self) -> Self {
        self.clone()
    }

    /// Read every nested reactive property so the running effect tracks it.
    ///
    /// `seen` holds the objects already visited, which keeps cyclic
    /// structures from recursing forever.
    fn traverse(&self, _seen: &mut HashSet<SourceId>) {}
}

/// `Object.is` for `f64`.
pub fn same_f64(a: f64, b: f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

/// `Object.is` for `f32`.
pub fn same_f32(a: f32, b: f32) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

/// Whether a write of `new` over `old` counts as a change.
pub fn has_changed<T: RefValue>(new: &T, old: &T) -> bool {
    !new.same_value(old)
}

macro_rules! impl_ref_value_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RefValue for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_ref_value_eq!(
    (), bool, char,
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    String, Rc<str>, &'static str,
);

impl RefValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        same_f64(*self, *other)
    }
}

impl RefValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        same_f32(*self, *other)
    }
}

impl<T: RefValue> RefValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_value(b),
            _ => false,
        }
    }

    fn to_reactive(&self) -> Self {
        self.as_ref().map(RefValue::to_reactive)
    }

    fn to_raw(&self) -> Self {
        self.as_ref().map(RefValue::to_raw)
    }

    fn traverse(&self, seen: &mut HashSet<SourceId>) {
        if let Some(value) = self {
            value.traverse(seen);
        }
    }
}

impl<T: RefValue> RefValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }

    fn to_reactive(&self) -> Self {
        self.iter().map(RefValue::to_reactive).collect()
    }

    fn to_raw(&self) -> Self {
        self.iter().map(RefValue::to_raw).collect()
    }

    fn traverse(&self, seen: &mut HashSet<SourceId>) {
        for value in self {
            value.traverse(seen);
        }
    }
}
