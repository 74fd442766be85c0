//! The "don't care" sentinel.
//!
//! A command-line parser reports a default for every argument the user did
//! not type. Handing those defaults to the overlay engine would clobber
//! values that lower-priority sources (files, environment) already set. The
//! command-line source therefore wraps echoed defaults in [`DontCare`]; the
//! overlay engine skips a sentinel that was never touched and honors one that
//! was.
//!
//! Any access through [`Deref`], [`DerefMut`] or iteration marks the sentinel
//! touched. [`DontCare::as_bare_value`] reads the value without touching it.

use std::cell::Cell;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A value that is ignored by the overlay unless something used it.
pub struct DontCare<T> {
    value: T,
    touched: Cell<bool>,
}

impl<T> DontCare<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            touched: Cell::new(false),
        }
    }

    /// Wrap a value that should count as supplied from the start.
    pub fn touched(value: T) -> Self {
        let sentinel = Self::new(value);
        sentinel.touch();
        sentinel
    }

    /// The wrapped value. Does not mark the sentinel touched.
    pub fn as_bare_value(&self) -> &T {
        &self.value
    }

    pub fn into_bare_value(self) -> T {
        self.value
    }

    /// `true` while nothing has accessed the wrapped value.
    pub fn dont_care(&self) -> bool {
        !self.touched.get()
    }

    pub fn touch(&self) {
        self.touched.set(true);
    }
}

impl<T> Deref for DontCare<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.touch();
        &self.value
    }
}

impl<T> DerefMut for DontCare<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.touch();
        &mut self.value
    }
}

impl<'a, T> IntoIterator for &'a DontCare<T>
where
    &'a T: IntoIterator,
{
    type Item = <&'a T as IntoIterator>::Item;
    type IntoIter = <&'a T as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.touch();
        (&self.value).into_iter()
    }
}

impl<T: Clone> Clone for DontCare<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            touched: Cell::new(self.touched.get()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DontCare<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DontCare")
            .field("value", &self.value)
            .field("dont_care", &self.dont_care())
            .finish()
    }
}

/// Sentinels compare by wrapped value only.
impl<T: PartialEq> PartialEq for DontCare<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn fresh_sentinel_is_dont_care() {
        let d = DontCare::new(17);
        assert!(d.dont_care());
        assert_eq!(*d.as_bare_value(), 17);
        assert!(d.dont_care());
    }

    #[test]
    fn reading_through_deref_touches() {
        let d = DontCare::new(String::from("fred"));
        assert_eq!(d.len(), 4);
        assert!(!d.dont_care());
    }

    #[test]
    fn mutation_touches() {
        let mut d = DontCare::new(vec![1, 2]);
        assert!(d.dont_care());
        d.push(3);
        assert!(!d.dont_care());
        assert_eq!(d.into_bare_value(), vec![1, 2, 3]);
    }

    #[test]
    fn iteration_touches() {
        let d = DontCare::new(vec!["a", "b"]);
        let collected: Vec<_> = (&d).into_iter().collect();
        assert_eq!(collected, vec![&"a", &"b"]);
        assert!(!d.dont_care());
    }

    #[test]
    fn wraps_values_of_any_kind() {
        let list = DontCare::new(Value::from(vec!["x"]));
        let nothing = DontCare::new(Value::Null);
        assert!(list.dont_care());
        assert!(nothing.dont_care());
        assert!(nothing.as_bare_value().is_null());
    }

    #[test]
    fn clone_keeps_touched_state() {
        let d = DontCare::touched(1);
        assert!(!d.clone().dont_care());
        assert!(DontCare::new(1).clone().dont_care());
    }
}
