// Scoped acquisition of native handles
//
// Renderer construction creates several objects in sequence. If a later step
// fails, the objects built so far must still be released in reverse order.
// A `Guard` owns a freshly created handle and runs its release function when
// dropped, unless ownership is handed on with `into_inner`.

use std::ops::{Deref, DerefMut};

pub struct Guard<T, F: FnOnce(T)> {
    value: Option<T>,
    release: Option<F>,
}

impl<T, F: FnOnce(T)> Guard<T, F> {
    pub fn new(value: T, release: F) -> Self {
        Self {
            value: Some(value),
            release: Some(release),
        }
    }

    /// Disarm the guard and take the value
    pub fn into_inner(mut self) -> T {
        self.release = None;
        // Only `Drop` ever empties `value`, so it is still present here
        match self.value.take() {
            Some(value) => value,
            None => unreachable!("guard value taken twice"),
        }
    }
}

impl<T, F: FnOnce(T)> Deref for Guard<T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("guard value accessed after release"),
        }
    }
}

impl<T, F: FnOnce(T)> DerefMut for Guard<T, F> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("guard value accessed after release"),
        }
    }
}

impl<T, F: FnOnce(T)> Drop for Guard<T, F> {
    fn drop(&mut self) {
        if let (Some(value), Some(release)) = (self.value.take(), self.release.take()) {
            release(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn releases_on_early_exit() {
        let released = RefCell::new(Vec::new());

        let build = || -> Result<u32, &'static str> {
            let _instance = Guard::new("instance", |v| released.borrow_mut().push(v));
            let _surface = Guard::new("surface", |v| released.borrow_mut().push(v));
            Err("device creation failed")
        };

        assert!(build().is_err());
        // Reverse creation order
        assert_eq!(*released.borrow(), vec!["surface", "instance"]);
    }

    #[test]
    fn into_inner_disarms() {
        let released = RefCell::new(0);
        let guard = Guard::new(5u32, |_| *released.borrow_mut() += 1);
        assert_eq!(*guard, 5);
        assert_eq!(guard.into_inner(), 5);
        assert_eq!(*released.borrow(), 0);
    }

    #[test]
    fn deref_mut_reaches_value() {
        let mut guard = Guard::new(vec![1], |_| {});
        guard.push(2);
        assert_eq!(guard.into_inner(), vec![1, 2]);
    }
}
