//! Value-semantics copies at history boundaries.
//!
//! ## Learning: Clone Is Already Deep
//!
//! For owned data (`Vec`, `String`, plain structs) a derived `Clone`
//! copies everything; there is no shared pointer left behind. Aliasing only
//! creeps in through handle types like `Rc<RefCell<_>>` or `Arc<Mutex<_>>`,
//! and the document model simply does not contain any.
//!
//! What `Clone` cannot tell us is whether the value is *data*: a NaN
//! coordinate clones fine but cannot be serialized or compared. The
//! [`PlainData`] check is where such values fail loudly, before anything is
//! written into history.

use std::fmt;

/// A value that may be stored in history.
///
/// Implementors must own all of their data. Override [`check_plain`] to
/// reject values that are not representable as plain data.
///
/// [`check_plain`]: PlainData::check_plain
pub trait PlainData: Clone {
    /// Verifies that this value is plain data.
    fn check_plain(&self) -> Result<(), CloneError> {
        Ok(())
    }
}

impl<T: PlainData> PlainData for Vec<T> {
    fn check_plain(&self) -> Result<(), CloneError> {
        self.iter().try_for_each(PlainData::check_plain)
    }
}

impl<T: PlainData> PlainData for Option<T> {
    fn check_plain(&self) -> Result<(), CloneError> {
        match self {
            Some(value) => value.check_plain(),
            None => Ok(()),
        }
    }
}

/// Copies `value` after checking that it is plain data.
///
/// The copy shares nothing with `value`, so mutating either one afterwards
/// is invisible to the other.
pub fn deep_clone<T: PlainData>(value: &T) -> Result<T, CloneError> {
    value.check_plain()?;
    Ok(value.clone())
}

/// A value could not be copied into history.
///
/// This is a modeling bug upstream, not a user error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{path}: {reason}")]
pub struct CloneError {
    /// Where in the value the problem was found
    pub path: String,
    /// What is wrong with it
    pub reason: String,
}

impl CloneError {
    /// Creates a clone error.
    pub fn new(path: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Checks that a float is finite, naming it `path` otherwise.
    pub fn check_finite(path: impl fmt::Display, value: f64) -> Result<(), Self> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(Self::new(path, format!("{value} is not a finite number")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: f64,
    }

    impl PlainData for Point {
        fn check_plain(&self) -> Result<(), CloneError> {
            CloneError::check_finite("point.x", self.x)
        }
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let original = vec![Point { x: 1.0 }, Point { x: 2.0 }];
        let mut copy = deep_clone(&original).unwrap();
        copy[0].x = 99.0;

        assert_eq!(original[0].x, 1.0);
        assert_eq!(copy.len(), 2);
    }

    #[test]
    fn test_non_finite_fails_loudly() {
        let err = deep_clone(&vec![Point { x: 0.0 }, Point { x: f64::NAN }]).unwrap_err();
        assert_eq!(err.path, "point.x");
        assert!(err.to_string().contains("not a finite number"));
    }

    #[test]
    fn test_option_delegates() {
        assert!(deep_clone(&None::<Point>).is_ok());
        assert!(deep_clone(&Some(Point { x: f64::INFINITY })).is_err());
    }
}
