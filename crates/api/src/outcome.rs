//! Synchronous counterpart of [AsyncResult](crate::AsyncResult).
//!
//! A synchronous computation that may fail is represented by a plain
//! [VendResult]. The standard library already provides `map`, `and_then`
//! and friends; this module adds the few combinators that are missing.

use crate::*;

/// Extra combinators for [VendResult].
pub trait OutcomeExt<T> {
    /// Combine two outcomes. If either failed the first failure is
    /// returned and `f` is not invoked.
    fn combine<U, V>(
        self,
        other: VendResult<U>,
        f: impl FnOnce(T, U) -> V,
    ) -> VendResult<V>;

    /// Fold the outcome into a single value.
    fn match_with<U>(
        self,
        on_value: impl FnOnce(T) -> U,
        on_error: impl FnOnce(VendError) -> U,
    ) -> U;
}

impl<T> OutcomeExt<T> for VendResult<T> {
    fn combine<U, V>(
        self,
        other: VendResult<U>,
        f: impl FnOnce(T, U) -> V,
    ) -> VendResult<V> {
        Ok(f(self?, other?))
    }

    fn match_with<U>(
        self,
        on_value: impl FnOnce(T) -> U,
        on_error: impl FnOnce(VendError) -> U,
    ) -> U {
        match self {
            Ok(v) => on_value(v),
            Err(e) => on_error(e),
        }
    }
}

/// Run `f`, turning a panic into a failure.
pub fn catch<T>(f: impl FnOnce() -> VendResult<T>) -> VendResult<T> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(panic_error(payload)))
}

pub(crate) fn panic_error(payload: Box<dyn std::any::Any + Send>) -> VendError {
    let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    VendError::other(format!("panicked: {msg}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn combine_takes_first_failure() {
        let a: VendResult<u32> = Ok(2);
        let b: VendResult<u32> = Ok(3);
        assert_eq!(6, a.combine(b, |a, b| a * b).unwrap());

        let a: VendResult<u32> = Err(VendError::other("a"));
        let b: VendResult<u32> = Err(VendError::other("b"));
        let err = a.combine(b, |a, b| a + b).unwrap_err();
        assert_eq!("a (src: None)", err.to_string());
    }

    #[test]
    fn match_with_folds_both_arms() {
        let ok: VendResult<u32> = Ok(1);
        assert_eq!("1", ok.match_with(|v| v.to_string(), |e| e.to_string()));

        let err: VendResult<u32> = Err(VendError::Cancelled);
        assert_eq!(
            "cancelled",
            err.match_with(|v| v.to_string(), |e| e.to_string())
        );
    }

    #[test]
    fn catch_converts_panics() {
        let err = catch::<()>(|| panic!("boom")).unwrap_err();
        assert_eq!("panicked: boom (src: None)", err.to_string());

        assert_eq!(3, catch(|| Ok(3)).unwrap());
    }
}
