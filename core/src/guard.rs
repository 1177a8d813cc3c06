use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    error::{Error, Result},
    state::{NativeFunction, State},
};

/// Run a native-call boundary so that nothing escapes it except an `Error`.
///
/// Typed errors pass through untouched, including ones carried by a panic;
/// any other panic becomes `Error::Internal` carrying the panic message.
pub fn protect<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            if let Some(err) = payload.downcast_ref::<Error>() {
                return Err(err.clone());
            }
            let message = panic_message(payload.as_ref());
            tracing::warn!(%message, "normalized panic at native boundary");
            Err(Error::Internal(format!("panic: {}", message)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Wrap a handler as a VM native function running under [`protect`].
pub fn boundary(handler: fn(&mut dyn State) -> Result<usize>) -> NativeFunction {
    Arc::new(move |state: &mut dyn State| protect(|| handler(state)))
}

/// Like [`boundary`] for closures that capture state.
pub fn boundary_with(
    handler: impl Fn(&mut dyn State) -> Result<usize> + Send + Sync + 'static,
) -> NativeFunction {
    Arc::new(move |state: &mut dyn State| protect(|| handler(state)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_typed_errors_through() {
        let result: Result<()> = protect(|| Err(Error::FieldNotFound("x".into())));
        assert_eq!(result, Err(Error::FieldNotFound("x".into())));
    }

    #[test]
    fn converts_str_panic() {
        let result: Result<()> = protect(|| panic!("boom"));
        assert_eq!(result, Err(Error::Internal("panic: boom".into())));
    }

    #[test]
    fn converts_formatted_panic() {
        let result: Result<()> = protect(|| panic!("index {} out of range", 3));
        assert_eq!(result, Err(Error::Internal("panic: index 3 out of range".into())));
    }

    #[test]
    fn keeps_typed_panic_payload() {
        let result: Result<()> = protect(|| std::panic::panic_any(Error::StackOverflow));
        assert_eq!(result, Err(Error::StackOverflow));
    }

    #[test]
    fn returns_ok_values() {
        assert_eq!(protect(|| Ok(7)), Ok(7));
    }
}
