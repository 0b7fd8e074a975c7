//! Panic-safe invocation of user disposal code.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::traits::Dispose;
use crate::DisposeError;

/// Runs `dispose`, turning a panic into [`DisposeError::Panicked`] so one
/// faulty instance cannot abort the rest of a walk.
pub(crate) fn dispose_guarded(disposer: &dyn Dispose) -> Result<(), DisposeError> {
    match panic::catch_unwind(AssertUnwindSafe(|| disposer.dispose())) {
        Ok(result) => result,
        Err(payload) => Err(DisposeError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
