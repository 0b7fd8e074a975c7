//! Disposal capability for tracked instances.

use crate::DisposeError;

/// Capability for instances that hold resources needing explicit release.
///
/// Instances opt in by being wrapped with
/// [`Instance::disposable`](crate::Instance::disposable). Instances wrapped with
/// [`Instance::new`](crate::Instance::new) have nothing to release and the
/// tracker simply skips them at disposal time.
///
/// Returning [`DisposeError::AlreadyDisposed`] is always tolerated by the
/// tracker; any other error is collected and reported once the walk finishes.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{Dispose, DisposeError};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Connection {
///     closed: AtomicBool,
/// }
///
/// impl Dispose for Connection {
///     fn dispose(&self) -> Result<(), DisposeError> {
///         if self.closed.swap(true, Ordering::SeqCst) {
///             return Err(DisposeError::AlreadyDisposed);
///         }
///         Ok(())
///     }
/// }
///
/// let conn = Connection { closed: AtomicBool::new(false) };
/// assert!(conn.dispose().is_ok());
/// assert_eq!(conn.dispose(), Err(DisposeError::AlreadyDisposed));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Release the resources held by this instance.
    fn dispose(&self) -> Result<(), DisposeError>;
}
