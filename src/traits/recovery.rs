//! Rollback hooks shared with the construction pipeline.

/// A rollback action run when a construction attempt aborts.
///
/// Implementations must tolerate being invoked more than once; only the first
/// call has an effect.
pub trait Recover: Send + 'static {
    /// Undo the effects this action guards.
    fn recover(&self);
}

/// Per-attempt rollback mechanism owned by the construction pipeline.
///
/// The pipeline runs registered actions in reverse registration order when an
/// attempt fails and discards them when it succeeds. [`RecoveryLog`](crate::RecoveryLog)
/// is a ready-made implementation.
pub trait RecoveryStack {
    /// Register an action for the current attempt.
    fn add_recovery(&mut self, recovery: Box<dyn Recover>);
}
