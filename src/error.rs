//! Error types for the build tracker.

use std::fmt;

use crate::Key;

/// Errors raised by the tracker while following the construction protocol
/// or while disposing tracked instances.
///
/// `AlreadyAssigned` and `BuildSequenceViolation` indicate that the driving
/// pipeline broke the protocol; they are never retried. Disposal failures are
/// collected per node so one faulty instance does not prevent its siblings from
/// being disposed.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetimes::{key_of_type, TrackerError};
///
/// let err = TrackerError::BuildSequenceViolation {
///     expected: Some(key_of_type::<u32>()),
///     actual: key_of_type::<String>(),
/// };
/// assert!(err.to_string().contains("u32"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A node's instance slot was written twice.
    #[error("instance already assigned for {key}")]
    AlreadyAssigned { key: Key },

    /// A post-build notification did not match the most recent unmatched pre-build.
    #[error("build sequence violation: expected {}, got {actual}", DisplayExpected(.expected))]
    BuildSequenceViolation { expected: Option<Key>, actual: Key },

    /// Exactly one tracked instance failed to dispose.
    #[error("failed to dispose {key}: {source}")]
    Dispose {
        key: Key,
        #[source]
        source: DisposeError,
    },

    /// Several tracked instances failed to dispose during one walk.
    #[error("{} instances failed to dispose", failure_count(.0))]
    Aggregate(Vec<DisposalFailure>),
}

impl TrackerError {
    /// Builds the error reported at the end of a disposal walk, if any.
    pub(crate) fn from_failures(mut failures: Vec<DisposalFailure>) -> TrackerResult<()> {
        match failures.len() {
            0 => Ok(()),
            1 => {
                let DisposalFailure { key, error } = failures.remove(0);
                Err(TrackerError::Dispose { key, source: error })
            }
            _ => Err(TrackerError::Aggregate(failures)),
        }
    }

    /// Every disposal failure carried by this error.
    pub fn disposal_failures(&self) -> Vec<(&Key, &DisposeError)> {
        match self {
            TrackerError::Dispose { key, source } => vec![(key, source)],
            TrackerError::Aggregate(failures) => {
                failures.iter().map(|f| (&f.key, &f.error)).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn failure_count(failures: &[DisposalFailure]) -> usize {
    failures.len()
}

struct DisplayExpected<'a>(&'a Option<Key>);

impl fmt::Display for DisplayExpected<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(key) => write!(f, "{}", key),
            None => f.write_str("no build in progress"),
        }
    }
}

/// Failure reported by a tracked instance's [`Dispose`](crate::Dispose) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisposeError {
    /// The instance had already released its resources. Always tolerated.
    #[error("already disposed")]
    AlreadyDisposed,
    /// The instance could not release its resources.
    #[error("{0}")]
    Failed(String),
    /// `dispose` panicked; the payload message is kept when it was a string.
    #[error("dispose panicked: {0}")]
    Panicked(String),
}

impl DisposeError {
    /// Convenience constructor for [`DisposeError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        DisposeError::Failed(message.into())
    }
}

/// One node's disposal failure inside an aggregate.
#[derive(Debug, Clone)]
pub struct DisposalFailure {
    /// Request key of the node whose instance failed.
    pub key: Key,
    /// What the instance reported.
    pub error: DisposeError,
}

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;
