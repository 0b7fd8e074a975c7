//! Capability traits and collaborator seams.

mod dispose;
mod recovery;

pub use dispose::Dispose;
pub use recovery::{Recover, RecoveryStack};
