//! # ferrous-lifetimes
//!
//! Build-tree ownership tracking for dependency injection containers.
//!
//! When a container builds an object graph, [`BuildTracker`] records which build
//! produced which instance. When the root is released it disposes exactly the
//! instances the container created:
//!
//! - instances supplied from outside are never disposed,
//! - instances promoted to a longer-lived owner are left to that owner,
//! - bookkeeping never keeps an instance alive.
//!
//! ## Features
//!
//! - **Non-owning bookkeeping**: nodes hold `Weak` references; parent links are
//!   generation-checked arena handles
//! - **Rollback**: every pre-build registers a [`FailureRecovery`] so failed
//!   builds leave no partial tree behind
//! - **Promotion aware**: a [`LifetimeRegistry`] decides which subtrees belong
//!   to longer-lived owners
//! - **Thread-safe**: independent builds only meet at the [`NodeStore`], which
//!   never runs user code under its lock
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_lifetimes::*;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! struct Pool { closed: AtomicBool }
//!
//! impl Dispose for Pool {
//!     fn dispose(&self) -> Result<(), DisposeError> {
//!         self.closed.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! let tracker = BuildTracker::new(Arc::new(NodeStore::new()));
//! let mut session = BuildSession::new();
//! let mut recoveries = RecoveryLog::new();
//!
//! // The pipeline reports the build of a Pool.
//! tracker.on_pre_build(&mut session, key_of_type::<Pool>(), &mut recoveries);
//! let pool = Arc::new(Pool { closed: AtomicBool::new(false) });
//! let instance = Instance::disposable(pool.clone());
//! tracker.on_post_build(&mut session, &key_of_type::<Pool>(), &instance, false).unwrap();
//! recoveries.discard();
//!
//! assert_eq!(tracker.live_trees().len(), 1);
//!
//! // Releasing the root disposes what the container created.
//! tracker.on_tear_down(&instance).unwrap();
//! assert!(pool.closed.load(Ordering::SeqCst));
//! assert!(tracker.live_trees().is_empty());
//! ```
//!
//! ## Rollback
//!
//! ```rust
//! use ferrous_lifetimes::*;
//! use std::sync::Arc;
//!
//! struct Handler;
//! struct Client;
//!
//! let tracker = BuildTracker::new(Arc::new(NodeStore::new()));
//! let mut session = BuildSession::new();
//! let mut recoveries = RecoveryLog::new();
//!
//! tracker.on_pre_build(&mut session, key_of_type::<Handler>(), &mut recoveries);
//! let mark = recoveries.mark();
//! tracker.on_pre_build(&mut session, key_of_type::<Client>(), &mut recoveries);
//!
//! // Constructing the client failed; the handler copes without it.
//! recoveries.rollback_to(mark);
//!
//! let handler = Instance::new(Arc::new(Handler));
//! tracker.on_post_build(&mut session, &key_of_type::<Handler>(), &handler, false).unwrap();
//!
//! let trees = tracker.live_trees();
//! assert!(trees[0].root.children.is_empty());
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod instance;
pub mod key;
pub mod lifetime;
pub mod node;
pub mod observer;
pub mod recovery;
pub mod store;
pub mod tracker;
pub mod traits;

// Internal modules
mod internal;
mod tree;

pub use config::{ConfigError, TrackerConfig};
pub use diagnostics::{NodeSnapshot, TreeSnapshot};
pub use error::{DisposalFailure, DisposeError, TrackerError, TrackerResult};
pub use instance::{Instance, InstanceId, WeakInstance};
pub use key::{key_of_type, named_key_of_type, Key};
pub use lifetime::{LifetimeRegistry, NoLifetimeRegistry, PromotedInstances};
pub use node::{BuildNode, NodeId, NodeState};
pub use observer::{LoggingObserver, MetricsObserver, TrackerObserver};
pub use recovery::{FailureRecovery, RecoveryCallback, RecoveryLog};
pub use store::NodeStore;
pub use tracker::{BuildSession, BuildTracker};
pub use traits::{Dispose, Recover, RecoveryStack};
