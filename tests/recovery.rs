use ferrous_lifetimes::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Socket {
    disposals: AtomicU32,
}

impl Dispose for Socket {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Service;
struct Dependency;
struct Flaky;

/// Stack that keeps every recovery so a test can fire exactly one of them.
#[derive(Default)]
struct Recorded {
    actions: Vec<Box<dyn Recover>>,
}

impl RecoveryStack for Recorded {
    fn add_recovery(&mut self, recovery: Box<dyn Recover>) {
        self.actions.push(recovery);
    }
}

#[test]
fn failed_child_is_pruned_from_its_parent() {
    let tracker = BuildTracker::new(Arc::new(NodeStore::new()));
    let mut session = BuildSession::new();
    let mut recoveries = Recorded::default();

    let service = Instance::new(Arc::new(Service));
    let dependency = Instance::new(Arc::new(Dependency));
    let flaky_socket = Arc::new(Socket::default());
    let flaky = Instance::disposable(flaky_socket.clone());

    tracker.on_pre_build(&mut session, key_of_type::<Service>(), &mut recoveries);
    tracker.on_pre_build(&mut session, key_of_type::<Dependency>(), &mut recoveries);
    tracker.on_post_build(&mut session, &key_of_type::<Dependency>(), &dependency, false).unwrap();
    tracker.on_pre_build(&mut session, key_of_type::<Flaky>(), &mut recoveries);
    tracker.on_post_build(&mut session, &key_of_type::<Flaky>(), &flaky, false).unwrap();

    // Something after Flaky was built failed; only Flaky's recovery fires.
    recoveries.actions[2].recover();
    recoveries.actions[2].recover();

    tracker.on_post_build(&mut session, &key_of_type::<Service>(), &service, false).unwrap();

    let trees = tracker.live_trees();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].root.child_keys(), vec![&key_of_type::<Dependency>()]);
    assert_eq!(flaky_socket.disposals.load(Ordering::SeqCst), 1);

    // Later tear-down does not dispose the rolled back instance again.
    tracker.on_tear_down(&service).unwrap();
    assert_eq!(flaky_socket.disposals.load(Ordering::SeqCst), 1);
}

#[test]
fn provisional_failure_unwinds_the_chain() {
    let tracker = BuildTracker::new(Arc::new(NodeStore::new()));
    let mut session = BuildSession::new();
    let mut recoveries = RecoveryLog::new();

    let service = Instance::new(Arc::new(Service));
    let dependency = Instance::new(Arc::new(Dependency));

    tracker.on_pre_build(&mut session, key_of_type::<Service>(), &mut recoveries);
    tracker.on_pre_build(&mut session, key_of_type::<Dependency>(), &mut recoveries);
    tracker.on_post_build(&mut session, &key_of_type::<Dependency>(), &dependency, false).unwrap();
    let mark = recoveries.mark();
    tracker.on_pre_build(&mut session, key_of_type::<Flaky>(), &mut recoveries);

    // Flaky's constructor failed before producing anything.
    assert_eq!(recoveries.rollback_to(mark), 1);

    tracker.on_post_build(&mut session, &key_of_type::<Service>(), &service, false).unwrap();
    recoveries.discard();

    let trees = tracker.live_trees();
    assert_eq!(trees[0].node_count(), 2);
    assert_eq!(trees[0].root.child_keys(), vec![&key_of_type::<Dependency>()]);
}

#[test]
fn whole_attempt_failure_leaves_nothing_behind() {
    let store = Arc::new(NodeStore::new());
    let metrics = Arc::new(MetricsObserver::new());
    let tracker = BuildTracker::new(store.clone()).with_observer(metrics.clone());
    let mut session = BuildSession::new();
    let mut recoveries = RecoveryLog::new();

    let socket = Arc::new(Socket::default());
    let dependency = Instance::disposable(socket.clone());

    tracker.on_pre_build(&mut session, key_of_type::<Service>(), &mut recoveries);
    tracker.on_pre_build(&mut session, key_of_type::<Socket>(), &mut recoveries);
    tracker.on_post_build(&mut session, &key_of_type::<Socket>(), &dependency, false).unwrap();
    tracker.on_pre_build(&mut session, key_of_type::<Flaky>(), &mut recoveries);

    assert_eq!(recoveries.run_all_reverse(), 3);

    assert!(!session.is_building());
    assert!(store.is_empty());
    assert_eq!(socket.disposals.load(Ordering::SeqCst), 1);
    // Innermost first, so each node still exists when its own action runs.
    assert_eq!(metrics.rolled_back_count(), 3);

    // A fresh attempt on the same session starts a new tree.
    let service = Instance::new(Arc::new(Service));
    tracker.on_pre_build(&mut session, key_of_type::<Service>(), &mut recoveries);
    tracker.on_post_build(&mut session, &key_of_type::<Service>(), &service, false).unwrap();
    assert_eq!(tracker.live_trees()[0].node_count(), 1);
}

#[test]
fn recovering_a_completed_root_removes_it_from_the_store() {
    let store = Arc::new(NodeStore::new());
    let tracker = BuildTracker::new(store.clone());
    let mut session = BuildSession::new();
    let mut recoveries = RecoveryLog::new();

    let socket = Arc::new(Socket::default());
    let root = Instance::disposable(socket.clone());
    tracker.on_pre_build(&mut session, key_of_type::<Socket>(), &mut recoveries);
    tracker.on_post_build(&mut session, &key_of_type::<Socket>(), &root, false).unwrap();
    assert_eq!(store.len(), 1);

    // A step of the same attempt after the build failed.
    recoveries.run_all_reverse();

    assert!(store.is_empty());
    assert_eq!(socket.disposals.load(Ordering::SeqCst), 1);
    tracker.on_tear_down(&root).unwrap();
    assert_eq!(socket.disposals.load(Ordering::SeqCst), 1);
}

#[test]
fn existing_instances_are_not_disposed_on_rollback() {
    let tracker = BuildTracker::new(Arc::new(NodeStore::new()));
    let mut session = BuildSession::new();
    let mut recoveries = RecoveryLog::new();

    let shared = Arc::new(Socket::default());
    let existing = Instance::disposable(shared.clone());
    tracker.on_pre_build(&mut session, key_of_type::<Service>(), &mut recoveries);
    tracker.on_pre_build(&mut session, key_of_type::<Socket>(), &mut recoveries);
    tracker.on_post_build(&mut session, &key_of_type::<Socket>(), &existing, true).unwrap();

    recoveries.run_all_reverse();
    assert_eq!(shared.disposals.load(Ordering::SeqCst), 0);
}

#[test]
fn recovery_callback_runs_once_after_detachment() {
    let store = Arc::new(NodeStore::new());
    let tracker = BuildTracker::new(store.clone());
    let mut session = BuildSession::new();
    let mut recoveries = Recorded::default();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    tracker.on_pre_build_with_recovery(
        &mut session,
        key_of_type::<Flaky>(),
        &mut recoveries,
        move |key| seen_clone.lock().unwrap().push(key.clone()),
    );

    let action = recoveries.actions.pop().unwrap();
    action.recover();
    action.recover();

    assert_eq!(*seen.lock().unwrap(), vec![key_of_type::<Flaky>()]);
    assert!(!session.is_building());
}

#[test]
fn recovery_swallows_disposal_failures() {
    struct Broken;
    impl Dispose for Broken {
        fn dispose(&self) -> Result<(), DisposeError> {
            Err(DisposeError::failed("cannot flush"))
        }
    }

    let metrics = Arc::new(MetricsObserver::new());
    let tracker = BuildTracker::new(Arc::new(NodeStore::new())).with_observer(metrics.clone());
    let mut session = BuildSession::new();
    let mut recoveries = RecoveryLog::new();

    let broken = Instance::disposable(Arc::new(Broken));
    tracker.on_pre_build(&mut session, key_of_type::<Service>(), &mut recoveries);
    tracker.on_pre_build(&mut session, key_of_type::<Broken>(), &mut recoveries);
    tracker.on_post_build(&mut session, &key_of_type::<Broken>(), &broken, false).unwrap();

    assert_eq!(recoveries.run_all_reverse(), 2);
    assert_eq!(metrics.failure_count(), 1);
    assert!(!session.is_building());
}

#[test]
fn late_rollback_after_tear_down_disposes_nothing() {
    let tracker = BuildTracker::new(Arc::new(NodeStore::new()));
    let mut session = BuildSession::new();
    let mut recoveries = RecoveryLog::new();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let socket = Arc::new(Socket::default());
    let instance = Instance::disposable(socket.clone());

    tracker.on_pre_build_with_recovery(
        &mut session,
        key_of_type::<Socket>(),
        &mut recoveries,
        move |key| seen_clone.lock().unwrap().push(key.clone()),
    );
    tracker.on_post_build(&mut session, &key_of_type::<Socket>(), &instance, false).unwrap();

    tracker.on_tear_down(&instance).unwrap();
    assert_eq!(socket.disposals.load(Ordering::SeqCst), 1);

    // The released node is gone, so the action only runs its callback.
    assert_eq!(recoveries.run_all_reverse(), 1);
    assert_eq!(socket.disposals.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![key_of_type::<Socket>()]);
}
