mod support;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use berth::adapter::state::MemoryState;
use berth::domain::{Credential, Life, UnitName};
use berth::error::{DeployerError, FeedError, ManagerError};
use berth::port::ChangeFeed;
use berth::runtime::{Deployer, DeployerHandle};
use berth::testkit::credentials::FixedCredentials;
use berth::testkit::feed::{channel_feed, ChannelFeedHandle};
use berth::testkit::manager::{ManagerCall, RecordingManager};
use support::{unit, wait_until, OTHER, SELF};

const SENTINEL: &str = "sentinel";

struct Harness {
    state: MemoryState,
    manager: Arc<RecordingManager>,
    feed: ChannelFeedHandle,
    handle: DeployerHandle,
    settled: AtomicU32,
}

impl Harness {
    fn start(state: MemoryState, manager: RecordingManager) -> Self {
        let manager = Arc::new(manager);
        let (feed, feed_handle) = channel_feed();
        let handle = Deployer::new(SELF, Arc::new(state.clone()), manager.clone())
            .with_credentials(Arc::new(FixedCredentials::new("pw")))
            .start(Box::new(feed));
        Self {
            state,
            manager,
            feed: feed_handle,
            handle,
            settled: AtomicU32::new(0),
        }
    }

    /// Deliver `names`, then make sure the deployer has finished with them
    /// by waiting for a fresh sentinel unit delivered afterwards to be
    /// deployed.
    async fn settle(&self, names: &[&str]) {
        let n = self.settled.fetch_add(1, Ordering::SeqCst);
        let sentinel = unit(&format!("{SENTINEL}/{n}"));
        self.state.add_unit(sentinel.clone(), Some(SELF)).unwrap();

        assert!(self.feed.send(names.iter().copied()));
        assert!(self.feed.send_units(vec![sentinel.clone()]));
        wait_until(|| self.manager.deployed().contains(&sentinel)).await;
    }

    /// Manager calls other than those for sentinel units.
    fn calls(&self) -> Vec<ManagerCall> {
        self.manager
            .calls()
            .into_iter()
            .filter(|call| match call {
                ManagerCall::Deploy(name) | ManagerCall::Recall(name) => {
                    name.service().as_str() != SENTINEL
                }
            })
            .collect()
    }
}

fn state_with(units: &[(&str, Option<&str>, Life)]) -> MemoryState {
    let state = MemoryState::new();
    for (name, deployer, life) in units {
        state.add_unit(unit(name), *deployer).unwrap();
        if *life != Life::Alive {
            state.set_life(&unit(name), *life).unwrap();
        }
    }
    state
}

#[tokio::test]
async fn converged_unit_from_previous_run_is_left_alone() {
    let state = state_with(&[("app/0", Some(SELF), Life::Alive)]);
    let h = Harness::start(state, RecordingManager::with_deployed([unit("app/0")]));

    h.settle(&["app/0"]).await;

    assert!(h.calls().is_empty());
    assert!(h.manager.deployed().contains(&unit("app/0")));
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn alive_unit_assigned_here_is_deployed_with_a_fresh_credential() {
    let state = state_with(&[("app/1", Some(SELF), Life::Alive)]);
    let h = Harness::start(state, RecordingManager::new());

    h.settle(&["app/1"]).await;

    assert_eq!(h.calls(), vec![ManagerCall::Deploy(unit("app/1"))]);
    let credential = h.manager.credential_for(&unit("app/1")).unwrap();
    assert_eq!(credential, Credential::new("pw-0"));
    let record = h.state.record(&unit("app/1")).unwrap();
    assert_eq!(record.password_hash, Some(credential.digest()));
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn deployed_unit_missing_from_state_is_recalled_at_startup() {
    let h = Harness::start(
        MemoryState::new(),
        RecordingManager::with_deployed([unit("app/2")]),
    );

    wait_until(|| h.manager.deployed().is_empty()).await;

    assert_eq!(h.calls(), vec![ManagerCall::Recall(unit("app/2"))]);
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn dying_unit_never_deployed_is_removed_without_manager_calls() {
    let state = state_with(&[("app/3", Some(SELF), Life::Dying)]);
    let h = Harness::start(state, RecordingManager::new());

    h.settle(&["app/3"]).await;

    assert!(h.calls().is_empty());
    assert!(h.state.record(&unit("app/3")).is_none());
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn redundant_deliveries_deploy_once() {
    let state = state_with(&[("app/0", Some(SELF), Life::Alive)]);
    let h = Harness::start(state, RecordingManager::new());

    h.settle(&["app/0", "app/0"]).await;
    h.settle(&["app/0"]).await;

    assert_eq!(h.calls(), vec![ManagerCall::Deploy(unit("app/0"))]);
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn units_of_other_deployers_are_ignored() {
    let state = state_with(&[
        ("app/0", Some(OTHER), Life::Alive),
        ("app/1", None, Life::Dying),
    ]);
    let h = Harness::start(state, RecordingManager::new());

    h.settle(&["app/0", "app/1"]).await;

    assert!(h.calls().is_empty());
    assert!(h.state.record(&unit("app/1")).is_some());
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn reassigned_unit_is_recalled_exactly_once_and_kept_in_state() {
    let state = state_with(&[("app/0", Some(SELF), Life::Alive)]);
    let h = Harness::start(state, RecordingManager::new());
    h.settle(&["app/0"]).await;

    h.state.assign_deployer(&unit("app/0"), Some(OTHER)).unwrap();
    h.settle(&["app/0", "app/0"]).await;
    h.settle(&["app/0"]).await;

    assert_eq!(
        h.calls(),
        vec![
            ManagerCall::Deploy(unit("app/0")),
            ManagerCall::Recall(unit("app/0")),
        ]
    );
    let record = h.state.record(&unit("app/0")).unwrap();
    assert_eq!(record.life, Life::Alive);
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn reassigned_dying_unit_is_recalled_but_not_removed() {
    let state = state_with(&[("app/0", Some(SELF), Life::Alive)]);
    let h = Harness::start(state, RecordingManager::new());
    h.settle(&["app/0"]).await;

    h.state.set_life(&unit("app/0"), Life::Dying).unwrap();
    h.state.assign_deployer(&unit("app/0"), Some(OTHER)).unwrap();
    h.settle(&["app/0"]).await;

    assert_eq!(h.calls().last(), Some(&ManagerCall::Recall(unit("app/0"))));
    assert_eq!(h.state.record(&unit("app/0")).unwrap().life, Life::Dying);
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn deployed_unit_that_dies_is_recalled_then_removed() {
    let state = state_with(&[("app/0", Some(SELF), Life::Alive)]);
    let h = Harness::start(state, RecordingManager::new());
    h.settle(&["app/0"]).await;

    // Dying alone leaves the agent running so it can wind itself down.
    h.state.set_life(&unit("app/0"), Life::Dying).unwrap();
    h.settle(&["app/0"]).await;
    assert_eq!(h.calls().len(), 1);

    h.state.set_life(&unit("app/0"), Life::Dead).unwrap();
    h.settle(&["app/0"]).await;

    assert_eq!(
        h.calls(),
        vec![
            ManagerCall::Deploy(unit("app/0")),
            ManagerCall::Recall(unit("app/0")),
        ]
    );
    assert!(h.state.record(&unit("app/0")).is_none());
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn redeploys_after_unit_returns_to_this_deployer() {
    let state = state_with(&[("app/0", Some(SELF), Life::Alive)]);
    let h = Harness::start(state, RecordingManager::new());
    h.settle(&["app/0"]).await;

    h.state.assign_deployer(&unit("app/0"), Some(OTHER)).unwrap();
    h.settle(&["app/0"]).await;
    h.state.assign_deployer(&unit("app/0"), Some(SELF)).unwrap();
    h.settle(&["app/0"]).await;

    assert_eq!(
        h.calls(),
        vec![
            ManagerCall::Deploy(unit("app/0")),
            ManagerCall::Recall(unit("app/0")),
            ManagerCall::Deploy(unit("app/0")),
        ]
    );
    // Every deployment gets its own credential.
    assert_ne!(
        h.manager.credential_for(&unit("app/0")),
        Some(Credential::new("pw-0"))
    );
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn stop_is_idempotent_and_every_waiter_sees_the_outcome() {
    let h = Harness::start(MemoryState::new(), RecordingManager::new());
    let other = h.handle.clone();

    h.handle.stop().await.unwrap();
    h.handle.stop().await.unwrap();
    other.wait().await.unwrap();

    assert!(other.is_finished());
    assert_eq!(h.feed.stop_count(), 1);
}

#[tokio::test]
async fn feed_error_is_surfaced_to_concurrent_waiters() {
    let h = Harness::start(MemoryState::new(), RecordingManager::new());
    let first = h.handle.clone();
    let second = h.handle.clone();

    h.feed.fail(FeedError::Upstream("watch broken".into()));
    let (a, b) = tokio::join!(first.wait(), second.wait());

    for outcome in [a, b] {
        assert!(matches!(
            outcome,
            Err(DeployerError::Feed(FeedError::Upstream(ref reason))) if reason == "watch broken"
        ));
    }
    // Stopping after the fact reports the same terminal error.
    assert!(matches!(h.handle.stop().await, Err(DeployerError::Feed(_))));
}

#[tokio::test]
async fn feed_closing_without_an_error_is_still_an_error() {
    let Harness { handle, feed, .. } = Harness::start(MemoryState::new(), RecordingManager::new());

    drop(feed);

    assert!(matches!(
        handle.wait().await,
        Err(DeployerError::Feed(FeedError::Closed))
    ));
}

#[tokio::test]
async fn failing_step_stops_the_deployer() {
    let state = state_with(&[("app/0", Some(SELF), Life::Alive)]);
    let manager = RecordingManager::new();
    manager.fail_next_deploy("disk full");
    let h = Harness::start(state, manager);

    assert!(h.feed.send(["app/0"]));
    let err = h.handle.wait().await.unwrap_err();

    assert!(matches!(err, DeployerError::Manager(ManagerError::Other(_))));
    assert!(!err.is_fatal());
    assert!(h.manager.deployed().is_empty());
    assert!(h.feed.is_closed());
    assert_eq!(h.feed.stop_count(), 1);
}

#[tokio::test]
async fn failing_enumeration_stops_the_deployer_before_any_step() {
    let manager = RecordingManager::new();
    manager.fail_listing("init dir unreadable");
    let h = Harness::start(MemoryState::new(), manager);

    let err = h.handle.wait().await.unwrap_err();

    assert!(matches!(err, DeployerError::Manager(_)));
    assert!(h.manager.calls().is_empty());
}

#[tokio::test]
async fn stop_lets_the_step_in_flight_finish() {
    let state = state_with(&[("app/0", Some(SELF), Life::Alive)]);
    let manager = RecordingManager::new();
    let gate = manager.gate_deploys();
    let h = Harness::start(state, manager);

    assert!(h.feed.send(["app/0"]));
    gate.entered().await;

    let stopper = h.handle.clone();
    let stopping = tokio::spawn(async move { stopper.stop().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!h.handle.is_finished());

    gate.release();
    stopping.await.unwrap().unwrap();
    assert_eq!(h.manager.deployed(), vec![unit("app/0")]);
}

#[tokio::test]
async fn feed_stop_failure_is_reported_on_clean_exit() {
    let h = Harness::start(MemoryState::new(), RecordingManager::new());
    h.feed.fail_stop(FeedError::Upstream("unsubscribe failed".into()));

    assert!(matches!(
        h.handle.stop().await,
        Err(DeployerError::Feed(FeedError::Upstream(_)))
    ));
}

#[tokio::test]
async fn dropping_every_handle_stops_the_deployer() {
    let Harness { handle, feed, .. } = Harness::start(MemoryState::new(), RecordingManager::new());

    drop(handle);

    wait_until(|| feed.is_closed()).await;
    assert_eq!(feed.stop_count(), 1);
}

#[tokio::test]
async fn follows_the_units_watcher_of_an_in_memory_state() {
    let state = MemoryState::new();
    state.add_unit(unit("app/0"), Some(SELF)).unwrap();
    let manager = Arc::new(RecordingManager::new());
    let feed: Box<dyn ChangeFeed> = Box::new(state.watch_units(SELF));
    let handle = Deployer::new(SELF, Arc::new(state.clone()), manager.clone()).start(feed);

    wait_until(|| manager.deployed() == vec![unit("app/0")]).await;

    state.add_unit(unit("app/1"), Some(SELF)).unwrap();
    state.add_unit(unit("db/0"), Some(OTHER)).unwrap();
    wait_until(|| manager.deployed().len() == 2).await;

    state.set_life(&unit("app/0"), Life::Dead).unwrap();
    wait_until(|| state.record(&unit("app/0")).is_none()).await;

    assert_eq!(manager.deployed(), vec![unit("app/1")]);
    assert!(!manager
        .calls()
        .iter()
        .any(|call| *call == ManagerCall::Deploy(UnitName::parse("db/0").unwrap())));

    state.close();
    assert!(matches!(
        handle.wait().await,
        Err(DeployerError::Feed(FeedError::Upstream(_)))
    ));
}
