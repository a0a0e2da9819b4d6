use std::cell::Cell;
use std::rc::Rc;

use futures::executor::LocalPool;

use super::*;
use crate::session::test_support::FakeRuntime;

#[test]
fn arming_twice_leaves_one_pending_timer() {
    let mut pool = LocalPool::new();
    let runtime = FakeRuntime::new(pool.spawner(), 0.0);
    let mut handle = SchedulerHandle::default();

    handle.arm(&runtime, Duration::from_secs(10), FireAction::Refresh, |_| {});
    handle.arm(&runtime, Duration::from_secs(20), FireAction::Reevaluate, |_| {});

    assert_eq!(runtime.pending_timers(), 1);
    assert_eq!(runtime.cancelled(), 1);
    assert_eq!(handle.pending(), Some((Duration::from_secs(20), FireAction::Reevaluate)));
    pool.run_until_stalled();
}

#[test]
fn fire_hands_back_generation() {
    let mut pool = LocalPool::new();
    let runtime = FakeRuntime::new(pool.spawner(), 0.0);
    let mut handle = SchedulerHandle::default();
    let fired = Rc::new(Cell::new(None));

    let sink = Rc::clone(&fired);
    let generation = handle.arm(&runtime, Duration::from_secs(1), FireAction::Refresh, move |g| sink.set(Some(g)));
    runtime.advance(&mut pool, Duration::from_secs(1));

    assert_eq!(fired.get(), Some(generation));
    assert_eq!(handle.take_fired(generation), Some(FireAction::Refresh));
    assert!(!handle.is_pending());
}

#[test]
fn stale_generation_is_ignored() {
    let mut pool = LocalPool::new();
    let runtime = FakeRuntime::new(pool.spawner(), 0.0);
    let mut handle = SchedulerHandle::default();

    let first = handle.arm(&runtime, Duration::from_secs(1), FireAction::Refresh, |_| {});
    let second = handle.arm(&runtime, Duration::from_secs(2), FireAction::Refresh, |_| {});

    assert_eq!(handle.take_fired(first), None);
    assert!(handle.is_pending());
    assert_eq!(handle.take_fired(second), Some(FireAction::Refresh));
}

#[test]
fn cancel_clears_pending() {
    let mut pool = LocalPool::new();
    let runtime = FakeRuntime::new(pool.spawner(), 0.0);
    let mut handle = SchedulerHandle::default();

    let generation = handle.arm(&runtime, Duration::from_secs(1), FireAction::Refresh, |_| {});
    handle.cancel(&runtime);

    assert!(!handle.is_pending());
    assert_eq!(runtime.pending_timers(), 0);
    assert_eq!(handle.take_fired(generation), None);
}
