//! Unit tests for object_manager.rs

use crate::object_manager::{ObjectManager, ObjectStats};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// HELPERS
// ============================================================================

/// Counts its own destruction
struct Tracked(Arc<AtomicUsize>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

// ============================================================================
// SYNCHRONOUS COLLECTION
// ============================================================================

#[test]
fn test_objects_wait_for_their_generation() {
    let dropped = counter();
    let mut manager = ObjectManager::new(64);
    manager.retire(5, Tracked(Arc::clone(&dropped)));

    assert_eq!(manager.collect_sync(4), 0);
    assert_eq!(dropped.load(Ordering::SeqCst), 0);

    assert_eq!(manager.collect_sync(5), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}

#[test]
fn test_collect_sync_only_takes_completed_generations() {
    let dropped = counter();
    let mut manager = ObjectManager::new(64);
    manager.retire(1, Tracked(Arc::clone(&dropped)));
    manager.retire(2, Tracked(Arc::clone(&dropped)));
    manager.retire(3, Tracked(Arc::clone(&dropped)));

    manager.collect_sync(2);

    assert_eq!(dropped.load(Ordering::SeqCst), 2);
    assert_eq!(manager.stats().pending, 1);
}

#[test]
fn test_budget_overflow_moves_to_backlog() {
    let dropped = counter();
    let mut manager = ObjectManager::new(2);
    for _ in 0..5 {
        manager.retire(1, Tracked(Arc::clone(&dropped)));
    }

    assert_eq!(manager.collect_sync(1), 2);
    assert_eq!(dropped.load(Ordering::SeqCst), 2);

    // The rest is ready but left to the background sweep.
    assert_eq!(manager.collect_sync(1), 0);
    assert_eq!(manager.stats().pending, 3);
}

// ============================================================================
// ASYNCHRONOUS COLLECTION
// ============================================================================

#[test]
fn test_collect_async_drains_backlog() {
    let dropped = counter();
    let mut manager = ObjectManager::new(1);
    for _ in 0..4 {
        manager.retire(1, Tracked(Arc::clone(&dropped)));
    }
    manager.collect_sync(1);

    assert!(manager.collect_async());
    manager.wait_async();

    assert_eq!(dropped.load(Ordering::SeqCst), 4);
    let stats = manager.stats();
    assert_eq!(stats.destroyed_sync, 1);
    assert_eq!(stats.destroyed_async, 3);
    assert_eq!(stats.pending, 0);
}

#[test]
fn test_collect_async_without_backlog_does_nothing() {
    let mut manager = ObjectManager::new(8);
    manager.retire(3, 0u32);
    assert!(!manager.collect_async());
    assert_eq!(manager.stats().pending, 1);
}

#[test]
fn test_async_never_touches_unfinished_generations() {
    let dropped = counter();
    let mut manager = ObjectManager::new(0);
    manager.retire(1, Tracked(Arc::clone(&dropped)));
    manager.retire(2, Tracked(Arc::clone(&dropped)));
    manager.collect_sync(1);

    manager.collect_async();
    manager.wait_async();

    assert_eq!(dropped.load(Ordering::SeqCst), 1);
    assert_eq!(manager.stats().pending, 1);
}

// ============================================================================
// SHUTDOWN / STATS
// ============================================================================

#[test]
fn test_shutdown_destroys_everything() {
    let dropped = counter();
    let mut manager = ObjectManager::new(1);
    manager.retire(1, Tracked(Arc::clone(&dropped)));
    manager.retire(1, Tracked(Arc::clone(&dropped)));
    manager.retire(9, Tracked(Arc::clone(&dropped)));
    manager.collect_sync(1);

    manager.shutdown();

    assert_eq!(dropped.load(Ordering::SeqCst), 3);
    assert_eq!(manager.stats().pending, 0);
}

#[test]
fn test_stats_default() {
    let manager = ObjectManager::new(4);
    assert_eq!(manager.stats(), ObjectStats::default());
}
