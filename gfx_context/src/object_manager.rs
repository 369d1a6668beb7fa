//! Deferred destruction of GPU objects
//!
//! Objects that an in-flight frame may still reference are retired with the
//! generation of the frame being recorded. Once the frame fence of that
//! generation has signaled they are ready:
//!
//! - `collect_sync` (render thread, every frame) destroys up to a budget of
//!   ready objects and moves the remaining ready ones to a shared backlog
//! - `collect_async` (every Nth frame) drains the backlog on a background
//!   thread
//!
//! An object is in exactly one of the pending queue (render thread only) or
//! the backlog (ready, fence-proven), so the two collectors never touch the
//! same object.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Anything that can be destroyed on another thread
pub type RetiredObject = Box<dyn Send>;

/// Object manager counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectStats {
    pub retired: u64,
    pub destroyed_sync: u64,
    pub destroyed_async: u64,
    /// Not yet destroyed (pending + backlog)
    pub pending: u64,
}

pub struct ObjectManager {
    pending: VecDeque<(u64, RetiredObject)>,
    backlog: Arc<Mutex<Vec<RetiredObject>>>,
    sweeper: Option<JoinHandle<()>>,
    sync_budget: usize,
    retired: u64,
    destroyed_sync: u64,
    destroyed_async: Arc<AtomicU64>,
}

impl ObjectManager {
    pub fn new(sync_budget: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            backlog: Arc::new(Mutex::new(Vec::new())),
            sweeper: None,
            sync_budget,
            retired: 0,
            destroyed_sync: 0,
            destroyed_async: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue `object` for destruction once frame `generation` has completed
    pub fn retire<T: Send + 'static>(&mut self, generation: u64, object: T) {
        self.retire_boxed(generation, Box::new(object));
    }

    pub fn retire_boxed(&mut self, generation: u64, object: RetiredObject) {
        debug_assert!(
            self.pending.back().map_or(true, |(last, _)| *last <= generation),
            "Objects must be retired in generation order"
        );
        self.pending.push_back((generation, object));
        self.retired += 1;
    }

    /// Reclaim objects whose generation is at most `completed`
    ///
    /// Returns the number destroyed on this thread.
    pub fn collect_sync(&mut self, completed: u64) -> usize {
        let mut destroyed = 0;
        let mut overflow = Vec::new();

        while let Some((generation, _)) = self.pending.front() {
            if *generation > completed {
                break;
            }
            let Some((_, object)) = self.pending.pop_front() else { break };
            if destroyed < self.sync_budget {
                drop(object);
                destroyed += 1;
            } else {
                overflow.push(object);
            }
        }

        if !overflow.is_empty() {
            match self.backlog.lock() {
                Ok(mut backlog) => backlog.extend(overflow),
                Err(poisoned) => poisoned.into_inner().extend(overflow),
            }
        }

        self.destroyed_sync += destroyed as u64;
        destroyed
    }

    /// Drain the backlog on a background thread
    ///
    /// Does nothing while a previous sweep is still running. Returns whether a
    /// sweep was started.
    pub fn collect_async(&mut self) -> bool {
        if let Some(handle) = &self.sweeper {
            if !handle.is_finished() {
                return false;
            }
        }
        self.join_sweeper();

        let has_work = match self.backlog.lock() {
            Ok(backlog) => !backlog.is_empty(),
            Err(poisoned) => !poisoned.into_inner().is_empty(),
        };
        if !has_work {
            return false;
        }

        let backlog = Arc::clone(&self.backlog);
        let counter = Arc::clone(&self.destroyed_async);
        let spawned = std::thread::Builder::new()
            .name("gfx-object-sweeper".to_string())
            .spawn(move || {
                let objects = match backlog.lock() {
                    Ok(mut backlog) => std::mem::take(&mut *backlog),
                    Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
                };
                let count = objects.len() as u64;
                drop(objects);
                counter.fetch_add(count, Ordering::Relaxed);
            });

        match spawned {
            Ok(handle) => {
                self.sweeper = Some(handle);
                true
            }
            Err(e) => {
                crate::gfx_warn!("gfx::context", "Failed to spawn object sweeper: {}", e);
                false
            }
        }
    }

    fn join_sweeper(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            if handle.join().is_err() {
                crate::gfx_error!("gfx::context", "Object sweeper thread panicked");
            }
        }
    }

    /// Destroy everything; the device must be idle
    pub fn shutdown(&mut self) {
        self.join_sweeper();

        let pending = self.pending.len() as u64;
        self.pending.clear();
        self.destroyed_sync += pending;

        let backlog = match self.backlog.lock() {
            Ok(mut backlog) => std::mem::take(&mut *backlog),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        self.destroyed_sync += backlog.len() as u64;
        drop(backlog);
    }

    /// Wait for the running sweep, if any
    pub fn wait_async(&mut self) {
        self.join_sweeper();
    }

    pub fn stats(&self) -> ObjectStats {
        let destroyed_async = self.destroyed_async.load(Ordering::Relaxed);
        ObjectStats {
            retired: self.retired,
            destroyed_sync: self.destroyed_sync,
            destroyed_async,
            pending: self.retired - self.destroyed_sync - destroyed_async,
        }
    }
}

impl Drop for ObjectManager {
    fn drop(&mut self) {
        self.join_sweeper();
    }
}

#[cfg(test)]
#[path = "object_manager_tests.rs"]
mod tests;
