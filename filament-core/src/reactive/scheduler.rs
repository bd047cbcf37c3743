//! Deferred Flush Scheduler
//!
//! Writes never run effects directly. They enqueue the written signal's
//! dependent collections into two queues, one for structural recomputation
//! and one for observer work, and the next [`tick`] drains both to a
//! fixpoint.
//!
//! # Flush algorithm
//!
//! 1. Flatten and de-duplicate the structural queue, sort by creation id
//!    (a cheap approximation of dependency order), run every structural
//!    effect once. Repeat while new structural work appears.
//! 2. Flatten and de-duplicate the observer queue in insertion order and
//!    run every observer effect once.
//! 3. Executing effects may enqueue further work (cascading derived
//!    signals), so repeat from step 1 until both queues are empty.
//!
//! Only after quiescence are the callbacks registered with [`next_tick`]
//! taken and run, so a caller waiting "until next tick" observes fully
//! settled derived values.
//!
//! The queues hold dependent-lists (shared with the signals), not
//! flattened effects, which avoids a second flattening pass on the write
//! path. Lists are snapshotted before iteration: an effect executing
//! mid-flush may itself register or unregister dependents.
//!
//! # Failure
//!
//! The first error returned by an effect body aborts the flush and
//! propagates out of `tick`. The remainder of the already-flattened batch
//! is lost; work enqueued during the failing run stays queued for the next
//! tick. This is fail-fast, not transactional.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::error::Result;

use super::effect::{DependentList, Effect};

thread_local! {
    static SCHEDULER: RefCell<Scheduler> = RefCell::new(Scheduler::default());
}

#[derive(Default)]
struct Scheduler {
    structural: Vec<DependentList>,
    observer: Vec<DependentList>,
    tick_callbacks: Vec<Box<dyn FnOnce()>>,
    flushing: bool,
}

/// Enqueue a written signal's dependent collections.
pub(crate) fn enqueue(structural: DependentList, observer: DependentList) {
    SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        scheduler.structural.push(structural);
        scheduler.observer.push(observer);
    });
}

/// Whether any dependent work is waiting for the next flush.
pub fn has_pending_work() -> bool {
    SCHEDULER.with(|scheduler| {
        let scheduler = scheduler.borrow();
        !scheduler.structural.is_empty() || !scheduler.observer.is_empty()
    })
}

/// Register a callback to run after the next flush reaches quiescence.
pub fn next_tick(callback: impl FnOnce() + 'static) {
    SCHEDULER.with(|scheduler| {
        scheduler.borrow_mut().tick_callbacks.push(Box::new(callback));
    });
}

/// Drain both queues to a fixpoint, then run the registered tick
/// callbacks.
///
/// Reentrant calls (an effect calling `tick` mid-flush) are a no-op; the
/// outer drain loop picks the new work up. On error, the flush aborts and
/// the tick callbacks stay registered for the next quiescent tick.
pub fn tick() -> Result<()> {
    let reentrant = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        if scheduler.flushing {
            true
        } else {
            scheduler.flushing = true;
            false
        }
    });
    if reentrant {
        return Ok(());
    }

    // The flag must clear even when an effect body panics out of the
    // drain, or every later tick on this thread becomes a silent no-op.
    struct FlushGuard;
    impl Drop for FlushGuard {
        fn drop(&mut self) {
            SCHEDULER.with(|scheduler| scheduler.borrow_mut().flushing = false);
        }
    }

    {
        let _guard = FlushGuard;
        drain()?;
    }

    let callbacks = SCHEDULER.with(|scheduler| {
        std::mem::take(&mut scheduler.borrow_mut().tick_callbacks)
    });
    for callback in callbacks {
        callback();
    }

    Ok(())
}

fn drain() -> Result<()> {
    loop {
        loop {
            let batch = take_structural_batch();
            if batch.is_empty() {
                break;
            }
            tracing::trace!(effects = batch.len(), "running structural batch");
            for effect in &batch {
                effect.run()?;
            }
        }

        let batch = take_observer_batch();
        if batch.is_empty() {
            // Both queues empty in the same pass: quiescent.
            break;
        }
        tracing::trace!(effects = batch.len(), "running observer batch");
        for effect in &batch {
            effect.run()?;
        }
    }
    Ok(())
}

fn take_structural_batch() -> Vec<Effect> {
    let mut batch = flatten(SCHEDULER.with(|scheduler| {
        std::mem::take(&mut scheduler.borrow_mut().structural)
    }));
    batch.sort_by_key(Effect::order);
    batch
}

fn take_observer_batch() -> Vec<Effect> {
    flatten(SCHEDULER.with(|scheduler| {
        std::mem::take(&mut scheduler.borrow_mut().observer)
    }))
}

fn flatten(lists: Vec<DependentList>) -> Vec<Effect> {
    let mut seen = HashSet::new();
    let mut batch = Vec::new();
    for list in lists {
        // Snapshot: running effects may mutate the list we took it from.
        // Disposed dependents are pruned here so lists on long-lived
        // signals do not grow without bound under effect churn.
        let snapshot = {
            let mut dependents = list.lock();
            dependents.retain(|effect| !effect.is_disposed());
            dependents.clone()
        };
        for effect in snapshot {
            if seen.insert(effect.id()) {
                batch.push(effect);
            }
        }
    }
    batch
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
