//! Computed Values
//!
//! A computed signal is re-derived by a structural effect each time any of
//! its read dependencies change. Because structural effects settle before
//! any observer effect of the same flush, a derived chain of arbitrary
//! depth becomes consistent within a single tick rather than one tick per
//! chain level.
//!
//! The compute function receives its input by reference: the previous
//! value on a scheduled refresh (`None` on the very first evaluation), or
//! the incoming value on an explicit `set`. The result goes through the
//! signal's ordinary equality check, so a recomputation that lands on the
//! same value triggers nothing downstream.

use std::sync::Arc;

use super::effect::Effect;
use super::scope;
use super::signal::Signal;

/// Create a derived signal.
///
/// Construction installs a structural effect and runs it once
/// synchronously, so the computed value is readable immediately.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(2);
/// let doubled = computed({
///     let count = count.clone();
///     move |_| count.get() * 2
/// });
/// assert_eq!(doubled.get_untracked(), 4);
/// ```
pub fn computed<T, F>(compute: F) -> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(Option<&T>) -> T + Send + Sync + 'static,
{
    let signal = Signal::derived(Arc::new(compute));

    let effect = Effect::structural(signal.id(), {
        let signal = signal.clone();
        move || {
            signal.refresh();
            Ok(())
        }
    });
    effect
        .run_initial()
        .expect("computed refresh cannot fail");

    scope::on_dispose(move || effect.dispose());

    signal
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::scheduler::{has_pending_work, tick};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn construction_does_not_schedule_downstream_work() {
        let count = Signal::new(2);
        let parity = computed({
            let count = count.clone();
            move |_| count.get() % 2
        });

        // Registers into parity's dependent list after parity's first
        // evaluation. The construction-time commit must not have enqueued
        // that list, or this recomputes on the next tick unprovoked.
        let recomputes = Arc::new(AtomicI32::new(0));
        let _downstream = computed({
            let parity = parity.clone();
            let recomputes = recomputes.clone();
            move |_| {
                recomputes.fetch_add(1, Ordering::SeqCst);
                parity.get()
            }
        });
        assert_eq!(recomputes.load(Ordering::SeqCst), 1);
        assert!(!has_pending_work());

        tick().unwrap();
        assert_eq!(recomputes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_evaluates_at_construction() {
        let count = Signal::new(3);
        let doubled = computed({
            let count = count.clone();
            move |_| count.get() * 2
        });

        assert_eq!(doubled.get_untracked(), 6);
    }

    #[test]
    fn computed_refreshes_after_tick() {
        let count = Signal::new(1);
        let doubled = computed({
            let count = count.clone();
            move |_| count.get() * 2
        });

        count.set(5);
        assert_eq!(doubled.get_untracked(), 2);

        tick().unwrap();
        assert_eq!(doubled.get_untracked(), 10);
    }

    #[test]
    fn chain_settles_in_one_tick() {
        let a = Signal::new(1);
        let b = computed({
            let a = a.clone();
            move |_| a.get() * 2
        });
        let c = computed({
            let b = b.clone();
            move |_| b.get() + 1
        });

        assert_eq!(c.get_untracked(), 3);

        a.set(10);
        tick().unwrap();
        assert_eq!(c.get_untracked(), 21);
    }

    #[test]
    fn equal_result_does_not_cascade() {
        let count = Signal::new(2);
        let parity = computed({
            let count = count.clone();
            move |_| count.get() % 2
        });

        let recomputes = Arc::new(AtomicI32::new(0));
        let downstream = computed({
            let parity = parity.clone();
            let recomputes = recomputes.clone();
            move |_| {
                recomputes.fetch_add(1, Ordering::SeqCst);
                parity.get() + 100
            }
        });
        assert_eq!(downstream.get_untracked(), 100);
        assert_eq!(recomputes.load(Ordering::SeqCst), 1);

        // 2 -> 4: parity unchanged, downstream must not recompute.
        count.set(4);
        tick().unwrap();
        assert_eq!(recomputes.load(Ordering::SeqCst), 1);

        count.set(5);
        tick().unwrap();
        assert_eq!(recomputes.load(Ordering::SeqCst), 2);
        assert_eq!(downstream.get_untracked(), 101);
    }

    #[test]
    fn compute_sees_previous_value_on_refresh() {
        let count = Signal::new(1);
        let history = computed({
            let count = count.clone();
            move |previous: Option<&i32>| count.get() + previous.copied().unwrap_or(0)
        });

        assert_eq!(history.get_untracked(), 1);

        count.set(10);
        tick().unwrap();
        assert_eq!(history.get_untracked(), 11);
    }

    #[test]
    fn set_routes_through_compute() {
        let clamped = computed(|input: Option<&i32>| input.copied().unwrap_or(0).min(10));
        assert_eq!(clamped.get_untracked(), 0);

        clamped.set(25);
        assert_eq!(clamped.get_untracked(), 10);

        clamped.set(7);
        assert_eq!(clamped.get_untracked(), 7);
    }
}
