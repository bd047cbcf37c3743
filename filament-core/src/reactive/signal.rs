//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is ambient, the signal
//!    registers that effect as a dependent. Registration is idempotent.
//!
//! 2. When a signal's value changes, both dependent collections are
//!    enqueued into the scheduler; nothing runs until the next flush.
//!
//! 3. A value only counts as changed when the new value compares unequal
//!    to the previous one, so synchronous writes of the same value
//!    coalesce into silence.
//!
//! # Dependent collections
//!
//! Each signal keeps two disjoint dependent lists: *structural* dependents
//! (effects that keep derived values consistent) and *observer* dependents
//! (externally visible effects). The scheduler drains all structural work
//! before any observer work, so observers never see a derived signal
//! mid-recomputation.
//!
//! # Ownership
//!
//! A signal does not own its dependents. When an effect registers from a
//! scope other than the signal's owning scope, a cleanup is pushed into the
//! *current* scope that detaches the effect on disposal; dependents created
//! and consumed in the signal's own scope need no detachment, since
//! disposing the signal's owner discards everything anyway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::fmt::Debug;

use parking_lot::Mutex;

use super::context;
use super::effect::{new_dependent_list, DependentList, Effect, EffectKind};
use super::scheduler;
use super::scope::{self, ScopeId};

/// Counter for creation-order ids.
///
/// Signals and their structural effects share this counter; the scheduler
/// sorts pending structural work by it as a cheap approximation of
/// dependency order.
static CREATION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_creation_id() -> u64 {
    CREATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Compute<T> = Arc<dyn Fn(Option<&T>) -> T + Send + Sync>;

struct SignalInner<T> {
    /// Creation-order id, also the tie-break comparator for structural
    /// scheduling.
    id: u64,
    /// `None` only between construction and the first computed evaluation.
    value: Mutex<Option<T>>,
    /// Present on derived signals; writes route the incoming value through
    /// it, scheduled refreshes route the previous value through it.
    compute: Option<Compute<T>>,
    /// Scope that was ambient at creation time.
    owner: Option<ScopeId>,
    structural: DependentList,
    observers: DependentList,
}

/// A reactive value cell.
///
/// Cloning a `Signal` yields another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Tracked read (registers the ambient effect, if any).
/// let value = count.get();
///
/// // Write: enqueues dependents when the value actually changes.
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: next_creation_id(),
                value: Mutex::new(Some(value)),
                compute: None,
                owner: context::current_scope(),
                structural: new_dependent_list(),
                observers: new_dependent_list(),
            }),
        }
    }

    /// Create a valueless derived signal. The caller (see
    /// [`computed`](crate::reactive::computed)) installs the structural
    /// effect that performs the first evaluation.
    pub(crate) fn derived(compute: Compute<T>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: next_creation_id(),
                value: Mutex::new(None),
                compute: Some(compute),
                owner: context::current_scope(),
                structural: new_dependent_list(),
                observers: new_dependent_list(),
            }),
        }
    }

    /// The signal's creation-order id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Tracked read: registers the ambient effect as a dependent and
    /// returns a clone of the current value.
    pub fn get(&self) -> T {
        self.track();
        self.read_value()
    }

    /// Untracked read.
    pub fn get_untracked(&self) -> T {
        self.read_value()
    }

    /// Register a dependency on this signal without reading it. Useful
    /// when only the change notification matters.
    pub fn touch(&self) {
        self.track();
    }

    /// Write a new value.
    ///
    /// The value is routed through the compute function when one is
    /// present, compared against the previous value, and only stored (and
    /// dependents only enqueued) when it differs.
    pub fn set(&self, value: T) {
        let next = match &self.inner.compute {
            Some(compute) => {
                let compute = Arc::clone(compute);
                // Untracked: the caller's ambient effect must not subscribe
                // to whatever the compute function reads.
                context::untrack(move || compute(Some(&value)))
            }
            None => value,
        };
        self.commit(next);
    }

    /// Write a new value derived from the current one.
    ///
    /// The current value is cloned out before `f` runs, so the closure may
    /// freely read this signal (or any other) without holding the value
    /// lock.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.read_value();
        self.set(f(&current));
    }

    /// Store a value directly, bypassing comparison and triggering.
    ///
    /// Intended for advance initialization, before dependents exist.
    pub fn force_set(&self, value: T) {
        *self.inner.value.lock() = Some(value);
    }

    /// Explicitly attach an effect as a dependent of this signal.
    pub fn connect(&self, effect: &Effect) {
        self.attach(effect);
    }

    /// Re-evaluate the compute function against the previous value and
    /// commit the result. Body of the structural effect installed by
    /// `computed`; a no-op on plain signals.
    pub(crate) fn refresh(&self) {
        let Some(compute) = &self.inner.compute else {
            return;
        };
        let previous = self.inner.value.lock().clone();
        let next = compute(previous.as_ref());
        self.commit(next);
    }

    fn read_value(&self) -> T {
        self.inner
            .value
            .lock()
            .clone()
            .expect("signal read before first evaluation")
    }

    fn commit(&self, next: T) {
        let initial = {
            let mut value = self.inner.value.lock();
            if value.as_ref() == Some(&next) {
                return;
            }
            let initial = value.is_none();
            *value = Some(next);
            initial
        };

        // The first evaluation fills the empty cell. Nothing can have
        // observed a value that never existed, so there is no one to
        // notify; enqueueing here would spuriously run dependents that
        // register between construction and the first flush.
        if initial {
            return;
        }

        tracing::trace!(signal = self.inner.id, "signal value changed");
        scheduler::enqueue(
            Arc::clone(&self.inner.structural),
            Arc::clone(&self.inner.observers),
        );
    }

    fn track(&self) {
        if let Some(effect) = context::current_effect() {
            self.attach(&effect);
        }
    }

    fn attach(&self, effect: &Effect) {
        let list = match effect.kind() {
            EffectKind::Structural => &self.inner.structural,
            EffectKind::Observer => &self.inner.observers,
        };

        {
            let mut dependents = list.lock();
            if dependents.iter().any(|existing| existing.id() == effect.id()) {
                return;
            }
            dependents.push(effect.clone());
        }

        // Dependents registered from a foreign scope detach themselves when
        // that scope dies; same-scope dependents go down with the signal's
        // owner and need no individual detachment.
        if let Some(current) = context::current_scope() {
            if Some(current) != self.inner.owner {
                let list = Arc::clone(list);
                let id = effect.id();
                scope::on_dispose(move || {
                    list.lock().retain(|existing| existing.id() != id);
                });
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn dependent_count(&self) -> usize {
        self.inner.structural.lock().len() + self.inner.observers.lock().len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
