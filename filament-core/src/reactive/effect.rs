//! Effect Implementation
//!
//! An effect is the unit of work the tracker registers as a dependent of a
//! signal. Effects come in two kinds:
//!
//! - *Structural* effects keep a derived signal's stored value current.
//!   The scheduler runs every pending structural effect to completion
//!   before any observer effect of the same flush.
//! - *Observer* effects do user-visible work: rendering a subtree,
//!   reconciling a list, logging.
//!
//! # Identity
//!
//! Effects are shared callables. Cloning an [`Effect`] yields another
//! handle to the same effect; dependent lists and flush batches
//! de-duplicate by id, so an effect scheduled through several signals in
//! one pass still runs once per batch.
//!
//! # Failure
//!
//! Effect bodies are fallible. An error aborts the enclosing flush pass and
//! propagates synchronously out of the triggering `tick()` call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::Result;

use super::context;
use super::scope;
use super::signal::next_creation_id;

/// A dependent collection on a signal. Writes enqueue the whole list into
/// the scheduler; the flush snapshots and flattens it.
pub(crate) type DependentList = Arc<Mutex<SmallVec<[Effect; 2]>>>;

pub(crate) fn new_dependent_list() -> DependentList {
    Arc::new(Mutex::new(SmallVec::new()))
}

/// Distinguishes derived-value maintenance from user-visible work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Updates a computed signal's stored value; settles before observers.
    Structural,
    /// User-visible work driven by signal changes.
    Observer,
}

struct EffectInner {
    /// Creation-order id. For structural effects this is the owning
    /// signal's creation id, which the scheduler uses as a cheap
    /// approximation of dependency order.
    order: u64,
    kind: EffectKind,
    body: Box<dyn Fn() -> Result<()> + Send + Sync>,
    disposed: AtomicBool,
}

/// A dependency-tracked callback.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
/// let effect = watch({
///     let count = count.clone();
///     move || {
///         println!("count is {}", count.get());
///         Ok(())
///     }
/// })?;
///
/// count.set(5);
/// tick()?; // prints "count is 5"
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create an observer effect. It does not run until scheduled (or until
    /// an initial tracked run is requested by its owner).
    pub fn observer(body: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(EffectInner {
                order: next_creation_id(),
                kind: EffectKind::Observer,
                body: Box::new(body),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Create a structural effect ordered by its owning signal's creation id.
    pub(crate) fn structural(
        order: u64,
        body: impl Fn() -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(EffectInner {
                order,
                kind: EffectKind::Structural,
                body: Box::new(body),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// The effect's identity, used for de-duplication.
    pub fn id(&self) -> u64 {
        self.inner.order
    }

    pub(crate) fn order(&self) -> u64 {
        self.inner.order
    }

    pub fn kind(&self) -> EffectKind {
        self.inner.kind
    }

    /// Run the body under tracking with no ambient scope. This is how the
    /// scheduler executes effects: dependencies discovered mid-flush
    /// re-register idempotently, but no detach cleanups are collected.
    pub(crate) fn run(&self) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        context::with_context(Some(self.clone()), None, || (self.inner.body)())
    }

    /// Run the body under tracking while keeping the ambient scope, so
    /// dependencies register their detach cleanups against the creating
    /// scope. Used for the first run at construction time.
    pub(crate) fn run_initial(&self) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        context::with_effect(Some(self.clone()), || (self.inner.body)())
    }

    /// Permanently stop the effect. Dependent lists drop their entries
    /// lazily: a disposed effect left in a list is skipped at flush time.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Build an observer effect from `body`, run it once immediately under
/// tracking, and tie its disposal to the ambient scope.
///
/// The immediate run establishes the initial dependency set; any error it
/// returns propagates out of `watch` itself.
pub fn watch(body: impl Fn() -> Result<()> + Send + Sync + 'static) -> Result<Effect> {
    let effect = Effect::observer(body);
    effect.run_initial()?;

    let handle = effect.clone();
    scope::on_dispose(move || handle.dispose());

    Ok(effect)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn watch_runs_immediately() {
        let count = Arc::new(AtomicI32::new(0));
        let inner = count.clone();

        let _effect = watch(move || {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watch_propagates_initial_error() {
        let result = watch(|| Err(crate::Error::node_op("broken")));
        assert!(result.is_err());
    }

    #[test]
    fn disposed_effect_does_not_run() {
        let count = Arc::new(AtomicI32::new(0));
        let inner = count.clone();

        let effect = Effect::observer(move || {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        effect.run().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert!(effect.is_disposed());

        effect.run().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clone_shares_identity_and_disposal() {
        let effect = Effect::observer(|| Ok(()));
        let other = effect.clone();

        assert_eq!(effect.id(), other.id());

        effect.dispose();
        assert!(other.is_disposed());
    }

    #[test]
    fn effect_ids_are_unique() {
        let a = Effect::observer(|| Ok(()));
        let b = Effect::observer(|| Ok(()));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn watch_disposes_with_its_scope() {
        use crate::reactive::scope::collect_disposers;

        let (effect, disposer) = collect_disposers(|| watch(|| Ok(())).unwrap());
        assert!(!effect.is_disposed());

        disposer.dispose();
        assert!(effect.is_disposed());
    }
}
