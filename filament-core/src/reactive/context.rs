//! Ambient Tracking Context
//!
//! The tracking context records which effect is currently running and which
//! disposer scope is currently collecting cleanups. This enables automatic
//! dependency tracking: when a signal is read, the current effect (if any)
//! is registered as a dependent, and detachment cleanups land in the
//! current scope.
//!
//! # Implementation
//!
//! Both slots live in a single thread-local cell. Entering a tracked region
//! swaps the slots and restores them on the way out, so nested regions (an
//! effect created inside another effect's body) behave like a stack. The
//! runtime assumes a single logical thread of control; each thread gets an
//! independent context.
//!
//! # Continuations
//!
//! [`Snapshot`] captures the ambient pair so a deferred continuation (for
//! example, a callback fired after an asynchronous completion) can resume
//! tracking against the original component's lifetime. If that lifetime has
//! ended by the time the continuation runs, the snapshot degrades to an
//! inert context: reads register nothing and cleanups go nowhere, rather
//! than erroring.

use std::cell::RefCell;

use super::effect::Effect;
use super::scope::{self, ScopeId};

thread_local! {
    static CURRENT: RefCell<TrackingContext> = RefCell::new(TrackingContext::default());
}

#[derive(Default)]
struct TrackingContext {
    effect: Option<Effect>,
    scope: Option<ScopeId>,
}

/// Get the effect currently being tracked, if any.
pub(crate) fn current_effect() -> Option<Effect> {
    CURRENT.with(|current| current.borrow().effect.clone())
}

/// Get the scope currently collecting cleanups, if any.
pub(crate) fn current_scope() -> Option<ScopeId> {
    CURRENT.with(|current| current.borrow().scope)
}

/// Run `f` with the ambient effect replaced, leaving the scope untouched.
///
/// Restoration happens in a drop guard so a panic unwinding out of `f`
/// cannot leave a stale effect ambient.
pub(crate) fn with_effect<R>(effect: Option<Effect>, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Effect>);
    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            CURRENT.with(|current| current.borrow_mut().effect = previous);
        }
    }

    let _restore = Restore(CURRENT.with(|current| {
        std::mem::replace(&mut current.borrow_mut().effect, effect)
    }));
    f()
}

/// Run `f` with the ambient scope replaced, leaving the effect untouched.
pub(crate) fn with_scope<R>(scope: Option<ScopeId>, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<ScopeId>);
    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0;
            CURRENT.with(|current| current.borrow_mut().scope = previous);
        }
    }

    let _restore = Restore(CURRENT.with(|current| {
        std::mem::replace(&mut current.borrow_mut().scope, scope)
    }));
    f()
}

/// Run `f` with both ambient slots replaced.
pub(crate) fn with_context<R>(
    effect: Option<Effect>,
    scope: Option<ScopeId>,
    f: impl FnOnce() -> R,
) -> R {
    with_effect(effect, || with_scope(scope, f))
}

/// Run `f` with an inert context.
///
/// Signal reads inside `f` register no dependency, and cleanups registered
/// inside `f` have no owning scope.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    with_context(None, None, f)
}

/// A captured ambient context.
///
/// Restoring a snapshot whose scope has since been disposed yields an inert
/// context instead: subsequent signal operations are untracked and
/// owner-less rather than erroring.
#[derive(Clone)]
pub struct Snapshot {
    effect: Option<Effect>,
    scope: Option<ScopeId>,
}

impl Snapshot {
    /// Capture the ambient effect and scope at the call site.
    pub fn capture() -> Self {
        Self {
            effect: current_effect(),
            scope: current_scope(),
        }
    }

    /// Run `f` under the captured context.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.scope.is_some_and(|scope| !scope::is_live(scope)) {
            return untrack(f);
        }
        with_context(self.effect.clone(), self.scope, f)
    }
}

/// Wrap `f` so later invocations run under the context captured now.
///
/// This is how a deferred continuation can still register effects and
/// cleanups against the component that created it.
pub fn freeze<F, R>(f: F) -> impl Fn() -> R
where
    F: Fn() -> R,
{
    let snapshot = Snapshot::capture();
    move || snapshot.run(&f)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
