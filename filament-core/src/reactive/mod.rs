//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computed
//! values, effects, disposer scopes, and the deferred flush scheduler.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for mutable state. When a signal is read
//! while an effect is running, the signal registers that effect as a
//! dependent. When the signal's value changes, both dependent collections
//! are enqueued for the next flush.
//!
//! ## Computed values
//!
//! [`computed`] builds a derived signal kept current by a *structural*
//! effect. Structural effects settle before any observer effect of the
//! same flush, so observers never see a derived value mid-recomputation.
//!
//! ## Effects and watch
//!
//! An [`Effect`] is a side-effecting computation that re-runs whenever its
//! dependencies change. [`watch`] is the usual constructor: run once under
//! tracking, re-run per flush while any dependency keeps changing.
//!
//! ## Scopes
//!
//! Every effect, computed, and component runs inside a disposer scope
//! ([`collect_disposers`]). Disposing a scope runs its cleanups in
//! registration order and cascades to child scopes.
//!
//! ## The tick
//!
//! Writes are deferred: nothing observable happens until [`tick`] drains
//! the scheduler to a fixpoint. [`next_tick`] registers a continuation to
//! run once the next flush reaches quiescence.

pub(crate) mod context;
mod computed;
mod effect;
mod scheduler;
pub(crate) mod scope;
mod signal;

pub use computed::computed;
pub use context::{freeze, untrack, Snapshot};
pub use effect::{watch, Effect, EffectKind};
pub use scheduler::{has_pending_work, next_tick, tick};
pub use scope::{collect_disposers, collect_disposers_with, on_dispose, Disposer};
pub use signal::Signal;
