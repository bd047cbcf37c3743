//! Filament Core
//!
//! This crate provides the core runtime for the Filament retained-mode UI
//! library. It implements:
//!
//! - Fine-grained reactive primitives (signals, computed values, effects)
//! - A deferred flush scheduler that settles derived state to a fixpoint
//! - Disposer scopes tying resources to component lifetimes
//! - A keyed list reconciler and a dynamic single-subtree slot, driving
//!   any rendering backend through the [`NodeOps`] capability trait
//!
//! The crate never talks to a concrete display system; a backend supplies
//! node handles and structural operations, and the core decides when and
//! where to apply them.
//!
//! # Architecture
//!
//! The crate is organized into these modules:
//!
//! - `reactive`: signals, computed values, effects, scopes, and the
//!   deferred flush scheduler
//! - `render`: the `NodeOps` capability and the reactive views built on it
//! - `error`: the crate-wide error type
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::{computed, tick, watch, Signal};
//!
//! let count = Signal::new(0);
//!
//! let doubled = computed({
//!     let count = count.clone();
//!     move |_| count.get() * 2
//! });
//!
//! let _effect = watch({
//!     let doubled = doubled.clone();
//!     move || {
//!         println!("doubled is {}", doubled.get());
//!         Ok(())
//!     }
//! })?;
//!
//! // Writes are deferred; the effect re-runs on the next tick.
//! count.set(5);
//! tick()?; // prints "doubled is 10"
//! ```

pub mod error;
pub mod reactive;
pub mod render;

pub use error::{Error, Result};
pub use reactive::{
    collect_disposers, collect_disposers_with, computed, freeze, has_pending_work, next_tick,
    on_dispose, tick, untrack, watch, Disposer, Effect, EffectKind, Signal, Snapshot,
};
pub use render::{DynSlot, KeyedList, NodeOps};
