//! Rendering Primitives
//!
//! The reactive core drives a rendering backend exclusively through the
//! [`NodeOps`] capability trait; it never assumes a concrete node
//! representation. Two reactive views consume the capability:
//!
//! - [`KeyedList`] reconciles an ordered, keyed sequence against a
//!   container, preserving per-item state and emitting near-minimal moves.
//! - [`DynSlot`] keeps exactly one rendered subtree mounted in a
//!   container, replacing it wholesale when its dependencies change.

pub mod list;
pub mod ops;
pub mod slot;

pub use list::KeyedList;
pub use ops::NodeOps;
pub use slot::DynSlot;
