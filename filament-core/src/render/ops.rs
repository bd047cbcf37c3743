//! Node Operations Capability
//!
//! The reactive core never talks to a rendering backend directly. The
//! keyed list reconciler and the single-slot subtree wrapper are the only
//! consumers of this capability set, and they invoke it exactly once per
//! structural change.

use crate::error::Result;

/// The capability set a rendering backend injects into the core.
///
/// `Node` is an opaque handle; the core only clones and passes it back.
pub trait NodeOps {
    type Node: Clone + Send + Sync + 'static;

    /// Create a named grouping node with no visual representation of its
    /// own.
    fn create_fragment(&self, name: &str) -> Result<Self::Node>;

    /// Turn a plain value into a displayable node.
    fn create_text(&self, value: &str) -> Result<Self::Node>;

    /// Insert `node` into `parent` before `anchor`, or at the end when no
    /// anchor is given.
    fn insert_before(
        &self,
        parent: &Self::Node,
        node: &Self::Node,
        anchor: Option<&Self::Node>,
    ) -> Result<()>;

    /// Append `node` to the end of `parent`.
    fn append(&self, parent: &Self::Node, node: &Self::Node) -> Result<()>;

    /// Detach `node` from `parent`.
    fn remove(&self, parent: &Self::Node, node: &Self::Node) -> Result<()>;
}
