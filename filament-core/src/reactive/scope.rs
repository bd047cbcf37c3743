//! Disposer Scope Tree
//!
//! Every effect, computed signal, and component runs inside a scope: an
//! ordered list of cleanup callbacks tied to a lifetime. Scopes nest into a
//! tree, and disposing a scope runs its collected cleanups and cascades to
//! its child scopes.
//!
//! # Implementation
//!
//! Scopes live in a global arena addressed by index plus generation, rather
//! than as closure-captured parent/child links. Each arena node stores its
//! parent index and an ordered entry list where cleanup callbacks and child
//! scope links interleave in registration order. This keeps teardown order
//! explicit and makes a stale [`Disposer`] handle (one whose slot has been
//! reused) a harmless no-op instead of a use-after-free hazard.
//!
//! # Batch disposal
//!
//! Disposal carries a `batch` flag internally. When an ancestor disposes a
//! large set of children together, each child skips detaching itself from
//! the (already discarded) parent entry list. Externally triggered
//! disposals always detach.

use std::sync::OnceLock;

use parking_lot::Mutex;

use super::context;

/// Handle to a scope in the arena.
///
/// The generation counter guards against slot reuse: a `ScopeId` whose slot
/// has since been recycled no longer matches and is treated as dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

type Cleanup = Box<dyn FnOnce() + Send>;

enum ScopeEntry {
    Cleanup(Cleanup),
    Child(ScopeId),
}

struct ScopeNode {
    generation: u32,
    parent: Option<ScopeId>,
    entries: Vec<ScopeEntry>,
    /// Runs before the entry list when the scope is disposed.
    final_cleanup: Option<Cleanup>,
}

enum Slot {
    Vacant { generation: u32 },
    Occupied(ScopeNode),
}

#[derive(Default)]
struct ScopeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

static ARENA: OnceLock<Mutex<ScopeArena>> = OnceLock::new();

fn arena() -> &'static Mutex<ScopeArena> {
    ARENA.get_or_init(|| Mutex::new(ScopeArena::default()))
}

/// Allocate a scope node, registering it into `parent`'s entry list so
/// parent disposal cascades.
pub(crate) fn create(parent: Option<ScopeId>, final_cleanup: Option<Cleanup>) -> ScopeId {
    let mut arena = arena().lock();

    let index = match arena.free.pop() {
        Some(index) => index,
        None => {
            arena.slots.push(Slot::Vacant { generation: 0 });
            (arena.slots.len() - 1) as u32
        }
    };
    let generation = match arena.slots[index as usize] {
        Slot::Vacant { generation } => generation,
        Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
    };
    let id = ScopeId { index, generation };

    arena.slots[index as usize] = Slot::Occupied(ScopeNode {
        generation,
        parent,
        entries: Vec::new(),
        final_cleanup,
    });

    if let Some(parent) = parent {
        if let Some(Slot::Occupied(node)) = arena.slots.get_mut(parent.index as usize) {
            if node.generation == parent.generation {
                node.entries.push(ScopeEntry::Child(id));
            }
        }
    }

    id
}

/// Allocate a child scope under an explicit parent, without touching the
/// ambient context. Used by owners (such as the list reconciler) that manage
/// per-entry lifetimes themselves.
pub(crate) fn create_child(parent: Option<ScopeId>) -> ScopeId {
    create(parent, None)
}

/// Whether the scope behind `id` has not been disposed.
pub(crate) fn is_live(id: ScopeId) -> bool {
    let arena = arena().lock();
    matches!(
        arena.slots.get(id.index as usize),
        Some(Slot::Occupied(node)) if node.generation == id.generation
    )
}

fn push_cleanup(id: ScopeId, cleanup: Cleanup) {
    let mut arena = arena().lock();
    if let Some(Slot::Occupied(node)) = arena.slots.get_mut(id.index as usize) {
        if node.generation == id.generation {
            node.entries.push(ScopeEntry::Cleanup(cleanup));
        }
    }
}

/// Dispose the scope behind `id`: run its final cleanup, then its entries
/// in registration order, cascading into child scopes.
///
/// Already-disposed (or stale) ids are a no-op, so a cascade and a manual
/// dispose may safely overlap.
pub(crate) fn dispose(id: ScopeId, batch: bool) {
    let node = {
        let mut arena = arena().lock();
        match arena.slots.get_mut(id.index as usize) {
            Some(slot @ Slot::Occupied(_)) => {
                let taken = std::mem::replace(
                    slot,
                    Slot::Vacant {
                        generation: id.generation.wrapping_add(1),
                    },
                );
                match taken {
                    Slot::Occupied(node) if node.generation == id.generation => {
                        arena.free.push(id.index);
                        node
                    }
                    // Generation mismatch: put the live occupant back.
                    taken => {
                        *slot = taken;
                        return;
                    }
                }
            }
            _ => return,
        }
    };

    tracing::debug!(
        scope = id.index,
        generation = id.generation,
        entries = node.entries.len(),
        batch,
        "disposing scope"
    );

    if !batch {
        if let Some(parent) = node.parent {
            let mut arena = arena().lock();
            if let Some(Slot::Occupied(parent_node)) = arena.slots.get_mut(parent.index as usize)
            {
                if parent_node.generation == parent.generation {
                    parent_node
                        .entries
                        .retain(|entry| !matches!(entry, ScopeEntry::Child(child) if *child == id));
                }
            }
        }
    }

    if let Some(cleanup) = node.final_cleanup {
        cleanup();
    }
    for entry in node.entries {
        match entry {
            ScopeEntry::Cleanup(cleanup) => cleanup(),
            ScopeEntry::Child(child) => dispose(child, true),
        }
    }
}

/// A handle that disposes one scope (and, transitively, its children).
#[derive(Debug, Clone, Copy)]
pub struct Disposer {
    scope: ScopeId,
}

impl Disposer {
    /// Dispose the scope: run its cleanups in order and cascade into child
    /// scopes. Disposing an already-dead scope is a no-op.
    pub fn dispose(self) {
        dispose(self.scope, false);
    }

    pub(crate) fn scope_id(&self) -> ScopeId {
        self.scope
    }
}

/// Register `cleanup` against the ambient scope.
///
/// A no-op when called outside any scope.
pub fn on_dispose(cleanup: impl FnOnce() + Send + 'static) {
    if let Some(scope) = context::current_scope() {
        push_cleanup(scope, Box::new(cleanup));
    }
}

/// Create a scope, make it ambient for the duration of `setup`, and return
/// the setup result together with a [`Disposer`] bound to the scope.
///
/// The scope registers into the previously ambient scope (if any), so
/// disposing an ancestor cascades into it.
pub fn collect_disposers<R>(setup: impl FnOnce() -> R) -> (R, Disposer) {
    collect_inner(setup, None)
}

/// Like [`collect_disposers`], with an extra cleanup that runs before the
/// scope's own collected callbacks on disposal.
pub fn collect_disposers_with<R>(
    setup: impl FnOnce() -> R,
    cleanup: impl FnOnce() + Send + 'static,
) -> (R, Disposer) {
    collect_inner(setup, Some(Box::new(cleanup)))
}

fn collect_inner<R>(setup: impl FnOnce() -> R, cleanup: Option<Cleanup>) -> (R, Disposer) {
    let scope = create(context::current_scope(), cleanup);
    let result = context::with_scope(Some(scope), setup);
    (result, Disposer { scope })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
