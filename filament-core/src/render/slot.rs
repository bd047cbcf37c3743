//! Dynamic Slot
//!
//! A [`DynSlot`] owns one position inside a container and keeps exactly
//! one rendered subtree mounted there. Each re-render unmounts the
//! previous subtree (disposing its scope first, then removing its node)
//! and mounts a fresh one built in a brand-new child scope, so per-render
//! state never leaks across renders.
//!
//! The render closure runs under the slot's observer effect: any signal it
//! reads becomes a dependency, and the slot re-renders on the flush after
//! that signal changes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::reactive::context;
use crate::reactive::scope::{self, ScopeId};
use crate::reactive::{collect_disposers, on_dispose, Disposer, Effect};

use super::ops::NodeOps;

struct SlotState<O: NodeOps> {
    ops: Arc<O>,
    container: O::Node,
    /// The slot's own scope; each render's scope is a fresh child of it.
    scope: ScopeId,
    mounted: Option<(O::Node, ScopeId)>,
}

impl<O: NodeOps> SlotState<O> {
    fn unmount(&mut self) -> Result<()> {
        if let Some((node, scope)) = self.mounted.take() {
            scope::dispose(scope, false);
            self.ops.remove(&self.container, &node)?;
        }
        Ok(())
    }

    /// Infallible teardown used when the slot scope is disposed.
    fn teardown(&mut self) {
        if let Some((node, scope)) = self.mounted.take() {
            scope::dispose(scope, false);
            if self.ops.remove(&self.container, &node).is_err() {
                tracing::debug!("backend refused node removal during teardown");
            }
        }
    }
}

/// A reactive single-subtree mount point.
pub struct DynSlot<O: NodeOps + Send + Sync + 'static> {
    state: Arc<Mutex<SlotState<O>>>,
    disposer: Disposer,
}

impl<O: NodeOps + Send + Sync + 'static> DynSlot<O> {
    /// Mount the slot and render once synchronously.
    ///
    /// `render` is re-invoked on the flush after any of its tracked
    /// dependencies change. Its return node is appended to `container`.
    pub fn new(
        ops: Arc<O>,
        container: O::Node,
        render: impl Fn() -> Result<O::Node> + Send + Sync + 'static,
    ) -> Result<Self> {
        let (setup, disposer) = collect_disposers(|| -> Result<Arc<Mutex<SlotState<O>>>> {
            let scope = context::current_scope().expect("collect_disposers sets a scope");

            let state = Arc::new(Mutex::new(SlotState {
                ops,
                container,
                scope,
                mounted: None,
            }));

            {
                let state = Arc::clone(&state);
                on_dispose(move || state.lock().teardown());
            }

            let effect = {
                let state = Arc::clone(&state);
                Effect::observer(move || {
                    let mut slot = state.lock();
                    slot.unmount()?;

                    // A fresh scope per render; the ambient effect stays
                    // current so the render body is tracked.
                    let render_scope = scope::create_child(Some(slot.scope));
                    let built = context::with_scope(Some(render_scope), &render);
                    match built {
                        Ok(node) => {
                            slot.ops.append(&slot.container, &node)?;
                            slot.mounted = Some((node, render_scope));
                            Ok(())
                        }
                        Err(error) => {
                            scope::dispose(render_scope, false);
                            Err(error)
                        }
                    }
                })
            };
            {
                let effect = effect.clone();
                on_dispose(move || effect.dispose());
            }
            effect.run_initial()?;

            Ok(state)
        });

        match setup {
            Ok(state) => Ok(Self { state, disposer }),
            Err(error) => {
                disposer.dispose();
                Err(error)
            }
        }
    }

    /// The currently mounted node, if any.
    pub fn node(&self) -> Option<O::Node> {
        self.state.lock().mounted.as_ref().map(|(node, _)| node.clone())
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted.is_some()
    }

    /// Handle for tying the slot's lifetime to an owner.
    pub fn disposer(&self) -> Disposer {
        self.disposer
    }

    /// Unmount the current subtree and stop re-rendering.
    pub fn dispose(&self) {
        self.disposer.dispose();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{on_dispose, tick, Signal};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

    const CONTAINER: u32 = 0;

    #[derive(Default)]
    struct MockBackend {
        next: AtomicU32,
        children: Mutex<Vec<u32>>,
        labels: Mutex<HashMap<u32, String>>,
    }

    impl MockBackend {
        fn children(&self) -> Vec<String> {
            let labels = self.labels.lock();
            self.children
                .lock()
                .iter()
                .map(|id| labels[id].clone())
                .collect()
        }
    }

    impl NodeOps for MockBackend {
        type Node = u32;

        fn create_fragment(&self, name: &str) -> Result<u32> {
            self.create_text(name)
        }

        fn create_text(&self, value: &str) -> Result<u32> {
            let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            self.labels.lock().insert(id, value.to_string());
            Ok(id)
        }

        fn insert_before(&self, _parent: &u32, node: &u32, anchor: Option<&u32>) -> Result<()> {
            let mut children = self.children.lock();
            children.retain(|child| child != node);
            let position = match anchor {
                Some(anchor) => children
                    .iter()
                    .position(|child| child == anchor)
                    .ok_or_else(|| crate::Error::node_op("anchor is not a child"))?,
                None => children.len(),
            };
            children.insert(position, *node);
            Ok(())
        }

        fn append(&self, _parent: &u32, node: &u32) -> Result<()> {
            let mut children = self.children.lock();
            children.retain(|child| child != node);
            children.push(*node);
            Ok(())
        }

        fn remove(&self, _parent: &u32, node: &u32) -> Result<()> {
            self.children.lock().retain(|child| child != node);
            Ok(())
        }
    }

    #[test]
    fn renders_once_at_construction() {
        let backend = Arc::new(MockBackend::default());
        let render_backend = Arc::clone(&backend);
        let slot = DynSlot::new(Arc::clone(&backend), CONTAINER, move || {
            render_backend.create_text("hello")
        })
        .unwrap();

        assert!(slot.is_mounted());
        assert_eq!(backend.children(), vec!["hello".to_string()]);
    }

    #[test]
    fn rerenders_when_a_dependency_changes() {
        let backend = Arc::new(MockBackend::default());
        let message = Signal::new("one".to_string());

        let render_backend = Arc::clone(&backend);
        let reader = message.clone();
        let _slot = DynSlot::new(Arc::clone(&backend), CONTAINER, move || {
            render_backend.create_text(&reader.get())
        })
        .unwrap();
        assert_eq!(backend.children(), vec!["one".to_string()]);

        message.set("two".to_string());
        tick().unwrap();

        // The previous node is gone; exactly one subtree is mounted.
        assert_eq!(backend.children(), vec!["two".to_string()]);
    }

    #[test]
    fn previous_render_scope_is_disposed_on_rerender() {
        let backend = Arc::new(MockBackend::default());
        let message = Signal::new("one".to_string());
        let disposals = Arc::new(AtomicI32::new(0));

        let render_backend = Arc::clone(&backend);
        let reader = message.clone();
        let counter = Arc::clone(&disposals);
        let slot = DynSlot::new(Arc::clone(&backend), CONTAINER, move || {
            let counter = Arc::clone(&counter);
            on_dispose(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            render_backend.create_text(&reader.get())
        })
        .unwrap();

        message.set("two".to_string());
        tick().unwrap();
        assert_eq!(disposals.load(Ordering::SeqCst), 1);

        slot.dispose();
        assert_eq!(disposals.load(Ordering::SeqCst), 2);
        assert!(!slot.is_mounted());
        assert_eq!(backend.children(), Vec::<String>::new());
    }

    #[test]
    fn equal_write_does_not_rerender() {
        let backend = Arc::new(MockBackend::default());
        let message = Signal::new("same".to_string());
        let renders = Arc::new(AtomicI32::new(0));

        let render_backend = Arc::clone(&backend);
        let reader = message.clone();
        let counter = Arc::clone(&renders);
        let _slot = DynSlot::new(Arc::clone(&backend), CONTAINER, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            render_backend.create_text(&reader.get())
        })
        .unwrap();

        message.set("same".to_string());
        tick().unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disposed_slot_ignores_later_writes() {
        let backend = Arc::new(MockBackend::default());
        let message = Signal::new("one".to_string());

        let render_backend = Arc::clone(&backend);
        let reader = message.clone();
        let slot = DynSlot::new(Arc::clone(&backend), CONTAINER, move || {
            render_backend.create_text(&reader.get())
        })
        .unwrap();

        slot.dispose();
        message.set("two".to_string());
        tick().unwrap();

        assert_eq!(backend.children(), Vec::<String>::new());
    }
}
