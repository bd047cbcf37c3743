//! Keyed List Reconciler
//!
//! An observer effect that diffs an ordered key sequence against its
//! previous run and emits the minimal set of node create/insert/remove
//! operations against an injected [`NodeOps`] capability, while preserving
//! live per-item state.
//!
//! # Algorithm
//!
//! Given the previous key order `old` and the freshly computed,
//! de-duplicated key order `new`:
//!
//! 1. `new` empty: dispose every entry, clear, done.
//! 2. When no old key survives, dispose everything and append every new
//!    key fresh, skipping the chunk walk entirely.
//! 3. Otherwise dispose and remove each obsolete key's entry in place.
//! 4. Keys present only in `new` are *fresh*: genuinely new entries that
//!    may appear at any position.
//! 5. Walk `old` and `new` simultaneously. In-place matches consume both
//!    sides; fresh keys are created and inserted immediately, anchored
//!    before the current unconsumed old key's node. Anything else opens a
//!    *back chunk* (surviving old keys whose slot a later key needs) paired
//!    with a *front chunk* (a consecutive run of matches, with fresh keys
//!    inlined).
//! 6. Move whichever chunk is shorter: a front chunk no longer than its
//!    back chunk has its matched nodes inserted before the back chunk's
//!    head (the back chunk folds into the next back chunk); otherwise the
//!    back chunk's nodes relocate past the front run, or to the end of the
//!    container when nothing follows.
//! 7. Any new-sequence tail beyond the last consumed old key is appended.
//! 8. With index tracking enabled, a final pass writes each entry's
//!    settled position into its index signal.
//!
//! This is a heuristic minimal-move strategy: it never recreates node
//! identity for a surviving key and always moves the cheaper of two
//! competing chunks, but it does not guarantee the theoretical minimum
//! move count for every permutation.
//!
//! # Failure
//!
//! A template or node-operation error aborts the enclosing flush pass.
//! Entries already migrated in that pass remain migrated; there is no
//! rollback.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

use crate::error::Result;
use crate::reactive::context;
use crate::reactive::scope::{self, ScopeId};
use crate::reactive::{collect_disposers, on_dispose, Disposer, Effect, Signal};

use super::ops::NodeOps;

struct ItemEntry<O: NodeOps> {
    node: O::Node,
    scope: ScopeId,
    index: Option<Signal<usize>>,
}

struct ListState<O: NodeOps, T, K> {
    ops: Arc<O>,
    container: O::Node,
    key_fn: Box<dyn Fn(&T) -> K + Send + Sync>,
    template: Box<dyn Fn(&T, Option<Signal<usize>>) -> Result<O::Node> + Send + Sync>,
    track_index: bool,
    /// The list's own scope; entry scopes are its children.
    scope: ScopeId,
    /// Live entries in settled order. Exactly one entry per live key.
    entries: IndexMap<K, ItemEntry<O>>,
}

/// A reconciling view over a `Signal<Vec<T>>`.
///
/// The view owns one node, one disposer scope, and optionally one
/// position-index signal per entry, releasing them to the backend only
/// through explicit remove calls. Entries are created lazily on first
/// appearance of their key and destroyed exactly once when the key
/// disappears or the sequence is cleared.
pub struct KeyedList<O, T, K>
where
    O: NodeOps + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    state: Arc<Mutex<ListState<O, T, K>>>,
    disposer: Disposer,
}

impl<O, T, K> KeyedList<O, T, K>
where
    O: NodeOps + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Build the reconciling effect and populate the container from the
    /// source's current value.
    ///
    /// The template is invoked as `(item, index_signal)` inside the
    /// entry's own scope; it must be referentially reusable across keys.
    /// With `track_index` disabled the index argument is always `None`.
    pub fn new(
        ops: Arc<O>,
        container: O::Node,
        source: Signal<Vec<T>>,
        key_fn: impl Fn(&T) -> K + Send + Sync + 'static,
        template: impl Fn(&T, Option<Signal<usize>>) -> Result<O::Node> + Send + Sync + 'static,
        track_index: bool,
    ) -> Result<Self> {
        let (setup, disposer) = collect_disposers(|| -> Result<Arc<Mutex<ListState<O, T, K>>>> {
            let scope = context::current_scope().expect("collect_disposers sets a scope");

            let state = Arc::new(Mutex::new(ListState {
                ops,
                container,
                key_fn: Box::new(key_fn),
                template: Box::new(template),
                track_index,
                scope,
                entries: IndexMap::new(),
            }));

            // Registered before the effect so remaining entries are torn
            // down first when the list scope dies.
            {
                let state = Arc::clone(&state);
                on_dispose(move || state.lock().teardown());
            }

            let effect = {
                let state = Arc::clone(&state);
                let source = source.clone();
                Effect::observer(move || {
                    let items = source.get();
                    state.lock().reconcile(&items)
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

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle for tying the list's lifetime to an owner.
    pub fn disposer(&self) -> Disposer {
        self.disposer
    }

    /// Dispose every entry and stop reconciling.
    pub fn dispose(&self) {
        self.disposer.dispose();
    }
}

impl<O: NodeOps, T, K> ListState<O, T, K>
where
    K: Eq + Hash + Clone,
{
    fn reconcile(&mut self, items: &[T]) -> Result<()> {
        // De-duplicate while preserving order.
        let mut new_keys: IndexSet<K> = IndexSet::with_capacity(items.len());
        let mut new_items: Vec<&T> = Vec::with_capacity(items.len());
        for item in items {
            let key = (self.key_fn)(item);
            if new_keys.insert(key) {
                new_items.push(item);
            }
        }

        // Step 1: terminal fast path back to empty.
        if new_keys.is_empty() {
            if !self.entries.is_empty() {
                tracing::trace!(removed = self.entries.len(), "clearing keyed list");
                let entries: Vec<(K, ItemEntry<O>)> = self.entries.drain(..).collect();
                for (_, entry) in entries {
                    self.destroy_entry(entry)?;
                }
            }
            return Ok(());
        }

        let old: Vec<K> = self.entries.keys().cloned().collect();
        let obsolete: Vec<K> = old
            .iter()
            .filter(|key| !new_keys.contains(*key))
            .cloned()
            .collect();

        // Step 2: nothing survives, so rebuild without the chunk walk.
        if !old.is_empty() && obsolete.len() == old.len() {
            tracing::trace!(removed = old.len(), created = new_keys.len(), "replacing keyed list");
            let entries: Vec<(K, ItemEntry<O>)> = self.entries.drain(..).collect();
            for (_, entry) in entries {
                self.destroy_entry(entry)?;
            }
            for (position, key) in new_keys.iter().enumerate() {
                let entry = self.create_entry(new_items[position])?;
                self.ops.append(&self.container, &entry.node)?;
                self.entries.insert(key.clone(), entry);
            }
            self.settle_indices(&new_keys);
            return Ok(());
        }

        // Step 3: drop obsolete entries in place.
        for key in &obsolete {
            if let Some(entry) = self.entries.shift_remove(key) {
                self.destroy_entry(entry)?;
            }
        }

        let mut old: Vec<K> = self.entries.keys().cloned().collect();
        // Step 4: keys with no surviving entry.
        let fresh: HashSet<K> = new_keys
            .iter()
            .filter(|key| !self.entries.contains_key(*key))
            .cloned()
            .collect();

        // Steps 5 and 6: chunk walk.
        let mut i = 0;
        let mut j = 0;
        while i < old.len() && j < new_keys.len() {
            if old[i] == new_keys[j] {
                i += 1;
                j += 1;
                continue;
            }

            if fresh.contains(&new_keys[j]) {
                let anchor = self.node_of(&old[i]);
                let entry = self.create_entry(new_items[j])?;
                self.ops
                    .insert_before(&self.container, &entry.node, Some(&anchor))?;
                self.entries.insert(new_keys[j].clone(), entry);
                j += 1;
                continue;
            }

            // Back chunk: old[i..m], displaced because new_keys[j] needs
            // old[i]'s slot. The key is a survivor, so it must be ahead.
            let mut m = i + 1;
            while m < old.len() && old[m] != new_keys[j] {
                m += 1;
            }
            debug_assert!(m < old.len(), "surviving key must appear in the old order");

            // Paired front chunk: consecutive matches plus inlined fresh
            // keys, starting at new_keys[j] == old[m].
            let mut front_len = 0;
            let mut front_matched = 0;
            let mut jj = j;
            let mut mm = m;
            while jj < new_keys.len() {
                if mm < old.len() && new_keys[jj] == old[mm] {
                    front_matched += 1;
                    front_len += 1;
                    mm += 1;
                    jj += 1;
                } else if fresh.contains(&new_keys[jj]) {
                    front_len += 1;
                    jj += 1;
                } else {
                    break;
                }
            }

            let back_len = m - i;
            if front_len <= back_len {
                // Insert the front chunk's matched nodes before the back
                // chunk's head; the back chunk folds into the next one.
                tracing::trace!(moved = front_matched, "relocating front chunk");
                let anchor = self.node_of(&old[i]);
                for key in &old[m..m + front_matched] {
                    let node = self.node_of(key);
                    self.ops
                        .insert_before(&self.container, &node, Some(&anchor))?;
                }
                let moved: Vec<K> = old.drain(m..m + front_matched).collect();
                old.splice(i..i, moved);
            } else {
                // Relocate the back chunk past the front run, or append it
                // when no old key follows.
                tracing::trace!(moved = back_len, "relocating back chunk");
                let after = m + front_matched;
                let anchor = (after < old.len()).then(|| self.node_of(&old[after]));
                for key in &old[i..m] {
                    let node = self.node_of(key);
                    match &anchor {
                        Some(anchor) => {
                            self.ops
                                .insert_before(&self.container, &node, Some(anchor))?
                        }
                        None => self.ops.append(&self.container, &node)?,
                    }
                }
                let moved: Vec<K> = old.drain(i..m).collect();
                let at = i + front_matched;
                old.splice(at..at, moved);
            }
            // Neither pointer advances here: the loop re-examines the
            // reordered run and consumes it as plain matches and fresh
            // insertions with correct anchors.
        }

        debug_assert_eq!(i, old.len());

        // Step 7: the remaining tail is entirely fresh.
        while j < new_keys.len() {
            let entry = self.create_entry(new_items[j])?;
            self.ops.append(&self.container, &entry.node)?;
            self.entries.insert(new_keys[j].clone(), entry);
            j += 1;
        }

        // Rebuild the entry map in settled order.
        let mut reordered = IndexMap::with_capacity(new_keys.len());
        for key in &new_keys {
            if let Some(entry) = self.entries.swap_remove(key) {
                reordered.insert(key.clone(), entry);
            }
        }
        debug_assert!(self.entries.is_empty());
        self.entries = reordered;

        // Step 8.
        self.settle_indices(&new_keys);
        Ok(())
    }

    fn create_entry(&self, item: &T) -> Result<ItemEntry<O>> {
        let index = self.track_index.then(|| Signal::new(0usize));
        let scope = scope::create_child(Some(self.scope));
        let built =
            context::with_context(None, Some(scope), || (self.template)(item, index.clone()));
        match built {
            Ok(node) => Ok(ItemEntry { node, scope, index }),
            Err(error) => {
                scope::dispose(scope, false);
                Err(error)
            }
        }
    }

    fn destroy_entry(&self, entry: ItemEntry<O>) -> Result<()> {
        scope::dispose(entry.scope, false);
        self.ops.remove(&self.container, &entry.node)
    }

    fn node_of(&self, key: &K) -> O::Node {
        self.entries
            .get(key)
            .expect("live key has an entry")
            .node
            .clone()
    }

    fn settle_indices(&self, keys: &IndexSet<K>) {
        if !self.track_index {
            return;
        }
        for (position, key) in keys.iter().enumerate() {
            if let Some(index) = self.entries.get(key).and_then(|entry| entry.index.as_ref()) {
                index.set(position);
            }
        }
    }

    /// Infallible teardown used when the list scope is disposed.
    fn teardown(&mut self) {
        let entries: Vec<(K, ItemEntry<O>)> = self.entries.drain(..).collect();
        for (_, entry) in entries {
            scope::dispose(entry.scope, false);
            if self.ops.remove(&self.container, &entry.node).is_err() {
                tracing::debug!("backend refused node removal during teardown");
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
