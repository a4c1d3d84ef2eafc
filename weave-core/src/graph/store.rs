//! Cell Store
//!
//! The store is the arena that owns every node of a graph. Cells are cheap
//! handles (`Store` + [`NodeId`]); lens nodes refer to their parent by id,
//! so the graph never contains pointer cycles.
//!
//! # Locking
//!
//! Node data sits behind one `RwLock`. The lock is only ever held for pure
//! data work (resolving a lens chain, rewriting a slot). Comparators,
//! listeners and derivations are always invoked after it is released, so
//! user code may freely read and write other cells.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::node::{Extensions, Node, NodeId, NodeKind, Slot};
use crate::compare::{self, Compare};
use crate::reactive::{Bus, State, StateOptions};
use crate::value::Value;

pub(crate) struct StoreInner {
    /// All nodes in the graph, indexed by ID.
    nodes: RwLock<HashMap<NodeId, Node>>,

    /// Memoized lens nodes keyed by (parent, key).
    lenses: DashMap<(NodeId, Arc<str>), NodeId>,
}

/// Owner of a graph of cells.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

static GLOBAL: OnceLock<Store> = OnceLock::new();

impl Store {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                nodes: RwLock::new(HashMap::new()),
                lenses: DashMap::new(),
            }),
        }
    }

    /// The process-wide store behind [`State::new`].
    pub fn global() -> &'static Store {
        GLOBAL.get_or_init(Store::new)
    }

    /// Create a root cell holding `value`.
    pub fn state(&self, value: impl Into<Value>) -> State {
        self.state_with(value, StateOptions::default())
    }

    /// Create a root cell with explicit options.
    pub fn state_with(&self, value: impl Into<Value>, options: StateOptions) -> State {
        let compare = options.into_compare().unwrap_or_else(compare::identity);
        let id = self.insert_root(value.into(), compare);
        State::from_parts(self.clone(), id)
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().len()
    }

    /// Whether two handles refer to the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn insert_root(&self, value: Value, compare: Compare) -> NodeId {
        let node = Node::root(value, compare);
        let id = node.id();
        self.inner.nodes.write().insert(id, node);
        id
    }

    /// Get or create the lens node for `parent[key]`.
    ///
    /// The same (parent, key) pair always yields the same node.
    pub(crate) fn lens(&self, parent: NodeId, key: &str) -> NodeId {
        match self.inner.lenses.entry((parent, Arc::from(key))) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let key = Arc::clone(&entry.key().1);
                let mut nodes = self.inner.nodes.write();
                let node = match nodes.get(&parent) {
                    Some(parent) => Node::lens(parent, key, compare::identity()),
                    // Unreachable while a handle keeps the store alive; a
                    // detached root keeps lookups total.
                    None => Node::root(Value::Undefined, compare::identity()),
                };
                let id = node.id();
                nodes.insert(id, node);
                entry.insert(id);
                id
            }
        }
    }

    /// Drop each root in `roots` together with every lens derived from it.
    pub(crate) fn remove_trees(&self, roots: &[NodeId]) {
        if roots.is_empty() {
            return;
        }
        let removed: HashSet<NodeId> = {
            let mut nodes = self.inner.nodes.write();
            let doomed: HashSet<NodeId> = nodes
                .values()
                .filter(|node| roots.contains(&node.root_id()))
                .map(Node::id)
                .collect();
            nodes.retain(|id, _| !doomed.contains(id));
            doomed
        };
        self.inner
            .lenses
            .retain(|(parent, _), _| !removed.contains(parent));
        tracing::trace!(nodes = removed.len(), "removed cell trees");
    }

    pub(crate) fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.inner.nodes.read().get(&id).map(Node::kind)
    }

    pub(crate) fn root_of(&self, id: NodeId) -> NodeId {
        self.inner
            .nodes
            .read()
            .get(&id)
            .map(Node::root_id)
            .unwrap_or(id)
    }

    /// Resolve the effective value of a node.
    pub(crate) fn read(&self, id: NodeId) -> Value {
        resolve(&self.inner.nodes.read(), id)
    }

    /// Everything a write needs, captured under one read lock.
    pub(crate) fn write_context(&self, id: NodeId) -> Option<(Value, Compare, Arc<Bus>)> {
        let nodes = self.inner.nodes.read();
        let node = nodes.get(&id)?;
        Some((
            resolve(&nodes, id),
            Arc::clone(node.compare()),
            Arc::clone(node.bus()),
        ))
    }

    /// Store `value` at `id`, copying each parent on the way to the root.
    pub(crate) fn write(&self, id: NodeId, value: Value) {
        write_through(&mut self.inner.nodes.write(), id, value);
    }

    pub(crate) fn bus(&self, id: NodeId) -> Option<Arc<Bus>> {
        self.inner.nodes.read().get(&id).map(|node| Arc::clone(node.bus()))
    }

    /// The raw slot of the root owning `id`.
    pub(crate) fn raw_root(&self, id: NodeId) -> Value {
        let nodes = self.inner.nodes.read();
        let root = nodes.get(&id).map(Node::root_id).unwrap_or(id);
        match nodes.get(&root).map(Node::slot) {
            Some(Slot::Root(value)) => value.clone(),
            _ => Value::Undefined,
        }
    }

    /// Overwrite the raw slot of the root owning `id` without comparing.
    pub(crate) fn set_raw_root(&self, id: NodeId, value: Value) {
        let mut nodes = self.inner.nodes.write();
        let root = nodes.get(&id).map(Node::root_id).unwrap_or(id);
        if let Some(Slot::Root(slot)) = nodes.get_mut(&root).map(Node::slot_mut) {
            *slot = value;
        }
    }

    pub(crate) fn with_ext<R>(&self, id: NodeId, f: impl FnOnce(&Extensions) -> R) -> Option<R> {
        self.inner.nodes.read().get(&id).map(|node| f(&node.ext))
    }

    pub(crate) fn with_ext_mut<R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&mut Extensions) -> R,
    ) -> Option<R> {
        self.inner
            .nodes
            .write()
            .get_mut(&id)
            .map(|node| f(&mut node.ext))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("node_count", &self.node_count())
            .finish()
    }
}

fn resolve(nodes: &HashMap<NodeId, Node>, id: NodeId) -> Value {
    match nodes.get(&id).map(Node::slot) {
        Some(Slot::Root(value)) => value.clone(),
        Some(Slot::Lens { parent, key }) => resolve(nodes, *parent).child(key),
        None => Value::Undefined,
    }
}

fn write_through(nodes: &mut HashMap<NodeId, Node>, mut id: NodeId, mut value: Value) {
    loop {
        let (parent, key) = match nodes.get(&id).map(Node::slot) {
            Some(Slot::Root(_)) => break,
            Some(Slot::Lens { parent, key }) => (*parent, Arc::clone(key)),
            None => return,
        };
        value = resolve(nodes, parent).with_child(&key, value);
        id = parent;
    }

    if let Some(Slot::Root(slot)) = nodes.get_mut(&id).map(Node::slot_mut) {
        *slot = value;
    }
}
