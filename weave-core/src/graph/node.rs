//! Graph Nodes
//!
//! This module defines the nodes that live in a [`Store`](super::Store).
//! A node is either a root, which owns its value slot and subscriber bus,
//! or a lens, which names a parent node and a key and shares the parent's
//! bus.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::compare::Compare;
use crate::reactive::{Bus, Chunking, Computation};
use crate::value::Value;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Owns a raw value slot and a subscriber bus.
    Root,

    /// Reads `parent[key]` on every access and writes by copy-on-write
    /// through the parent.
    Lens,
}

pub(crate) enum Slot {
    Root(Value),
    Lens { parent: NodeId, key: Arc<str> },
}

/// Optional per-node state attached by the higher level features.
#[derive(Default)]
pub(crate) struct Extensions {
    pub computation: Option<Arc<Computation>>,
    pub chunking: Option<Arc<Mutex<Chunking>>>,
    pub chunk_offset: Option<usize>,
    pub async_aware: bool,
    pub async_token: Arc<AtomicU64>,
}

/// A node in the graph.
pub(crate) struct Node {
    id: NodeId,

    /// The root this node ultimately reads from. A root is its own root.
    root: NodeId,

    slot: Slot,

    /// Shared by a root and every lens derived from it.
    bus: Arc<Bus>,

    compare: Compare,

    pub(crate) ext: Extensions,
}

impl Node {
    /// Create a root node owning `value`.
    pub fn root(value: Value, compare: Compare) -> Self {
        let id = NodeId::new();
        Self {
            id,
            root: id,
            slot: Slot::Root(value),
            bus: Arc::new(Bus::default()),
            compare,
            ext: Extensions::default(),
        }
    }

    /// Create a lens node reading `key` out of `parent`.
    pub fn lens(parent: &Node, key: Arc<str>, compare: Compare) -> Self {
        Self {
            id: NodeId::new(),
            root: parent.root,
            slot: Slot::Lens {
                parent: parent.id,
                key,
            },
            bus: Arc::clone(&parent.bus),
            compare,
            ext: Extensions::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self) -> NodeKind {
        match self.slot {
            Slot::Root(_) => NodeKind::Root,
            Slot::Lens { .. } => NodeKind::Lens,
        }
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut Slot {
        &mut self.slot
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn compare(&self) -> &Compare {
        &self.compare
    }
}
