//! Cell Graph
//!
//! This module implements the arena that holds every cell of a reactive
//! graph.
//!
//! # Overview
//!
//! - A root node owns its value and a subscriber bus.
//! - A lens node reads `parent[key]` and owns nothing but the reference to
//!   its parent. All lenses of one root share the root's bus, so a write
//!   anywhere in the tree reaches every listener registered in that tree.
//!
//! # Design Decisions
//!
//! 1. Nodes are addressed by [`NodeId`] inside a [`Store`] rather than by
//!    pointer, so lens chains never form reference cycles.
//!
//! 2. Lens values are never cached. Every read walks the chain from the root
//!    so a lens is always consistent with its root.
//!
//! 3. A lens write shallow-copies each container on the way up and stores
//!    the new tree in the root slot. Nothing outside that path is copied.

mod node;
mod store;

pub use node::{NodeId, NodeKind};
pub use store::Store;

pub(crate) use store::StoreInner;
