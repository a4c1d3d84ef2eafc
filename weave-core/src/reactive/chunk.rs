//! List Chunking
//!
//! A list cell can be split into fixed-size chunk cells. Chunk cells are
//! reused by position across re-slicing and compare their slices element by
//! element, so a change in one part of a long list only notifies the
//! subscribers of the chunk that actually changed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::batch::run_in_mutation_scope;
use super::state::State;
use super::subscriber::Listener;
use crate::compare;
use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::value::{Value, ValueKind};

/// Chunk bookkeeping attached to a list cell.
pub(crate) struct Chunking {
    size: usize,

    /// Raised by the source subscription on every write to the tree.
    stale: Arc<AtomicBool>,

    /// Value the current chunks were sliced from.
    source: Value,

    chunks: Vec<NodeId>,
}

impl State {
    /// Declare the chunk size of a list cell.
    ///
    /// Declaring the current size again keeps the existing chunk cells; a
    /// different size removes them from the store.
    pub fn chunk(&self, size: usize) -> Result<&Self> {
        if size < 2 {
            return Err(Error::InvalidChunkSize { size });
        }

        match self.chunking() {
            Some(chunking) => {
                let mut chunking = chunking.lock();
                if chunking.size != size {
                    chunking.size = size;
                    let discarded = std::mem::take(&mut chunking.chunks);
                    self.store().remove_trees(&discarded);
                    chunking.stale.store(true, Ordering::SeqCst);
                }
            }
            None => {
                let stale = Arc::new(AtomicBool::new(true));
                let flag = Arc::clone(&stale);
                self.subscribe(&Listener::new(move |_| {
                    flag.store(true, Ordering::SeqCst);
                }));
                let chunking = Chunking {
                    size,
                    stale,
                    source: Value::Undefined,
                    chunks: Vec::new(),
                };
                self.store().with_ext_mut(self.id(), |ext| {
                    ext.chunking = Some(Arc::new(Mutex::new(chunking)));
                });
            }
        }
        Ok(self)
    }

    pub fn chunk_size(&self) -> Option<usize> {
        self.chunking().map(|chunking| chunking.lock().size)
    }

    /// Start offset of a chunk cell within its source list.
    pub fn chunk_offset(&self) -> Option<usize> {
        self.store()
            .with_ext(self.id(), |ext| ext.chunk_offset)
            .flatten()
    }

    /// Get the chunk cells, re-slicing first if the list changed.
    ///
    /// Reading chunks is a tracked read of the list cell.
    pub fn chunks(&self) -> Result<Vec<State>> {
        let value = self.get();
        let chunking = self.chunking().ok_or(Error::ChunksUndeclared)?;

        let ids = run_in_mutation_scope(|| {
            let mut chunking = chunking.lock();
            let stale = chunking.stale.swap(false, Ordering::SeqCst);
            if stale || !chunking.source.same(&value) {
                if let Err(error) = self.reslice(&mut chunking, &value) {
                    chunking.stale.store(true, Ordering::SeqCst);
                    return Err(error);
                }
            }
            Ok(chunking.chunks.clone())
        })?;

        Ok(ids
            .into_iter()
            .map(|id| State::from_parts(self.store().clone(), id))
            .collect())
    }

    fn reslice(&self, chunking: &mut Chunking, value: &Value) -> Result<()> {
        let items = value
            .as_list()
            .ok_or_else(|| Error::kind_mismatch(ValueKind::List, value.kind()))?;
        let size = chunking.size;
        let count = items.len().div_ceil(size);

        for (index, slice) in items.chunks(size).enumerate() {
            let offset = index * size;
            let slice = Value::list(slice.iter().cloned());
            let id = match chunking.chunks.get(index) {
                Some(&id) => {
                    State::from_parts(self.store().clone(), id).set(slice);
                    id
                }
                None => {
                    let id = self.store().insert_root(slice, compare::shallow());
                    chunking.chunks.push(id);
                    id
                }
            };
            self.store()
                .with_ext_mut(id, |ext| ext.chunk_offset = Some(offset));
        }
        if chunking.chunks.len() > count {
            let discarded = chunking.chunks.split_off(count);
            self.store().remove_trees(&discarded);
        }
        chunking.source = value.clone();

        tracing::trace!(cell = %self.id(), size, chunks = count, "re-sliced chunks");
        Ok(())
    }

    fn chunking(&self) -> Option<Arc<Mutex<Chunking>>> {
        self.store()
            .with_ext(self.id(), |ext| ext.chunking.clone())
            .flatten()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, Store};
    use crate::reactive::track;
    use std::sync::atomic::AtomicI32;

    fn numbers(len: usize) -> Value {
        Value::list(0..len)
    }

    fn lengths(chunks: &[State]) -> Vec<usize> {
        chunks
            .iter()
            .map(|chunk| chunk.get_untracked().as_list().map_or(0, <[Value]>::len))
            .collect()
    }

    #[test]
    fn invalid_sizes_fail_fast() {
        let store = Store::new();
        let list = store.state(numbers(4));

        assert_eq!(list.chunk(1).err(), Some(Error::InvalidChunkSize { size: 1 }));
        assert_eq!(list.chunk(0).err(), Some(Error::InvalidChunkSize { size: 0 }));
        assert_eq!(list.chunk_size(), None);
        assert_eq!(list.subscriber_count(), 0);
    }

    #[test]
    fn chunks_before_declaring_fail() {
        let store = Store::new();
        let list = store.state(numbers(4));
        assert_eq!(list.chunks().err(), Some(Error::ChunksUndeclared));
    }

    #[test]
    fn splits_into_ceil_len_over_size() {
        let store = Store::new();
        let list = store.state(numbers(7));
        list.chunk(3).unwrap();

        let chunks = list.chunks().unwrap();
        assert_eq!(lengths(&chunks), vec![3, 3, 1]);
        assert_eq!(chunks[2].chunk_offset(), Some(6));
        assert_eq!(chunks[2].get(), Value::list([6]));
    }

    #[test]
    fn unchanged_slices_keep_identity_and_stay_quiet() {
        let store = Store::new();
        let list = store.state(numbers(10));
        list.chunk(5).unwrap();
        let chunks = list.chunks().unwrap();
        let first_before = chunks[0].get_untracked();

        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        chunks[0].subscribe(&Listener::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        list.mutate_cloned(|value| {
            if let Value::List(items) = value {
                Arc::make_mut(items)[7] = Value::from(70);
            }
        });
        let after = list.chunks().unwrap();

        assert_eq!(after, chunks);
        assert!(after[0].get_untracked().same(&first_before));
        assert_eq!(after[1].get_untracked().child("2"), Value::from(70));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn shrinking_drops_trailing_chunks() {
        let store = Store::new();
        let list = store.state(numbers(6));
        list.chunk(2).unwrap();
        let chunks = list.chunks().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(store.node_count(), 4);

        list.set(numbers(3));
        assert_eq!(lengths(&list.chunks().unwrap()), vec![2, 1]);
        assert_eq!(store.node_count(), 3);
        assert_eq!(chunks[2].node_kind(), NodeKind::Root);
        assert!(chunks[2].get_untracked().is_undefined());

        list.set(Value::list(Vec::<Value>::new()));
        assert!(list.chunks().unwrap().is_empty());
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn redeclaring_a_size_rebuilds() {
        let store = Store::new();
        let list = store.state(numbers(8));
        list.chunk(4).unwrap();
        let chunks = list.chunks().unwrap();

        list.chunk(4).unwrap();
        assert_eq!(list.chunks().unwrap(), chunks);
        assert_eq!(list.subscriber_count(), 1);

        chunks[0].prop("0");
        assert_eq!(store.node_count(), 4);

        list.chunk(2).unwrap();
        assert_eq!(store.node_count(), 1);
        let rebuilt = list.chunks().unwrap();
        assert_eq!(rebuilt.len(), 4);
        assert_ne!(rebuilt[0], chunks[0]);
        assert_eq!(store.node_count(), 5);
    }

    #[test]
    fn non_list_value_is_a_kind_mismatch() {
        let store = Store::new();
        let list = store.state("text");
        list.chunk(2).unwrap();

        assert_eq!(
            list.chunks().err(),
            Some(Error::kind_mismatch(ValueKind::List, ValueKind::Text))
        );

        list.set(numbers(2));
        assert_eq!(list.chunks().map(|chunks| chunks.len()), Ok(1));
    }

    #[test]
    fn reading_chunks_is_tracked() {
        let store = Store::new();
        let list = store.state(numbers(4));
        list.chunk(2).unwrap();

        let (_, deps) = track(|| list.chunks());
        assert!(deps.contains(&list));
    }
}
