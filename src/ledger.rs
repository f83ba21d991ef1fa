use std::collections::{BTreeSet, HashMap};

use anyhow::anyhow;

use crate::chunk::Chunk;

/// Stable handle of a chunk in the [Ledger]. Never reused within a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct ChunkId(u64);

/// The ordered run of chunks covering every record seen so far.
///
/// Chunks are owned by an arena keyed by [ChunkId]; `order` holds the ids in ascending range
/// order, so inserting around or removing a chunk is a splice of `order`.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    chunks: HashMap<ChunkId, Chunk>,
    order: Vec<ChunkId>,
    next_id: u64,
    touched: BTreeSet<ChunkId>,
    touched_pending: usize,
}

impl Ledger {
    pub(crate) fn new() -> Ledger {
        Ledger::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn ids(&self) -> &[ChunkId] {
        &self.order
    }

    pub(crate) fn chunk(&self, id: ChunkId) -> Result<&Chunk, anyhow::Error> {
        self.chunks.get(&id).ok_or_else(|| anyhow!("no chunk {:?} in ledger", id))
    }

    pub(crate) fn chunk_mut(&mut self, id: ChunkId) -> Result<&mut Chunk, anyhow::Error> {
        self.chunks.get_mut(&id).ok_or_else(|| anyhow!("no chunk {:?} in ledger", id))
    }

    /// Chunks in range order. Chunks taken out with [Ledger::take] are skipped.
    pub(crate) fn iter(&self) -> impl Iterator<Item=&Chunk> {
        self.order.iter().filter_map(|id| self.chunks.get(id))
    }

    pub(crate) fn position(&self, id: ChunkId) -> Result<usize, anyhow::Error> {
        self.order.iter()
            .position(|current| *current == id)
            .ok_or_else(|| anyhow!("no chunk {:?} in ledger order", id))
    }

    fn allocate(&mut self, chunk: Chunk) -> ChunkId {
        let id = ChunkId(self.next_id);
        self.next_id += 1;
        self.chunks.insert(id, chunk);
        id
    }

    pub(crate) fn push_back(&mut self, chunk: Chunk) -> ChunkId {
        let id = self.allocate(chunk);
        self.order.push(id);
        id
    }

    /// Move a chunk out of the arena for exclusive processing. Its place in the order is kept
    /// until it is either put back or spliced out.
    pub(crate) fn take(&mut self, id: ChunkId) -> Result<Chunk, anyhow::Error> {
        self.chunks.remove(&id).ok_or_else(|| anyhow!("no chunk {:?} in ledger", id))
    }

    pub(crate) fn put(&mut self, id: ChunkId, chunk: Chunk) {
        self.chunks.insert(id, chunk);
    }

    /// Replace `count` adjacent chunks starting at `position` with `lower` followed by `upper`.
    ///
    /// Returns the ids of the new chunks and the replaced chunks still held by the arena, so the
    /// caller can delete their files.
    pub(crate) fn splice(
        &mut self,
        position: usize,
        count: usize,
        lower: Chunk,
        upper: Chunk,
    ) -> Result<((ChunkId, ChunkId), Vec<Chunk>), anyhow::Error> {
        if count == 0 || position + count > self.order.len() {
            return Err(
                anyhow!(
                    "invalid splice of {} chunks at {}, ledger length: {}",
                    count,
                    position,
                    self.order.len()
                )
            );
        }
        let lower_id = self.allocate(lower);
        let upper_id = self.allocate(upper);
        let removed: Vec<ChunkId> = self.order
            .splice(position..position + count, [lower_id, upper_id])
            .collect();
        let replaced: Vec<Chunk> = removed.iter()
            .filter_map(|id| self.chunks.remove(id))
            .collect();
        Ok(((lower_id, upper_id), replaced))
    }

    pub(crate) fn touch(&mut self, id: ChunkId) {
        self.touched.insert(id);
        self.touched_pending += 1;
    }

    pub(crate) fn touched(&self) -> Vec<ChunkId> {
        self.touched.iter().cloned().collect()
    }

    /// Records waiting in the pending buffers of touched chunks
    pub(crate) fn touched_pending(&self) -> usize {
        self.touched_pending
    }

    pub(crate) fn clear_touched(&mut self) {
        self.touched.clear();
        self.touched_pending = 0;
    }

    pub(crate) fn records(&self) -> usize {
        self.iter().map(|chunk| chunk.len()).sum()
    }
}
