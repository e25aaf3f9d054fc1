//! # Chunk Pool
//!
//! A block-based allocator that recycles `Chunk` records under continuous
//! load/unload churn.
//!
//! ## Layout
//!
//! Slots are allocated in blocks of `block_size` (64 by default). Every slot is
//! a tagged value: either `Occupied` by a live chunk or `Free`, in which case it
//! stores the id of the next free slot. The free slots of all blocks form one
//! singly linked free list threaded through those ids.
//!
//! When the last live chunk of a block is released, the block's slots are
//! unlinked from the free list and the whole block is dropped. Its index is
//! kept for reuse by the next block allocation.
//!
//! ## Handles
//!
//! Chunks are addressed by [`ChunkHandle`], never by reference. A handle pairs
//! a slot id with the generation number stamped on the chunk when it was
//! acquired. Generations are unique for the pool's lifetime, so a handle to a
//! released chunk never resolves, even after its slot (or its whole block
//! index) has been reused by another chunk.

use log::{debug, error, info};

use super::{Chunk, ChunkKey};
use crate::core::EngineError;
use crate::engine_state::rendering::MeshHandle;

/// The default number of chunk slots per pool block.
pub const CHUNK_POOL_BLOCK_SIZE: usize = 64;

/// Address of a slot: the block it lives in and its index within that block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    /// Index of the block in the pool
    pub block: usize,
    /// Index of the slot within its block
    pub index: usize,
}

/// Generation-tagged reference to a live chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    slot: SlotId,
    generation: u64,
}

impl ChunkHandle {
    /// The slot the chunk was acquired into.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// The generation stamped on the chunk at acquire time.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

enum Slot {
    Occupied { generation: u64, chunk: Chunk },
    Free { next_free: Option<SlotId> },
}

struct PoolBlock {
    slots: Vec<Slot>,
    usage_count: usize,
}

/// Block-based allocator for chunk records.
pub struct ChunkPool {
    /// Block storage. `None` marks a block index that was freed and can be reused.
    blocks: Vec<Option<PoolBlock>>,
    /// Head of the free list.
    free_head: Option<SlotId>,
    vacant_block_indices: Vec<usize>,
    block_size: usize,
    max_blocks: Option<usize>,
    next_generation: u64,
}

impl ChunkPool {
    /// Creates an empty pool. No block is allocated until the first acquire.
    ///
    /// # Arguments
    /// * `block_size` - Slots per block (clamped to at least 1)
    /// * `max_blocks` - Optional cap on live blocks; `None` means unbounded
    pub fn new(block_size: usize, max_blocks: Option<usize>) -> Self {
        ChunkPool {
            blocks: Vec::new(),
            free_head: None,
            vacant_block_indices: Vec::new(),
            block_size: block_size.max(1),
            max_blocks,
            next_generation: 1,
        }
    }

    /// Takes a fresh, all-air, idle chunk positioned at `position`.
    ///
    /// Allocates a new block and links all its slots onto the free list if the
    /// list is empty.
    ///
    /// # Errors
    /// `PoolAllocation` if the block's memory could not be reserved, or
    /// `PoolExhausted` if the block cap has been reached. Both are logged.
    pub fn acquire(&mut self, position: ChunkKey) -> Result<ChunkHandle, EngineError> {
        if self.free_head.is_none() {
            self.allocate_block()?;
        }
        let Some(slot_id) = self.free_head else {
            // allocate_block always links at least one slot
            return Err(EngineError::PoolAllocation {
                block_size: self.block_size,
            });
        };

        let generation = self.next_generation;
        self.next_generation += 1;

        let block_size = self.block_size;
        let Some(block) = self.blocks.get_mut(slot_id.block).and_then(Option::as_mut) else {
            error!("Free list points into freed block {}", slot_id.block);
            self.free_head = None;
            return Err(EngineError::PoolAllocation { block_size });
        };
        let next_free = match block.slots.get(slot_id.index) {
            Some(Slot::Free { next_free }) => *next_free,
            _ => {
                error!("Free list points at a live slot {:?}", slot_id);
                self.free_head = None;
                return Err(EngineError::PoolAllocation { block_size });
            }
        };
        block.slots[slot_id.index] = Slot::Occupied {
            generation,
            chunk: Chunk::new(position),
        };
        block.usage_count += 1;
        self.free_head = next_free;

        Ok(ChunkHandle {
            slot: slot_id,
            generation,
        })
    }

    /// Returns a chunk to the pool.
    ///
    /// The chunk's voxel buffer is dropped and its position reset by virtue of
    /// the slot becoming `Free`. The slot is pushed on the free list and the
    /// block's usage count decremented. A block whose usage reaches zero is
    /// freed entirely, siblings included.
    ///
    /// # Returns
    /// The chunk's renderable handle, if it had one. The pool can't talk to the
    /// GPU, so the caller (always the main thread) must release it.
    /// `None` is also returned for a stale handle, which is otherwise ignored.
    pub fn release(&mut self, handle: ChunkHandle) -> Option<MeshHandle> {
        if self.get(handle).is_none() {
            debug!("Ignoring release of stale chunk handle {:?}", handle);
            return None;
        }
        let slot_id = handle.slot;
        let block = self.blocks[slot_id.block].as_mut()?;

        let previous = std::mem::replace(
            &mut block.slots[slot_id.index],
            Slot::Free {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(slot_id);
        block.usage_count -= 1;
        let block_empty = block.usage_count == 0;

        let mesh = match previous {
            Slot::Occupied { chunk, .. } => chunk.mesh,
            Slot::Free { .. } => None,
        };

        if block_empty {
            self.free_block(slot_id.block);
        }

        mesh
    }

    /// Resolves a handle to its chunk, if it is still live.
    pub fn get(&self, handle: ChunkHandle) -> Option<&Chunk> {
        let block = self.blocks.get(handle.slot.block)?.as_ref()?;
        match block.slots.get(handle.slot.index)? {
            Slot::Occupied { generation, chunk } if *generation == handle.generation => Some(chunk),
            _ => None,
        }
    }

    /// Mutable variant of [`ChunkPool::get`].
    pub fn get_mut(&mut self, handle: ChunkHandle) -> Option<&mut Chunk> {
        let block = self.blocks.get_mut(handle.slot.block)?.as_mut()?;
        match block.slots.get_mut(handle.slot.index)? {
            Slot::Occupied { generation, chunk } if *generation == handle.generation => Some(chunk),
            _ => None,
        }
    }

    /// Iterates the free list from its head.
    pub fn free_slots(&self) -> FreeSlots<'_> {
        FreeSlots {
            pool: self,
            next: self.free_head,
        }
    }

    /// Number of live blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.iter().filter(|block| block.is_some()).count()
    }

    /// Number of acquired chunks across all blocks.
    pub fn live_count(&self) -> usize {
        self.blocks
            .iter()
            .flatten()
            .map(|block| block.usage_count)
            .sum()
    }

    /// Slots per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Frees every block unconditionally.
    ///
    /// No per-chunk release logic runs; any mesh handles still held by live
    /// chunks are dropped with them. Meant for teardown only.
    pub fn shutdown(&mut self) {
        info!(
            "Shutting down chunk pool ({} blocks, {} live chunks)",
            self.block_count(),
            self.live_count()
        );
        self.blocks.clear();
        self.vacant_block_indices.clear();
        self.free_head = None;
    }

    fn allocate_block(&mut self) -> Result<(), EngineError> {
        if let Some(max_blocks) = self.max_blocks {
            if self.block_count() >= max_blocks {
                error!("Chunk pool reached its cap of {} blocks", max_blocks);
                return Err(EngineError::PoolExhausted { max_blocks });
            }
        }

        let mut slots = Vec::new();
        if slots.try_reserve_exact(self.block_size).is_err() {
            error!("Failed to allocate chunk pool block of {} slots", self.block_size);
            return Err(EngineError::PoolAllocation {
                block_size: self.block_size,
            });
        }

        let block_index = match self.vacant_block_indices.pop() {
            Some(index) => index,
            None => {
                self.blocks.push(None);
                self.blocks.len() - 1
            }
        };

        // Thread every new slot onto the front of the free list.
        for index in 0..self.block_size {
            slots.push(Slot::Free {
                next_free: self.free_head,
            });
            self.free_head = Some(SlotId {
                block: block_index,
                index,
            });
        }

        self.blocks[block_index] = Some(PoolBlock {
            slots,
            usage_count: 0,
        });
        debug!("Allocated chunk pool block {}", block_index);
        Ok(())
    }

    fn free_block(&mut self, block_index: usize) {
        self.unlink_block_from_free_list(block_index);
        self.blocks[block_index] = None;
        self.vacant_block_indices.push(block_index);
        debug!("Freed chunk pool block {}", block_index);
    }

    /// Removes every slot of `block_index` from the free list, preserving the
    /// order of the remaining entries.
    fn unlink_block_from_free_list(&mut self, block_index: usize) {
        let mut kept = Vec::new();
        let mut cursor = self.free_head;
        while let Some(slot_id) = cursor {
            cursor = self.next_free(slot_id);
            if slot_id.block != block_index {
                kept.push(slot_id);
            }
        }

        self.free_head = None;
        for slot_id in kept.into_iter().rev() {
            let head = self.free_head;
            if let Some(Slot::Free { next_free }) = self.slot_mut(slot_id) {
                *next_free = head;
            }
            self.free_head = Some(slot_id);
        }
    }

    fn next_free(&self, slot_id: SlotId) -> Option<SlotId> {
        let block = self.blocks.get(slot_id.block)?.as_ref()?;
        match block.slots.get(slot_id.index)? {
            Slot::Free { next_free } => *next_free,
            Slot::Occupied { .. } => None,
        }
    }

    fn slot_mut(&mut self, slot_id: SlotId) -> Option<&mut Slot> {
        self.blocks
            .get_mut(slot_id.block)?
            .as_mut()?
            .slots
            .get_mut(slot_id.index)
    }
}

impl Default for ChunkPool {
    fn default() -> Self {
        ChunkPool::new(CHUNK_POOL_BLOCK_SIZE, None)
    }
}

/// Iterator over the pool's free list.
pub struct FreeSlots<'a> {
    pool: &'a ChunkPool,
    next: Option<SlotId>,
}

impl Iterator for FreeSlots<'_> {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        let current = self.next?;
        self.next = self.pool.next_free(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::LocalPos;
    use crate::engine_state::voxels::voxel::VoxelType;

    #[test]
    fn acquire_allocates_a_block_lazily() {
        let mut pool = ChunkPool::new(4, None);
        assert_eq!(pool.block_count(), 0);

        let handle = pool.acquire(ChunkKey::new(1, 2, 3)).unwrap();
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.live_count(), 1);
        assert_eq!(pool.free_slots().count(), 3);

        let chunk = pool.get(handle).unwrap();
        assert_eq!(chunk.position, ChunkKey::new(1, 2, 3));
        assert!(!chunk.has_voxels());
        assert!(chunk.mesh.is_none());
        assert!(!chunk.needs_meshing);
    }

    #[test]
    fn a_full_block_triggers_a_second_block() {
        let mut pool = ChunkPool::new(2, None);
        let handles: Vec<_> = (0..3)
            .map(|i| pool.acquire(ChunkKey::new(i, 0, 0)).unwrap())
            .collect();
        assert_eq!(pool.block_count(), 2);
        assert_ne!(handles[0].slot().block, handles[2].slot().block);
    }

    #[test]
    fn released_chunk_is_cleared_and_on_the_free_list() {
        let mut pool = ChunkPool::new(4, None);
        let keep = pool.acquire(ChunkKey::new(0, 0, 0)).unwrap();
        let released = pool.acquire(ChunkKey::new(5, 5, 5)).unwrap();

        {
            let chunk = pool.get_mut(released).unwrap();
            chunk.set_voxel(LocalPos::new(0, 0, 0), VoxelType::STONE);
            chunk.mesh = Some(MeshHandle(42));
        }

        assert_eq!(pool.release(released), Some(MeshHandle(42)));
        assert!(pool.get(released).is_none());
        assert!(pool.free_slots().any(|slot| slot == released.slot()));
        assert!(pool.get(keep).is_some());

        // The recycled slot comes back clean.
        let reused = pool.acquire(ChunkKey::new(9, 9, 9)).unwrap();
        assert_eq!(reused.slot(), released.slot());
        let chunk = pool.get(reused).unwrap();
        assert!(!chunk.has_voxels());
        assert!(chunk.mesh.is_none());
        assert_eq!(chunk.position, ChunkKey::new(9, 9, 9));
    }

    #[test]
    fn stale_handles_never_resolve() {
        let mut pool = ChunkPool::new(4, None);
        let _anchor = pool.acquire(ChunkKey::new(0, 0, 0)).unwrap();
        let first = pool.acquire(ChunkKey::new(1, 0, 0)).unwrap();
        pool.release(first);
        let second = pool.acquire(ChunkKey::new(2, 0, 0)).unwrap();

        assert_eq!(first.slot(), second.slot());
        assert!(pool.get(first).is_none());
        assert_eq!(pool.release(first), None);
        assert!(pool.get(second).is_some());
    }

    #[test]
    fn empty_block_is_freed_with_its_siblings() {
        let mut pool = ChunkPool::new(2, None);
        let a = pool.acquire(ChunkKey::new(0, 0, 0)).unwrap();
        let b = pool.acquire(ChunkKey::new(1, 0, 0)).unwrap();
        let c = pool.acquire(ChunkKey::new(2, 0, 0)).unwrap();
        assert_eq!(pool.block_count(), 2);

        pool.release(c);
        assert_eq!(pool.block_count(), 1);
        assert!(pool.free_slots().all(|slot| slot.block != c.slot().block));

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.block_count(), 0);
        assert_eq!(pool.free_slots().count(), 0);

        // Block indices are reused and old handles stay dead.
        let d = pool.acquire(ChunkKey::new(3, 0, 0)).unwrap();
        assert!(pool.get(a).is_none());
        assert!(pool.get(d).is_some());
    }

    #[test]
    fn freeing_a_block_keeps_the_other_free_slots_in_order() {
        let mut pool = ChunkPool::new(3, None);
        let first_block: Vec<_> = (0..3)
            .map(|i| pool.acquire(ChunkKey::new(i, 0, 0)).unwrap())
            .collect();
        let lone = pool.acquire(ChunkKey::new(3, 0, 0)).unwrap();
        assert_ne!(lone.slot().block, first_block[0].slot().block);

        // Free slots of both blocks are now on the list.
        pool.release(first_block[1]);
        pool.release(first_block[2]);
        let before: Vec<_> = pool.free_slots().collect();
        assert!(before.iter().any(|slot| slot.block == lone.slot().block));

        pool.release(lone);
        assert_eq!(pool.block_count(), 1);

        let expected: Vec<_> = before
            .into_iter()
            .filter(|slot| slot.block != lone.slot().block)
            .collect();
        assert_eq!(expected, vec![first_block[2].slot(), first_block[1].slot()]);
        assert_eq!(pool.free_slots().collect::<Vec<_>>(), expected);

        // The surviving list still hands out valid slots.
        let reused = pool.acquire(ChunkKey::new(9, 0, 0)).unwrap();
        assert_eq!(reused.slot(), first_block[2].slot());
        assert_eq!(pool.free_slots().collect::<Vec<_>>(), vec![first_block[1].slot()]);
    }

    #[test]
    fn block_cap_is_reported_as_exhaustion() {
        let mut pool = ChunkPool::new(1, Some(1));
        pool.acquire(ChunkKey::new(0, 0, 0)).unwrap();
        let err = pool.acquire(ChunkKey::new(1, 0, 0)).unwrap_err();
        assert!(matches!(err, EngineError::PoolExhausted { max_blocks: 1 }));
    }

    #[test]
    fn shutdown_frees_everything() {
        let mut pool = ChunkPool::new(2, None);
        let handle = pool.acquire(ChunkKey::new(0, 0, 0)).unwrap();
        pool.shutdown();
        assert_eq!(pool.block_count(), 0);
        assert!(pool.get(handle).is_none());
        assert_eq!(pool.free_slots().count(), 0);
    }
}
