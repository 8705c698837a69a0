//! First-fit free-list sub-allocation over a linear buffer.
//!
//! A [`FreeList`] manages a fixed capacity of slots (bytes, tokens -- the unit
//! is up to the client) as a list of free blocks sorted by offset. It backs
//! the string interning table and the per-chunk formula token streams, both
//! of which address their client buffer with stable offsets.

// ---------------------------------------------------------------------------
// FreeList
// ---------------------------------------------------------------------------

/// A free block: `[offset, offset + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    offset: u32,
    size: u32,
}

/// First-fit allocator over `[0, capacity)`.
///
/// Free blocks are kept sorted by offset and are coalesced with both
/// neighbours on deallocation, so a fully returned buffer always collapses
/// back to a single block spanning the capacity.
#[derive(Debug, Clone)]
pub struct FreeList {
    capacity: u32,
    /// Sorted by `offset`, pairwise non-touching.
    blocks: Vec<Block>,
}

impl FreeList {
    /// Create an allocator with a single free block spanning `capacity`.
    pub fn new(capacity: u32) -> Self {
        let blocks = if capacity > 0 {
            vec![Block {
                offset: 0,
                size: capacity,
            }]
        } else {
            Vec::new()
        };
        Self { capacity, blocks }
    }

    /// Total managed capacity.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Allocate `size` contiguous slots, first-fit.
    ///
    /// Returns the offset of the allocation, or `None` when no free block is
    /// large enough (the caller decides whether to rehost its buffer).
    pub fn allocate(&mut self, size: u32) -> Option<u32> {
        if size == 0 {
            return Some(0);
        }
        let idx = self.blocks.iter().position(|b| b.size >= size)?;
        let block = self.blocks[idx];
        if block.size == size {
            self.blocks.remove(idx);
        } else {
            // Split from the front: the remainder keeps its sorted position.
            self.blocks[idx] = Block {
                offset: block.offset + size,
                size: block.size - size,
            };
        }
        Some(block.offset)
    }

    /// Return `[offset, offset + size)` to the free list, coalescing with
    /// both immediate neighbours when the addresses touch.
    pub fn deallocate(&mut self, offset: u32, size: u32) {
        if size == 0 {
            return;
        }
        debug_assert!(offset + size <= self.capacity, "deallocate out of range");
        let idx = self
            .blocks
            .iter()
            .position(|b| b.offset > offset)
            .unwrap_or(self.blocks.len());

        let touches_prev = idx > 0 && {
            let prev = self.blocks[idx - 1];
            debug_assert!(prev.offset + prev.size <= offset, "double free");
            prev.offset + prev.size == offset
        };
        let touches_next = idx < self.blocks.len() && {
            let next = self.blocks[idx];
            debug_assert!(offset + size <= next.offset, "double free");
            offset + size == next.offset
        };

        match (touches_prev, touches_next) {
            (true, true) => {
                let next_size = self.blocks[idx].size;
                self.blocks[idx - 1].size += size + next_size;
                self.blocks.remove(idx);
            }
            (true, false) => {
                self.blocks[idx - 1].size += size;
            }
            (false, true) => {
                let next = &mut self.blocks[idx];
                next.offset = offset;
                next.size += size;
            }
            (false, false) => {
                self.blocks.insert(idx, Block { offset, size });
            }
        }
    }

    /// Collapse back to one free block spanning the whole capacity.
    pub fn reset(&mut self) {
        self.blocks.clear();
        if self.capacity > 0 {
            self.blocks.push(Block {
                offset: 0,
                size: self.capacity,
            });
        }
    }

    /// Largest contiguous free run. Clients compare this against an upcoming
    /// allocation to decide whether a rehost is needed.
    pub fn max_free_block(&self) -> u32 {
        self.blocks.iter().map(|b| b.size).max().unwrap_or(0)
    }

    /// Total free slots across all blocks.
    pub fn free_total(&self) -> u32 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_first_fit_and_split() {
        let mut fl = FreeList::new(100);
        assert_eq!(fl.allocate(30), Some(0));
        assert_eq!(fl.allocate(30), Some(30));
        assert_eq!(fl.allocate(30), Some(60));
        assert_eq!(fl.max_free_block(), 10);
        assert_eq!(fl.allocate(11), None);
    }

    #[test]
    fn exact_fit_unlinks_block() {
        let mut fl = FreeList::new(64);
        assert_eq!(fl.allocate(64), Some(0));
        assert_eq!(fl.max_free_block(), 0);
        assert_eq!(fl.allocate(1), None);
    }

    #[test]
    fn coalesce_with_both_neighbours() {
        // Capacity 100; allocate 30, 30, 30 at offsets 0, 30, 60. Free the
        // middle then the first: a single [0, 60) block remains next to the
        // untouched [90, 100) tail.
        let mut fl = FreeList::new(100);
        let a = fl.allocate(30).unwrap();
        let b = fl.allocate(30).unwrap();
        let _c = fl.allocate(30).unwrap();
        fl.deallocate(b, 30);
        fl.deallocate(a, 30);
        assert_eq!(fl.max_free_block(), 60);
        assert_eq!(fl.free_total(), 70);
    }

    #[test]
    fn full_free_collapses_to_capacity() {
        let mut fl = FreeList::new(128);
        let a = fl.allocate(17).unwrap();
        let b = fl.allocate(40).unwrap();
        let c = fl.allocate(5).unwrap();
        fl.deallocate(a, 17);
        fl.deallocate(c, 5);
        fl.deallocate(b, 40);
        assert_eq!(fl.max_free_block(), 128);
    }

    #[test]
    fn reset_restores_single_block() {
        let mut fl = FreeList::new(50);
        fl.allocate(20);
        fl.allocate(20);
        fl.reset();
        assert_eq!(fl.max_free_block(), 50);
        assert_eq!(fl.allocate(50), Some(0));
    }

    #[test]
    fn zero_sized_allocation_is_noop() {
        let mut fl = FreeList::new(10);
        assert_eq!(fl.allocate(0), Some(0));
        assert_eq!(fl.free_total(), 10);
    }

    #[test]
    fn reuse_freed_block() {
        let mut fl = FreeList::new(32);
        let a = fl.allocate(16).unwrap();
        let _b = fl.allocate(16).unwrap();
        fl.deallocate(a, 16);
        // First-fit lands back on the freed front block.
        assert_eq!(fl.allocate(8), Some(0));
        assert_eq!(fl.allocate(8), Some(8));
    }
}
