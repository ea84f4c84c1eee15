use std::fmt;

use tracing::{debug, trace, warn};

use super::{Arena, ArenaError, Block, BlockList, FreeOutcome, Result};

impl Arena {
    /// Create a new `Arena` of `max_size` words, all of it in a single free block `[0, max_size)`.
    pub fn new(max_size: usize) -> Self {
        let mut free = BlockList::new();
        if max_size > 0 {
            free.push_back(Block::new(0, max_size));
        }

        Self {
            max_size,
            free,
            allocated: BlockList::new(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// The free list, in scan order.
    pub fn free_list(&self) -> &BlockList {
        &self.free
    }

    /// The allocated list, oldest allocation first.
    pub fn allocated_list(&self) -> &BlockList {
        &self.allocated
    }

    pub fn free_words(&self) -> usize {
        self.free.total_length()
    }

    pub fn allocated_words(&self) -> usize {
        self.allocated.total_length()
    }

    pub fn largest_free_block(&self) -> Option<Block> {
        self.free.iter().copied().max_by_key(|block| block.length)
    }

    /// Allocates `length` words using first-fit over the free list, returning the base address of
    /// the new block, or `None` if no single free block is large enough.
    ///
    /// The free list is scanned in list order, not address order. Whatever is left of the block
    /// that was used goes back into the same position of the free list; if nothing is left it is
    /// dropped. This never defragments and never combines free blocks to satisfy a request.
    pub fn malloc(&mut self, length: usize) -> Option<usize> {
        if length == 0 {
            warn!("rejecting zero-length allocation");
            return None;
        }

        let found = self
            .free
            .entries()
            .enumerate()
            .find(|(_, (_, block))| block.length >= length)
            .map(|(idx, (id, block))| (idx, id, *block));

        let Some((idx, id, found)) = found else {
            debug!(
                length,
                free_blocks = self.free.len(),
                "no free block large enough"
            );
            return None;
        };

        let block = Block::new(found.base_address, length);
        self.allocated.push_back(block);
        self.free.remove(id);

        let rest = found.length - length;
        if rest > 0 {
            // the leftover takes the slot the consumed block had, so the scan order of the other
            // free blocks doesn't change
            let leftover = Block::new(found.base_address + length, rest);
            if let Err(e) = self.free.insert(idx, leftover) {
                unreachable!("position {idx} was just vacated: {e}");
            }
        }

        trace!(%found, %block, position = idx, "allocated");
        Some(block.base_address)
    }

    /// Frees the allocated block whose base address is `address`, moving it unchanged to the tail
    /// of the free list. Free blocks are never merged here, see `defrag()` and `coalesce()`.
    ///
    /// Errors with `ArenaError::EmptyAllocatedList` if nothing is allocated at all. An address that
    /// doesn't start any allocated block is not an error, it gives `FreeOutcome::NoMatch`.
    pub fn free(&mut self, address: usize) -> Result<FreeOutcome> {
        if self.allocated.is_empty() {
            return Err(ArenaError::EmptyAllocatedList);
        }

        let found = self
            .allocated
            .entries()
            .find(|(_, block)| block.base_address == address)
            .map(|(id, _)| id);

        let Some(block) = found.and_then(|id| self.allocated.remove(id)) else {
            debug!(address, "no allocated block starts at this address");
            return Ok(FreeOutcome::NoMatch);
        };

        // only reachable after defrag() merged blocks that didn't touch
        if self.free.index_of(&block).is_some() {
            warn!(%block, "block already on the free list");
        }
        self.free.push_back(block);

        trace!(%block, "freed");
        Ok(FreeOutcome::Freed(block))
    }

    /// Defragments the head of the free list. This is deliberately narrow, it only ever looks at
    /// the first two or three entries:
    ///
    /// - fewer than 2 free blocks: nothing happens.
    /// - exactly 2: they are merged into the first one if the first ends where the second starts.
    /// - 3 or more: the first three are merged into the first one, whatever their addresses are.
    ///   Entries from the fourth onwards are untouched.
    ///
    /// The three-way merge does not check adjacency, so on a fragmented free list it can produce
    /// a block covering words that are still allocated. Use `coalesce()` for a pass that only
    /// merges blocks that really touch.
    pub fn defrag(&mut self) {
        let mut heads = self.free.entries().take(3).map(|(id, block)| (id, *block));

        let (Some((first_id, first)), Some((second_id, second))) = (heads.next(), heads.next())
        else {
            return;
        };
        let third = heads.next();

        match third {
            None => {
                if !first.is_followed_by(&second) {
                    trace!(%first, %second, "head blocks are not adjacent");
                    return;
                }

                let merged = Block::new(first.base_address, first.length + second.length);
                self.free.replace(first_id, merged);
                self.free.remove(second_id);

                debug!(%merged, "merged two free blocks");
            }
            Some((third_id, third)) => {
                let merged = Block::new(
                    first.base_address,
                    first.length + second.length + third.length,
                );
                self.free.replace(first_id, merged);
                self.free.remove(third_id);
                self.free.remove(second_id);

                debug!(%merged, "merged three free blocks");
            }
        }
    }

    /// Merges every run of address-adjacent free blocks, leaving the free list sorted by address.
    /// Returns how many merges were made.
    ///
    /// Unlike `defrag()` this looks at the whole free list, and never merges blocks that don't
    /// touch.
    pub fn coalesce(&mut self) -> usize {
        let mut blocks: Vec<Block> = self.free.iter().copied().collect();
        blocks.sort_by_key(|block| block.base_address);

        let mut merged: Vec<Block> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match merged.last_mut() {
                Some(last) if last.is_followed_by(&block) => {
                    *last = Block::new(last.base_address, last.length + block.length);
                }
                _ => merged.push(block),
            }
        }

        let merges = self.free.len() - merged.len();
        self.free = merged.into_iter().collect();

        debug!(merges, free_blocks = self.free.len(), "coalesced free list");
        merges
    }
}

// free list on the first line, allocated list on the second
impl fmt::Display for Arena {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\n{}", self.free, self.allocated)
    }
}
