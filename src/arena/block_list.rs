//! Ordered list of blocks backing the free and allocated lists of an `Arena`.
//!
//! Nodes live in a slab (`Vec<Slot>`) and are chained by slot index in both directions, so head
//! and tail appends are O(1), positional operations walk from the head, and removal through a
//! `BlockId` never has to guess which of two equal blocks was meant.

use std::fmt;

use super::{ArenaError, Block, BlockId, Result};

#[derive(Debug, Clone)]
struct Node {
    block: Block,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Clone, Default)]
pub struct BlockList {
    slots: Vec<Slot>,
    // slots whose node was removed, reused before the slab grows
    vacant: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl BlockList {
    /// Create an empty `BlockList`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<&Block> {
        self.head.map(|slot| &self.node(slot).block)
    }

    pub fn last(&self) -> Option<&Block> {
        self.tail.map(|slot| &self.node(slot).block)
    }

    /// Get the block at `index`.
    ///
    /// Any index in `0..=len` is accepted, `len` being the append position: it has no block and
    /// yields `Ok(None)`. Anything past that is `ArenaError::InvalidIndex`.
    pub fn get(&self, index: usize) -> Result<Option<&Block>> {
        self.check_index(index)?;
        Ok(self.slot_at(index).map(|slot| &self.node(slot).block))
    }

    /// Get the block a handle points at, `None` if that node has been removed.
    pub fn get_by_id(&self, id: BlockId) -> Option<&Block> {
        self.live_node(id).map(|node| &node.block)
    }

    /// Handle of the node at `index`, `None` when `index >= len`.
    pub fn id_at(&self, index: usize) -> Option<BlockId> {
        self.slot_at(index).map(|slot| self.id_of(slot))
    }

    /// Append `block` to the tail of the list.
    pub fn push_back(&mut self, block: Block) -> BlockId {
        let slot = self.occupy(block, self.tail, None);

        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);

        self.id_of(slot)
    }

    /// Prepend `block` to the head of the list.
    pub fn push_front(&mut self, block: Block) -> BlockId {
        let slot = self.occupy(block, None, self.head);

        match self.head {
            Some(head) => self.node_mut(head).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);

        self.id_of(slot)
    }

    /// Insert `block` so that it ends up at position `index`, for `index` in `0..=len`.
    ///
    /// Inserting at either end is O(1), anywhere else walks `index` nodes from the head.
    pub fn insert(&mut self, index: usize, block: Block) -> Result<BlockId> {
        self.check_index(index)?;

        if index == 0 {
            return Ok(self.push_front(block));
        }
        if index == self.len {
            return Ok(self.push_back(block));
        }

        // 0 < index < len, so there is a node before and a node at `index`
        let Some(after) = self.slot_at(index) else {
            unreachable!("position {index} of {} has no node", self.len);
        };
        let before = self.node(after).prev;

        let slot = self.occupy(block, before, Some(after));
        self.node_mut(after).prev = Some(slot);
        if let Some(before) = before {
            self.node_mut(before).next = Some(slot);
        }

        Ok(self.id_of(slot))
    }

    /// Remove the node a handle points at, returning its block. A stale handle removes nothing.
    pub fn remove(&mut self, id: BlockId) -> Option<Block> {
        self.live_node(id)?;
        Some(self.unlink(id.slot))
    }

    /// Remove the node at position `index`.
    ///
    /// `index == len` passes the bounds check like it does for `get()`, but there is no block to
    /// take there, so it is reported as `ArenaError::InvalidIndex` as well.
    pub fn remove_at(&mut self, index: usize) -> Result<Block> {
        self.check_index(index)?;

        match self.slot_at(index) {
            Some(slot) => Ok(self.unlink(slot)),
            None => Err(ArenaError::InvalidIndex {
                index,
                len: self.len,
            }),
        }
    }

    /// Remove the first node, scanning from the head, whose block equals `block`.
    ///
    /// With duplicate blocks in the list this always takes the earliest one; use `remove()` with a
    /// handle when a specific node is meant.
    pub fn remove_value(&mut self, block: &Block) -> Result<Block> {
        let found = self
            .entries()
            .find(|(_, candidate)| *candidate == block)
            .map(|(id, _)| id);

        match found {
            Some(id) => Ok(self.unlink(id.slot)),
            None => Err(ArenaError::BlockNotFound(*block)),
        }
    }

    /// Replace the block stored in a node, keeping its position. Returns the old block.
    pub fn replace(&mut self, id: BlockId, block: Block) -> Option<Block> {
        self.live_node(id)?;
        Some(std::mem::replace(&mut self.node_mut(id.slot).block, block))
    }

    /// Position of the first node equal to `block`.
    pub fn index_of(&self, block: &Block) -> Option<usize> {
        self.iter().position(|candidate| candidate == block)
    }

    /// Position of the node a handle points at.
    pub fn position(&self, id: BlockId) -> Option<usize> {
        self.entries().position(|(candidate, _)| candidate == id)
    }

    /// Iterate over the blocks in list order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> + '_ {
        self.entries().map(|(_, block)| block)
    }

    /// Iterate over `(handle, block)` pairs in list order.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            list: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Sum of the lengths of all blocks in the list.
    pub fn total_length(&self) -> usize {
        self.iter().map(|block| block.length).sum()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index > self.len {
            return Err(ArenaError::InvalidIndex {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    fn slot_at(&self, index: usize) -> Option<u32> {
        if index >= self.len {
            return None;
        }

        let mut cursor = self.head;
        for _ in 0..index {
            cursor = cursor.and_then(|slot| self.node(slot).next);
        }
        cursor
    }

    fn id_of(&self, slot: u32) -> BlockId {
        BlockId {
            slot,
            generation: self.slots[slot as usize].generation,
        }
    }

    fn live_node(&self, id: BlockId) -> Option<&Node> {
        let slot = self.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    // only called with slots reached through head/tail/prev/next, which are always occupied
    fn node(&self, slot: u32) -> &Node {
        match self.slots[slot as usize].node.as_ref() {
            Some(node) => node,
            None => unreachable!("linked slot {slot} is vacant"),
        }
    }

    fn node_mut(&mut self, slot: u32) -> &mut Node {
        match self.slots[slot as usize].node.as_mut() {
            Some(node) => node,
            None => unreachable!("linked slot {slot} is vacant"),
        }
    }

    // stores a new node without linking its neighbours to it, that is left to the caller
    fn occupy(&mut self, block: Block, prev: Option<u32>, next: Option<u32>) -> u32 {
        let node = Node { block, prev, next };

        if let Some(slot) = self.vacant.pop() {
            self.slots[slot as usize].node = Some(node);
            self.len += 1;
            return slot;
        }

        let slot = slot_index(self.slots.len());
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        self.len += 1;
        slot
    }

    fn unlink(&mut self, slot: u32) -> Block {
        let entry = &mut self.slots[slot as usize];
        let Some(node) = entry.node.take() else {
            unreachable!("unlinking vacant slot {slot}");
        };
        // every handle issued for this slot so far is now stale
        entry.generation = entry.generation.wrapping_add(1);
        self.vacant.push(slot);
        self.len -= 1;

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        node.block
    }
}

// slot indices are u32 to keep handles small, a list can't grow past that
fn slot_index(idx: usize) -> u32 {
    match u32::try_from(idx) {
        Ok(slot) => slot,
        Err(_) => panic!("block list cannot hold more than {} nodes", u32::MAX),
    }
}

/// Iterator over the `(BlockId, &Block)` pairs of a `BlockList`, head to tail.
pub struct Entries<'a> {
    list: &'a BlockList,
    cursor: Option<u32>,
    remaining: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (BlockId, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let node = self.list.node(slot);
        self.cursor = node.next;
        self.remaining -= 1;
        Some((self.list.id_of(slot), &node.block))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl FromIterator<Block> for BlockList {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl Extend<Block> for BlockList {
    fn extend<I: IntoIterator<Item = Block>>(&mut self, iter: I) {
        for block in iter {
            self.push_back(block);
        }
    }
}

impl PartialEq for BlockList {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for BlockList {}

// "(0 20) (50 50)", no trailing space, nothing at all for an empty list
impl fmt::Display for BlockList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (idx, block) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(blocks: &[(usize, usize)]) -> BlockList {
        blocks
            .iter()
            .map(|&(base, length)| Block::new(base, length))
            .collect()
    }

    fn contents(list: &BlockList) -> Vec<(usize, usize)> {
        list.iter().map(|b| (b.base_address, b.length)).collect()
    }

    #[test]
    fn push_back_and_front_track_head_and_tail() {
        let mut list = BlockList::new();
        assert!(list.is_empty());
        assert_eq!(list.first(), None);
        assert_eq!(list.last(), None);

        list.push_back(Block::new(10, 5));
        assert_eq!(list.first(), list.last());

        list.push_front(Block::new(0, 10));
        list.push_back(Block::new(15, 1));

        assert_eq!(list.len(), 3);
        assert_eq!(list.first(), Some(&Block::new(0, 10)));
        assert_eq!(list.last(), Some(&Block::new(15, 1)));
        assert_eq!(contents(&list), vec![(0, 10), (10, 5), (15, 1)]);
    }

    #[test]
    fn get_accepts_the_append_position() {
        let list = list_of(&[(0, 1), (1, 1)]);

        assert_eq!(list.get(1), Ok(Some(&Block::new(1, 1))));
        assert_eq!(list.get(2), Ok(None));
        assert_eq!(list.get(3), Err(ArenaError::InvalidIndex { index: 3, len: 2 }));

        let empty = BlockList::new();
        assert_eq!(empty.get(0), Ok(None));
    }

    #[test]
    fn insert_at_head_middle_and_tail() {
        let mut list = list_of(&[(0, 1), (2, 1)]);

        list.insert(1, Block::new(1, 1)).unwrap();
        list.insert(0, Block::new(9, 9)).unwrap();
        list.insert(list.len(), Block::new(3, 1)).unwrap();

        assert_eq!(contents(&list), vec![(9, 9), (0, 1), (1, 1), (2, 1), (3, 1)]);
        assert_eq!(list.last(), Some(&Block::new(3, 1)));

        let err = list.insert(6, Block::new(4, 1)).unwrap_err();
        assert_eq!(err, ArenaError::InvalidIndex { index: 6, len: 5 });
    }

    #[test]
    fn insert_into_empty_list() {
        let mut list = BlockList::new();
        list.insert(0, Block::new(4, 4)).unwrap();

        assert_eq!(list.first(), Some(&Block::new(4, 4)));
        assert_eq!(list.last(), Some(&Block::new(4, 4)));
    }

    #[test]
    fn remove_at_keeps_tail_current() {
        let mut list = list_of(&[(0, 1), (1, 1), (2, 1)]);

        assert_eq!(list.remove_at(2), Ok(Block::new(2, 1)));
        assert_eq!(list.last(), Some(&Block::new(1, 1)));

        assert_eq!(list.remove_at(0), Ok(Block::new(0, 1)));
        assert_eq!(list.first(), Some(&Block::new(1, 1)));
        assert_eq!(list.last(), Some(&Block::new(1, 1)));

        assert_eq!(list.remove_at(0), Ok(Block::new(1, 1)));
        assert!(list.is_empty());
        assert_eq!(list.first(), None);
        assert_eq!(list.last(), None);
    }

    #[test]
    fn remove_at_the_append_position_fails() {
        let mut list = list_of(&[(0, 1)]);

        assert_eq!(list.remove_at(1), Err(ArenaError::InvalidIndex { index: 1, len: 1 }));
        assert_eq!(list.remove_at(5), Err(ArenaError::InvalidIndex { index: 5, len: 1 }));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_value_takes_the_first_match() {
        let mut list = list_of(&[(5, 5), (0, 5), (5, 5)]);
        let second_dup = list.id_at(2).unwrap();

        assert_eq!(list.remove_value(&Block::new(5, 5)), Ok(Block::new(5, 5)));
        assert_eq!(contents(&list), vec![(0, 5), (5, 5)]);
        // the later duplicate was the one left behind
        assert_eq!(list.position(second_dup), Some(1));

        let missing = Block::new(7, 7);
        assert_eq!(list.remove_value(&missing), Err(ArenaError::BlockNotFound(missing)));
    }

    #[test]
    fn handles_pick_out_one_of_several_duplicates() {
        let mut list = list_of(&[(5, 5), (5, 5), (5, 5)]);
        let middle = list.id_at(1).unwrap();
        let last = list.id_at(2).unwrap();

        assert_eq!(list.remove(middle), Some(Block::new(5, 5)));
        assert_eq!(list.len(), 2);
        assert_eq!(list.position(last), Some(1));

        // stale after removal, even once the slot is reused
        assert_eq!(list.remove(middle), None);
        let reused = list.push_back(Block::new(1, 1));
        assert_eq!(list.get_by_id(middle), None);
        assert_eq!(list.get_by_id(reused), Some(&Block::new(1, 1)));
    }

    #[test]
    fn replace_keeps_position() {
        let mut list = list_of(&[(0, 1), (1, 1), (2, 1)]);
        let id = list.id_at(1).unwrap();

        assert_eq!(list.replace(id, Block::new(1, 9)), Some(Block::new(1, 1)));
        assert_eq!(contents(&list), vec![(0, 1), (1, 9), (2, 1)]);
    }

    #[test]
    fn index_of_scans_from_head() {
        let list = list_of(&[(3, 1), (0, 3), (3, 1)]);

        assert_eq!(list.index_of(&Block::new(3, 1)), Some(0));
        assert_eq!(list.index_of(&Block::new(0, 3)), Some(1));
        assert_eq!(list.index_of(&Block::new(4, 4)), None);
    }

    #[test]
    fn slot_index_fits_u32() {
        assert_eq!(slot_index(0), 0);
        assert_eq!(slot_index(u32::MAX as usize), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "cannot hold more than")]
    fn slot_index_past_u32_panics() {
        slot_index(u32::MAX as usize + 1);
    }

    #[test]
    fn display() {
        assert_eq!(BlockList::new().to_string(), "");
        assert_eq!(list_of(&[(0, 20)]).to_string(), "(0 20)");
        assert_eq!(list_of(&[(50, 50), (0, 20)]).to_string(), "(50 50) (0 20)");
    }

    #[test]
    fn total_length_and_iteration_order() {
        let list = list_of(&[(50, 50), (0, 20), (20, 30)]);

        assert_eq!(list.total_length(), 100);
        assert_eq!(list.entries().len(), 3);
        assert_eq!(contents(&list), vec![(50, 50), (0, 20), (20, 30)]);
    }
}
