// SPDX-License-Identifier: MIT

pub use crate::core::allocator::*;

use crate::core::utils::usage_map::*;
use crate::fs::pmp300::{constant::*, directory::Directory, types::*};

/// Ordered blocks of one file. Empty for zero-length files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockChain {
    pub blocks: Vec<u16>,
}

impl BlockChain {
    pub fn new(blocks: Vec<u16>) -> Self {
        Self { blocks }
    }

    /// Block position stored in the entry; 0 for an empty chain.
    #[inline]
    pub fn head(&self) -> u16 {
        self.blocks.first().copied().unwrap_or(0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl FsHandle for BlockChain {}

impl From<Vec<u16>> for BlockChain {
    fn from(blocks: Vec<u16>) -> Self {
        Self::new(blocks)
    }
}

/// Walks a FAT chain from `head` until its terminal marker.
///
/// Fails on out-of-range links, links into free or bad blocks, and loops.
pub fn walk_chain(dir: &Directory, head: u16) -> AllocatorResult<BlockChain> {
    let cap = dir.capacity();
    let mut seen = vec![false; cap];
    let mut blocks = Vec::new();
    let mut current = head;
    loop {
        let idx = current as usize;
        if idx >= cap {
            return Err(AllocatorError::InvalidBlock(current));
        }
        if seen[idx] {
            return Err(AllocatorError::LoopDetected(current));
        }
        seen[idx] = true;
        blocks.push(current);
        match dir.link(current) {
            FatLink::EndOfChain => return Ok(BlockChain::new(blocks)),
            FatLink::Next(next) => current = next,
            FatLink::Free | FatLink::Bad => return Err(AllocatorError::BrokenChain(current)),
        }
    }
}

/// Like [`walk_chain`], also requiring exactly `expected` blocks.
pub fn resolve_chain(dir: &Directory, head: u16, expected: usize) -> AllocatorResult<BlockChain> {
    if expected == 0 {
        return Ok(BlockChain::default());
    }
    let chain = walk_chain(dir, head)?;
    if chain.len() != expected {
        return Err(AllocatorError::Other(
            "Chain length does not match entry block count",
        ));
    }
    Ok(chain)
}

/// Bitmap-guided first-fit allocator over a [`Directory`].
///
/// Keeps usage map, FAT and header counters in step on every call.
pub struct BlockAllocator<'a> {
    dir: &'a mut Directory,
}

impl<'a> BlockAllocator<'a> {
    pub fn new(dir: &'a mut Directory) -> Self {
        Self { dir }
    }

    #[inline]
    pub fn blocks_for(size: u64) -> usize {
        DirEntry::blocks_for(size)
    }

    /// Free blocks in the capacity range, in ascending order.
    fn free_blocks(&self, count: usize) -> Vec<u16> {
        let cap = self.dir.capacity();
        let mut found = Vec::with_capacity(count);
        let mut start = 0;
        while found.len() < count {
            match self.dir.usage.find_free(start, cap) {
                Some(b) => {
                    found.push(b as u16);
                    start = b + 1;
                }
                None => break,
            }
        }
        found
    }

    /// Reserves and threads `count` blocks.
    pub fn allocate_blocks(&mut self, count: usize) -> AllocatorResult<BlockChain> {
        if count == 0 {
            return Ok(BlockChain::default());
        }
        let blocks = self.free_blocks(count);
        if blocks.len() < count {
            return Err(AllocatorError::OutOfBlocks {
                needed: count,
                available: blocks.len(),
            });
        }

        for pair in blocks.windows(2) {
            self.dir.fat[pair[0] as usize] = pair[1];
        }
        if let Some(&last) = blocks.last() {
            self.dir.fat[last as usize] = FAT_EOC;
        }
        for &b in &blocks {
            self.dir.usage.set_state(b as usize, BlockState::Used);
        }

        let h = &mut self.dir.header;
        h.blocks_used = (h.blocks_used.get() + count as u16).into();
        h.blocks_remaining = h.blocks_remaining.get().saturating_sub(count as u16).into();

        log::debug!("allocated {count} blocks starting at {}", blocks[0]);
        Ok(BlockChain::new(blocks))
    }

    /// Frees the chain starting at `head` after walking it completely.
    ///
    /// Nothing is released when the walk fails.
    pub fn free(&mut self, head: u16, expected: usize) -> AllocatorResult<usize> {
        let chain = resolve_chain(self.dir, head, expected)?;
        self.release_blocks(&chain.blocks);
        Ok(chain.len())
    }

    fn release_blocks(&mut self, blocks: &[u16]) {
        for &b in blocks {
            self.dir.fat[b as usize] = FAT_FREE;
            self.dir.usage.set_state(b as usize, BlockState::Free);
        }
        let n = blocks.len() as u16;
        let h = &mut self.dir.header;
        h.blocks_used = h.blocks_used.get().saturating_sub(n).into();
        h.blocks_remaining = (h.blocks_remaining.get() + n).into();
    }

    /// Excludes `block` from allocation for good. Returns false if already bad.
    pub fn mark_bad(&mut self, block: u16) -> AllocatorResult<bool> {
        if block as usize >= self.dir.capacity() {
            return Err(AllocatorError::InvalidBlock(block));
        }
        match self.dir.usage.state(block as usize) {
            BlockState::Bad => return Ok(false),
            BlockState::Used => return Err(AllocatorError::BlockInUse(block)),
            BlockState::Free | BlockState::Unknown(_) => {}
        }

        self.dir.usage.set_state(block as usize, BlockState::Bad);
        self.dir.fat[block as usize] = FAT_BAD;
        let h = &mut self.dir.header;
        h.blocks_bad = (h.blocks_bad.get() + 1).into();
        h.blocks_remaining = h.blocks_remaining.get().saturating_sub(1).into();
        log::warn!("block {block} marked bad");
        Ok(true)
    }
}

impl FsAllocator<BlockChain> for BlockAllocator<'_> {
    fn allocate_bytes(&mut self, size: u64) -> AllocatorResult<BlockChain> {
        self.allocate_blocks(Self::blocks_for(size))
    }

    fn release(&mut self, handle: &BlockChain) -> AllocatorResult<usize> {
        self.free(handle.head(), handle.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_skips_bad_and_threads_chain() {
        let mut dir = Directory::empty(16, &[1, 2]);
        let mut alloc = BlockAllocator::new(&mut dir);
        let chain = alloc.allocate_bytes(3 * BLOCK_SIZE as u64 - 1).unwrap();

        assert_eq!(chain.blocks, [0, 3, 4]);
        assert_eq!(dir.link(0), FatLink::Next(3));
        assert_eq!(dir.link(3), FatLink::Next(4));
        assert_eq!(dir.link(4), FatLink::EndOfChain);
        assert_eq!(dir.header.blocks_used.get(), 3);
        assert!(dir.header.counters_balanced());
        assert_eq!(resolve_chain(&dir, 0, 3).unwrap(), chain);
    }

    #[test]
    fn test_allocate_then_free_restores_state() {
        let base = Directory::empty(64, &[5, 40]);
        let free = base.header.blocks_remaining.get() as usize;

        for n in [1, 2, 17, free] {
            let mut dir = base.clone();
            let chain = BlockAllocator::new(&mut dir).allocate_blocks(n).unwrap();
            assert_eq!(chain.len(), n);
            let freed = BlockAllocator::new(&mut dir).release(&chain).unwrap();
            assert_eq!(freed, n);
            assert_eq!(dir, base, "n = {n}");
        }
    }

    #[test]
    fn test_out_of_blocks_leaves_state() {
        let mut dir = Directory::empty(4, &[0]);
        let before = dir.clone();
        let err = BlockAllocator::new(&mut dir).allocate_blocks(4).unwrap_err();
        assert_eq!(err, AllocatorError::OutOfBlocks { needed: 4, available: 3 });
        assert_eq!(dir, before);
    }

    #[test]
    fn test_free_detects_loop_without_mutating() {
        let mut dir = Directory::empty(8, &[]);
        BlockAllocator::new(&mut dir).allocate_blocks(3).unwrap();
        dir.fat[2] = 0; // 0 -> 1 -> 2 -> 0
        let before = dir.clone();

        let err = BlockAllocator::new(&mut dir).free(0, 8).unwrap_err();
        assert_eq!(err, AllocatorError::LoopDetected(0));
        assert_eq!(dir, before);
        assert_eq!(walk_chain(&dir, 0).unwrap_err(), AllocatorError::LoopDetected(0));
    }

    #[test]
    fn test_free_rejects_broken_chain() {
        let mut dir = Directory::empty(8, &[]);
        BlockAllocator::new(&mut dir).allocate_blocks(2).unwrap();
        dir.fat[1] = FAT_FREE;
        assert_eq!(
            BlockAllocator::new(&mut dir).free(0, 2).unwrap_err(),
            AllocatorError::BrokenChain(1)
        );
    }

    #[test]
    fn test_mark_bad() {
        let mut dir = Directory::empty(8, &[]);
        let mut alloc = BlockAllocator::new(&mut dir);
        assert!(alloc.mark_bad(3).unwrap());
        assert!(!alloc.mark_bad(3).unwrap());
        assert_eq!(alloc.mark_bad(8).unwrap_err(), AllocatorError::InvalidBlock(8));
        alloc.allocate_blocks(1).unwrap();
        assert_eq!(alloc.mark_bad(0).unwrap_err(), AllocatorError::BlockInUse(0));
        assert_eq!(dir.header.blocks_bad.get(), 1);
        assert!(dir.header.counters_balanced());
    }
}
