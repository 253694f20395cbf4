// SPDX-License-Identifier: MIT

use crate::core::utils::usage_map::*;
use crate::fs::pmp300::{constant::*, types::*};

/// In-memory copy of one medium's directory block.
///
/// `entries` holds exactly `header.entry_count` slots, in playback order.
/// `usage` and `fat` always span [`MAX_BLOCKS`]; only the first
/// `blocks_available` slots are meaningful.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    pub header: DirHeader,
    pub entries: Vec<DirEntry>,
    pub usage: Vec<u8>,
    pub fat: Vec<u16>,
}

impl Directory {
    /// Empty directory for a medium of `capacity` blocks with `bad` blocks excluded.
    pub fn empty(capacity: u16, bad: &[u16]) -> Self {
        let capacity = capacity.min(MAX_BLOCKS as u16);
        let mut usage = vec![USAGE_FREE; MAX_BLOCKS];
        let mut fat = vec![FAT_FREE; MAX_BLOCKS];

        let mut bad_count = 0u16;
        for &b in bad {
            if b < capacity && usage[b as usize] != USAGE_BAD {
                usage[b as usize] = USAGE_BAD;
                fat[b as usize] = FAT_BAD;
                bad_count += 1;
            }
        }

        Self {
            header: DirHeader::empty(capacity, bad_count),
            entries: Vec::new(),
            usage,
            fat,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        (self.header.capacity() as usize).min(MAX_BLOCKS)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first entry named exactly `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name_eq(name))
    }

    #[inline]
    pub fn state(&self, block: u16) -> BlockState {
        if block as usize >= self.capacity() {
            return BlockState::Bad;
        }
        self.usage.state(block as usize)
    }

    #[inline]
    pub fn link(&self, block: u16) -> FatLink {
        self.fat
            .get(block as usize)
            .map_or(FatLink::Bad, |&raw| FatLink::from_raw(raw))
    }

    /// Bad blocks inside the capacity range.
    pub fn bad_blocks(&self) -> Vec<u16> {
        (0..self.capacity() as u16)
            .filter(|&b| self.usage.state(b as usize) == BlockState::Bad)
            .collect()
    }

    /// Keeps `header.entry_count` in step with `entries`.
    #[inline]
    pub(crate) fn sync_entry_count(&mut self) {
        self.header.entry_count = (self.entries.len() as u16).into();
    }

    /// Recomputes used/remaining/bad from the usage map.
    pub fn recount(&mut self) {
        let cap = self.capacity();
        let used = self.usage.count_state(cap, BlockState::Used) as u16;
        let bad = (cap - self.usage.count_state(cap, BlockState::Free) - used as usize) as u16;
        self.header.blocks_used = used.into();
        self.header.blocks_bad = bad.into();
        self.header.blocks_remaining = (cap as u16 - used - bad).into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_with_bad_blocks() {
        let dir = Directory::empty(1024, &[3, 3, 9, 5000]);
        assert_eq!(dir.header.blocks_bad.get(), 2);
        assert_eq!(dir.header.blocks_remaining.get(), 1022);
        assert_eq!(dir.bad_blocks(), [3, 9]);
        assert_eq!(dir.link(3), FatLink::Bad);
        assert_eq!(dir.state(5000), BlockState::Bad);
        assert!(dir.header.counters_balanced());
    }

    #[test]
    fn test_recount_matches_usage() {
        let mut dir = Directory::empty(16, &[]);
        dir.usage[0] = USAGE_USED;
        dir.usage[1] = USAGE_BAD;
        dir.usage[2] = 0x42;
        dir.recount();
        assert_eq!(dir.header.blocks_used.get(), 1);
        assert_eq!(dir.header.blocks_bad.get(), 2);
        assert_eq!(dir.header.blocks_remaining.get(), 13);
        assert!(dir.header.counters_balanced());
    }
}
