// SPDX-License-Identifier: MIT

//! Byte-per-block usage map operations.
//!
//! Each byte holds one block state:
//! - `0x00` free
//! - `0x01` used
//! - `0xFF` bad
//!
//! Any other value is kept as-is and reported as `Unknown`.

pub const USAGE_FREE: u8 = 0x00;
pub const USAGE_USED: u8 = 0x01;
pub const USAGE_BAD: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Used,
    Bad,
    Unknown(u8),
}

impl BlockState {
    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            USAGE_FREE => BlockState::Free,
            USAGE_USED => BlockState::Used,
            USAGE_BAD => BlockState::Bad,
            other => BlockState::Unknown(other),
        }
    }

    #[inline]
    pub const fn to_raw(self) -> u8 {
        match self {
            BlockState::Free => USAGE_FREE,
            BlockState::Used => USAGE_USED,
            BlockState::Bad => USAGE_BAD,
            BlockState::Unknown(raw) => raw,
        }
    }
}

/// Extension trait for usage maps stored as byte slices.
pub trait UsageMapOps {
    /// Out-of-bounds blocks read as `Bad` so they are never allocated.
    fn state(&self, block: usize) -> BlockState;

    /// Does nothing if `block` is out of bounds.
    fn set_state(&mut self, block: usize, state: BlockState);

    /// Counts blocks in `[0, end)` currently in `state`.
    fn count_state(&self, end: usize, state: BlockState) -> usize;

    /// First free block in `[start, end)`.
    fn find_free(&self, start: usize, end: usize) -> Option<usize>;
}

impl UsageMapOps for [u8] {
    #[inline]
    fn state(&self, block: usize) -> BlockState {
        self.get(block)
            .map_or(BlockState::Bad, |&b| BlockState::from_raw(b))
    }

    #[inline]
    fn set_state(&mut self, block: usize, state: BlockState) {
        if let Some(b) = self.get_mut(block) {
            *b = state.to_raw();
        }
    }

    fn count_state(&self, end: usize, state: BlockState) -> usize {
        let raw = state.to_raw();
        self.iter().take(end).filter(|&&b| b == raw).count()
    }

    fn find_free(&self, start: usize, end: usize) -> Option<usize> {
        let end = end.min(self.len());
        if start >= end {
            return None;
        }
        self[start..end]
            .iter()
            .position(|&b| b == USAGE_FREE)
            .map(|i| start + i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_and_counts() {
        let mut map = [USAGE_FREE; 8];
        map.set_state(1, BlockState::Used);
        map.set_state(2, BlockState::Bad);
        map.set_state(20, BlockState::Used);

        assert_eq!(map.state(1), BlockState::Used);
        assert_eq!(map.state(20), BlockState::Bad);
        assert_eq!(map.count_state(8, BlockState::Free), 6);
        assert_eq!(map.count_state(2, BlockState::Free), 1);
        assert_eq!(map.find_free(1, 8), Some(3));
        assert_eq!(map.find_free(3, 3), None);
    }

    #[test]
    fn test_unknown_round_trips() {
        assert_eq!(BlockState::from_raw(0x42), BlockState::Unknown(0x42));
        assert_eq!(BlockState::Unknown(0x42).to_raw(), 0x42);
    }
}
