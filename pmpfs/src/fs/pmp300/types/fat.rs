// SPDX-License-Identifier: MIT

use crate::fs::pmp300::constant::*;

/// Decoded FAT slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatLink {
    Free,
    EndOfChain,
    Bad,
    Next(u16),
}

impl FatLink {
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            FAT_FREE => FatLink::Free,
            FAT_EOC => FatLink::EndOfChain,
            FAT_BAD => FatLink::Bad,
            next => FatLink::Next(next),
        }
    }

    #[inline]
    pub const fn to_raw(self) -> u16 {
        match self {
            FatLink::Free => FAT_FREE,
            FatLink::EndOfChain => FAT_EOC,
            FatLink::Bad => FAT_BAD,
            FatLink::Next(next) => next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        assert_eq!(FatLink::from_raw(0xFFFF), FatLink::Free);
        assert_eq!(FatLink::from_raw(0xFFFE), FatLink::EndOfChain);
        assert_eq!(FatLink::from_raw(0xFFFD), FatLink::Bad);
        assert_eq!(FatLink::from_raw(0), FatLink::Next(0));
        assert_eq!(FatLink::Next(17).to_raw(), 17);
    }
}
