// SPDX-License-Identifier: MIT

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::fs::pmp300::constant::*;

/// Directory header, first 512 bytes of the directory block.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct DirHeader {
    pub entry_count: U16,
    pub blocks_available: U16,
    pub blocks_used: U16,
    pub blocks_remaining: U16,
    pub blocks_bad: U16,
    pub time_last_update: U32,
    pub checksum1: U16,
    pub checksum2: U16,
    pub reserved1: [u8; 2],
    pub version: U16,
    pub reserved2: [u8; 490],
}

const _: () = assert!(core::mem::size_of::<DirHeader>() == HEADER_SIZE);

impl DirHeader {
    /// Header of a freshly formatted medium.
    pub fn empty(capacity: u16, bad: u16) -> Self {
        let mut h = Self::new_zeroed();
        h.blocks_available = capacity.into();
        h.blocks_remaining = capacity.saturating_sub(bad).into();
        h.blocks_bad = bad.into();
        h.version = DIRECTORY_VERSION.into();
        h
    }

    #[inline]
    pub fn entry_count(&self) -> u16 {
        self.entry_count.get()
    }

    #[inline]
    pub fn capacity(&self) -> u16 {
        self.blocks_available.get()
    }

    /// `used + remaining + bad == available`.
    pub fn counters_balanced(&self) -> bool {
        let sum = self.blocks_used.get() as u32
            + self.blocks_remaining.get() as u32
            + self.blocks_bad.get() as u32;
        sum == self.blocks_available.get() as u32
    }

    /// Capacity inside the range the layout can describe.
    #[inline]
    pub fn capacity_is_sane(&self) -> bool {
        (1..=MAX_BLOCKS).contains(&(self.capacity() as usize))
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.version.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets() {
        let mut h = DirHeader::new_zeroed();
        h.checksum1 = 0x1234u16.into();
        h.checksum2 = 0x5678u16.into();
        h.version = 0x0100u16.into();
        let raw = h.as_bytes();
        assert_eq!(&raw[HEADER_CHECKSUM_OFFSET..HEADER_CHECKSUM_OFFSET + 2], &[0x34, 0x12]);
        assert_eq!(&raw[BODY_CHECKSUM_OFFSET..BODY_CHECKSUM_OFFSET + 2], &[0x78, 0x56]);
        assert_eq!(&raw[20..22], &[0x00, 0x01]);
    }

    #[test]
    fn test_empty_is_balanced() {
        let h = DirHeader::empty(1024, 3);
        assert!(h.counters_balanced());
        assert_eq!(h.blocks_remaining.get(), 1021);
        assert!(h.capacity_is_sane());
    }
}
