// SPDX-License-Identifier: MIT

use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::core::utils::checksum_utils::xor_parity;
use crate::fs::pmp300::constant::*;

/// Trailer sent after every 512-byte page on write.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct PageMarker {
    pub lead: [u8; 5],
    pub status: u8,
    pub block: U16,
    pub page: u8,
    pub parity: u8,
    pub tail: [u8; 6],
}

const _: () = assert!(core::mem::size_of::<PageMarker>() == PAGE_MARKER_SIZE);

impl PageMarker {
    pub fn for_page(block: u16, page: u8, data: &[u8]) -> Self {
        Self {
            lead: MARKER_LEAD,
            status: MARKER_STATUS_OK,
            block: block.into(),
            page,
            parity: xor_parity(data),
            tail: MARKER_TAIL,
        }
    }

    /// Checks fixed bytes, addressing and parity against `data`.
    pub fn matches(&self, block: u16, page: u8, data: &[u8]) -> bool {
        *self == Self::for_page(block, page, data)
    }

    /// Builds the full 528-byte frame for one page.
    pub fn frame(block: u16, page: u8, data: &[u8]) -> [u8; PAGE_FRAME_SIZE] {
        let mut frame = [0u8; PAGE_FRAME_SIZE];
        let n = data.len().min(PAGE_SIZE);
        frame[..n].copy_from_slice(&data[..n]);
        let marker = Self::for_page(block, page, &frame[..PAGE_SIZE]);
        frame[PAGE_SIZE..].copy_from_slice(marker.as_bytes());
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let data = [0x5Au8; PAGE_SIZE];
        let frame = PageMarker::frame(0x0102, 9, &data);
        let marker = PageMarker::read_from_bytes(&frame[PAGE_SIZE..]).unwrap();
        assert_eq!(&frame[PAGE_SIZE..PAGE_SIZE + 6], &[0xFF; 6]);
        assert_eq!(marker.block.get(), 0x0102);
        assert_eq!(marker.page, 9);
        assert_eq!(marker.parity, 0);
        assert!(marker.matches(0x0102, 9, &data));
        assert!(!marker.matches(0x0102, 10, &data));
    }
}
