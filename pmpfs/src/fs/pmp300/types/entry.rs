// SPDX-License-Identifier: MIT

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::fs::pmp300::constant::*;

/// One 128-byte directory entry slot.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct DirEntry {
    pub block_position: U16,
    pub block_count: U16,
    pub size_mod: U16,
    pub size: U32,
    pub reserved1: [u8; 5],
    pub time_upload: U32,
    pub property: [u8; 4],
    pub reserved2: [u8; 5],
    pub name: [u8; NAME_FIELD_SIZE],
}

const _: () = assert!(core::mem::size_of::<DirEntry>() == ENTRY_SIZE);

impl DirEntry {
    /// Builds an entry; `name` must already be validated.
    pub fn new(name: &str, size: u32, block_position: u16, block_count: u16, time: u32) -> Self {
        let mut e = Self::new_zeroed();
        e.block_position = block_position.into();
        e.block_count = block_count.into();
        e.size_mod = ((size as usize % BLOCK_SIZE) as u16).into();
        e.size = size.into();
        e.time_upload = time.into();
        e.set_name(name);
        e
    }

    /// Name with trailing NUL padding trimmed.
    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_SIZE);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    #[inline]
    pub fn name_eq(&self, target: &str) -> bool {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_SIZE);
        &self.name[..end] == target.as_bytes()
    }

    /// Truncates to the field width minus one for the NUL.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0u8; NAME_FIELD_SIZE];
        let n = name.len().min(MAX_NAME_LEN);
        self.name[..n].copy_from_slice(&name.as_bytes()[..n]);
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size.get()
    }

    #[inline]
    pub fn block_count(&self) -> u16 {
        self.block_count.get()
    }

    #[inline]
    pub fn block_position(&self) -> u16 {
        self.block_position.get()
    }

    /// Blocks a file of `size` bytes occupies.
    #[inline]
    pub fn blocks_for(size: u64) -> usize {
        (size as usize).div_ceil(BLOCK_SIZE)
    }
}
