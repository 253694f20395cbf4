// SPDX-License-Identifier: MIT

use core::fmt;

use crate::fs::pmp300::constant::*;

/// One of the two independent storage targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StorageMedium {
    #[default]
    Internal,
    External,
}

impl StorageMedium {
    pub const ALL: [StorageMedium; 2] = [StorageMedium::Internal, StorageMedium::External];

    /// Slot in per-medium arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            StorageMedium::Internal => 0,
            StorageMedium::External => 1,
        }
    }

    #[inline]
    pub const fn select_command(self) -> u8 {
        match self {
            StorageMedium::Internal => CMD_SELECT_INTERNAL,
            StorageMedium::External => CMD_SELECT_EXTERNAL,
        }
    }
}

impl fmt::Display for StorageMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageMedium::Internal => "internal",
            StorageMedium::External => "external",
        })
    }
}

/// Capacity class derived from the directory's blocks-available field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityVariant {
    /// Up to 1,024 blocks (32 MB).
    Standard,
    /// More than 1,024 blocks (SE, 64 MB).
    Large,
    /// Directory unreadable, capacity not known.
    Unknown,
}

impl CapacityVariant {
    pub fn from_blocks(blocks: u16) -> Self {
        match blocks as usize {
            0 => CapacityVariant::Unknown,
            n if n > MAX_BLOCKS => CapacityVariant::Unknown,
            n if n > STANDARD_INTERNAL_BLOCKS as usize => CapacityVariant::Large,
            _ => CapacityVariant::Standard,
        }
    }

    /// Nominal internal capacity in blocks.
    pub fn internal_blocks(self) -> Option<u16> {
        match self {
            CapacityVariant::Standard => Some(STANDARD_INTERNAL_BLOCKS),
            CapacityVariant::Large => Some(LARGE_INTERNAL_BLOCKS),
            CapacityVariant::Unknown => None,
        }
    }
}

impl fmt::Display for CapacityVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapacityVariant::Standard => "standard",
            CapacityVariant::Large => "large",
            CapacityVariant::Unknown => "unknown",
        })
    }
}
