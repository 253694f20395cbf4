// SPDX-License-Identifier: MIT

// === Media Geometry ===

pub const BLOCK_SIZE: usize = 32_768;
pub const PAGE_SIZE: usize = 512;
pub const PAGES_PER_BLOCK: usize = BLOCK_SIZE / PAGE_SIZE;
pub const PAGE_MARKER_SIZE: usize = 16;
pub const PAGE_FRAME_SIZE: usize = PAGE_SIZE + PAGE_MARKER_SIZE;

pub const MAX_BLOCKS: usize = 8_192;
pub const MAX_ENTRIES: usize = 60;

/// Internal flash of the standard (32 MB) model.
pub const STANDARD_INTERNAL_BLOCKS: u16 = 1_024;
/// Internal flash of the SE (64 MB) model.
pub const LARGE_INTERNAL_BLOCKS: u16 = 2_048;

// === Directory Block Layout ===

pub const DIRECTORY_SIZE: usize = BLOCK_SIZE;
pub const HEADER_SIZE: usize = 512;
pub const ENTRY_SIZE: usize = 128;

pub const ENTRIES_OFFSET: usize = 0x0200;
pub const USAGE_OFFSET: usize = 0x2000;
pub const FAT_OFFSET: usize = 0x4000;

/// Checksum covering the header, minus its own two bytes.
pub const HEADER_CHECKSUM_OFFSET: usize = 14;
/// Checksum covering entries, usage map and FAT.
pub const BODY_CHECKSUM_OFFSET: usize = 16;

pub const DIRECTORY_VERSION: u16 = 0x0100;

// === FAT Markers ===

pub const FAT_FREE: u16 = 0xFFFF;
pub const FAT_EOC: u16 = 0xFFFE;
pub const FAT_BAD: u16 = 0xFFFD;

// === Entry Names ===

pub const NAME_FIELD_SIZE: usize = 100;
/// One byte stays NUL.
pub const MAX_NAME_LEN: usize = NAME_FIELD_SIZE - 1;

// === Page Marker ===

pub const MARKER_LEAD: [u8; 5] = [0xFF; 5];
pub const MARKER_STATUS_OK: u8 = 0xFF;
pub const MARKER_TAIL: [u8; 6] = [0xFF; 6];
/// Block field of markers sent with directory pages.
pub const DIRECTORY_MARKER_BLOCK: u16 = 0xFFFF;

pub const DEFAULT_FILL_BYTE: u8 = 0x00;

// === Handshake Registers ===

pub const CTRL_IDLE: u8 = 0x04;
pub const CTRL_STROBE: u8 = 0x0C;
pub const CTRL_RESET: u8 = 0x00;

pub const STATUS_MASK: u8 = 0xF8;
pub const STATUS_READY: u8 = 0x78;

/// Settle time around the reset pulse.
pub const RESET_DELAY_MS: u16 = 20;

// === Device Commands ===

pub const CMD_SELECT_INTERNAL: u8 = 0xC0;
pub const CMD_SELECT_EXTERNAL: u8 = 0xC1;
pub const CMD_READ_DIRECTORY: u8 = 0xB0;
pub const CMD_READ_BLOCK: u8 = 0xB1;
pub const CMD_WRITE_DIRECTORY: u8 = 0xB2;
pub const CMD_WRITE_BLOCK: u8 = 0xB3;
pub const CMD_END: u8 = 0xA8;

pub const CMD_WAKE: u8 = CMD_END;
pub const INIT_SEQUENCE: [u8; 5] = [0xAD, 0x55, 0xAE, 0xAA, 0xA8];

// Layout sanity
const _: () = assert!(ENTRIES_OFFSET + MAX_ENTRIES * ENTRY_SIZE == USAGE_OFFSET);
const _: () = assert!(USAGE_OFFSET + MAX_BLOCKS == FAT_OFFSET);
const _: () = assert!(FAT_OFFSET + MAX_BLOCKS * 2 == DIRECTORY_SIZE);
