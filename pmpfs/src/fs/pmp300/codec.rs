// SPDX-License-Identifier: MIT

//! Directory block codec.
//!
//! [`decode`] never refuses a block of the right length: checksum or
//! count problems travel next to the parsed value in [`DirectoryRead`] so
//! diagnostics can still look at corrupt media.

use zerocopy::{FromBytes, IntoBytes};

use crate::core::errors::*;
use crate::core::utils::checksum_utils::*;
use crate::fs::pmp300::{constant::*, directory::Directory, types::*};

/// Parsed directory plus the validation problem found, if any.
///
/// A header checksum mismatch is reported over a body mismatch.
#[derive(Clone, Debug)]
pub struct DirectoryRead {
    pub directory: Directory,
    pub error: Option<CodecError>,
}

impl DirectoryRead {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> CodecResult<Directory> {
        match self.error {
            None => Ok(self.directory),
            Some(e) => Err(e),
        }
    }
}

/// Header checksum over the first 512 bytes, skipping its own field.
#[inline]
pub fn header_checksum(raw: &[u8]) -> u16 {
    sum16_skipping(
        &raw[..HEADER_SIZE],
        HEADER_CHECKSUM_OFFSET..HEADER_CHECKSUM_OFFSET + 2,
    )
}

/// Body checksum over entries, usage map and FAT.
#[inline]
pub fn body_checksum(raw: &[u8]) -> u16 {
    sum16(&raw[ENTRIES_OFFSET..DIRECTORY_SIZE])
}

pub fn decode(raw: &[u8]) -> CodecResult<DirectoryRead> {
    if raw.len() != DIRECTORY_SIZE {
        return Err(CodecError::InvalidLength {
            expected: DIRECTORY_SIZE,
            got: raw.len(),
        });
    }

    let header = DirHeader::read_from_bytes(&raw[..HEADER_SIZE])
        .map_err(|_| CodecError::Invalid("Invalid directory header"))?;

    let mut error = None;

    let stored = header.checksum2.get();
    let computed = body_checksum(raw);
    if stored != computed {
        error = Some(CodecError::BodyChecksum { stored, computed });
    }

    let stored = header.checksum1.get();
    let computed = header_checksum(raw);
    if stored != computed {
        error = Some(CodecError::HeaderChecksum { stored, computed });
    }

    let count = header.entry_count();
    if count as usize > MAX_ENTRIES && error.is_none() {
        error = Some(CodecError::TooManyEntries(count));
    }

    let entries = raw[ENTRIES_OFFSET..USAGE_OFFSET]
        .chunks_exact(ENTRY_SIZE)
        .take((count as usize).min(MAX_ENTRIES))
        .map(|slot| {
            DirEntry::read_from_bytes(slot).map_err(|_| CodecError::Invalid("Invalid entry slot"))
        })
        .collect::<CodecResult<Vec<_>>>()?;

    let usage = raw[USAGE_OFFSET..FAT_OFFSET].to_vec();
    let fat = raw[FAT_OFFSET..DIRECTORY_SIZE]
        .chunks_exact(2)
        .map(|w| u16::from_le_bytes([w[0], w[1]]))
        .collect();

    if let Some(e) = &error {
        log::warn!("directory validation failed: {e}");
    }

    Ok(DirectoryRead {
        directory: Directory {
            header,
            entries,
            usage,
            fat,
        },
        error,
    })
}

/// Serializes `dir` with fresh checksums. Slots past the entry list are zeroed.
pub fn encode(dir: &Directory) -> Vec<u8> {
    let mut raw = vec![0u8; DIRECTORY_SIZE];
    encode_into(dir, &mut raw);
    raw
}

fn encode_into(dir: &Directory, raw: &mut [u8]) {
    raw[..HEADER_SIZE].copy_from_slice(dir.header.as_bytes());
    raw[HEADER_SIZE..ENTRIES_OFFSET].fill(0);

    let slots = &mut raw[ENTRIES_OFFSET..USAGE_OFFSET];
    slots.fill(0);
    for (slot, entry) in slots
        .chunks_exact_mut(ENTRY_SIZE)
        .zip(dir.entries.iter().take(MAX_ENTRIES))
    {
        slot.copy_from_slice(entry.as_bytes());
    }
    // Entry count always reflects the slots actually written.
    let written = dir.entries.len().min(MAX_ENTRIES) as u16;
    raw[0..2].copy_from_slice(&written.to_le_bytes());

    let usage = &mut raw[USAGE_OFFSET..FAT_OFFSET];
    let n = dir.usage.len().min(MAX_BLOCKS);
    usage[..n].copy_from_slice(&dir.usage[..n]);

    for (slot, link) in raw[FAT_OFFSET..DIRECTORY_SIZE]
        .chunks_exact_mut(2)
        .zip(dir.fat.iter())
    {
        slot.copy_from_slice(&link.to_le_bytes());
    }

    let body = body_checksum(raw);
    raw[BODY_CHECKSUM_OFFSET..BODY_CHECKSUM_OFFSET + 2].copy_from_slice(&body.to_le_bytes());
    let head = header_checksum(raw);
    raw[HEADER_CHECKSUM_OFFSET..HEADER_CHECKSUM_OFFSET + 2].copy_from_slice(&head.to_le_bytes());
}

/// Encodes `dir` and stores the new checksums back into its header.
pub fn seal(dir: &mut Directory) -> Vec<u8> {
    dir.sync_entry_count();
    let raw = encode(dir);
    dir.header.checksum1 = u16::from_le_bytes([
        raw[HEADER_CHECKSUM_OFFSET],
        raw[HEADER_CHECKSUM_OFFSET + 1],
    ])
    .into();
    dir.header.checksum2 =
        u16::from_le_bytes([raw[BODY_CHECKSUM_OFFSET], raw[BODY_CHECKSUM_OFFSET + 1]]).into();
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::usage_map::USAGE_USED;

    fn sample() -> Directory {
        let mut dir = Directory::empty(1024, &[10]);
        dir.entries.push(DirEntry::new("one.mp3", 40_000, 0, 2, 700_000_000));
        dir.entries.push(DirEntry::new("two.mp3", 10, 2, 1, 700_000_100));
        dir.usage[0..3].fill(USAGE_USED);
        dir.fat[0] = 1;
        dir.fat[1] = FAT_EOC;
        dir.fat[2] = FAT_EOC;
        dir.header.reserved2[17] = 0xC3;
        dir.header.reserved1 = [0xAB, 0xCD];
        dir.entries[1].reserved1 = [1, 2, 3, 4, 5];
        dir.recount();
        dir
    }

    #[test]
    fn test_round_trip_preserves_reserved() {
        let mut dir = sample();
        let raw = seal(&mut dir);
        let read = decode(&raw).unwrap();
        assert!(read.is_valid(), "{:?}", read.error);
        assert_eq!(read.directory, dir);
        assert_eq!(read.directory.header.reserved2[17], 0xC3);
        assert_eq!(read.directory.entries[1].reserved1, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_every_body_byte_flip_is_detected() {
        let mut dir = sample();
        let raw = seal(&mut dir);
        for offset in [ENTRIES_OFFSET, ENTRIES_OFFSET + 130, USAGE_OFFSET + 5, FAT_OFFSET + 1, DIRECTORY_SIZE - 1] {
            let mut bad = raw.clone();
            bad[offset] ^= 0x01;
            let read = decode(&bad).unwrap();
            assert!(
                matches!(read.error, Some(CodecError::BodyChecksum { .. })),
                "flip at {offset:#x} not detected"
            );
            assert_eq!(read.directory.entries.len(), 2);
            assert_eq!(read.directory.header.capacity(), 1024);
        }
    }

    #[test]
    fn test_header_flip_is_detected() {
        let mut dir = sample();
        let mut raw = seal(&mut dir);
        raw[300] ^= 0x80;
        let read = decode(&raw).unwrap();
        assert!(matches!(read.error, Some(CodecError::HeaderChecksum { .. })));
        assert_eq!(read.directory.entries[0].name(), "one.mp3");
    }

    #[test]
    fn test_blank_media_is_best_effort() {
        let raw = vec![0xFFu8; DIRECTORY_SIZE];
        let read = decode(&raw).unwrap();
        assert!(read.error.unwrap().is_checksum());
        assert_eq!(read.directory.entries.len(), MAX_ENTRIES);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        assert_eq!(
            decode(&[0u8; 10]).unwrap_err(),
            CodecError::InvalidLength {
                expected: DIRECTORY_SIZE,
                got: 10
            }
        );
    }

    #[test]
    fn test_unused_slots_are_zeroed() {
        let mut dir = sample();
        let raw = seal(&mut dir);
        assert!(raw[ENTRIES_OFFSET + 2 * ENTRY_SIZE..USAGE_OFFSET].iter().all(|&b| b == 0));
    }
}
