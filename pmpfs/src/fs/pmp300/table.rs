// SPDX-License-Identifier: MIT

use crate::core::errors::*;
use crate::core::utils::usage_map::*;
use crate::fs::pmp300::allocator::{BlockAllocator, BlockChain, FsAllocator};
use crate::fs::pmp300::{constant::*, directory::Directory, types::*};

/// Checks an entry name: 1..=99 printable ASCII bytes, no path separators.
pub fn validate_name(name: &str) -> TableResult {
    if name.is_empty() {
        return Err(TableError::InvalidName("Name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(TableError::InvalidName("Name is longer than 99 bytes"));
    }
    if !name.bytes().all(|b| (0x20..0x7F).contains(&b)) {
        return Err(TableError::InvalidName("Name must be printable ASCII"));
    }
    if name.contains(['/', '\\']) {
        return Err(TableError::InvalidName("Name must not contain path separators"));
    }
    Ok(())
}

/// Ordered entry list operations over one [`Directory`].
///
/// Entry order is playback order. Every operation leaves the header
/// counters balanced; committing the result is the caller's job.
pub struct FileTable<'a> {
    dir: &'a mut Directory,
}

impl<'a> FileTable<'a> {
    pub fn new(dir: &'a mut Directory) -> Self {
        Self { dir }
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.dir.entries
    }

    fn lookup(&self, name: &str) -> TableResult<usize> {
        self.dir.find(name).ok_or(TableError::NotFound)
    }

    fn check_index(&self, index: usize) -> TableResult {
        let len = self.dir.entries.len();
        if index >= len {
            return Err(TableError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    /// Allocates blocks for `size` bytes and appends a new entry.
    pub fn add_entry(&mut self, name: &str, size: u32, time: u32) -> TableResult<BlockChain> {
        validate_name(name)?;
        if self.dir.entries.len() >= MAX_ENTRIES {
            return Err(TableError::Full);
        }

        let chain = BlockAllocator::new(self.dir).allocate_bytes(size as u64)?;
        let entry = DirEntry::new(name, size, chain.head(), chain.len() as u16, time);
        self.dir.entries.push(entry);
        self.dir.sync_entry_count();
        Ok(chain)
    }

    /// Removes the first entry named `name` and frees its chain.
    pub fn remove_entry(&mut self, name: &str) -> TableResult<DirEntry> {
        let index = self.lookup(name)?;
        self.remove_at(index)
    }

    pub fn remove_at(&mut self, index: usize) -> TableResult<DirEntry> {
        self.check_index(index)?;
        let entry = self.dir.entries[index];
        BlockAllocator::new(self.dir).free(entry.block_position(), entry.block_count() as usize)?;
        self.dir.entries.remove(index);
        self.dir.sync_entry_count();
        Ok(entry)
    }

    /// Drops every entry and frees the used blocks; bad and unknown blocks stay.
    pub fn remove_all(&mut self) -> usize {
        let removed = self.dir.entries.len();
        self.dir.entries.clear();
        self.dir.sync_entry_count();

        let cap = self.dir.capacity();
        for b in 0..cap {
            if self.dir.usage.state(b) == BlockState::Used {
                self.dir.usage.set_state(b, BlockState::Free);
                self.dir.fat[b] = FAT_FREE;
            }
        }
        self.dir.recount();
        removed
    }

    /// Moves the entry at `from` to position `to` (0-based).
    pub fn move_entry(&mut self, from: usize, to: usize) -> TableResult {
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let entry = self.dir.entries.remove(from);
            self.dir.entries.insert(to, entry);
        }
        Ok(())
    }

    /// Renames the first entry named `old` in place.
    pub fn rename(&mut self, old: &str, new: &str) -> TableResult {
        validate_name(new)?;
        let index = self.lookup(old)?;
        self.dir.entries[index].set_name(new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(dir: &Directory) -> Vec<String> {
        dir.entries.iter().map(DirEntry::name).collect()
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("track 01.mp3").is_ok());
        assert!(validate_name(&"a".repeat(99)).is_ok());
        assert!(validate_name(&"a".repeat(100)).is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name("dir/x.mp3").is_err());
        assert!(validate_name("x\\y").is_err());
        assert!(validate_name("caf\u{e9}.mp3").is_err());
        assert!(validate_name("tab\t").is_err());
    }

    #[test]
    fn test_add_remove_keeps_counters() {
        let mut dir = Directory::empty(1024, &[]);
        let mut table = FileTable::new(&mut dir);
        let chain = table.add_entry("a.mp3", 100_000, 0).unwrap();
        assert_eq!(chain.len(), 4);
        table.add_entry("empty.mp3", 0, 0).unwrap();
        assert_eq!(dir.header.blocks_used.get(), 4);
        assert_eq!(dir.header.entry_count(), 2);
        assert!(dir.header.counters_balanced());

        let removed = FileTable::new(&mut dir).remove_entry("a.mp3").unwrap();
        assert_eq!(removed.block_count(), 4);
        assert_eq!(dir.header.blocks_used.get(), 0);
        assert_eq!(dir.header.blocks_remaining.get(), 1024);
        assert_eq!(names(&dir), ["empty.mp3"]);
    }

    #[test]
    fn test_remove_missing_name() {
        let mut dir = Directory::empty(8, &[]);
        assert_eq!(
            FileTable::new(&mut dir).remove_entry("nope").unwrap_err(),
            TableError::NotFound
        );
    }

    #[test]
    fn test_remove_targets_first_duplicate() {
        let mut dir = Directory::empty(8, &[]);
        let mut table = FileTable::new(&mut dir);
        table.add_entry("dup", 10, 1).unwrap();
        table.add_entry("dup", 10, 2).unwrap();
        let removed = table.remove_entry("dup").unwrap();
        assert_eq!(removed.time_upload.get(), 1);
        assert_eq!(dir.entries[0].time_upload.get(), 2);
    }

    #[test]
    fn test_full_directory() {
        let mut dir = Directory::empty(8, &[]);
        let mut table = FileTable::new(&mut dir);
        for i in 0..MAX_ENTRIES {
            table.add_entry(&format!("f{i}"), 0, 0).unwrap();
        }
        assert_eq!(table.add_entry("one-more", 0, 0).unwrap_err(), TableError::Full);
    }

    #[test]
    fn test_capacity_error_adds_nothing() {
        let mut dir = Directory::empty(2, &[]);
        let err = FileTable::new(&mut dir)
            .add_entry("big", 3 * BLOCK_SIZE as u32, 0)
            .unwrap_err();
        assert!(matches!(err, TableError::Allocator(AllocatorError::OutOfBlocks { .. })));
        assert!(dir.entries.is_empty());
    }

    #[test]
    fn test_move_and_back() {
        let mut dir = Directory::empty(64, &[]);
        let mut table = FileTable::new(&mut dir);
        for n in ["first", "second", "third", "fourth"] {
            table.add_entry(n, 10, 0).unwrap();
        }
        let original = names(&dir);

        FileTable::new(&mut dir).move_entry(2, 0).unwrap();
        assert_eq!(names(&dir), ["third", "first", "second", "fourth"]);

        for from in 0..4 {
            for to in 0..4 {
                let mut d = dir.clone();
                let before = names(&d);
                FileTable::new(&mut d).move_entry(from, to).unwrap();
                FileTable::new(&mut d).move_entry(to, from).unwrap();
                assert_eq!(names(&d), before, "({from}, {to})");
            }
        }

        FileTable::new(&mut dir).move_entry(0, 2).unwrap();
        assert_eq!(names(&dir), original);
        assert_eq!(
            FileTable::new(&mut dir).move_entry(0, 4).unwrap_err(),
            TableError::IndexOutOfRange { index: 4, len: 4 }
        );
    }

    #[test]
    fn test_remove_all_keeps_bad_blocks() {
        let mut dir = Directory::empty(32, &[7]);
        let mut table = FileTable::new(&mut dir);
        table.add_entry("a", 5 * BLOCK_SIZE as u32, 0).unwrap();
        table.add_entry("b", 1, 0).unwrap();
        assert_eq!(table.remove_all(), 2);

        assert_eq!(dir.header.entry_count(), 0);
        assert_eq!(dir.header.blocks_used.get(), 0);
        assert_eq!(dir.header.blocks_bad.get(), 1);
        assert_eq!(dir.header.blocks_remaining.get(), 31);
        assert_eq!(dir.link(7), FatLink::Bad);
        assert_eq!(dir, Directory::empty(32, &[7]));
    }

    #[test]
    fn test_remove_all_keeps_unknown_blocks() {
        let mut dir = Directory::empty(8, &[]);
        dir.usage[2] = 0x42;
        dir.recount();
        assert_eq!(dir.header.blocks_bad.get(), 1);

        let mut table = FileTable::new(&mut dir);
        table.add_entry("a", 2 * BLOCK_SIZE as u32, 0).unwrap();
        table.remove_all();

        assert_eq!(dir.header.blocks_bad.get(), 1);
        assert_eq!(dir.state(2), BlockState::Unknown(0x42));
        let chain = BlockAllocator::new(&mut dir).allocate_blocks(3).unwrap();
        assert_eq!(chain.blocks, [0, 1, 3]);
    }

    #[test]
    fn test_rename() {
        let mut dir = Directory::empty(8, &[]);
        let mut table = FileTable::new(&mut dir);
        table.add_entry("old.mp3", 1, 0).unwrap();
        table.rename("old.mp3", "new.mp3").unwrap();
        assert_eq!(table.rename("old.mp3", "x").unwrap_err(), TableError::NotFound);
        assert!(table.rename("new.mp3", "").is_err());
        assert_eq!(names(&dir), ["new.mp3"]);
    }
}
