// SPDX-License-Identifier: MIT

pub use crate::core::checker::*;

use crate::core::utils::usage_map::*;
use crate::fs::pmp300::allocator::walk_chain;
use crate::fs::pmp300::{constant::*, directory::Directory, types::*};

impl FsChecker for Directory {
    fn verify(&self, opts: &VerifyOptions) -> VerifyReport {
        let mut rep = VerifyReport::default();
        let phases = opts.phases;

        let steps: [(VerifyPhases, fn(&Directory, &mut VerifyReport)); 4] = [
            (VerifyPhases::HEADER, check_header),
            (VerifyPhases::USAGE, check_usage),
            (VerifyPhases::ENTRIES, check_entries),
            (VerifyPhases::CHAIN.union(VerifyPhases::CROSSREF), check_crossref),
        ];

        for (phase, step) in steps {
            if !phases.intersects(phase) {
                continue;
            }
            step(self, &mut rep);
            if opts.fail_fast && rep.has_error() {
                break;
            }
        }
        rep
    }
}

fn check_header(dir: &Directory, rep: &mut VerifyReport) {
    let h = &dir.header;
    if !h.capacity_is_sane() {
        rep.push(Finding::err(
            "HDR.CAPACITY",
            format!("blocks available {} outside 1..={MAX_BLOCKS}", h.capacity()),
        ));
    }
    if !h.counters_balanced() {
        rep.push(Finding::err(
            "HDR.COUNTERS",
            format!(
                "used {} + remaining {} + bad {} != available {}",
                h.blocks_used.get(),
                h.blocks_remaining.get(),
                h.blocks_bad.get(),
                h.capacity()
            ),
        ));
    }
    if h.entry_count() as usize > MAX_ENTRIES {
        rep.push(Finding::err(
            "HDR.ENTRIES",
            format!("entry count {} > {MAX_ENTRIES}", h.entry_count()),
        ));
    }
    if h.version() != DIRECTORY_VERSION {
        rep.push(Finding::info(
            "HDR.VERSION",
            format!("version tag 0x{:04X}", h.version()),
        ));
    }
}

fn check_usage(dir: &Directory, rep: &mut VerifyReport) {
    let cap = dir.capacity();
    let mut mismatches = 0usize;

    for b in 0..cap {
        let state = dir.usage.state(b);
        let link = dir.link(b as u16);
        let agrees = match (state, link) {
            (BlockState::Free, FatLink::Free) => true,
            (BlockState::Bad, FatLink::Bad) => true,
            (BlockState::Used, FatLink::EndOfChain | FatLink::Next(_)) => true,
            _ => false,
        };
        if !agrees {
            mismatches += 1;
            if mismatches <= 8 {
                rep.push(Finding::err(
                    "MAP.FAT",
                    format!("block {b}: usage {state:?} vs FAT {link:?}"),
                ));
            }
        }
    }
    if mismatches > 8 {
        rep.push(Finding::err(
            "MAP.FAT",
            format!("{} more usage/FAT mismatches", mismatches - 8),
        ));
    }

    let used = dir.usage.count_state(cap, BlockState::Used);
    if used != dir.header.blocks_used.get() as usize {
        rep.push(Finding::err(
            "MAP.USED",
            format!("{used} blocks used in map, header says {}", dir.header.blocks_used.get()),
        ));
    }
    let bad = dir.usage.count_state(cap, BlockState::Bad);
    if bad != dir.header.blocks_bad.get() as usize {
        rep.push(Finding::err(
            "MAP.BAD",
            format!("{bad} blocks bad in map, header says {}", dir.header.blocks_bad.get()),
        ));
    }

    let stray = (cap..MAX_BLOCKS)
        .filter(|&b| dir.usage[b] != USAGE_FREE)
        .count();
    if stray > 0 {
        rep.push(Finding::warn(
            "MAP.STRAY",
            format!("{stray} usage bytes set past capacity"),
        ));
    }
}

fn check_entries(dir: &Directory, rep: &mut VerifyReport) {
    for (i, e) in dir.entries.iter().enumerate() {
        let name = e.name();
        let expected = DirEntry::blocks_for(e.size() as u64);
        if e.block_count() as usize != expected {
            rep.push(Finding::err(
                "ENT.BLOCKS",
                format!(
                    "#{i} {name}: {} blocks for {} bytes (want {expected})",
                    e.block_count(),
                    e.size()
                ),
            ));
        }
        if e.size_mod.get() as usize != e.size() as usize % BLOCK_SIZE {
            rep.push(Finding::warn(
                "ENT.SIZEMOD",
                format!("#{i} {name}: size remainder field disagrees with size"),
            ));
        }
        if dir.entries[..i].iter().any(|o| o.name == e.name) {
            rep.push(Finding::warn("ENT.DUP", format!("#{i} {name}: duplicate name")));
        }
    }
}

fn check_crossref(dir: &Directory, rep: &mut VerifyReport) {
    let cap = dir.capacity();
    let mut owner: Vec<Option<usize>> = vec![None; cap];

    for (i, e) in dir.entries.iter().enumerate() {
        if e.block_count() == 0 {
            continue;
        }
        let chain = match walk_chain(dir, e.block_position()) {
            Ok(chain) => chain,
            Err(err) => {
                rep.push(Finding::err("CHAIN.WALK", format!("#{i} {}: {err}", e.name())));
                continue;
            }
        };
        if chain.len() != e.block_count() as usize {
            rep.push(Finding::err(
                "CHAIN.LEN",
                format!(
                    "#{i} {}: chain has {} blocks, entry says {}",
                    e.name(),
                    chain.len(),
                    e.block_count()
                ),
            ));
        }
        for b in chain.blocks {
            match owner[b as usize] {
                Some(other) => rep.push(Finding::err(
                    "CHAIN.XLINK",
                    format!("block {b} shared by #{other} and #{i}"),
                )),
                None => owner[b as usize] = Some(i),
            }
        }
    }

    let orphans = (0..cap)
        .filter(|&b| owner[b].is_none() && dir.usage.state(b) == BlockState::Used)
        .count();
    if orphans > 0 {
        rep.push(Finding::warn(
            "CHAIN.ORPHAN",
            format!("{orphans} used blocks not owned by any entry"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::pmp300::table::FileTable;

    #[test]
    fn test_clean_directory_passes() {
        let mut dir = Directory::empty(128, &[4]);
        let mut t = FileTable::new(&mut dir);
        t.add_entry("a", 100_000, 0).unwrap();
        t.add_entry("b", 0, 0).unwrap();
        let rep = dir.verify_all();
        assert!(rep.ok(), "{rep}");
    }

    #[test]
    fn test_detects_cross_link_and_counters() {
        let mut dir = Directory::empty(16, &[]);
        let mut t = FileTable::new(&mut dir);
        t.add_entry("a", 2 * BLOCK_SIZE as u32, 0).unwrap();
        t.add_entry("b", 1, 0).unwrap();
        dir.entries[1].block_position = 1u16.into();
        dir.header.blocks_bad = 5u16.into();

        let rep = dir.verify_all();
        assert!(rep.has_code("CHAIN.XLINK"));
        assert!(rep.has_code("HDR.COUNTERS"));
        assert!(rep.has_code("CHAIN.ORPHAN"));
    }

    #[test]
    fn test_phase_selection() {
        let mut dir = Directory::empty(16, &[]);
        dir.usage[3] = USAGE_USED;
        let opts = VerifyOptions {
            phases: VerifyPhases::HEADER,
            fail_fast: false,
        };
        assert!(dir.verify(&opts).ok());
        assert!(dir.verify_all().has_code("MAP.FAT"));
    }
}
