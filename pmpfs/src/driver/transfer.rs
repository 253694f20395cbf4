// SPDX-License-Identifier: MIT

//! Block and directory transfers.
//!
//! Reads stream 512-byte pages in nibble mode; writes send 528-byte frames
//! (page plus [`PageMarker`]). Every transaction ends with `CMD_END`.

use pmpio::prelude::*;

use crate::core::errors::*;
use crate::driver::handshake::Handshake;
use crate::fs::pmp300::allocator::BlockChain;
use crate::fs::pmp300::{constant::*, types::PageMarker};

/// Progress observer for transfers and scans. Called on the driving thread.
pub trait TransferObserver {
    fn on_progress(&mut self, done: u64, total: u64);
}

impl<F: FnMut(u64, u64)> TransferObserver for F {
    #[inline]
    fn on_progress(&mut self, done: u64, total: u64) {
        self(done, total)
    }
}

/// Observer ignoring every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl TransferObserver for NoProgress {
    #[inline]
    fn on_progress(&mut self, _done: u64, _total: u64) {}
}

#[inline]
fn block_command(op: u8, block: u16) -> [u8; 3] {
    let [hi, lo] = block.to_be_bytes();
    [op, hi, lo]
}

/// Sends `cmd`, then reads `buf.len() / PAGE_SIZE` pages into `buf`.
///
/// Stops early (and aborts the device stream) when `buf` is shorter than a block.
fn read_pages<B: PmpBridge>(
    hs: &mut Handshake<B>,
    cmd: &[u8],
    buf: &mut [u8],
    mut on_page: impl FnMut(usize),
) -> DriverResult {
    hs.send_sequence(cmd)?;
    hs.wait_ready()?;
    for (i, page) in buf.chunks_mut(PAGE_SIZE).enumerate() {
        hs.bridge_mut().read_bulk_block(page)?;
        on_page(i);
    }
    hs.end_transaction()
}

fn write_pages<B: PmpBridge>(
    hs: &mut Handshake<B>,
    cmd: &[u8],
    marker_block: u16,
    data: &[u8],
    mut on_page: impl FnMut(usize),
) -> DriverResult {
    hs.send_sequence(cmd)?;
    hs.wait_ready()?;
    for (i, page) in data.chunks(PAGE_SIZE).enumerate() {
        let frame = PageMarker::frame(marker_block, i as u8, page);
        hs.bridge_mut().write_bulk_block(&frame)?;
        hs.wait_ready()?;
        on_page(i);
    }
    hs.end_transaction()
}

pub fn read_directory<B: PmpBridge>(hs: &mut Handshake<B>) -> DriverResult<Vec<u8>> {
    let mut raw = vec![0u8; DIRECTORY_SIZE];
    read_pages(hs, &[CMD_READ_DIRECTORY], &mut raw, |_| {})?;
    Ok(raw)
}

pub fn write_directory<B: PmpBridge>(hs: &mut Handshake<B>, raw: &[u8]) -> DriverResult {
    if raw.len() != DIRECTORY_SIZE {
        return Err(DriverError::Other("Directory image has the wrong length"));
    }
    write_pages(hs, &[CMD_WRITE_DIRECTORY], DIRECTORY_MARKER_BLOCK, raw, |_| {})
}

pub fn read_block<B: PmpBridge>(hs: &mut Handshake<B>, block: u16, buf: &mut [u8]) -> DriverResult {
    if buf.len() > BLOCK_SIZE {
        return Err(DriverError::Other("Read larger than a block"));
    }
    read_pages(hs, &block_command(CMD_READ_BLOCK, block), buf, |_| {})
}

pub fn write_block<B: PmpBridge>(hs: &mut Handshake<B>, block: u16, data: &[u8]) -> DriverResult {
    if data.len() != BLOCK_SIZE {
        return Err(DriverError::Other("Block image has the wrong length"));
    }
    write_pages(hs, &block_command(CMD_WRITE_BLOCK, block), block, data, |_| {})
}

/// Writes `data` over `chain`, padding the last block with `fill`.
pub fn upload<B: PmpBridge, O: TransferObserver + ?Sized>(
    hs: &mut Handshake<B>,
    chain: &BlockChain,
    data: &[u8],
    fill: u8,
    observer: &mut O,
) -> DriverResult {
    if chain.len() * BLOCK_SIZE < data.len() {
        return Err(DriverError::Other("Chain too short for data"));
    }
    let total = data.len() as u64;
    let mut buf = vec![fill; BLOCK_SIZE];

    for (i, &block) in chain.blocks.iter().enumerate() {
        let start = (i * BLOCK_SIZE).min(data.len());
        let end = (start + BLOCK_SIZE).min(data.len());
        buf[..end - start].copy_from_slice(&data[start..end]);
        buf[end - start..].fill(fill);

        log::debug!("writing block {block} ({}/{})", i + 1, chain.len());
        write_pages(hs, &block_command(CMD_WRITE_BLOCK, block), block, &buf, |page| {
            let done = (i * BLOCK_SIZE + (page + 1) * PAGE_SIZE) as u64;
            observer.on_progress(done.min(total), total);
        })?;
    }
    Ok(())
}

/// Reads `chain` and truncates to `size` bytes.
pub fn download<B: PmpBridge, O: TransferObserver + ?Sized>(
    hs: &mut Handshake<B>,
    chain: &BlockChain,
    size: u64,
    observer: &mut O,
) -> DriverResult<Vec<u8>> {
    let size_usize = size as usize;
    if size_usize > chain.len() * BLOCK_SIZE {
        return Err(DriverError::Other("Chain too short for entry size"));
    }
    let mut out = vec![0u8; chain.len() * BLOCK_SIZE];

    for (i, (&block, buf)) in chain.blocks.iter().zip(out.chunks_mut(BLOCK_SIZE)).enumerate() {
        log::debug!("reading block {block} ({}/{})", i + 1, chain.len());
        read_pages(hs, &block_command(CMD_READ_BLOCK, block), buf, |page| {
            let done = (i * BLOCK_SIZE + (page + 1) * PAGE_SIZE) as u64;
            observer.on_progress(done.min(size), size);
        })?;
    }
    out.truncate(size_usize);
    Ok(out)
}

/// Reads bytes `[offset, offset + len)` of a file of `size` bytes, touching
/// only the blocks and leading pages that cover the range.
pub fn read_range<B: PmpBridge>(
    hs: &mut Handshake<B>,
    chain: &BlockChain,
    size: u64,
    offset: u64,
    len: usize,
) -> DriverResult<Vec<u8>> {
    let start = offset.min(size) as usize;
    let end = (offset.saturating_add(len as u64)).min(size) as usize;
    if start >= end {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(end - start);
    let first = start / BLOCK_SIZE;
    let last = (end - 1) / BLOCK_SIZE;
    let mut buf = vec![0u8; BLOCK_SIZE];

    for idx in first..=last {
        let block = *chain
            .blocks
            .get(idx)
            .ok_or(DriverError::Other("Chain too short for entry size"))?;
        let block_start = idx * BLOCK_SIZE;
        let lo = start.max(block_start) - block_start;
        let hi = end.min(block_start + BLOCK_SIZE) - block_start;
        let pages = hi.div_ceil(PAGE_SIZE);

        read_pages(hs, &block_command(CMD_READ_BLOCK, block), &mut buf[..pages * PAGE_SIZE], |_| {})?;
        out.extend_from_slice(&buf[lo..hi]);
    }
    Ok(out)
}

#[cfg(all(test, feature = "mem"))]
mod tests {
    use super::*;
    use crate::driver::handshake::Timing;
    use std::time::Duration;

    fn ready_bridge() -> Handshake<MemBridge> {
        Handshake::new(
            MemBridge::new().with_idle_status(STATUS_READY),
            Timing {
                status_timeout: Duration::from_millis(5),
                poll_interval: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_upload_frames_and_progress() {
        let mut hs = ready_bridge();
        let data: Vec<u8> = (0..40_000u32).map(|i| i as u8).collect();
        let chain = BlockChain::new(vec![5, 9]);
        let mut seen = Vec::new();
        upload(&mut hs, &chain, &data, 0xEE, &mut |d: u64, t: u64| seen.push((d, t))).unwrap();

        let frames = hs.bridge().bulk_writes();
        assert_eq!(frames.len(), 2 * PAGES_PER_BLOCK);
        assert!(frames.iter().all(|f| f.len() == PAGE_FRAME_SIZE));
        assert_eq!(&frames[0][..4], &[0, 1, 2, 3]);
        assert_eq!(&frames[64][PAGE_SIZE + 6..PAGE_SIZE + 9], &[9, 0, 0]);
        // Last page is all padding.
        assert!(frames[127][..PAGE_SIZE].iter().all(|&b| b == 0xEE));

        assert_eq!(seen.len(), 128);
        assert_eq!(seen[0], (512, 40_000));
        assert_eq!(*seen.last().unwrap(), (40_000, 40_000));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_write_block_command_bytes() {
        let mut hs = ready_bridge();
        write_block(&mut hs, 0x0102, &vec![0u8; BLOCK_SIZE]).unwrap();
        let data = hs.bridge().register_writes(Register::Data);
        assert_eq!(&data[..3], &[CMD_WRITE_BLOCK, 0x01, 0x02]);
        assert_eq!(*data.last().unwrap(), CMD_END);
    }

    #[test]
    fn test_download_truncates() {
        let mut hs = ready_bridge();
        hs.bridge_mut().push_bulk(&vec![0x11; BLOCK_SIZE]);
        hs.bridge_mut().push_bulk(&vec![0x22; BLOCK_SIZE]);
        let out = download(&mut hs, &BlockChain::new(vec![0, 1]), 40_000, &mut NoProgress).unwrap();
        assert_eq!(out.len(), 40_000);
        assert_eq!(out[BLOCK_SIZE - 1], 0x11);
        assert_eq!(out[BLOCK_SIZE], 0x22);
    }

    #[test]
    fn test_read_range_reads_leading_pages_only() {
        let mut hs = ready_bridge();
        let page: Vec<u8> = (0..PAGE_SIZE).map(|i| i as u8).collect();
        for _ in 0..3 {
            hs.bridge_mut().push_bulk(&page);
        }
        // File of 1500 bytes in one block, last 128 bytes.
        let out = read_range(&mut hs, &BlockChain::new(vec![3]), 1500, 1372, 128).unwrap();
        assert_eq!(out.len(), 128);
        assert_eq!(out[0], (1372 % PAGE_SIZE) as u8);

        let reads = hs
            .bridge()
            .ops()
            .iter()
            .filter(|op| matches!(op, BridgeOp::ReadBulk(_)))
            .count();
        assert_eq!(reads, 3);
        assert_eq!(*hs.bridge().register_writes(Register::Data).last().unwrap(), CMD_END);
    }

    #[test]
    fn test_timeout_before_first_page() {
        let mut hs = Handshake::new(
            MemBridge::new(),
            Timing {
                status_timeout: Duration::from_millis(2),
                poll_interval: Duration::ZERO,
            },
        );
        assert!(matches!(read_directory(&mut hs), Err(DriverError::Timeout { .. })));
    }
}
