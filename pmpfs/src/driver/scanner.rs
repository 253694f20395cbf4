// SPDX-License-Identifier: MIT

//! Full-surface bad-block scan.

use pmpio::prelude::*;

use crate::core::errors::*;
use crate::driver::handshake::Handshake;
use crate::driver::transfer::{TransferObserver, read_block, write_block};
use crate::fs::pmp300::constant::*;

/// Deterministic per-block pattern; differs between neighbouring blocks so
/// aliased addressing shows up as a mismatch.
pub fn test_pattern(block: u16) -> Vec<u8> {
    let seed = block.to_le_bytes();
    (0..BLOCK_SIZE)
        .map(|i| {
            let lane = (i & 0xFF) as u8;
            match (i >> 8) & 3 {
                0 => 0x55 ^ lane,
                1 => 0xAA ^ seed[0],
                2 => lane.wrapping_add(seed[1]),
                _ => !lane ^ seed[0],
            }
        })
        .collect()
}

/// Writes, reads back and compares every block in `0..capacity`.
///
/// Returns the blocks whose read-back differed. Channel and timeout errors
/// abort the scan. The observer sees `(blocks_done, capacity)`.
pub fn scan_surface<B: PmpBridge, O: TransferObserver + ?Sized>(
    hs: &mut Handshake<B>,
    capacity: u16,
    observer: &mut O,
) -> DriverResult<Vec<u16>> {
    let mut bad = Vec::new();
    let mut readback = vec![0u8; BLOCK_SIZE];

    for block in 0..capacity {
        let pattern = test_pattern(block);
        write_block(hs, block, &pattern)?;
        read_block(hs, block, &mut readback)?;
        if readback != pattern {
            log::warn!("block {block} failed verification");
            bad.push(block);
        }
        observer.on_progress(u64::from(block) + 1, u64::from(capacity));
    }

    log::debug!("surface scan: {} of {capacity} block(s) bad", bad.len());
    Ok(bad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_differs_per_block() {
        let a = test_pattern(0);
        let b = test_pattern(1);
        let c = test_pattern(256);
        assert_eq!(a.len(), BLOCK_SIZE);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, test_pattern(0));
        // Neither all-erased nor all-zero.
        assert!(a.iter().any(|&x| x != 0xFF));
        assert!(a.iter().any(|&x| x != 0x00));
    }
}
