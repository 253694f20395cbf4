// SPDX-License-Identifier: MIT

use crate::error::BridgeResult;
use crate::{DataDirection, FirmwareVersion, PmpBridge, Register};

/// Bridge traffic counters.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct BridgeStats {
    pub register_writes: u64,
    pub status_reads: u64,
    pub bulk_writes: u64,
    pub bulk_write_bytes: u64,
    pub bulk_reads: u64,
    pub bulk_read_bytes: u64,
    pub delay_ms_total: u64,
    pub errors: u64,
}

impl BridgeStats {
    #[inline]
    pub fn reset(&mut self) {
        *self = BridgeStats::default();
    }

    /// Number of request/response round trips.
    #[inline]
    pub fn round_trips(&self) -> u64 {
        self.register_writes + self.status_reads + self.bulk_writes + self.bulk_reads
    }
}

/// Transparent instrumentation wrapper.
pub struct BridgeCounter<B: PmpBridge> {
    inner: B,
    pub stats: BridgeStats,
}

impl<B: PmpBridge> BridgeCounter<B> {
    #[inline]
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            stats: BridgeStats::default(),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> BridgeStats {
        self.stats
    }

    #[inline]
    pub fn get_ref(&self) -> &B {
        &self.inner
    }

    #[inline]
    pub fn into_inner(self) -> B {
        self.inner
    }

    #[inline]
    fn count<T>(&mut self, res: BridgeResult<T>) -> BridgeResult<T> {
        if res.is_err() {
            self.stats.errors += 1;
        }
        res
    }
}

impl<B: PmpBridge> PmpBridge for BridgeCounter<B> {
    fn write_register(&mut self, reg: Register, value: u8) -> BridgeResult {
        self.stats.register_writes += 1;
        let res = self.inner.write_register(reg, value);
        self.count(res)
    }

    fn read_register(&mut self, reg: Register) -> BridgeResult<u8> {
        self.stats.status_reads += 1;
        let res = self.inner.read_register(reg);
        self.count(res)
    }

    fn write_bulk_block(&mut self, data: &[u8]) -> BridgeResult {
        self.stats.bulk_writes += 1;
        self.stats.bulk_write_bytes += data.len() as u64;
        let res = self.inner.write_bulk_block(data);
        self.count(res)
    }

    fn read_bulk_block(&mut self, buf: &mut [u8]) -> BridgeResult {
        self.stats.bulk_reads += 1;
        self.stats.bulk_read_bytes += buf.len() as u64;
        let res = self.inner.read_bulk_block(buf);
        self.count(res)
    }

    fn delay_ms(&mut self, ms: u16) -> BridgeResult {
        self.stats.delay_ms_total += u64::from(ms);
        let res = self.inner.delay_ms(ms);
        self.count(res)
    }

    fn delay_us(&mut self, us: u16) -> BridgeResult {
        let res = self.inner.delay_us(us);
        self.count(res)
    }

    #[inline]
    fn ping(&mut self) -> BridgeResult {
        let res = self.inner.ping();
        self.count(res)
    }

    #[inline]
    fn firmware_version(&mut self) -> BridgeResult<FirmwareVersion> {
        let res = self.inner.firmware_version();
        self.count(res)
    }

    #[inline]
    fn set_data_direction(&mut self, dir: DataDirection) -> BridgeResult {
        let res = self.inner.set_data_direction(dir);
        self.count(res)
    }
}

#[cfg(all(test, feature = "mem"))]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_counts_traffic_and_errors() {
        let mut counter = BridgeCounter::new(MemBridge::new());
        counter.write_control(0x04).unwrap();
        counter.write_bulk_block(&[0u8; 528]).unwrap();
        counter.delay_ms(20).unwrap();
        assert!(counter.write_register(Register::Status, 0).is_err());

        let s = counter.snapshot();
        assert_eq!(s.register_writes, 2);
        assert_eq!(s.bulk_write_bytes, 528);
        assert_eq!(s.delay_ms_total, 20);
        assert_eq!(s.errors, 1);
        assert_eq!(s.round_trips(), 3);
    }
}
