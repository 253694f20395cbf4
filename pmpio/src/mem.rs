// SPDX-License-Identifier: MIT

use std::collections::VecDeque;

use crate::error::*;
use crate::{DataDirection, FirmwareVersion, PmpBridge, Register};

/// One recorded bridge call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeOp {
    WriteRegister(Register, u8),
    ReadRegister(Register),
    WriteBulk(usize),
    ReadBulk(usize),
    DelayMs(u16),
    DelayUs(u16),
    Ping,
    Version,
    SetDirection(DataDirection),
}

/// In-memory scripted implementation of `PmpBridge`.
///
/// Records every call, replays queued status bytes and bulk data.
/// Useful for asserting exact register traffic in tests.
#[derive(Debug)]
pub struct MemBridge {
    ops: Vec<BridgeOp>,
    status: VecDeque<u8>,
    idle_status: u8,
    bulk_in: VecDeque<u8>,
    bulk_out: Vec<Vec<u8>>,
    version: FirmwareVersion,
    fail_after: Option<usize>,
}

impl Default for MemBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MemBridge {
    #[inline]
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            status: VecDeque::new(),
            idle_status: 0x00,
            bulk_in: VecDeque::new(),
            bulk_out: Vec::new(),
            version: FirmwareVersion::new(1, 0, 0),
            fail_after: None,
        }
    }

    /// Status returned once the queue is drained.
    pub fn with_idle_status(mut self, status: u8) -> Self {
        self.idle_status = status;
        self
    }

    pub fn with_version(mut self, version: FirmwareVersion) -> Self {
        self.version = version;
        self
    }

    /// Every call after the first `ops` recorded calls fails with a channel error.
    pub fn fail_after(mut self, ops: usize) -> Self {
        self.fail_after = Some(ops);
        self
    }

    pub fn push_status(&mut self, values: &[u8]) {
        self.status.extend(values.iter().copied());
    }

    pub fn push_bulk(&mut self, data: &[u8]) {
        self.bulk_in.extend(data.iter().copied());
    }

    #[inline]
    pub fn ops(&self) -> &[BridgeOp] {
        &self.ops
    }

    /// Pages received through `write_bulk_block`, in order.
    #[inline]
    pub fn bulk_writes(&self) -> &[Vec<u8>] {
        &self.bulk_out
    }

    /// Values written to `reg`, in order.
    pub fn register_writes(&self, reg: Register) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BridgeOp::WriteRegister(r, v) if *r == reg => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
        self.bulk_out.clear();
    }

    fn record(&mut self, op: BridgeOp) -> BridgeResult {
        if let Some(limit) = self.fail_after {
            if self.ops.len() >= limit {
                return Err(BridgeError::Channel("Bridge closed the channel"));
            }
        }
        self.ops.push(op);
        Ok(())
    }
}

impl PmpBridge for MemBridge {
    fn write_register(&mut self, reg: Register, value: u8) -> BridgeResult {
        if !reg.is_writable() {
            return Err(BridgeError::InvalidRegister(reg));
        }
        self.record(BridgeOp::WriteRegister(reg, value))
    }

    fn read_register(&mut self, reg: Register) -> BridgeResult<u8> {
        if !reg.is_readable() {
            return Err(BridgeError::InvalidRegister(reg));
        }
        self.record(BridgeOp::ReadRegister(reg))?;
        Ok(self.status.pop_front().unwrap_or(self.idle_status))
    }

    fn write_bulk_block(&mut self, data: &[u8]) -> BridgeResult {
        self.record(BridgeOp::WriteBulk(data.len()))?;
        self.bulk_out.push(data.to_vec());
        Ok(())
    }

    fn read_bulk_block(&mut self, buf: &mut [u8]) -> BridgeResult {
        self.record(BridgeOp::ReadBulk(buf.len()))?;
        if self.bulk_in.len() < buf.len() {
            return Err(BridgeError::Channel("Bridge closed the channel"));
        }
        for slot in buf.iter_mut() {
            *slot = self.bulk_in.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn delay_ms(&mut self, ms: u16) -> BridgeResult {
        self.record(BridgeOp::DelayMs(ms))
    }

    fn delay_us(&mut self, us: u16) -> BridgeResult {
        self.record(BridgeOp::DelayUs(us))
    }

    fn ping(&mut self) -> BridgeResult {
        self.record(BridgeOp::Ping)
    }

    fn firmware_version(&mut self) -> BridgeResult<FirmwareVersion> {
        self.record(BridgeOp::Version)?;
        Ok(self.version)
    }

    fn set_data_direction(&mut self, dir: DataDirection) -> BridgeResult {
        self.record(BridgeOp::SetDirection(dir))
    }
}
