// SPDX-License-Identifier: MIT

//! Register-level emulation of the player behind a [`PmpBridge`].
//!
//! Command bytes are latched on the strobe falling edge (control `0x0C`
//! then `0x04`); control `0x00` resets the device. Blocks never written
//! read back erased (`0xFF`).

use std::collections::{BTreeSet, HashMap};

use pmpio::prelude::*;
use zerocopy::FromBytes;

use crate::fs::pmp300::{
    codec::seal,
    constant::*,
    directory::Directory,
    types::{PageMarker, StorageMedium},
};

/// Contents of one emulated medium.
#[derive(Clone, Debug)]
pub struct EmulatedMedium {
    capacity: u16,
    directory: Vec<u8>,
    blocks: HashMap<u16, Vec<u8>>,
    bad: BTreeSet<u16>,
}

impl EmulatedMedium {
    /// Erased medium; its directory block fails validation.
    pub fn blank(capacity: u16) -> Self {
        Self {
            capacity,
            directory: vec![0xFF; DIRECTORY_SIZE],
            blocks: HashMap::new(),
            bad: BTreeSet::new(),
        }
    }

    /// Medium holding a valid empty directory.
    pub fn formatted(capacity: u16) -> Self {
        let mut medium = Self::blank(capacity);
        medium.directory = seal(&mut Directory::empty(capacity, &[]));
        medium
    }

    /// Physically defective blocks: writes to them do not stick.
    pub fn with_bad_blocks(mut self, bad: &[u16]) -> Self {
        self.bad.extend(bad.iter().copied());
        self
    }

    #[inline]
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    #[inline]
    pub fn directory(&self) -> &[u8] {
        &self.directory
    }

    /// Raw directory block, for corrupting it in tests.
    #[inline]
    pub fn directory_mut(&mut self) -> &mut [u8] {
        &mut self.directory
    }

    /// Stored block contents, `None` while erased.
    pub fn block(&self, block: u16) -> Option<&[u8]> {
        self.blocks.get(&block).map(Vec::as_slice)
    }

    /// Number of blocks written at least once.
    pub fn written_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn read(&self, block: u16) -> Vec<u8> {
        self.blocks
            .get(&block)
            .cloned()
            .unwrap_or_else(|| vec![0xFF; BLOCK_SIZE])
    }

    fn store(&mut self, block: u16, mut data: Vec<u8>) {
        if self.bad.contains(&block) {
            // Stuck bits on every other byte.
            data.iter_mut().step_by(2).for_each(|b| *b &= 0x0F);
        }
        self.blocks.insert(block, data);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Directory,
    Block(u16),
}

impl Target {
    fn marker_block(self) -> u16 {
        match self {
            Target::Directory => DIRECTORY_MARKER_BLOCK,
            Target::Block(b) => b,
        }
    }
}

#[derive(Clone, Debug)]
enum Phase {
    Idle,
    AwaitAddr { op: u8, hi: Option<u8> },
    Reading { data: Vec<u8>, pos: usize },
    Writing { target: Target, data: Vec<u8> },
    /// Rejected request; status stays low until `CMD_END` or reset.
    Faulted,
}

/// Emulated player. Implements [`PmpBridge`] so it can stand in for a
/// serial bridge plus device.
#[derive(Debug)]
pub struct EmulatedDevice {
    media: [Option<EmulatedMedium>; 2],
    selected: StorageMedium,
    data: u8,
    control: u8,
    awake: bool,
    init_pos: usize,
    phase: Phase,
    version: FirmwareVersion,
    stalled: bool,
    fail_after: Option<usize>,
    calls: usize,
    commands: Vec<u8>,
    marker_errors: usize,
    delay_ms_total: u64,
}

impl EmulatedDevice {
    pub fn new(internal: EmulatedMedium) -> Self {
        Self {
            media: [Some(internal), None],
            selected: StorageMedium::Internal,
            data: 0,
            control: CTRL_IDLE,
            awake: false,
            init_pos: 0,
            phase: Phase::Idle,
            version: FirmwareVersion::new(1, 0, 0),
            stalled: false,
            fail_after: None,
            calls: 0,
            commands: Vec::new(),
            marker_errors: 0,
            delay_ms_total: 0,
        }
    }

    /// Standard 32 MB player with a formatted internal medium.
    pub fn standard() -> Self {
        Self::new(EmulatedMedium::formatted(STANDARD_INTERNAL_BLOCKS))
    }

    pub fn with_external(mut self, card: EmulatedMedium) -> Self {
        self.media[1] = Some(card);
        self
    }

    pub fn insert_card(&mut self, card: EmulatedMedium) {
        self.media[1] = Some(card);
    }

    pub fn eject_card(&mut self) -> Option<EmulatedMedium> {
        self.media[1].take()
    }

    pub fn medium(&self, medium: StorageMedium) -> Option<&EmulatedMedium> {
        self.media[medium.index()].as_ref()
    }

    pub fn medium_mut(&mut self, medium: StorageMedium) -> Option<&mut EmulatedMedium> {
        self.media[medium.index()].as_mut()
    }

    #[inline]
    pub fn selected(&self) -> StorageMedium {
        self.selected
    }

    #[inline]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Every command byte latched so far, in order.
    #[inline]
    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    /// Write frames whose marker did not match their page.
    #[inline]
    pub fn marker_errors(&self) -> usize {
        self.marker_errors
    }

    /// Bridge calls answered so far.
    #[inline]
    pub fn calls(&self) -> usize {
        self.calls
    }

    #[inline]
    pub fn delay_ms_total(&self) -> u64 {
        self.delay_ms_total
    }

    /// Holds the status register low, as an unplugged device would.
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Every bridge call after the next `calls` fails with a channel error.
    pub fn fail_after(&mut self, calls: usize) {
        self.fail_after = Some(self.calls + calls);
    }

    pub fn clear_faults(&mut self) {
        self.stalled = false;
        self.fail_after = None;
    }

    fn tick(&mut self) -> BridgeResult {
        if self.fail_after.is_some_and(|limit| self.calls >= limit) {
            return Err(BridgeError::Channel("Bridge closed the channel"));
        }
        self.calls += 1;
        Ok(())
    }

    fn current(&self) -> Option<&EmulatedMedium> {
        self.media[self.selected.index()].as_ref()
    }

    fn reset(&mut self) {
        self.awake = false;
        self.init_pos = 0;
        self.phase = Phase::Idle;
    }

    fn status(&self) -> u8 {
        let ready = !self.stalled
            && self.awake
            && self.current().is_some()
            && !matches!(self.phase, Phase::Faulted);
        if ready { STATUS_READY | 0x07 } else { 0x00 }
    }

    fn latch(&mut self, byte: u8) {
        self.commands.push(byte);

        if !self.awake {
            if byte == INIT_SEQUENCE[self.init_pos] {
                self.init_pos += 1;
                if self.init_pos == INIT_SEQUENCE.len() {
                    self.awake = true;
                    self.init_pos = 0;
                }
            } else {
                self.init_pos = usize::from(byte == INIT_SEQUENCE[0]);
            }
            return;
        }

        if byte == CMD_END {
            self.phase = Phase::Idle;
            return;
        }

        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => self.start(byte),
            Phase::AwaitAddr { op, hi: None } => Phase::AwaitAddr { op, hi: Some(byte) },
            Phase::AwaitAddr { op, hi: Some(hi) } => self.addressed(op, u16::from_be_bytes([hi, byte])),
            // Stray bytes mid-transfer desynchronize the device.
            Phase::Reading { .. } | Phase::Writing { .. } | Phase::Faulted => Phase::Faulted,
        };
    }

    fn start(&mut self, byte: u8) -> Phase {
        match byte {
            CMD_SELECT_INTERNAL => {
                self.selected = StorageMedium::Internal;
                Phase::Idle
            }
            CMD_SELECT_EXTERNAL => {
                self.selected = StorageMedium::External;
                Phase::Idle
            }
            CMD_READ_DIRECTORY => match self.current() {
                Some(m) => Phase::Reading {
                    data: m.directory.clone(),
                    pos: 0,
                },
                None => Phase::Faulted,
            },
            CMD_WRITE_DIRECTORY => Phase::Writing {
                target: Target::Directory,
                data: Vec::with_capacity(DIRECTORY_SIZE),
            },
            CMD_READ_BLOCK | CMD_WRITE_BLOCK => Phase::AwaitAddr { op: byte, hi: None },
            _ => Phase::Idle,
        }
    }

    fn addressed(&mut self, op: u8, block: u16) -> Phase {
        let Some(medium) = self.current() else {
            return Phase::Faulted;
        };
        if block >= medium.capacity {
            return Phase::Faulted;
        }
        if op == CMD_READ_BLOCK {
            Phase::Reading {
                data: medium.read(block),
                pos: 0,
            }
        } else {
            Phase::Writing {
                target: Target::Block(block),
                data: Vec::with_capacity(BLOCK_SIZE),
            }
        }
    }

    fn commit(&mut self, target: Target, data: Vec<u8>) {
        let Some(medium) = self.media[self.selected.index()].as_mut() else {
            return;
        };
        match target {
            Target::Directory => medium.directory = data,
            Target::Block(b) => medium.store(b, data),
        }
    }
}

impl PmpBridge for EmulatedDevice {
    fn write_register(&mut self, reg: Register, value: u8) -> BridgeResult {
        self.tick()?;
        match reg {
            Register::Data => self.data = value,
            Register::Control => {
                let falling = self.control == CTRL_STROBE && value == CTRL_IDLE;
                self.control = value;
                if value == CTRL_RESET {
                    self.reset();
                } else if falling {
                    self.latch(self.data);
                }
            }
            Register::Status => return Err(BridgeError::InvalidRegister(reg)),
        }
        Ok(())
    }

    fn read_register(&mut self, reg: Register) -> BridgeResult<u8> {
        self.tick()?;
        match reg {
            Register::Status => Ok(self.status()),
            _ => Err(BridgeError::InvalidRegister(reg)),
        }
    }

    fn write_bulk_block(&mut self, frame: &[u8]) -> BridgeResult {
        self.tick()?;
        if frame.len() != PAGE_FRAME_SIZE {
            return Err(BridgeError::Device(ERR_INVALID_PARAM));
        }
        let Phase::Writing { target, data } = &mut self.phase else {
            return Err(BridgeError::Device(ERR_UNKNOWN_CMD));
        };

        let (page, trailer) = frame.split_at(PAGE_SIZE);
        let index = (data.len() / PAGE_SIZE) as u8;
        let ok = PageMarker::read_from_bytes(trailer)
            .is_ok_and(|m| m.matches(target.marker_block(), index, page));
        if !ok {
            self.marker_errors += 1;
        }
        data.extend_from_slice(page);

        if data.len() == BLOCK_SIZE {
            let target = *target;
            if let Phase::Writing { data, .. } = std::mem::replace(&mut self.phase, Phase::Idle) {
                self.commit(target, data);
            }
        }
        Ok(())
    }

    fn read_bulk_block(&mut self, buf: &mut [u8]) -> BridgeResult {
        self.tick()?;
        let Phase::Reading { data, pos } = &mut self.phase else {
            return Err(BridgeError::Device(ERR_UNKNOWN_CMD));
        };
        let end = *pos + buf.len();
        if end > data.len() {
            return Err(BridgeError::Device(ERR_INVALID_PARAM));
        }
        buf.copy_from_slice(&data[*pos..end]);
        *pos = end;
        Ok(())
    }

    fn delay_ms(&mut self, ms: u16) -> BridgeResult {
        self.tick()?;
        self.delay_ms_total += u64::from(ms);
        Ok(())
    }

    fn ping(&mut self) -> BridgeResult {
        self.tick()
    }

    fn firmware_version(&mut self) -> BridgeResult<FirmwareVersion> {
        self.tick()?;
        Ok(self.version)
    }

    fn set_data_direction(&mut self, _dir: DataDirection) -> BridgeResult {
        self.tick()
    }
}
