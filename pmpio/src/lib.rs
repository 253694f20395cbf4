// SPDX-License-Identifier: MIT

//! Bridge primitives for talking to a parallel-port device through a
//! serial microcontroller bridge.
//!
//! The bridge exposes the three classic LPT registers (data, status,
//! control), bulk page transfer, and host-paced delays. Everything is
//! blocking with exactly one request in flight.

use core::fmt;

// Core modules
pub mod error;
mod macros;
pub mod stats;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(feature = "std")]
mod serial;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::error::*;
    pub use super::stats::*;
    pub use super::{DataDirection, FirmwareVersion, PmpBridge, PmpBridgeExt, Register};

    #[cfg(feature = "mem")]
    pub use super::mem::{BridgeOp, MemBridge};

    #[cfg(feature = "std")]
    pub use super::serial::{SerialBridge, wire};
}

// Internal use
use error::*;

/// Parallel-port register addressed by its offset from the port base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    Data = 0,
    Status = 1,
    Control = 2,
}

impl Register {
    #[inline]
    pub const fn offset(self) -> u16 {
        self as u16
    }

    pub const fn from_offset(offset: u16) -> Option<Self> {
        match offset {
            0 => Some(Register::Data),
            1 => Some(Register::Status),
            2 => Some(Register::Control),
            _ => None,
        }
    }

    /// Only data and control are driven by the host.
    #[inline]
    pub const fn is_writable(self) -> bool {
        matches!(self, Register::Data | Register::Control)
    }

    /// Only status is sampled by the host.
    #[inline]
    pub const fn is_readable(self) -> bool {
        matches!(self, Register::Status)
    }
}

/// Bridge firmware version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Direction of the data pins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataDirection {
    Input,
    Output,
}

impl DataDirection {
    #[inline]
    pub const fn as_byte(self) -> u8 {
        match self {
            DataDirection::Input => b'I',
            DataDirection::Output => b'O',
        }
    }
}

// Traits

/// Bridge primitive abstraction.
///
/// Implementations may target a real serial bridge, an in-memory script,
/// or a device emulator. Every call blocks until the bridge acknowledges.
pub trait PmpBridge {
    /// Writes `value` to a host-driven register (data or control).
    fn write_register(&mut self, reg: Register, value: u8) -> BridgeResult;

    /// Samples a device-driven register (status).
    fn read_register(&mut self, reg: Register) -> BridgeResult<u8>;

    /// Sends one fixed-size page to the device.
    fn write_bulk_block(&mut self, data: &[u8]) -> BridgeResult;

    /// Reads `buf.len()` bytes from the device in nibble mode.
    fn read_bulk_block(&mut self, buf: &mut [u8]) -> BridgeResult;

    /// Delays on the bridge side.
    fn delay_ms(&mut self, ms: u16) -> BridgeResult;

    /// Microsecond delay; backends without one round up to milliseconds.
    fn delay_us(&mut self, us: u16) -> BridgeResult {
        self.delay_ms(us.div_ceil(1000))
    }

    /// Presence check of the bridge itself (not the device behind it).
    fn ping(&mut self) -> BridgeResult;

    fn firmware_version(&mut self) -> BridgeResult<FirmwareVersion>;

    fn set_data_direction(&mut self, _dir: DataDirection) -> BridgeResult {
        Err(BridgeError::Unsupported)
    }
}

impl<B: PmpBridge + ?Sized> PmpBridge for &mut B {
    #[inline]
    fn write_register(&mut self, reg: Register, value: u8) -> BridgeResult {
        (**self).write_register(reg, value)
    }

    #[inline]
    fn read_register(&mut self, reg: Register) -> BridgeResult<u8> {
        (**self).read_register(reg)
    }

    #[inline]
    fn write_bulk_block(&mut self, data: &[u8]) -> BridgeResult {
        (**self).write_bulk_block(data)
    }

    #[inline]
    fn read_bulk_block(&mut self, buf: &mut [u8]) -> BridgeResult {
        (**self).read_bulk_block(buf)
    }

    #[inline]
    fn delay_ms(&mut self, ms: u16) -> BridgeResult {
        (**self).delay_ms(ms)
    }

    #[inline]
    fn delay_us(&mut self, us: u16) -> BridgeResult {
        (**self).delay_us(us)
    }

    #[inline]
    fn ping(&mut self) -> BridgeResult {
        (**self).ping()
    }

    #[inline]
    fn firmware_version(&mut self) -> BridgeResult<FirmwareVersion> {
        (**self).firmware_version()
    }

    #[inline]
    fn set_data_direction(&mut self, dir: DataDirection) -> BridgeResult {
        (**self).set_data_direction(dir)
    }
}

impl<B: PmpBridge + ?Sized> PmpBridge for Box<B> {
    #[inline]
    fn write_register(&mut self, reg: Register, value: u8) -> BridgeResult {
        (**self).write_register(reg, value)
    }

    #[inline]
    fn read_register(&mut self, reg: Register) -> BridgeResult<u8> {
        (**self).read_register(reg)
    }

    #[inline]
    fn write_bulk_block(&mut self, data: &[u8]) -> BridgeResult {
        (**self).write_bulk_block(data)
    }

    #[inline]
    fn read_bulk_block(&mut self, buf: &mut [u8]) -> BridgeResult {
        (**self).read_bulk_block(buf)
    }

    #[inline]
    fn delay_ms(&mut self, ms: u16) -> BridgeResult {
        (**self).delay_ms(ms)
    }

    #[inline]
    fn delay_us(&mut self, us: u16) -> BridgeResult {
        (**self).delay_us(us)
    }

    #[inline]
    fn ping(&mut self) -> BridgeResult {
        (**self).ping()
    }

    #[inline]
    fn firmware_version(&mut self) -> BridgeResult<FirmwareVersion> {
        (**self).firmware_version()
    }

    #[inline]
    fn set_data_direction(&mut self, dir: DataDirection) -> BridgeResult {
        (**self).set_data_direction(dir)
    }
}

/// Extension helpers for PmpBridge.
///
/// Provides register shorthands and chunked bulk helpers.
pub trait PmpBridgeExt: PmpBridge {
    // write_data / write_control
    pmp_impl_register_rw!(data => Data, control => Control);

    #[inline(always)]
    fn read_status(&mut self) -> BridgeResult<u8> {
        self.read_register(Register::Status)
    }

    /// Reads `count` bytes into a fresh buffer.
    fn read_bulk_vec(&mut self, count: usize) -> BridgeResult<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_bulk_block(&mut buf)?;
        Ok(buf)
    }

    /// Reads `buf.len()` bytes in requests of at most `chunk_size`.
    fn read_bulk_in_chunks(&mut self, buf: &mut [u8], chunk_size: usize) -> BridgeResult {
        if chunk_size == 0 {
            return Err(BridgeError::Other("read_bulk_in_chunks: zero chunk size"));
        }
        for chunk in buf.chunks_mut(chunk_size) {
            self.read_bulk_block(chunk)?;
        }
        Ok(())
    }
}

impl<T: PmpBridge + ?Sized> PmpBridgeExt for T {}
