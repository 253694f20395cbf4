// SPDX-License-Identifier: MIT

//! Register-level device handshake.
//!
//! Every device command byte is latched by the sequence
//! data <- byte, control <- strobe, control <- idle.

use std::thread;
use std::time::{Duration, Instant};

use pmpio::prelude::*;

use crate::core::errors::*;
use crate::fs::pmp300::{constant::*, types::StorageMedium};

/// Status polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Deadline for one `wait_for_status` during normal transfers.
    pub status_timeout: Duration,
    /// Host-side pause between two status reads.
    pub poll_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            status_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Drives device commands over a [`PmpBridge`].
pub struct Handshake<B: PmpBridge> {
    bridge: B,
    timing: Timing,
}

impl<B: PmpBridge> Handshake<B> {
    pub fn new(bridge: B, timing: Timing) -> Self {
        Self { bridge, timing }
    }

    #[inline]
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    #[inline]
    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    #[inline]
    pub fn into_inner(self) -> B {
        self.bridge
    }

    pub fn send_device_command(&mut self, byte: u8) -> DriverResult {
        log::trace!("device command 0x{byte:02X}");
        self.bridge.write_data(byte)?;
        self.bridge.write_control(CTRL_STROBE)?;
        self.bridge.write_control(CTRL_IDLE)?;
        Ok(())
    }

    pub fn send_sequence(&mut self, bytes: &[u8]) -> DriverResult {
        for &b in bytes {
            self.send_device_command(b)?;
        }
        Ok(())
    }

    /// Polls status until `status & mask == expected` or `timeout` elapses.
    ///
    /// The register is sampled at least once even with a zero timeout.
    pub fn wait_for_status(&mut self, mask: u8, expected: u8, timeout: Duration) -> DriverResult<u8> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.bridge.read_status()?;
            if status & mask == expected {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                log::debug!("status timeout: last 0x{status:02X}, want 0x{expected:02X}/0x{mask:02X}");
                return Err(DriverError::Timeout {
                    mask,
                    expected,
                    last: status,
                });
            }
            if !self.timing.poll_interval.is_zero() {
                thread::sleep(self.timing.poll_interval);
            }
        }
    }

    #[inline]
    pub fn wait_ready(&mut self) -> DriverResult<u8> {
        self.wait_for_status(STATUS_MASK, STATUS_READY, self.timing.status_timeout)
    }

    #[inline]
    pub fn wait_ready_within(&mut self, timeout: Duration) -> DriverResult<u8> {
        self.wait_for_status(STATUS_MASK, STATUS_READY, timeout)
    }

    /// Reset and wake sequence. Safe to run again on a live device.
    pub fn initialize(&mut self) -> DriverResult {
        log::debug!("initializing device");
        self.bridge.write_control(CTRL_IDLE)?;
        self.send_device_command(CMD_WAKE)?;
        self.bridge.write_control(CTRL_RESET)?;
        self.bridge.delay_ms(RESET_DELAY_MS)?;
        self.bridge.write_control(CTRL_IDLE)?;
        self.bridge.delay_ms(RESET_DELAY_MS)?;
        self.send_sequence(&INIT_SEQUENCE)
    }

    pub fn select(&mut self, medium: StorageMedium) -> DriverResult {
        log::debug!("selecting {medium} storage");
        self.send_device_command(medium.select_command())
    }

    /// Returns the device to idle; also aborts a partial read.
    #[inline]
    pub fn end_transaction(&mut self) -> DriverResult {
        self.send_device_command(CMD_END)
    }
}

#[cfg(all(test, feature = "mem"))]
mod tests {
    use super::*;

    fn fast() -> Timing {
        Timing {
            status_timeout: Duration::from_millis(5),
            poll_interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_command_is_three_writes() {
        let mut hs = Handshake::new(MemBridge::new(), fast());
        hs.send_device_command(0xB0).unwrap();
        assert_eq!(
            hs.bridge().ops(),
            &[
                BridgeOp::WriteRegister(Register::Data, 0xB0),
                BridgeOp::WriteRegister(Register::Control, CTRL_STROBE),
                BridgeOp::WriteRegister(Register::Control, CTRL_IDLE),
            ]
        );
    }

    #[test]
    fn test_initialize_sequence() {
        let mut hs = Handshake::new(MemBridge::new(), fast());
        hs.initialize().unwrap();

        let ops = hs.bridge().ops();
        assert_eq!(ops[0], BridgeOp::WriteRegister(Register::Control, CTRL_IDLE));
        assert_eq!(ops[1], BridgeOp::WriteRegister(Register::Data, CMD_WAKE));
        assert_eq!(ops[4], BridgeOp::WriteRegister(Register::Control, CTRL_RESET));
        assert_eq!(ops[5], BridgeOp::DelayMs(RESET_DELAY_MS));
        assert_eq!(ops[6], BridgeOp::WriteRegister(Register::Control, CTRL_IDLE));
        assert_eq!(ops[7], BridgeOp::DelayMs(RESET_DELAY_MS));
        assert_eq!(hs.bridge().register_writes(Register::Data), [0xA8, 0xAD, 0x55, 0xAE, 0xAA, 0xA8]);
        assert_eq!(ops.len(), 8 + 5 * 3);
    }

    #[test]
    fn test_wait_for_status_masks() {
        let mut hs = Handshake::new(MemBridge::new(), fast());
        hs.bridge_mut().push_status(&[0x00, 0x10, 0x7F]);
        assert_eq!(hs.wait_ready().unwrap(), 0x7F);
        assert_eq!(hs.bridge().ops().len(), 3);
    }

    #[test]
    fn test_wait_for_status_times_out() {
        let mut hs = Handshake::new(MemBridge::new().with_idle_status(0x10), fast());
        let err = hs.wait_ready().unwrap_err();
        assert_eq!(
            err,
            DriverError::Timeout {
                mask: STATUS_MASK,
                expected: STATUS_READY,
                last: 0x10
            }
        );
    }

    #[test]
    fn test_channel_error_propagates() {
        let mut hs = Handshake::new(MemBridge::new().fail_after(1), fast());
        let err = hs.send_device_command(0xC0).unwrap_err();
        assert!(matches!(err, DriverError::Bridge(e) if e.is_channel()));
    }
}
