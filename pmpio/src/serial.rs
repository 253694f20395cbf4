// SPDX-License-Identifier: MIT

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::*;
use crate::{DataDirection, FirmwareVersion, PmpBridge, Register};

/// Bridge firmware framing bytes.
pub mod wire {
    pub const CMD_WRITE_DATA: u8 = b'W';
    pub const CMD_WRITE_CTRL: u8 = b'C';
    pub const CMD_READ_STATUS: u8 = b'R';
    pub const CMD_DELAY_US: u8 = b'D';
    pub const CMD_DELAY_MS: u8 = b'M';
    pub const CMD_PING: u8 = b'P';
    pub const CMD_VERSION: u8 = b'V';
    pub const CMD_SET_DATA_DIR: u8 = b'S';
    pub const CMD_WRITE_BULK: u8 = b'B';
    pub const CMD_READ_BULK: u8 = b'N';

    pub const RESP_OK: u8 = b'K';
    pub const RESP_VALUE: u8 = b'V';
    pub const RESP_ERROR: u8 = b'E';
    pub const RESP_PONG: u8 = b'P';
    pub const RESP_VERSION: u8 = b'I';

    /// Largest payload a single bulk frame may carry.
    pub const MAX_BULK_LEN: usize = u16::MAX as usize;

    pub const DEFAULT_BAUD: u32 = 115_200;
}

/// Request/response bridge over any byte stream (usually a serial port).
#[derive(Debug)]
pub struct SerialBridge<T: Read + Write> {
    io: T,
}

impl<T: Read + Write> SerialBridge<T> {
    /// Wraps an already configured stream without probing it.
    pub fn new(io: T) -> Self {
        Self { io }
    }

    /// Waits `settle` for the bridge to come out of reset, then pings it.
    pub fn connect(io: T, settle: Duration) -> BridgeResult<Self> {
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }
        let mut bridge = Self::new(io);
        bridge.ping()?;
        log::debug!("bridge answered ping");
        Ok(bridge)
    }

    pub fn get_ref(&self) -> &T {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.io
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    fn send(&mut self, frame: &[u8]) -> BridgeResult {
        self.io.write_all(frame)?;
        self.io.flush()?;
        Ok(())
    }

    fn recv_byte(&mut self) -> BridgeResult<u8> {
        let mut b = [0u8; 1];
        self.io.read_exact(&mut b)?;
        Ok(b[0])
    }

    /// Reads the response byte; `E` is followed by an error code.
    fn expect(&mut self, expected: u8) -> BridgeResult {
        match self.recv_byte()? {
            got if got == expected => Ok(()),
            wire::RESP_ERROR => Err(BridgeError::Device(self.recv_byte()?)),
            got => Err(BridgeError::Response { expected, got }),
        }
    }

    fn bulk_len(len: usize) -> BridgeResult<[u8; 2]> {
        if len > wire::MAX_BULK_LEN {
            return Err(BridgeError::Other("Bulk frame too large"));
        }
        Ok((len as u16).to_be_bytes())
    }
}

impl<T: Read + Write> PmpBridge for SerialBridge<T> {
    fn write_register(&mut self, reg: Register, value: u8) -> BridgeResult {
        let cmd = match reg {
            Register::Data => wire::CMD_WRITE_DATA,
            Register::Control => wire::CMD_WRITE_CTRL,
            Register::Status => return Err(BridgeError::InvalidRegister(reg)),
        };
        log::trace!("out {reg:?} <- 0x{value:02X}");
        self.send(&[cmd, value])?;
        self.expect(wire::RESP_OK)
    }

    fn read_register(&mut self, reg: Register) -> BridgeResult<u8> {
        if !reg.is_readable() {
            return Err(BridgeError::InvalidRegister(reg));
        }
        self.send(&[wire::CMD_READ_STATUS])?;
        self.expect(wire::RESP_VALUE)?;
        let value = self.recv_byte()?;
        log::trace!("in {reg:?} -> 0x{value:02X}");
        Ok(value)
    }

    fn write_bulk_block(&mut self, data: &[u8]) -> BridgeResult {
        let [hi, lo] = Self::bulk_len(data.len())?;
        self.send(&[wire::CMD_WRITE_BULK, hi, lo])?;
        self.send(data)?;
        self.expect(wire::RESP_OK)
    }

    fn read_bulk_block(&mut self, buf: &mut [u8]) -> BridgeResult {
        let [hi, lo] = Self::bulk_len(buf.len())?;
        self.send(&[wire::CMD_READ_BULK, hi, lo])?;
        self.expect(wire::RESP_VALUE)?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn delay_ms(&mut self, ms: u16) -> BridgeResult {
        let [hi, lo] = ms.to_be_bytes();
        self.send(&[wire::CMD_DELAY_MS, hi, lo])?;
        self.expect(wire::RESP_OK)
    }

    fn delay_us(&mut self, us: u16) -> BridgeResult {
        let [hi, lo] = us.to_be_bytes();
        self.send(&[wire::CMD_DELAY_US, hi, lo])?;
        self.expect(wire::RESP_OK)
    }

    fn ping(&mut self) -> BridgeResult {
        self.send(&[wire::CMD_PING])?;
        self.expect(wire::RESP_PONG)
    }

    fn firmware_version(&mut self) -> BridgeResult<FirmwareVersion> {
        self.send(&[wire::CMD_VERSION])?;
        self.expect(wire::RESP_VERSION)?;
        let mut v = [0u8; 3];
        self.io.read_exact(&mut v)?;
        Ok(FirmwareVersion::new(v[0], v[1], v[2]))
    }

    fn set_data_direction(&mut self, dir: DataDirection) -> BridgeResult {
        self.send(&[wire::CMD_SET_DATA_DIR, dir.as_byte()])?;
        self.expect(wire::RESP_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Stream that replays canned responses and records what was sent.
    #[derive(Default)]
    struct ScriptedPort {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl ScriptedPort {
        fn with_responses(bytes: &[u8]) -> Self {
            Self {
                rx: bytes.iter().copied().collect(),
                tx: Vec::new(),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.rx.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.rx.pop_front().unwrap_or_default();
            }
            Ok(n)
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_write_frames() {
        let mut bridge = SerialBridge::new(ScriptedPort::with_responses(b"KK"));
        bridge.write_register(Register::Data, 0xA8).unwrap();
        bridge.write_register(Register::Control, 0x0C).unwrap();
        assert_eq!(bridge.get_ref().tx, [b'W', 0xA8, b'C', 0x0C]);
    }

    #[test]
    fn test_status_register_is_read_only() {
        let mut bridge = SerialBridge::new(ScriptedPort::default());
        let err = bridge.write_register(Register::Status, 0).unwrap_err();
        assert_eq!(err, BridgeError::InvalidRegister(Register::Status));
        assert!(bridge.get_ref().tx.is_empty());
    }

    #[test]
    fn test_read_status() {
        let mut bridge = SerialBridge::new(ScriptedPort::with_responses(&[b'V', 0x78]));
        assert_eq!(bridge.read_register(Register::Status).unwrap(), 0x78);
        assert_eq!(bridge.get_ref().tx, [b'R']);
    }

    #[test]
    fn test_error_response_carries_code() {
        let mut bridge = SerialBridge::new(ScriptedPort::with_responses(&[b'E', 0x02]));
        let err = bridge.delay_ms(20).unwrap_err();
        assert_eq!(err, BridgeError::Device(ERR_TIMEOUT));
        assert_eq!(bridge.get_ref().tx, [b'M', 0x00, 20]);
    }

    #[test]
    fn test_unexpected_response() {
        let mut bridge = SerialBridge::new(ScriptedPort::with_responses(b"X"));
        let err = bridge.ping().unwrap_err();
        assert_eq!(
            err,
            BridgeError::Response {
                expected: b'P',
                got: b'X'
            }
        );
    }

    #[test]
    fn test_closed_channel_is_channel_error() {
        let mut bridge = SerialBridge::new(ScriptedPort::default());
        assert!(bridge.ping().unwrap_err().is_channel());
    }

    #[test]
    fn test_version_and_bulk() {
        let mut responses = vec![b'I', 1, 4, 2, b'K', b'V'];
        responses.extend_from_slice(&[9, 8, 7]);
        let mut bridge = SerialBridge::new(ScriptedPort::with_responses(&responses));

        assert_eq!(bridge.firmware_version().unwrap(), FirmwareVersion::new(1, 4, 2));
        bridge.write_bulk_block(&[1, 2]).unwrap();
        let mut buf = [0u8; 3];
        bridge.read_bulk_block(&mut buf).unwrap();

        assert_eq!(buf, [9, 8, 7]);
        assert_eq!(bridge.get_ref().tx, [b'V', b'B', 0, 2, 1, 2, b'N', 0, 3]);
    }
}
