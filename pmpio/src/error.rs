// SPDX-License-Identifier: MIT

use core::fmt;

use crate::Register;

/// Result type for bridge operations.
pub type BridgeResult<T = ()> = core::result::Result<T, BridgeError>;

/// Error codes the bridge firmware sends after an `E` response.
pub const ERR_UNKNOWN_CMD: u8 = 0x01;
pub const ERR_TIMEOUT: u8 = 0x02;
pub const ERR_INVALID_PARAM: u8 = 0x03;

/// Error type for bridge operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// The serial channel failed, timed out or was closed.
    Channel(&'static str),
    /// The bridge replied with an unexpected response byte.
    Response { expected: u8, got: u8 },
    /// The bridge reported an error code.
    Device(u8),
    /// The register cannot be used for this operation.
    InvalidRegister(Register),
    Unsupported,
    Other(&'static str),
}

impl BridgeError {
    pub fn msg(&self) -> &'static str {
        match self {
            BridgeError::Channel(msg) => msg,
            BridgeError::Response { .. } => "Unexpected bridge response",
            BridgeError::Device(code) => device_error_name(*code),
            BridgeError::InvalidRegister(_) => "Invalid register for operation",
            BridgeError::Unsupported => "Unsupported operation",
            BridgeError::Other(msg) => msg,
        }
    }

    /// Channel failures are fatal to the session.
    #[inline]
    pub fn is_channel(&self) -> bool {
        matches!(self, BridgeError::Channel(_))
    }
}

pub fn device_error_name(code: u8) -> &'static str {
    match code {
        ERR_UNKNOWN_CMD => "Bridge rejected unknown command",
        ERR_TIMEOUT => "Bridge timed out",
        ERR_INVALID_PARAM => "Bridge rejected invalid parameter",
        _ => "Bridge reported an error",
    }
}

impl From<&'static str> for BridgeError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        BridgeError::Other(msg)
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            BridgeError::Response { expected, got } => {
                write!(f, " (expected 0x{expected:02X}, got 0x{got:02X})")
            }
            BridgeError::Device(code) => write!(f, " (code 0x{code:02X})"),
            BridgeError::InvalidRegister(reg) => write!(f, " ({reg:?})"),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<std::io::Error> for BridgeError {
    #[cold]
    #[inline(never)]
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        BridgeError::Channel(match e.kind() {
            TimedOut | WouldBlock => "Serial read timed out",
            UnexpectedEof => "Bridge closed the channel",
            BrokenPipe | ConnectionReset | ConnectionAborted => "Serial link disconnected",
            NotFound => "Serial device not found",
            PermissionDenied => "Serial device permission denied",
            _ => "Serial I/O error",
        })
    }
}
