// SPDX-License-Identifier: MIT

use core::fmt;

pub use pmpio::error::*;

use crate::pmp_error_wiring;

/// Coarse error classes exposed to callers deciding whether to retry,
/// continue or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bridge I/O failure or disconnect. Fatal to the session.
    Channel,
    /// Expected status not observed within the deadline.
    Timeout,
    /// Directory failed checksum validation.
    Checksum,
    /// Not enough free blocks or directory slots.
    Capacity,
    /// Invalid entry index or block number.
    Range,
    /// Name invalid or not found.
    Name,
    /// Medium did not answer the presence probe.
    DeviceAbsent,
    /// Directory structure is inconsistent (broken chain, cycle).
    Corruption,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Channel => "channel",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Checksum => "checksum",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Range => "range",
            ErrorKind::Name => "name",
            ErrorKind::DeviceAbsent => "device absent",
            ErrorKind::Corruption => "corruption",
            ErrorKind::Other => "other",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    Bridge(BridgeError),
    Timeout { mask: u8, expected: u8, last: u8 },
    Other(&'static str),
}

impl DriverError {
    pub fn msg(&self) -> &'static str {
        match self {
            DriverError::Bridge(_) => "Bridge error",
            DriverError::Timeout { .. } => "Timed out waiting for device status",
            DriverError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<PmpError> {
        match self {
            DriverError::Bridge(e) => Some(PmpError::Bridge(*e)),
            _ => None,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        if let DriverError::Timeout {
            mask,
            expected,
            last,
        } = self
        {
            write!(
                f,
                " (status & 0x{mask:02X} != 0x{expected:02X}, last 0x{last:02X})"
            )?;
        }
        let mut current = self.source();
        while let Some(src) = current {
            write!(f, "\n  caused by: {src}")?;
            current = src.source();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    InvalidLength { expected: usize, got: usize },
    HeaderChecksum { stored: u16, computed: u16 },
    BodyChecksum { stored: u16, computed: u16 },
    TooManyEntries(u16),
    Invalid(&'static str),
    Other(&'static str),
}

impl CodecError {
    pub fn msg(&self) -> &'static str {
        match self {
            CodecError::InvalidLength { .. } => "Invalid directory block length",
            CodecError::HeaderChecksum { .. } => "Directory header checksum mismatch",
            CodecError::BodyChecksum { .. } => "Directory body checksum mismatch",
            CodecError::TooManyEntries(_) => "Directory entry count exceeds slot count",
            CodecError::Invalid(msg) => msg,
            CodecError::Other(msg) => msg,
        }
    }

    #[inline]
    pub fn is_checksum(&self) -> bool {
        matches!(
            self,
            CodecError::HeaderChecksum { .. } | CodecError::BodyChecksum { .. }
        )
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            CodecError::InvalidLength { expected, got } => {
                write!(f, " (expected {expected}, got {got})")
            }
            CodecError::HeaderChecksum { stored, computed }
            | CodecError::BodyChecksum { stored, computed } => {
                write!(f, " (stored 0x{stored:04X}, computed 0x{computed:04X})")
            }
            CodecError::TooManyEntries(n) => write!(f, " ({n})"),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorError {
    OutOfBlocks { needed: usize, available: usize },
    InvalidBlock(u16),
    BrokenChain(u16),
    LoopDetected(u16),
    BlockInUse(u16),
    Other(&'static str),
}

impl AllocatorError {
    pub fn msg(&self) -> &'static str {
        match self {
            AllocatorError::OutOfBlocks { .. } => "Out of blocks",
            AllocatorError::InvalidBlock(_) => "Block index out of range",
            AllocatorError::BrokenChain(_) => "Chain reaches a free or bad block",
            AllocatorError::LoopDetected(_) => "Loop detected in block chain",
            AllocatorError::BlockInUse(_) => "Block is in use",
            AllocatorError::Other(msg) => msg,
        }
    }
}

impl fmt::Display for AllocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            AllocatorError::OutOfBlocks { needed, available } => {
                write!(f, " (need {needed}, {available} free)")
            }
            AllocatorError::InvalidBlock(b)
            | AllocatorError::BrokenChain(b)
            | AllocatorError::LoopDetected(b)
            | AllocatorError::BlockInUse(b) => write!(f, " (block: {b})"),
            AllocatorError::Other(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    Allocator(AllocatorError),
    Full,
    NotFound,
    IndexOutOfRange { index: usize, len: usize },
    InvalidName(&'static str),
    Other(&'static str),
}

impl TableError {
    pub fn msg(&self) -> &'static str {
        match self {
            TableError::Allocator(_) => "Allocator error",
            TableError::Full => "Directory is full",
            TableError::NotFound => "No entry with that name",
            TableError::IndexOutOfRange { .. } => "Entry index out of range",
            TableError::InvalidName(msg) => msg,
            TableError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<PmpError> {
        match self {
            TableError::Allocator(e) => Some(PmpError::Allocator(*e)),
            _ => None,
        }
    }
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        if let TableError::IndexOutOfRange { index, len } = self {
            write!(f, " (index {index}, {len} entries)")?;
        }
        let mut current = self.source();
        while let Some(src) = current {
            write!(f, "\n  caused by: {src}")?;
            current = src.source();
        }
        Ok(())
    }
}

/// Top-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmpError {
    Bridge(BridgeError),
    Driver(DriverError),
    Codec(CodecError),
    Allocator(AllocatorError),
    Table(TableError),
    DeviceAbsent,
    UnknownCapacity,
    Other(&'static str),
}

impl PmpError {
    pub fn msg(&self) -> &'static str {
        match self {
            PmpError::Bridge(e) => e.msg(),
            PmpError::Driver(e) => e.msg(),
            PmpError::Codec(e) => e.msg(),
            PmpError::Allocator(e) => e.msg(),
            PmpError::Table(e) => e.msg(),
            PmpError::DeviceAbsent => "Storage medium did not respond",
            PmpError::UnknownCapacity => "Medium capacity unknown",
            PmpError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<PmpError> {
        match self {
            PmpError::Driver(e) => e.source(),
            PmpError::Table(e) => e.source(),
            _ => None,
        }
    }

    /// Root cause after walking the chain.
    pub fn root(&self) -> PmpError {
        let mut current = *self;
        while let Some(src) = current.source() {
            current = src;
        }
        current
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PmpError::Bridge(_) => ErrorKind::Channel,
            PmpError::Driver(DriverError::Bridge(_)) => ErrorKind::Channel,
            PmpError::Driver(DriverError::Timeout { .. }) => ErrorKind::Timeout,
            PmpError::Driver(DriverError::Other(_)) => ErrorKind::Other,
            PmpError::Codec(e) if e.is_checksum() => ErrorKind::Checksum,
            PmpError::Codec(_) => ErrorKind::Corruption,
            PmpError::Allocator(e) | PmpError::Table(TableError::Allocator(e)) => match e {
                AllocatorError::OutOfBlocks { .. } => ErrorKind::Capacity,
                AllocatorError::InvalidBlock(_) => ErrorKind::Range,
                AllocatorError::BrokenChain(_)
                | AllocatorError::LoopDetected(_)
                | AllocatorError::BlockInUse(_) => ErrorKind::Corruption,
                AllocatorError::Other(_) => ErrorKind::Other,
            },
            PmpError::Table(TableError::Full) => ErrorKind::Capacity,
            PmpError::Table(TableError::NotFound | TableError::InvalidName(_)) => ErrorKind::Name,
            PmpError::Table(TableError::IndexOutOfRange { .. }) => ErrorKind::Range,
            PmpError::Table(TableError::Other(_)) => ErrorKind::Other,
            PmpError::DeviceAbsent => ErrorKind::DeviceAbsent,
            PmpError::UnknownCapacity => ErrorKind::Other,
            PmpError::Other(_) => ErrorKind::Other,
        }
    }

    #[inline]
    pub fn is_checksum(&self) -> bool {
        self.kind() == ErrorKind::Checksum
    }

    /// A bare presence-probe timeout means nothing is there.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl fmt::Display for PmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmpError::Bridge(e) => write!(f, "{e}"),
            PmpError::Driver(e) => write!(f, "{e}"),
            PmpError::Codec(e) => write!(f, "{e}"),
            PmpError::Allocator(e) => write!(f, "{e}"),
            PmpError::Table(e) => write!(f, "{e}"),
            _ => write!(f, "{}", self.msg()),
        }
    }
}

impl std::error::Error for PmpError {}

// === Wiring ===

pmp_error_wiring! {
    top => PmpError {
        BridgeError: Bridge,
        DriverError: Driver,
        CodecError: Codec,
        AllocatorError: Allocator,
        TableError: Table,
    },
    str_into => [DriverError, CodecError, AllocatorError, TableError],
    sub => {
        BridgeError => [DriverError::Bridge],
        AllocatorError => [TableError::Allocator],
    }
}

// === Result aliases ===

pub type PmpResult<T = ()> = Result<T, PmpError>;

pub type DriverResult<T = ()> = Result<T, DriverError>;
pub type CodecResult<T = ()> = Result<T, CodecError>;
pub type AllocatorResult<T = ()> = Result<T, AllocatorError>;
pub type TableResult<T = ()> = Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_display() {
        let low = BridgeError::Channel("Serial link disconnected");
        let top: PmpError = DriverError::from(low).into();
        assert_eq!(
            top.to_string(),
            "Bridge error\n  caused by: Serial link disconnected"
        );
        assert_eq!(top.kind(), ErrorKind::Channel);
        assert_eq!(top.root(), PmpError::Bridge(low));
    }

    #[test]
    fn test_kind_mapping() {
        let cap: PmpError = TableError::from(AllocatorError::OutOfBlocks {
            needed: 4,
            available: 1,
        })
        .into();
        assert_eq!(cap.kind(), ErrorKind::Capacity);

        let sum: PmpError = CodecError::BodyChecksum {
            stored: 1,
            computed: 2,
        }
        .into();
        assert!(sum.is_checksum());

        let timeout: PmpError = DriverError::Timeout {
            mask: 0xF8,
            expected: 0x78,
            last: 0,
        }
        .into();
        assert!(timeout.is_timeout());

        assert_eq!(PmpError::from(TableError::NotFound).kind(), ErrorKind::Name);
        assert_eq!(
            PmpError::from(TableError::IndexOutOfRange { index: 5, len: 3 }).kind(),
            ErrorKind::Range
        );
    }

    #[test]
    fn test_str_into_other() {
        let e: TableError = "bad".into();
        assert_eq!(e, TableError::Other("bad"));
        let top: PmpError = "top".into();
        assert_eq!(top.msg(), "top");
    }
}
