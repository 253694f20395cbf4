// SPDX-License-Identifier: MIT

// Core Modules
pub mod core;
pub mod driver;
pub mod fs;
pub mod id3;
pub mod session;

#[cfg(feature = "emulator")]
pub mod emulator;

// Reusable types and traits
pub use crate::core::traits::*;
pub use crate::core::utils::time_utils::*;

/// PMP300 directory format.
///
/// See [`pmp300::Directory`], [`pmp300::BlockAllocator`] and [`pmp300::FileTable`].
pub mod pmp300 {
    pub use super::fs::pmp300::prelude::*;
}

// Device façade
pub use driver::{Handshake, NoProgress, Timing, TransferObserver};
pub use id3::Id3Tags;
pub use session::{DeviceInfo, DeviceSession, FileInfo, FormatReport, SessionConfig, StorageProbe};

#[cfg(feature = "emulator")]
pub use emulator::{EmulatedDevice, EmulatedMedium};
