// SPDX-License-Identifier: MIT

pub mod handshake;
pub mod scanner;
pub mod transfer;

pub use handshake::{Handshake, Timing};
pub use scanner::{scan_surface, test_pattern};
pub use transfer::{NoProgress, TransferObserver};
