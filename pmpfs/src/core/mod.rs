// SPDX-License-Identifier: MIT

// === Sub-modules ===
pub mod allocator;
pub mod checker;
pub mod errors;
pub mod macros;
pub mod utils;

// === Core Traits ===
pub mod traits {
    pub use super::allocator::{FsAllocator, FsHandle};
    pub use super::checker::FsChecker;
}

// === Error types ===
pub use errors::*;

// === Utilities ===
pub use utils::{checksum_utils::*, time_utils::*, usage_map::*};
