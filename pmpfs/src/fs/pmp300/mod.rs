// SPDX-License-Identifier: MIT

pub mod allocator;
pub mod checker;
pub mod codec;
pub mod constant;
pub mod directory;
pub mod table;
pub mod types;

// === Public Interface ===
pub mod prelude {
    pub use super::allocator::{BlockAllocator, BlockChain, resolve_chain, walk_chain};
    pub use super::codec::{DirectoryRead, decode, encode, seal};
    pub use super::constant::*;
    pub use super::directory::Directory;
    pub use super::table::{FileTable, validate_name};
    pub use super::types::*;
    pub use crate::core::checker::*;
    pub use crate::core::errors::*;
    pub use crate::core::traits::*;
    pub use crate::core::utils::usage_map::BlockState;
}
