// SPDX-License-Identifier: MIT

pub mod entry;
pub mod fat;
pub mod header;
pub mod marker;
pub mod medium;

pub use entry::DirEntry;
pub use fat::FatLink;
pub use header::DirHeader;
pub use marker::PageMarker;
pub use medium::{CapacityVariant, StorageMedium};
