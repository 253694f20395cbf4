// SPDX-License-Identifier: MIT

pub mod log;
pub mod progress;
pub mod string;

pub use self::log::{LogLevel, log_level};
