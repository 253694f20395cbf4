// SPDX-License-Identifier: MIT

pub mod pmp300;
