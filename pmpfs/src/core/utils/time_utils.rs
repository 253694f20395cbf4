// SPDX-License-Identifier: MIT

//! Timestamp helpers for directory and entry times.
//!
//! On-media times are 32-bit seconds since the UNIX epoch. Anything before
//! 1990-01-01 is treated as unset.

use time::OffsetDateTime;

/// 1990-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP: u32 = 631_152_000;

/// Returns the current UTC time.
///
/// - In `std` mode, returns the actual system UTC time.
/// - Otherwise returns `OffsetDateTime::UNIX_EPOCH`.
pub fn now_utc() -> OffsetDateTime {
    #[cfg(feature = "std")]
    {
        OffsetDateTime::now_utc()
    }

    #[cfg(not(feature = "std"))]
    {
        OffsetDateTime::UNIX_EPOCH
    }
}

/// Current time as an on-media timestamp, clamped to the u32 range.
pub fn now_timestamp() -> u32 {
    now_utc().unix_timestamp().clamp(0, u32::MAX as i64) as u32
}

/// Decodes an on-media timestamp. `None` for unset (pre-1990) values.
pub fn timestamp_to_datetime(ts: u32) -> Option<OffsetDateTime> {
    if ts < MIN_VALID_TIMESTAMP {
        return None;
    }
    OffsetDateTime::from_unix_timestamp(ts as i64).ok()
}
