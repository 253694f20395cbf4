// SPDX-License-Identifier: MIT

use time::OffsetDateTime;

pub fn pretty_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut val = n as f64;
    let mut idx = 0usize;
    while val >= 1024.0 && idx + 1 < UNITS.len() {
        val /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{} {}", sep_u64(n), UNITS[idx])
    } else {
        format!("{:.1} {}", val, UNITS[idx])
    }
}

pub fn sep_u64(mut n: u64) -> String {
    if n < 1_000 {
        return n.to_string();
    }
    let mut parts: Vec<String> = Vec::new();
    while n >= 1_000 {
        parts.push(format!("{:03}", (n % 1_000)));
        n /= 1_000;
    }
    parts.push(n.to_string());
    parts.reverse();
    parts.join(" ")
}

/// Cuts `s` to at most `max` characters.
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, `-` when unset.
pub fn format_time(t: Option<OffsetDateTime>) -> String {
    match t {
        Some(t) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            t.year(),
            t.month() as u8,
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        ),
        None => "-".into(),
    }
}

pub fn format_bitrate(kbps: Option<u16>) -> String {
    match kbps {
        Some(k) => format!("{k} kbps"),
        None => "-".into(),
    }
}

pub fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

pub fn hex_bytes(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_bytes() {
        assert_eq!(pretty_bytes(512), "512 B");
        assert_eq!(pretty_bytes(32 * 1024 * 1024), "32.0 MiB");
        assert_eq!(sep_u64(1_234_567), "1 234 567");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("éé", 1), "é");
    }

    #[test]
    fn test_format_time() {
        let t = OffsetDateTime::from_unix_timestamp(946_684_800).ok();
        assert_eq!(format_time(t), "2000-01-01 00:00:00");
        assert_eq!(format_time(None), "-");
    }
}
