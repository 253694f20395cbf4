// SPDX-License-Identifier: MIT

//! ID3v1 trailer and MPEG frame header decoding.
//!
//! Both are best-effort: missing or malformed data yields empty fields.

/// Trailer length and marker.
pub const ID3V1_SIZE: usize = 128;
pub const ID3V1_MARKER: &[u8; 3] = b"TAG";

/// ID3v2 header length (a footer of the same size may follow).
pub const ID3V2_HEADER_SIZE: usize = 10;

/// Bytes scanned for an MPEG sync word after the ID3v2 prefix.
pub const FRAME_SCAN_LEN: usize = 2_048;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Id3Tags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    /// First MPEG frame bitrate, kbps.
    pub bitrate: Option<u16>,
}

impl Id3Tags {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.artist.is_empty() && self.album.is_empty()
    }
}

/// Latin-1 field, trailing NUL and space padding removed.
fn latin1_field(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    raw[..end].iter().map(|&b| b as char).collect::<String>().trim_end().to_string()
}

/// Parses the last 128 bytes of a file. Leaves every field empty when the
/// marker is absent.
pub fn parse_id3v1(tail: &[u8]) -> Id3Tags {
    let mut tags = Id3Tags::default();
    if tail.len() < ID3V1_SIZE {
        return tags;
    }
    let tag = &tail[tail.len() - ID3V1_SIZE..];
    if &tag[..3] != ID3V1_MARKER {
        return tags;
    }
    tags.title = latin1_field(&tag[3..33]);
    tags.artist = latin1_field(&tag[33..63]);
    tags.album = latin1_field(&tag[63..93]);
    tags.year = latin1_field(&tag[93..97]);
    tags
}

/// Length of a leading ID3v2 tag (header, body and optional footer), or 0.
pub fn id3v2_size(head: &[u8]) -> usize {
    if head.len() < ID3V2_HEADER_SIZE || &head[..3] != b"ID3" {
        return 0;
    }
    let size = &head[6..10];
    if size.iter().any(|&b| b & 0x80 != 0) {
        return 0;
    }
    let body = size.iter().fold(0usize, |acc, &b| (acc << 7) | b as usize);
    let footer = if head[5] & 0x10 != 0 { ID3V2_HEADER_SIZE } else { 0 };
    ID3V2_HEADER_SIZE + body + footer
}

const BITRATES_V1_L1: [u16; 14] = [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const BITRATES_V1_L2: [u16; 14] = [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const BITRATES_V1_L3: [u16; 14] = [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2_L1: [u16; 14] = [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const BITRATES_V2_L23: [u16; 14] = [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// Bitrate of a 4-byte MPEG audio frame header, kbps.
pub fn frame_bitrate(header: &[u8]) -> Option<u16> {
    let &[b0, b1, b2, ..] = header else {
        return None;
    };
    if b0 != 0xFF || b1 & 0xE0 != 0xE0 {
        return None;
    }
    let version = (b1 >> 3) & 0b11;
    let layer = (b1 >> 1) & 0b11;
    let index = (b2 >> 4) as usize;
    if version == 0b01 || layer == 0 || index == 0 || index == 15 {
        return None;
    }
    let table = match (version, layer) {
        (0b11, 0b11) => &BITRATES_V1_L1,
        (0b11, 0b10) => &BITRATES_V1_L2,
        (0b11, _) => &BITRATES_V1_L3,
        (_, 0b11) => &BITRATES_V2_L1,
        _ => &BITRATES_V2_L23,
    };
    Some(table[index - 1])
}

/// First decodable frame bitrate within `data`.
pub fn mpeg_bitrate(data: &[u8]) -> Option<u16> {
    data.windows(4).take(FRAME_SCAN_LEN).find_map(frame_bitrate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_block(title: &str, artist: &str, album: &str) -> Vec<u8> {
        let mut tag = vec![0u8; ID3V1_SIZE];
        tag[..3].copy_from_slice(ID3V1_MARKER);
        tag[3..3 + title.len()].copy_from_slice(title.as_bytes());
        tag[33..33 + artist.len()].copy_from_slice(artist.as_bytes());
        tag[63..63 + album.len()].copy_from_slice(album.as_bytes());
        tag[93..97].copy_from_slice(b"1998");
        tag
    }

    #[test]
    fn test_parse_id3v1() {
        let mut data = vec![0x11u8; 300];
        data.extend(tag_block("Song   ", "Band", "Record"));
        let tags = parse_id3v1(&data);
        assert_eq!(tags.title, "Song");
        assert_eq!(tags.artist, "Band");
        assert_eq!(tags.album, "Record");
        assert_eq!(tags.year, "1998");
    }

    #[test]
    fn test_missing_marker_is_empty() {
        assert!(parse_id3v1(&[0u8; 128]).is_empty());
        assert!(parse_id3v1(b"TAG").is_empty());
    }

    #[test]
    fn test_id3v2_size() {
        let mut head = *b"ID3\x03\x00\x00\x00\x00\x02\x01";
        assert_eq!(id3v2_size(&head), 10 + 257);
        head[5] = 0x10;
        assert_eq!(id3v2_size(&head), 20 + 257);
        assert_eq!(id3v2_size(b"\xFF\xFB\x90\x00"), 0);
    }

    #[test]
    fn test_frame_bitrate() {
        // MPEG-1 Layer III, index 9.
        assert_eq!(frame_bitrate(&[0xFF, 0xFB, 0x90, 0x00]), Some(128));
        // MPEG-2 Layer III, index 8.
        assert_eq!(frame_bitrate(&[0xFF, 0xF3, 0x80, 0x00]), Some(64));
        assert_eq!(frame_bitrate(&[0xFF, 0xFB, 0xF0, 0x00]), None);
        assert_eq!(frame_bitrate(&[0xFF, 0xFB]), None);
    }

    #[test]
    fn test_mpeg_bitrate_scans_past_garbage() {
        let mut data = vec![0u8; 37];
        data.extend([0xFF, 0xFB, 0xB0, 0x44]);
        assert_eq!(mpeg_bitrate(&data), Some(192));
        assert_eq!(mpeg_bitrate(&[0u8; 64]), None);
    }
}
