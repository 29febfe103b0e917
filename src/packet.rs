/// Length of an FEC packet on the wire in bytes.
pub const FEC_PACKET_LEN: usize = 256;

/// Length of the payload field of an FEC packet.
pub const BLOCK_PAYLOAD: usize = 200;

/// Length of the packet header, sync byte included.
pub const HEADER_LEN: usize = 20;

/// Offset of the CRC-32 field.
pub const CRC_OFFSET: usize = HEADER_LEN + BLOCK_PAYLOAD;

/// Length of the zero-filled reserved tail.
pub const RESERVED_LEN: usize = FEC_PACKET_LEN - CRC_OFFSET - 4;

/// Maximum GF(2⁸) codeword length in symbols.
pub const RS_MAX: usize = 255;

/// FEC packet sync byte.
pub const SYNC_BYTE: u8 = 0x55;

/// FEC packet type byte.
pub const TYPE_FEC: u8 = 0x68;

// Base-40 callsign alphabet; unrecognised characters map to index 0.
const BASE40: &[u8; 40] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-_. ";

/// Payload kind carried in the `file_type` header field.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum FileType {
    /// Opaque bytes.
    #[default]
    Raw = 0,
    /// JPEG image (`FF D8` magic).
    Jpeg = 1,
    /// WebP image (`RIFF....WEBP` magic).
    Webp = 2,
}

impl FileType {
    /// Detects the payload kind from the leading magic bytes.
    pub fn detect(data: &[u8]) -> FileType {
        if data.starts_with(&[0xff, 0xd8]) {
            FileType::Jpeg
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            FileType::Webp
        } else {
            FileType::Raw
        }
    }

    /// Decodes the wire octet. Unknown values decode as [`FileType::Raw`].
    pub fn from_wire(value: u8) -> FileType {
        match value {
            1 => FileType::Jpeg,
            2 => FileType::Webp,
            _ => FileType::Raw,
        }
    }

    /// Encodes for the wire.
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// File extension conventionally used for this kind.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Raw => "bin",
            FileType::Jpeg => "jpg",
            FileType::Webp => "webp",
        }
    }
}

/// Encodes a callsign into its 32-bit base-40 representation.
///
/// The callsign is uppercased, space-padded to 6 characters and truncated to
/// 6. Characters outside the base-40 alphabet encode as index 0.
pub fn encode_callsign(call: &str) -> u32 {
    call.chars()
        .map(|c| c.to_ascii_uppercase())
        .chain(core::iter::repeat(' '))
        .take(6)
        .fold(0u32, |v, c| {
            let idx = BASE40
                .iter()
                .position(|&b| char::from(b) == c)
                .unwrap_or(0);
            v * 40 + idx as u32
        })
}

/// Decodes a 32-bit base-40 callsign, right-trimmed.
pub fn decode_callsign(mut value: u32) -> String {
    let mut chars = [b' '; 6];
    for slot in chars.iter_mut().rev() {
        *slot = BASE40[(value % 40) as usize];
        value /= 40;
    }
    let s: &str = core::str::from_utf8(&chars).unwrap_or("");
    s.trim_end().to_string()
}

/// Computes the CRC-32/IEEE checksum (as used by zlib).
pub fn crc32(data: &[u8]) -> u32 {
    let mut state = !0u32;
    for &byte in data {
        state ^= u32::from(byte);
        for _ in 0..8 {
            let carry = state & 1 != 0;
            state >>= 1;
            if carry {
                state ^= 0xEDB8_8320;
            }
        }
    }
    !state
}

/// One FEC block framed for the wire.
///
/// The 256-byte frame is big-endian throughout. The CRC-32 covers the header
/// without the sync byte plus the payload (bytes 1..220); the 32-byte
/// reserved tail is zero-filled and not covered.
///
/// Every packet of one image carries the full session parameters
/// (`callsign`, `image_id`, `k_data`, `n_total`, `file_size`, `file_type`,
/// `m_per_group`, `num_groups`), so a receiver can adopt a session from
/// whichever packet arrives first.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FecPacket {
    /// Sender callsign, up to 6 characters.
    pub callsign: String,
    /// Image this block belongs to.
    pub image_id: u8,
    /// Block id in `[0, n_total)`; ids below `k_data` carry file data.
    pub block_id: u16,
    /// Number of data blocks.
    pub k_data: u16,
    /// Total block count, data plus parity.
    pub n_total: u16,
    /// Original file size in bytes.
    pub file_size: u32,
    /// Payload kind of the original file.
    pub file_type: FileType,
    /// Parity blocks per Reed-Solomon group.
    pub m_per_group: u8,
    /// Number of Reed-Solomon groups.
    pub num_groups: u8,
    /// Block payload, zero-padded to 200 bytes.
    pub payload: [u8; BLOCK_PAYLOAD],
}

impl FecPacket {
    /// Returns true for parity blocks.
    pub fn is_parity(&self) -> bool {
        self.block_id >= self.k_data
    }

    /// Serialises into the 256-byte wire frame.
    pub fn to_bytes(&self) -> [u8; FEC_PACKET_LEN] {
        let mut out = [0u8; FEC_PACKET_LEN];
        out[0] = SYNC_BYTE;
        out[1] = TYPE_FEC;
        out[2..6].copy_from_slice(&encode_callsign(&self.callsign).to_be_bytes());
        out[6] = self.image_id;
        out[7..9].copy_from_slice(&self.block_id.to_be_bytes());
        out[9..11].copy_from_slice(&self.k_data.to_be_bytes());
        out[11..13].copy_from_slice(&self.n_total.to_be_bytes());
        out[13..17].copy_from_slice(&self.file_size.to_be_bytes());
        out[17] = self.file_type.to_wire();
        out[18] = self.m_per_group;
        out[19] = self.num_groups;
        out[HEADER_LEN..CRC_OFFSET].copy_from_slice(&self.payload);
        let crc = crc32(&out[1..CRC_OFFSET]);
        out[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_be_bytes());
        // reserved tail stays zero
        out
    }

    /// Parses a wire frame.
    ///
    /// Returns `None` if the buffer is too short, the sync or type byte is
    /// wrong, or the CRC-32 does not match.
    pub fn from_bytes(raw: &[u8]) -> Option<FecPacket> {
        if raw.len() < FEC_PACKET_LEN || raw[0] != SYNC_BYTE || raw[1] != TYPE_FEC {
            return None;
        }
        let expected = u32::from_be_bytes(raw[CRC_OFFSET..CRC_OFFSET + 4].try_into().unwrap());
        if crc32(&raw[1..CRC_OFFSET]) != expected {
            return None;
        }
        let mut payload = [0u8; BLOCK_PAYLOAD];
        payload.copy_from_slice(&raw[HEADER_LEN..CRC_OFFSET]);
        Some(FecPacket {
            callsign: decode_callsign(u32::from_be_bytes(raw[2..6].try_into().unwrap())),
            image_id: raw[6],
            block_id: u16::from_be_bytes(raw[7..9].try_into().unwrap()),
            k_data: u16::from_be_bytes(raw[9..11].try_into().unwrap()),
            n_total: u16::from_be_bytes(raw[11..13].try_into().unwrap()),
            file_size: u32::from_be_bytes(raw[13..17].try_into().unwrap()),
            file_type: FileType::from_wire(raw[17]),
            m_per_group: raw[18],
            num_groups: raw[19],
            payload,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_packet() -> FecPacket {
        let mut payload = [0u8; BLOCK_PAYLOAD];
        for (j, b) in payload.iter_mut().enumerate() {
            *b = (j * 3 % 251) as u8;
        }
        FecPacket {
            callsign: "R2D2".to_string(),
            image_id: 7,
            block_id: 42,
            k_data: 100,
            n_total: 125,
            file_size: 19_999,
            file_type: FileType::Jpeg,
            m_per_group: 25,
            num_groups: 1,
            payload,
        }
    }

    #[test]
    fn wire_roundtrip() {
        let pkt = sample_packet();
        let raw = pkt.to_bytes();
        assert_eq!(raw.len(), FEC_PACKET_LEN);
        assert_eq!(raw[0], SYNC_BYTE);
        assert_eq!(raw[1], TYPE_FEC);
        assert_eq!(&raw[CRC_OFFSET + 4..], &[0u8; RESERVED_LEN]);
        let parsed = FecPacket::from_bytes(&raw).unwrap();
        assert_eq!(parsed, pkt);
    }

    #[test]
    fn crc_scope_excludes_sync_and_reserved() {
        let pkt = sample_packet();
        let mut raw = pkt.to_bytes();
        // the reserved tail is not covered by the CRC
        raw[FEC_PACKET_LEN - 1] = 0xab;
        assert!(FecPacket::from_bytes(&raw).is_some());
        // recompute the CRC over a range that wrongly includes the sync byte
        let wrong = crc32(&raw[0..CRC_OFFSET]);
        let right = u32::from_be_bytes(raw[CRC_OFFSET..CRC_OFFSET + 4].try_into().unwrap());
        assert_ne!(wrong, right);
    }

    #[test]
    fn corruption_is_rejected() {
        let pkt = sample_packet();
        let raw = pkt.to_bytes();
        for j in 1..CRC_OFFSET + 4 {
            let mut bad = raw;
            bad[j] ^= 0x01;
            assert!(FecPacket::from_bytes(&bad).is_none(), "byte {j}");
        }
    }

    #[test]
    fn short_or_badly_framed_input() {
        let raw = sample_packet().to_bytes();
        assert!(FecPacket::from_bytes(&raw[..FEC_PACKET_LEN - 1]).is_none());
        let mut bad = raw;
        bad[0] = 0x54;
        assert!(FecPacket::from_bytes(&bad).is_none());
        let mut bad = raw;
        bad[1] = 0x67;
        assert!(FecPacket::from_bytes(&bad).is_none());
    }

    #[test]
    fn crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn callsign_roundtrip() {
        for call in ["LORETT", "r2d2", "A", "N0CALL", "AB-CD.", "W1_W", ""] {
            let encoded = encode_callsign(call);
            let expected: String = call
                .chars()
                .map(|c| c.to_ascii_uppercase())
                .chain(core::iter::repeat(' '))
                .take(6)
                .collect::<String>()
                .trim_end()
                .to_string();
            assert_eq!(decode_callsign(encoded), expected);
        }
    }

    #[test]
    fn callsign_unknown_chars_map_to_zero() {
        assert_eq!(encode_callsign("~~~~~~"), encode_callsign("000000"));
    }

    #[test]
    fn callsign_truncates_to_six() {
        assert_eq!(
            encode_callsign("LONGCALLSIGN"),
            encode_callsign("LONGCA")
        );
    }

    #[test]
    fn file_type_detection() {
        assert_eq!(FileType::detect(&[0xff, 0xd8, 0xff, 0xe0]), FileType::Jpeg);
        assert_eq!(FileType::detect(b"RIFF\x00\x00\x00\x00WEBPVP8 "), FileType::Webp);
        assert_eq!(FileType::detect(b"RIFF\x00\x00\x00\x00WAVE"), FileType::Raw);
        assert_eq!(FileType::detect(&[0x00, 0x01]), FileType::Raw);
        assert_eq!(FileType::detect(&[]), FileType::Raw);
    }

    #[test]
    fn file_type_wire_mapping() {
        for ft in [FileType::Raw, FileType::Jpeg, FileType::Webp] {
            assert_eq!(FileType::from_wire(ft.to_wire()), ft);
        }
        assert_eq!(FileType::from_wire(0xcc), FileType::Raw);
        assert_eq!(FileType::Jpeg.extension(), "jpg");
    }
}
