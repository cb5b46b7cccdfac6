//! LX-D02 command frames.
//!
//! Every host-to-device control frame starts with `0x5A` followed by a
//! command byte; image data packets start with `0x55` and a big-endian
//! packet index. Device-to-host frames reuse the `0x5A` convention, so
//! command bytes double as notification identifiers.

/// Leading byte of every control frame.
pub const CTRL: u8 = 0x5A;
/// Leading byte of every image data packet.
pub const DATA: u8 = 0x55;

/// Command / notification bytes (second byte of a `0x5A` frame).
pub const CMD_IDENTIFY: u8 = 0x01;
pub const CMD_STATUS: u8 = 0x02;
pub const CMD_JOB: u8 = 0x04;
pub const CMD_RETRANSMIT: u8 = 0x05;
pub const CMD_FINISHED: u8 = 0x06;
pub const CMD_COOLDOWN: u8 = 0x07;
pub const CMD_HOLD: u8 = 0x08;
pub const CMD_TOKEN_A: u8 = 0x0A;
pub const CMD_TOKEN_B: u8 = 0x0B;
pub const CMD_ENERGY: u8 = 0x0C;

/// First handshake frame: identify, ten zero payload bytes.
pub fn identify() -> [u8; 12] {
    [CTRL, CMD_IDENTIFY, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
}

/// Second handshake frame: fixed vendor token A.
pub fn vendor_token_a() -> [u8; 12] {
    [
        CTRL, CMD_TOKEN_A, 0xB5, 0x7C, 0x4C, 0xB8, 0xAE, 0x70, 0x51, 0xE6, 0xD3, 0x06,
    ]
}

/// Third handshake frame: fixed vendor token B.
pub fn vendor_token_b() -> [u8; 12] {
    [
        CTRL, CMD_TOKEN_B, 0x66, 0x3B, 0x62, 0x8C, 0x1A, 0x69, 0xBF, 0x54, 0x74, 0x4C,
    ]
}

/// Final handshake frame: thermal head drive level, 0-6.
pub fn set_energy(level: u8) -> [u8; 3] {
    [CTRL, CMD_ENERGY, level]
}

/// Begin-job frame `5A 04 lh ll 00 00`, where `lh ll` is the big-endian
/// packet count.
pub fn begin_job(packet_count: u16) -> [u8; 6] {
    let [hi, lo] = packet_count.to_be_bytes();
    [CTRL, CMD_JOB, hi, lo, 0x00, 0x00]
}

/// End-of-transmission frame `5A 04 lh ll 01 00`.
pub fn end_job(packet_count: u16) -> [u8; 6] {
    let [hi, lo] = packet_count.to_be_bytes();
    [CTRL, CMD_JOB, hi, lo, 0x01, 0x00]
}

/// Image packet prefix `55 m n` with the big-endian packet index.
pub fn packet_prefix(index: u16) -> [u8; 3] {
    let [m, n] = index.to_be_bytes();
    [DATA, m, n]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_frame() {
        let frame = identify();
        assert_eq!(frame.len(), 12);
        assert_eq!(frame[0], 0x5A);
        assert_eq!(frame[1], 0x01);
        assert!(frame[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_vendor_tokens() {
        assert_eq!(
            vendor_token_a(),
            [0x5A, 0x0A, 0xB5, 0x7C, 0x4C, 0xB8, 0xAE, 0x70, 0x51, 0xE6, 0xD3, 0x06]
        );
        assert_eq!(
            vendor_token_b(),
            [0x5A, 0x0B, 0x66, 0x3B, 0x62, 0x8C, 0x1A, 0x69, 0xBF, 0x54, 0x74, 0x4C]
        );
    }

    #[test]
    fn test_set_energy() {
        assert_eq!(set_energy(2), [0x5A, 0x0C, 0x02]);
    }

    #[test]
    fn test_begin_and_end_job() {
        assert_eq!(begin_job(0x0102), [0x5A, 0x04, 0x01, 0x02, 0x00, 0x00]);
        assert_eq!(end_job(0x0102), [0x5A, 0x04, 0x01, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_packet_prefix_big_endian() {
        assert_eq!(packet_prefix(0), [0x55, 0x00, 0x00]);
        assert_eq!(packet_prefix(0x1234), [0x55, 0x12, 0x34]);
        assert_eq!(packet_prefix(u16::MAX), [0x55, 0xFF, 0xFF]);
    }
}
