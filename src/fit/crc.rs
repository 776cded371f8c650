//! FIT CRC-16.
//!
//! Nibble-wise table driven checksum used for the 14-byte file header and
//! for the trailer over the complete record stream. Starts from zero.

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

#[inline]
fn update_nibble(crc: u16, nibble: u8) -> u16 {
    ((crc >> 4) & 0x0FFF) ^ CRC_TABLE[(crc & 0xF) as usize] ^ CRC_TABLE[(nibble & 0xF) as usize]
}

/// Fold one byte into `crc`: low nibble first, then high nibble.
#[inline]
pub fn crc_byte(crc: u16, byte: u8) -> u16 {
    update_nibble(update_nibble(crc, byte & 0x0F), byte >> 4)
}

/// CRC of `bytes`, continuing from `initial`.
///
/// Chaining is associative over concatenation:
/// `crc16(b, crc16(a, 0)) == crc16(a ++ b, 0)`.
pub fn crc16(bytes: &[u8], initial: u16) -> u16 {
    bytes.iter().fold(initial, |crc, &byte| crc_byte(crc, byte))
}
