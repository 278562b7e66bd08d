/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
pub fn ipmi16toh(data: &[u8; 2]) -> u16 {
    u16::from_le_bytes(*data)
}

pub fn ipmi24toh(data: &[u8; 3]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], 0])
}

pub fn ipmi32toh(data: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*data)
}

pub fn htoipmi16(val: u16) -> [u8; 2] {
    val.to_le_bytes()
}

pub fn htoipmi32(val: u32) -> [u8; 4] {
    val.to_le_bytes()
}

pub fn buf2str(data: &[u8], len: usize) -> String {
    data.iter()
        .take(len)
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}
