/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Wire-level IPMI definitions: NetFn numbers, completion codes, the
//! request/response framing and a bounds-checked reader for command data.

use crate::error::{IpmiError, IpmiResult};

// Constants
pub const IPMI_BUF_SIZE: usize = 1024;

// Request NetFns (even); the paired response NetFn is always request + 1.
pub const NETFN_CHASSIS_REQ: u8 = 0x00;
pub const NETFN_SENSOR_REQ: u8 = 0x04;
pub const NETFN_APP_REQ: u8 = 0x06;
pub const NETFN_STORAGE_REQ: u8 = 0x0A;
pub const NETFN_TRANSPORT_REQ: u8 = 0x0C;
pub const NETFN_DCMI_REQ: u8 = 0x2C;
pub const NETFN_OEM_REQ: u8 = 0x30;
pub const NETFN_OEM_Q_REQ: u8 = 0x36;
pub const NETFN_OEM_1S_REQ: u8 = 0x38;
pub const NETFN_OEM_USB_DBG_REQ: u8 = 0x3C;

// Completion codes
pub const CC_SUCCESS: u8 = 0x00;
pub const CC_NODE_BUSY: u8 = 0xC0;
pub const CC_INVALID_CMD: u8 = 0xC1;
pub const CC_OUT_OF_SPACE: u8 = 0xC4;
pub const CC_INVALID_RESERVATION: u8 = 0xC5;
pub const CC_INVALID_LENGTH: u8 = 0xC7;
pub const CC_PARAM_OUT_OF_RANGE: u8 = 0xC9;
pub const CC_NOT_FOUND: u8 = 0xCB;
pub const CC_INVALID_PARAM: u8 = 0xCC;
pub const CC_NOT_SUPP_IN_CURR_STATE: u8 = 0xD5;
pub const CC_UNSPECIFIED_ERROR: u8 = 0xFF;

/// Decoded IPMI request. `payload_id` selects the target slot on
/// multi-node platforms and is 0 on single-node ones.
#[derive(Debug, Clone, PartialEq)]
pub struct IpmiRequest {
    pub netfn: u8,
    pub lun: u8,
    pub cmd: u8,
    pub payload_id: u8,
    pub data: Vec<u8>,
}

impl IpmiRequest {
    /// Decode a raw request buffer. The fixed header is `netfn_lun` and
    /// `cmd`, plus one `payload_id` byte on multi-node platforms; anything
    /// after that is command data. Buffers too short to carry the header
    /// are rejected here, before any handler runs.
    pub fn parse(buf: &[u8], multi_node: bool) -> IpmiResult<Self> {
        let header = if multi_node { 3 } else { 2 };
        if buf.len() < header {
            return Err(IpmiError::InvalidData(format!(
                "request too short: {} byte(s)",
                buf.len()
            )));
        }
        Ok(Self {
            netfn: buf[0] >> 2,
            lun: buf[0] & 0x03,
            cmd: buf[1],
            payload_id: if multi_node { buf[2] } else { 0 },
            data: buf[header..].to_vec(),
        })
    }
}

/// IPMI response under construction. The completion code starts at the
/// `CC_UNSPECIFIED_ERROR` sentinel; a handler that never overwrites it
/// reports failure to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct IpmiResponse {
    pub netfn: u8,
    pub lun: u8,
    pub cmd: u8,
    pub cc: u8,
    pub data: Vec<u8>,
}

impl IpmiResponse {
    pub fn for_request(req: &IpmiRequest) -> Self {
        Self {
            netfn: req.netfn + 1,
            lun: req.lun,
            cmd: req.cmd,
            cc: CC_UNSPECIFIED_ERROR,
            data: Vec::new(),
        }
    }

    /// Frame the response: the 3-byte header (netfn_lun, cmd, cc) is added
    /// exactly once here, after the handler has run.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + self.data.len());
        out.push((self.netfn << 2) | (self.lun & 0x03));
        out.push(self.cmd);
        out.push(self.cc);
        out.extend_from_slice(&self.data);
        out
    }
}

/// Bounds-checked cursor over command data. Truncated input fails with an
/// invalid-length completion code instead of reading past the payload.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> IpmiResult<u8> {
        let b = self
            .buf
            .get(self.pos)
            .copied()
            .ok_or(IpmiError::Completion(CC_INVALID_LENGTH))?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16_le(&mut self) -> IpmiResult<u16> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub fn read_u32_le(&mut self) -> IpmiResult<u32> {
        let mut b = [0u8; 4];
        for v in b.iter_mut() {
            *v = self.read_u8()?;
        }
        Ok(u32::from_le_bytes(b))
    }

    pub fn read_bytes(&mut self, n: usize) -> IpmiResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(IpmiError::Completion(CC_INVALID_LENGTH));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> &'a [u8] {
        let s = &self.buf[self.pos..];
        self.pos = self.buf.len();
        s
    }
}
