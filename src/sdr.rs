/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! SDR repository engine: an append-only catalog of 64-byte sensor
//! descriptor records, populated once at daemon init from the platform
//! sensor table. Record ids are the 1-based append position and never
//! change; there is no wraparound and no runtime removal.

use crate::error::{IpmiError, IpmiResult};
use crate::ipmi::ipmi::{
    CC_INVALID_RESERVATION, CC_NOT_FOUND, CC_OUT_OF_SPACE, CC_PARAM_OUT_OF_RANGE,
};
use crate::ipmi::time::ipmi_timestamp_now;

pub const SDR_RECORDS_MAX: usize = 64;
pub const SDR_RECORD_SIZE: usize = 64;

pub const SDR_ID_FIRST: u16 = 0x0000;
pub const SDR_ID_LAST: u16 = 0xFFFF;

/// Read the entire record regardless of its length.
pub const SDR_ENTIRE_RECORD: u8 = 0xFF;

// Record type tags (byte 3 of the record header).
pub const SDR_TYPE_FULL: u8 = 0x01;
pub const SDR_TYPE_MGMT_CONTROLLER: u8 = 0x12;
pub const SDR_TYPE_OEM: u8 = 0xC0;

/// One opaque 64-byte SDR. Bytes 0..2 hold the record id (little-endian),
/// assigned by the repository on add.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdrRec(pub [u8; SDR_RECORD_SIZE]);

impl Default for SdrRec {
    fn default() -> Self {
        SdrRec([0u8; SDR_RECORD_SIZE])
    }
}

pub struct SdrRepo {
    records: Vec<SdrRec>,
    reservation: u16,
    ts_add: u32,
}

impl Default for SdrRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SdrRepo {
    pub fn new() -> Self {
        SdrRepo {
            records: Vec::new(),
            reservation: 0,
            ts_add: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Free space in bytes, as reported by Get SDR Repository Info.
    pub fn free_space(&self) -> u16 {
        ((SDR_RECORDS_MAX - self.records.len()) * SDR_RECORD_SIZE) as u16
    }

    pub fn last_add_timestamp(&self) -> u32 {
        self.ts_add
    }

    /// Append a record. The record id bytes are overwritten with the
    /// assigned 1-based position. Fails when the repository is full.
    pub fn add(&mut self, rec: &SdrRec) -> IpmiResult<u16> {
        if self.records.len() >= SDR_RECORDS_MAX {
            return Err(IpmiError::Completion(CC_OUT_OF_SPACE));
        }
        let id = self.records.len() as u16 + 1;
        let mut rec = *rec;
        rec.0[0..2].copy_from_slice(&id.to_le_bytes());
        self.records.push(rec);
        self.ts_add = ipmi_timestamp_now();
        Ok(id)
    }

    pub fn reserve(&mut self) -> u16 {
        self.reservation = if self.reservation >= 0xFFFE {
            1
        } else {
            self.reservation + 1
        };
        self.reservation
    }

    pub fn check_reservation(&self, rsv: u16) -> bool {
        rsv == self.reservation && rsv != 0
    }

    fn resolve_index(&self, record_id: u16) -> IpmiResult<usize> {
        if self.records.is_empty() {
            return Err(IpmiError::Completion(CC_NOT_FOUND));
        }
        match record_id {
            SDR_ID_FIRST => Ok(0),
            SDR_ID_LAST => Ok(self.records.len() - 1),
            id => {
                let idx = (id as usize) - 1;
                if idx >= self.records.len() {
                    return Err(IpmiError::Completion(CC_NOT_FOUND));
                }
                Ok(idx)
            }
        }
    }

    /// Partial-read of a record, validated against the current
    /// reservation token. Returns the successor record id (`SDR_ID_LAST`
    /// after the final record) and the requested byte window.
    pub fn get_entry(
        &self,
        rsv: u16,
        record_id: u16,
        offset: u8,
        count: u8,
    ) -> IpmiResult<(u16, Vec<u8>)> {
        if !self.check_reservation(rsv) {
            return Err(IpmiError::Completion(CC_INVALID_RESERVATION));
        }
        let idx = self.resolve_index(record_id)?;
        let offset = offset as usize;
        if offset >= SDR_RECORD_SIZE {
            return Err(IpmiError::Completion(CC_PARAM_OUT_OF_RANGE));
        }
        let count = if count == SDR_ENTIRE_RECORD {
            SDR_RECORD_SIZE - offset
        } else {
            (count as usize).min(SDR_RECORD_SIZE - offset)
        };
        let next_id = if idx + 1 == self.records.len() {
            SDR_ID_LAST
        } else {
            idx as u16 + 2
        };
        Ok((next_id, self.records[idx].0[offset..offset + count].to_vec()))
    }
}
