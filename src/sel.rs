/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! SEL repository engine: a fixed-capacity circular log of 16-byte event
//! records, persisted to a flat file (header page + record slots).
//!
//! The ring keeps `capacity + 1` slots so that "full" and "empty" are
//! distinguishable from the `(begin, end)` cursors alone: `begin == end`
//! is empty, and the entry count is `(end - begin) mod (capacity + 1)`.
//! Record ids are the 1-based slot index, so a given id can refer to a
//! different entry after enough wraparound; reservation tokens exist to
//! detect concurrent erases, not to pin record identity.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{IpmiError, IpmiResult};
use crate::ipmi::ipmi::{CC_INVALID_RESERVATION, CC_NOT_FOUND};
use crate::ipmi::time::{ipmi_timestamp_now, ipmi_timestamp_numeric};

pub const SEL_RECORDS_MAX: usize = 128;
pub const SEL_RECORD_SIZE: usize = 16;
pub const SEL_RING_SLOTS: usize = SEL_RECORDS_MAX + 1;

pub const SEL_ID_FIRST: u16 = 0x0000;
pub const SEL_ID_LAST: u16 = 0xFFFF;

/// Erase status byte: no background erase is modeled, so erasure is
/// always reported complete.
pub const SEL_ERASE_COMPLETED: u8 = 0x01;

const SEL_FILE_MAGIC: u32 = 0x4C45532F; // "/SEL"
const SEL_FILE_VERSION: u32 = 1;
const SEL_HEADER_SIZE: u64 = 32;

/// One 16-byte System Event Record. Bytes 3..7 hold the little-endian
/// timestamp stamped at insertion time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelMsg(pub [u8; SEL_RECORD_SIZE]);

impl Default for SelMsg {
    fn default() -> Self {
        SelMsg([0u8; SEL_RECORD_SIZE])
    }
}

pub struct SelLog {
    file: File,
    path: PathBuf,
    records: Vec<SelMsg>,
    begin: usize,
    end: usize,
    ts_add: u32,
    ts_erase: u32,
    reservation: u16,
}

impl SelLog {
    /// Open (or create) the backing file and load the persisted log.
    /// A header that fails validation is treated as a fresh log.
    pub fn open<P: AsRef<Path>>(path: P) -> IpmiResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let mut log = SelLog {
            file: file.try_clone()?,
            path,
            records: vec![SelMsg::default(); SEL_RING_SLOTS],
            begin: 0,
            end: 0,
            ts_add: 0,
            ts_erase: 0,
            reservation: 0,
        };

        if !log.load(&mut file)? {
            log.persist_header(log.begin, log.end, log.ts_add, log.ts_erase)?;
            info!("SEL: initialized empty log at {}", log.path.display());
        }
        Ok(log)
    }

    fn load(&mut self, file: &mut File) -> IpmiResult<bool> {
        let len = file.metadata()?.len();
        if len < SEL_HEADER_SIZE {
            return Ok(false);
        }
        let mut header = [0u8; SEL_HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;

        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let begin = u16::from_le_bytes([header[8], header[9]]) as usize;
        let end = u16::from_le_bytes([header[10], header[11]]) as usize;
        if magic != SEL_FILE_MAGIC || version != SEL_FILE_VERSION {
            warn!("SEL: bad header in {}, starting fresh", self.path.display());
            return Ok(false);
        }
        if begin >= SEL_RING_SLOTS || end >= SEL_RING_SLOTS {
            warn!("SEL: cursor out of range in {}, starting fresh", self.path.display());
            return Ok(false);
        }
        self.begin = begin;
        self.end = end;
        self.ts_add = u32::from_le_bytes([header[12], header[13], header[14], header[15]]);
        self.ts_erase = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);

        for (idx, rec) in self.records.iter_mut().enumerate() {
            let off = SEL_HEADER_SIZE + (idx * SEL_RECORD_SIZE) as u64;
            if off + SEL_RECORD_SIZE as u64 > len {
                break;
            }
            file.seek(SeekFrom::Start(off))?;
            file.read_exact(&mut rec.0)?;
        }
        info!(
            "SEL: loaded {} entries from {} (last add {})",
            self.num_entries(),
            self.path.display(),
            ipmi_timestamp_numeric(self.ts_add)
        );
        Ok(true)
    }

    fn persist_record(&mut self, idx: usize, rec: &SelMsg) -> IpmiResult<()> {
        let off = SEL_HEADER_SIZE + (idx * SEL_RECORD_SIZE) as u64;
        self.file.seek(SeekFrom::Start(off))?;
        self.file.write_all(&rec.0)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn persist_header(
        &mut self,
        begin: usize,
        end: usize,
        ts_add: u32,
        ts_erase: u32,
    ) -> IpmiResult<()> {
        let mut header = [0u8; SEL_HEADER_SIZE as usize];
        header[0..4].copy_from_slice(&SEL_FILE_MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&SEL_FILE_VERSION.to_le_bytes());
        header[8..10].copy_from_slice(&(begin as u16).to_le_bytes());
        header[10..12].copy_from_slice(&(end as u16).to_le_bytes());
        header[12..16].copy_from_slice(&ts_add.to_le_bytes());
        header[16..20].copy_from_slice(&ts_erase.to_le_bytes());
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn num_entries(&self) -> usize {
        (self.end + SEL_RING_SLOTS - self.begin) % SEL_RING_SLOTS
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn is_full(&self) -> bool {
        self.num_entries() == SEL_RECORDS_MAX
    }

    /// Free space in bytes, as reported by Get SEL Info.
    pub fn free_space(&self) -> u16 {
        ((SEL_RECORDS_MAX - self.num_entries()) * SEL_RECORD_SIZE) as u16
    }

    pub fn timestamps(&self) -> (u32, u32) {
        (self.ts_add, self.ts_erase)
    }

    /// Append a record, stamping its timestamp bytes. When the log is full
    /// the oldest record is dropped to make room. The file write happens
    /// first; in-memory cursors advance only once it has succeeded, so an
    /// I/O failure is a clean no-op.
    pub fn add_entry(&mut self, msg: &SelMsg) -> IpmiResult<u16> {
        let now = ipmi_timestamp_now();
        let mut rec = *msg;
        rec.0[3..7].copy_from_slice(&now.to_le_bytes());

        let mut begin = self.begin;
        if self.is_full() {
            warn!("SEL: log full, dropping oldest entry (rollover)");
            begin = (begin + 1) % SEL_RING_SLOTS;
        }
        let slot = self.end;
        let end = (slot + 1) % SEL_RING_SLOTS;

        self.persist_record(slot, &rec)?;
        self.persist_header(begin, end, now, self.ts_erase)?;

        self.records[slot] = rec;
        self.begin = begin;
        self.end = end;
        self.ts_add = now;
        Ok(slot as u16 + 1)
    }

    fn resolve_index(&self, record_id: u16) -> IpmiResult<usize> {
        if self.is_empty() {
            return Err(IpmiError::Completion(CC_NOT_FOUND));
        }
        match record_id {
            SEL_ID_FIRST => Ok(self.begin),
            SEL_ID_LAST => Ok((self.end + SEL_RING_SLOTS - 1) % SEL_RING_SLOTS),
            id => {
                let idx = (id as usize).wrapping_sub(1);
                if idx >= SEL_RING_SLOTS {
                    return Err(IpmiError::Completion(CC_NOT_FOUND));
                }
                // Circular window check: idx must fall in [begin, end).
                let dist = (idx + SEL_RING_SLOTS - self.begin) % SEL_RING_SLOTS;
                if dist >= self.num_entries() {
                    return Err(IpmiError::Completion(CC_NOT_FOUND));
                }
                Ok(idx)
            }
        }
    }

    /// Fetch a record by id (or the FIRST/LAST sentinels). Returns the
    /// record and the id of its successor, `SEL_ID_LAST` when the record
    /// is the newest one.
    pub fn get_entry(&self, record_id: u16) -> IpmiResult<(SelMsg, u16)> {
        let idx = self.resolve_index(record_id)?;
        let next = (idx + 1) % SEL_RING_SLOTS;
        let next_id = if next == self.end {
            SEL_ID_LAST
        } else {
            next as u16 + 1
        };
        Ok((self.records[idx], next_id))
    }

    /// Issue a fresh reservation token in [1, 0xFFFE]. Only the most
    /// recently issued token is current; this is single-writer-intent
    /// signaling, not isolation.
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

    /// Clear the log: cursors reset, record data left in place. Requires
    /// the current reservation token.
    pub fn erase(&mut self, rsv: u16) -> IpmiResult<()> {
        if !self.check_reservation(rsv) {
            return Err(IpmiError::Completion(CC_INVALID_RESERVATION));
        }
        let now = ipmi_timestamp_now();
        self.persist_header(0, 0, self.ts_add, now)?;
        self.begin = 0;
        self.end = 0;
        self.ts_erase = now;
        info!("SEL: log cleared");
        Ok(())
    }

    pub fn erase_status(&self, rsv: u16) -> IpmiResult<u8> {
        if !self.check_reservation(rsv) {
            return Err(IpmiError::Completion(CC_INVALID_RESERVATION));
        }
        Ok(SEL_ERASE_COMPLETED)
    }
}
