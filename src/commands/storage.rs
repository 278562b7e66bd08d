/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Storage NetFn (0x0A) handlers: FRU inventory, SDR repository and SEL.

use log::error;

use crate::context::ServerContext;
use crate::error::IpmiResult;
use crate::helper::{htoipmi16, ipmi16toh};
use crate::ipmi::ipmi::*;
use crate::ipmi::time::ipmi_timestamp_now;
use crate::sel::{SelMsg, SEL_RECORD_SIZE};

pub const CMD_GET_FRUID_INFO: u8 = 0x10;
pub const CMD_READ_FRUID_DATA: u8 = 0x11;
pub const CMD_WRITE_FRUID_DATA: u8 = 0x12;

pub const CMD_GET_SDR_INFO: u8 = 0x20;
pub const CMD_RESERVE_SDR: u8 = 0x22;
pub const CMD_GET_SDR: u8 = 0x23;

pub const CMD_GET_SEL_INFO: u8 = 0x40;
pub const CMD_GET_SEL_ALLOC_INFO: u8 = 0x41;
pub const CMD_RESERVE_SEL: u8 = 0x42;
pub const CMD_GET_SEL_ENTRY: u8 = 0x43;
pub const CMD_ADD_SEL_ENTRY: u8 = 0x44;
pub const CMD_CLEAR_SEL: u8 = 0x47;
pub const CMD_GET_SEL_TIME: u8 = 0x48;
pub const CMD_GET_SEL_UTC_OFFSET: u8 = 0x5C;

const SEL_VERSION: u8 = 0x51;
const SDR_VERSION: u8 = 0x51;
/// Operation support byte: reserve supported.
const SEL_OPERATION_SUPPORT: u8 = 0x02;
const SDR_OPERATION_SUPPORT: u8 = 0x02;

const CLEAR_SEL_INITIATE: u8 = 0xAA;
const CLEAR_SEL_GET_STATUS: u8 = 0x00;

// FRU area is byte-addressed.
const FRU_ACCESS_BYTE: u8 = 0x00;

pub fn get_fruid_info(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    match ctx.pal.fru_size(req.data[0]) {
        Ok(size) => {
            res.data.extend_from_slice(&size.to_le_bytes());
            res.data.push(FRU_ACCESS_BYTE);
            res.cc = CC_SUCCESS;
        }
        Err(e) => res.cc = e.cc(),
    }
}

fn parse_fru_read(data: &[u8]) -> IpmiResult<(u8, u16, u8)> {
    let mut r = ByteReader::new(data);
    Ok((r.read_u8()?, r.read_u16_le()?, r.read_u8()?))
}

/// Read FRU Data. Data: fru id, offset (LE), count. Response: count
/// returned, data bytes.
pub fn read_fruid_data(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let result = parse_fru_read(&req.data)
        .and_then(|(fru, offset, count)| ctx.pal.fru_read(fru, offset, count));
    match result {
        Ok(bytes) => {
            res.data.push(bytes.len() as u8);
            res.data.extend_from_slice(&bytes);
            res.cc = CC_SUCCESS;
        }
        Err(e) => res.cc = e.cc(),
    }
}

/// Write FRU Data. Data: fru id, offset (LE), bytes. Response: count
/// written.
pub fn write_fruid_data(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let fru = req.data[0];
    let offset = u16::from_le_bytes([req.data[1], req.data[2]]);
    match ctx.pal.fru_write(fru, offset, &req.data[3..]) {
        Ok(count) => {
            res.data.push(count);
            res.cc = CC_SUCCESS;
        }
        Err(e) => res.cc = e.cc(),
    }
}

pub fn get_sdr_info(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    let sdr = ctx.sdr.lock().unwrap();
    res.data.push(SDR_VERSION);
    res.data.extend_from_slice(&(sdr.count() as u16).to_le_bytes());
    res.data.extend_from_slice(&sdr.free_space().to_le_bytes());
    res.data.extend_from_slice(&sdr.last_add_timestamp().to_le_bytes());
    res.data.extend_from_slice(&0u32.to_le_bytes()); // never erased
    res.data.push(SDR_OPERATION_SUPPORT);
    res.cc = CC_SUCCESS;
}

pub fn reserve_sdr(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    let rsv = ctx.sdr.lock().unwrap().reserve();
    res.data.extend_from_slice(&rsv.to_le_bytes());
    res.cc = CC_SUCCESS;
}

/// Record access frame shared by Get SDR and Get SEL Entry:
/// reservation (LE), record id (LE), offset, count.
fn parse_record_access(data: &[u8]) -> IpmiResult<(u16, u16, u8, u8)> {
    let mut r = ByteReader::new(data);
    Ok((r.read_u16_le()?, r.read_u16_le()?, r.read_u8()?, r.read_u8()?))
}

/// Get SDR. Response: next record id (LE), record bytes.
pub fn get_sdr(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let result = parse_record_access(&req.data).and_then(|(rsv, record_id, offset, count)| {
        ctx.sdr.lock().unwrap().get_entry(rsv, record_id, offset, count)
    });
    match result {
        Ok((next_id, bytes)) => {
            res.data.extend_from_slice(&htoipmi16(next_id));
            res.data.extend_from_slice(&bytes);
            res.cc = CC_SUCCESS;
        }
        Err(e) => res.cc = e.cc(),
    }
}

pub fn get_sel_info(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    let sel = ctx.sel.lock().unwrap();
    let (ts_add, ts_erase) = sel.timestamps();
    res.data.push(SEL_VERSION);
    res.data.extend_from_slice(&(sel.num_entries() as u16).to_le_bytes());
    res.data.extend_from_slice(&sel.free_space().to_le_bytes());
    res.data.extend_from_slice(&ts_add.to_le_bytes());
    res.data.extend_from_slice(&ts_erase.to_le_bytes());
    res.data.push(SEL_OPERATION_SUPPORT);
    res.cc = CC_SUCCESS;
}

pub fn get_sel_alloc_info(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    let sel = ctx.sel.lock().unwrap();
    let units = crate::sel::SEL_RECORDS_MAX as u16;
    let free = units - sel.num_entries() as u16;
    res.data.extend_from_slice(&units.to_le_bytes());
    res.data.extend_from_slice(&(SEL_RECORD_SIZE as u16).to_le_bytes());
    res.data.extend_from_slice(&free.to_le_bytes());
    res.data.extend_from_slice(&free.to_le_bytes()); // largest free block
    res.data.push(1); // max record size, in units
    res.cc = CC_SUCCESS;
}

pub fn reserve_sel(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    let rsv = ctx.sel.lock().unwrap().reserve();
    res.data.extend_from_slice(&rsv.to_le_bytes());
    res.cc = CC_SUCCESS;
}

/// Get SEL Entry. Data: reservation (LE), record id (LE), offset, count.
/// The reservation is only consulted for partial reads.
pub fn get_sel_entry(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let (rsv, record_id, offset, count) = match parse_record_access(&req.data) {
        Ok(fields) => fields,
        Err(e) => {
            res.cc = e.cc();
            return;
        }
    };
    let offset = offset as usize;

    let sel = ctx.sel.lock().unwrap();
    let partial = offset != 0 || (count != 0xFF && (count as usize) < SEL_RECORD_SIZE);
    if partial && !sel.check_reservation(rsv) {
        res.cc = CC_INVALID_RESERVATION;
        return;
    }
    if offset >= SEL_RECORD_SIZE {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    match sel.get_entry(record_id) {
        Ok((rec, next_id)) => {
            let count = if count == 0xFF {
                SEL_RECORD_SIZE - offset
            } else {
                (count as usize).min(SEL_RECORD_SIZE - offset)
            };
            res.data.extend_from_slice(&next_id.to_le_bytes());
            res.data.extend_from_slice(&rec.0[offset..offset + count]);
            res.cc = CC_SUCCESS;
        }
        Err(e) => res.cc = e.cc(),
    }
}

/// Add SEL Entry. Data: one 16-byte record; the timestamp bytes are
/// overwritten with the insertion time. Response: assigned record id.
pub fn add_sel_entry(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let mut rec = SelMsg::default();
    rec.0.copy_from_slice(&req.data[..SEL_RECORD_SIZE]);
    match ctx.sel.lock().unwrap().add_entry(&rec) {
        Ok(id) => {
            res.data.extend_from_slice(&id.to_le_bytes());
            res.cc = CC_SUCCESS;
        }
        Err(e) => {
            error!("add SEL entry failed: {}", e);
            res.cc = e.cc();
        }
    }
}

/// Clear SEL. Data: reservation (LE), 'C' 'L' 'R', action (0xAA to
/// initiate, 0x00 to poll). Response: erasure progress.
pub fn clear_sel(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let d = &req.data;
    let rsv = ipmi16toh(&[d[0], d[1]]);
    if &d[2..5] != b"CLR" {
        res.cc = CC_INVALID_PARAM;
        return;
    }
    let mut sel = ctx.sel.lock().unwrap();
    let result = match d[5] {
        CLEAR_SEL_INITIATE => sel.erase(rsv).map(|_| crate::sel::SEL_ERASE_COMPLETED),
        CLEAR_SEL_GET_STATUS => sel.erase_status(rsv),
        _ => {
            res.cc = CC_INVALID_PARAM;
            return;
        }
    };
    match result {
        Ok(progress) => {
            res.data.push(progress);
            res.cc = CC_SUCCESS;
        }
        Err(e) => res.cc = e.cc(),
    }
}

pub fn get_sel_time(_ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data
        .extend_from_slice(&ipmi_timestamp_now().to_le_bytes());
    res.cc = CC_SUCCESS;
}

/// The BMC clock runs in UTC; the offset is always zero.
pub fn get_sel_utc_offset(_ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data.extend_from_slice(&0i16.to_le_bytes());
    res.cc = CC_SUCCESS;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dispatch_request;
    use crate::context::test_context;
    use crate::sel::{SEL_ID_LAST, SEL_RECORDS_MAX};

    fn req(cmd: u8, data: Vec<u8>) -> IpmiRequest {
        IpmiRequest {
            netfn: NETFN_STORAGE_REQ,
            lun: 0,
            cmd,
            payload_id: 0,
            data,
        }
    }

    fn record(fill: u8) -> Vec<u8> {
        vec![fill; SEL_RECORD_SIZE]
    }

    #[test]
    fn test_add_then_get_first_entry() {
        let ctx = test_context("sel-addget");
        let res = dispatch_request(&ctx, &req(CMD_ADD_SEL_ENTRY, record(0x5A)));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![0x01, 0x00]); // record id 1, LE

        let res = dispatch_request(
            &ctx,
            &req(CMD_GET_SEL_ENTRY, vec![0, 0, 0x00, 0x00, 0, 0xFF]),
        );
        assert_eq!(res.cc, CC_SUCCESS);
        let next = u16::from_le_bytes([res.data[0], res.data[1]]);
        assert_eq!(next, SEL_ID_LAST);
        let payload = &res.data[2..];
        assert_eq!(payload.len(), SEL_RECORD_SIZE);
        // Timestamp bytes 3..7 were restamped; the rest survives.
        assert_eq!(payload[0..3], [0x5A, 0x5A, 0x5A]);
        assert_eq!(payload[7..], [0x5A; 9]);
    }

    #[test]
    fn test_sel_rollover_via_commands() {
        let ctx = test_context("sel-rollover");
        for i in 0..SEL_RECORDS_MAX + 1 {
            let res = dispatch_request(&ctx, &req(CMD_ADD_SEL_ENTRY, record(i as u8)));
            assert_eq!(res.cc, CC_SUCCESS);
        }
        let res = dispatch_request(&ctx, &req(CMD_GET_SEL_INFO, vec![]));
        let entries = u16::from_le_bytes([res.data[1], res.data[2]]);
        assert_eq!(entries as usize, SEL_RECORDS_MAX);

        // Original record id 1 was evicted.
        let res = dispatch_request(
            &ctx,
            &req(CMD_GET_SEL_ENTRY, vec![0, 0, 0x01, 0x00, 0, 0xFF]),
        );
        assert_eq!(res.cc, CC_NOT_FOUND);

        // LAST returns the record added after the log filled.
        let res = dispatch_request(
            &ctx,
            &req(CMD_GET_SEL_ENTRY, vec![0, 0, 0xFF, 0xFF, 0, 0xFF]),
        );
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data[2], SEL_RECORDS_MAX as u8);
    }

    #[test]
    fn test_clear_sel_reservation_flow() {
        let ctx = test_context("sel-clear");
        dispatch_request(&ctx, &req(CMD_ADD_SEL_ENTRY, record(1)));

        let res = dispatch_request(&ctx, &req(CMD_RESERVE_SEL, vec![]));
        let old = [res.data[0], res.data[1]];
        let res = dispatch_request(&ctx, &req(CMD_RESERVE_SEL, vec![]));
        let fresh = [res.data[0], res.data[1]];

        // Stale token fails, log untouched.
        let res = dispatch_request(
            &ctx,
            &req(CMD_CLEAR_SEL, vec![old[0], old[1], b'C', b'L', b'R', CLEAR_SEL_INITIATE]),
        );
        assert_eq!(res.cc, CC_INVALID_RESERVATION);

        // Bad magic fails.
        let res = dispatch_request(
            &ctx,
            &req(CMD_CLEAR_SEL, vec![fresh[0], fresh[1], b'X', b'L', b'R', CLEAR_SEL_INITIATE]),
        );
        assert_eq!(res.cc, CC_INVALID_PARAM);

        // Current token clears.
        let res = dispatch_request(
            &ctx,
            &req(CMD_CLEAR_SEL, vec![fresh[0], fresh[1], b'C', b'L', b'R', CLEAR_SEL_INITIATE]),
        );
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![crate::sel::SEL_ERASE_COMPLETED]);
        assert_eq!(ctx.sel.lock().unwrap().num_entries(), 0);
    }

    #[test]
    fn test_get_sdr_walk() {
        let ctx = test_context("sdr-walk");
        let res = dispatch_request(&ctx, &req(CMD_RESERVE_SDR, vec![]));
        let rsv = [res.data[0], res.data[1]];

        let mut id = [0x00, 0x00];
        let mut count = 0;
        loop {
            let res = dispatch_request(
                &ctx,
                &req(CMD_GET_SDR, vec![rsv[0], rsv[1], id[0], id[1], 0, 0xFF]),
            );
            assert_eq!(res.cc, CC_SUCCESS);
            count += 1;
            let next = u16::from_le_bytes([res.data[0], res.data[1]]);
            if next == 0xFFFF {
                break;
            }
            id = [res.data[0], res.data[1]];
        }
        assert_eq!(count, ctx.sdr.lock().unwrap().count());
    }

    #[test]
    fn test_sdr_reservation_mismatch() {
        let ctx = test_context("sdr-rsv");
        dispatch_request(&ctx, &req(CMD_RESERVE_SDR, vec![]));
        let res = dispatch_request(
            &ctx,
            &req(CMD_GET_SDR, vec![0x77, 0x77, 0x01, 0x00, 0, 0xFF]),
        );
        assert_eq!(res.cc, CC_INVALID_RESERVATION);
    }

    #[test]
    fn test_fru_info_read_write() {
        let ctx = test_context("fru");
        let res = dispatch_request(&ctx, &req(CMD_GET_FRUID_INFO, vec![0x00]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(u16::from_le_bytes([res.data[0], res.data[1]]), 512);
        assert_eq!(res.data[2], FRU_ACCESS_BYTE);

        let res = dispatch_request(
            &ctx,
            &req(CMD_WRITE_FRUID_DATA, vec![0x00, 0x20, 0x00, 0xDE, 0xAD]),
        );
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![2]);

        let res = dispatch_request(&ctx, &req(CMD_READ_FRUID_DATA, vec![0x00, 0x20, 0x00, 0x02]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![2, 0xDE, 0xAD]);

        let res = dispatch_request(&ctx, &req(CMD_GET_FRUID_INFO, vec![0x05]));
        assert_eq!(res.cc, CC_NOT_FOUND);
    }

    #[test]
    fn test_sel_info_timestamps_advance() {
        let ctx = test_context("sel-info");
        let res = dispatch_request(&ctx, &req(CMD_GET_SEL_INFO, vec![]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data[0], SEL_VERSION);
        let ts_before = u32::from_le_bytes([res.data[5], res.data[6], res.data[7], res.data[8]]);
        assert_eq!(ts_before, 0);

        dispatch_request(&ctx, &req(CMD_ADD_SEL_ENTRY, record(9)));
        let res = dispatch_request(&ctx, &req(CMD_GET_SEL_INFO, vec![]));
        let ts_after = u32::from_le_bytes([res.data[5], res.data[6], res.data[7], res.data[8]]);
        assert!(ts_after > 0x20000000);
    }
}
