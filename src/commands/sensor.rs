/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Sensor/Event NetFn (0x04) handlers.

use log::error;

use crate::context::ServerContext;
use crate::ipmi::ipmi::*;
use crate::sel::SelMsg;

pub const CMD_PLATFORM_EVENT: u8 = 0x02;
pub const CMD_GET_SENSOR_READING: u8 = 0x2D;

/// System Event Record type tag.
const SEL_RECORD_TYPE_SYSTEM_EVENT: u8 = 0x02;
/// Generator id for events arriving over the host interface.
const GENERATOR_BIOS: u8 = 0x01;

/// Platform Event ("Event Message"). Data: generator id, EvM revision,
/// sensor type, sensor number, event dir/type, and three event data
/// bytes. The record lands in the SEL with an insertion timestamp.
pub fn platform_event(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let d = &req.data;
    let mut rec = SelMsg::default();
    // Record id bytes 0..2 are positional, filled by the log itself;
    // bytes 3..7 are the timestamp stamped on insert.
    rec.0[2] = SEL_RECORD_TYPE_SYSTEM_EVENT;
    rec.0[7] = d[0]; // generator id
    rec.0[8] = GENERATOR_BIOS;
    rec.0[9] = d[1]; // EvM revision
    rec.0[10] = d[2]; // sensor type
    rec.0[11] = d[3]; // sensor number
    rec.0[12] = d[4]; // event dir / event type
    rec.0[13] = d[5];
    rec.0[14] = d[6];
    if d.len() > 7 {
        rec.0[15] = d[7];
    }
    match ctx.sel.lock().unwrap().add_entry(&rec) {
        Ok(_) => res.cc = CC_SUCCESS,
        Err(e) => {
            error!("platform event: SEL add failed: {}", e);
            res.cc = e.cc();
        }
    }
}

/// Get Sensor Reading. Response: reading, status (event messages +
/// scanning enabled), threshold/state bytes.
pub fn get_sensor_reading(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    match ctx.pal.sensor_read(req.data[0]) {
        Ok(reading) => {
            res.data.push(reading);
            res.data.push(0xC0);
            res.data.push(0x00);
            res.data.push(0x00);
            res.cc = CC_SUCCESS;
        }
        Err(e) => res.cc = e.cc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dispatch_request;
    use crate::context::test_context;
    use crate::sel::SEL_ID_FIRST;

    fn req(cmd: u8, data: Vec<u8>) -> IpmiRequest {
        IpmiRequest {
            netfn: NETFN_SENSOR_REQ,
            lun: 0,
            cmd,
            payload_id: 0,
            data,
        }
    }

    #[test]
    fn test_platform_event_lands_in_sel() {
        let ctx = test_context("platform-event");
        let res = dispatch_request(
            &ctx,
            &req(CMD_PLATFORM_EVENT, vec![0x20, 0x04, 0x07, 0x41, 0x6F, 0x01, 0x02]),
        );
        assert_eq!(res.cc, CC_SUCCESS);

        let sel = ctx.sel.lock().unwrap();
        assert_eq!(sel.num_entries(), 1);
        let (rec, _) = sel.get_entry(SEL_ID_FIRST).unwrap();
        assert_eq!(rec.0[2], SEL_RECORD_TYPE_SYSTEM_EVENT);
        assert_eq!(rec.0[10], 0x07); // sensor type
        assert_eq!(rec.0[11], 0x41); // sensor number
    }

    #[test]
    fn test_get_sensor_reading() {
        let ctx = test_context("sensor-read");
        let res = dispatch_request(&ctx, &req(CMD_GET_SENSOR_READING, vec![0x01]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data[0], 28);

        let res = dispatch_request(&ctx, &req(CMD_GET_SENSOR_READING, vec![0x7E]));
        assert_eq!(res.cc, CC_NOT_FOUND);
    }
}
