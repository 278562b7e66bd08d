/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! DCMI NetFn (0x2C) handlers. Every request and reply carries the DCMI
//! group extension byte first; a request with the wrong group byte is an
//! invalid parameter.

use crate::context::ServerContext;
use crate::ipmi::ipmi::*;
use crate::ipmi::time::ipmi_timestamp_now;

pub const CMD_GET_DCMI_CAPABILITIES: u8 = 0x01;
pub const CMD_GET_POWER_READING: u8 = 0x02;

pub const DCMI_GROUP_EXT: u8 = 0xDC;

// DCMI 1.5.
const DCMI_VERSION_MAJOR: u8 = 0x01;
const DCMI_VERSION_MINOR: u8 = 0x05;
const DCMI_PARAM_REVISION: u8 = 0x02;

const CAP_PARAM_MAX: u8 = 0x05;

/// Power measurement active bit in the reading state byte.
const POWER_MEASUREMENT_ACTIVE: u8 = 0x40;

/// Get DCMI Capabilities Info. Data: group ext, parameter selector.
pub fn get_capabilities(_ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    if req.data[0] != DCMI_GROUP_EXT {
        res.cc = CC_INVALID_PARAM;
        return;
    }
    let param = req.data[1];
    if param == 0 || param > CAP_PARAM_MAX {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    res.data.push(DCMI_GROUP_EXT);
    res.data.push(DCMI_VERSION_MAJOR);
    res.data.push(DCMI_VERSION_MINOR);
    res.data.push(DCMI_PARAM_REVISION);
    match param {
        // Supported DCMI capabilities: power management only.
        0x01 => res.data.extend_from_slice(&[0x00, 0x01, 0x00]),
        // Mandatory platform attributes: no SEL rollover reporting here.
        0x02 => res.data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]),
        // Optional platform attributes.
        0x03 => res.data.extend_from_slice(&[0x20, 0x00]),
        // Manageability access: no LAN channels.
        0x04 => res.data.extend_from_slice(&[0xFF, 0xFF, 0xFF]),
        // Enhanced power statistics: one rolling average period.
        _ => res.data.extend_from_slice(&[0x01, 0x00]),
    }
    res.cc = CC_SUCCESS;
}

/// Get Power Reading. Data: group ext, mode, mode attributes. The stub
/// statistics report the instantaneous reading for min/max/average.
pub fn get_power_reading(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    if req.data[0] != DCMI_GROUP_EXT {
        res.cc = CC_INVALID_PARAM;
        return;
    }
    let watts = ctx.pal.power_reading();
    res.data.push(DCMI_GROUP_EXT);
    res.data.extend_from_slice(&watts.to_le_bytes()); // current
    res.data.extend_from_slice(&watts.to_le_bytes()); // minimum
    res.data.extend_from_slice(&watts.to_le_bytes()); // maximum
    res.data.extend_from_slice(&watts.to_le_bytes()); // average
    res.data
        .extend_from_slice(&ipmi_timestamp_now().to_le_bytes());
    res.data.extend_from_slice(&1000u32.to_le_bytes()); // sampling period, ms
    res.data.push(POWER_MEASUREMENT_ACTIVE);
    res.cc = CC_SUCCESS;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dispatch_request;
    use crate::context::test_context;

    fn req(cmd: u8, data: Vec<u8>) -> IpmiRequest {
        IpmiRequest {
            netfn: NETFN_DCMI_REQ,
            lun: 0,
            cmd,
            payload_id: 0,
            data,
        }
    }

    #[test]
    fn test_capabilities_echo_group_and_version() {
        let ctx = test_context("dcmi-caps");
        let res = dispatch_request(
            &ctx,
            &req(CMD_GET_DCMI_CAPABILITIES, vec![DCMI_GROUP_EXT, 0x01]),
        );
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data[0], DCMI_GROUP_EXT);
        assert_eq!(res.data[1], DCMI_VERSION_MAJOR);
        assert_eq!(res.data[2], DCMI_VERSION_MINOR);
    }

    #[test]
    fn test_wrong_group_extension_rejected() {
        let ctx = test_context("dcmi-group");
        let res = dispatch_request(&ctx, &req(CMD_GET_DCMI_CAPABILITIES, vec![0x00, 0x01]));
        assert_eq!(res.cc, CC_INVALID_PARAM);
        let res = dispatch_request(&ctx, &req(CMD_GET_POWER_READING, vec![0x00, 0x01, 0x00]));
        assert_eq!(res.cc, CC_INVALID_PARAM);
    }

    #[test]
    fn test_power_reading_layout() {
        let ctx = test_context("dcmi-power");
        let res = dispatch_request(
            &ctx,
            &req(CMD_GET_POWER_READING, vec![DCMI_GROUP_EXT, 0x01, 0x00]),
        );
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data.len(), 18);
        assert_eq!(res.data[0], DCMI_GROUP_EXT);
        let current = u16::from_le_bytes([res.data[1], res.data[2]]);
        assert_eq!(current, 145); // stub platform reading
        assert_eq!(res.data[17], POWER_MEASUREMENT_ACTIVE);
    }

    #[test]
    fn test_capability_selector_range() {
        let ctx = test_context("dcmi-range");
        let res = dispatch_request(
            &ctx,
            &req(CMD_GET_DCMI_CAPABILITIES, vec![DCMI_GROUP_EXT, 0x00]),
        );
        assert_eq!(res.cc, CC_PARAM_OUT_OF_RANGE);
        let res = dispatch_request(
            &ctx,
            &req(CMD_GET_DCMI_CAPABILITIES, vec![DCMI_GROUP_EXT, 0x06]),
        );
        assert_eq!(res.cc, CC_PARAM_OUT_OF_RANGE);
    }
}
