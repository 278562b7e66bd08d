/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Transport NetFn (0x0C) handlers. LAN and SOL configuration are plain
//! parameter stores; the BMC network itself is managed out of band.

use crate::context::ServerContext;
use crate::ipmi::ipmi::*;

pub const CMD_SET_LAN_CONFIG: u8 = 0x01;
pub const CMD_GET_LAN_CONFIG: u8 = 0x02;
pub const CMD_GET_SOL_CONFIG: u8 = 0x22;

/// Parameter revision returned ahead of every get reply.
const LAN_PARAM_REVISION: u8 = 0x11;

/// Set LAN Configuration Parameters. Data: channel, parameter selector,
/// parameter data.
pub fn set_lan_config(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let selector = req.data[1];
    ctx.lan.lock().unwrap().set(selector, &req.data[2..]);
    res.cc = CC_SUCCESS;
}

/// Get LAN Configuration Parameters. Data: channel (bit 7 requests
/// revision only), parameter selector, set selector, block selector.
pub fn get_lan_config(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let selector = req.data[1];
    res.data.push(LAN_PARAM_REVISION);
    if req.data[0] & 0x80 != 0 {
        res.cc = CC_SUCCESS;
        return;
    }
    match ctx.lan.lock().unwrap().get(selector) {
        Some(bytes) => {
            res.data.extend_from_slice(bytes);
            res.cc = CC_SUCCESS;
        }
        None => {
            res.data.clear();
            res.cc = CC_PARAM_OUT_OF_RANGE;
        }
    }
}

/// Get SOL Configuration Parameters, same frame shape as the LAN getter.
pub fn get_sol_config(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let selector = req.data[1];
    res.data.push(LAN_PARAM_REVISION);
    if req.data[0] & 0x80 != 0 {
        res.cc = CC_SUCCESS;
        return;
    }
    match ctx.sol.lock().unwrap().get(selector) {
        Some(bytes) => {
            res.data.extend_from_slice(bytes);
            res.cc = CC_SUCCESS;
        }
        None => {
            res.data.clear();
            res.cc = CC_PARAM_OUT_OF_RANGE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dispatch_request;
    use crate::context::test_context;

    fn req(cmd: u8, data: Vec<u8>) -> IpmiRequest {
        IpmiRequest {
            netfn: NETFN_TRANSPORT_REQ,
            lun: 0,
            cmd,
            payload_id: 0,
            data,
        }
    }

    #[test]
    fn test_lan_config_round_trip() {
        let ctx = test_context("lan");
        // Parameter 3: IP address.
        let res = dispatch_request(
            &ctx,
            &req(CMD_SET_LAN_CONFIG, vec![0x01, 0x03, 10, 0, 0, 2]),
        );
        assert_eq!(res.cc, CC_SUCCESS);

        let res = dispatch_request(&ctx, &req(CMD_GET_LAN_CONFIG, vec![0x01, 0x03, 0, 0]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![LAN_PARAM_REVISION, 10, 0, 0, 2]);
    }

    #[test]
    fn test_lan_config_revision_only_probe() {
        let ctx = test_context("lan-rev");
        let res = dispatch_request(&ctx, &req(CMD_GET_LAN_CONFIG, vec![0x81, 0x03, 0, 0]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![LAN_PARAM_REVISION]);
    }

    #[test]
    fn test_unset_params_out_of_range() {
        let ctx = test_context("lan-unset");
        let res = dispatch_request(&ctx, &req(CMD_GET_LAN_CONFIG, vec![0x01, 0x07, 0, 0]));
        assert_eq!(res.cc, CC_PARAM_OUT_OF_RANGE);
        let res = dispatch_request(&ctx, &req(CMD_GET_SOL_CONFIG, vec![0x01, 0x01, 0, 0]));
        assert_eq!(res.cc, CC_PARAM_OUT_OF_RANGE);
    }
}
