/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! OEM 1S-server NetFn (0x38) handlers: messages bridged through the
//! bridge IC on multi-node sleds.

use log::debug;

use crate::context::ServerContext;
use crate::ipmi::ipmi::*;

pub const CMD_OEM_1S_BRIDGE_MSG: u8 = 0x01;
pub const CMD_OEM_1S_GET_BIC_FW_VER: u8 = 0x02;

// Bridge target interfaces.
pub const BRIDGE_IF_ME: u8 = 0x00;
pub const BRIDGE_IF_SELF: u8 = 0x01;

/// Bridge IC firmware revision, major.minor.
const BIC_FW_VERSION: [u8; 2] = [0x01, 0x22];

/// Bridge Message. Data: target interface, then a complete embedded
/// request frame. A self-targeted frame re-enters the dispatcher and the
/// inner response is returned as the outer response data; other targets
/// have no transport here and are rejected.
pub fn bridge_msg(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let target = req.data[0];
    if target != BRIDGE_IF_SELF {
        debug!("bridge: unsupported target interface 0x{:02x}", target);
        res.cc = CC_NOT_SUPP_IN_CURR_STATE;
        return;
    }
    // The embedded frame is single-node shaped regardless of the outer
    // wire variant.
    let inner_req = match IpmiRequest::parse(&req.data[1..], false) {
        Ok(r) => r,
        Err(_) => {
            res.cc = CC_INVALID_LENGTH;
            return;
        }
    };
    let inner_res = crate::commands::dispatch_request(ctx, &inner_req);
    res.data.extend_from_slice(&inner_res.encode());
    res.cc = CC_SUCCESS;
}

pub fn get_bic_fw_ver(_ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data.extend_from_slice(&BIC_FW_VERSION);
    res.cc = CC_SUCCESS;
}
