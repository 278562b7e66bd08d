/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Application NetFn (0x06) handlers.

use log::{error, warn};

use crate::context::ServerContext;
use crate::ipmi::ipmi::*;
use crate::watchdog::{WdtConfig, WDT_DONT_STOP_BIT, WDT_NO_LOG_BIT};

pub const CMD_GET_DEVICE_ID: u8 = 0x01;
pub const CMD_COLD_RESET: u8 = 0x02;
pub const CMD_GET_SELF_TEST_RESULTS: u8 = 0x04;
pub const CMD_GET_DEVICE_GUID: u8 = 0x08;
pub const CMD_RESET_WATCHDOG_TIMER: u8 = 0x22;
pub const CMD_SET_WATCHDOG_TIMER: u8 = 0x24;
pub const CMD_GET_WATCHDOG_TIMER: u8 = 0x25;
pub const CMD_GET_SYSTEM_GUID: u8 = 0x37;
pub const CMD_SET_SYS_INFO_PARAMS: u8 = 0x58;
pub const CMD_GET_SYS_INFO_PARAMS: u8 = 0x59;

// Get Device ID identity bytes.
const DEVICE_ID: u8 = 0x20;
const DEVICE_REVISION: u8 = 0x81; // provides SDRs, revision 1
const FW_REV1: u8 = 0x02;
const FW_REV2: u8 = 0x09;
const IPMI_VERSION: u8 = 0x02; // 2.0, BCD
const ADTL_DEVICE_SUPPORT: u8 = 0xBF;
const MANUFACTURER_ID: [u8; 3] = [0x15, 0xA0, 0x00]; // IANA, LE
const PRODUCT_ID: [u8; 2] = [0x46, 0x01];
const AUX_FW_REV: [u8; 4] = [0x00; 4];

/// Running bit reported in byte 0 of Get Watchdog Timer.
const WDT_GET_RUNNING_BIT: u8 = 0x40;

pub fn get_device_id(_ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data.push(DEVICE_ID);
    res.data.push(DEVICE_REVISION);
    res.data.push(FW_REV1);
    res.data.push(FW_REV2);
    res.data.push(IPMI_VERSION);
    res.data.push(ADTL_DEVICE_SUPPORT);
    res.data.extend_from_slice(&MANUFACTURER_ID);
    res.data.extend_from_slice(&PRODUCT_ID);
    res.data.extend_from_slice(&AUX_FW_REV);
    res.cc = CC_SUCCESS;
}

/// Cold reset reboots the BMC. The response is framed first and the
/// reboot is fire-and-forget; nothing after it is guaranteed to reach
/// the caller.
pub fn cold_reset(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.cc = CC_SUCCESS;
    warn!("cold reset requested");
    if let Err(e) = ctx.pal.bmc_reboot() {
        error!("cold reset failed: {}", e);
        res.cc = CC_UNSPECIFIED_ERROR;
    }
}

pub fn get_self_test_results(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data.extend_from_slice(&ctx.pal.self_test_result());
    res.cc = CC_SUCCESS;
}

pub fn get_device_guid(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data.extend_from_slice(&ctx.guid);
    res.cc = CC_SUCCESS;
}

pub fn get_system_guid(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data.extend_from_slice(&ctx.guid);
    res.cc = CC_SUCCESS;
}

pub fn reset_watchdog_timer(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let slot = match ctx.wdt_slot(req.payload_id) {
        Some(slot) => slot,
        None => {
            res.cc = CC_NOT_SUPP_IN_CURR_STATE;
            return;
        }
    };
    match slot.kick() {
        Ok(()) => res.cc = CC_SUCCESS,
        Err(e) => res.cc = e.cc(),
    }
}

/// Set Watchdog Timer. Data: use/flags, action, pre-timeout interval,
/// expiration clear mask, initial countdown (LE deciseconds).
pub fn set_watchdog_timer(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let slot = match ctx.wdt_slot(req.payload_id) {
        Some(slot) => slot,
        None => {
            res.cc = CC_NOT_SUPP_IN_CURR_STATE;
            return;
        }
    };
    let d = &req.data;
    slot.set(&WdtConfig {
        use_code: d[0] & 0x07,
        dont_stop: d[0] & WDT_DONT_STOP_BIT != 0,
        no_log: d[0] & WDT_NO_LOG_BIT != 0,
        action: d[1] & 0x07,
        pre_interval: d[2],
        expiration_clear: d[3],
        init_count_down: u16::from_le_bytes([d[4], d[5]]),
    });
    res.cc = CC_SUCCESS;
}

/// Get Watchdog Timer. A never-configured slot reads back all-zero
/// defaults with a success code; only a nonexistent slot is an error
/// (the get/reset asymmetry is deliberate, see the watchdog engine).
pub fn get_watchdog_timer(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let slot = match ctx.wdt_slot(req.payload_id) {
        Some(slot) => slot,
        None => {
            res.cc = CC_NOT_SUPP_IN_CURR_STATE;
            return;
        }
    };
    let st = slot.get();
    let mut use_byte = st.use_code;
    if st.run {
        use_byte |= WDT_GET_RUNNING_BIT;
    }
    res.data.push(use_byte);
    res.data.push(st.action);
    res.data.push(st.pre_interval);
    res.data.push(st.expiration);
    res.data.extend_from_slice(&st.init_count_down.to_le_bytes());
    res.data
        .extend_from_slice(&st.present_count_down.to_le_bytes());
    res.cc = CC_SUCCESS;
}

/// Set System Info Parameters. Data: parameter selector, parameter data.
pub fn set_sys_info_params(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let selector = req.data[0];
    ctx.sys_info.lock().unwrap().set(selector, &req.data[1..]);
    res.cc = CC_SUCCESS;
}

/// Get System Info Parameters. Data: rev-only flag, parameter selector,
/// set selector, block selector. Response: parameter revision, data.
pub fn get_sys_info_params(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    const PARAM_REVISION: u8 = 0x11;
    let selector = req.data[1];
    res.data.push(PARAM_REVISION);
    if req.data[0] & 0x80 != 0 {
        // Revision-only probe.
        res.cc = CC_SUCCESS;
        return;
    }
    match ctx.sys_info.lock().unwrap().get(selector) {
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
