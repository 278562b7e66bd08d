/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Command dispatch engine. Routing is a data-driven table mapping
//! (NetFn, Cmd) to a handler, with a uniform minimum-length check applied
//! before any handler runs. The dispatcher holds no lock; every handler
//! acquires exactly the subsystem locks it needs.

pub mod app;
pub mod chassis;
pub mod dcmi;
pub mod oem;
pub mod oem_1s;
pub mod oem_q;
pub mod sensor;
pub mod storage;
pub mod transport;
pub mod usb_dbg;

use log::{debug, warn};

use crate::context::ServerContext;
use crate::error::cc2str;
use crate::helper::buf2str;
use crate::ipmi::ipmi::*;

pub type Handler = fn(&ServerContext, &IpmiRequest, &mut IpmiResponse);

pub struct CmdSpec {
    pub netfn: u8,
    pub cmd: u8,
    /// Minimum command data length; shorter requests are rejected with
    /// `CC_INVALID_LENGTH` before the handler runs.
    pub min_data_len: usize,
    pub handler: Handler,
}

const fn spec(netfn: u8, cmd: u8, min_data_len: usize, handler: Handler) -> CmdSpec {
    CmdSpec {
        netfn,
        cmd,
        min_data_len,
        handler,
    }
}

/// The full supported command surface.
pub static COMMAND_TABLE: &[CmdSpec] = &[
    // Chassis
    spec(NETFN_CHASSIS_REQ, chassis::CMD_GET_CHASSIS_STATUS, 0, chassis::get_chassis_status),
    spec(NETFN_CHASSIS_REQ, chassis::CMD_CHASSIS_CONTROL, 1, chassis::chassis_control),
    spec(NETFN_CHASSIS_REQ, chassis::CMD_SET_POWER_RESTORE_POLICY, 1, chassis::set_power_restore_policy),
    spec(NETFN_CHASSIS_REQ, chassis::CMD_GET_RESTART_CAUSE, 0, chassis::get_restart_cause),
    spec(NETFN_CHASSIS_REQ, chassis::CMD_SET_BOOT_OPTIONS, 1, chassis::set_boot_options),
    spec(NETFN_CHASSIS_REQ, chassis::CMD_GET_BOOT_OPTIONS, 3, chassis::get_boot_options),
    // Sensor/Event
    spec(NETFN_SENSOR_REQ, sensor::CMD_PLATFORM_EVENT, 7, sensor::platform_event),
    spec(NETFN_SENSOR_REQ, sensor::CMD_GET_SENSOR_READING, 1, sensor::get_sensor_reading),
    // Application
    spec(NETFN_APP_REQ, app::CMD_GET_DEVICE_ID, 0, app::get_device_id),
    spec(NETFN_APP_REQ, app::CMD_COLD_RESET, 0, app::cold_reset),
    spec(NETFN_APP_REQ, app::CMD_GET_SELF_TEST_RESULTS, 0, app::get_self_test_results),
    spec(NETFN_APP_REQ, app::CMD_GET_DEVICE_GUID, 0, app::get_device_guid),
    spec(NETFN_APP_REQ, app::CMD_RESET_WATCHDOG_TIMER, 0, app::reset_watchdog_timer),
    spec(NETFN_APP_REQ, app::CMD_SET_WATCHDOG_TIMER, 6, app::set_watchdog_timer),
    spec(NETFN_APP_REQ, app::CMD_GET_WATCHDOG_TIMER, 0, app::get_watchdog_timer),
    spec(NETFN_APP_REQ, app::CMD_GET_SYSTEM_GUID, 0, app::get_system_guid),
    spec(NETFN_APP_REQ, app::CMD_SET_SYS_INFO_PARAMS, 2, app::set_sys_info_params),
    spec(NETFN_APP_REQ, app::CMD_GET_SYS_INFO_PARAMS, 4, app::get_sys_info_params),
    // Storage
    spec(NETFN_STORAGE_REQ, storage::CMD_GET_FRUID_INFO, 1, storage::get_fruid_info),
    spec(NETFN_STORAGE_REQ, storage::CMD_READ_FRUID_DATA, 4, storage::read_fruid_data),
    spec(NETFN_STORAGE_REQ, storage::CMD_WRITE_FRUID_DATA, 3, storage::write_fruid_data),
    spec(NETFN_STORAGE_REQ, storage::CMD_GET_SDR_INFO, 0, storage::get_sdr_info),
    spec(NETFN_STORAGE_REQ, storage::CMD_RESERVE_SDR, 0, storage::reserve_sdr),
    spec(NETFN_STORAGE_REQ, storage::CMD_GET_SDR, 6, storage::get_sdr),
    spec(NETFN_STORAGE_REQ, storage::CMD_GET_SEL_INFO, 0, storage::get_sel_info),
    spec(NETFN_STORAGE_REQ, storage::CMD_GET_SEL_ALLOC_INFO, 0, storage::get_sel_alloc_info),
    spec(NETFN_STORAGE_REQ, storage::CMD_RESERVE_SEL, 0, storage::reserve_sel),
    spec(NETFN_STORAGE_REQ, storage::CMD_GET_SEL_ENTRY, 6, storage::get_sel_entry),
    spec(NETFN_STORAGE_REQ, storage::CMD_ADD_SEL_ENTRY, 16, storage::add_sel_entry),
    spec(NETFN_STORAGE_REQ, storage::CMD_CLEAR_SEL, 6, storage::clear_sel),
    spec(NETFN_STORAGE_REQ, storage::CMD_GET_SEL_TIME, 0, storage::get_sel_time),
    spec(NETFN_STORAGE_REQ, storage::CMD_GET_SEL_UTC_OFFSET, 0, storage::get_sel_utc_offset),
    // Transport
    spec(NETFN_TRANSPORT_REQ, transport::CMD_SET_LAN_CONFIG, 2, transport::set_lan_config),
    spec(NETFN_TRANSPORT_REQ, transport::CMD_GET_LAN_CONFIG, 4, transport::get_lan_config),
    spec(NETFN_TRANSPORT_REQ, transport::CMD_GET_SOL_CONFIG, 4, transport::get_sol_config),
    // DCMI
    spec(NETFN_DCMI_REQ, dcmi::CMD_GET_DCMI_CAPABILITIES, 2, dcmi::get_capabilities),
    spec(NETFN_DCMI_REQ, dcmi::CMD_GET_POWER_READING, 3, dcmi::get_power_reading),
    // OEM
    spec(NETFN_OEM_REQ, oem::CMD_OEM_SLED_CYCLE, 0, oem::sled_cycle),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_GET_BOARD_ID, 0, oem::get_board_id),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_SEND_POST_CODE, 1, oem::send_post_code),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_GET_80PORT_RECORD, 0, oem::get_80port_record),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_SET_BOOT_ORDER, 6, oem::set_boot_order),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_GET_BOOT_ORDER, 0, oem::get_boot_order),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_SET_POST_START, 0, oem::set_post_start),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_SET_POST_END, 0, oem::set_post_end),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_SET_PPR, 2, oem::set_ppr),
    spec(NETFN_OEM_REQ, oem::CMD_OEM_GET_PPR, 1, oem::get_ppr),
    // OEM quanta-style inventory cache
    spec(NETFN_OEM_Q_REQ, oem_q::CMD_OEM_Q_SET_PROC_INFO, 2, oem_q::set_proc_info),
    spec(NETFN_OEM_Q_REQ, oem_q::CMD_OEM_Q_GET_PROC_INFO, 1, oem_q::get_proc_info),
    spec(NETFN_OEM_Q_REQ, oem_q::CMD_OEM_Q_SET_DIMM_INFO, 2, oem_q::set_dimm_info),
    spec(NETFN_OEM_Q_REQ, oem_q::CMD_OEM_Q_GET_DIMM_INFO, 1, oem_q::get_dimm_info),
    // OEM 1S bridged
    spec(NETFN_OEM_1S_REQ, oem_1s::CMD_OEM_1S_BRIDGE_MSG, 2, oem_1s::bridge_msg),
    spec(NETFN_OEM_1S_REQ, oem_1s::CMD_OEM_1S_GET_BIC_FW_VER, 0, oem_1s::get_bic_fw_ver),
    // OEM USB debug card
    spec(NETFN_OEM_USB_DBG_REQ, usb_dbg::CMD_USB_DBG_GET_FRAME_DATA, 1, usb_dbg::get_frame_data),
    spec(NETFN_OEM_USB_DBG_REQ, usb_dbg::CMD_USB_DBG_GET_UPDATED_FRAMES, 0, usb_dbg::get_updated_frames),
];

/// Request NetFns this daemon consumes.
pub const SUPPORTED_NETFNS: &[u8] = &[
    NETFN_CHASSIS_REQ,
    NETFN_SENSOR_REQ,
    NETFN_APP_REQ,
    NETFN_STORAGE_REQ,
    NETFN_TRANSPORT_REQ,
    NETFN_DCMI_REQ,
    NETFN_OEM_REQ,
    NETFN_OEM_Q_REQ,
    NETFN_OEM_1S_REQ,
    NETFN_OEM_USB_DBG_REQ,
];

/// Route one decoded request. The response starts with the paired NetFn
/// and the 0xFF sentinel completion code; handlers overwrite the latter.
/// An unrecognized NetFn gets a header-only reply with the sentinel left
/// in place (a quirk the KCS bridge relies on); a recognized NetFn with
/// an unknown command is an explicit invalid-command error.
pub fn dispatch_request(ctx: &ServerContext, req: &IpmiRequest) -> IpmiResponse {
    let mut res = IpmiResponse::for_request(req);

    if !SUPPORTED_NETFNS.contains(&req.netfn) {
        warn!("unknown netfn 0x{:02x}", req.netfn);
        return res;
    }

    match COMMAND_TABLE
        .iter()
        .find(|s| s.netfn == req.netfn && s.cmd == req.cmd)
    {
        None => {
            warn!("invalid command: netfn 0x{:02x} cmd 0x{:02x}", req.netfn, req.cmd);
            res.cc = CC_INVALID_CMD;
        }
        Some(spec) if req.data.len() < spec.min_data_len => {
            warn!(
                "netfn 0x{:02x} cmd 0x{:02x}: short request ({} < {})",
                req.netfn,
                req.cmd,
                req.data.len(),
                spec.min_data_len
            );
            res.cc = CC_INVALID_LENGTH;
        }
        Some(spec) => (spec.handler)(ctx, req, &mut res),
    }

    if res.cc != CC_SUCCESS {
        debug!(
            "netfn 0x{:02x} cmd 0x{:02x} -> cc 0x{:02x} ({})",
            req.netfn,
            req.cmd,
            res.cc,
            cc2str(res.cc)
        );
    }
    res
}

/// Decode, route and frame one raw exchange. `None` means the buffer was
/// too short to even synthesize a response header.
pub fn dispatch(ctx: &ServerContext, buf: &[u8]) -> Option<Vec<u8>> {
    let req = match IpmiRequest::parse(buf, ctx.config.multi_node()) {
        Ok(req) => req,
        Err(e) => {
            warn!("dropping malformed request [{}]: {}", buf2str(buf, buf.len()), e);
            return None;
        }
    };
    debug!(
        "req netfn 0x{:02x} cmd 0x{:02x} len {}",
        req.netfn,
        req.cmd,
        req.data.len()
    );
    Some(dispatch_request(ctx, &req).encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;

    #[test]
    fn test_netfn_pairing_for_all_supported() {
        let ctx = test_context("pairing");
        for &netfn in SUPPORTED_NETFNS {
            let req = IpmiRequest {
                netfn,
                lun: 0,
                cmd: 0xDE, // unknown everywhere
                payload_id: 0,
                data: vec![],
            };
            let res = dispatch_request(&ctx, &req);
            assert_eq!(res.netfn, netfn + 1, "netfn 0x{:02x}", netfn);
        }
    }

    #[test]
    fn test_unknown_command_yields_invalid_cmd() {
        let ctx = test_context("unknown-cmd");
        let req = IpmiRequest {
            netfn: NETFN_APP_REQ,
            lun: 0,
            cmd: 0xDE,
            payload_id: 0,
            data: vec![],
        };
        let res = dispatch_request(&ctx, &req);
        assert_eq!(res.cc, CC_INVALID_CMD);
        assert!(res.data.is_empty());
        assert_eq!(res.encode().len(), 3);
    }

    #[test]
    fn test_unknown_netfn_header_only_reply() {
        let ctx = test_context("unknown-netfn");
        let req = IpmiRequest {
            netfn: 0x3E,
            lun: 0,
            cmd: 0x01,
            payload_id: 0,
            data: vec![],
        };
        let res = dispatch_request(&ctx, &req);
        assert_eq!(res.netfn, 0x3F);
        assert_eq!(res.cc, CC_UNSPECIFIED_ERROR);
        assert!(res.data.is_empty());
    }

    #[test]
    fn test_uniform_length_check() {
        let ctx = test_context("short");
        let req = IpmiRequest {
            netfn: NETFN_APP_REQ,
            lun: 0,
            cmd: app::CMD_SET_WATCHDOG_TIMER,
            payload_id: 0,
            data: vec![0x04, 0x01], // needs 6 bytes
        };
        let res = dispatch_request(&ctx, &req);
        assert_eq!(res.cc, CC_INVALID_LENGTH);
    }

    #[test]
    fn test_table_has_no_duplicate_entries() {
        let mut seen = std::collections::HashSet::new();
        for spec in COMMAND_TABLE {
            assert!(
                seen.insert((spec.netfn, spec.cmd)),
                "duplicate (0x{:02x}, 0x{:02x})",
                spec.netfn,
                spec.cmd
            );
            assert!(SUPPORTED_NETFNS.contains(&spec.netfn));
        }
    }
}
