/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Chassis NetFn (0x00) handlers.

use log::error;

use crate::context::ServerContext;
use crate::ipmi::ipmi::*;

pub const CMD_GET_CHASSIS_STATUS: u8 = 0x01;
pub const CMD_CHASSIS_CONTROL: u8 = 0x02;
pub const CMD_SET_POWER_RESTORE_POLICY: u8 = 0x06;
pub const CMD_GET_RESTART_CAUSE: u8 = 0x07;
pub const CMD_SET_BOOT_OPTIONS: u8 = 0x08;
pub const CMD_GET_BOOT_OPTIONS: u8 = 0x09;

// Chassis control operations.
const CTRL_POWER_OFF: u8 = 0x00;
const CTRL_POWER_ON: u8 = 0x01;
const CTRL_POWER_CYCLE: u8 = 0x02;
const CTRL_HARD_RESET: u8 = 0x03;

// Power restore policies; "get supported" selector.
const POLICY_MAX: u8 = 0x02;
const POLICY_GET_SUPPORTED: u8 = 0x03;
const POLICIES_SUPPORTED: u8 = 0x07; // always-off, restore, always-on

const BOOT_PARAM_SELECTOR_MAX: u8 = 0x07;
const BOOT_OPTIONS_VERSION: u8 = 0x01;

fn slot_for(ctx: &ServerContext, req: &IpmiRequest) -> u8 {
    if ctx.config.multi_node() {
        req.payload_id
    } else {
        1
    }
}

pub fn get_chassis_status(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let slot = slot_for(ctx, req);
    let policy = *ctx.restore_policy.lock().unwrap();
    let mut state = (policy & 0x03) << 5;
    if ctx.pal.is_powered_on(slot) {
        state |= 0x01;
    }
    res.data.push(state);
    res.data.push(0x00); // last power event
    res.data.push(0x00); // misc chassis state
    res.cc = CC_SUCCESS;
}

pub fn chassis_control(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let slot = slot_for(ctx, req);
    let result = match req.data[0] & 0x0F {
        CTRL_POWER_OFF => ctx.pal.power_off(slot),
        CTRL_POWER_ON => ctx.pal.power_on(slot),
        CTRL_POWER_CYCLE => ctx.pal.power_cycle(slot),
        CTRL_HARD_RESET => ctx.pal.power_reset(slot),
        _ => {
            res.cc = CC_INVALID_PARAM;
            return;
        }
    };
    match result {
        Ok(()) => res.cc = CC_SUCCESS,
        Err(e) => {
            error!("chassis control failed: {}", e);
            res.cc = e.cc();
        }
    }
}

pub fn set_power_restore_policy(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let policy = req.data[0] & 0x07;
    if policy == POLICY_GET_SUPPORTED {
        res.data.push(POLICIES_SUPPORTED);
        res.cc = CC_SUCCESS;
        return;
    }
    if policy > POLICY_MAX {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    *ctx.restore_policy.lock().unwrap() = policy;
    res.data.push(POLICIES_SUPPORTED);
    res.cc = CC_SUCCESS;
}

pub fn get_restart_cause(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let slot = slot_for(ctx, req);
    res.data.push(ctx.pal.restart_cause(slot));
    res.data.push(0x00); // channel
    res.cc = CC_SUCCESS;
}

/// Set System Boot Options. Data: parameter valid/selector byte, then
/// parameter data. Bit 7 of the selector marks the parameter locked and
/// carries no data.
pub fn set_boot_options(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let selector = req.data[0] & 0x7F;
    if selector > BOOT_PARAM_SELECTOR_MAX {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    ctx.boot_params.lock().unwrap().set(selector, &req.data[1..]);
    res.cc = CC_SUCCESS;
}

/// Get System Boot Options. Data: parameter selector, set selector,
/// block selector. Unset parameters read back as zeroed data of the
/// parameter's nominal size.
pub fn get_boot_options(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let selector = req.data[0] & 0x7F;
    if selector > BOOT_PARAM_SELECTOR_MAX {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    res.data.push(BOOT_OPTIONS_VERSION);
    res.data.push(selector);
    match ctx.boot_params.lock().unwrap().get(selector) {
        Some(bytes) => res.data.extend_from_slice(bytes),
        None => {
            let default_len = match selector {
                0x05 => 5, // boot flags
                0x03 => 1, // BMC boot flag valid bit clearing
                _ => 2,
            };
            res.data.extend(std::iter::repeat(0u8).take(default_len));
        }
    }
    res.cc = CC_SUCCESS;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dispatch_request;
    use crate::context::{test_config, test_context};
    use crate::pal::{PowerEvent, StubPlatform};
    use std::sync::Arc;

    fn req(cmd: u8, data: Vec<u8>) -> IpmiRequest {
        IpmiRequest {
            netfn: NETFN_CHASSIS_REQ,
            lun: 0,
            cmd,
            payload_id: 0,
            data,
        }
    }

    #[test]
    fn test_chassis_status_reflects_power_and_policy() {
        let pal = Arc::new(StubPlatform::new());
        let ctx = crate::context::ServerContext::new(
            test_config("chassis-status"),
            Arc::clone(&pal) as Arc<dyn crate::pal::Platform>,
        )
        .unwrap();

        let res = dispatch_request(&ctx, &req(CMD_GET_CHASSIS_STATUS, vec![]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data[0] & 0x01, 0x01);

        pal.set_powered(1, false);
        let res = dispatch_request(&ctx, &req(CMD_GET_CHASSIS_STATUS, vec![]));
        assert_eq!(res.data[0] & 0x01, 0x00);
    }

    #[test]
    fn test_chassis_control_dispatches_power_ops() {
        let pal = Arc::new(StubPlatform::new());
        let ctx = crate::context::ServerContext::new(
            test_config("chassis-ctrl"),
            Arc::clone(&pal) as Arc<dyn crate::pal::Platform>,
        )
        .unwrap();

        assert_eq!(
            dispatch_request(&ctx, &req(CMD_CHASSIS_CONTROL, vec![CTRL_HARD_RESET])).cc,
            CC_SUCCESS
        );
        assert_eq!(
            dispatch_request(&ctx, &req(CMD_CHASSIS_CONTROL, vec![0x0F])).cc,
            CC_INVALID_PARAM
        );
        assert_eq!(pal.events(), vec![PowerEvent::Reset(1)]);
    }

    #[test]
    fn test_power_restore_policy() {
        let ctx = test_context("policy");
        let res = dispatch_request(&ctx, &req(CMD_SET_POWER_RESTORE_POLICY, vec![0x01]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![POLICIES_SUPPORTED]);
        assert_eq!(*ctx.restore_policy.lock().unwrap(), 0x01);

        let res = dispatch_request(&ctx, &req(CMD_SET_POWER_RESTORE_POLICY, vec![0x05]));
        assert_eq!(res.cc, CC_PARAM_OUT_OF_RANGE);
    }

    #[test]
    fn test_boot_options_round_trip() {
        let ctx = test_context("bootopts");
        let res = dispatch_request(
            &ctx,
            &req(CMD_SET_BOOT_OPTIONS, vec![0x05, 0x80, 0x08, 0x00, 0x00, 0x00]),
        );
        assert_eq!(res.cc, CC_SUCCESS);

        let res = dispatch_request(&ctx, &req(CMD_GET_BOOT_OPTIONS, vec![0x05, 0x00, 0x00]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![0x01, 0x05, 0x80, 0x08, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_boot_options_defaults_and_range() {
        let ctx = test_context("bootopts-default");
        let res = dispatch_request(&ctx, &req(CMD_GET_BOOT_OPTIONS, vec![0x05, 0x00, 0x00]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data, vec![0x01, 0x05, 0, 0, 0, 0, 0]);

        let res = dispatch_request(&ctx, &req(CMD_SET_BOOT_OPTIONS, vec![0x7F]));
        assert_eq!(res.cc, CC_PARAM_OUT_OF_RANGE);
    }
}
