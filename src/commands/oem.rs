/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Platform OEM NetFn (0x30) handlers: sled cycle, board id, POST code
//! capture, boot order and PPR (post-package repair) parameters.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::context::{BootOrder, ServerContext, BOOT_ORDER_CMOS_CLEAR_BIT};
use crate::ipmi::ipmi::*;

pub const CMD_OEM_SEND_POST_CODE: u8 = 0x08;
pub const CMD_OEM_SLED_CYCLE: u8 = 0x2A;
pub const CMD_OEM_GET_BOARD_ID: u8 = 0x37;
pub const CMD_OEM_GET_80PORT_RECORD: u8 = 0x49;
pub const CMD_OEM_SET_BOOT_ORDER: u8 = 0x52;
pub const CMD_OEM_GET_BOOT_ORDER: u8 = 0x53;
pub const CMD_OEM_SET_POST_START: u8 = 0x73;
pub const CMD_OEM_SET_POST_END: u8 = 0x74;
pub const CMD_OEM_SET_PPR: u8 = 0x90;
pub const CMD_OEM_GET_PPR: u8 = 0x91;

/// How long a requested CMOS clear stays pending before the flag is
/// dropped again. BIOS is expected to consume it within one boot.
pub const BIOS_CLEAR_DELAY_SECS: u64 = 600;

/// Largest POST-code history returned in one reply.
const POST_HISTORY_REPLY_MAX: usize = 224;

const PPR_SELECTOR_MAX: u8 = 0x06;

/// Delayed, cancellable reset of the CMOS-clear bit in the boot order.
///
/// Arming bumps a generation counter and spawns a waiter; cancelling (or
/// re-arming) bumps it again and wakes the waiter, which sees a stale
/// generation and exits without touching the flags. The waiter sleeps on
/// a condvar rather than a plain sleep so cancellation takes effect
/// immediately instead of at expiry.
pub struct BiosClearTimer {
    inner: Arc<(Mutex<u64>, Condvar)>,
}

impl Default for BiosClearTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl BiosClearTimer {
    pub fn new() -> Self {
        BiosClearTimer {
            inner: Arc::new((Mutex::new(0), Condvar::new())),
        }
    }

    /// Drop any pending clear without firing it.
    pub fn cancel(&self) {
        let (gen, cvar) = &*self.inner;
        *gen.lock().unwrap() += 1;
        cvar.notify_all();
    }

    /// Schedule the CMOS-clear bit in `boot_order` to be dropped after
    /// `delay`, unless cancelled or re-armed first.
    pub fn arm(&self, boot_order: Arc<Mutex<BootOrder>>, delay: Duration) {
        let armed_gen = {
            let (gen, _) = &*self.inner;
            let mut g = gen.lock().unwrap();
            *g += 1;
            *g
        };
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            let (gen, cvar) = &*inner;
            let deadline = Instant::now() + delay;
            let mut g = gen.lock().unwrap();
            while *g == armed_gen {
                let now = Instant::now();
                if now >= deadline {
                    // Fired while still the current generation; clearing
                    // under the generation lock keeps cancel() atomic
                    // with respect to the flag update.
                    boot_order.lock().unwrap().0[0] &= !BOOT_ORDER_CMOS_CLEAR_BIT;
                    info!("boot order: CMOS clear window expired");
                    return;
                }
                g = cvar.wait_timeout(g, deadline - now).unwrap().0;
            }
        });
    }
}

/// Sled cycle power-cycles the whole chassis. The response is framed
/// before the platform call since the BMC itself goes down with the sled.
pub fn sled_cycle(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.cc = CC_SUCCESS;
    warn!("sled cycle requested");
    if let Err(e) = ctx.pal.sled_cycle() {
        error!("sled cycle failed: {}", e);
        res.cc = CC_UNSPECIFIED_ERROR;
    }
}

pub fn get_board_id(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data.push(ctx.pal.board_id());
    res.cc = CC_SUCCESS;
}

pub fn send_post_code(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    ctx.post.lock().unwrap().push(req.data[0]);
    res.cc = CC_SUCCESS;
}

/// Dump the captured POST-code history, oldest first, capped to one
/// reply's worth.
pub fn get_80port_record(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    let history = ctx.post.lock().unwrap().history(POST_HISTORY_REPLY_MAX);
    res.data.extend_from_slice(&history);
    res.cc = CC_SUCCESS;
}

/// Set Boot Order. Data: flags byte plus five device selectors. Setting
/// the CMOS-clear flag arms the delayed reset; writing it back clear
/// cancels a pending one.
pub fn set_boot_order(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let mut order = BootOrder::default();
    order.0.copy_from_slice(&req.data[..6]);
    *ctx.boot_order.lock().unwrap() = order;

    if order.0[0] & BOOT_ORDER_CMOS_CLEAR_BIT != 0 {
        info!("boot order: CMOS clear requested");
        ctx.bios_clear.arm(
            Arc::clone(&ctx.boot_order),
            Duration::from_secs(BIOS_CLEAR_DELAY_SECS),
        );
    } else {
        ctx.bios_clear.cancel();
    }
    res.cc = CC_SUCCESS;
}

pub fn get_boot_order(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    res.data
        .extend_from_slice(&ctx.boot_order.lock().unwrap().0);
    res.cc = CC_SUCCESS;
}

pub fn set_post_start(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    info!("POST started");
    ctx.post.lock().unwrap().start();
    res.cc = CC_SUCCESS;
}

pub fn set_post_end(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    info!("POST ended");
    ctx.post.lock().unwrap().end();
    res.cc = CC_SUCCESS;
}

/// Set PPR parameter. Data: parameter selector, parameter data.
pub fn set_ppr(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let selector = req.data[0];
    if selector > PPR_SELECTOR_MAX {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    ctx.ppr.lock().unwrap().set(selector, &req.data[1..]);
    res.cc = CC_SUCCESS;
}

/// Get PPR parameter. Data: parameter selector. A selector that was
/// never written reads back as not-found.
pub fn get_ppr(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let selector = req.data[0];
    if selector > PPR_SELECTOR_MAX {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    match ctx.ppr.lock().unwrap().get(selector) {
        Some(bytes) => {
            res.data.extend_from_slice(bytes);
            res.cc = CC_SUCCESS;
        }
        None => res.cc = CC_NOT_FOUND,
    }
}
