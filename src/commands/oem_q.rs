/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! OEM inventory-cache NetFn (0x36) handlers. BIOS pushes processor and
//! DIMM descriptors here during POST; they are cached as files under the
//! data dir so the inventory survives BMC restarts.

use std::fs;
use std::path::PathBuf;

use log::error;

use crate::context::ServerContext;
use crate::ipmi::ipmi::*;

pub const CMD_OEM_Q_SET_PROC_INFO: u8 = 0x10;
pub const CMD_OEM_Q_GET_PROC_INFO: u8 = 0x11;
pub const CMD_OEM_Q_SET_DIMM_INFO: u8 = 0x12;
pub const CMD_OEM_Q_GET_DIMM_INFO: u8 = 0x13;

fn cache_path(ctx: &ServerContext, kind: &str, index: u8) -> PathBuf {
    ctx.config.data_dir.join(format!("{}_info_{}.bin", kind, index))
}

fn set_info(ctx: &ServerContext, kind: &str, req: &IpmiRequest, res: &mut IpmiResponse) {
    let index = req.data[0];
    let path = cache_path(ctx, kind, index);
    match fs::write(&path, &req.data[1..]) {
        Ok(()) => res.cc = CC_SUCCESS,
        Err(e) => {
            error!("{} info cache write {} failed: {}", kind, path.display(), e);
            res.cc = CC_UNSPECIFIED_ERROR;
        }
    }
}

fn get_info(ctx: &ServerContext, kind: &str, req: &IpmiRequest, res: &mut IpmiResponse) {
    let index = req.data[0];
    match fs::read(cache_path(ctx, kind, index)) {
        Ok(bytes) => {
            res.data.extend_from_slice(&bytes);
            res.cc = CC_SUCCESS;
        }
        Err(_) => res.cc = CC_NOT_FOUND,
    }
}

/// Set Processor Info. Data: processor index, descriptor bytes.
pub fn set_proc_info(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    set_info(ctx, "proc", req, res);
}

/// Get Processor Info. Data: processor index.
pub fn get_proc_info(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    get_info(ctx, "proc", req, res);
}

/// Set DIMM Info. Data: DIMM index, descriptor bytes.
pub fn set_dimm_info(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    set_info(ctx, "dimm", req, res);
}

/// Get DIMM Info. Data: DIMM index.
pub fn get_dimm_info(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    get_info(ctx, "dimm", req, res);
}
