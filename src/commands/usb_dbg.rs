/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! OEM USB debug-card NetFn (0x3C) handlers. The plug-in debug card
//! polls for updated display frames and pulls their contents.

use crate::context::ServerContext;
use crate::ipmi::ipmi::*;

pub const CMD_USB_DBG_GET_FRAME_DATA: u8 = 0x01;
pub const CMD_USB_DBG_GET_UPDATED_FRAMES: u8 = 0x02;

// Frame numbers the debug card knows about.
pub const FRAME_POST: u8 = 0x01;

/// Bytes of frame payload per pull.
const FRAME_PAGE_SIZE: usize = 16;

/// Get Frame Data. Data: frame number, page number. Response: frame
/// number, page number, next-page flag (0xFF on the final page), page
/// bytes. Only the POST-code frame is populated here.
pub fn get_frame_data(ctx: &ServerContext, req: &IpmiRequest, res: &mut IpmiResponse) {
    let frame = req.data[0];
    let page = *req.data.get(1).unwrap_or(&0) as usize;
    if frame != FRAME_POST {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    let history = ctx.post.lock().unwrap().history(usize::MAX);
    let start = page * FRAME_PAGE_SIZE;
    if start >= history.len() && !(page == 0 && history.is_empty()) {
        res.cc = CC_PARAM_OUT_OF_RANGE;
        return;
    }
    let end = (start + FRAME_PAGE_SIZE).min(history.len());
    let next = if end == history.len() { 0xFF } else { page as u8 + 1 };
    res.data.push(frame);
    res.data.push(page as u8);
    res.data.push(next);
    res.data.extend_from_slice(&history[start..end]);
    res.cc = CC_SUCCESS;
}

/// Get Updated Frames. Response: count, then the frame numbers with new
/// content since the card last pulled. Only the POST frame updates, and
/// only while POST is in progress.
pub fn get_updated_frames(ctx: &ServerContext, _req: &IpmiRequest, res: &mut IpmiResponse) {
    let post = ctx.post.lock().unwrap();
    if post.in_post() {
        res.data.push(1);
        res.data.push(FRAME_POST);
    } else {
        res.data.push(0);
    }
    res.cc = CC_SUCCESS;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dispatch_request;
    use crate::context::test_context;

    fn req(cmd: u8, data: Vec<u8>) -> IpmiRequest {
        IpmiRequest {
            netfn: NETFN_OEM_USB_DBG_REQ,
            lun: 0,
            cmd,
            payload_id: 0,
            data,
        }
    }

    fn push_codes(ctx: &std::sync::Arc<ServerContext>, n: usize) {
        let mut post = ctx.post.lock().unwrap();
        post.start();
        for i in 0..n {
            post.push(i as u8);
        }
    }

    #[test]
    fn test_frame_paging() {
        let ctx = test_context("dbg-paging");
        push_codes(&ctx, 20); // 16 + 4, two pages

        let res = dispatch_request(&ctx, &req(CMD_USB_DBG_GET_FRAME_DATA, vec![FRAME_POST, 0]));
        assert_eq!(res.cc, CC_SUCCESS);
        assert_eq!(res.data[0..3], [FRAME_POST, 0, 1]);
        assert_eq!(res.data.len(), 3 + 16);

        let res = dispatch_request(&ctx, &req(CMD_USB_DBG_GET_FRAME_DATA, vec![FRAME_POST, 1]));
        assert_eq!(res.data[0..3], [FRAME_POST, 1, 0xFF]);
        assert_eq!(res.data[3..], [16, 17, 18, 19]);

        let res = dispatch_request(&ctx, &req(CMD_USB_DBG_GET_FRAME_DATA, vec![FRAME_POST, 2]));
        assert_eq!(res.cc, CC_PARAM_OUT_OF_RANGE);
    }

    #[test]
    fn test_unknown_frame_rejected() {
        let ctx = test_context("dbg-frame");
        let res = dispatch_request(&ctx, &req(CMD_USB_DBG_GET_FRAME_DATA, vec![0x09, 0]));
        assert_eq!(res.cc, CC_PARAM_OUT_OF_RANGE);
    }

    #[test]
    fn test_updated_frames_follow_post_window() {
        let ctx = test_context("dbg-updated");
        let res = dispatch_request(&ctx, &req(CMD_USB_DBG_GET_UPDATED_FRAMES, vec![]));
        assert_eq!(res.data, vec![0]);

        ctx.post.lock().unwrap().start();
        let res = dispatch_request(&ctx, &req(CMD_USB_DBG_GET_UPDATED_FRAMES, vec![]));
        assert_eq!(res.data, vec![1, FRAME_POST]);

        ctx.post.lock().unwrap().end();
        let res = dispatch_request(&ctx, &req(CMD_USB_DBG_GET_UPDATED_FRAMES, vec![]));
        assert_eq!(res.data, vec![0]);
    }
}
