/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Unix-domain socket front end. One connection carries one exchange:
//! the client writes a raw request frame, reads back the reply and
//! disconnects. Each connection is served on its own thread; the
//! dispatcher below takes no global lock, so exchanges only contend on
//! the subsystems they actually touch.

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::commands::dispatch;
use crate::context::ServerContext;
use crate::error::IpmiResult;
use crate::ipmi::ipmi::IPMI_BUF_SIZE;

/// Clients that connect and then stall get dropped after this long.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind the daemon socket and serve until the process dies. A stale
/// socket file from an earlier run is unlinked first.
pub fn serve(ctx: Arc<ServerContext>) -> IpmiResult<()> {
    let path = &ctx.config.socket_path;
    if path.exists() {
        fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    info!("listening on {}", path.display());

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || {
                    if let Err(e) = handle_client(&ctx, stream) {
                        warn!("client exchange failed: {}", e);
                    }
                });
            }
            Err(e) => warn!("accept failed: {}", e),
        }
    }
    Ok(())
}

fn handle_client(ctx: &ServerContext, mut stream: UnixStream) -> io::Result<()> {
    stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT))?;

    let mut buf = [0u8; IPMI_BUF_SIZE];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Ok(());
    }
    // A malformed frame gets no reply at all; the client times out and
    // treats the exchange as failed.
    if let Some(reply) = dispatch(ctx, &buf[..n]) {
        stream.write_all(&reply)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::app::CMD_GET_DEVICE_ID;
    use crate::context::test_context;
    use crate::ipmi::ipmi::{CC_SUCCESS, NETFN_APP_REQ};

    fn connect_with_retry(path: &std::path::Path) -> UnixStream {
        for _ in 0..50 {
            if let Ok(s) = UnixStream::connect(path) {
                return s;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("server socket never came up");
    }

    #[test]
    fn test_socket_exchange_round_trip() {
        let ctx = test_context("unix-exchange");
        let path = ctx.config.socket_path.clone();
        thread::spawn(move || serve(ctx));

        let mut stream = connect_with_retry(&path);
        stream
            .write_all(&[NETFN_APP_REQ << 2, CMD_GET_DEVICE_ID])
            .unwrap();

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        assert_eq!(reply.len(), 18);
        assert_eq!(reply[0] >> 2, NETFN_APP_REQ + 1);
        assert_eq!(reply[1], CMD_GET_DEVICE_ID);
        assert_eq!(reply[2], CC_SUCCESS);
    }

    #[test]
    fn test_concurrent_exchanges() {
        let ctx = test_context("unix-concurrent");
        let path = ctx.config.socket_path.clone();
        thread::spawn(move || serve(ctx));
        connect_with_retry(&path);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                thread::spawn(move || {
                    let mut stream = UnixStream::connect(&path).unwrap();
                    stream
                        .write_all(&[NETFN_APP_REQ << 2, CMD_GET_DEVICE_ID])
                        .unwrap();
                    let mut reply = Vec::new();
                    stream.read_to_end(&mut reply).unwrap();
                    assert_eq!(reply[2], CC_SUCCESS);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
