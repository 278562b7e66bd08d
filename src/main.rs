/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
mod cli;

use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use log::error;

use cli::Cli;
use ipmid::context::ServerContext;
use ipmid::interface::unix;
use ipmid::logging;
use ipmid::pal::LinuxPlatform;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::setup_logger(cli.verbose, cli.foreground) {
        eprintln!("ipmid: {}", e);
        exit(1);
    }

    let pal = Arc::new(LinuxPlatform::new());
    let ctx = match ServerContext::new(cli.server_config(), pal) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("init failed: {}", e);
            exit(1);
        }
    };

    if let Err(e) = ctx.start_background() {
        error!("watchdog startup failed: {}", e);
        exit(1);
    }

    if let Err(e) = unix::serve(ctx) {
        error!("server loop failed: {}", e);
        exit(1);
    }
}
