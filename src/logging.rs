/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Logger setup. The daemon normally logs to syslog; `--foreground`
//! switches to stderr via env_logger for interactive debugging.

use std::env;
use std::io::Write;

use log::LevelFilter;
use syslog::Facility;

use crate::error::{IpmiError, IpmiResult};

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the global logger. `verbose` counts the `-v` flags.
pub fn setup_logger(verbose: u8, foreground: bool) -> IpmiResult<()> {
    let level = level_for(verbose);
    if foreground {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        // RUST_LOG overrides the flag-derived level.
        if let Ok(spec) = env::var("RUST_LOG") {
            builder.parse_filters(&spec);
        }
        builder
            .format(|buf, record| {
                let level_text = match record.level() {
                    log::Level::Error => "ERROR",
                    log::Level::Warn => "WARN ",
                    log::Level::Info => "INFO ",
                    log::Level::Debug => "DEBUG",
                    log::Level::Trace => "TRACE",
                };
                writeln!(buf, "[{}] {}", level_text, record.args())
            })
            .init();
        return Ok(());
    }
    syslog::init(Facility::LOG_DAEMON, level, Some("ipmid"))
        .map_err(|e| IpmiError::System(format!("syslog init failed: {}", e)))
}
