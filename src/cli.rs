/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use ipmid::context::{ServerConfig, DEFAULT_DATA_DIR, DEFAULT_SOCKET_PATH};

#[derive(Parser, Debug)]
#[command(
    name = "ipmid",
    version = "0.9.0",
    about = "IPMI message handler daemon",
    max_term_width = 100
)]
pub struct Cli {
    #[arg(short = 'v', action = ArgAction::Count, help = "Verbose (can use multiple times)")]
    pub verbose: u8,

    #[arg(long, default_value = DEFAULT_SOCKET_PATH, help = "Listening socket path")]
    pub socket: PathBuf,

    #[arg(long, default_value = DEFAULT_DATA_DIR, help = "Persistent state directory")]
    pub data_dir: PathBuf,

    #[arg(long, default_value_t = 1, help = "Power-controllable slots (>1 enables the multi-node wire format)")]
    pub slots: u8,

    #[arg(short = 'f', long, help = "Stay attached and log to stderr instead of syslog")]
    pub foreground: bool,
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            socket_path: self.socket.clone(),
            data_dir: self.data_dir.clone(),
            slots: self.slots,
        }
    }
}
