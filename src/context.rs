/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Daemon-wide state, passed by reference into every handler. There is
//! no global mutable state: each subsystem sits behind its own lock and
//! the dispatcher itself holds none of them.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{error, info};

use crate::commands::oem::BiosClearTimer;
use crate::error::IpmiResult;
use crate::pal::Platform;
use crate::sel::SelLog;
use crate::sdr::SdrRepo;
use crate::watchdog::{spawn_countdown, WdtSlot};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/ipmid_socket";
pub const DEFAULT_DATA_DIR: &str = "/var/lib/ipmid";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    /// Number of power-controllable slots. More than one enables the
    /// multi-node wire variant with its payload_id header byte.
    pub slots: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            slots: 1,
        }
    }
}

impl ServerConfig {
    pub fn multi_node(&self) -> bool {
        self.slots > 1
    }
}

/// Last-write-wins raw parameter store backing the LAN/SOL/system-info
/// parameter commands.
#[derive(Default)]
pub struct ParamStore {
    params: HashMap<u8, Vec<u8>>,
}

impl ParamStore {
    pub fn set(&mut self, selector: u8, data: &[u8]) {
        self.params.insert(selector, data.to_vec());
    }

    pub fn get(&self, selector: u8) -> Option<&[u8]> {
        self.params.get(&selector).map(|v| v.as_slice())
    }
}

pub const POST_BUFFER_MAX: usize = 1024;

/// Bounded history of BIOS POST codes (the "80-port" capture).
#[derive(Default)]
pub struct PostBuffer {
    codes: VecDeque<u8>,
    in_post: bool,
}

impl PostBuffer {
    pub fn start(&mut self) {
        self.codes.clear();
        self.in_post = true;
    }

    pub fn end(&mut self) {
        self.in_post = false;
    }

    pub fn in_post(&self) -> bool {
        self.in_post
    }

    pub fn push(&mut self, code: u8) {
        if self.codes.len() == POST_BUFFER_MAX {
            self.codes.pop_front();
        }
        self.codes.push_back(code);
    }

    /// Most recent codes, newest last, capped at `max`.
    pub fn history(&self, max: usize) -> Vec<u8> {
        let skip = self.codes.len().saturating_sub(max);
        self.codes.iter().skip(skip).copied().collect()
    }
}

/// Boot order blob: one flags byte plus five device selectors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BootOrder(pub [u8; 6]);

/// CMOS-clear request bit in the boot-order flags byte; cleared by the
/// delayed timer once BIOS has had its window.
pub const BOOT_ORDER_CMOS_CLEAR_BIT: u8 = 0x80;

pub struct ServerContext {
    pub config: ServerConfig,
    pub pal: Arc<dyn Platform>,
    pub sel: Mutex<SelLog>,
    pub sdr: Mutex<SdrRepo>,
    pub wdt: Vec<Arc<WdtSlot>>,
    pub lan: Mutex<ParamStore>,
    pub sol: Mutex<ParamStore>,
    pub sys_info: Mutex<ParamStore>,
    pub boot_params: Mutex<ParamStore>,
    pub restore_policy: Mutex<u8>,
    pub post: Mutex<PostBuffer>,
    pub ppr: Mutex<ParamStore>,
    pub boot_order: Arc<Mutex<BootOrder>>,
    pub bios_clear: BiosClearTimer,
    pub guid: [u8; 16],
}

impl ServerContext {
    pub fn new(config: ServerConfig, pal: Arc<dyn Platform>) -> IpmiResult<Arc<Self>> {
        fs::create_dir_all(&config.data_dir)?;

        let sel = SelLog::open(config.data_dir.join("sel.bin"))?;

        let mut sdr = SdrRepo::new();
        for rec in pal.sensor_sdrs() {
            if let Err(e) = sdr.add(&rec) {
                error!("SDR: init add failed: {}", e);
            }
        }
        info!("SDR: populated {} records", sdr.count());

        let wdt = (1..=config.slots).map(|s| Arc::new(WdtSlot::new(s))).collect();
        let guid = load_or_mint_guid(&config.data_dir)?;

        Ok(Arc::new(ServerContext {
            config,
            pal,
            sel: Mutex::new(sel),
            sdr: Mutex::new(sdr),
            wdt,
            lan: Mutex::new(ParamStore::default()),
            sol: Mutex::new(ParamStore::default()),
            sys_info: Mutex::new(ParamStore::default()),
            boot_params: Mutex::new(ParamStore::default()),
            restore_policy: Mutex::new(0),
            post: Mutex::new(PostBuffer::default()),
            ppr: Mutex::new(ParamStore::default()),
            boot_order: Arc::new(Mutex::new(BootOrder::default())),
            bios_clear: BiosClearTimer::new(),
            guid,
        }))
    }

    /// Spawn the per-slot watchdog countdown threads.
    pub fn start_background(self: &Arc<Self>) -> IpmiResult<()> {
        for slot in &self.wdt {
            spawn_countdown(Arc::clone(slot), Arc::clone(&self.pal))?;
        }
        Ok(())
    }

    /// Watchdog slot for a request's payload id (slot 0 means "self" on
    /// single-node platforms and maps to slot 1).
    pub fn wdt_slot(&self, payload_id: u8) -> Option<&Arc<WdtSlot>> {
        let slot = if payload_id == 0 { 1 } else { payload_id };
        self.wdt.get(slot as usize - 1)
    }
}

fn load_or_mint_guid(data_dir: &std::path::Path) -> IpmiResult<[u8; 16]> {
    let path = data_dir.join("guid.bin");
    if let Ok(bytes) = fs::read(&path) {
        if bytes.len() == 16 {
            let mut guid = [0u8; 16];
            guid.copy_from_slice(&bytes);
            return Ok(guid);
        }
    }
    let guid: [u8; 16] = rand::random();
    fs::write(&path, guid)?;
    info!("minted device GUID at {}", path.display());
    Ok(guid)
}

/// Per-test scratch config under the system temp dir.
#[cfg(test)]
pub fn test_config(tag: &str) -> ServerConfig {
    let dir = std::env::temp_dir().join(format!("ipmid-ctx-{}-{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    ServerConfig {
        socket_path: dir.join("sock"),
        data_dir: dir,
        slots: 1,
    }
}

/// Context over a `StubPlatform`, for handler tests.
#[cfg(test)]
pub fn test_context(tag: &str) -> Arc<ServerContext> {
    ServerContext::new(test_config(tag), Arc::new(crate::pal::StubPlatform::new())).unwrap()
}
