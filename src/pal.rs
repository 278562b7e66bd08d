/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Platform abstraction seam. The dispatch core and engines call hardware
//! through this trait only; per-board GPIO/I2C/sensor glue lives behind
//! it. `StubPlatform` backs tests and bring-up on machines without the
//! real power/FRU plumbing; `LinuxPlatform` wires the few actions a
//! generic Linux BMC can express directly.

use std::collections::HashMap;
use std::process::Command;
use std::sync::Mutex;

use log::{info, warn};

use crate::error::{IpmiError, IpmiResult};
use crate::ipmi::ipmi::CC_NOT_FOUND;
use crate::sdr::{SdrRec, SDR_TYPE_FULL};

/// Recorded power-control call, used by tests to observe side effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerEvent {
    On(u8),
    Off(u8),
    Cycle(u8),
    Reset(u8),
    SledCycle,
    BmcReboot,
}

pub trait Platform: Send + Sync {
    fn is_powered_on(&self, slot: u8) -> bool;
    fn power_on(&self, slot: u8) -> IpmiResult<()>;
    fn power_off(&self, slot: u8) -> IpmiResult<()>;
    fn power_cycle(&self, slot: u8) -> IpmiResult<()>;
    fn power_reset(&self, slot: u8) -> IpmiResult<()>;
    /// Power-cycle the whole sled. Fire-and-forget; no response payload
    /// guarantees after this runs.
    fn sled_cycle(&self) -> IpmiResult<()>;
    /// Reboot the BMC itself. Fire-and-forget.
    fn bmc_reboot(&self) -> IpmiResult<()>;

    fn fru_size(&self, fru: u8) -> IpmiResult<u16>;
    fn fru_read(&self, fru: u8, offset: u16, count: u8) -> IpmiResult<Vec<u8>>;
    fn fru_write(&self, fru: u8, offset: u16, data: &[u8]) -> IpmiResult<u8>;

    fn sensor_read(&self, sensor: u8) -> IpmiResult<u8>;
    /// Static sensor descriptor table used to populate the SDR
    /// repository at daemon init.
    fn sensor_sdrs(&self) -> Vec<SdrRec>;

    fn board_id(&self) -> u8;
    fn restart_cause(&self, slot: u8) -> u8;
    fn self_test_result(&self) -> [u8; 2];
    /// Present power draw in watts, for DCMI Get Power Reading.
    fn power_reading(&self) -> u16;
}

/// Build a minimal Full Sensor Record for the init table: header, owner,
/// sensor number, type, and an ASCII id string at the tail.
pub fn build_full_sdr(sensor_num: u8, sensor_type: u8, name: &str) -> SdrRec {
    let mut rec = SdrRec::default();
    rec.0[2] = 0x51; // SDR version 1.5
    rec.0[3] = SDR_TYPE_FULL;
    rec.0[4] = (crate::sdr::SDR_RECORD_SIZE - 5) as u8; // body length
    rec.0[5] = 0x20; // sensor owner: BMC slave address
    rec.0[6] = 0x00; // owner LUN
    rec.0[7] = sensor_num;
    rec.0[12] = sensor_type;
    let name = name.as_bytes();
    let n = name.len().min(16);
    rec.0[47] = 0xC0 | n as u8; // type/length byte: 8-bit ASCII
    rec.0[48..48 + n].copy_from_slice(&name[..n]);
    rec
}

const STUB_FRU_SIZE: usize = 512;

/// In-memory platform double. Slots default to powered on; power-control
/// calls are recorded rather than performed.
pub struct StubPlatform {
    powered: Mutex<HashMap<u8, bool>>,
    events: Mutex<Vec<PowerEvent>>,
    fru: Mutex<Vec<u8>>,
    sensors: Mutex<HashMap<u8, u8>>,
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl StubPlatform {
    pub fn new() -> Self {
        let mut fru = vec![0u8; STUB_FRU_SIZE];
        // FRU common header: format 1, board area at offset 8.
        fru[0] = 0x01;
        fru[3] = 0x01;
        let mut sensors = HashMap::new();
        sensors.insert(0x01, 28); // inlet temp
        sensors.insert(0x02, 35); // outlet temp
        sensors.insert(0x05, 120); // hsc power
        StubPlatform {
            powered: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            fru: Mutex::new(fru),
            sensors: Mutex::new(sensors),
        }
    }

    pub fn set_powered(&self, slot: u8, on: bool) {
        self.powered.lock().unwrap().insert(slot, on);
    }

    pub fn events(&self) -> Vec<PowerEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, ev: PowerEvent) {
        self.events.lock().unwrap().push(ev);
    }
}

impl Platform for StubPlatform {
    fn is_powered_on(&self, slot: u8) -> bool {
        *self.powered.lock().unwrap().get(&slot).unwrap_or(&true)
    }

    fn power_on(&self, slot: u8) -> IpmiResult<()> {
        self.set_powered(slot, true);
        self.record(PowerEvent::On(slot));
        Ok(())
    }

    fn power_off(&self, slot: u8) -> IpmiResult<()> {
        self.set_powered(slot, false);
        self.record(PowerEvent::Off(slot));
        Ok(())
    }

    fn power_cycle(&self, slot: u8) -> IpmiResult<()> {
        self.record(PowerEvent::Cycle(slot));
        Ok(())
    }

    fn power_reset(&self, slot: u8) -> IpmiResult<()> {
        self.record(PowerEvent::Reset(slot));
        Ok(())
    }

    fn sled_cycle(&self) -> IpmiResult<()> {
        self.record(PowerEvent::SledCycle);
        Ok(())
    }

    fn bmc_reboot(&self) -> IpmiResult<()> {
        self.record(PowerEvent::BmcReboot);
        Ok(())
    }

    fn fru_size(&self, fru: u8) -> IpmiResult<u16> {
        if fru != 0 {
            return Err(IpmiError::Completion(CC_NOT_FOUND));
        }
        Ok(STUB_FRU_SIZE as u16)
    }

    fn fru_read(&self, fru: u8, offset: u16, count: u8) -> IpmiResult<Vec<u8>> {
        if fru != 0 {
            return Err(IpmiError::Completion(CC_NOT_FOUND));
        }
        let data = self.fru.lock().unwrap();
        let start = offset as usize;
        if start >= data.len() {
            return Err(IpmiError::Completion(CC_NOT_FOUND));
        }
        let end = (start + count as usize).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn fru_write(&self, fru: u8, offset: u16, bytes: &[u8]) -> IpmiResult<u8> {
        if fru != 0 {
            return Err(IpmiError::Completion(CC_NOT_FOUND));
        }
        let mut data = self.fru.lock().unwrap();
        let start = offset as usize;
        if start + bytes.len() > data.len() {
            return Err(IpmiError::Completion(CC_NOT_FOUND));
        }
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len() as u8)
    }

    fn sensor_read(&self, sensor: u8) -> IpmiResult<u8> {
        self.sensors
            .lock()
            .unwrap()
            .get(&sensor)
            .copied()
            .ok_or(IpmiError::Completion(CC_NOT_FOUND))
    }

    fn sensor_sdrs(&self) -> Vec<SdrRec> {
        vec![
            build_full_sdr(0x01, 0x01, "MB_INLET_TEMP"),
            build_full_sdr(0x02, 0x01, "MB_OUTLET_TEMP"),
            build_full_sdr(0x05, 0x08, "MB_HSC_PWR"),
        ]
    }

    fn board_id(&self) -> u8 {
        0x01
    }

    fn restart_cause(&self, _slot: u8) -> u8 {
        0x01 // chassis control command
    }

    fn self_test_result(&self) -> [u8; 2] {
        [0x55, 0x00] // no error
    }

    fn power_reading(&self) -> u16 {
        145
    }
}

/// Platform for a real Linux BMC. Only the actions a generic BMC image
/// can express are wired (BMC reboot syscall, sled-cycle helper binary);
/// host power control stays with the board-specific helper this daemon
/// shells out to.
pub struct LinuxPlatform {
    stub: StubPlatform,
    power_util: String,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxPlatform {
    pub fn new() -> Self {
        LinuxPlatform {
            stub: StubPlatform::new(),
            power_util: "/usr/local/bin/power-util".to_string(),
        }
    }

    fn run_power_util(&self, slot: u8, op: &str) -> IpmiResult<()> {
        info!("power-util slot{} {}", slot, op);
        Command::new(&self.power_util)
            .arg(format!("slot{}", slot))
            .arg(op)
            .spawn()
            .map_err(|e| IpmiError::System(format!("{}: {}", self.power_util, e)))?;
        Ok(())
    }
}

impl Platform for LinuxPlatform {
    fn is_powered_on(&self, slot: u8) -> bool {
        self.stub.is_powered_on(slot)
    }

    fn power_on(&self, slot: u8) -> IpmiResult<()> {
        self.run_power_util(slot, "on")
    }

    fn power_off(&self, slot: u8) -> IpmiResult<()> {
        self.run_power_util(slot, "off")
    }

    fn power_cycle(&self, slot: u8) -> IpmiResult<()> {
        self.run_power_util(slot, "cycle")
    }

    fn power_reset(&self, slot: u8) -> IpmiResult<()> {
        self.run_power_util(slot, "reset")
    }

    fn sled_cycle(&self) -> IpmiResult<()> {
        warn!("sled-cycle requested");
        Command::new(&self.power_util)
            .arg("sled-cycle")
            .spawn()
            .map_err(|e| IpmiError::System(format!("{}: {}", self.power_util, e)))?;
        Ok(())
    }

    fn bmc_reboot(&self) -> IpmiResult<()> {
        warn!("BMC cold reset requested, rebooting");
        nix::sys::reboot::reboot(nix::sys::reboot::RebootMode::RB_AUTOBOOT)?;
        Ok(())
    }

    fn fru_size(&self, fru: u8) -> IpmiResult<u16> {
        self.stub.fru_size(fru)
    }

    fn fru_read(&self, fru: u8, offset: u16, count: u8) -> IpmiResult<Vec<u8>> {
        self.stub.fru_read(fru, offset, count)
    }

    fn fru_write(&self, fru: u8, offset: u16, data: &[u8]) -> IpmiResult<u8> {
        self.stub.fru_write(fru, offset, data)
    }

    fn sensor_read(&self, sensor: u8) -> IpmiResult<u8> {
        self.stub.sensor_read(sensor)
    }

    fn sensor_sdrs(&self) -> Vec<SdrRec> {
        self.stub.sensor_sdrs()
    }

    fn board_id(&self) -> u8 {
        self.stub.board_id()
    }

    fn restart_cause(&self, slot: u8) -> u8 {
        self.stub.restart_cause(slot)
    }

    fn self_test_result(&self) -> [u8; 2] {
        self.stub.self_test_result()
    }

    fn power_reading(&self) -> u16 {
        self.stub.power_reading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_records_power_events() {
        let pal = StubPlatform::new();
        pal.power_off(1).unwrap();
        pal.power_reset(2).unwrap();
        assert_eq!(pal.events(), vec![PowerEvent::Off(1), PowerEvent::Reset(2)]);
        assert!(!pal.is_powered_on(1));
        assert!(pal.is_powered_on(2));
    }

    #[test]
    fn test_stub_fru_round_trip() {
        let pal = StubPlatform::new();
        pal.fru_write(0, 16, &[1, 2, 3]).unwrap();
        assert_eq!(pal.fru_read(0, 16, 3).unwrap(), vec![1, 2, 3]);
        assert!(pal.fru_read(1, 0, 1).is_err());
    }

    #[test]
    fn test_build_full_sdr_layout() {
        let rec = build_full_sdr(0x07, 0x01, "TEST_TEMP");
        assert_eq!(rec.0[3], SDR_TYPE_FULL);
        assert_eq!(rec.0[7], 0x07);
        assert_eq!(rec.0[47], 0xC0 | 9);
        assert_eq!(&rec.0[48..57], b"TEST_TEMP");
    }
}
