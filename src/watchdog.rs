/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
//! Software watchdog timer engine. One slot per power-controllable node;
//! a dedicated thread steps the countdown at a fixed 100 ms tick and
//! fires the configured power action on expiry. The countdown step is a
//! plain function on the locked state so the state machine is testable
//! without threads; the action itself always runs after the lock has
//! been released.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::error::{IpmiError, IpmiResult};
use crate::ipmi::ipmi::CC_INVALID_PARAM;
use crate::pal::Platform;

/// Countdown granularity: one tick = one decisecond.
pub const WDT_TICK_MS: u64 = 100;

// Timer use codes (byte 0 bits 0..2 of Set Watchdog Timer).
pub const WDT_USE_FRB2: u8 = 0x01;
pub const WDT_USE_POST: u8 = 0x02;
pub const WDT_USE_OS_LOAD: u8 = 0x03;
pub const WDT_USE_SMS_OS: u8 = 0x04;
pub const WDT_USE_OEM: u8 = 0x05;

// Byte 0 flag bits.
pub const WDT_DONT_STOP_BIT: u8 = 0x40;
pub const WDT_NO_LOG_BIT: u8 = 0x80;

// Timeout actions (byte 1 bits 0..2).
pub const WDT_ACTION_NONE: u8 = 0x00;
pub const WDT_ACTION_HARD_RESET: u8 = 0x01;
pub const WDT_ACTION_POWER_OFF: u8 = 0x02;
pub const WDT_ACTION_POWER_CYCLE: u8 = 0x03;

/// Power action captured at expiry, executed outside the slot lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WdtAction {
    HardReset,
    PowerOff,
    PowerCycle,
}

#[derive(Debug, Clone, Default)]
pub struct WdtState {
    pub valid: bool,
    pub run: bool,
    pub no_log: bool,
    pub use_code: u8,
    pub action: u8,
    pub pre_interval: u8,
    /// Sticky bitmask of uses that have expired; cleared only by the
    /// clear mask of a Set Watchdog Timer command.
    pub expiration: u8,
    pub init_count_down: u16,
    pub present_count_down: u16,
}

/// Configuration carried by a Set Watchdog Timer command.
#[derive(Debug, Clone, Copy)]
pub struct WdtConfig {
    pub use_code: u8,
    pub dont_stop: bool,
    pub no_log: bool,
    pub action: u8,
    pub pre_interval: u8,
    pub expiration_clear: u8,
    pub init_count_down: u16,
}

pub struct WdtSlot {
    pub slot: u8,
    state: Mutex<WdtState>,
}

impl WdtSlot {
    pub fn new(slot: u8) -> Self {
        WdtSlot {
            slot,
            state: Mutex::new(WdtState::default()),
        }
    }

    /// Apply a Set Watchdog Timer command. Always reloads the countdown;
    /// stops the timer unless the "don't stop" bit was set.
    pub fn set(&self, cfg: &WdtConfig) {
        let mut st = self.state.lock().unwrap();
        st.valid = true;
        st.use_code = cfg.use_code & 0x07;
        st.action = cfg.action & 0x07;
        st.pre_interval = cfg.pre_interval;
        st.no_log = cfg.no_log;
        st.expiration &= !cfg.expiration_clear;
        st.init_count_down = cfg.init_count_down;
        st.present_count_down = cfg.init_count_down;
        if !cfg.dont_stop {
            st.run = false;
        }
        info!(
            "wdt[{}]: set use={} action={} countdown={} run={}",
            self.slot, st.use_code, st.action, st.init_count_down, st.run
        );
    }

    /// Apply a Reset Watchdog Timer command: restart the countdown.
    /// Fails on a slot that has never been configured.
    pub fn kick(&self) -> IpmiResult<()> {
        let mut st = self.state.lock().unwrap();
        if !st.valid {
            return Err(IpmiError::Completion(CC_INVALID_PARAM));
        }
        st.present_count_down = st.init_count_down;
        st.run = true;
        Ok(())
    }

    /// Snapshot for Get Watchdog Timer. A never-configured slot reads
    /// back as all defaults; that this succeeds while `kick` fails is
    /// deliberate (see the state-asymmetry test below).
    pub fn get(&self) -> WdtState {
        self.state.lock().unwrap().clone()
    }

    /// One countdown step. A powered-off slot suspends the countdown
    /// without firing anything. On expiry the configured action is
    /// captured and returned so the caller can execute it after this
    /// method has dropped the lock.
    pub fn tick(&self, powered_on: bool) -> Option<WdtAction> {
        let mut st = self.state.lock().unwrap();
        if !st.run {
            return None;
        }
        if !powered_on {
            st.run = false;
            return None;
        }
        if st.present_count_down > 0 {
            st.present_count_down -= 1;
        }
        if st.present_count_down > 0 {
            return None;
        }

        st.expiration |= 1 << (st.use_code & 0x07);
        st.run = false;
        let action = st.action & 0x07;
        let no_log = st.no_log;
        st.no_log = false; // one-shot suppression
        drop(st);

        if !no_log {
            warn!("wdt[{}]: timer expired, action {}", self.slot, action);
        }
        match action {
            WDT_ACTION_HARD_RESET => Some(WdtAction::HardReset),
            WDT_ACTION_POWER_OFF => Some(WdtAction::PowerOff),
            WDT_ACTION_POWER_CYCLE => Some(WdtAction::PowerCycle),
            _ => None,
        }
    }
}

/// Spawn the countdown thread for one slot. Runs for the life of the
/// process.
pub fn spawn_countdown(
    slot: Arc<WdtSlot>,
    pal: Arc<dyn Platform>,
) -> IpmiResult<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("wdt-{}", slot.slot))
        .spawn(move || loop {
            thread::sleep(Duration::from_millis(WDT_TICK_MS));
            let powered = pal.is_powered_on(slot.slot);
            if let Some(action) = slot.tick(powered) {
                let res = match action {
                    WdtAction::HardReset => pal.power_reset(slot.slot),
                    WdtAction::PowerOff => pal.power_off(slot.slot),
                    WdtAction::PowerCycle => pal.power_cycle(slot.slot),
                };
                if let Err(e) = res {
                    error!("wdt[{}]: power action failed: {}", slot.slot, e);
                }
            }
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(countdown: u16, action: u8) -> WdtConfig {
        WdtConfig {
            use_code: WDT_USE_SMS_OS,
            dont_stop: false,
            no_log: false,
            action,
            pre_interval: 0,
            expiration_clear: 0,
            init_count_down: countdown,
        }
    }

    #[test]
    fn test_expiry_fires_action_once() {
        let slot = WdtSlot::new(1);
        slot.set(&cfg(3, WDT_ACTION_HARD_RESET));
        slot.kick().unwrap();

        assert_eq!(slot.tick(true), None);
        assert_eq!(slot.tick(true), None);
        assert_eq!(slot.tick(true), Some(WdtAction::HardReset));
        // Timer stopped; further ticks are no-ops.
        assert_eq!(slot.tick(true), None);

        let st = slot.get();
        assert!(!st.run);
        assert_eq!(st.expiration, 1 << WDT_USE_SMS_OS);
    }

    #[test]
    fn test_powered_off_suspends_without_expiring() {
        let slot = WdtSlot::new(1);
        slot.set(&cfg(2, WDT_ACTION_POWER_CYCLE));
        slot.kick().unwrap();

        assert_eq!(slot.tick(false), None);
        let st = slot.get();
        assert!(!st.run);
        assert_eq!(st.expiration, 0);
        assert_eq!(slot.tick(true), None);
    }

    #[test]
    fn test_set_stops_unless_dont_stop() {
        let slot = WdtSlot::new(1);
        slot.set(&cfg(10, WDT_ACTION_NONE));
        slot.kick().unwrap();
        assert!(slot.get().run);

        slot.set(&cfg(10, WDT_ACTION_NONE));
        assert!(!slot.get().run);

        slot.kick().unwrap();
        let mut c = cfg(10, WDT_ACTION_NONE);
        c.dont_stop = true;
        slot.set(&c);
        assert!(slot.get().run);
        assert_eq!(slot.get().present_count_down, 10);
    }

    #[test]
    fn test_expiration_clear_mask() {
        let slot = WdtSlot::new(1);
        slot.set(&cfg(1, WDT_ACTION_NONE));
        slot.kick().unwrap();
        assert_eq!(slot.tick(true), None); // action none still expires
        assert_eq!(slot.get().expiration, 1 << WDT_USE_SMS_OS);

        let mut c = cfg(1, WDT_ACTION_NONE);
        c.expiration_clear = 1 << WDT_USE_SMS_OS;
        slot.set(&c);
        assert_eq!(slot.get().expiration, 0);
    }

    #[test]
    fn test_state_asymmetry_on_unconfigured_slot() {
        // Deliberate asymmetry: reading an unconfigured slot succeeds
        // with default fields, kicking it is an invalid-parameter error.
        let slot = WdtSlot::new(1);
        let st = slot.get();
        assert!(!st.valid);
        assert_eq!(st.init_count_down, 0);
        let err = slot.kick().unwrap_err();
        assert_eq!(err.cc(), CC_INVALID_PARAM);
    }

    #[test]
    fn test_no_log_is_one_shot() {
        let slot = WdtSlot::new(1);
        let mut c = cfg(1, WDT_ACTION_NONE);
        c.no_log = true;
        slot.set(&c);
        slot.kick().unwrap();
        assert_eq!(slot.tick(true), None);
        assert!(!slot.get().no_log);
    }
}
