/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
use chrono::Utc;

pub const IPMI_TIME_UNSPECIFIED: u32 = 0xFFFFFFFF;
pub const IPMI_TIME_INIT_DONE: u32 = 0x20000000;

/// Current time as a 4-byte IPMI epoch timestamp.
pub fn ipmi_timestamp_now() -> u32 {
    Utc::now().timestamp() as u32
}

fn is_special_timestamp(ts: u32) -> bool {
    ts < IPMI_TIME_INIT_DONE
}

pub fn is_valid_timestamp(ts: u32) -> bool {
    ts != IPMI_TIME_UNSPECIFIED
}

/// Render a timestamp for log output. Matches the ipmitool convention:
/// pre-init stamps render as a relative "S+" offset, UTC otherwise.
pub fn ipmi_timestamp_numeric(stamp: u32) -> String {
    use chrono::TimeZone;

    if !is_valid_timestamp(stamp) {
        return "Unspecified".to_string();
    }
    if is_special_timestamp(stamp) {
        let days = stamp / 86400;
        let secs = stamp % 86400;
        if days == 0 {
            return format!("S+ {}", format_time(secs));
        }
        return format!("S+ {}d {}", days, format_time(secs));
    }
    match Utc.timestamp_opt(stamp as i64, 0).single() {
        Some(dt) => dt.format("%m/%d/%Y %H:%M:%S").to_string(),
        None => "Invalid timestamp".to_string(),
    }
}

fn format_time(seconds: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
