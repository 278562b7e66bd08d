/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */
use std::collections::HashMap;
use std::fmt;

use crate::ipmi::ipmi::CC_UNSPECIFIED_ERROR;

type ValStrMap = HashMap<u8, &'static str>;

/// Describe an IPMI completion code for log output.
pub fn cc2str(cc: u8) -> &'static str {
    COMPLETION_CODE_VALS
        .get(&cc)
        .copied()
        .unwrap_or("Unknown completion code")
}

lazy_static::lazy_static! {
    pub static ref COMPLETION_CODE_VALS: ValStrMap = {
        let mut m = HashMap::new();
        m.insert(0x00, "Command completed normally");
        m.insert(0xc0, "Node busy");
        m.insert(0xc1, "Invalid command");
        m.insert(0xc2, "Invalid command on LUN");
        m.insert(0xc3, "Timeout");
        m.insert(0xc4, "Out of space");
        m.insert(0xc5, "Reservation cancelled or invalid");
        m.insert(0xc6, "Request data truncated");
        m.insert(0xc7, "Request data length invalid");
        m.insert(0xc8, "Request data field length limit exceeded");
        m.insert(0xc9, "Parameter out of range");
        m.insert(0xca, "Cannot return number of requested data bytes");
        m.insert(0xcb, "Requested sensor, data, or record not found");
        m.insert(0xcc, "Invalid data field in request");
        m.insert(0xcd, "Command illegal for specified sensor or record type");
        m.insert(0xce, "Command response could not be provided");
        m.insert(0xd5, "Command not supported in present state");
        m.insert(0xd6, "Cannot execute command, command disabled");
        m.insert(0xff, "Unspecified error");
        m
    };
}

/// Daemon-side IPMI error type. `Completion` carries the completion code a
/// handler should place in the response; the other variants describe local
/// failures that surface as `CC_UNSPECIFIED_ERROR` on the wire.
#[derive(Debug, Clone)]
pub enum IpmiError {
    /// IPMI completion code error
    Completion(u8),
    /// Malformed or truncated request data
    InvalidData(String),
    /// Command not supported by this platform
    NotSupported(String),
    /// System error (file I/O, kernel interactions)
    System(String),
}

impl fmt::Display for IpmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpmiError::Completion(code) => {
                write!(f, "completion code 0x{:02x} ({})", code, cc2str(*code))
            }
            IpmiError::InvalidData(msg) => write!(f, "{}", msg),
            IpmiError::NotSupported(msg) => write!(f, "Command not supported: {}", msg),
            IpmiError::System(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for IpmiError {}

impl From<std::io::Error> for IpmiError {
    fn from(error: std::io::Error) -> Self {
        IpmiError::System(error.to_string())
    }
}

impl From<nix::Error> for IpmiError {
    fn from(error: nix::Error) -> Self {
        IpmiError::System(error.to_string())
    }
}

impl IpmiError {
    /// Completion code to place in a response for this error.
    pub fn cc(&self) -> u8 {
        match self {
            IpmiError::Completion(code) => *code,
            _ => CC_UNSPECIFIED_ERROR,
        }
    }
}

pub type IpmiResult<T> = Result<T, IpmiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cc2str_known() {
        assert_eq!(cc2str(0x00), "Command completed normally");
        assert_eq!(cc2str(0xc5), "Reservation cancelled or invalid");
    }

    #[test]
    fn test_error_cc_mapping() {
        assert_eq!(IpmiError::Completion(0xc1).cc(), 0xc1);
        assert_eq!(IpmiError::System("eio".into()).cc(), CC_UNSPECIFIED_ERROR);
    }
}
