/*
 * SPDX-License-Identifier: GPL-2.0-or-later
 */

pub mod commands;
pub mod context;
pub mod error;
pub mod helper;
pub mod interface;
pub mod ipmi;
pub mod logging;
pub mod pal;
pub mod sdr;
pub mod sel;
pub mod watchdog;
