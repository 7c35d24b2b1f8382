// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory record of one power socket's configuration and status.

use serde::Serialize;

/// Number of power sockets on a NETIO-230A. Fixed by the hardware.
pub const OUTLET_COUNT: usize = 4;

/// State of one power socket as last reported by the device.
///
/// Four instances live inside a [`DeviceSession`], created with these
/// defaults at construction and refreshed in place by
/// [`DeviceSession::refresh_outlets`]. Fields are only ever written from a
/// device response, never invented locally.
///
/// [`DeviceSession`]: crate::DeviceSession
/// [`DeviceSession::refresh_outlets`]: crate::DeviceSession::refresh_outlets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutletState {
    /// Free-text label assigned on the device.
    pub name: String,
    /// True for manual switching, false for timer-driven.
    pub manual_mode: bool,
    /// Current energized state.
    pub power_on: bool,
    /// Persisted power-up default after a power loss.
    pub power_on_after_loss: bool,
    /// Reserved. No response currently populates this; the watchdog
    /// protocol is only documented upstream as a raw `port wd` string.
    pub watchdog_on: bool,
    /// Delay in seconds used by the temporary-interrupt command.
    pub interrupt_delay: u32,
}

impl Default for OutletState {
    fn default() -> Self {
        Self {
            name: String::new(),
            manual_mode: true,
            power_on: false,
            power_on_after_loss: false,
            watchdog_on: false,
            interrupt_delay: 2,
        }
    }
}
